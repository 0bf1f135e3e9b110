//! Graph configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a [`Graph`](crate::reactive::Graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// History entries a `State` keeps once its event closes. Never below 1.
    pub history_retention: usize,

    /// Label attached to this graph's log records.
    pub label: Option<String>,
}

impl GraphConfig {
    /// Retention with the lower bound applied.
    pub fn effective_retention(&self) -> usize {
        self.history_retention.max(1)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            history_retention: 1,
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: GraphConfig = serde_json::from_str(r#"{"label":"login"}"#).unwrap();
        assert_eq!(config.history_retention, 1);
        assert_eq!(config.label.as_deref(), Some("login"));
    }

    #[test]
    fn retention_is_at_least_one() {
        let config = GraphConfig {
            history_retention: 0,
            label: None,
        };
        assert_eq!(config.effective_retention(), 1);
    }
}
