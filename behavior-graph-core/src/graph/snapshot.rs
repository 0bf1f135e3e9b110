//! Topology snapshots.
//!
//! A `GraphSnapshot` is a plain, serializable copy of the graph's structure:
//! which resources exist, who supplies and demands them, and how behaviors
//! are ranked. Payload values are not included.

use serde::{Deserialize, Serialize};

use super::node::{BehaviorId, ExtentId, OrderingState, ResourceId, ResourceKind};
use super::scheduler::Scheduler;
use crate::event::GraphEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub name: Option<String>,
    pub kind: ResourceKind,
    pub extent: ExtentId,
    pub added: bool,
    pub supplied_by: Option<BehaviorId>,
    pub subsequents: Vec<BehaviorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSnapshot {
    pub id: BehaviorId,
    pub name: Option<String>,
    pub extent: ExtentId,
    pub added: bool,
    pub order: usize,
    pub ordering: OrderingState,
    pub demands: Vec<ResourceId>,
    pub supplies: Vec<ResourceId>,
    pub last_run: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtentSnapshot {
    pub id: ExtentId,
    pub name: Option<String>,
    pub added_at: Option<u64>,
    pub resources: Vec<ResourceId>,
    pub behaviors: Vec<BehaviorId>,
}

/// Serializable picture of a graph's topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub last_event: GraphEvent,
    pub current_event: Option<GraphEvent>,
    pub resources: Vec<ResourceSnapshot>,
    pub behaviors: Vec<BehaviorSnapshot>,
    pub extents: Vec<ExtentSnapshot>,
}

impl GraphSnapshot {
    pub(crate) fn capture(
        scheduler: &Scheduler,
        last_event: &GraphEvent,
        current_event: Option<&GraphEvent>,
    ) -> Self {
        let resources = scheduler
            .resources
            .iter()
            .enumerate()
            .map(|(index, node)| ResourceSnapshot {
                id: ResourceId::from_index(index),
                name: node.name.clone(),
                kind: node.cell.kind(),
                extent: node.extent,
                added: node.added,
                supplied_by: node.supplied_by,
                subsequents: node.subsequents.iter().copied().collect(),
            })
            .collect();

        let behaviors = scheduler
            .behaviors
            .iter()
            .enumerate()
            .map(|(index, node)| BehaviorSnapshot {
                id: BehaviorId::from_index(index),
                name: node.name.clone(),
                extent: node.extent,
                added: node.added,
                order: node.order,
                ordering: node.ordering,
                demands: node.demands.iter().copied().collect(),
                supplies: node.supplies.iter().copied().collect(),
                last_run: node.last_run,
            })
            .collect();

        let extents = scheduler
            .extents
            .iter()
            .enumerate()
            .map(|(index, node)| ExtentSnapshot {
                id: ExtentId::from_index(index),
                name: node.name.clone(),
                added_at: node.added_at,
                resources: node.resources.clone(),
                behaviors: node.behaviors.clone(),
            })
            .collect();

        Self {
            last_event: last_event.clone(),
            current_event: current_event.cloned(),
            resources,
            behaviors,
            extents,
        }
    }

    pub fn resource(&self, id: ResourceId) -> Option<&ResourceSnapshot> {
        self.resources.get(id.index())
    }

    pub fn behavior(&self, id: BehaviorId) -> Option<&BehaviorSnapshot> {
        self.behaviors.get(id.index())
    }

    /// Behaviors in the graph, lowest rank first.
    pub fn ranked(&self) -> Vec<&BehaviorSnapshot> {
        let mut ranked: Vec<&BehaviorSnapshot> =
            self.behaviors.iter().filter(|b| b.added).collect();
        ranked.sort_by_key(|b| (b.order, b.id));
        ranked
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scheduler_snapshot_round_trips() {
        let scheduler = Scheduler::new();
        let snapshot = GraphSnapshot::capture(&scheduler, &GraphEvent::initial(), None);

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("InitialEvent"));
        assert_eq!(GraphSnapshot::from_json(&json).unwrap(), snapshot);
    }
}
