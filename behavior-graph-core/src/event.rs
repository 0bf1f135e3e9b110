//! Graph Events
//!
//! A `GraphEvent` names one atomic run of the event loop: from the action that
//! started it, through every behavior it activated, to the point where the
//! graph settled. Events are immutable and numbered by a monotonically
//! increasing sequence. The initial event (sequence 0) predates every action
//! and stamps the initial value of each `State`.
//!
//! Timestamps come from a pluggable [`Clock`]. They are diagnostic only;
//! ordering never depends on them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One atomic run of the event loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEvent {
    sequence: u64,
    timestamp: u64,
    impulse: Option<String>,
}

impl GraphEvent {
    /// Create an event. Only the runtime opens events; this is public so hosts
    /// can build fixtures for `State::history_at`.
    pub fn new(sequence: u64, timestamp: u64, impulse: Option<String>) -> Self {
        Self {
            sequence,
            timestamp,
            impulse,
        }
    }

    /// The event that seeds every initial value.
    pub fn initial() -> Self {
        Self::new(0, 0, Some("InitialEvent".to_string()))
    }

    /// Position of this event in the graph's history.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Milliseconds reported by the graph's clock when the event opened.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Label of the action that started the event.
    pub fn impulse(&self) -> Option<&str> {
        self.impulse.as_deref()
    }
}

/// Source of event timestamps.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Set the current time.
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
