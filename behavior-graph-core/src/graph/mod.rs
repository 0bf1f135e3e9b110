//! Dependency Graph
//!
//! This module implements the dependency graph that connects resources to
//! the behaviors that read and write them.
//!
//! # Overview
//!
//! - Resources and behaviors live in arenas and are addressed by small
//!   integer handles (`ResourceId`, `BehaviorId`, `ExtentId`).
//! - A behavior *demands* the resources it reads and *supplies* the
//!   resources it writes. Each resource has at most one supplier.
//! - Both directions of every edge are stored, so the graph can be walked
//!   downstream (resource to subsequents) and upstream (demand to supplier).
//!
//! Behaviors are ranked so that a supplier always ranks below everything that
//! demands its supplies. The event loop pops activated behaviors from a
//! min-heap keyed by that rank.

mod node;
mod queue;
mod scheduler;
mod snapshot;

pub use node::{BehaviorId, ExtentId, OrderingState, ResourceId, ResourceKind};
pub use queue::BufferedQueue;
pub use scheduler::Scheduler;
pub use snapshot::{BehaviorSnapshot, ExtentSnapshot, GraphSnapshot, ResourceSnapshot};

pub(crate) use node::{BehaviorFn, ResourceCell};
