//! Behaviors
//!
//! A behavior is a computation bound to the resources it reads (demands) and
//! the resources it alone may write (supplies). The graph runs it whenever a
//! demand updates, after every behavior supplying its demands has run.
//!
//! Changing a behavior's links never takes effect immediately. The request is
//! buffered and installed by the event loop before the next behavior runs.

use super::extent::Extent;
use super::runtime::Graph;
use crate::error::GraphResult;
use crate::graph::{BehaviorId, ResourceId};

/// Handle to a behavior in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Behavior {
    id: BehaviorId,
}

impl Behavior {
    pub(crate) fn from_id(id: BehaviorId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> BehaviorId {
        self.id
    }

    /// Request a new demand set. Fails if the behavior is not in the graph or
    /// no event is open.
    pub fn set_demands(&self, graph: &mut Graph, demands: &[ResourceId]) -> GraphResult<()> {
        graph.set_demands(*self, demands)
    }

    /// Request a new supply set.
    pub fn set_supplies(&self, graph: &mut Graph, supplies: &[ResourceId]) -> GraphResult<()> {
        graph.set_supplies(*self, supplies)
    }

    /// Topological rank.
    pub fn order(&self, graph: &Graph) -> usize {
        graph.scheduler.order(self.id)
    }

    /// Sequence of the last event this behavior ran in.
    pub fn last_run(&self, graph: &Graph) -> Option<u64> {
        graph.behavior_last_run(*self)
    }

    pub fn is_added(&self, graph: &Graph) -> bool {
        graph.scheduler.behavior(self.id).added
    }

    pub fn extent(&self, graph: &Graph) -> Extent {
        Extent::from_id(graph.scheduler.behavior(self.id).extent)
    }

    pub fn name<'g>(&self, graph: &'g Graph) -> Option<&'g str> {
        graph.scheduler.behavior(self.id).name.as_deref()
    }

    /// Installed demands.
    pub fn demands(&self, graph: &Graph) -> Vec<ResourceId> {
        graph.scheduler.behavior(self.id).demands.iter().copied().collect()
    }

    /// Installed supplies.
    pub fn supplies(&self, graph: &Graph) -> Vec<ResourceId> {
        graph.scheduler.behavior(self.id).supplies.iter().copied().collect()
    }
}
