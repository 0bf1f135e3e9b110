//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph
//! arenas, and the handles used to address them.
//!
//! Resources and behaviors reference each other only through these handles.
//! Both sides of every edge are owned by the scheduler's arenas, so there are
//! no ownership cycles between a resource and the behavior that supplies it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::GraphResult;
use crate::reactive::{Extent, Graph};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Position in the owning arena.
            pub fn index(&self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle to a resource in the graph's resource arena.
    ResourceId,
    "resource"
);

arena_id!(
    /// Handle to a behavior in the graph's behavior arena.
    BehaviorId,
    "behavior"
);

arena_id!(
    /// Handle to an extent in the graph's extent arena.
    ExtentId,
    "extent"
);

/// Where a behavior stands in the current ordering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingState {
    /// The behavior's order is stale and must be recomputed.
    Unordered,

    /// The behavior is on the ranking stack. Meeting it again means a cycle.
    Ordering,

    /// The behavior's order is valid.
    Ordered,
}

/// The two flavours of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Persistent value with history.
    State,

    /// One-shot pulse, cleared when its event closes.
    Moment,
}

/// Typed payload storage behind a resource node.
///
/// Every cell is transient: once touched in an event it is cleared when the
/// event closes.
pub(crate) trait ResourceCell: Any {
    fn kind(&self) -> ResourceKind;

    /// Reset per-event state at event close.
    fn clear(&mut self);

    /// Forget every update stamped with a failed event.
    fn discard(&mut self, sequence: u64);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A behavior's computation.
pub(crate) type BehaviorFn = dyn Fn(&mut Graph, Extent) -> GraphResult<()>;

/// A node holding either a `State` or a `Moment`.
pub(crate) struct ResourceNode {
    pub(crate) name: Option<String>,
    pub(crate) extent: ExtentId,
    pub(crate) added: bool,

    /// Behaviors that demand this resource.
    pub(crate) subsequents: IndexSet<BehaviorId>,

    /// The one behavior allowed to update this resource, if any.
    pub(crate) supplied_by: Option<BehaviorId>,

    pub(crate) cell: Box<dyn ResourceCell>,
}

impl ResourceNode {
    pub(crate) fn new(extent: ExtentId, name: Option<String>, cell: Box<dyn ResourceCell>) -> Self {
        Self {
            name,
            extent,
            added: false,
            subsequents: IndexSet::new(),
            supplied_by: None,
            cell,
        }
    }
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("name", &self.name)
            .field("kind", &self.cell.kind())
            .field("extent", &self.extent)
            .field("added", &self.added)
            .field("subsequents", &self.subsequents)
            .field("supplied_by", &self.supplied_by)
            .finish()
    }
}

/// A computation unit with demand and supply edges.
pub(crate) struct BehaviorNode {
    pub(crate) name: Option<String>,
    pub(crate) extent: ExtentId,
    pub(crate) added: bool,

    pub(crate) demands: IndexSet<ResourceId>,
    pub(crate) supplies: IndexSet<ResourceId>,

    /// Requested links, installed at the next phase boundary.
    pub(crate) pending_demands: Option<Vec<ResourceId>>,
    pub(crate) pending_supplies: Option<Vec<ResourceId>>,

    pub(crate) block: Rc<BehaviorFn>,

    /// Topological rank. Suppliers always rank below their subsequents.
    pub(crate) order: usize,
    pub(crate) ordering: OrderingState,

    pub(crate) enqueued_at: Option<u64>,
    pub(crate) removed_at: Option<u64>,
    pub(crate) last_run: Option<u64>,
}

impl BehaviorNode {
    pub(crate) fn new(
        extent: ExtentId,
        name: Option<String>,
        demands: Vec<ResourceId>,
        supplies: Vec<ResourceId>,
        block: Rc<BehaviorFn>,
    ) -> Self {
        Self {
            name,
            extent,
            added: false,
            demands: IndexSet::new(),
            supplies: IndexSet::new(),
            pending_demands: Some(demands),
            pending_supplies: Some(supplies),
            block,
            order: 0,
            ordering: OrderingState::Unordered,
            enqueued_at: None,
            removed_at: None,
            last_run: None,
        }
    }
}

impl fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorNode")
            .field("name", &self.name)
            .field("extent", &self.extent)
            .field("added", &self.added)
            .field("demands", &self.demands)
            .field("supplies", &self.supplies)
            .field("order", &self.order)
            .field("ordering", &self.ordering)
            .finish_non_exhaustive()
    }
}

/// Ownership record for a group of resources and behaviors.
#[derive(Debug, Default)]
pub(crate) struct ExtentNode {
    pub(crate) name: Option<String>,
    pub(crate) resources: Vec<ResourceId>,
    pub(crate) behaviors: Vec<BehaviorId>,

    /// Sequence of the event that admitted the extent.
    pub(crate) added_at: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_kind() {
        assert_eq!(ResourceId::from(3).to_string(), "resource#3");
        assert_eq!(BehaviorId::from(0).to_string(), "behavior#0");
        assert_eq!(ExtentId::from(7).to_string(), "extent#7");
    }

    #[test]
    fn ids_round_trip_through_index() {
        let id = BehaviorId::from_index(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id, BehaviorId::from(42));
    }

    #[test]
    fn new_behavior_starts_unordered_with_pending_links() {
        let block: Rc<BehaviorFn> = Rc::new(|_, _| Ok(()));
        let node = BehaviorNode::new(
            ExtentId::from(0),
            None,
            vec![ResourceId::from(1)],
            vec![],
            block,
        );

        assert_eq!(node.ordering, OrderingState::Unordered);
        assert!(node.demands.is_empty());
        assert_eq!(node.pending_demands, Some(vec![ResourceId::from(1)]));
        assert_eq!(node.pending_supplies, Some(vec![]));
        assert!(!node.added);
    }
}
