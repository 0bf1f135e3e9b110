//! Error types for graph operations.
//!
//! Every error is fatal to the event that raised it. The event loop does not
//! retry; it resets its in-flight state and hands the error back to whoever
//! submitted the action.

use crate::graph::{BehaviorId, ExtentId, ResourceId};

/// Result alias used throughout the crate and by user blocks.
pub type GraphResult<T> = Result<T, GraphError>;

/// Why a resource update was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateViolation {
    /// No event is open, so there is nothing to stamp the update with.
    NoEvent,

    /// The resource has a supplier and the running behavior is not it.
    NotSupplier {
        supplier: BehaviorId,
        current: Option<BehaviorId>,
    },

    /// The resource has no supplier, so only actions may update it.
    UnsuppliedInBehavior { current: BehaviorId },

    /// Side effects observe the settled graph; they never write to it.
    InSideEffect,
}

impl std::fmt::Display for UpdateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEvent => write!(f, "no event is open"),
            Self::NotSupplier { supplier, current: Some(current) } => write!(
                f,
                "supplied by {supplier} but updated from {current}"
            ),
            Self::NotSupplier { supplier, current: None } => {
                write!(f, "supplied by {supplier} but updated from an action")
            }
            Self::UnsuppliedInBehavior { current } => write!(
                f,
                "unsupplied resource updated from {current}; use an action"
            ),
            Self::InSideEffect => write!(f, "updated from a side effect"),
        }
    }
}

/// Errors raised by the graph, its resources and its behaviors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// Ranking found a behavior that transitively demands its own output.
    ///
    /// `cycle` lists the resources forming the loop in data-flow order,
    /// starting with a resource supplied by `behavior`.
    #[error("dependency cycle detected at {behavior}: {}", format_cycle(.cycle))]
    CycleDetected {
        behavior: BehaviorId,
        cycle: Vec<ResourceId>,
    },

    /// A resource may be supplied by at most one behavior.
    #[error("{resource} is already supplied by {existing}; {desired} cannot supply it too")]
    MultipleSuppliers {
        resource: ResourceId,
        existing: BehaviorId,
        desired: BehaviorId,
    },

    /// Demands must already be part of the graph when they are linked.
    #[error("{behavior} demands {resource}, which has not been added to the graph")]
    UnaddedDemand {
        behavior: BehaviorId,
        resource: ResourceId,
    },

    /// A resource was updated from a context that may not write to it.
    #[error("invalid update of {resource}: {reason}")]
    InvalidUpdateContext {
        resource: ResourceId,
        reason: UpdateViolation,
    },

    /// Trace values only make sense relative to an open event.
    #[error("trace of {resource} read with no event open")]
    InvalidTraceAccess { resource: ResourceId },

    /// The operation needs an open event.
    #[error("{operation} requires an open event")]
    NoOpenEvent { operation: &'static str },

    /// An extent was admitted twice.
    #[error("{extent} already belongs to the graph")]
    AlreadyInGraph { extent: ExtentId },

    /// Side effects can only be queued while an event is open.
    #[error("side effects can only be created during an event")]
    EffectOutsideEvent,

    /// Demands or supplies changed on a behavior that is not in the graph.
    #[error("{behavior} must belong to the graph before its links change")]
    BehaviorNotAdded { behavior: BehaviorId },

    /// An extent-scoped action was issued by an extent outside the graph.
    #[error("{extent} must be added to the graph before it issues actions")]
    ExtentNotAdded { extent: ExtentId },

    /// A side effect tried to change the graph's structure.
    #[error("{operation} is not allowed inside a side effect")]
    SideEffectMutation { operation: &'static str },

    /// Application code failed its event deliberately.
    #[error("event aborted: {reason}")]
    Aborted { reason: String },
}

impl GraphError {
    /// Fail the current event from inside an action, behavior or effect.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }
}

fn format_cycle(cycle: &[ResourceId]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
