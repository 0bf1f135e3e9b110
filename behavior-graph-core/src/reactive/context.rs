//! Execution Context
//!
//! The execution context records which event is open and what kind of code
//! is running inside it: an action, a behavior, or a side effect. Resources
//! consult it to decide whether an update is legal.
//!
//! # Implementation
//!
//! The context is a plain value owned by the graph and threaded through the
//! event loop. There is no thread-local or global state, so any number of
//! graphs can live side by side. The loop saves the previous phase on entry
//! and restores it on exit, which keeps the context correct even when a
//! block fails part way through.

use crate::error::{GraphError, GraphResult, UpdateViolation};
use crate::event::GraphEvent;
use crate::graph::{BehaviorId, ResourceId};

/// What the event loop is running right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing user-supplied is running.
    #[default]
    Idle,

    /// An action block seeding the current event.
    Action,

    /// A behavior's computation.
    Behavior(BehaviorId),

    /// A side effect, after propagation settled.
    SideEffect,
}

/// Current event and phase of a graph.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    current_event: Option<GraphEvent>,
    phase: Phase,
}

impl ExecutionContext {
    /// The open event, if any.
    pub fn current_event(&self) -> Option<&GraphEvent> {
        self.current_event.as_ref()
    }

    /// Sequence of the open event, if any.
    pub fn current_sequence(&self) -> Option<u64> {
        self.current_event.as_ref().map(GraphEvent::sequence)
    }

    /// The behavior being run, if any.
    pub fn current_behavior(&self) -> Option<BehaviorId> {
        match self.phase {
            Phase::Behavior(id) => Some(id),
            _ => None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn open(&mut self, event: GraphEvent) {
        self.current_event = Some(event);
    }

    pub(crate) fn close(&mut self) -> Option<GraphEvent> {
        self.phase = Phase::Idle;
        self.current_event.take()
    }

    /// Switch phase, returning the one to restore afterwards.
    pub(crate) fn enter(&mut self, phase: Phase) -> Phase {
        std::mem::replace(&mut self.phase, phase)
    }

    pub(crate) fn restore(&mut self, previous: Phase) {
        self.phase = previous;
    }

    /// The open event, or `NoOpenEvent` naming the operation.
    pub fn require_event(&self, operation: &'static str) -> GraphResult<&GraphEvent> {
        self.current_event
            .as_ref()
            .ok_or(GraphError::NoOpenEvent { operation })
    }

    /// Structural changes need an open event and must not come from a side
    /// effect.
    pub fn require_structural(&self, operation: &'static str) -> GraphResult<u64> {
        let sequence = self.require_event(operation)?.sequence();
        if self.phase == Phase::SideEffect {
            return Err(GraphError::SideEffectMutation { operation });
        }
        Ok(sequence)
    }

    /// Check that the running code may update a resource with the given
    /// supplier.
    ///
    /// A supplied resource may only be updated by its supplier while that
    /// supplier runs. An unsupplied resource may only be updated from an
    /// action.
    pub fn check_updater(
        &self,
        resource: ResourceId,
        supplier: Option<BehaviorId>,
    ) -> GraphResult<()> {
        let violation = |reason| GraphError::InvalidUpdateContext { resource, reason };

        if self.current_event.is_none() {
            return Err(violation(UpdateViolation::NoEvent));
        }

        match (self.phase, supplier) {
            (Phase::SideEffect, _) => Err(violation(UpdateViolation::InSideEffect)),
            (Phase::Behavior(current), Some(supplier)) if current == supplier => Ok(()),
            (Phase::Behavior(current), Some(supplier)) => {
                Err(violation(UpdateViolation::NotSupplier {
                    supplier,
                    current: Some(current),
                }))
            }
            (Phase::Behavior(current), None) => {
                Err(violation(UpdateViolation::UnsuppliedInBehavior { current }))
            }
            (_, Some(supplier)) => Err(violation(UpdateViolation::NotSupplier {
                supplier,
                current: None,
            })),
            (_, None) => Ok(()),
        }
    }
}
