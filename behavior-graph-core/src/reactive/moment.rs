//! Moment Implementation
//!
//! A Moment is a one-shot pulse: it says "this happened in the current
//! event", optionally with a payload. Once the event closes the pulse is
//! gone; only the event of the last pulse is remembered.
//!
//! `Moment<()>` is the bare resource: it carries no data and is used purely
//! to order behaviors or to signal that something changed.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use super::runtime::Graph;
use crate::error::GraphResult;
use crate::event::GraphEvent;
use crate::graph::{ExtentId, ResourceCell, ResourceId, ResourceKind};

pub(crate) struct MomentCell<T> {
    happened: bool,
    value: Option<T>,
    event: Option<GraphEvent>,
}

impl<T: 'static> ResourceCell for MomentCell<T> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Moment
    }

    fn clear(&mut self) {
        self.happened = false;
        self.value = None;
    }

    fn discard(&mut self, sequence: u64) {
        if self.event.as_ref().map(GraphEvent::sequence) == Some(sequence) {
            self.happened = false;
            self.value = None;
            self.event = None;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handle to a one-shot pulse in a graph.
pub struct Moment<T = ()> {
    id: ResourceId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Moment<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Moment<T> {}

impl<T> PartialEq for Moment<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Moment<T> {}

impl<T> fmt::Debug for Moment<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Moment").field(&self.id).finish()
    }
}

impl<T: 'static> Moment<T> {
    pub(crate) fn create(graph: &mut Graph, extent: ExtentId, name: Option<String>) -> Self {
        let cell: MomentCell<T> = MomentCell {
            happened: false,
            value: None,
            event: None,
        };
        let id = graph.scheduler.add_resource(extent, name, Box::new(cell));
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    fn cell<'g>(&self, graph: &'g Graph) -> &'g MomentCell<T> {
        graph
            .scheduler
            .resource(self.id)
            .cell
            .as_any()
            .downcast_ref()
            .expect("moment handle does not belong to this graph")
    }

    fn cell_mut<'g>(&self, graph: &'g mut Graph) -> &'g mut MomentCell<T> {
        graph
            .scheduler
            .resource_mut(self.id)
            .cell
            .as_any_mut()
            .downcast_mut()
            .expect("moment handle does not belong to this graph")
    }

    /// Fire the pulse in the open event.
    pub fn update(&self, graph: &mut Graph, value: T) -> GraphResult<()> {
        let event = graph.prepare_update(self.id)?;

        let cell = self.cell_mut(graph);
        cell.happened = true;
        cell.value = Some(value);
        cell.event = Some(event);

        graph.resource_updated(self.id);
        Ok(())
    }

    /// Fire the pulse from a new action named after the moment.
    pub fn update_with_action(&self, graph: &mut Graph, value: T) -> GraphResult<()> {
        let moment = *self;
        let impulse = match graph.resource_name(self.id) {
            Some(name) => format!("update {name}"),
            None => format!("update {}", self.id),
        };
        graph.action(impulse, move |graph| moment.update(graph, value))
    }

    /// Check if the pulse fired in the open event.
    pub fn just_updated(&self, graph: &Graph) -> bool {
        let cell = self.cell(graph);
        cell.happened
            && cell.event.as_ref().map(GraphEvent::sequence) == graph.context().current_sequence()
    }

    /// Payload of the pulse, while it lasts.
    pub fn value<'g>(&self, graph: &'g Graph) -> Option<&'g T> {
        let cell = self.cell(graph);
        if cell.happened {
            cell.value.as_ref()
        } else {
            None
        }
    }

    /// Event of the last pulse, kept after the pulse is cleared.
    pub fn event<'g>(&self, graph: &'g Graph) -> Option<&'g GraphEvent> {
        self.cell(graph).event.as_ref()
    }

    pub fn is_added(&self, graph: &Graph) -> bool {
        graph.is_resource_added(self.id)
    }

    pub fn name<'g>(&self, graph: &'g Graph) -> Option<&'g str> {
        graph.resource_name(self.id)
    }
}

impl<T: PartialEq + 'static> Moment<T> {
    pub fn just_updated_to(&self, graph: &Graph, value: &T) -> bool {
        self.just_updated(graph) && self.value(graph) == Some(value)
    }
}
