//! State Implementation
//!
//! A State is a resource holding a persistent value and a short history of
//! how it got there.
//!
//! # How States Work
//!
//! 1. Every update pushes a `(value, event)` entry stamped with the open
//!    event. Nothing is overwritten in place.
//!
//! 2. The *trace* is the entry as of the start of the current event. It lets
//!    a behavior compare "before this event" with "after".
//!
//! 3. When the event closes, history is trimmed back to the retained length
//!    (one entry unless configured otherwise).
//!
//! # Handles
//!
//! `State<T>` is only a typed handle. The history lives in the graph's
//! resource arena, so handles are `Copy` and can be moved into any number of
//! behavior closures.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use super::runtime::Graph;
use crate::error::{GraphError, GraphResult};
use crate::event::GraphEvent;
use crate::graph::{ExtentId, ResourceCell, ResourceId, ResourceKind};

/// One history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry<T> {
    pub value: T,
    pub event: GraphEvent,
}

/// Arena storage behind a `State<T>`. Oldest entry first.
pub(crate) struct StateCell<T> {
    history: Vec<StateEntry<T>>,
    retain: usize,
}

impl<T: 'static> StateCell<T> {
    fn new(initial: T, retain: usize) -> Self {
        Self {
            history: vec![StateEntry {
                value: initial,
                event: GraphEvent::initial(),
            }],
            retain: retain.max(1),
        }
    }

    fn current(&self) -> &StateEntry<T> {
        // Never empty: initial entry is only trimmed, never removed.
        &self.history[self.history.len() - 1]
    }

    /// The entry the latest update replaced.
    fn replaced(&self) -> Option<&StateEntry<T>> {
        self.history.len().checked_sub(2).map(|index| &self.history[index])
    }

    fn trace(&self, sequence: u64) -> &StateEntry<T> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.event.sequence() != sequence)
            .unwrap_or_else(|| self.current())
    }
}

impl<T: 'static> ResourceCell for StateCell<T> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::State
    }

    fn clear(&mut self) {
        let excess = self.history.len().saturating_sub(self.retain);
        self.history.drain(..excess);
    }

    fn discard(&mut self, sequence: u64) {
        if self.history.len() > 1 {
            self.history.retain(|entry| entry.event.sequence() != sequence);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Handle to a persistent value in a graph.
pub struct State<T> {
    id: ResourceId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for State<T> {}

impl<T> PartialEq for State<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for State<T> {}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&self.id).finish()
    }
}

impl<T: 'static> State<T> {
    pub(crate) fn create(
        graph: &mut Graph,
        extent: ExtentId,
        name: Option<String>,
        initial: T,
        retain: usize,
    ) -> Self {
        let cell = StateCell::new(initial, retain);
        let id = graph.scheduler.add_resource(extent, name, Box::new(cell));
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    fn cell<'g>(&self, graph: &'g Graph) -> &'g StateCell<T> {
        graph
            .scheduler
            .resource(self.id)
            .cell
            .as_any()
            .downcast_ref()
            .expect("state handle does not belong to this graph")
    }

    fn cell_mut<'g>(&self, graph: &'g mut Graph) -> &'g mut StateCell<T> {
        graph
            .scheduler
            .resource_mut(self.id)
            .cell
            .as_any_mut()
            .downcast_mut()
            .expect("state handle does not belong to this graph")
    }

    /// Current value.
    pub fn value<'g>(&self, graph: &'g Graph) -> &'g T {
        &self.cell(graph).current().value
    }

    /// Event the current value was written in.
    pub fn event<'g>(&self, graph: &'g Graph) -> &'g GraphEvent {
        &self.cell(graph).current().event
    }

    /// Current value and its event.
    pub fn entry<'g>(&self, graph: &'g Graph) -> &'g StateEntry<T> {
        self.cell(graph).current()
    }

    /// The entry as of the start of the open event.
    ///
    /// If the state was updated during the open event this is the entry
    /// before that update, otherwise it is the current entry.
    pub fn trace<'g>(&self, graph: &'g Graph) -> GraphResult<&'g StateEntry<T>> {
        let sequence = graph
            .context()
            .current_sequence()
            .ok_or(GraphError::InvalidTraceAccess { resource: self.id })?;
        Ok(self.cell(graph).trace(sequence))
    }

    pub fn trace_value<'g>(&self, graph: &'g Graph) -> GraphResult<&'g T> {
        self.trace(graph).map(|entry| &entry.value)
    }

    pub fn trace_event<'g>(&self, graph: &'g Graph) -> GraphResult<&'g GraphEvent> {
        self.trace(graph).map(|entry| &entry.event)
    }

    /// Most recent retained entry written no later than `event`.
    pub fn history_at<'g>(&self, graph: &'g Graph, event: &GraphEvent) -> Option<&'g StateEntry<T>> {
        self.cell(graph)
            .history
            .iter()
            .rev()
            .find(|entry| entry.event.sequence() <= event.sequence())
    }

    /// Check if the state was updated in the open event.
    pub fn just_updated(&self, graph: &Graph) -> bool {
        match graph.context().current_sequence() {
            Some(sequence) => self.event(graph).sequence() == sequence,
            None => false,
        }
    }

    pub fn is_added(&self, graph: &Graph) -> bool {
        graph.is_resource_added(self.id)
    }

    pub fn name<'g>(&self, graph: &'g Graph) -> Option<&'g str> {
        graph.resource_name(self.id)
    }
}

impl<T: Clone + 'static> State<T> {
    /// Copy of the current value.
    pub fn get(&self, graph: &Graph) -> T {
        self.value(graph).clone()
    }
}

impl<T: PartialEq + 'static> State<T> {
    /// Write a new value.
    ///
    /// Allowed from the state's supplier while it runs, or from an action if
    /// the state has no supplier. With `changes_only`, writing the current
    /// value does nothing at all.
    pub fn update(&self, graph: &mut Graph, value: T, changes_only: bool) -> GraphResult<()> {
        let event = graph.prepare_update(self.id)?;
        if changes_only && *self.value(graph) == value {
            return Ok(());
        }

        self.cell_mut(graph).history.push(StateEntry { value, event });
        graph.resource_updated(self.id);
        Ok(())
    }

    /// Update from a new action named after the state.
    pub fn update_with_action(
        &self,
        graph: &mut Graph,
        value: T,
        changes_only: bool,
    ) -> GraphResult<()> {
        let state = *self;
        let impulse = match graph.resource_name(self.id) {
            Some(name) => format!("update {name}"),
            None => format!("update {}", self.id),
        };
        graph.action(impulse, move |graph| state.update(graph, value, changes_only))
    }

    pub fn just_updated_to(&self, graph: &Graph, value: &T) -> bool {
        self.just_updated(graph) && self.value(graph) == value
    }

    /// Check if the latest update happened in the open event and replaced
    /// `from`.
    ///
    /// After several updates in one event this compares against the value
    /// the last of them replaced, not the value the event started with. Use
    /// [`State::trace_value`] for the latter.
    pub fn just_updated_from(&self, graph: &Graph, from: &T) -> bool {
        self.just_updated(graph)
            && self
                .cell(graph)
                .replaced()
                .map_or(false, |previous| previous.value == *from)
    }

    pub fn just_updated_to_from(&self, graph: &Graph, to: &T, from: &T) -> bool {
        self.just_updated_to(graph, to) && self.just_updated_from(graph, from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Extent;

    fn entry(value: i32, sequence: u64) -> StateEntry<i32> {
        StateEntry {
            value,
            event: GraphEvent::new(sequence, 0, None),
        }
    }

    #[test]
    fn clear_trims_to_retained_length() {
        let mut cell = StateCell::new(0, 2);
        cell.history.push(entry(1, 1));
        cell.history.push(entry(2, 2));

        cell.clear();

        let values: Vec<i32> = cell.history.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn trace_skips_entries_from_the_open_event() {
        let mut cell = StateCell::new(0, 1);
        cell.history.push(entry(5, 3));
        cell.history.push(entry(6, 3));

        assert_eq!(cell.trace(3).value, 0);
        assert_eq!(cell.trace(4).value, 6);
    }

    #[test]
    fn discard_drops_failed_entries_only() {
        let mut cell = StateCell::new(0, 1);
        cell.history.push(entry(1, 1));
        cell.history.push(entry(2, 2));

        cell.discard(2);

        assert_eq!(cell.current().value, 1);
        assert_eq!(cell.history.len(), 2);
    }

    #[test]
    fn starts_with_initial_event() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        let state = extent.state(&mut graph, 7);

        assert_eq!(*state.value(&graph), 7);
        assert_eq!(state.event(&graph), &GraphEvent::initial());
        assert!(!state.just_updated(&graph));
        assert!(matches!(
            state.trace(&graph),
            Err(GraphError::InvalidTraceAccess { resource }) if resource == state.id()
        ));
    }

    #[test]
    fn update_outside_an_event_is_rejected() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        let state = extent.state(&mut graph, 0);

        assert!(matches!(
            state.update(&mut graph, 1, false),
            Err(GraphError::InvalidUpdateContext { .. })
        ));
        assert_eq!(*state.value(&graph), 0);
    }

    #[test]
    fn history_at_finds_value_as_of_an_event() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        let state = extent.state_with_history(&mut graph, 0, 4);

        state.update_with_action(&mut graph, 10, false).unwrap();
        let first = graph.last_event().clone();
        state.update_with_action(&mut graph, 20, false).unwrap();

        assert_eq!(state.history_at(&graph, &first).map(|e| e.value), Some(10));
        assert_eq!(
            state
                .history_at(&graph, &GraphEvent::initial())
                .map(|e| e.value),
            Some(0)
        );
        assert_eq!(*state.value(&graph), 20);
    }

    #[test]
    fn update_with_action_uses_the_state_name() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        let state = extent.state_named(&mut graph, "counter", 0);

        state.update_with_action(&mut graph, 1, true).unwrap();

        assert_eq!(graph.last_event().impulse(), Some("update counter"));
        assert_eq!(state.event(&graph), graph.last_event());
    }

    #[test]
    fn just_updated_from_compares_with_the_replaced_value() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        let state = extent.state(&mut graph, 1);

        graph
            .action("twice", move |graph| {
                state.update(graph, 2, true)?;
                assert!(state.just_updated_from(graph, &1));
                state.update(graph, 3, true)?;
                assert!(state.just_updated_from(graph, &2));
                assert!(!state.just_updated_from(graph, &1));
                assert!(state.just_updated_to_from(graph, &3, &2));
                assert_eq!(*state.trace_value(graph)?, 1);
                Ok(())
            })
            .unwrap();

        assert!(!state.just_updated_from(&graph, &2));
    }
}
