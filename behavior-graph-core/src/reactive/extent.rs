//! Extents
//!
//! An extent is the unit of ownership in a graph. Resources and behaviors are
//! created through an extent and join or leave the graph together with it.
//!
//! Creating things never needs an event. Admitting or removing the extent
//! does, so the graph can install or tear down all of its links atomically.
//! The `*_with_action` variants open that event themselves.

use std::rc::Rc;

use super::behavior::Behavior;
use super::moment::Moment;
use super::runtime::Graph;
use super::state::State;
use crate::error::{GraphError, GraphResult};
use crate::graph::{BehaviorFn, ExtentId, ResourceId};

/// Handle to an extent in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    id: ExtentId,
}

impl Extent {
    /// Create an unnamed extent.
    pub fn new(graph: &mut Graph) -> Self {
        Self::from_id(graph.scheduler.add_extent(None))
    }

    /// Create an extent with a debug name.
    pub fn named(graph: &mut Graph, name: impl Into<String>) -> Self {
        Self::from_id(graph.scheduler.add_extent(Some(name.into())))
    }

    pub(crate) fn from_id(id: ExtentId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> ExtentId {
        self.id
    }

    pub fn name<'g>(&self, graph: &'g Graph) -> Option<&'g str> {
        graph.scheduler.extent(self.id).name.as_deref()
    }

    pub fn is_added(&self, graph: &Graph) -> bool {
        self.added_at(graph).is_some()
    }

    /// Sequence of the event that admitted this extent.
    pub fn added_at(&self, graph: &Graph) -> Option<u64> {
        graph.scheduler.extent(self.id).added_at
    }

    /// Create a state owned by this extent, keeping the graph's configured
    /// history length.
    pub fn state<T: 'static>(&self, graph: &mut Graph, initial: T) -> State<T> {
        let retain = graph.config().effective_retention();
        State::create(graph, self.id, None, initial, retain)
    }

    pub fn state_named<T: 'static>(
        &self,
        graph: &mut Graph,
        name: impl Into<String>,
        initial: T,
    ) -> State<T> {
        let retain = graph.config().effective_retention();
        State::create(graph, self.id, Some(name.into()), initial, retain)
    }

    /// Create a state that keeps `retain` history entries between events.
    pub fn state_with_history<T: 'static>(
        &self,
        graph: &mut Graph,
        initial: T,
        retain: usize,
    ) -> State<T> {
        State::create(graph, self.id, None, initial, retain)
    }

    pub fn moment<T: 'static>(&self, graph: &mut Graph) -> Moment<T> {
        Moment::create(graph, self.id, None)
    }

    pub fn moment_named<T: 'static>(&self, graph: &mut Graph, name: impl Into<String>) -> Moment<T> {
        Moment::create(graph, self.id, Some(name.into()))
    }

    /// Create a behavior owned by this extent.
    ///
    /// It joins the graph, and runs for the first time, in the event that
    /// admits the extent.
    pub fn make_behavior<F>(
        &self,
        graph: &mut Graph,
        demands: &[ResourceId],
        supplies: &[ResourceId],
        block: F,
    ) -> Behavior
    where
        F: Fn(&mut Graph, Extent) -> GraphResult<()> + 'static,
    {
        self.create_behavior(graph, None, demands, supplies, Rc::new(block))
    }

    pub fn make_behavior_named<F>(
        &self,
        graph: &mut Graph,
        name: impl Into<String>,
        demands: &[ResourceId],
        supplies: &[ResourceId],
        block: F,
    ) -> Behavior
    where
        F: Fn(&mut Graph, Extent) -> GraphResult<()> + 'static,
    {
        self.create_behavior(graph, Some(name.into()), demands, supplies, Rc::new(block))
    }

    fn create_behavior(
        &self,
        graph: &mut Graph,
        name: Option<String>,
        demands: &[ResourceId],
        supplies: &[ResourceId],
        block: Rc<BehaviorFn>,
    ) -> Behavior {
        let id = graph.scheduler.add_behavior(
            self.id,
            name,
            demands.to_vec(),
            supplies.to_vec(),
            block,
        );
        Behavior::from_id(id)
    }

    /// Admit this extent within the open event.
    pub fn add_to_graph(&self, graph: &mut Graph) -> GraphResult<()> {
        graph.add_extent(*self)
    }

    /// Admit this extent in a new action.
    pub fn add_to_graph_with_action(&self, graph: &mut Graph) -> GraphResult<()> {
        let extent = *self;
        let impulse = self.impulse(graph, "add extent");
        graph.action(impulse, move |graph| graph.add_extent(extent))
    }

    /// Remove this extent within the open event.
    pub fn remove_from_graph(&self, graph: &mut Graph) -> GraphResult<()> {
        graph.remove_extent(*self)
    }

    /// Remove this extent in a new action.
    pub fn remove_from_graph_with_action(&self, graph: &mut Graph) -> GraphResult<()> {
        let extent = *self;
        let impulse = self.impulse(graph, "remove extent");
        graph.action(impulse, move |graph| graph.remove_extent(extent))
    }

    /// Queue a side effect. Does nothing while the extent is not in the graph.
    pub fn side_effect<F>(&self, graph: &mut Graph, name: Option<&str>, block: F) -> GraphResult<()>
    where
        F: FnOnce(&mut Graph, Extent) -> GraphResult<()> + 'static,
    {
        if !self.is_added(graph) {
            return Ok(());
        }
        graph.side_effect(*self, name, block)
    }

    /// Submit an action on behalf of this extent.
    pub fn action<F>(&self, graph: &mut Graph, impulse: impl Into<String>, block: F) -> GraphResult<()>
    where
        F: FnOnce(&mut Graph) -> GraphResult<()> + 'static,
    {
        self.require_added(graph)?;
        graph.action(impulse, block)
    }

    pub fn action_async<F>(
        &self,
        graph: &mut Graph,
        impulse: impl Into<String>,
        block: F,
    ) -> GraphResult<()>
    where
        F: FnOnce(&mut Graph) -> GraphResult<()> + 'static,
    {
        self.require_added(graph)?;
        graph.action_async(impulse, block)
    }

    fn require_added(&self, graph: &Graph) -> GraphResult<()> {
        if self.is_added(graph) {
            Ok(())
        } else {
            Err(GraphError::ExtentNotAdded { extent: self.id })
        }
    }

    fn impulse(&self, graph: &Graph, verb: &str) -> String {
        match self.name(graph) {
            Some(name) => format!("{verb}: {name}"),
            None => format!("{verb}: {}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    #[test]
    fn resources_register_with_their_extent() {
        let mut graph = Graph::new();
        let extent = Extent::named(&mut graph, "form");
        let name = extent.state(&mut graph, String::new());
        let submit: crate::reactive::Moment = extent.moment(&mut graph);
        let behavior = extent.make_behavior(&mut graph, &[name.id()], &[], |_, _| Ok(()));

        let node = graph.scheduler.extent(extent.id());
        assert_eq!(node.resources, vec![name.id(), submit.id()]);
        assert_eq!(node.behaviors, vec![behavior.id()]);
        assert!(!behavior.is_added(&graph));
        assert!(!name.is_added(&graph));
    }

    #[test]
    fn add_with_action_is_labelled_and_admits() {
        let mut graph = Graph::new();
        let extent = Extent::named(&mut graph, "form");
        let name = extent.state(&mut graph, 0);

        extent.add_to_graph_with_action(&mut graph).unwrap();

        assert_eq!(graph.last_event().impulse(), Some("add extent: form"));
        assert_eq!(extent.added_at(&graph), Some(1));
        assert!(name.is_added(&graph));
    }

    #[test]
    fn admitting_twice_fails() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        extent.add_to_graph_with_action(&mut graph).unwrap();

        let err = extent.add_to_graph_with_action(&mut graph).unwrap_err();
        assert!(matches!(err, GraphError::AlreadyInGraph { extent: id } if id == extent.id()));
        assert!(extent.is_added(&graph));
    }

    #[test]
    fn extent_actions_need_the_extent_in_the_graph() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);

        let err = extent.action(&mut graph, "early", |_| Ok(())).unwrap_err();
        assert!(matches!(err, GraphError::ExtentNotAdded { .. }));

        extent.add_to_graph_with_action(&mut graph).unwrap();
        extent.action(&mut graph, "later", |_| Ok(())).unwrap();
        assert_eq!(graph.last_event().impulse(), Some("later"));
    }

    #[test]
    fn side_effects_of_unadded_extents_are_dropped() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        let ran = Rc::new(Cell::new(false));

        let flag = ran.clone();
        graph
            .action("effect", move |graph| {
                extent.side_effect(graph, None, move |_, _| {
                    flag.set(true);
                    Ok(())
                })
            })
            .unwrap();

        assert!(!ran.get());
    }

    #[test]
    fn side_effects_of_removed_extents_are_dropped() {
        let mut graph = Graph::new();
        let extent = Extent::new(&mut graph);
        extent.add_to_graph_with_action(&mut graph).unwrap();
        let ran = Rc::new(RefCell::new(Vec::new()));

        let log = ran.clone();
        graph
            .action("remove then effect", move |graph| {
                let before = log.clone();
                extent.side_effect(graph, Some("queued while added"), move |_, _| {
                    before.borrow_mut().push("before");
                    Ok(())
                })?;
                extent.remove_from_graph(graph)?;
                let after = log.clone();
                extent.side_effect(graph, Some("queued after removal"), move |_, _| {
                    after.borrow_mut().push("after");
                    Ok(())
                })
            })
            .unwrap();

        // Only the extent's membership when the effect is queued matters.
        assert_eq!(*ran.borrow(), vec!["before"]);
        assert!(!extent.is_added(&graph));
    }
}
