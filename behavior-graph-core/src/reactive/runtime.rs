//! Graph Runtime
//!
//! The `Graph` is the central coordinator. It owns every resource, behavior
//! and extent, and drives one event at a time from stimulus to settled state.
//!
//! # How It Works
//!
//! Each pass of the event loop does the first thing on this list that
//! applies, then starts over:
//!
//! 1. If behaviors are activated or links are pending: install new
//!    behaviors, supplies and demands, re-rank what moved, then run the
//!    lowest-ranked activated behavior.
//! 2. Else if a side effect is queued: run it.
//! 3. Else if an event is open: clear transient resources, commit the event
//!    as the last one, and close it.
//! 4. Else if an action is queued (or a completion was posted): open a new
//!    event and run the action.
//! 5. Else: return.
//!
//! Updating a resource never runs anything directly. It only activates the
//! resource's subsequents, which the loop later runs in rank order. A
//! behavior therefore runs once per event no matter how many of its demands
//! changed, and always after every behavior it depends on.
//!
//! # Failure
//!
//! Any error stops the loop. Before returning it, the graph throws away all
//! in-flight work: the open event, queued actions and effects, activated
//! behaviors and pending links. Values written during the failed event are
//! rolled back, extents admitted or removed in it are put back the way they
//! were, and the next event reuses the failed sequence number. The next
//! action starts from the last settled state.

use std::collections::VecDeque;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::behavior::Behavior;
use super::context::{ExecutionContext, Phase};
use super::effect::{Action, Completion, SideEffect};
use super::extent::Extent;
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};
use crate::event::{Clock, GraphEvent, SystemClock};
use crate::graph::{BehaviorId, BufferedQueue, ExtentId, GraphSnapshot, ResourceId, Scheduler};

/// Structural change made by the open event, kept so a failure can undo it.
#[derive(Debug)]
enum ExtentChange {
    Added(ExtentId),
    Removed {
        extent: ExtentId,
        added_at: u64,
        stripped: Vec<(BehaviorId, ResourceId)>,
    },
}

/// A behavior graph and its event loop.
///
/// # Example
///
/// ```rust
/// use behavior_graph_core::{Extent, Graph};
///
/// let mut graph = Graph::new();
/// let login = Extent::named(&mut graph, "login");
/// let email = login.state(&mut graph, String::new());
/// let valid = login.state(&mut graph, false);
/// login.make_behavior(&mut graph, &[email.id()], &[valid.id()], move |graph, _| {
///     let ok = email.value(graph).contains('@');
///     valid.update(graph, ok, true)
/// });
///
/// login.add_to_graph_with_action(&mut graph).unwrap();
/// email.update_with_action(&mut graph, "a@b.com".to_string(), true).unwrap();
/// assert!(*valid.value(&graph));
/// ```
pub struct Graph {
    config: GraphConfig,
    clock: Box<dyn Clock>,

    pub(crate) scheduler: Scheduler,
    context: ExecutionContext,
    last_event: GraphEvent,

    activated: BufferedQueue<BehaviorId>,
    effects: VecDeque<SideEffect>,
    actions: VecDeque<Action>,
    completions: Completion,

    /// Resources updated in the open event.
    transients: Vec<ResourceId>,

    /// `last_run` of each behavior run in the open event, before it ran.
    previous_runs: Vec<(BehaviorId, Option<u64>)>,

    extent_changes: Vec<ExtentChange>,

    /// Set while the loop is on the stack, so nested submissions only queue.
    draining: bool,
}

impl Graph {
    /// Create a graph with default configuration and the system clock.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default(), SystemClock)
    }

    /// Create a graph with the given configuration and time source.
    pub fn with_config(config: GraphConfig, clock: impl Clock + 'static) -> Self {
        Self {
            config,
            clock: Box::new(clock),
            scheduler: Scheduler::new(),
            context: ExecutionContext::default(),
            last_event: GraphEvent::initial(),
            activated: BufferedQueue::new(),
            effects: VecDeque::new(),
            actions: VecDeque::new(),
            completions: Completion::default(),
            transients: Vec::new(),
            previous_runs: Vec::new(),
            extent_changes: Vec::new(),
            draining: false,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The open event, if any.
    pub fn current_event(&self) -> Option<&GraphEvent> {
        self.context.current_event()
    }

    /// The most recently committed event.
    pub fn last_event(&self) -> &GraphEvent {
        &self.last_event
    }

    /// What the loop is running right now.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Submit an action and run the loop until the graph settles.
    ///
    /// Called from inside a running event (an action, behavior or effect),
    /// the action is only queued: it runs as its own event after the current
    /// one closes, and this call returns immediately.
    pub fn action<F>(&mut self, impulse: impl Into<String>, block: F) -> GraphResult<()>
    where
        F: FnOnce(&mut Graph) -> GraphResult<()> + 'static,
    {
        self.actions.push_back(Action {
            impulse: impulse.into(),
            block: Box::new(block),
        });
        self.run_loop()
    }

    /// Submit an action, running the loop only if no event is in progress.
    pub fn action_async<F>(&mut self, impulse: impl Into<String>, block: F) -> GraphResult<()>
    where
        F: FnOnce(&mut Graph) -> GraphResult<()> + 'static,
    {
        self.actions.push_back(Action {
            impulse: impulse.into(),
            block: Box::new(block),
        });
        if self.context.current_event().is_none() {
            self.run_loop()
        } else {
            Ok(())
        }
    }

    /// Handle for posting actions from outside the loop, e.g. when an
    /// asynchronous call started by a side effect finishes.
    pub fn completion(&self) -> Completion {
        self.completions.clone()
    }

    /// Run every action posted through a [`Completion`].
    pub fn process_completions(&mut self) -> GraphResult<()> {
        self.run_loop()
    }

    /// Queue a side effect to run once propagation settles.
    pub fn side_effect<F>(&mut self, extent: Extent, name: Option<&str>, block: F) -> GraphResult<()>
    where
        F: FnOnce(&mut Graph, Extent) -> GraphResult<()> + 'static,
    {
        if self.context.current_event().is_none() {
            return Err(GraphError::EffectOutsideEvent);
        }
        self.effects.push_back(SideEffect {
            name: name.map(str::to_owned),
            extent,
            block: Box::new(block),
        });
        Ok(())
    }

    /// Admit an extent and everything it owns.
    ///
    /// Resources become demandable immediately. Behavior links are installed
    /// on the next pass of the loop, after which every new behavior runs once.
    pub fn add_extent(&mut self, extent: Extent) -> GraphResult<()> {
        if self.scheduler.extent(extent.id()).added_at.is_some() {
            return Err(GraphError::AlreadyInGraph {
                extent: extent.id(),
            });
        }
        let sequence = self.context.require_structural("adding an extent")?;

        let node = self.scheduler.extent_mut(extent.id());
        node.added_at = Some(sequence);
        let resources = node.resources.clone();
        let behaviors = node.behaviors.clone();

        for resource in resources {
            self.scheduler.resource_mut(resource).added = true;
        }
        for &behavior in &behaviors {
            self.scheduler.track_behavior(behavior);
        }
        self.extent_changes.push(ExtentChange::Added(extent.id()));

        debug!(
            graph = self.label(),
            extent = %extent.id(),
            behaviors = behaviors.len(),
            sequence,
            "extent added"
        );
        Ok(())
    }

    /// Remove an extent. Removing one that is not in the graph does nothing.
    pub fn remove_extent(&mut self, extent: Extent) -> GraphResult<()> {
        let sequence = self.context.require_structural("removing an extent")?;

        let node = self.scheduler.extent_mut(extent.id());
        let Some(added_at) = node.added_at.take() else {
            return Ok(());
        };
        let resources = node.resources.clone();
        let behaviors = node.behaviors.clone();

        for resource in resources {
            self.scheduler.resource_mut(resource).added = false;
        }
        for &behavior in &behaviors {
            self.scheduler.remember_links(behavior);
        }
        let mut stripped = Vec::new();
        for behavior in behaviors {
            stripped.extend(self.scheduler.remove_behavior(behavior, sequence));
        }
        self.extent_changes.push(ExtentChange::Removed {
            extent: extent.id(),
            added_at,
            stripped,
        });

        debug!(graph = self.label(), extent = %extent.id(), sequence, "extent removed");
        Ok(())
    }

    /// Request a new demand set for a behavior.
    pub fn set_demands(&mut self, behavior: Behavior, demands: &[ResourceId]) -> GraphResult<()> {
        self.require_added(behavior.id())?;
        self.context.require_structural("updating demands")?;
        self.scheduler.request_demands(behavior.id(), demands.to_vec());
        Ok(())
    }

    /// Request a new supply set for a behavior.
    pub fn set_supplies(&mut self, behavior: Behavior, supplies: &[ResourceId]) -> GraphResult<()> {
        self.require_added(behavior.id())?;
        self.context.require_structural("updating supplies")?;
        self.scheduler.request_supplies(behavior.id(), supplies.to_vec());
        Ok(())
    }

    /// The behavior currently supplying a resource.
    pub fn supplier_of(&self, resource: ResourceId) -> Option<Behavior> {
        self.scheduler
            .resource(resource)
            .supplied_by
            .map(Behavior::from_id)
    }

    /// Sequence of the last event a behavior ran in.
    pub fn behavior_last_run(&self, behavior: Behavior) -> Option<u64> {
        self.scheduler.behavior(behavior.id()).last_run
    }

    /// Check if a resource belongs to the graph.
    pub fn is_resource_added(&self, resource: ResourceId) -> bool {
        self.scheduler.resource(resource).added
    }

    /// Debug name of a resource, if it has one.
    pub fn resource_name(&self, resource: ResourceId) -> Option<&str> {
        self.scheduler.resource(resource).name.as_deref()
    }

    /// Serializable picture of the current topology.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(
            &self.scheduler,
            &self.last_event,
            self.context.current_event(),
        )
    }

    fn require_added(&self, behavior: BehaviorId) -> GraphResult<()> {
        if self.scheduler.behavior(behavior).added {
            Ok(())
        } else {
            Err(GraphError::BehaviorNotAdded { behavior })
        }
    }

    fn label(&self) -> &str {
        self.config.label.as_deref().unwrap_or("graph")
    }

    /// Validate an update and return the event to stamp it with.
    pub(crate) fn prepare_update(&self, resource: ResourceId) -> GraphResult<GraphEvent> {
        let supplier = self.scheduler.resource(resource).supplied_by;
        self.context.check_updater(resource, supplier)?;
        self.context
            .current_event()
            .cloned()
            .ok_or(GraphError::NoOpenEvent {
                operation: "updating a resource",
            })
    }

    /// Record a real update: activate subsequents and schedule the resource
    /// for clearing when the event closes.
    pub(crate) fn resource_updated(&mut self, resource: ResourceId) {
        if let Some(sequence) = self.context.current_sequence() {
            let subsequents: SmallVec<[BehaviorId; 8]> = self
                .scheduler
                .resource(resource)
                .subsequents
                .iter()
                .copied()
                .collect();
            for behavior in subsequents {
                self.activate(behavior, sequence);
            }
        }
        self.transients.push(resource);
    }

    fn activate(&mut self, id: BehaviorId, sequence: u64) {
        let behavior = self.scheduler.behavior_mut(id);
        if behavior.enqueued_at.map_or(true, |at| at < sequence) {
            behavior.enqueued_at = Some(sequence);
            self.activated.push(id);
            trace!(behavior = %id, sequence, "behavior activated");
        }
    }

    fn run_loop(&mut self) -> GraphResult<()> {
        if self.draining {
            return Ok(());
        }

        self.draining = true;
        let result = self.drain();
        self.draining = false;

        if let Err(err) = &result {
            warn!(graph = self.label(), error = %err, "event failed; resetting graph");
            self.reset();
        }
        result
    }

    fn drain(&mut self) -> GraphResult<()> {
        loop {
            if !self.activated.is_empty() || self.scheduler.has_pending_links() {
                let sequence =
                    self.context
                        .current_sequence()
                        .ok_or(GraphError::NoOpenEvent {
                            operation: "running behaviors",
                        })?;

                for behavior in self.scheduler.take_untracked() {
                    self.activate(behavior, sequence);
                }
                self.scheduler.install_supplies()?;
                for behavior in self.scheduler.install_demands()? {
                    self.activate(behavior, sequence);
                }
                if self.scheduler.order_behaviors()? {
                    self.activated.unsort();
                }
                self.run_next_behavior(sequence)?;
                continue;
            }

            if let Some(effect) = self.effects.pop_front() {
                self.run_effect(effect)?;
                continue;
            }

            if self.context.current_event().is_some() {
                self.close_event();
                continue;
            }

            let next = self
                .actions
                .pop_front()
                .or_else(|| self.completions.take_next());
            if let Some(action) = next {
                self.open_event(action)?;
                continue;
            }

            return Ok(());
        }
    }

    fn run_next_behavior(&mut self, sequence: u64) -> GraphResult<()> {
        let scheduler = &self.scheduler;
        let Some(id) = self.activated.pop(|id| scheduler.order(*id)) else {
            return Ok(());
        };

        let behavior = self.scheduler.behavior_mut(id);
        if behavior.removed_at == Some(sequence) {
            trace!(behavior = %id, "skipping removed behavior");
            return Ok(());
        }
        let previous_run = behavior.last_run.replace(sequence);
        let block = Rc::clone(&behavior.block);
        let extent = Extent::from_id(behavior.extent);
        trace!(behavior = %id, order = behavior.order, sequence, "running behavior");
        self.previous_runs.push((id, previous_run));

        let previous = self.context.enter(Phase::Behavior(id));
        let result = block(self, extent);
        self.context.restore(previous);
        result
    }

    fn run_effect(&mut self, effect: SideEffect) -> GraphResult<()> {
        trace!(effect = effect.name.as_deref().unwrap_or("<unnamed>"), "running side effect");

        let previous = self.context.enter(Phase::SideEffect);
        let result = (effect.block)(self, effect.extent);
        self.context.restore(previous);
        result
    }

    fn open_event(&mut self, action: Action) -> GraphResult<()> {
        let event = GraphEvent::new(
            self.last_event.sequence() + 1,
            self.clock.now_millis(),
            Some(action.impulse),
        );
        debug!(
            graph = self.label(),
            sequence = event.sequence(),
            impulse = event.impulse().unwrap_or_default(),
            "event opened"
        );
        self.context.open(event);

        let previous = self.context.enter(Phase::Action);
        let result = (action.block)(self);
        self.context.restore(previous);
        result
    }

    fn close_event(&mut self) {
        for resource in std::mem::take(&mut self.transients) {
            self.scheduler.resource_mut(resource).cell.clear();
        }
        self.previous_runs.clear();
        self.extent_changes.clear();
        if let Some(event) = self.context.close() {
            debug!(graph = self.label(), sequence = event.sequence(), "event closed");
            self.last_event = event;
        }
    }

    /// Revert extent admissions and removals of the failed event, newest
    /// first. Returns the behaviors whose links were put back.
    fn undo_extent_changes(&mut self) -> Vec<BehaviorId> {
        let mut moved = Vec::new();

        for change in std::mem::take(&mut self.extent_changes).into_iter().rev() {
            match change {
                ExtentChange::Added(extent) => {
                    let node = self.scheduler.extent_mut(extent);
                    node.added_at = None;
                    let resources = node.resources.clone();
                    let behaviors = node.behaviors.clone();

                    for resource in resources {
                        self.scheduler.resource_mut(resource).added = false;
                    }
                    for &behavior in &behaviors {
                        self.scheduler.remember_links(behavior);
                    }
                    for behavior in behaviors {
                        let stripped = self.scheduler.detach_behavior(behavior);
                        moved.extend(stripped.into_iter().map(|(subsequent, _)| subsequent));
                    }
                    debug!(graph = self.label(), extent = %extent, "extent admission undone");
                }
                ExtentChange::Removed {
                    extent,
                    added_at,
                    stripped,
                } => {
                    let node = self.scheduler.extent_mut(extent);
                    node.added_at = Some(added_at);
                    let resources = node.resources.clone();
                    let behaviors = node.behaviors.clone();

                    for resource in resources {
                        self.scheduler.resource_mut(resource).added = true;
                    }
                    for &behavior in &behaviors {
                        self.scheduler.restore_behavior(behavior);
                    }
                    moved.extend(behaviors);
                    for (subsequent, resource) in stripped {
                        self.scheduler.restore_demand(subsequent, resource);
                        moved.push(subsequent);
                    }
                    debug!(graph = self.label(), extent = %extent, "extent removal undone");
                }
            }
        }
        moved
    }

    /// Throw away in-flight work after a failure.
    fn reset(&mut self) {
        let failed = self.context.close();

        self.actions.clear();
        self.effects.clear();
        self.activated.clear();

        // Admissions must be undone before pending requests are dropped, or
        // their behaviors would lose the links they were built with.
        let moved = self.undo_extent_changes();
        self.scheduler.reset_pending();
        if let Err(err) = self.scheduler.rerank(&moved) {
            warn!(graph = self.label(), error = %err, "could not re-rank restored behaviors");
            self.scheduler.reset_pending();
        }

        let transients = std::mem::take(&mut self.transients);
        if let Some(event) = failed {
            // The next event reuses this sequence number.
            let sequence = event.sequence();
            for &resource in &transients {
                self.scheduler.resource_mut(resource).cell.discard(sequence);
            }
            for behavior in &mut self.scheduler.behaviors {
                if behavior.enqueued_at == Some(sequence) {
                    behavior.enqueued_at = None;
                }
            }
        }
        for (behavior, previous_run) in self.previous_runs.drain(..).rev() {
            self.scheduler.behavior_mut(behavior).last_run = previous_run;
        }
        for resource in transients {
            self.scheduler.resource_mut(resource).cell.clear();
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("label", &self.config.label)
            .field("last_event", &self.last_event)
            .field("current_event", &self.context.current_event())
            .field("activated", &self.activated.len())
            .field("effects", &self.effects.len())
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}
