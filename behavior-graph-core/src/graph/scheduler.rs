//! Scheduler
//!
//! The scheduler owns the dependency graph arenas and keeps behavior orders
//! consistent as edges change.
//!
//! # Algorithm
//!
//! Edge changes are never applied in place. They are buffered on the behavior
//! and installed at a phase boundary of the event loop, in this order:
//!
//! 1. Newly admitted behaviors are scheduled for link installation.
//! 2. Supply changes are installed. Every behavior whose supplies changed is
//!    queued for re-ordering, since its subsequents may now need to rank
//!    after it.
//! 3. Demand changes are installed. A behavior is queued for re-ordering if
//!    it was never ordered, or if a newly demanded resource is supplied by a
//!    behavior ranked at or above it.
//! 4. The ordering pass runs:
//!    - Everything reachable downstream of a queued behavior is invalidated
//!      (breadth first, through supplies and their subsequents).
//!    - Each invalidated behavior is ranked depth first:
//!      `order = 1 + max(order of each demand's supplier)`, or 0 with no
//!      supplied demands. Meeting a behavior already on the ranking stack
//!      is a dependency cycle.
//!
//! If any rank changed, the caller must re-sort its activation queue.

use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::trace;

use super::node::{
    BehaviorFn, BehaviorId, BehaviorNode, ExtentId, ExtentNode, OrderingState, ResourceCell,
    ResourceId, ResourceNode,
};
use crate::error::{GraphError, GraphResult};

/// Owns every resource, behavior and extent, and their pending link changes.
#[derive(Debug, Default)]
pub struct Scheduler {
    pub(crate) resources: Vec<ResourceNode>,
    pub(crate) behaviors: Vec<BehaviorNode>,
    pub(crate) extents: Vec<ExtentNode>,

    /// Admitted behaviors whose links have not been installed yet.
    untracked: Vec<BehaviorId>,
    modified_demands: Vec<BehaviorId>,
    modified_supplies: Vec<BehaviorId>,
    needs_ordering: Vec<BehaviorId>,
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_extent(&mut self, name: Option<String>) -> ExtentId {
        let id = ExtentId::from_index(self.extents.len());
        self.extents.push(ExtentNode {
            name,
            ..ExtentNode::default()
        });
        id
    }

    pub(crate) fn add_resource(
        &mut self,
        extent: ExtentId,
        name: Option<String>,
        cell: Box<dyn ResourceCell>,
    ) -> ResourceId {
        let id = ResourceId::from_index(self.resources.len());
        self.resources.push(ResourceNode::new(extent, name, cell));
        self.extents[extent.index()].resources.push(id);
        id
    }

    pub(crate) fn add_behavior(
        &mut self,
        extent: ExtentId,
        name: Option<String>,
        demands: Vec<ResourceId>,
        supplies: Vec<ResourceId>,
        block: Rc<BehaviorFn>,
    ) -> BehaviorId {
        let id = BehaviorId::from_index(self.behaviors.len());
        self.behaviors
            .push(BehaviorNode::new(extent, name, demands, supplies, block));
        self.extents[extent.index()].behaviors.push(id);
        id
    }

    pub(crate) fn resource(&self, id: ResourceId) -> &ResourceNode {
        &self.resources[id.index()]
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> &mut ResourceNode {
        &mut self.resources[id.index()]
    }

    pub(crate) fn behavior(&self, id: BehaviorId) -> &BehaviorNode {
        &self.behaviors[id.index()]
    }

    pub(crate) fn behavior_mut(&mut self, id: BehaviorId) -> &mut BehaviorNode {
        &mut self.behaviors[id.index()]
    }

    pub(crate) fn extent(&self, id: ExtentId) -> &ExtentNode {
        &self.extents[id.index()]
    }

    pub(crate) fn extent_mut(&mut self, id: ExtentId) -> &mut ExtentNode {
        &mut self.extents[id.index()]
    }

    /// Current rank of a behavior.
    pub fn order(&self, id: BehaviorId) -> usize {
        self.behaviors[id.index()].order
    }

    /// Check if any link change or re-ordering is waiting.
    pub fn has_pending_links(&self) -> bool {
        !self.untracked.is_empty()
            || !self.modified_demands.is_empty()
            || !self.modified_supplies.is_empty()
            || !self.needs_ordering.is_empty()
    }

    /// Mark a behavior as part of the graph. Its links are installed on the
    /// next pass.
    pub(crate) fn track_behavior(&mut self, id: BehaviorId) {
        let behavior = &mut self.behaviors[id.index()];
        behavior.added = true;
        behavior.removed_at = None;
        self.untracked.push(id);
    }

    /// Hand newly admitted behaviors to the installers and return them so the
    /// caller can activate them.
    pub(crate) fn take_untracked(&mut self) -> Vec<BehaviorId> {
        let untracked: Vec<BehaviorId> = std::mem::take(&mut self.untracked)
            .into_iter()
            .filter(|id| self.behaviors[id.index()].added)
            .collect();
        for &id in &untracked {
            self.modified_demands.push(id);
            self.modified_supplies.push(id);
        }
        untracked
    }

    pub(crate) fn request_demands(&mut self, id: BehaviorId, demands: Vec<ResourceId>) {
        self.behaviors[id.index()].pending_demands = Some(demands);
        self.modified_demands.push(id);
    }

    pub(crate) fn request_supplies(&mut self, id: BehaviorId, supplies: Vec<ResourceId>) {
        self.behaviors[id.index()].pending_supplies = Some(supplies);
        self.modified_supplies.push(id);
    }

    /// Install pending supply sets.
    pub(crate) fn install_supplies(&mut self) -> GraphResult<()> {
        for id in std::mem::take(&mut self.modified_supplies) {
            let behavior = &self.behaviors[id.index()];
            if !behavior.added {
                continue;
            }
            let Some(requested) = behavior.pending_supplies.as_ref() else {
                continue;
            };

            for &supply in requested {
                if let Some(existing) = self.resources[supply.index()].supplied_by {
                    if existing != id {
                        return Err(GraphError::MultipleSuppliers {
                            resource: supply,
                            existing,
                            desired: id,
                        });
                    }
                }
            }
            let requested = self.behaviors[id.index()]
                .pending_supplies
                .take()
                .unwrap_or_default();

            for supply in std::mem::take(&mut self.behaviors[id.index()].supplies) {
                let resource = &mut self.resources[supply.index()];
                if resource.supplied_by == Some(id) {
                    resource.supplied_by = None;
                }
            }

            let mut installed = IndexSet::with_capacity(requested.len());
            for supply in requested {
                self.resources[supply.index()].supplied_by = Some(id);
                installed.insert(supply);
            }
            self.behaviors[id.index()].supplies = installed;

            // Its own rank is unaffected, but ranking it walks its subsequents.
            self.needs_ordering.push(id);
        }
        Ok(())
    }

    /// Install pending demand sets.
    ///
    /// Returns the behaviors whose demands actually changed; they must run
    /// again in this event to reflect their new inputs.
    pub(crate) fn install_demands(&mut self) -> GraphResult<Vec<BehaviorId>> {
        let mut changed = Vec::new();

        for id in std::mem::take(&mut self.modified_demands) {
            let behavior = &self.behaviors[id.index()];
            if !behavior.added {
                continue;
            }
            let Some(requested) = behavior.pending_demands.as_ref() else {
                continue;
            };

            if let Some(&unadded) = requested
                .iter()
                .find(|demand| !self.resources[demand.index()].added)
            {
                return Err(GraphError::UnaddedDemand {
                    behavior: id,
                    resource: unadded,
                });
            }

            let requested: IndexSet<ResourceId> = self.behaviors[id.index()]
                .pending_demands
                .take()
                .unwrap_or_default()
                .into_iter()
                .collect();
            let current = std::mem::take(&mut self.behaviors[id.index()].demands);

            let removed: SmallVec<[ResourceId; 4]> = current
                .iter()
                .filter(|demand| !requested.contains(*demand))
                .copied()
                .collect();
            let added: SmallVec<[ResourceId; 4]> = requested
                .iter()
                .filter(|demand| !current.contains(*demand))
                .copied()
                .collect();

            for demand in &removed {
                self.resources[demand.index()].subsequents.shift_remove(&id);
            }

            let behavior = &self.behaviors[id.index()];
            let own_order = behavior.order;
            let mut needs_ordering = behavior.ordering == OrderingState::Unordered;

            for demand in &added {
                let resource = &mut self.resources[demand.index()];
                resource.subsequents.insert(id);

                if !needs_ordering {
                    if let Some(prior) = resource.supplied_by {
                        let prior = &self.behaviors[prior.index()];
                        if prior.ordering == OrderingState::Ordered && prior.order >= own_order {
                            needs_ordering = true;
                        }
                    }
                }
            }

            self.behaviors[id.index()].demands = requested;

            if needs_ordering {
                self.needs_ordering.push(id);
            }
            if !removed.is_empty() || !added.is_empty() {
                changed.push(id);
            }
        }

        Ok(changed)
    }

    /// Re-rank everything that may have moved.
    ///
    /// Returns true if any behavior's order changed.
    pub(crate) fn order_behaviors(&mut self) -> GraphResult<bool> {
        if self.needs_ordering.is_empty() {
            return Ok(false);
        }

        // Marking them Ordered first means each is traversed when first met.
        let mut traversal = VecDeque::with_capacity(self.needs_ordering.len());
        for id in self.needs_ordering.drain(..) {
            self.behaviors[id.index()].ordering = OrderingState::Ordered;
            traversal.push_back(id);
        }

        let mut needs_ranking = Vec::new();
        while let Some(id) = traversal.pop_front() {
            let behavior = &mut self.behaviors[id.index()];
            if behavior.ordering != OrderingState::Ordered {
                continue;
            }
            behavior.ordering = OrderingState::Unordered;
            needs_ranking.push(id);

            for supply in &self.behaviors[id.index()].supplies {
                traversal.extend(self.resources[supply.index()].subsequents.iter().copied());
            }
        }

        let mut needs_reheap = false;
        for id in needs_ranking {
            self.rank(id, &mut needs_reheap)?;
        }

        trace!(needs_reheap, "ordering pass complete");
        Ok(needs_reheap)
    }

    fn rank(&mut self, id: BehaviorId, needs_reheap: &mut bool) -> GraphResult<()> {
        match self.behaviors[id.index()].ordering {
            OrderingState::Ordered => return Ok(()),
            OrderingState::Ordering => {
                return Err(GraphError::CycleDetected {
                    behavior: id,
                    cycle: self.cycle_for(id),
                });
            }
            OrderingState::Unordered => {}
        }

        self.behaviors[id.index()].ordering = OrderingState::Ordering;

        let suppliers: SmallVec<[BehaviorId; 8]> = self.behaviors[id.index()]
            .demands
            .iter()
            .filter_map(|demand| self.resources[demand.index()].supplied_by)
            .collect();

        let mut order = 0;
        for prior in suppliers {
            if self.behaviors[prior.index()].ordering != OrderingState::Ordered {
                self.rank(prior, needs_reheap)?;
            }
            order = order.max(self.behaviors[prior.index()].order + 1);
        }

        let behavior = &mut self.behaviors[id.index()];
        behavior.ordering = OrderingState::Ordered;
        if behavior.order != order {
            behavior.order = order;
            *needs_reheap = true;
        }
        Ok(())
    }

    /// Resources forming a dependency loop through `target`, in data-flow
    /// order starting with a resource `target` supplies.
    pub(crate) fn cycle_for(&self, target: BehaviorId) -> Vec<ResourceId> {
        let mut stack = Vec::new();
        let mut visited = HashSet::new();
        if self.cycle_search(target, target, &mut stack, &mut visited) {
            stack.reverse();
            stack
        } else {
            Vec::new()
        }
    }

    fn cycle_search(
        &self,
        current: BehaviorId,
        target: BehaviorId,
        stack: &mut Vec<ResourceId>,
        visited: &mut HashSet<BehaviorId>,
    ) -> bool {
        if !visited.insert(current) {
            return false;
        }

        for &demand in &self.behaviors[current.index()].demands {
            stack.push(demand);
            if let Some(supplier) = self.resources[demand.index()].supplied_by {
                if supplier == target || self.cycle_search(supplier, target, stack, visited) {
                    return true;
                }
            }
            stack.pop();
        }
        false
    }

    /// Copy a behavior's installed links into its pending slots, unless a
    /// change is already requested.
    ///
    /// Call this for every behavior of an extent before removing any of
    /// them, so links between siblings survive the removal.
    pub(crate) fn remember_links(&mut self, id: BehaviorId) {
        let behavior = &mut self.behaviors[id.index()];
        if behavior.pending_demands.is_none() {
            behavior.pending_demands = Some(behavior.demands.iter().copied().collect());
        }
        if behavior.pending_supplies.is_none() {
            behavior.pending_supplies = Some(behavior.supplies.iter().copied().collect());
        }
    }

    /// Detach a behavior from every edge and tombstone it.
    ///
    /// Its links are kept as pending so the behavior comes back wired the
    /// same way if its extent is admitted again. Returns the demand edges
    /// stripped from the subsequents of its supplies.
    pub(crate) fn remove_behavior(
        &mut self,
        id: BehaviorId,
        sequence: u64,
    ) -> Vec<(BehaviorId, ResourceId)> {
        let stripped = self.detach_behavior(id);
        self.behaviors[id.index()].removed_at = Some(sequence);
        stripped
    }

    /// Detach a behavior from every edge without tombstoning it.
    pub(crate) fn detach_behavior(&mut self, id: BehaviorId) -> Vec<(BehaviorId, ResourceId)> {
        let mut stripped = Vec::new();
        let supplies = std::mem::take(&mut self.behaviors[id.index()].supplies);
        for &supply in &supplies {
            let resource = &mut self.resources[supply.index()];
            let subsequents = std::mem::take(&mut resource.subsequents);
            if resource.supplied_by == Some(id) {
                resource.supplied_by = None;
            }
            for subsequent in subsequents {
                self.behaviors[subsequent.index()].demands.shift_remove(&supply);
                stripped.push((subsequent, supply));
            }
        }

        let demands = std::mem::take(&mut self.behaviors[id.index()].demands);
        for demand in &demands {
            self.resources[demand.index()].subsequents.shift_remove(&id);
        }

        let behavior = &mut self.behaviors[id.index()];
        behavior
            .pending_demands
            .get_or_insert_with(|| demands.into_iter().collect());
        behavior
            .pending_supplies
            .get_or_insert_with(|| supplies.into_iter().collect());
        behavior.added = false;
        behavior.ordering = OrderingState::Unordered;
        stripped
    }

    /// Put a removed behavior back, linked as its pending slots describe.
    ///
    /// Unlike admission this installs the links on the spot, outside any
    /// event. The behavior is left unordered; see [`Scheduler::rerank`].
    pub(crate) fn restore_behavior(&mut self, id: BehaviorId) {
        let behavior = &mut self.behaviors[id.index()];
        behavior.added = true;
        behavior.removed_at = None;
        let supplies: IndexSet<ResourceId> = behavior
            .pending_supplies
            .take()
            .unwrap_or_default()
            .into_iter()
            .collect();
        let demands: IndexSet<ResourceId> = behavior
            .pending_demands
            .take()
            .unwrap_or_default()
            .into_iter()
            .collect();

        for &supply in &supplies {
            self.resources[supply.index()].supplied_by = Some(id);
        }
        for &demand in &demands {
            self.resources[demand.index()].subsequents.insert(id);
        }

        let behavior = &mut self.behaviors[id.index()];
        behavior.supplies = supplies;
        behavior.demands = demands;
    }

    /// Put back a demand edge stripped by [`Scheduler::remove_behavior`].
    pub(crate) fn restore_demand(&mut self, behavior: BehaviorId, resource: ResourceId) {
        if !self.behaviors[behavior.index()].added {
            return;
        }
        self.behaviors[behavior.index()].demands.insert(resource);
        self.resources[resource.index()].subsequents.insert(behavior);
    }

    /// Rank the given behaviors and everything downstream of them now,
    /// outside the event loop.
    pub(crate) fn rerank(&mut self, ids: &[BehaviorId]) -> GraphResult<bool> {
        for &id in ids {
            if self.behaviors[id.index()].added {
                self.needs_ordering.push(id);
            }
        }
        self.order_behaviors()
    }

    /// Drop pending link work after a failed event.
    pub(crate) fn reset_pending(&mut self) {
        self.untracked.clear();
        self.modified_demands.clear();
        self.modified_supplies.clear();
        self.needs_ordering.clear();

        for behavior in &mut self.behaviors {
            if behavior.ordering == OrderingState::Ordering {
                behavior.ordering = OrderingState::Unordered;
            }
            // Requests made in the failed event. Behaviors outside the graph
            // keep theirs for their next admission.
            if behavior.added {
                behavior.pending_demands = None;
                behavior.pending_supplies = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::graph::node::ResourceKind;

    struct Pulse;

    impl ResourceCell for Pulse {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Moment
        }

        fn clear(&mut self) {}

        fn discard(&mut self, _sequence: u64) {}

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn resource(scheduler: &mut Scheduler, extent: ExtentId) -> ResourceId {
        let id = scheduler.add_resource(extent, None, Box::new(Pulse));
        scheduler.resource_mut(id).added = true;
        id
    }

    fn behavior(
        scheduler: &mut Scheduler,
        extent: ExtentId,
        demands: &[ResourceId],
        supplies: &[ResourceId],
    ) -> BehaviorId {
        let id = scheduler.add_behavior(
            extent,
            None,
            demands.to_vec(),
            supplies.to_vec(),
            Rc::new(|_, _| Ok(())),
        );
        scheduler.track_behavior(id);
        id
    }

    fn settle(scheduler: &mut Scheduler) -> GraphResult<Vec<BehaviorId>> {
        let mut activated = scheduler.take_untracked();
        scheduler.install_supplies()?;
        activated.extend(scheduler.install_demands()?);
        scheduler.order_behaviors()?;
        Ok(activated)
    }

    #[test]
    fn chain_is_ranked_by_depth() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let r1 = resource(&mut scheduler, extent);
        let r2 = resource(&mut scheduler, extent);
        let r3 = resource(&mut scheduler, extent);

        // Added in reverse so ranking cannot rely on insertion order.
        let c = behavior(&mut scheduler, extent, &[r2], &[r3]);
        let b = behavior(&mut scheduler, extent, &[r1], &[r2]);
        let a = behavior(&mut scheduler, extent, &[], &[r1]);

        settle(&mut scheduler).unwrap();

        assert_eq!(scheduler.order(a), 0);
        assert_eq!(scheduler.order(b), 1);
        assert_eq!(scheduler.order(c), 2);
        assert!(!scheduler.has_pending_links());
    }

    #[test]
    fn install_links_backlinks_on_both_sides() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let input = resource(&mut scheduler, extent);
        let output = resource(&mut scheduler, extent);
        let b = behavior(&mut scheduler, extent, &[input], &[output]);

        let activated = settle(&mut scheduler).unwrap();

        assert!(activated.contains(&b));
        assert!(scheduler.resource(input).subsequents.contains(&b));
        assert_eq!(scheduler.resource(output).supplied_by, Some(b));
        assert!(scheduler.behavior(b).demands.contains(&input));
    }

    #[test]
    fn second_supplier_is_rejected_and_first_kept() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let shared = resource(&mut scheduler, extent);
        let first = behavior(&mut scheduler, extent, &[], &[shared]);
        settle(&mut scheduler).unwrap();

        let second = behavior(&mut scheduler, extent, &[], &[shared]);
        let err = settle(&mut scheduler).unwrap_err();

        assert!(matches!(
            err,
            GraphError::MultipleSuppliers { resource, existing, desired }
                if resource == shared && existing == first && desired == second
        ));
        assert_eq!(scheduler.resource(shared).supplied_by, Some(first));
    }

    #[test]
    fn unadded_demand_is_rejected() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let loose = scheduler.add_resource(extent, None, Box::new(Pulse));
        let b = behavior(&mut scheduler, extent, &[loose], &[]);

        let err = settle(&mut scheduler).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnaddedDemand { behavior, resource } if behavior == b && resource == loose
        ));
    }

    #[test]
    fn cycle_reports_resources_in_flow_order() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let r1 = resource(&mut scheduler, extent);
        let r2 = resource(&mut scheduler, extent);
        let b1 = behavior(&mut scheduler, extent, &[r2], &[r1]);
        let _b2 = behavior(&mut scheduler, extent, &[r1], &[r2]);

        let err = settle(&mut scheduler).unwrap_err();
        match err {
            GraphError::CycleDetected { behavior, cycle } => {
                assert_eq!(behavior, b1);
                assert_eq!(cycle, vec![r1, r2]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn reset_clears_mid_ranking_state() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let r1 = resource(&mut scheduler, extent);
        let r2 = resource(&mut scheduler, extent);
        let b1 = behavior(&mut scheduler, extent, &[r2], &[r1]);
        let b2 = behavior(&mut scheduler, extent, &[r1], &[r2]);
        assert!(settle(&mut scheduler).is_err());

        scheduler.reset_pending();

        assert!(!scheduler.has_pending_links());
        assert_ne!(scheduler.behavior(b1).ordering, OrderingState::Ordering);
        assert_ne!(scheduler.behavior(b2).ordering, OrderingState::Ordering);
    }

    #[test]
    fn new_upstream_supplier_reranks_downstream() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let source = resource(&mut scheduler, extent);
        let middle = resource(&mut scheduler, extent);
        let sink = resource(&mut scheduler, extent);

        let reader = behavior(&mut scheduler, extent, &[middle], &[sink]);
        let consumer = behavior(&mut scheduler, extent, &[sink], &[]);
        settle(&mut scheduler).unwrap();
        assert_eq!(scheduler.order(reader), 0);
        assert_eq!(scheduler.order(consumer), 1);

        // A supplier for `middle` appears: both downstream ranks move.
        let writer = behavior(&mut scheduler, extent, &[source], &[middle]);
        settle(&mut scheduler).unwrap();

        assert_eq!(scheduler.order(writer), 0);
        assert_eq!(scheduler.order(reader), 1);
        assert_eq!(scheduler.order(consumer), 2);
    }

    #[test]
    fn demand_on_higher_ranked_supplier_triggers_reorder() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let r1 = resource(&mut scheduler, extent);
        let r2 = resource(&mut scheduler, extent);
        let a = behavior(&mut scheduler, extent, &[], &[r1]);
        let b = behavior(&mut scheduler, extent, &[r1], &[r2]);
        let c = behavior(&mut scheduler, extent, &[], &[]);
        settle(&mut scheduler).unwrap();
        assert_eq!(scheduler.order(c), 0);

        scheduler.request_demands(c, vec![r2]);
        let changed = settle(&mut scheduler).unwrap();

        assert_eq!(changed, vec![c]);
        assert_eq!(scheduler.order(a), 0);
        assert_eq!(scheduler.order(b), 1);
        assert_eq!(scheduler.order(c), 2);
    }

    #[test]
    fn removed_demands_drop_backlinks() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let r1 = resource(&mut scheduler, extent);
        let r2 = resource(&mut scheduler, extent);
        let b = behavior(&mut scheduler, extent, &[r1, r2], &[]);
        settle(&mut scheduler).unwrap();

        scheduler.request_demands(b, vec![r2]);
        let changed = settle(&mut scheduler).unwrap();

        assert_eq!(changed, vec![b]);
        assert!(!scheduler.resource(r1).subsequents.contains(&b));
        assert!(scheduler.resource(r2).subsequents.contains(&b));
    }

    #[test]
    fn remove_behavior_detaches_and_remembers_links() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let input = resource(&mut scheduler, extent);
        let output = resource(&mut scheduler, extent);
        let producer = behavior(&mut scheduler, extent, &[input], &[output]);
        let consumer = behavior(&mut scheduler, extent, &[output], &[]);
        settle(&mut scheduler).unwrap();

        let stripped = scheduler.remove_behavior(producer, 3);

        assert_eq!(stripped, vec![(consumer, output)]);
        let removed = scheduler.behavior(producer);
        assert_eq!(removed.removed_at, Some(3));
        assert!(!removed.added);
        assert_eq!(removed.pending_demands, Some(vec![input]));
        assert_eq!(removed.pending_supplies, Some(vec![output]));
        assert!(scheduler.resource(input).subsequents.is_empty());
        assert_eq!(scheduler.resource(output).supplied_by, None);
        assert!(!scheduler.behavior(consumer).demands.contains(&output));
    }

    #[test]
    fn supplies_move_between_behaviors() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let source = resource(&mut scheduler, extent);
        let relay = resource(&mut scheduler, extent);
        let shared = resource(&mut scheduler, extent);

        let first = behavior(&mut scheduler, extent, &[source], &[shared]);
        let upstream = behavior(&mut scheduler, extent, &[source], &[relay]);
        let second = behavior(&mut scheduler, extent, &[relay], &[]);
        let reader = behavior(&mut scheduler, extent, &[shared], &[]);
        settle(&mut scheduler).unwrap();
        assert_eq!(scheduler.order(reader), 1);

        // Released before claimed, in the order requested.
        scheduler.request_supplies(first, vec![]);
        scheduler.request_supplies(second, vec![shared]);
        settle(&mut scheduler).unwrap();

        assert_eq!(scheduler.resource(shared).supplied_by, Some(second));
        assert!(scheduler.behavior(first).supplies.is_empty());
        assert!(scheduler.behavior(second).supplies.contains(&shared));
        assert_eq!(scheduler.order(upstream), 0);
        assert_eq!(scheduler.order(second), 1);
        assert_eq!(scheduler.order(reader), 2);

        scheduler.request_supplies(first, vec![shared]);
        let err = settle(&mut scheduler).unwrap_err();
        assert!(matches!(
            err,
            GraphError::MultipleSuppliers { resource, existing, desired }
                if resource == shared && existing == second && desired == first
        ));
        assert_eq!(scheduler.behavior(first).pending_supplies, Some(vec![shared]));

        scheduler.reset_pending();
        assert_eq!(scheduler.behavior(first).pending_supplies, None);
        assert_eq!(scheduler.resource(shared).supplied_by, Some(second));
    }

    #[test]
    fn restore_behavior_relinks_what_removal_detached() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let input = resource(&mut scheduler, extent);
        let output = resource(&mut scheduler, extent);
        let producer = behavior(&mut scheduler, extent, &[input], &[output]);
        let consumer = behavior(&mut scheduler, extent, &[output], &[]);
        settle(&mut scheduler).unwrap();

        let stripped = scheduler.remove_behavior(producer, 3);
        scheduler.restore_behavior(producer);
        for (behavior, resource) in stripped {
            scheduler.restore_demand(behavior, resource);
        }
        scheduler.rerank(&[producer, consumer]).unwrap();

        let restored = scheduler.behavior(producer);
        assert!(restored.added);
        assert_eq!(restored.removed_at, None);
        assert_eq!(restored.pending_demands, None);
        assert_eq!(restored.pending_supplies, None);
        assert_eq!(scheduler.resource(output).supplied_by, Some(producer));
        assert!(scheduler.resource(input).subsequents.contains(&producer));
        assert!(scheduler.behavior(consumer).demands.contains(&output));
        assert!(scheduler.resource(output).subsequents.contains(&consumer));
        assert_eq!(scheduler.order(producer), 0);
        assert_eq!(scheduler.order(consumer), 1);
        assert!(!scheduler.has_pending_links());
    }

    #[test]
    fn detach_keeps_unadmitted_links_pending() {
        let mut scheduler = Scheduler::new();
        let extent = scheduler.add_extent(None);
        let input = resource(&mut scheduler, extent);
        let output = resource(&mut scheduler, extent);
        let b = behavior(&mut scheduler, extent, &[input], &[output]);

        // Admitted but never installed, as when an event fails early.
        scheduler.remember_links(b);
        scheduler.detach_behavior(b);
        scheduler.reset_pending();

        let node = scheduler.behavior(b);
        assert!(!node.added);
        assert_eq!(node.removed_at, None);
        assert_eq!(node.pending_demands, Some(vec![input]));
        assert_eq!(node.pending_supplies, Some(vec![output]));
        assert_eq!(scheduler.resource(output).supplied_by, None);
    }
}
