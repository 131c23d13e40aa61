//! Operation scheduling.
//!
//! The schedule is built back to front: the candidates at every step are the
//! unscheduled operations whose successors are all scheduled already. Each
//! candidate is tried as the last operation of the remaining problem and the
//! cheapest complete ordering wins. Candidates are tried from the most recently
//! registered one and the first minimum is kept, so equal cost schedules follow
//! registration order wherever dependencies allow. Results are memoised on
//! the set of scheduled operations, which bounds the search by the number of
//! distinct sets instead of the number of orderings.

use std::collections::{BTreeSet, HashMap};

use super::cost::CostCalculator;
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::operation::OperationId;

type DoneSet = BTreeSet<OperationId>;

/// Search state for one scheduling run.
pub struct Scheduler<'a> {
    cost: &'a CostCalculator,
    operations: Vec<OperationId>,
    next: Vec<BTreeSet<OperationId>>,
    memo: Option<HashMap<DoneSet, Vec<OperationId>>>,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &WorkflowGraph, cost: &'a CostCalculator, memoize: bool) -> Self {
        let operations: Vec<OperationId> = graph.operations().map(|(id, _)| id).collect();
        let next = operations
            .iter()
            .map(|&id| graph.next_operations(id))
            .collect();
        Self {
            cost,
            operations,
            next,
            memo: memoize.then(HashMap::new),
        }
    }

    /// Order every reachable operation so that producers precede consumers.
    ///
    /// Operations on a dependency cycle never become candidates, so the
    /// returned order is shorter than the operation count when a cycle exists.
    pub fn schedule(mut self) -> Vec<OperationId> {
        self.solve(&DoneSet::new())
    }

    fn solve(&mut self, done: &DoneSet) -> Vec<OperationId> {
        if let Some(cached) = self.memo.as_ref().and_then(|memo| memo.get(done)) {
            return cached.clone();
        }

        let candidates: Vec<OperationId> = self
            .operations
            .iter()
            .rev()
            .copied()
            .filter(|op| !done.contains(op))
            .filter(|op| self.next[op.index()].is_subset(done))
            .collect();

        let mut best: Option<(f32, Vec<OperationId>)> = None;
        for candidate in candidates {
            let mut remaining = done.clone();
            remaining.insert(candidate);
            let mut sequence = self.solve(&remaining);
            sequence.push(candidate);

            let cost = self.cost.sequence_cost(&sequence);
            if best.as_ref().map_or(true, |(best_cost, _)| cost < *best_cost) {
                best = Some((cost, sequence));
            }
        }

        let result = best.map(|(_, sequence)| sequence).unwrap_or_default();
        if let Some(memo) = self.memo.as_mut() {
            memo.insert(done.clone(), result.clone());
        }
        result
    }
}

/// Schedule all operations of `graph` for a single queue.
pub fn schedule_operations(
    graph: &WorkflowGraph,
    cost: &CostCalculator,
    memoize: bool,
) -> Vec<OperationId> {
    Scheduler::new(graph, cost, memoize).schedule()
}
