//! The online Sequencer: registers transactions as they assemble,
//! answers `is_ready_to_dispatch`, and assigns the monotonic dispatch
//! sequence.
//!
//! Readiness tracking mirrors `kahns_topological_sort`'s loop structure
//! directly: a transaction is ready exactly when its live in-degree
//! counter reaches zero, which is the same condition Kahn's uses to
//! admit a node into the next parallel group — here computed
//! incrementally, one dispatch at a time, instead of as a single batch
//! pass.

use std::collections::{HashMap, HashSet, VecDeque};

use ptm_types::{PrivateTransaction, StateId, TxId};
use tracing::{instrument, warn};

use crate::errors::SequencerError;
use crate::graph::{Dependency, DependencyGraph};

/// Per-contract sequencer state: the dependency graph, the reverse
/// state-id -> producer map, and dispatch bookkeeping.
#[derive(Default)]
pub struct Sequencer {
    graph: DependencyGraph,
    producing_tx: HashMap<StateId, TxId>,
    remaining_in_degree: HashMap<TxId, usize>,
    dispatched: HashSet<TxId>,
    next_sequence: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transaction's dependency edges, derived from input/
    /// output state-ref intersection with already-registered producers
    /// plus any explicit `depends_on` entries.
    #[instrument(skip(self, tx), fields(tx_id = ?tx.id))]
    pub fn register_transaction(&mut self, tx: &PrivateTransaction) -> Result<(), SequencerError> {
        let mut candidate_edges = Vec::new();

        for input in tx.input_state_refs() {
            if let Some(&producer) = self.producing_tx.get(&input.id) {
                if producer != tx.id {
                    candidate_edges.push(Dependency { from: producer, to: tx.id });
                }
            }
        }
        for ancestor in &tx.depends_on {
            if *ancestor != tx.id && self.graph.in_degree.contains_key(ancestor) {
                candidate_edges.push(Dependency { from: *ancestor, to: tx.id });
            }
        }

        for edge in &candidate_edges {
            if self.reachable(edge.to, edge.from) {
                warn!(from = ?edge.from, to = ?edge.to, "sequencer cycle detected");
                return Err(SequencerError::Cycle);
            }
        }

        self.graph.add_node(tx.id);
        self.remaining_in_degree.insert(tx.id, 0);
        for edge in candidate_edges {
            self.graph.add_edge(edge);
            *self.remaining_in_degree.entry(edge.to).or_insert(0) += 1;
        }

        for output in tx.output_state_refs() {
            self.producing_tx.insert(output.id, tx.id);
        }

        Ok(())
    }

    /// True iff every ancestor of `tx_id` has already dispatched.
    pub fn is_ready_to_dispatch(&self, tx_id: TxId) -> bool {
        self.remaining_in_degree.get(&tx_id).copied().unwrap_or(0) == 0
            && !self.dispatched.contains(&tx_id)
    }

    /// Assigns the next contiguous sequence number and marks `tx_id`
    /// dispatched, unblocking its direct descendants.
    pub fn dispatch(&mut self, tx_id: TxId) -> Result<u64, SequencerError> {
        if !self.is_ready_to_dispatch(tx_id) {
            return Err(SequencerError::NotReady(tx_id));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.dispatched.insert(tx_id);

        if let Some(neighbors) = self.graph.adjacency.get(&tx_id) {
            for neighbor in neighbors.clone() {
                if let Some(degree) = self.remaining_in_degree.get_mut(&neighbor) {
                    *degree = degree.saturating_sub(1);
                }
            }
        }

        Ok(sequence)
    }

    pub fn is_dispatched(&self, tx_id: TxId) -> bool {
        self.dispatched.contains(&tx_id)
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// BFS reachability check: can `start` reach `target` via existing
    /// edges? Used to reject an edge whose addition would close a
    /// cycle before the edge is committed to the graph.
    fn reachable(&self, start: TxId, target: TxId) -> bool {
        if start == target {
            return true;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);

        while let Some(node) = queue.pop_front() {
            let Some(neighbors) = self.graph.adjacency.get(&node) else {
                continue;
            };
            for &neighbor in neighbors {
                if neighbor == target {
                    return true;
                }
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        false
    }
}
