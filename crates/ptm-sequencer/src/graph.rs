//! The dependency graph and Kahn's-algorithm topological sort used both
//! by the online `Sequencer` (in-degree tracking) and by property tests
//! that validate a whole batch at once.
//!
//! Grounded directly on `qc-12-transaction-ordering`'s
//! `domain::entities::DependencyGraph` and
//! `algorithms::kahns::kahns_topological_sort`.

use std::collections::HashMap;

use ptm_types::TxId;

use crate::errors::SequencerError;

/// A dependency edge: `from` must dispatch with a strictly smaller
/// sequence than `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub from: TxId,
    pub to: TxId,
}

/// The per-contract dependency graph: nodes are transaction ids, edges
/// point from a producer/ancestor to its dependent.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<TxId>,
    pub edges: Vec<Dependency>,
    pub adjacency: HashMap<TxId, Vec<TxId>>,
    pub in_degree: HashMap<TxId, usize>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, tx_id: TxId) {
        if self.in_degree.contains_key(&tx_id) {
            return;
        }
        self.nodes.push(tx_id);
        self.adjacency.entry(tx_id).or_default();
        self.in_degree.entry(tx_id).or_insert(0);
    }

    pub fn add_edge(&mut self, dep: Dependency) {
        self.adjacency.entry(dep.from).or_default().push(dep.to);
        *self.in_degree.entry(dep.to).or_insert(0) += 1;
        self.edges.push(dep);
    }

    pub fn has_edge(&self, from: &TxId, to: &TxId) -> bool {
        self.adjacency
            .get(from)
            .map(|neighbors| neighbors.contains(to))
            .unwrap_or(false)
    }

    pub fn get_zero_degree_nodes(&self) -> Vec<TxId> {
        self.in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(tx_id, _)| *tx_id)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// A batch of transactions with no pending edges between them; all can
/// dispatch at the same sequencer round.
#[derive(Debug, Clone)]
pub struct ParallelGroup {
    pub index: usize,
    pub transactions: Vec<TxId>,
}

/// The full dispatchable order, grouped by parallelism.
#[derive(Debug, Clone)]
pub struct ExecutionSchedule {
    pub parallel_groups: Vec<ParallelGroup>,
}

impl ExecutionSchedule {
    pub fn new(groups: Vec<ParallelGroup>) -> Self {
        Self {
            parallel_groups: groups,
        }
    }

    pub fn max_parallelism(&self) -> usize {
        self.parallel_groups
            .iter()
            .map(|g| g.transactions.len())
            .max()
            .unwrap_or(0)
    }

    pub fn total_transactions(&self) -> usize {
        self.parallel_groups.iter().map(|g| g.transactions.len()).sum()
    }

    /// Flattens the schedule into a single dispatch order: every
    /// transaction in group N precedes every transaction in group N+1.
    /// Within a group, order is the deterministic sort order Kahn's
    /// produced it in.
    pub fn flatten(&self) -> Vec<TxId> {
        self.parallel_groups
            .iter()
            .flat_map(|g| g.transactions.iter().copied())
            .collect()
    }
}

/// O(V + E) topological sort with cycle detection, grouping same-round
/// zero-in-degree nodes for deterministic, parallelism-revealing output.
pub fn kahns_topological_sort(graph: &DependencyGraph) -> Result<ExecutionSchedule, SequencerError> {
    if graph.nodes.is_empty() {
        return Ok(ExecutionSchedule::new(vec![]));
    }

    let mut in_degree = graph.in_degree.clone();

    let mut queue: Vec<TxId> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(tx_id, _)| *tx_id)
        .collect();
    queue.sort();

    let mut groups = Vec::new();
    let mut scheduled_count = 0;

    while !queue.is_empty() {
        let current_group = std::mem::take(&mut queue);
        scheduled_count += current_group.len();
        groups.push(ParallelGroup {
            index: groups.len(),
            transactions: current_group.clone(),
        });

        let mut next_queue = Vec::new();
        for node in &current_group {
            let Some(neighbors) = graph.adjacency.get(node) else {
                continue;
            };
            for neighbor in neighbors {
                let Some(degree) = in_degree.get_mut(neighbor) else {
                    continue;
                };
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    next_queue.push(*neighbor);
                }
            }
        }
        next_queue.sort();
        queue = next_queue;
    }

    if scheduled_count < graph.node_count() {
        return Err(SequencerError::Cycle);
    }

    Ok(ExecutionSchedule::new(groups))
}
