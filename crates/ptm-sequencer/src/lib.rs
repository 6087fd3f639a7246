//! # PTM Sequencer
//!
//! Builds the per-contract dependency graph from state-ref intersection
//! and explicit `depends_on` edges, answers `is_ready_to_dispatch`, and
//! assigns the monotonically increasing dispatch sequence.

mod errors;
mod graph;
mod sequencer;

pub use errors::SequencerError;
pub use graph::{kahns_topological_sort, Dependency, DependencyGraph, ExecutionSchedule, ParallelGroup};
pub use sequencer::Sequencer;
