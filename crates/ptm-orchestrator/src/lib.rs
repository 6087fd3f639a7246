//! # PTM Orchestrator
//!
//! One `Orchestrator` per target contract address, owning every
//! in-flight transaction against that contract. A single-threaded
//! cooperative event loop drives each transaction, stage by stage,
//! through the Stage Controller, spawning a background task for every
//! external call (key manager, domain plugin, endorsement gatherer,
//! base-ledger submitter) and resuming only once that task posts its
//! result back as a `StageResult` event.
//!
//! Orchestrators never take locks on each other; two orchestrators for
//! different contracts run fully in parallel, synchronized only
//! through the durable `TransactionStore`, the per-contract Domain
//! Context, and the Sequencer each owns.

mod config;
mod deps;
mod orchestrator;
mod runtime;
mod worker;

pub use config::OrchestratorConfig;
pub use deps::OrchestratorDeps;
pub use orchestrator::Orchestrator;
pub use runtime::{BackgroundOutcome, TxRuntimeState};
