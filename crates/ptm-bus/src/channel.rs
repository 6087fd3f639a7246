//! # Orchestrator Event Channel
//!
//! The bounded `mpsc` channel backing one contract's orchestrator loop.
//! Background tasks (endorse, submit, store writes) hold a clone of the
//! `OrchestratorSender` and post their completion back as
//! `OrchestratorEvent::StageResult`; the orchestrator's loop owns the
//! sole `OrchestratorReceiver`.

use ptm_types::OrchestratorEvent;
use tokio::sync::mpsc;

use crate::DEFAULT_ORCHESTRATOR_CHANNEL_CAPACITY;

pub type OrchestratorSender = mpsc::Sender<OrchestratorEvent>;
pub type OrchestratorReceiver = mpsc::Receiver<OrchestratorEvent>;

/// Create a new orchestrator channel with the default bound.
pub fn orchestrator_channel() -> (OrchestratorSender, OrchestratorReceiver) {
    mpsc::channel(DEFAULT_ORCHESTRATOR_CHANNEL_CAPACITY)
}

/// Create a new orchestrator channel with an explicit bound, used when
/// `OrchestratorConfig` overrides the default.
pub fn orchestrator_channel_with_capacity(capacity: usize) -> (OrchestratorSender, OrchestratorReceiver) {
    mpsc::channel(capacity)
}
