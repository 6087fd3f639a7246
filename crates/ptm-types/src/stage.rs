//! # Stage State Machine
//!
//! The stage sequence a `PrivateTransaction` moves through, and the
//! events the orchestrator's loop reacts to.

use serde::{Deserialize, Serialize};

/// A transaction's position in the stage state machine. Non-terminal
/// stages flow left to right; `Reverted`/`Parked`/`Failed` are terminal
/// (`Parked` can be re-entered into `VerifierResolution` by an external
/// trigger, but is not itself advanced by the stage controller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    PreInit,
    Init,
    VerifierResolution,
    Assemble,
    AttestationPlan,
    Endorsement,
    DispatchResolve,
    Dispatch,
    Complete,
    Reverted,
    Parked,
    Failed,
}

impl Stage {
    /// Terminal stages never transition further under normal operation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Reverted | Stage::Failed)
    }
}

/// Events the orchestrator's single-threaded loop consumes, in arrival
/// order.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    NewTx(crate::entities::TxId),
    StageResult(StageResultEvent),
    Tick,
    Cancellation(crate::entities::TxId),
}

/// The outcome of an external action (resolve/assemble/endorse/prepare/
/// submit) reported back to the orchestrator loop by a background task.
#[derive(Debug, Clone)]
pub struct StageResultEvent {
    pub tx_id: crate::entities::TxId,
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Whether a background action succeeded, failed terminally, or should
/// be retried.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Advanced,
    Failed(crate::errors::PtmError),
    Retry(crate::errors::PtmError),
}
