//! In-flight transaction state, owned exclusively by one orchestrator's
//! loop, and the mailbox background tasks drop their results into before
//! waking the loop with a lightweight `StageResultEvent`.
//!
//! `OrchestratorEvent::StageResult` carries only `(tx_id, stage,
//! outcome)` — no payload. A background task that calls out to the
//! domain/key-manager/gatherer/submitter writes its actual result
//! (`PreAssembly`, resolved verifiers, `PostAssembly`, ...) into
//! `ResultMailbox` first, then posts the event; the loop pops the
//! matching entry when it processes that event. This keeps every
//! mutation of `TxRuntimeState` on the loop thread, the mailbox is
//! write-once-read-once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ptm_types::{
    AttestationResult, BaseLedgerTx, PartyLookup, PostAssembly, PreAssembly, PrivateTransaction,
    Stage, TxId, Verifier,
};

/// A transaction as this orchestrator's loop tracks it, from acceptance
/// to a terminal stage.
pub struct TxRuntimeState {
    pub tx: PrivateTransaction,
    pub stage: Stage,
    pub resolved_verifiers: HashMap<PartyLookup, Verifier>,
    pub gathered: Vec<AttestationResult>,
}

impl TxRuntimeState {
    pub fn new(tx: PrivateTransaction) -> Self {
        Self {
            tx,
            stage: Stage::PreInit,
            resolved_verifiers: HashMap::new(),
            gathered: Vec::new(),
        }
    }
}

/// One background call's result, deposited for the loop to pick up.
pub enum BackgroundOutcome {
    Init(PreAssembly),
    VerifiersResolved(HashMap<PartyLookup, Verifier>),
    Assembled(PostAssembly),
    Endorsed(Vec<AttestationResult>),
    Prepared { signer: Verifier, base_ledger_txs: Vec<BaseLedgerTx> },
    /// Nonce the submitter assigned. The orchestrator's own dispatch
    /// sequence number comes from the sequencer, not from here.
    Dispatched { nonce: u64 },
}

/// Write-once-read-once mailbox keyed by transaction id. A background
/// task that succeeds deposits exactly one entry before signaling
/// completion; the loop removes it when handling the corresponding
/// `StageResult`. A background task that fails deposits nothing — the
/// error travels on the event itself as `StageOutcome::Failed`/`Retry`.
#[derive(Clone, Default)]
pub struct ResultMailbox {
    inner: Arc<Mutex<HashMap<TxId, BackgroundOutcome>>>,
}

impl ResultMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&self, tx_id: TxId, outcome: BackgroundOutcome) {
        self.inner.lock().insert(tx_id, outcome);
    }

    pub fn take(&self, tx_id: TxId) -> Option<BackgroundOutcome> {
        self.inner.lock().remove(&tx_id)
    }
}
