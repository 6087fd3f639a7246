//! # Error Types
//!
//! The `PtmError` taxonomy, one variant per named error code. Component
//! crates define narrower local error enums (`SequencerError`,
//! `StoreError`, ...) that convert into this one at the orchestrator
//! boundary.

use thiserror::Error;
use uuid::Uuid;

/// The PTM-wide error taxonomy.
#[derive(Debug, Clone, Error)]
pub enum PtmError {
    /// Missing domain, invalid ABI, or idempotency mismatch. Rejected
    /// synchronously, before the transaction enters an orchestrator.
    #[error("input invalid: {0}")]
    InputInvalid(String),

    /// An idempotency key collided with a materially different
    /// transaction.
    #[error("idempotency mismatch for key {key}")]
    IdempotencyMismatch { key: String },

    /// A key/identity lookup could not be resolved. Surfaces as terminal
    /// `failed`.
    #[error("verifier unresolvable: {lookup}")]
    VerifierUnresolvable { lookup: String },

    /// The domain returned REVERT from `assemble_transaction`. Terminal
    /// `reverted`; revert data is preserved alongside.
    #[error("assemble reverted: {reason}")]
    AssembleRevert { reason: String },

    /// The domain returned PARK from `assemble_transaction`.
    /// Non-terminal; the transaction remains pending until an external
    /// trigger re-enqueues it.
    #[error("assemble parked: {reason}")]
    AssemblePark { reason: String },

    /// A party could not be mapped to a node for remote endorsement.
    #[error("attestation party unresolvable: {lookup}")]
    PlanPartyUnresolvable { lookup: String },

    /// A remote endorser signaled REVERT. Terminal `reverted`.
    #[error("remote endorser rejected: {party}")]
    EndorseRemoteRejected { party: String },

    /// No endorsement result arrived within the configured window. The
    /// request is re-sent, not abandoned, so this is informational
    /// rather than terminal.
    #[error("endorsement timed out waiting on {party}")]
    EndorseTimeout { party: String },

    /// Remote endorser signaled REVERT via the attestation outcome
    /// (distinct code from `EndorseRemoteRejected` for the case surfaced
    /// through the stage controller rather than the gatherer).
    #[error("endorsement rejected for attestation {name}")]
    EndorseRejected { name: String },

    /// Transport send failed or timed out. Retried indefinitely with
    /// configured backoff; never terminal on its own.
    #[error("transport transient error: {0}")]
    TransportTransient(String),

    /// Durable-store error. The caller receives the error and the
    /// orchestrator re-schedules the operation.
    #[error("store transient error: {0}")]
    StoreTransient(String),

    /// A dependency cycle was detected in the sequencer's graph.
    /// Terminal `failed`.
    #[error("sequencer cycle detected involving {tx_id}")]
    SequencerCycle { tx_id: Uuid },

    /// The public-tx submitter rejected a prepared submission. Terminal
    /// `failed` for that transaction; others in the batch may succeed.
    #[error("submitter rejected transaction {tx_id}: {reason}")]
    SubmitterRejected { tx_id: Uuid, reason: String },

    /// The submitted transaction reverted on-chain. Terminal `reverted`;
    /// the raw revert data is preserved on the receipt regardless of
    /// whether it could be decoded.
    #[error("dispatch reverted on-chain for {tx_id}")]
    DispatchReverted { tx_id: Uuid, revert_data: Vec<u8> },
}

impl PtmError {
    /// Whether this error should be retried rather than surfaced as
    /// terminal, per the recovery policy: anything involving the
    /// network or a peer is retried, anything involving a logical
    /// protocol violation is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PtmError::TransportTransient(_)
                | PtmError::StoreTransient(_)
                | PtmError::EndorseTimeout { .. }
        )
    }

    /// The taxonomy's named error code, used as a metrics label rather
    /// than the full `Display` message (which embeds per-instance data
    /// unsuitable for a label's cardinality).
    pub fn code(&self) -> &'static str {
        match self {
            PtmError::InputInvalid(_) => "input_invalid",
            PtmError::IdempotencyMismatch { .. } => "idempotency_mismatch",
            PtmError::VerifierUnresolvable { .. } => "verifier_unresolvable",
            PtmError::AssembleRevert { .. } => "assemble_revert",
            PtmError::AssemblePark { .. } => "assemble_park",
            PtmError::PlanPartyUnresolvable { .. } => "plan_party_unresolvable",
            PtmError::EndorseRemoteRejected { .. } => "endorse_remote_rejected",
            PtmError::EndorseTimeout { .. } => "endorse_timeout",
            PtmError::EndorseRejected { .. } => "endorse_rejected",
            PtmError::TransportTransient(_) => "transport_transient",
            PtmError::StoreTransient(_) => "store_transient",
            PtmError::SequencerCycle { .. } => "sequencer_cycle",
            PtmError::SubmitterRejected { .. } => "submitter_rejected",
            PtmError::DispatchReverted { .. } => "dispatch_reverted",
        }
    }
}
