//! Base-ledger public-tx submitter.
//!
//! Reference: §6 "Base-ledger public-tx submitter". Must assign nonces
//! in the order provided and return them so the PTM can record dispatch
//! numbers (§4.4 ordering guarantees).

use async_trait::async_trait;
use ptm_types::BaseLedgerTx;

/// Request-scoped options controlling how a batch is prepared (gas
/// pricing policy, etc.) — opaque to the PTM core.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub options: serde_json::Value,
}

/// A submission readied by `prepare_submission_batch`, still awaiting a
/// nonce from `submit_batch`.
#[derive(Debug, Clone)]
pub struct PreparedSubmission {
    pub tx: BaseLedgerTx,
}

/// A nonce-numbered public transaction, as returned by `submit_batch`.
#[derive(Debug, Clone)]
pub struct PublicTx {
    pub payload: Vec<u8>,
    pub nonce: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitterError {
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("submit failed: {0}")]
    SubmitFailed(String),
    /// The base ledger reverted the transaction. Carries the raw revert
    /// data so the caller can preserve it on the receipt regardless of
    /// whether it can be decoded against an ABI.
    #[error("on-chain revert, {} bytes of revert data", .0.len())]
    OnChainRevert(Vec<u8>),
}

#[async_trait]
pub trait PublicTxSubmitter: Send + Sync {
    async fn prepare_submission_batch(
        &self,
        request_options: &RequestOptions,
        payloads: Vec<BaseLedgerTx>,
    ) -> Result<Vec<PreparedSubmission>, SubmitterError>;

    /// Must assign nonces in the order `submissions` is given and
    /// return them in the same order; the sequencer relies on this to
    /// record contiguous dispatch numbers.
    async fn submit_batch(
        &self,
        submissions: Vec<PreparedSubmission>,
    ) -> Result<Vec<PublicTx>, SubmitterError>;
}
