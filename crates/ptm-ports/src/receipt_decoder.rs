//! Receipt/ABI decoder.
//!
//! Reference: §4.6 — on-chain revert data is decoded against the ABI
//! store and a human-readable message derived; the raw bytes are
//! preserved verbatim regardless. Persisting ABI definitions is out of
//! scope for this workspace (§1 Non-goals), so this is a seam rather
//! than an implementation: a real node backs it with whatever holds its
//! domains' ABIs.

use async_trait::async_trait;
use ptm_types::ContractAddress;

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    #[error("no ABI registered for contract {0:?}")]
    AbiUnavailable(ContractAddress),
    #[error("revert data matched no known ABI error: {0}")]
    Unrecognized(String),
}

#[async_trait]
pub trait ReceiptDecoder: Send + Sync {
    /// Derives a human-readable message from raw on-chain revert data.
    /// A decode failure is informational only — per §9, callers must
    /// still surface the raw bytes alongside it rather than discard
    /// them or guess at domain-specific meaning.
    async fn decode_revert(
        &self,
        contract: ContractAddress,
        revert_data: &[u8],
    ) -> Result<String, DecodeError>;
}
