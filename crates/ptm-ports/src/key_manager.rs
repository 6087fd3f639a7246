//! Key manager interface: resolves identity lookups to addresses and
//! produces signatures.
//!
//! Reference: §6 "Key manager interface".

use async_trait::async_trait;
use ptm_types::{KeyHandle, Verifier};

#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyManagerError {
    #[error("key lookup unresolvable: {lookup}")]
    Unresolvable { lookup: String },
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

#[async_trait]
pub trait KeyManager: Send + Sync {
    async fn resolve_key(
        &self,
        lookup: &str,
        algorithm: &str,
        verifier_type: &str,
    ) -> Result<(KeyHandle, Verifier), KeyManagerError>;

    async fn sign(
        &self,
        key_handle: &KeyHandle,
        algorithm: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, KeyManagerError>;
}
