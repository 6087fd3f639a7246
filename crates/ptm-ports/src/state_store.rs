//! State store interface, consumed by the Domain Context.
//!
//! Reference: §6 "State store interface". Persists UTXO states and
//! answers availability queries; the PTM never interprets the JSON
//! payload a schema names.

use async_trait::async_trait;
use ptm_types::{ContractAddress, FullState, SchemaId, StateId};

/// Opaque query passed through to the store unmodified (filter, sort,
/// limit are domain-defined).
#[derive(Debug, Clone, Default)]
pub struct StateQuery {
    pub filter: serde_json::Value,
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

/// Query flags controlling state visibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFlags {
    pub include_locked: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StateStoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// The durable backing store the Domain Context buffers against.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn find_available(
        &self,
        contract: ContractAddress,
        schema_id: SchemaId,
        query: &StateQuery,
        flags: QueryFlags,
    ) -> Result<Vec<FullState>, StateStoreError>;

    async fn write_received_states(
        &self,
        contract: ContractAddress,
        states: Vec<FullState>,
    ) -> Result<(), StateStoreError>;

    async fn write_nullifiers(
        &self,
        contract: ContractAddress,
        spent: Vec<StateId>,
    ) -> Result<(), StateStoreError>;
}
