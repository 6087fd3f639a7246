//! Transport manager interface: delivers inter-node messages with
//! at-least-once semantics.
//!
//! Reference: §6 "Transport manager interface", §4.3 remote endorsement
//! protocol.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inter-node message with at-least-once delivery and an explicit
/// ack path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliableMessage {
    pub node: String,
    pub message_type: String,
    pub payload: Vec<u8>,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("transport send failed: {0}")]
    SendFailed(String),
}

/// Sends a `ReliableMessage`; delivery is retried by the implementation
/// until acked. Inbound messages arrive through
/// `ptm_facade::Facade::receive_transport_message`, not through this
/// trait.
#[async_trait]
pub trait TransportManager: Send + Sync {
    async fn send(&self, message: ReliableMessage) -> Result<(), TransportError>;
}
