//! Ports layer (Hexagonal Architecture)
//!
//! The external-collaborator interfaces the PTM core depends on: the
//! domain plugin, the state store, the key manager, the transport
//! manager, the base-ledger public-tx submitter, and the receipt/ABI
//! decoder.

mod domain;
mod key_manager;
mod receipt_decoder;
mod state_store;
mod submitter;
mod transport;

pub use domain::*;
pub use key_manager::*;
pub use receipt_decoder::*;
pub use state_store::*;
pub use submitter::*;
pub use transport::*;
