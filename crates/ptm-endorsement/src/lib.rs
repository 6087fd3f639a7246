//! # PTM Endorsement Gatherer
//!
//! Converts an attestation plan into SIGN requests against the key
//! manager and ENDORSE requests against local or remote parties, and
//! assembles the `AttestationResult` set the stage controller waits on.

mod errors;
mod gatherer;
mod pending;

pub use errors::EndorsementError;
pub use gatherer::{
    respond_to_remote_request, EndorsementGatherer, RemoteEndorseRequest, RemoteEndorseResponse,
};
pub use pending::{AttestationKey, PendingGather};
