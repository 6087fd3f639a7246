//! # Core PTM Entities
//!
//! The transaction record, attestation plan, and state reference types
//! shared by every PTM crate.
//!
//! ## Clusters
//!
//! - **Transaction**: `PrivateTransaction`, `PreAssembly`, `PostAssembly`, `DispatchRecord`
//! - **Attestation**: `AttestationRequest`, `AttestationResult`, `AttestationType`, `AttestationOutcome`
//! - **State**: `StateRef`, `FullState`
//! - **Receipts**: `ReceiptOutcome`

use primitive_types::{H160, H256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a private transaction.
pub type TxId = Uuid;

/// An EVM contract address.
pub type ContractAddress = H160;

/// A content-addressed state identifier, 32 bytes.
pub type StateId = H256;

/// Identifies the schema a state's JSON payload conforms to.
pub type SchemaId = H256;

/// A party identity lookup, e.g. `"notary"` (local) or `"notary@node2"` (remote).
pub type PartyLookup = String;

/// A resolved on-chain verifier address for a party.
pub type Verifier = String;

/// A key-manager handle produced by `resolve_key`.
pub type KeyHandle = String;

/// A state reference: the pair that the PTM uses to build dependency
/// edges. The PTM never interprets the payload a schema-id names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub schema_id: SchemaId,
    pub id: StateId,
}

impl StateRef {
    pub fn new(schema_id: SchemaId, id: StateId) -> Self {
        Self { schema_id, id }
    }
}

/// A state reference plus its content, as returned by `find_available`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullState {
    pub state_ref: StateRef,
    pub data: serde_json::Value,
    pub owner: Verifier,
    pub created_at: u64,
}

/// The verifier-lookup requirements produced by `domain.init_transaction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreAssembly {
    pub required_verifiers: Vec<RequiredVerifier>,
}

/// One entry in `PreAssembly::required_verifiers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredVerifier {
    pub lookup: PartyLookup,
    pub algorithm: String,
    pub verifier_type: String,
}

/// The outcome of a domain's `assemble_transaction` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyResult {
    Ok,
    Revert,
    Park,
}

/// The result of `domain.assemble_transaction`: input/output states, info
/// states, and the attestation plan the endorsement gatherer will execute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostAssembly {
    pub assembly_result: Option<AssemblyResult>,
    pub input_states: Vec<StateRef>,
    pub output_states: Vec<FullState>,
    pub info_states: Vec<FullState>,
    pub attestation_plan: Vec<AttestationRequest>,
    pub revert_reason: Option<String>,
}

/// The kind of attestation an `AttestationRequest` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    Sign,
    Endorse,
}

/// One entry in a `PostAssembly::attestation_plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRequest {
    pub name: String,
    pub attestation_type: AttestationType,
    pub algorithm: String,
    pub payload: Vec<u8>,
    pub parties: Vec<PartyLookup>,
}

/// An attestation's outcome, as reported by a local signer or a remote
/// endorser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationOutcome {
    Sign,
    EndorserSubmit,
    Revert,
}

/// The result of gathering one attestation request from one party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationResult {
    pub name: String,
    pub party: PartyLookup,
    pub verifier: Verifier,
    pub signature_payload: Option<Vec<u8>>,
    pub outcome: AttestationOutcome,
}

/// Set once the dispatch signer is resolved and the prepared base-ledger
/// transactions are known.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub signer: Option<Verifier>,
    pub base_ledger_txs: Vec<BaseLedgerTx>,
    pub sequence: Option<u64>,
}

/// An opaque, already-encoded base-ledger transaction payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLedgerTx {
    pub payload: Vec<u8>,
    pub nonce: Option<u64>,
}

/// Status values exposed by `GetTxStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Assembled,
    Endorsing,
    Dispatching,
    Dispatched,
    Reverted,
    Failed,
}

/// Terminal outcome written by `finalize_receipt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReceiptOutcome {
    Success,
    FailedWithMessage(String),
    /// On-chain revert. `revert_data` is the raw bytes, preserved
    /// verbatim regardless of decode outcome; `decoded_message` is the
    /// human-readable message derived against the ABI store, absent if
    /// the decode failed (no ABI registered, or the data matched no
    /// known error).
    FailedOnChainWithRevertData { revert_data: Vec<u8>, decoded_message: Option<String> },
}

/// The full transaction record, as described by invariant 1-5: created on
/// accept, mutated only by its owning orchestrator, persisted immutably as
/// a sequence of append-only stage records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateTransaction {
    pub id: TxId,
    pub submitter: Verifier,
    pub contract_address: ContractAddress,
    pub domain: String,
    pub depends_on: Vec<TxId>,
    pub idempotency_key: String,
    pub pre_assembly: PreAssembly,
    pub post_assembly: PostAssembly,
    pub dispatch: DispatchRecord,
}

impl PrivateTransaction {
    /// Returns the state refs this transaction would consume, used to
    /// build the sequencer's dependency graph.
    pub fn input_state_refs(&self) -> &[StateRef] {
        &self.post_assembly.input_states
    }

    /// Returns the state refs this transaction would produce.
    pub fn output_state_refs(&self) -> impl Iterator<Item = StateRef> + '_ {
        self.post_assembly.output_states.iter().map(|s| s.state_ref)
    }
}
