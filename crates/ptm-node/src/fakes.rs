//! Hand-rolled in-memory implementations of every `ptm-ports` trait,
//! used by the demo binary and by the `tests` crate. Mirrors the
//! teacher's mock style (plain structs behind `parking_lot`, no mocking
//! framework) rather than pulling in a mock-generation crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ptm_ports::{
    DecodeError, DomainError, DomainPlugin, KeyManager, KeyManagerError, PreparedSubmission,
    PublicTx, PublicTxSubmitter, QueryFlags, ReceiptDecoder, ReliableMessage, RequestOptions,
    StateQuery, StateStore, StateStoreError, SubmitterError, TransportError, TransportManager,
};
use ptm_types::{
    AssemblyResult, AttestationOutcome, AttestationRequest, AttestationResult, AttestationType,
    BaseLedgerTx, ContractAddress, FullState, KeyHandle, PostAssembly, PreAssembly,
    PrivateTransaction, SchemaId, StateId, Verifier,
};

/// Stores states in memory, keyed by contract. No locking beyond the
/// outer mutex is needed since every call is a cheap map operation.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<ContractAddress, HashMap<StateId, FullState>>>,
    nullified: Mutex<HashMap<ContractAddress, Vec<StateId>>>,
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn find_available(
        &self,
        contract: ContractAddress,
        schema_id: SchemaId,
        _query: &StateQuery,
        flags: QueryFlags,
    ) -> Result<Vec<FullState>, StateStoreError> {
        let states = self.states.lock();
        let nullified = self.nullified.lock();
        let spent = nullified.get(&contract).cloned().unwrap_or_default();
        Ok(states
            .get(&contract)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|s| s.state_ref.schema_id == schema_id)
                    .filter(|s| flags.include_locked || !spent.contains(&s.state_ref.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write_received_states(
        &self,
        contract: ContractAddress,
        states: Vec<FullState>,
    ) -> Result<(), StateStoreError> {
        let mut by_contract = self.states.lock();
        let entry = by_contract.entry(contract).or_default();
        for state in states {
            entry.insert(state.state_ref.id, state);
        }
        Ok(())
    }

    async fn write_nullifiers(
        &self,
        contract: ContractAddress,
        spent: Vec<StateId>,
    ) -> Result<(), StateStoreError> {
        self.nullified.lock().entry(contract).or_default().extend(spent);
        Ok(())
    }
}

/// Resolves every lookup to a deterministic, made-up key handle and
/// verifier address; signs by returning the payload unchanged.
#[derive(Default)]
pub struct InMemoryKeyManager;

#[async_trait]
impl KeyManager for InMemoryKeyManager {
    async fn resolve_key(
        &self,
        lookup: &str,
        _algorithm: &str,
        _verifier_type: &str,
    ) -> Result<(KeyHandle, Verifier), KeyManagerError> {
        Ok((format!("key:{lookup}"), format!("0x{lookup}")))
    }

    async fn sign(
        &self,
        _key_handle: &KeyHandle,
        _algorithm: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, KeyManagerError> {
        Ok(payload.to_vec())
    }
}

/// Records every message sent rather than delivering it anywhere. A
/// single-node demo never needs to reach a remote party, so this is
/// enough to exercise `TransportManager::send` without a real peer.
#[derive(Default)]
pub struct LoopbackTransport {
    sent: Mutex<Vec<ReliableMessage>>,
}

impl LoopbackTransport {
    pub fn sent_messages(&self) -> Vec<ReliableMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl TransportManager for LoopbackTransport {
    async fn send(&self, message: ReliableMessage) -> Result<(), TransportError> {
        self.sent.lock().push(message);
        Ok(())
    }
}

/// Assigns contiguous nonces in submission order, as
/// `PublicTxSubmitter::submit_batch` requires.
#[derive(Default)]
pub struct InMemorySubmitter {
    next_nonce: AtomicU64,
}

#[async_trait]
impl PublicTxSubmitter for InMemorySubmitter {
    async fn prepare_submission_batch(
        &self,
        _request_options: &RequestOptions,
        payloads: Vec<BaseLedgerTx>,
    ) -> Result<Vec<PreparedSubmission>, SubmitterError> {
        Ok(payloads.into_iter().map(|tx| PreparedSubmission { tx }).collect())
    }

    async fn submit_batch(
        &self,
        submissions: Vec<PreparedSubmission>,
    ) -> Result<Vec<PublicTx>, SubmitterError> {
        Ok(submissions
            .into_iter()
            .map(|s| PublicTx {
                payload: s.tx.payload,
                nonce: self.next_nonce.fetch_add(1, Ordering::SeqCst),
            })
            .collect())
    }
}

/// A scriptable domain plugin for demos and tests: requires no external
/// verifier resolution, mints one output state owned by the submitter,
/// and endorses locally with a `Sign` attestation — no remote party is
/// ever named, so a single-node demo reaches a receipt without a peer.
#[derive(Default)]
pub struct MintDomain {
    next_state_id: AtomicU64,
}

#[async_trait]
impl DomainPlugin for MintDomain {
    async fn init_transaction(&self, _tx: &PrivateTransaction) -> Result<PreAssembly, DomainError> {
        Ok(PreAssembly::default())
    }

    async fn assemble_transaction(
        &self,
        tx: &PrivateTransaction,
        _resolved_verifiers: &[Verifier],
    ) -> Result<PostAssembly, DomainError> {
        let id = self.next_state_id.fetch_add(1, Ordering::SeqCst);
        Ok(PostAssembly {
            assembly_result: Some(AssemblyResult::Ok),
            input_states: Vec::new(),
            output_states: vec![FullState {
                state_ref: ptm_types::StateRef::new(SchemaId::zero(), StateId::from_low_u64_be(id + 1)),
                data: serde_json::json!({ "owner": tx.submitter, "amount": 100 }),
                owner: tx.submitter.clone(),
                created_at: 0,
            }],
            info_states: Vec::new(),
            attestation_plan: vec![AttestationRequest {
                name: "self".to_string(),
                attestation_type: AttestationType::Sign,
                algorithm: "ed25519".to_string(),
                payload: tx.id.as_bytes().to_vec(),
                parties: vec![tx.submitter.clone()],
            }],
            revert_reason: None,
        })
    }

    async fn endorse_transaction(
        &self,
        _tx: &PrivateTransaction,
        plan_entry: &AttestationRequest,
        _resolved_verifiers: &[Verifier],
        _inputs: &[FullState],
        _outputs: &[FullState],
        _info: &[FullState],
    ) -> Result<AttestationResult, DomainError> {
        Ok(AttestationResult {
            name: plan_entry.name.clone(),
            party: plan_entry.parties.first().cloned().unwrap_or_default(),
            verifier: plan_entry.parties.first().cloned().unwrap_or_default(),
            signature_payload: Some(plan_entry.payload.clone()),
            outcome: AttestationOutcome::Sign,
        })
    }

    async fn prepare_transaction(
        &self,
        _tx: &PrivateTransaction,
        _attestation_results: &[AttestationResult],
    ) -> Result<Vec<BaseLedgerTx>, DomainError> {
        Ok(vec![BaseLedgerTx { payload: b"mint".to_vec(), nonce: None }])
    }

    async fn call(
        &self,
        _tx: &PrivateTransaction,
        function: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        Ok(serde_json::json!({ "function": function, "echo": args }))
    }
}

/// No ABI store is wired up in this demo — persisting ABI definitions
/// is out of scope (§1 Non-goals) — so every decode attempt reports the
/// contract as unregistered. Callers still preserve the raw revert
/// bytes regardless of this result.
#[derive(Default)]
pub struct NullReceiptDecoder;

#[async_trait]
impl ReceiptDecoder for NullReceiptDecoder {
    async fn decode_revert(
        &self,
        contract: ContractAddress,
        _revert_data: &[u8],
    ) -> Result<String, DecodeError> {
        Err(DecodeError::AbiUnavailable(contract))
    }
}
