//! Scenario: a transaction's last durable stage is `Endorsement` — as
//! if the process had been killed right after assemble committed, with
//! no live orchestrator ever having run for its contract. Spawning a
//! facade over the same store must pick the transaction up from
//! endorsement and carry it to a receipt without calling back into the
//! domain to re-assemble it.

mod support;

use std::sync::Arc;

use primitive_types::H160;
use ptm_bus::InMemoryEventBus;
use ptm_domain_context::DomainContextManager;
use ptm_facade::{Facade, FacadeDeps};
use ptm_integration_tests::token_domain::TestTokenDomain;
use ptm_node::fakes::{
    InMemoryKeyManager, InMemoryStateStore, InMemorySubmitter, LoopbackTransport, NullReceiptDecoder,
};
use ptm_orchestrator::OrchestratorConfig;
use ptm_store::{InMemoryTransactionStore, TransactionStore};
use ptm_types::{
    AssemblyResult, AttestationRequest, AttestationType, FullState, PostAssembly, PreAssembly,
    PrivateTransaction, SchemaId, Stage, StateId, StateRef, TxId, TxStatus,
};
use support::NOTARY;

#[tokio::test]
async fn resumes_from_endorsement_without_re_assembling() {
    let contract = H160::from_low_u64_be(40);
    let store = InMemoryTransactionStore::new();
    let state_store = Arc::new(InMemoryStateStore::default());
    let domain = Arc::new(TestTokenDomain::new(state_store.clone(), contract, NOTARY.to_string(), NOTARY));
    let domain_context = Arc::new(DomainContextManager::new(state_store));

    let coin = FullState {
        state_ref: StateRef::new(SchemaId::zero(), StateId::from_low_u64_be(1)),
        data: serde_json::json!({ "owner": "n", "amount": 100 }),
        owner: "n".to_string(),
        created_at: 0,
    };
    let notary_plan = AttestationRequest {
        name: "notary".to_string(),
        attestation_type: AttestationType::Endorse,
        algorithm: "ed25519".to_string(),
        payload: Vec::new(),
        parties: vec![NOTARY.to_string()],
    };

    // Pre-seed the store exactly as a crashed orchestrator would have
    // left it: the transaction body already carries a committed
    // assembly result, and its stage history stops at `Endorsement`.
    // No `Orchestrator`/`Worker` has touched this transaction yet in
    // this process — the whole point is that spawning one for the
    // first time must resume it, not wait for a fresh `NewTx`.
    let tx_id = TxId::new_v4();
    let tx = PrivateTransaction {
        id: tx_id,
        submitter: NOTARY.to_string(),
        contract_address: contract,
        domain: "token".to_string(),
        depends_on: Vec::new(),
        idempotency_key: "crash-resume".to_string(),
        pre_assembly: PreAssembly::default(),
        post_assembly: PostAssembly {
            assembly_result: Some(AssemblyResult::Ok),
            input_states: Vec::new(),
            output_states: vec![coin],
            info_states: Vec::new(),
            attestation_plan: vec![notary_plan],
            revert_reason: None,
        },
        dispatch: Default::default(),
    };
    store.upsert_transaction(tx.clone()).await.unwrap();
    for (i, stage) in [
        Stage::Init,
        Stage::VerifierResolution,
        Stage::Assemble,
        Stage::AttestationPlan,
        Stage::Endorsement,
    ]
    .into_iter()
    .enumerate()
    {
        store.append_stage(tx_id, stage, TxStatus::Endorsing, None, i as u64).await.unwrap();
    }

    assert_eq!(domain.assemble_call_count(), 0);

    let facade = Arc::new(Facade::new(FacadeDeps {
        domain: domain.clone(),
        key_manager: Arc::new(InMemoryKeyManager),
        transport: Arc::new(LoopbackTransport::default()),
        submitter: Arc::new(InMemorySubmitter::default()),
        domain_context,
        store: store.clone(),
        decoder: Arc::new(NullReceiptDecoder),
        event_bus: Arc::new(InMemoryEventBus::new()),
        orchestrator_config: OrchestratorConfig::default(),
    }));
    facade.resume_all().await.unwrap();

    let record = support::await_receipt(&facade, tx_id).await.expect("resumed transaction reaches a receipt");
    assert_eq!(domain.assemble_call_count(), 0, "resume must not re-run assemble");
    assert!(record.stages.iter().any(|s| s.stage == Stage::Dispatch), "resumed transaction must reach dispatch");

    facade.shutdown().await;
}
