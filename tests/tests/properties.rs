//! The testable properties: idempotency, assemble serialization, and
//! no spurious dispatch after a facade has been shut down. Receipt
//! immutability is already covered at the store level by
//! `ptm-store::store::tests::finalize_receipt_is_immutable_once_written`.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use primitive_types::H160;
use ptm_bus::InMemoryEventBus;
use ptm_domain_context::DomainContextManager;
use ptm_facade::{Facade, FacadeDeps};
use ptm_node::fakes::{
    InMemoryKeyManager, InMemoryStateStore, InMemorySubmitter, LoopbackTransport, NullReceiptDecoder,
};
use ptm_orchestrator::OrchestratorConfig;
use ptm_ports::{DomainError, DomainPlugin};
use ptm_store::InMemoryTransactionStore;
use ptm_types::{
    AssemblyResult, AttestationResult, BaseLedgerTx, FullState, PostAssembly, PreAssembly,
    PrivateTransaction, PtmError, StateId, StateRef, TxId, Verifier,
};
use support::{make_tx, new_harness, await_receipt, NOTARY};

#[tokio::test]
async fn reusing_an_idempotency_key_with_a_different_submitter_is_rejected() {
    let contract = H160::from_low_u64_be(10);
    let h = new_harness(contract, NOTARY);

    let first = make_tx(contract, "alice", "shared-key");
    h.domain.register_mint(first.id, "alice", 1);
    h.facade.handle_new_tx(first).await.unwrap();

    let second = make_tx(contract, "bob", "shared-key");
    let err = h.facade.handle_new_tx(second).await.unwrap_err();
    assert!(matches!(err, PtmError::IdempotencyMismatch { key } if key == "shared-key"));

    h.facade.shutdown().await;
}

#[tokio::test]
async fn resubmitting_the_same_idempotency_key_returns_the_same_tx_id() {
    let contract = H160::from_low_u64_be(11);
    let h = new_harness(contract, NOTARY);

    let first = make_tx(contract, "alice", "dup-key");
    h.domain.register_mint(first.id, "alice", 1);
    let first_id = h.facade.handle_new_tx(first.clone()).await.unwrap();

    let mut resend = make_tx(contract, "alice", "dup-key");
    resend.id = TxId::new_v4();
    let second_id = h.facade.handle_new_tx(resend).await.unwrap();

    assert_eq!(first_id, second_id);
    h.facade.shutdown().await;
}

#[tokio::test]
async fn no_spurious_dispatch_after_shutdown() {
    let contract = H160::from_low_u64_be(12);
    let h = new_harness(contract, NOTARY);

    let warm_up = make_tx(contract, NOTARY, "warm-up");
    h.domain.register_mint(warm_up.id, "alice", 1);
    let warm_up_id = h.facade.handle_new_tx(warm_up).await.unwrap();
    await_receipt(&h.facade, warm_up_id).await.expect("warm-up reached a receipt");

    h.facade.shutdown().await;

    let after_shutdown = make_tx(contract, NOTARY, "after-shutdown");
    h.domain.register_mint(after_shutdown.id, "alice", 1);
    let after_shutdown_id = h.facade.handle_new_tx(after_shutdown).await.unwrap();

    // The orchestrator's loop has already exited; nothing ever drains
    // the queued event, so this can never reach a receipt.
    assert!(await_receipt(&h.facade, after_shutdown_id).await.is_none());
}

/// A domain whose `assemble_transaction` records how many calls are
/// executing at once, and sleeps long enough that two overlapping
/// calls (if the orchestrator ever let them through) would be caught
/// rather than finishing too fast to observe.
struct WitnessDomain {
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    next_state_id: AtomicUsize,
}

impl Default for WitnessDomain {
    fn default() -> Self {
        Self {
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            next_state_id: AtomicUsize::new(1),
        }
    }
}

#[async_trait]
impl DomainPlugin for WitnessDomain {
    async fn init_transaction(&self, _tx: &PrivateTransaction) -> Result<PreAssembly, DomainError> {
        Ok(PreAssembly::default())
    }

    async fn assemble_transaction(
        &self,
        tx: &PrivateTransaction,
        _resolved_verifiers: &[Verifier],
    ) -> Result<PostAssembly, DomainError> {
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        let id = self.next_state_id.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(PostAssembly {
            assembly_result: Some(AssemblyResult::Ok),
            input_states: Vec::new(),
            output_states: vec![FullState {
                state_ref: StateRef::new(Default::default(), StateId::from_low_u64_be(id)),
                data: serde_json::json!({ "owner": tx.submitter, "amount": 1 }),
                owner: tx.submitter.clone(),
                created_at: 0,
            }],
            info_states: Vec::new(),
            attestation_plan: Vec::new(),
            revert_reason: None,
        })
    }

    async fn endorse_transaction(
        &self,
        _tx: &PrivateTransaction,
        _plan_entry: &ptm_types::AttestationRequest,
        _resolved_verifiers: &[Verifier],
        _inputs: &[FullState],
        _outputs: &[FullState],
        _info: &[FullState],
    ) -> Result<AttestationResult, DomainError> {
        unreachable!("this domain never plans an attestation")
    }

    async fn prepare_transaction(
        &self,
        _tx: &PrivateTransaction,
        _attestation_results: &[AttestationResult],
    ) -> Result<Vec<BaseLedgerTx>, DomainError> {
        Ok(vec![BaseLedgerTx { payload: b"witness".to_vec(), nonce: None }])
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

#[tokio::test]
async fn assembles_against_one_contract_never_overlap() {
    let contract = H160::from_low_u64_be(13);
    let domain = Arc::new(WitnessDomain::default());
    let state_store = Arc::new(InMemoryStateStore::default());
    let domain_context = Arc::new(DomainContextManager::new(state_store.clone()));
    let facade = Arc::new(Facade::new(FacadeDeps {
        domain: domain.clone(),
        key_manager: Arc::new(InMemoryKeyManager),
        transport: Arc::new(LoopbackTransport::default()),
        submitter: Arc::new(InMemorySubmitter::default()),
        domain_context,
        store: InMemoryTransactionStore::new(),
        decoder: Arc::new(NullReceiptDecoder),
        event_bus: Arc::new(InMemoryEventBus::new()),
        orchestrator_config: OrchestratorConfig {
            max_concurrent_process: 32,
            ..OrchestratorConfig::default()
        },
    }));

    let mut tx_ids = Vec::new();
    for i in 0..8 {
        let tx = make_tx(contract, "alice", &format!("witness-{i}"));
        tx_ids.push(facade.handle_new_tx(tx).await.unwrap());
    }

    for tx_id in tx_ids {
        await_receipt(&facade, tx_id).await.expect("witness tx reached a receipt");
    }

    assert_eq!(domain.max_concurrent.load(Ordering::SeqCst), 1);
    facade.shutdown().await;
}

/// A transaction submitted while the orchestrator is already at
/// `max_concurrent_process` is deferred rather than admitted, per §4.5
/// backpressure: `handle_new` persists it but never hands it a stage
/// record. It must still reach a receipt once a slot frees up, driven
/// by the tick/completion-triggered admission scan rather than waiting
/// forever for a `NewTx` event that will never come.
#[tokio::test]
async fn a_deferred_transaction_is_eventually_admitted() {
    let contract = H160::from_low_u64_be(14);
    let domain = Arc::new(WitnessDomain::default());
    let state_store = Arc::new(InMemoryStateStore::default());
    let domain_context = Arc::new(DomainContextManager::new(state_store.clone()));
    let facade = Arc::new(Facade::new(FacadeDeps {
        domain: domain.clone(),
        key_manager: Arc::new(InMemoryKeyManager),
        transport: Arc::new(LoopbackTransport::default()),
        submitter: Arc::new(InMemorySubmitter::default()),
        domain_context,
        store: InMemoryTransactionStore::new(),
        decoder: Arc::new(NullReceiptDecoder),
        event_bus: Arc::new(InMemoryEventBus::new()),
        orchestrator_config: OrchestratorConfig {
            max_concurrent_process: 1,
            tick_interval: Duration::from_millis(20),
            ..OrchestratorConfig::default()
        },
    }));

    let mut tx_ids = Vec::new();
    for i in 0..4 {
        let tx = make_tx(contract, "alice", &format!("deferred-{i}"));
        tx_ids.push(facade.handle_new_tx(tx).await.unwrap());
    }

    for tx_id in tx_ids {
        assert!(
            await_receipt(&facade, tx_id).await.is_some(),
            "deferred transaction {tx_id} never reached a receipt"
        );
    }

    facade.shutdown().await;
}

