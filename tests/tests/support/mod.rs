//! Shared harness for the integration tests: one contract, one
//! in-memory facade, wired the same way `ptm_node::main` wires its
//! demo, built around `ptm_integration_tests::token_domain::TestTokenDomain`.

use std::sync::Arc;
use std::time::Duration;

use ptm_bus::InMemoryEventBus;
use ptm_domain_context::DomainContextManager;
use ptm_facade::{Facade, FacadeDeps};
use ptm_integration_tests::token_domain::TestTokenDomain;
use ptm_node::fakes::{
    InMemoryKeyManager, InMemoryStateStore, InMemorySubmitter, LoopbackTransport, NullReceiptDecoder,
};
use ptm_orchestrator::OrchestratorConfig;
use ptm_store::{InMemoryTransactionStore, TransactionRecord};
use ptm_types::{ContractAddress, PrivateTransaction, TxId};

pub type TestFacade = Facade<TestTokenDomain, InMemoryKeyManager, LoopbackTransport, InMemorySubmitter>;

pub const NOTARY: &str = "notary";

/// Everything one node of the test topology needs, exposed alongside
/// the facade so tests can reach into the domain context's witness
/// counter or the transport's recorded messages.
pub struct Harness {
    pub facade: Arc<TestFacade>,
    pub domain: Arc<TestTokenDomain>,
    pub domain_context: Arc<DomainContextManager>,
    pub transport: Arc<LoopbackTransport>,
}

pub fn new_harness(contract: ContractAddress, notary_party: &str) -> Harness {
    new_harness_with_config(contract, notary_party, OrchestratorConfig::default())
}

pub fn new_harness_with_config(
    contract: ContractAddress,
    notary_party: &str,
    orchestrator_config: OrchestratorConfig,
) -> Harness {
    let store = Arc::new(InMemoryStateStore::default());
    let domain = Arc::new(TestTokenDomain::new(store.clone(), contract, NOTARY.to_string(), notary_party));
    let domain_context = Arc::new(DomainContextManager::new(store));
    let transport = Arc::new(LoopbackTransport::default());
    let facade = Arc::new(Facade::new(FacadeDeps {
        domain: domain.clone(),
        key_manager: Arc::new(InMemoryKeyManager),
        transport: transport.clone(),
        submitter: Arc::new(InMemorySubmitter::default()),
        domain_context: domain_context.clone(),
        store: InMemoryTransactionStore::new(),
        decoder: Arc::new(NullReceiptDecoder),
        event_bus: Arc::new(InMemoryEventBus::new()),
        orchestrator_config,
    }));
    Harness { facade, domain, domain_context, transport }
}

pub fn make_tx(contract: ContractAddress, submitter: &str, idempotency_key: &str) -> PrivateTransaction {
    PrivateTransaction {
        id: TxId::new_v4(),
        submitter: submitter.to_string(),
        contract_address: contract,
        domain: "token".to_string(),
        depends_on: Vec::new(),
        idempotency_key: idempotency_key.to_string(),
        pre_assembly: Default::default(),
        post_assembly: Default::default(),
        dispatch: Default::default(),
    }
}

/// Polls `get_tx_status` until a receipt lands or the deadline passes.
pub async fn await_receipt(facade: &TestFacade, tx_id: TxId) -> Option<TransactionRecord> {
    for _ in 0..500 {
        if let Some(record) = facade.get_tx_status(tx_id).await.unwrap() {
            if record.receipt.is_some() {
                return Some(record);
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

/// Polls `get_tx_status` until the transaction reaches (at least) the
/// given stage's status, or the deadline passes.
pub async fn await_status(facade: &TestFacade, tx_id: TxId, status: ptm_types::TxStatus) -> bool {
    for _ in 0..500 {
        if let Some(record) = facade.get_tx_status(tx_id).await.unwrap() {
            if record.status == status {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Polls until `stage` has appeared at least once in the transaction's
/// recorded history, or the deadline passes.
pub async fn await_stage(facade: &TestFacade, tx_id: TxId, stage: ptm_types::Stage) -> bool {
    for _ in 0..500 {
        if let Some(record) = facade.get_tx_status(tx_id).await.unwrap() {
            if record.stages.iter().any(|s| s.stage == stage) {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Polls until a message correlated to `tx_id` has been recorded by
/// the loopback transport, returning it.
pub async fn await_sent_message(
    transport: &LoopbackTransport,
    tx_id: TxId,
) -> Option<ptm_ports::ReliableMessage> {
    for _ in 0..500 {
        if let Some(message) = transport.sent_messages().into_iter().find(|m| m.correlation_id == tx_id) {
            return Some(message);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}
