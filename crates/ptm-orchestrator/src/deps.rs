use std::sync::Arc;

use ptm_domain_context::DomainContextManager;
use ptm_ports::ReceiptDecoder;
use ptm_store::TransactionStore;
use ptm_types::ContractAddress;

use crate::config::OrchestratorConfig;

/// Everything one contract's orchestrator needs, assembled by
/// `ptm-facade` before calling `Orchestrator::spawn`.
pub struct OrchestratorDeps<D, K, T, Sub> {
    pub contract: ContractAddress,
    pub domain: Arc<D>,
    pub key_manager: Arc<K>,
    pub transport: Arc<T>,
    pub submitter: Arc<Sub>,
    pub domain_context: Arc<DomainContextManager>,
    pub store: Arc<dyn TransactionStore>,
    pub decoder: Arc<dyn ReceiptDecoder>,
    pub event_bus: Arc<ptm_bus::InMemoryEventBus>,
    pub config: OrchestratorConfig,
}
