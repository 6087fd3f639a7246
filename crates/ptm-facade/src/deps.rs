use std::sync::Arc;

use ptm_domain_context::DomainContextManager;
use ptm_orchestrator::OrchestratorConfig;
use ptm_ports::ReceiptDecoder;
use ptm_store::TransactionStore;

/// Everything a `Facade` needs, shared across every contract it serves.
/// One `Facade` instance corresponds to one domain-plugin configuration
/// (the same `domain`/`key_manager`/`transport`/`submitter` instances
/// back every orchestrator this facade creates); a node running more
/// than one domain configuration runs one `Facade` per configuration.
pub struct FacadeDeps<D, K, T, Sub> {
    pub domain: Arc<D>,
    pub key_manager: Arc<K>,
    pub transport: Arc<T>,
    pub submitter: Arc<Sub>,
    pub domain_context: Arc<DomainContextManager>,
    pub store: Arc<dyn TransactionStore>,
    pub decoder: Arc<dyn ReceiptDecoder>,
    pub event_bus: Arc<ptm_bus::InMemoryEventBus>,
    pub orchestrator_config: OrchestratorConfig,
}
