//! # PTM Node
//!
//! Standalone entry point. Wires the facade to the in-memory fakes and
//! runs one demo transaction through resolve -> assemble -> endorse ->
//! dispatch so a fresh checkout has something to point at before a real
//! domain and real ports are plugged in.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ptm_bus::InMemoryEventBus;
use ptm_domain_context::DomainContextManager;
use ptm_facade::{Facade, FacadeDeps};
use ptm_node::fakes::{
    InMemoryKeyManager, InMemoryStateStore, InMemorySubmitter, LoopbackTransport, MintDomain,
    NullReceiptDecoder,
};
use ptm_node::NodeConfig;
use ptm_store::InMemoryTransactionStore;
use ptm_types::PrivateTransaction;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::default();
    let _telemetry = ptm_telemetry::init_telemetry(config.telemetry.clone())?;

    info!("===========================================");
    info!("  PTM Node v0.1.0");
    info!("===========================================");

    let facade = Arc::new(Facade::new(FacadeDeps {
        domain: Arc::new(MintDomain::default()),
        key_manager: Arc::new(InMemoryKeyManager),
        transport: Arc::new(LoopbackTransport::default()),
        submitter: Arc::new(InMemorySubmitter::default()),
        domain_context: Arc::new(DomainContextManager::new(Arc::new(InMemoryStateStore::default()))),
        store: InMemoryTransactionStore::new(),
        decoder: Arc::new(NullReceiptDecoder),
        event_bus: Arc::new(InMemoryEventBus::new()),
        orchestrator_config: config.orchestrator.clone(),
    }));

    facade.resume_all().await?;

    let demo_tx = PrivateTransaction {
        id: ptm_types::TxId::new_v4(),
        submitter: "alice".to_string(),
        contract_address: primitive_types::H160::from_low_u64_be(1),
        domain: "mint".to_string(),
        depends_on: Vec::new(),
        idempotency_key: "demo-mint-1".to_string(),
        pre_assembly: Default::default(),
        post_assembly: Default::default(),
        dispatch: Default::default(),
    };

    let tx_id = facade.handle_new_tx(demo_tx).await?;
    info!(%tx_id, "demo transaction submitted");

    for _ in 0..50 {
        if let Some(record) = facade.get_tx_status(tx_id).await? {
            if let Some(receipt) = &record.receipt {
                info!(%tx_id, outcome = ?receipt.outcome, "demo transaction reached a receipt");
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down gracefully...");
    facade.shutdown().await;

    Ok(())
}
