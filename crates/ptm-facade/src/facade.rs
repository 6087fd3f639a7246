//! The process's single entry point. Grounded on the registry pattern
//! `node-runtime::registry::SubsystemRegistry` establishes for holding
//! one handle per running component behind a `parking_lot::RwLock`-
//! guarded map, keyed here by contract address instead of subsystem id,
//! and created lazily rather than all at startup — per-contract
//! orchestrators don't exist until the contract's first transaction.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use ptm_orchestrator::{Orchestrator, OrchestratorDeps};
use ptm_ports::{DomainPlugin, KeyManager, PublicTxSubmitter, ReliableMessage, TransportManager};
use ptm_store::{TransactionRecord, TxQuery};
use ptm_telemetry::TRANSACTIONS_SUBMITTED;
use ptm_types::{ContractAddress, PrivateTransaction, PtmError, TxId};
use tracing::{instrument, warn};

use crate::deps::FacadeDeps;

pub struct Facade<D, K, T, Sub> {
    deps: FacadeDeps<D, K, T, Sub>,
    orchestrators: RwLock<HashMap<ContractAddress, Orchestrator<D, K, T>>>,
}

impl<D, K, T, Sub> Facade<D, K, T, Sub>
where
    D: DomainPlugin + 'static,
    K: KeyManager + 'static,
    T: TransportManager + 'static,
    Sub: PublicTxSubmitter + 'static,
{
    pub fn new(deps: FacadeDeps<D, K, T, Sub>) -> Self {
        Self { deps, orchestrators: RwLock::new(HashMap::new()) }
    }

    /// Returns the orchestrator for `contract`, spawning one on first
    /// use. Every clone returned shares the same loop.
    fn orchestrator_for(&self, contract: ContractAddress) -> Orchestrator<D, K, T> {
        if let Some(existing) = self.orchestrators.read().get(&contract) {
            return existing.clone();
        }

        let mut orchestrators = self.orchestrators.write();
        if let Some(existing) = orchestrators.get(&contract) {
            return existing.clone();
        }

        let spawned = Orchestrator::spawn(OrchestratorDeps {
            contract,
            domain: self.deps.domain.clone(),
            key_manager: self.deps.key_manager.clone(),
            transport: self.deps.transport.clone(),
            submitter: self.deps.submitter.clone(),
            domain_context: self.deps.domain_context.clone(),
            store: self.deps.store.clone(),
            decoder: self.deps.decoder.clone(),
            event_bus: self.deps.event_bus.clone(),
            config: self.deps.orchestrator_config.clone(),
        });
        orchestrators.insert(contract, spawned.clone());
        spawned
    }

    /// Accepts a new transaction: persists it (idempotently, by its
    /// idempotency key) and hands it to the owning contract's
    /// orchestrator, creating that orchestrator on first use.
    #[instrument(skip(self, tx), fields(contract = ?tx.contract_address, idempotency_key = %tx.idempotency_key))]
    pub async fn handle_new_tx(&self, tx: PrivateTransaction) -> Result<TxId, PtmError> {
        let contract = tx.contract_address;
        let tx_id = self.deps.store.upsert_transaction(tx).await?;
        TRANSACTIONS_SUBMITTED.inc();
        let orchestrator = self.orchestrator_for(contract);
        if !orchestrator.handle_new(tx_id).await {
            warn!(?tx_id, "orchestrator deferred admission, at max_concurrent_process");
        }
        Ok(tx_id)
    }

    /// Dry-run query path. Never touches an orchestrator or the
    /// sequencer; invokes the domain's call handler directly and
    /// returns its decoded result.
    pub async fn call_private_smart_contract(
        &self,
        tx: &PrivateTransaction,
        function: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, PtmError> {
        self.deps
            .domain
            .call(tx, function, args)
            .await
            .map_err(|err| PtmError::StoreTransient(err.to_string()))
    }

    /// Routes an inbound transport message to whichever side of the
    /// remote-endorsement protocol it belongs to: an
    /// `endorsement_response` goes to the owning contract's gatherer (a
    /// stray response with no live orchestrator is dropped); an
    /// `endorsement_request` is serviced locally and, if the domain
    /// plugin answers, sent back over transport as an
    /// `endorsement_response`.
    pub async fn receive_transport_message(
        &self,
        contract: ContractAddress,
        message: ReliableMessage,
    ) -> Result<(), PtmError> {
        match message.message_type.as_str() {
            "endorsement_response" => {
                let Some(orchestrator) = self.orchestrators.read().get(&contract).cloned() else {
                    warn!(?contract, "endorsement_response for a contract with no live orchestrator");
                    return Ok(());
                };
                if !orchestrator.receive_endorsement(&message) {
                    warn!(?contract, correlation_id = ?message.correlation_id, "endorsement_response unmatched or stale");
                }
                Ok(())
            }
            "endorsement_request" => {
                if let Some(reply) =
                    ptm_endorsement::respond_to_remote_request(self.deps.domain.as_ref(), &message).await
                {
                    self.deps
                        .transport
                        .send(reply)
                        .await
                        .map_err(|err| PtmError::TransportTransient(err.to_string()))?;
                }
                Ok(())
            }
            other => {
                warn!(message_type = %other, "unrecognized transport message type");
                Ok(())
            }
        }
    }

    /// Reads a transaction's current status, stage history, and receipt
    /// (once finalized) straight from the durable store. Every stage
    /// transition is persisted by the owning orchestrator before it
    /// advances to the next stage, so the store is always current; no
    /// separate live in-memory path is needed.
    pub async fn get_tx_status(&self, tx_id: TxId) -> Result<Option<TransactionRecord>, PtmError> {
        self.deps.store.get_by_id(tx_id).await.map_err(Into::into)
    }

    /// Spawns an orchestrator for every contract with a non-terminal
    /// transaction already on record, so each one resumes from its last
    /// durable stage (`Worker::run` does this on spawn) instead of
    /// sitting dormant until a fresh transaction happens to arrive for
    /// that contract. Call once after constructing the facade, before
    /// accepting new work, on a restart against a durable store.
    pub async fn resume_all(&self) -> Result<(), PtmError> {
        let records = self.deps.store.query(TxQuery::default()).await?;
        let mut contracts: Vec<ContractAddress> = records
            .into_iter()
            .filter(|r| r.receipt.is_none())
            .map(|r| r.transaction.contract_address)
            .collect();
        contracts.sort();
        contracts.dedup();
        for contract in contracts {
            self.orchestrator_for(contract);
        }
        Ok(())
    }

    /// Gracefully stops every orchestrator this facade has spawned.
    pub async fn shutdown(&self) {
        let handles: Vec<Orchestrator<D, K, T>> = self.orchestrators.read().values().cloned().collect();
        for orchestrator in handles {
            orchestrator.stop().await;
        }
    }
}
