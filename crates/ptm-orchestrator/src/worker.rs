//! The event loop itself. One `Worker` owns exactly one contract's
//! in-flight transactions and is never touched from outside its own
//! `tokio::spawn`ed task — every mutation of `TxRuntimeState` happens
//! here, nowhere else.
//!
//! Grounded on `qc-08-consensus::ConsensusService`'s dependency shape
//! (generic over the port traits it calls out to, concrete owned state
//! for everything it mutates itself) and on the choreography described
//! for the orchestrator: background calls are `tokio::spawn`ed and
//! report back as `StageResult` events through the same channel they
//! were dispatched from.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ptm_bus::{EventPublisher, InMemoryEventBus, OrchestratorReceiver, OrchestratorSender, PtmEvent};
use ptm_domain_context::DomainContextManager;
use ptm_endorsement::EndorsementGatherer;
use ptm_ports::{
    DomainPlugin, KeyManager, PublicTxSubmitter, ReceiptDecoder, RequestOptions, SubmitterError,
    TransportManager,
};
use ptm_sequencer::Sequencer;
use ptm_stage_controller::StageController;
use ptm_store::{TransactionRecord, TransactionStore, TxQuery};
use ptm_telemetry::{AssembleInFlightGuard, COMPONENT_ERRORS, DISPATCHES, RECEIPTS};
use ptm_types::{
    AssemblyResult, AttestationResult, BaseLedgerTx, ContractAddress, OrchestratorEvent,
    PostAssembly, PreAssembly, PrivateTransaction, PtmError, ReceiptOutcome, Stage, StageOutcome,
    StageResultEvent, TxId, TxStatus, Verifier,
};
use tokio::sync::Notify;
use tracing::{info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::runtime::{BackgroundOutcome, ResultMailbox, TxRuntimeState};

/// A generic submitter rejection is a `SubmitterRejected`; an on-chain
/// revert is distinguished so `settle_terminal` can decode it and
/// preserve the raw bytes per §4.6, rather than collapsing everything
/// into a single message string.
fn submit_error_to_ptm(tx_id: TxId, err: SubmitterError) -> PtmError {
    match err {
        SubmitterError::OnChainRevert(revert_data) => PtmError::DispatchReverted { tx_id, revert_data },
        other => PtmError::SubmitterRejected { tx_id, reason: other.to_string() },
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn tx_status_for(stage: Stage) -> TxStatus {
    match stage {
        Stage::PreInit | Stage::Init | Stage::VerifierResolution | Stage::Parked => TxStatus::Pending,
        Stage::Assemble | Stage::AttestationPlan => TxStatus::Assembled,
        Stage::Endorsement | Stage::DispatchResolve => TxStatus::Endorsing,
        Stage::Dispatch => TxStatus::Dispatching,
        Stage::Complete => TxStatus::Dispatched,
        Stage::Reverted => TxStatus::Reverted,
        Stage::Failed => TxStatus::Failed,
    }
}

/// Resolves every `PreAssembly.required_verifiers` lookup against the
/// key manager. Shared by the normal verifier-resolution stage and by
/// resume, which needs the same lookups recomputed since resolved
/// verifiers are never persisted.
async fn resolve_verifiers<K: KeyManager>(
    key_manager: &K,
    pre_assembly: &PreAssembly,
) -> Result<HashMap<String, Verifier>, PtmError> {
    let mut resolved = HashMap::new();
    for required in &pre_assembly.required_verifiers {
        let (_, verifier) = key_manager
            .resolve_key(&required.lookup, &required.algorithm, &required.verifier_type)
            .await
            .map_err(|_| PtmError::VerifierUnresolvable { lookup: required.lookup.clone() })?;
        resolved.insert(required.lookup.clone(), verifier);
    }
    Ok(resolved)
}

/// Posts one background call's result back to the owning loop. The
/// mailbox only ever holds successes; a failure travels entirely on
/// the `StageResult` event as `StageOutcome::Failed`/`Retry`.
fn spawn_background<Fut>(
    sender: OrchestratorSender,
    mailbox: ResultMailbox,
    tx_id: TxId,
    stage: Stage,
    fut: Fut,
) where
    Fut: std::future::Future<Output = Result<BackgroundOutcome, PtmError>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = fut.await;
        let outcome = match &result {
            Ok(_) => StageOutcome::Advanced,
            Err(err) if err.is_retryable() => StageOutcome::Retry(err.clone()),
            Err(err) => StageOutcome::Failed(err.clone()),
        };
        if let Ok(value) = result {
            mailbox.deposit(tx_id, value);
        }
        let _ = sender
            .send(OrchestratorEvent::StageResult(StageResultEvent { tx_id, stage, outcome }))
            .await;
    });
}

pub struct Worker<D, K, T, Sub> {
    contract: ContractAddress,
    domain: Arc<D>,
    key_manager: Arc<K>,
    submitter: Arc<Sub>,
    gatherer: Arc<EndorsementGatherer<K, T, D>>,
    domain_context: Arc<DomainContextManager>,
    store: Arc<dyn TransactionStore>,
    decoder: Arc<dyn ReceiptDecoder>,
    event_bus: Arc<InMemoryEventBus>,
    sequencer: Sequencer,
    txs: HashMap<TxId, TxRuntimeState>,
    mailbox: ResultMailbox,
    self_sender: OrchestratorSender,
    in_flight: Arc<AtomicUsize>,
    config: OrchestratorConfig,
}

impl<D, K, T, Sub> Worker<D, K, T, Sub>
where
    D: DomainPlugin + 'static,
    K: KeyManager + 'static,
    T: TransportManager + 'static,
    Sub: PublicTxSubmitter + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contract: ContractAddress,
        domain: Arc<D>,
        key_manager: Arc<K>,
        transport: Arc<T>,
        submitter: Arc<Sub>,
        domain_context: Arc<DomainContextManager>,
        store: Arc<dyn TransactionStore>,
        decoder: Arc<dyn ReceiptDecoder>,
        event_bus: Arc<InMemoryEventBus>,
        self_sender: OrchestratorSender,
        in_flight: Arc<AtomicUsize>,
        config: OrchestratorConfig,
    ) -> Self {
        let gatherer = Arc::new(EndorsementGatherer::new(
            key_manager.clone(),
            transport,
            domain.clone(),
        ));
        Self {
            contract,
            domain,
            key_manager,
            submitter,
            gatherer,
            domain_context,
            store,
            decoder,
            event_bus,
            sequencer: Sequencer::new(),
            txs: HashMap::new(),
            mailbox: ResultMailbox::new(),
            self_sender,
            in_flight,
            config,
        }
    }

    pub fn gatherer(&self) -> Arc<EndorsementGatherer<K, T, D>> {
        self.gatherer.clone()
    }

    pub async fn run(mut self, mut rx: OrchestratorReceiver, stop_signal: Arc<Notify>) {
        self.resume_pending().await;

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.tick().await; // first tick fires immediately, skip it

        loop {
            tokio::select! {
                biased;

                _ = stop_signal.notified() => {
                    info!(in_flight = self.in_flight.load(Ordering::SeqCst), "orchestrator stopping, draining");
                    while self.in_flight.load(Ordering::SeqCst) > 0 {
                        match rx.recv().await {
                            Some(event) => self.handle_event(event).await,
                            None => break,
                        }
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
                _ = ticker.tick() => self.handle_event(OrchestratorEvent::Tick).await,
            }
        }
    }

    async fn handle_event(&mut self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::NewTx(tx_id) => self.on_new_tx(tx_id).await,
            OrchestratorEvent::StageResult(result) => self.on_stage_result(result).await,
            OrchestratorEvent::Tick => self.on_tick().await,
            OrchestratorEvent::Cancellation(tx_id) => self.on_cancellation(tx_id).await,
        }
    }

    #[instrument(skip(self), fields(tx_id = ?tx_id))]
    async fn on_new_tx(&mut self, tx_id: TxId) {
        if self.txs.contains_key(&tx_id) {
            return;
        }
        let record = match self.store.get_by_id(tx_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!("new_tx event for unknown transaction");
                self.release_slot();
                return;
            }
            Err(err) => {
                warn!(%err, "store unavailable while accepting new transaction");
                self.release_slot();
                return;
            }
        };

        let mut state = TxRuntimeState::new(record.transaction);
        state.stage = StageController::accept();
        let tx = state.tx.clone();
        self.txs.insert(tx_id, state);
        self.persist(tx_id, Stage::Init, None).await;
        self.spawn_init(tx_id, tx);
    }

    async fn on_stage_result(&mut self, result: StageResultEvent) {
        let StageResultEvent { tx_id, stage, outcome } = result;

        match outcome {
            StageOutcome::Retry(err) => {
                warn!(?tx_id, ?stage, %err, "retrying stage after transient error");
                self.retry_stage(tx_id, stage);
                return;
            }
            StageOutcome::Failed(err) => {
                self.settle_terminal(tx_id, err).await;
                return;
            }
            StageOutcome::Advanced => {}
        }

        let Some(outcome) = self.mailbox.take(tx_id) else {
            warn!(?tx_id, ?stage, "advanced stage result with no mailbox entry");
            return;
        };

        match (stage, outcome) {
            (Stage::Init, BackgroundOutcome::Init(pre_assembly)) => {
                self.on_init_complete(tx_id, pre_assembly).await
            }
            (Stage::VerifierResolution, BackgroundOutcome::VerifiersResolved(resolved)) => {
                self.on_verifiers_resolved(tx_id, resolved).await
            }
            (Stage::Assemble, BackgroundOutcome::Assembled(post)) => {
                self.on_assembled(tx_id, post).await
            }
            (Stage::Endorsement, BackgroundOutcome::Endorsed(results)) => {
                self.on_endorsed(tx_id, results).await
            }
            (Stage::DispatchResolve, BackgroundOutcome::Prepared { signer, base_ledger_txs }) => {
                self.on_prepared(tx_id, signer, base_ledger_txs).await
            }
            (Stage::Dispatch, BackgroundOutcome::Dispatched { nonce }) => {
                self.on_dispatched(tx_id, nonce).await
            }
            (stage, _) => warn!(?tx_id, ?stage, "stage result / mailbox outcome mismatch"),
        }
    }

    async fn on_tick(&mut self) {
        let waiting: Vec<TxId> = self
            .txs
            .iter()
            .filter(|(_, s)| s.stage == Stage::DispatchResolve)
            .map(|(id, _)| *id)
            .collect();
        for tx_id in waiting {
            self.try_advance_dispatch(tx_id).await;
        }
        self.admit_deferred().await;
    }

    async fn on_cancellation(&mut self, tx_id: TxId) {
        if self.txs.remove(&tx_id).is_some() {
            self.mailbox.take(tx_id);
            self.release_slot();
            self.admit_deferred().await;
        }
    }

    /// Re-evaluates persisted-but-unadmitted transactions against the
    /// current free-slot count. `handle_new` defers a transaction past
    /// `max_concurrent_process` without ever inserting it into `txs` or
    /// giving it a stage record, so it is invisible to every other path
    /// in this file; this is the admission scan that eventually lets it
    /// in, driven by every tick and every slot release, per the
    /// backpressure contract ("a future tick or the completion of an
    /// in-flight tx triggers evaluation which admits it").
    async fn admit_deferred(&mut self) {
        let free = self.config.max_concurrent_process.saturating_sub(self.in_flight.load(Ordering::SeqCst));
        if free == 0 {
            return;
        }

        let records = match self
            .store
            .query(TxQuery { contract: Some(self.contract), status: Some(TxStatus::Pending), limit: None })
            .await
        {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "failed to scan store for deferred admissions");
                return;
            }
        };

        let candidates: Vec<TxId> = records
            .into_iter()
            .filter(|r| r.stages.is_empty() && r.receipt.is_none() && !self.txs.contains_key(&r.transaction.id))
            .map(|r| r.transaction.id)
            .take(free)
            .collect();

        for tx_id in candidates {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            self.on_new_tx(tx_id).await;
        }
    }

    /// Reloads this contract's non-terminal transactions before the loop
    /// starts taking new events, so a restart picks every one of them up
    /// from its last durable stage instead of waiting for a fresh
    /// `NewTx`/`Tick` to notice them. Stage transitions are append-only,
    /// so the store is the only source of truth needed here; nothing
    /// in-memory (the sequencer's graph, resolved verifiers, gathered
    /// attestations) survives a restart and has to be rebuilt.
    async fn resume_pending(&mut self) {
        let records = match self
            .store
            .query(TxQuery { contract: Some(self.contract), status: None, limit: None })
            .await
        {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "failed to load transactions for resume");
                return;
            }
        };

        let mut pending: Vec<TransactionRecord> =
            records.into_iter().filter(|r| r.receipt.is_none()).collect();
        // Registering transactions with the sequencer in their original
        // assemble order matters: a transfer registered before the mint
        // that produced its input state would see no producer yet and
        // silently drop the dependency edge.
        pending.sort_by_key(|r| r.stages.first().map(|s| s.recorded_at).unwrap_or(0));

        for record in pending {
            self.resume_one(record).await;
        }

        // A transaction `handle_new` deferred before the crash has no
        // stage record, so the loop above never sees it; pick it up
        // immediately rather than waiting for the first tick.
        self.admit_deferred().await;
    }

    async fn resume_one(&mut self, record: TransactionRecord) {
        let tx_id = record.transaction.id;
        let Some(last) = record.stages.last() else { return };
        let stage = last.stage;
        if stage.is_terminal() {
            return;
        }

        let tx = record.transaction;
        let mut state = TxRuntimeState::new(tx.clone());
        state.stage = stage;
        self.txs.insert(tx_id, state);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        info!(?tx_id, ?stage, "resuming transaction from last durable stage");

        match stage {
            Stage::PreInit | Stage::Init => self.spawn_init(tx_id, tx),
            // Resolved verifiers never persisted; re-resolving is the
            // only way back to an assemble call with correct verifiers,
            // whether the crash landed before or during assemble itself.
            Stage::VerifierResolution | Stage::Assemble => {
                if let Some(state) = self.txs.get_mut(&tx_id) {
                    state.stage = Stage::VerifierResolution;
                }
                self.spawn_resolve_verifiers(tx_id, tx.pre_assembly.clone());
            }
            // Assembly already committed to the domain context by this
            // point; re-running it would be wrong, so pick up from
            // endorsement instead. `gathered` attestations are likewise
            // never persisted, so a crash mid-`DispatchResolve` before a
            // signer is recorded falls back here too rather than calling
            // `prepare_transaction` with no attestations to show it.
            Stage::AttestationPlan | Stage::Endorsement => {
                self.resume_from_endorsement(tx_id, tx).await;
            }
            // Nothing ever un-parks a parked transaction today, crash or
            // not; reload it so it still occupies its slot and leave it
            // there rather than inventing a retry path for it.
            Stage::Parked => {}
            Stage::DispatchResolve if tx.dispatch.signer.is_none() => {
                self.resume_from_endorsement(tx_id, tx).await;
            }
            Stage::DispatchResolve => {
                if let Err(err) = self.sequencer.register_transaction(&tx) {
                    let ptm_err = err.into_ptm_error(tx_id);
                    self.settle_terminal(tx_id, ptm_err).await;
                    return;
                }
                self.try_advance_dispatch(tx_id).await;
            }
            // A prior submission may already have gone out before the
            // crash; the submitter isn't idempotency-aware, so resuming
            // here can double-submit. Documented limitation, not solved
            // in full generality here.
            Stage::Dispatch => {
                if let Err(err) = self.sequencer.register_transaction(&tx) {
                    let ptm_err = err.into_ptm_error(tx_id);
                    self.settle_terminal(tx_id, ptm_err).await;
                    return;
                }
                let base_ledger_txs = tx.dispatch.base_ledger_txs.clone();
                self.spawn_submit(tx_id, tx, base_ledger_txs);
            }
            Stage::Complete | Stage::Reverted | Stage::Failed => unreachable!("filtered above"),
        }
    }

    async fn resume_from_endorsement(&mut self, tx_id: TxId, tx: PrivateTransaction) {
        if let Err(err) = self.sequencer.register_transaction(&tx) {
            let ptm_err = err.into_ptm_error(tx_id);
            self.settle_terminal(tx_id, ptm_err).await;
            return;
        }

        let resolved = match resolve_verifiers(self.key_manager.as_ref(), &tx.pre_assembly).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.settle_terminal(tx_id, err).await;
                return;
            }
        };
        let verifiers = match StageController::resolve_verifiers(&tx.pre_assembly, &resolved) {
            Ok(verifiers) => verifiers,
            Err(err) => {
                self.settle_terminal(tx_id, err).await;
                return;
            }
        };

        if let Some(state) = self.txs.get_mut(&tx_id) {
            state.resolved_verifiers = resolved;
            state.stage = Stage::Endorsement;
        }
        self.persist(tx_id, Stage::Endorsement, None).await;
        let post = tx.post_assembly.clone();
        self.spawn_endorse(tx_id, tx, verifiers, post);
    }

    async fn on_init_complete(&mut self, tx_id: TxId, pre_assembly: PreAssembly) {
        let Some(state) = self.txs.get_mut(&tx_id) else { return };
        state.tx.pre_assembly = pre_assembly.clone();
        state.stage = StageController::init_complete(&pre_assembly);
        self.persist(tx_id, Stage::VerifierResolution, None).await;
        self.spawn_resolve_verifiers(tx_id, pre_assembly);
    }

    async fn on_verifiers_resolved(&mut self, tx_id: TxId, resolved: HashMap<String, Verifier>) {
        let Some(state) = self.txs.get(&tx_id) else { return };
        match StageController::resolve_verifiers(&state.tx.pre_assembly, &resolved) {
            Ok(verifiers) => {
                let tx = state.tx.clone();
                let state = self.txs.get_mut(&tx_id).unwrap();
                state.resolved_verifiers = resolved;
                state.stage = Stage::Assemble;
                self.persist(tx_id, Stage::Assemble, None).await;
                self.spawn_assemble(tx_id, tx, verifiers);
            }
            Err(err) => self.settle_terminal(tx_id, err).await,
        }
    }

    async fn on_assembled(&mut self, tx_id: TxId, post: PostAssembly) {
        match StageController::after_assemble(&post) {
            Ok(_) => {
                let tx_snapshot = {
                    let Some(state) = self.txs.get_mut(&tx_id) else { return };
                    state.tx.post_assembly = post.clone();
                    state.stage = Stage::AttestationPlan;
                    state.tx.clone()
                };
                self.persist(tx_id, Stage::AttestationPlan, None).await;

                if let Err(err) = self.sequencer.register_transaction(&tx_snapshot) {
                    let ptm_err = err.into_ptm_error(tx_id);
                    self.settle_terminal(tx_id, ptm_err).await;
                    return;
                }

                let (tx, verifiers) = {
                    let state = self.txs.get_mut(&tx_id).unwrap();
                    state.stage = StageController::plan_complete(&post);
                    let verifiers: Vec<Verifier> = state.resolved_verifiers.values().cloned().collect();
                    (state.tx.clone(), verifiers)
                };
                self.persist(tx_id, Stage::Endorsement, None).await;
                self.spawn_endorse(tx_id, tx, verifiers, post);
            }
            Err(PtmError::AssemblePark { reason }) => {
                let Some(state) = self.txs.get_mut(&tx_id) else { return };
                state.stage = Stage::Parked;
                self.persist(tx_id, Stage::Parked, Some(reason)).await;
            }
            Err(err) => self.settle_terminal(tx_id, err).await,
        }
    }

    async fn on_endorsed(&mut self, tx_id: TxId, results: Vec<AttestationResult>) {
        let Some(state) = self.txs.get(&tx_id) else { return };
        let plan = state.tx.post_assembly.attestation_plan.clone();
        match StageController::select_attestations(&plan, &results) {
            Ok(Some(selected)) => {
                let state = self.txs.get_mut(&tx_id).unwrap();
                state.gathered = selected.clone();
                state.stage = Stage::DispatchResolve;
                let tx = state.tx.clone();
                self.persist(tx_id, Stage::DispatchResolve, None).await;
                self.spawn_prepare(tx_id, tx, selected);
            }
            Ok(None) => {
                warn!(?tx_id, "endorsement gather returned without satisfying the full plan");
            }
            Err(err) => self.settle_terminal(tx_id, err).await,
        }
    }

    async fn on_prepared(&mut self, tx_id: TxId, signer: Verifier, base_ledger_txs: Vec<BaseLedgerTx>) {
        if let Some(state) = self.txs.get_mut(&tx_id) {
            state.tx.dispatch.signer = Some(signer);
            state.tx.dispatch.base_ledger_txs = base_ledger_txs;
        }
        self.try_advance_dispatch(tx_id).await;
    }

    async fn try_advance_dispatch(&mut self, tx_id: TxId) {
        let Some(state) = self.txs.get(&tx_id) else { return };
        if state.stage != Stage::DispatchResolve {
            return;
        }
        // Covers both explicit `depends_on` edges and the state-ref
        // intersection edges `register_transaction` derived at assemble
        // time: a transaction endorsed out of order must still wait
        // here, not discover the conflict only once `sequencer.dispatch`
        // is called after a base ledger submission has already gone out.
        let ancestors_dispatched = self.sequencer.is_ready_to_dispatch(tx_id);
        let signer = state.tx.dispatch.signer.clone();

        if StageController::resolve_dispatch(signer.as_ref(), ancestors_dispatched).is_some() {
            let base_ledger_txs = state.tx.dispatch.base_ledger_txs.clone();
            let tx = state.tx.clone();
            let state = self.txs.get_mut(&tx_id).unwrap();
            state.stage = Stage::Dispatch;
            self.persist(tx_id, Stage::Dispatch, None).await;
            self.spawn_submit(tx_id, tx, base_ledger_txs);
        }
    }

    async fn on_dispatched(&mut self, tx_id: TxId, nonce: u64) {
        let sequence = match self.sequencer.dispatch(tx_id) {
            Ok(sequence) => sequence,
            Err(err) => {
                self.settle_terminal(tx_id, err.into_ptm_error(tx_id)).await;
                return;
            }
        };

        if let Some(state) = self.txs.get_mut(&tx_id) {
            state.tx.dispatch.sequence = Some(sequence);
            if let Some(base_tx) = state.tx.dispatch.base_ledger_txs.first_mut() {
                base_tx.nonce = Some(nonce);
            }
        }

        if StageController::dispatch_complete(Some(sequence)).is_some() {
            self.settle_success(tx_id).await;
            self.on_tick().await;
        }
    }

    fn spawn_init(&self, tx_id: TxId, tx: PrivateTransaction) {
        let domain = self.domain.clone();
        let fut = async move {
            domain
                .init_transaction(&tx)
                .await
                .map(BackgroundOutcome::Init)
                .map_err(|e| PtmError::StoreTransient(e.to_string()))
        };
        spawn_background(self.self_sender.clone(), self.mailbox.clone(), tx_id, Stage::Init, fut);
    }

    fn spawn_resolve_verifiers(&self, tx_id: TxId, pre_assembly: PreAssembly) {
        let key_manager = self.key_manager.clone();
        let fut = async move {
            resolve_verifiers(key_manager.as_ref(), &pre_assembly)
                .await
                .map(BackgroundOutcome::VerifiersResolved)
        };
        spawn_background(self.self_sender.clone(), self.mailbox.clone(), tx_id, Stage::VerifierResolution, fut);
    }

    /// Assembling touches the per-contract Domain Context: on an `Ok`
    /// assembly result the new states are locked and flushed before the
    /// background task reports back, keeping the context's exclusivity
    /// window limited to this one call rather than the whole lifecycle.
    fn spawn_assemble(&self, tx_id: TxId, tx: PrivateTransaction, resolved_verifiers: Vec<Verifier>) {
        let domain = self.domain.clone();
        let contract = tx.contract_address;
        let context_manager = self.domain_context.clone();
        let fut = async move {
            // Held for the whole assemble, not just the state mutation at
            // the end: the domain's own read of available states (if any)
            // must see the same picture the lock/flush step commits, so
            // two assembles on one contract can never interleave.
            let mut guard = context_manager.acquire(contract).await;
            let _in_flight = AssembleInFlightGuard::enter();

            let post = domain
                .assemble_transaction(&tx, &resolved_verifiers)
                .await
                .map_err(|e| PtmError::StoreTransient(e.to_string()))?;

            if matches!(post.assembly_result, Some(AssemblyResult::Ok)) {
                guard
                    .lock_states(&post.input_states, tx_id)
                    .map_err(|e| PtmError::StoreTransient(e.to_string()))?;
                guard
                    .upsert_states(post.output_states.clone())
                    .map_err(|e| PtmError::StoreTransient(e.to_string()))?;
                guard.flush().await.map_err(|e| PtmError::StoreTransient(e.to_string()))?;
            }

            Ok(BackgroundOutcome::Assembled(post))
        };
        spawn_background(self.self_sender.clone(), self.mailbox.clone(), tx_id, Stage::Assemble, fut);
    }

    fn spawn_endorse(&self, tx_id: TxId, tx: PrivateTransaction, resolved_verifiers: Vec<Verifier>, post: PostAssembly) {
        let gatherer = self.gatherer.clone();
        let fut = async move {
            let results = gatherer
                .gather(&tx, &post.attestation_plan, &resolved_verifiers, &[], &post.output_states, &post.info_states)
                .await
                .map_err(|e| e.into_ptm_error())?;
            Ok(BackgroundOutcome::Endorsed(results))
        };
        spawn_background(self.self_sender.clone(), self.mailbox.clone(), tx_id, Stage::Endorsement, fut);
    }

    fn spawn_prepare(&self, tx_id: TxId, tx: PrivateTransaction, gathered: Vec<AttestationResult>) {
        let domain = self.domain.clone();
        let signer = tx.submitter.clone();
        let fut = async move {
            let base_ledger_txs = domain
                .prepare_transaction(&tx, &gathered)
                .await
                .map_err(|e| PtmError::StoreTransient(e.to_string()))?;
            Ok(BackgroundOutcome::Prepared { signer, base_ledger_txs })
        };
        spawn_background(self.self_sender.clone(), self.mailbox.clone(), tx_id, Stage::DispatchResolve, fut);
    }

    fn spawn_submit(&self, tx_id: TxId, _tx: PrivateTransaction, base_ledger_txs: Vec<BaseLedgerTx>) {
        let submitter = self.submitter.clone();
        let fut = async move {
            let prepared = submitter
                .prepare_submission_batch(&RequestOptions::default(), base_ledger_txs)
                .await
                .map_err(|e| submit_error_to_ptm(tx_id, e))?;
            let submitted = submitter
                .submit_batch(prepared)
                .await
                .map_err(|e| submit_error_to_ptm(tx_id, e))?;
            DISPATCHES.inc();
            let nonce = submitted.first().map(|tx| tx.nonce).unwrap_or(0);
            Ok(BackgroundOutcome::Dispatched { nonce })
        };
        spawn_background(self.self_sender.clone(), self.mailbox.clone(), tx_id, Stage::Dispatch, fut);
    }

    /// Re-dispatches the background call for a stage that reported a
    /// retryable error, using the state already recorded on `txs`.
    fn retry_stage(&self, tx_id: TxId, stage: Stage) {
        let Some(state) = self.txs.get(&tx_id) else { return };
        let tx = state.tx.clone();
        match stage {
            Stage::Init => self.spawn_init(tx_id, tx),
            Stage::VerifierResolution => self.spawn_resolve_verifiers(tx_id, tx.pre_assembly.clone()),
            Stage::Assemble => {
                let verifiers: Vec<Verifier> = state.resolved_verifiers.values().cloned().collect();
                self.spawn_assemble(tx_id, tx, verifiers);
            }
            Stage::Endorsement => {
                let verifiers: Vec<Verifier> = state.resolved_verifiers.values().cloned().collect();
                let post = tx.post_assembly.clone();
                self.spawn_endorse(tx_id, tx, verifiers, post);
            }
            Stage::DispatchResolve => self.spawn_prepare(tx_id, tx.clone(), state.gathered.clone()),
            Stage::Dispatch => {
                let base_ledger_txs = tx.dispatch.base_ledger_txs.clone();
                self.spawn_submit(tx_id, tx, base_ledger_txs);
            }
            _ => {}
        }
    }

    async fn persist(&self, tx_id: TxId, stage: Stage, detail: Option<String>) {
        let status = tx_status_for(stage);
        if let Some(state) = self.txs.get(&tx_id) {
            if let Err(err) = self.store.update_transaction(state.tx.clone()).await {
                warn!(?tx_id, %err, "failed to persist updated transaction body");
            }
        }
        if let Err(err) = self.store.append_stage(tx_id, stage, status, detail, now_millis()).await {
            warn!(?tx_id, %err, "failed to append stage record");
        }
        if let Some(state) = self.txs.get(&tx_id) {
            self.event_bus
                .publish(PtmEvent::StatusChanged { tx_id, contract: state.tx.contract_address, status })
                .await;
        }
    }

    async fn settle_success(&mut self, tx_id: TxId) {
        self.persist(tx_id, Stage::Complete, None).await;
        if let Err(err) = self
            .store
            .finalize_receipt(tx_id, ReceiptOutcome::Success, now_millis())
            .await
        {
            warn!(?tx_id, %err, "failed to finalize receipt");
        }
        RECEIPTS.with_label_values(&["success"]).inc();
        if let Some(state) = self.txs.remove(&tx_id) {
            self.event_bus
                .publish(PtmEvent::Finalized {
                    tx_id,
                    contract: state.tx.contract_address,
                    status: TxStatus::Dispatched,
                    detail: None,
                })
                .await;
        }
        self.release_slot();
        self.admit_deferred().await;
    }

    async fn settle_terminal(&mut self, tx_id: TxId, err: PtmError) {
        let (stage, message) = match &err {
            PtmError::AssembleRevert { reason } => (Stage::Reverted, reason.clone()),
            PtmError::EndorseRejected { name } => (Stage::Reverted, format!("endorsement rejected for {name}")),
            PtmError::EndorseRemoteRejected { party } => {
                (Stage::Reverted, format!("remote endorser rejected: {party}"))
            }
            PtmError::DispatchReverted { .. } => (Stage::Reverted, err.to_string()),
            other => (Stage::Failed, other.to_string()),
        };

        if let Some(state) = self.txs.get_mut(&tx_id) {
            state.stage = stage;
        }
        self.persist(tx_id, stage, Some(message.clone())).await;

        let (outcome, receipt_label) = if let PtmError::DispatchReverted { revert_data, .. } = &err {
            let decoded_message = match self.decoder.decode_revert(self.contract, revert_data).await {
                Ok(decoded) => Some(decoded),
                Err(decode_err) => {
                    warn!(?tx_id, %decode_err, "failed to decode on-chain revert data, preserving raw bytes");
                    None
                }
            };
            (
                ReceiptOutcome::FailedOnChainWithRevertData { revert_data: revert_data.clone(), decoded_message },
                "failed_on_chain_revert",
            )
        } else {
            (ReceiptOutcome::FailedWithMessage(message.clone()), "failed_with_message")
        };

        if let Err(store_err) = self.store.finalize_receipt(tx_id, outcome, now_millis()).await {
            warn!(?tx_id, %store_err, "failed to finalize receipt");
        }
        RECEIPTS.with_label_values(&[receipt_label]).inc();
        COMPONENT_ERRORS.with_label_values(&["orchestrator", err.code()]).inc();
        if let Some(state) = self.txs.remove(&tx_id) {
            self.event_bus
                .publish(PtmEvent::Finalized {
                    tx_id,
                    contract: state.tx.contract_address,
                    status: tx_status_for(stage),
                    detail: Some(message),
                })
                .await;
        }
        self.mailbox.take(tx_id);
        self.release_slot();
        self.admit_deferred().await;
    }

    fn release_slot(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
