//! The orchestrator's public face: a cheaply cloneable handle wrapping
//! the event-channel sender, the bounded-concurrency counter, and the
//! endorsement gatherer a facade needs to route inbound transport
//! messages to. The loop itself (`Worker::run`) is spawned once and
//! never exposed directly.
//!
//! The teacher's codebase never reaches for `tokio::sync::Semaphore`
//! for this kind of admission control; `max_concurrent_process` is
//! instead an explicit `AtomicUsize` checked with a compare-exchange
//! loop in `handle_new`, mirroring how `node-runtime`'s registry
//! tracks subsystem state with plain atomics and locked maps rather
//! than synchronization primitives as first-class control flow.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use ptm_endorsement::EndorsementGatherer;
use ptm_ports::{DomainPlugin, KeyManager, PublicTxSubmitter, ReliableMessage, TransportManager};
use ptm_types::{OrchestratorEvent, TxId};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::deps::OrchestratorDeps;
use crate::worker::Worker;

/// A handle to one contract's running orchestrator loop. Clone freely;
/// every clone shares the same channel, counter, and stop signal.
pub struct Orchestrator<D, K, T> {
    sender: ptm_bus::OrchestratorSender,
    in_flight: Arc<AtomicUsize>,
    max_concurrent_process: usize,
    stop_signal: Arc<Notify>,
    gatherer: Arc<EndorsementGatherer<K, T, D>>,
    join: Arc<SyncMutex<Option<JoinHandle<()>>>>,
}

impl<D, K, T> Clone for Orchestrator<D, K, T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            in_flight: self.in_flight.clone(),
            max_concurrent_process: self.max_concurrent_process,
            stop_signal: self.stop_signal.clone(),
            gatherer: self.gatherer.clone(),
            join: self.join.clone(),
        }
    }
}

impl<D, K, T> Orchestrator<D, K, T>
where
    D: DomainPlugin + 'static,
    K: KeyManager + 'static,
    T: TransportManager + 'static,
{
    /// Builds the worker and spawns its loop on the current runtime.
    pub fn spawn<Sub>(deps: OrchestratorDeps<D, K, T, Sub>) -> Self
    where
        Sub: PublicTxSubmitter + 'static,
    {
        let (tx, rx) = ptm_bus::channel::orchestrator_channel_with_capacity(deps.config.channel_capacity);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let stop_signal = Arc::new(Notify::new());
        let max_concurrent_process = deps.config.max_concurrent_process;

        let worker = Worker::new(
            deps.contract,
            deps.domain,
            deps.key_manager,
            deps.transport,
            deps.submitter,
            deps.domain_context,
            deps.store,
            deps.decoder,
            deps.event_bus,
            tx.clone(),
            in_flight.clone(),
            deps.config,
        );
        let gatherer = worker.gatherer();

        let loop_stop_signal = stop_signal.clone();
        let join = tokio::spawn(worker.run(rx, loop_stop_signal));

        Self {
            sender: tx,
            in_flight,
            max_concurrent_process,
            stop_signal,
            gatherer,
            join: Arc::new(SyncMutex::new(Some(join))),
        }
    }

    /// Admits a new transaction if under `max_concurrent_process`,
    /// returning `false` ("deferred") otherwise. The transaction stays
    /// persisted either way; a deferred admission is retried on the
    /// next `trigger_evaluation` or completion-driven re-evaluation.
    pub async fn handle_new(&self, tx_id: TxId) -> bool {
        loop {
            let current = self.in_flight.load(Ordering::SeqCst);
            if current >= self.max_concurrent_process {
                return false;
            }
            if self
                .in_flight
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
        }

        if self.sender.send(OrchestratorEvent::NewTx(tx_id)).await.is_err() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    pub async fn handle_event(&self, event: OrchestratorEvent) -> bool {
        self.sender.send(event).await.is_ok()
    }

    pub async fn trigger_evaluation(&self) -> bool {
        self.handle_event(OrchestratorEvent::Tick).await
    }

    pub async fn cancel(&self, tx_id: TxId) -> bool {
        self.handle_event(OrchestratorEvent::Cancellation(tx_id)).await
    }

    /// Routes an inbound transport message (an endorsement response, or
    /// an ack of one) to the gatherer this orchestrator owns.
    pub fn receive_endorsement(&self, message: &ReliableMessage) -> bool {
        self.gatherer.receive(message)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Graceful shutdown: stops admitting ticks from draining further
    /// than necessary and waits for every in-flight transaction to
    /// reach a terminal stage before returning. Idempotent across
    /// clones — only the clone that wins the race actually awaits the
    /// loop; the others return immediately.
    pub async fn stop(&self) {
        self.stop_signal.notify_waiters();
        let taken = self.join.lock().take();
        if let Some(join) = taken {
            let _ = join.await;
        }
    }

    /// Hard cancellation: aborts the loop task outright, abandoning any
    /// outstanding background calls rather than waiting for them.
    pub fn close(&self) {
        if let Some(join) = self.join.lock().take() {
            join.abort();
        }
    }
}
