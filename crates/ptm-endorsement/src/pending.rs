//! Correlates in-flight attestation requests to the future `gather()`
//! returns, fulfilled either immediately (local SIGN/ENDORSE) or later by
//! `receive()` routing a remote `endorsement_response`.
//!
//! The shape mirrors a request/response bridge keyed by a correlation id:
//! `register` hands back a receiver, arriving results are matched in by
//! key and the receiver resolves once every expected key has answered.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use ptm_types::{AttestationResult, TxId};
use tokio::sync::oneshot;
use tracing::debug;

/// Identifies one expected response within a gather: the attestation
/// name plus the party asked to answer it.
pub type AttestationKey = (String, String);

struct GatherEntry {
    expected: HashSet<AttestationKey>,
    received: HashMap<AttestationKey, AttestationResult>,
    sender: Option<oneshot::Sender<Vec<AttestationResult>>>,
}

/// Tracks one gather per in-flight transaction. Dedups by
/// `(tx_id, attestation name, party)` so a retried remote response does
/// not double-count.
#[derive(Clone, Default)]
pub struct PendingGather {
    inner: Arc<Mutex<HashMap<TxId, GatherEntry>>>,
}

impl PendingGather {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the keys a gather for `tx_id` expects answers for and
    /// returns the receiver that resolves once they have all arrived.
    pub fn register(
        &self,
        tx_id: TxId,
        expected: HashSet<AttestationKey>,
    ) -> oneshot::Receiver<Vec<AttestationResult>> {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.inner.lock();
        guard.insert(
            tx_id,
            GatherEntry {
                expected,
                received: HashMap::new(),
                sender: Some(tx),
            },
        );
        rx
    }

    /// Records one attestation result. Returns `true` if this was newly
    /// recorded (not a duplicate of an already-seen key) and fulfills
    /// the registered receiver once every expected key has an entry.
    pub fn complete_one(&self, tx_id: TxId, result: AttestationResult) -> bool {
        let mut guard = self.inner.lock();
        let Some(entry) = guard.get_mut(&tx_id) else {
            debug!(?tx_id, "attestation result for unknown or completed gather");
            return false;
        };

        let key = (result.name.clone(), result.party.clone());
        if entry.received.contains_key(&key) {
            return false;
        }
        entry.received.insert(key, result);

        if entry.expected.iter().all(|k| entry.received.contains_key(k)) {
            if let Some(sender) = entry.sender.take() {
                let results: Vec<_> = entry.received.values().cloned().collect();
                let _ = sender.send(results);
            }
            guard.remove(&tx_id);
        }
        true
    }

    /// Abandons a gather, e.g. on orchestrator cancellation. Dropping the
    /// sender causes the receiver to observe `RecvError`.
    pub fn cancel(&self, tx_id: TxId) {
        self.inner.lock().remove(&tx_id);
    }

    pub fn is_pending(&self, tx_id: TxId) -> bool {
        self.inner.lock().contains_key(&tx_id)
    }
}
