//! The Transaction Store contract and its in-memory implementation.
//!
//! Reference: §4.6 "Transaction Store" — idempotent upsert, append-only
//! stage records, immutable-once-written receipts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use ptm_types::{PrivateTransaction, ReceiptOutcome, Stage, TxId, TxStatus};
use tracing::instrument;

use crate::errors::StoreError;
use crate::record::{ReceiptRecord, StageRecord, TransactionRecord, TxQuery};

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts a new transaction, or returns the id of an existing
    /// transaction with the same idempotency key. Fails if the existing
    /// transaction's identity-defining fields differ from `tx`.
    async fn upsert_transaction(&self, tx: PrivateTransaction) -> Result<TxId, StoreError>;

    /// Overwrites the transaction body as the orchestrator advances it
    /// (post-assembly, dispatch). Stage history and receipt are
    /// untouched; fails if no record with this id exists yet.
    async fn update_transaction(&self, tx: PrivateTransaction) -> Result<(), StoreError>;

    /// Appends one stage entry. Never overwrites or removes history.
    async fn append_stage(
        &self,
        tx_id: TxId,
        stage: Stage,
        status: TxStatus,
        detail: Option<String>,
        recorded_at: u64,
    ) -> Result<(), StoreError>;

    /// Writes the terminal receipt. No-op if one is already recorded —
    /// receipts are immutable once written, so the first outcome wins
    /// and a conflicting call is simply ignored rather than surfaced as
    /// an error.
    async fn finalize_receipt(
        &self,
        tx_id: TxId,
        outcome: ReceiptOutcome,
        finalized_at: u64,
    ) -> Result<(), StoreError>;

    async fn get_by_id(&self, tx_id: TxId) -> Result<Option<TransactionRecord>, StoreError>;

    async fn query(&self, query: TxQuery) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// In-memory transaction store. Default backend; the `rocksdb` feature
/// provides a durable alternative with the same contract.
///
/// The dual index (records keyed by id, a second map from idempotency
/// key to id) mirrors a mempool's sender/nonce index: the primary store
/// is keyed by identity, a secondary map resolves a business key to
/// that identity before insert.
#[derive(Default)]
pub struct InMemoryTransactionStore {
    records: RwLock<HashMap<TxId, TransactionRecord>>,
    by_idempotency_key: RwLock<HashMap<String, TxId>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    #[instrument(skip(self, tx), fields(tx_id = ?tx.id, idempotency_key = %tx.idempotency_key))]
    async fn upsert_transaction(&self, tx: PrivateTransaction) -> Result<TxId, StoreError> {
        if let Some(&existing_id) = self.by_idempotency_key.read().get(&tx.idempotency_key) {
            let records = self.records.read();
            let existing = records.get(&existing_id).expect("index/record invariant");
            if existing.transaction.contract_address != tx.contract_address
                || existing.transaction.domain != tx.domain
                || existing.transaction.submitter != tx.submitter
            {
                return Err(StoreError::IdempotencyMismatch { key: tx.idempotency_key });
            }
            return Ok(existing_id);
        }

        let tx_id = tx.id;
        let key = tx.idempotency_key.clone();
        self.records.write().insert(tx_id, TransactionRecord::new(tx));
        self.by_idempotency_key.write().insert(key, tx_id);
        Ok(tx_id)
    }

    async fn update_transaction(&self, tx: PrivateTransaction) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&tx.id).ok_or(StoreError::NotFound(tx.id))?;
        record.transaction = tx;
        Ok(())
    }

    async fn append_stage(
        &self,
        tx_id: TxId,
        stage: Stage,
        status: TxStatus,
        detail: Option<String>,
        recorded_at: u64,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&tx_id).ok_or(StoreError::NotFound(tx_id))?;
        record.stages.push(StageRecord { stage, recorded_at, detail });
        record.status = status;
        Ok(())
    }

    async fn finalize_receipt(
        &self,
        tx_id: TxId,
        outcome: ReceiptOutcome,
        finalized_at: u64,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&tx_id).ok_or(StoreError::NotFound(tx_id))?;
        if record.receipt.is_some() {
            return Ok(());
        }
        record.receipt = Some(ReceiptRecord { outcome, finalized_at });
        Ok(())
    }

    async fn get_by_id(&self, tx_id: TxId) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.records.read().get(&tx_id).cloned())
    }

    async fn query(&self, query: TxQuery) -> Result<Vec<TransactionRecord>, StoreError> {
        let records = self.records.read();
        let mut matched: Vec<_> = records
            .values()
            .filter(|r| {
                query.contract.map_or(true, |c| r.transaction.contract_address == c)
                    && query.status.map_or(true, |s| r.status == s)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.transaction.id);
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
