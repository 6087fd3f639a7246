//! Durable transaction store backed by RocksDB. Gated behind the
//! `rocksdb` feature; the in-memory store is the default.
//!
//! Column families separate the record-by-id space from the
//! idempotency-key index, matching the upstream node's per-subsystem
//! column family isolation.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ptm_types::{PrivateTransaction, ReceiptOutcome, Stage, TxId, TxStatus};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use crate::errors::StoreError;
use crate::record::{ReceiptRecord, StageRecord, TransactionRecord, TxQuery};
use crate::store::TransactionStore;

const CF_RECORDS: &str = "ptm_tx_records";
const CF_IDEMPOTENCY: &str = "ptm_idempotency_index";
const COLUMN_FAMILIES: &[&str] = &[CF_RECORDS, CF_IDEMPOTENCY];

/// RocksDB configuration for the transaction store.
#[derive(Debug, Clone)]
pub struct RocksDbStoreConfig {
    pub path: String,
    pub block_cache_size: usize,
    pub write_buffer_size: usize,
    pub sync_writes: bool,
}

impl Default for RocksDbStoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/ptm-store".to_string(),
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbStoreConfig {
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

pub struct RocksDbTransactionStore {
    db: Mutex<DB>,
    config: RocksDbStoreConfig,
}

impl RocksDbTransactionStore {
    pub fn open(config: RocksDbStoreConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StoreError::Backend(format!("failed to open rocksdb: {e}")))?;

        Ok(Self { db: Mutex::new(db), config })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(RocksDbStoreConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    fn write_opts(&self) -> rocksdb::WriteOptions {
        let mut opts = rocksdb::WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn read_record(&self, db: &DB, tx_id: TxId) -> Result<Option<TransactionRecord>, StoreError> {
        let cf = db.cf_handle(CF_RECORDS).expect("CF_RECORDS declared at open");
        let Some(bytes) = db
            .get_cf(cf, tx_id.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Backend(format!("corrupt record: {e}")))
    }

    fn write_record(&self, db: &DB, record: &TransactionRecord) -> Result<(), StoreError> {
        let cf = db.cf_handle(CF_RECORDS).expect("CF_RECORDS declared at open");
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StoreError::Backend(format!("encode failed: {e}")))?;
        db.put_cf_opt(cf, record.transaction.id.as_bytes(), bytes, &self.write_opts())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl TransactionStore for RocksDbTransactionStore {
    async fn upsert_transaction(&self, tx: PrivateTransaction) -> Result<TxId, StoreError> {
        let db = self.db.lock().expect("rocksdb mutex poisoned");
        let idx_cf = db.cf_handle(CF_IDEMPOTENCY).expect("CF_IDEMPOTENCY declared at open");

        if let Some(existing_id_bytes) = db
            .get_cf(idx_cf, tx.idempotency_key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            let existing_id = TxId::from_slice(&existing_id_bytes)
                .map_err(|e| StoreError::Backend(format!("corrupt index entry: {e}")))?;
            let existing = self
                .read_record(&db, existing_id)?
                .ok_or_else(|| StoreError::Backend("index/record invariant violated".into()))?;
            if existing.transaction.contract_address != tx.contract_address
                || existing.transaction.domain != tx.domain
                || existing.transaction.submitter != tx.submitter
            {
                return Err(StoreError::IdempotencyMismatch { key: tx.idempotency_key });
            }
            return Ok(existing_id);
        }

        let tx_id = tx.id;
        self.write_record(&db, &TransactionRecord::new(tx.clone()))?;
        db.put_cf_opt(idx_cf, tx.idempotency_key.as_bytes(), tx_id.as_bytes(), &self.write_opts())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(tx_id)
    }

    async fn update_transaction(&self, tx: PrivateTransaction) -> Result<(), StoreError> {
        let db = self.db.lock().expect("rocksdb mutex poisoned");
        let mut record = self.read_record(&db, tx.id)?.ok_or(StoreError::NotFound(tx.id))?;
        record.transaction = tx;
        self.write_record(&db, &record)
    }

    async fn append_stage(
        &self,
        tx_id: TxId,
        stage: Stage,
        status: TxStatus,
        detail: Option<String>,
        recorded_at: u64,
    ) -> Result<(), StoreError> {
        let db = self.db.lock().expect("rocksdb mutex poisoned");
        let mut record = self.read_record(&db, tx_id)?.ok_or(StoreError::NotFound(tx_id))?;
        record.stages.push(StageRecord { stage, recorded_at, detail });
        record.status = status;
        self.write_record(&db, &record)
    }

    async fn finalize_receipt(
        &self,
        tx_id: TxId,
        outcome: ReceiptOutcome,
        finalized_at: u64,
    ) -> Result<(), StoreError> {
        let db = self.db.lock().expect("rocksdb mutex poisoned");
        let mut record = self.read_record(&db, tx_id)?.ok_or(StoreError::NotFound(tx_id))?;
        if record.receipt.is_some() {
            return Ok(());
        }
        record.receipt = Some(ReceiptRecord { outcome, finalized_at });
        self.write_record(&db, &record)
    }

    async fn get_by_id(&self, tx_id: TxId) -> Result<Option<TransactionRecord>, StoreError> {
        let db = self.db.lock().expect("rocksdb mutex poisoned");
        self.read_record(&db, tx_id)
    }

    async fn query(&self, query: TxQuery) -> Result<Vec<TransactionRecord>, StoreError> {
        let db = self.db.lock().expect("rocksdb mutex poisoned");
        let cf = db.cf_handle(CF_RECORDS).expect("CF_RECORDS declared at open");
        let mut matched = Vec::new();

        for item in db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            let record: TransactionRecord = serde_json::from_slice(&value)
                .map_err(|e| StoreError::Backend(format!("corrupt record: {e}")))?;
            if query.contract.map_or(true, |c| record.transaction.contract_address == c)
                && query.status.map_or(true, |s| record.status == s)
            {
                matched.push(record);
            }
        }

        matched.sort_by_key(|r| r.transaction.id);
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
