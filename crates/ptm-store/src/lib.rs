//! # PTM Transaction Store
//!
//! Idempotent persistence of transactions, append-only stage records,
//! and immutable-once-written receipts.

mod errors;
mod record;
mod store;

#[cfg(feature = "rocksdb")]
mod rocksdb_store;

pub use errors::StoreError;
pub use record::{ReceiptRecord, StageRecord, TransactionRecord, TxQuery};
pub use store::{InMemoryTransactionStore, TransactionStore};

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbStoreConfig, RocksDbTransactionStore};
