//! Persisted shapes: the append-only stage log and the transaction
//! record it is attached to.

use ptm_types::{ContractAddress, PrivateTransaction, ReceiptOutcome, Stage, TxId, TxStatus};
use serde::{Deserialize, Serialize};

/// One append-only entry in a transaction's stage history. Never
/// mutated or removed once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub recorded_at: u64,
    pub detail: Option<String>,
}

/// The receipt written once by `finalize_receipt`. Immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub outcome: ReceiptOutcome,
    pub finalized_at: u64,
}

/// A transaction as the store sees it: the current `PrivateTransaction`
/// fields, its append-only stage history, and its receipt once
/// finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction: PrivateTransaction,
    pub status: TxStatus,
    pub stages: Vec<StageRecord>,
    pub receipt: Option<ReceiptRecord>,
}

impl TransactionRecord {
    pub fn new(transaction: PrivateTransaction) -> Self {
        Self { transaction, status: TxStatus::Pending, stages: Vec::new(), receipt: None }
    }
}

/// Opaque-ish query over stored transactions, mirroring the state
/// store's `StateQuery` shape.
#[derive(Debug, Clone, Default)]
pub struct TxQuery {
    pub contract: Option<ContractAddress>,
    pub status: Option<TxStatus>,
    pub limit: Option<usize>,
}
