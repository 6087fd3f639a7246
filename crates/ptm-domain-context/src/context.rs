//! The Domain Context: a buffered view of the state store scoped to one
//! contract for the lifetime of a single assemble operation.
//!
//! Grounded on `qc-06-mempool`'s `TransactionPool` two-phase-commit
//! shape (`propose`/`confirm`/`rollback`): `lock_states` is `propose`
//! (tentatively reserve, reversible until flush), `flush` is `confirm`
//! (irreversibly publish to the backing store). Unlike the mempool, a
//! Domain Context commits exactly once and is then spent — there is no
//! rollback path, since an assemble that fails simply drops its context
//! without ever calling `flush`.

use std::collections::HashMap;
use std::sync::Arc;

use ptm_ports::{QueryFlags, StateQuery, StateStore};
use ptm_types::{ContractAddress, FullState, SchemaId, StateId, StateRef, TxId};
use tracing::debug;

use crate::errors::DomainContextError;

/// A single-use, exclusive view of the state store for one contract.
/// All operations on a given instance are serialized by construction —
/// callers obtain one only through `DomainContextManager::acquire`,
/// which enforces invariant 2 (at most one assemble per contract).
pub struct DomainContext {
    contract: ContractAddress,
    store: Arc<dyn StateStore>,
    buffered_outputs: HashMap<SchemaId, Vec<FullState>>,
    locks: HashMap<StateId, TxId>,
    spent: bool,
}

impl DomainContext {
    pub(crate) fn new(contract: ContractAddress, store: Arc<dyn StateStore>) -> Self {
        Self {
            contract,
            store,
            buffered_outputs: HashMap::new(),
            locks: HashMap::new(),
            spent: false,
        }
    }

    pub fn contract(&self) -> ContractAddress {
        self.contract
    }

    /// Returns states that are unspent and not locked by any in-flight
    /// transaction in this context: the backing store's view, overlaid
    /// with this context's own buffered outputs.
    pub async fn find_available(
        &self,
        schema_id: SchemaId,
        query: &StateQuery,
    ) -> Result<Vec<FullState>, DomainContextError> {
        self.ensure_not_spent()?;

        let mut available = self
            .store
            .find_available(self.contract, schema_id, query, QueryFlags::default())
            .await
            .map_err(|e| DomainContextError::Store(e.to_string()))?;

        if let Some(buffered) = self.buffered_outputs.get(&schema_id) {
            available.extend(buffered.iter().cloned());
        }

        available.retain(|s| !self.locks.contains_key(&s.state_ref.id));
        Ok(available)
    }

    /// Buffers pending outputs, visible to subsequent queries within
    /// this context but not yet published to the backing store.
    pub fn upsert_states(&mut self, new_states: Vec<FullState>) -> Result<(), DomainContextError> {
        self.ensure_not_spent()?;
        for state in new_states {
            self.buffered_outputs
                .entry(state.state_ref.schema_id)
                .or_default()
                .push(state);
        }
        Ok(())
    }

    /// Reserves the given states for `tx_id`. Fails if any is already
    /// locked by a different transaction in this context.
    pub fn lock_states(
        &mut self,
        state_refs: &[StateRef],
        tx_id: TxId,
    ) -> Result<(), DomainContextError> {
        self.ensure_not_spent()?;

        for state_ref in state_refs {
            if let Some(&holder) = self.locks.get(&state_ref.id) {
                if holder != tx_id {
                    return Err(DomainContextError::AlreadyLocked(state_ref.id));
                }
            }
        }
        for state_ref in state_refs {
            self.locks.insert(state_ref.id, tx_id);
        }
        Ok(())
    }

    /// Atomically publishes buffered outputs and nullifies locked
    /// inputs to the underlying store. The context is spent afterward.
    pub async fn flush(&mut self) -> Result<(), DomainContextError> {
        self.ensure_not_spent()?;

        let outputs: Vec<FullState> = self.buffered_outputs.drain().flat_map(|(_, v)| v).collect();
        if !outputs.is_empty() {
            self.store
                .write_received_states(self.contract, outputs)
                .await
                .map_err(|e| DomainContextError::Store(e.to_string()))?;
        }

        let nullifiers: Vec<StateId> = self.locks.keys().copied().collect();
        if !nullifiers.is_empty() {
            self.store
                .write_nullifiers(self.contract, nullifiers)
                .await
                .map_err(|e| DomainContextError::Store(e.to_string()))?;
        }

        self.spent = true;
        debug!(contract = ?self.contract, "domain context flushed");
        Ok(())
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    fn ensure_not_spent(&self) -> Result<(), DomainContextError> {
        if self.spent {
            Err(DomainContextError::ContextSpent)
        } else {
            Ok(())
        }
    }
}
