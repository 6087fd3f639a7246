//! # PTM Domain Context
//!
//! A buffered view of the state store for one contract, scoped to a
//! single assemble operation: serializes assemble per contract and
//! tracks which states that assemble has locked or produced so
//! concurrent assembles can't double-spend them before persistence.

mod context;
mod errors;
mod manager;

pub use context::DomainContext;
pub use errors::DomainContextError;
pub use manager::{DomainContextGuard, DomainContextManager};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ptm_ports::{QueryFlags, StateQuery, StateStore, StateStoreError};
    use ptm_types::{ContractAddress, FullState, SchemaId, StateId, StateRef, TxId};
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct FakeStore {
        written: AsyncMutex<Vec<FullState>>,
        nullified: AsyncMutex<Vec<StateId>>,
    }

    #[async_trait]
    impl StateStore for FakeStore {
        async fn find_available(
            &self,
            _contract: ContractAddress,
            _schema_id: SchemaId,
            _query: &StateQuery,
            _flags: QueryFlags,
        ) -> Result<Vec<FullState>, StateStoreError> {
            Ok(Vec::new())
        }

        async fn write_received_states(
            &self,
            _contract: ContractAddress,
            states: Vec<FullState>,
        ) -> Result<(), StateStoreError> {
            self.written.lock().await.extend(states);
            Ok(())
        }

        async fn write_nullifiers(
            &self,
            _contract: ContractAddress,
            spent: Vec<StateId>,
        ) -> Result<(), StateStoreError> {
            self.nullified.lock().await.extend(spent);
            Ok(())
        }
    }

    fn contract() -> ContractAddress {
        ContractAddress::from_low_u64_be(1)
    }

    fn state_ref(byte: u8) -> StateRef {
        StateRef::new(SchemaId::zero(), StateId::from_low_u64_be(byte as u64))
    }

    #[tokio::test]
    async fn lock_then_relock_by_same_tx_succeeds() {
        let store: Arc<dyn StateStore> = Arc::new(FakeStore::default());
        let manager = DomainContextManager::new(store);
        let mut ctx = manager.acquire(contract()).await;

        let tx_id = TxId::new_v4();
        let refs = vec![state_ref(1)];
        ctx.lock_states(&refs, tx_id).unwrap();
        ctx.lock_states(&refs, tx_id).unwrap();
    }

    #[tokio::test]
    async fn lock_by_different_tx_fails() {
        let store: Arc<dyn StateStore> = Arc::new(FakeStore::default());
        let manager = DomainContextManager::new(store);
        let mut ctx = manager.acquire(contract()).await;

        let refs = vec![state_ref(1)];
        ctx.lock_states(&refs, TxId::new_v4()).unwrap();
        let err = ctx.lock_states(&refs, TxId::new_v4()).unwrap_err();
        assert!(matches!(err, DomainContextError::AlreadyLocked(_)));
    }

    #[tokio::test]
    async fn flush_marks_context_spent() {
        let store: Arc<dyn StateStore> = Arc::new(FakeStore::default());
        let manager = DomainContextManager::new(store);
        let mut ctx = manager.acquire(contract()).await;

        ctx.flush().await.unwrap();
        assert!(ctx.is_spent());
        assert!(matches!(
            ctx.lock_states(&[], TxId::new_v4()),
            Err(DomainContextError::ContextSpent)
        ));
    }

    #[tokio::test]
    async fn in_flight_assembles_drops_to_zero_after_guard_release() {
        let store: Arc<dyn StateStore> = Arc::new(FakeStore::default());
        let manager = DomainContextManager::new(store);

        {
            let _ctx = manager.acquire(contract()).await;
            assert_eq!(manager.in_flight_assembles(), 1);
        }
        assert_eq!(manager.in_flight_assembles(), 0);
    }
}
