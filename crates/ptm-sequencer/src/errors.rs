use ptm_types::{PtmError, TxId};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SequencerError {
    #[error("dependency cycle detected")]
    Cycle,

    #[error("transaction {0:?} is not ready to dispatch: unresolved ancestors remain")]
    NotReady(TxId),
}

impl SequencerError {
    pub fn into_ptm_error(self, tx_id: TxId) -> PtmError {
        match self {
            SequencerError::Cycle => PtmError::SequencerCycle { tx_id },
            SequencerError::NotReady(_) => {
                PtmError::StoreTransient("transaction not ready to dispatch".into())
            }
        }
    }
}
