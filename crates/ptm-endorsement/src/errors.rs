use ptm_types::PtmError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EndorsementError {
    #[error("no node identified for party lookup: {lookup}")]
    PlanPartyUnresolvable { lookup: String },

    #[error("remote party {party} rejected endorsement")]
    RemoteRejected { party: String },

    #[error("endorsement for party {party} timed out")]
    Timeout { party: String },
}

impl EndorsementError {
    pub fn into_ptm_error(self) -> PtmError {
        match self {
            EndorsementError::PlanPartyUnresolvable { lookup } => {
                PtmError::PlanPartyUnresolvable { lookup }
            }
            EndorsementError::RemoteRejected { party } => {
                PtmError::EndorseRemoteRejected { party }
            }
            EndorsementError::Timeout { party } => PtmError::EndorseTimeout { party },
        }
    }
}
