//! # PTM Events
//!
//! Status-change events the facade observes on the broadcast `EventBus`.
//! Distinct from `ptm_types::OrchestratorEvent`, which flows through a
//! single orchestrator's private `mpsc` channel — these are published
//! once a transaction's externally-visible status changes, for
//! `GetTxStatus` long-polling.

use ptm_types::{ContractAddress, TxId, TxStatus};
use serde::{Deserialize, Serialize};

/// A status change published for consumption outside the owning
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PtmEvent {
    /// A transaction's status changed.
    StatusChanged {
        tx_id: TxId,
        contract: ContractAddress,
        status: TxStatus,
    },
    /// A transaction reached a terminal status with a receipt outcome
    /// message, included for observers that don't want to re-query the
    /// store.
    Finalized {
        tx_id: TxId,
        contract: ContractAddress,
        status: TxStatus,
        detail: Option<String>,
    },
}

impl PtmEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            PtmEvent::StatusChanged { .. } => EventTopic::Status,
            PtmEvent::Finalized { .. } => EventTopic::Finalized,
        }
    }

    pub fn contract(&self) -> ContractAddress {
        match self {
            PtmEvent::StatusChanged { contract, .. } => *contract,
            PtmEvent::Finalized { contract, .. } => *contract,
        }
    }
}

/// Topics an `EventFilter` can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTopic {
    Status,
    Finalized,
    All,
}

/// A subscription filter: matches by topic and, optionally, a single
/// contract address (facade status-polling is almost always scoped to
/// one contract).
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub topics: Vec<EventTopic>,
    pub contract: Option<ContractAddress>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self {
            topics: vec![EventTopic::All],
            contract: None,
        }
    }

    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            contract: None,
        }
    }

    pub fn for_contract(mut self, contract: ContractAddress) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn matches(&self, event: &PtmEvent) -> bool {
        let topic_ok = self.topics.contains(&EventTopic::All) || self.topics.contains(&event.topic());
        let contract_ok = self.contract.map_or(true, |c| c == event.contract());
        topic_ok && contract_ok
    }
}
