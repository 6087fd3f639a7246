//! Per-contract orchestrator tuning. One `OrchestratorConfig` is shared
//! by every orchestrator a `ptm-facade` spins up; nothing here is
//! contract-specific.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on transactions this orchestrator tracks at once.
    /// `handle_new` returns `false` ("deferred") once this is reached.
    pub max_concurrent_process: usize,
    /// How often the loop emits a `Tick` to itself, driving re-evaluation
    /// of parked-on-ancestor transactions and endorsement deadlines.
    pub tick_interval: Duration,
    /// Event channel bound, overriding `ptm_bus::DEFAULT_ORCHESTRATOR_CHANNEL_CAPACITY`.
    pub channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_process: 64,
            tick_interval: Duration::from_millis(500),
            channel_capacity: ptm_bus::DEFAULT_ORCHESTRATOR_CHANNEL_CAPACITY,
        }
    }
}
