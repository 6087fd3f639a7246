//! Node configuration.

use ptm_orchestrator::OrchestratorConfig;
use ptm_telemetry::TelemetryConfig;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// JSON-RPC listening port (not wired up by this demo binary; carried
    /// for parity with a production node's config surface).
    pub rpc_port: u16,
    /// Per-contract orchestrator tuning, shared by every contract this
    /// node serves.
    pub orchestrator: OrchestratorConfig,
    /// Structured logging and metrics configuration.
    pub telemetry: TelemetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_port: 8548,
            orchestrator: OrchestratorConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}
