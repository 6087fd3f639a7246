//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for structured logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line and span.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Whether to enable console output (for development).
    pub console_output: bool,

    /// Whether to enable JSON formatted logs.
    pub json_logs: bool,

    /// Port the Prometheus `/metrics` text endpoint is served on.
    pub metrics_port: u16,

    /// Network identifier (testnet, mainnet, devnet).
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ptm".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: 9100,
            network: "testnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PTM_SERVICE_NAME`: Service name (default: ptm)
    /// - `PTM_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `PTM_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `PTM_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `PTM_METRICS_PORT`: Prometheus metrics port (default: 9100)
    /// - `PTM_NETWORK`: Network name (default: testnet)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("PTM_SERVICE_NAME").unwrap_or_else(|_| "ptm".to_string()),

            log_level: env::var("PTM_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("PTM_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("PTM_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: env::var("PTM_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),

            network: env::var("PTM_NETWORK").unwrap_or_else(|_| "testnet".to_string()),
        }
    }
}
