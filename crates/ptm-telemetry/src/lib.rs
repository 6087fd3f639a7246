//! # PTM Telemetry
//!
//! Structured logging and Prometheus metrics for the PTM node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ptm_telemetry::{TelemetryConfig, init_telemetry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("failed to init telemetry");
//!
//!     // application code here; spans and ptm_* metrics are now recorded
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PTM_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `PTM_JSON_LOGS` | `false` (`true` in containers) | JSON log output |
//! | `PTM_METRICS_PORT` | `9100` | Prometheus text endpoint port |
//! | `PTM_NETWORK` | `testnet` | Network identifier attached to spans |

mod config;
mod logging;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use logging::StructuredLogger;
pub use metrics::{
    encode_metrics, register_metrics, AssembleInFlightGuard, MetricsHandle,
    ASSEMBLES_IN_FLIGHT, COMPONENT_ERRORS, DISPATCHES, ENDORSEMENT_ROUND_TRIPS, RECEIPTS,
    TRANSACTIONS_SUBMITTED,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}

/// Initialize structured logging and metrics for the process.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config)?;
    let _logging_guard = logging::init_logging(&config)?;

    Ok(TelemetryGuard { _tracing: tracing_guard, _metrics: metrics_handle })
}

/// Guard that keeps telemetry active. Drop to release.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

/// Creates a span scoped to one component's operation, with a
/// `component` field attached.
#[macro_export]
macro_rules! component_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
