//! Structured logging helpers layered on top of `tracing`.
//!
//! These macros attach a consistent set of fields (component, tx hash,
//! contract address, ...) to log lines so the fmt/JSON output stays
//! greppable across components.

use crate::{TelemetryConfig, TelemetryError};

/// Structured logger handle.
pub struct StructuredLogger {
    _initialized: bool,
}

/// Record that structured logging is configured. The actual formatting
/// is owned by `tracing_setup::init_tracing`'s fmt/JSON layer; this exists
/// so `init_telemetry` has a distinct step to report failures from.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    tracing::debug!(json_logs = config.json_logs, "structured logging configured");
    Ok(StructuredLogger { _initialized: true })
}

/// Log with a `component` field attached.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(component = $component, $($($field)*,)? $msg)
    };
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(component = $component, $($($field)*,)? $msg)
    };
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(component = $component, $($($field)*,)? $msg)
    };
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(component = $component, $($($field)*,)? $msg)
    };
}

/// Log a transaction-related event with `tx_id` attached.
#[macro_export]
macro_rules! log_tx_event {
    ($level:ident, $component:expr, $msg:expr, $tx_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(component = $component, tx_id = %$tx_id, $($($field)*,)? $msg)
    };
}
