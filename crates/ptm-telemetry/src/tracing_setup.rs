//! `tracing-subscriber` setup: env-filtered, fmt or JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Guard held for the process lifetime. Dropping it has no effect beyond
/// keeping the subscriber's registration alive; it exists so call sites
/// look the same regardless of which layers are active.
pub struct TracingGuard;

/// Initialize the process-wide `tracing` subscriber.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    let init_result = if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(config.console_output);

        tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()
    };

    init_result.map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    tracing::info!(service = %config.service_name, network = %config.network, "tracing initialized");

    Ok(TracingGuard)
}

#[cfg(test)]
mod tests {
    // Initializing a global subscriber more than once per process panics,
    // which makes this untestable alongside other tests in this crate's
    // test binary; exercised instead by `ptm-node`'s own startup.
}
