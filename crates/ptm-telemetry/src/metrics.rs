//! Prometheus metrics for the PTM node.
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., `ptm_dispatches_total`).
//! - **Gauge**: Value that can go up or down (e.g., `ptm_assembles_in_flight`).

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total transactions submitted via `HandleNewTx`.
    pub static ref TRANSACTIONS_SUBMITTED: Counter = Counter::new(
        "ptm_transactions_submitted_total",
        "Total private transactions accepted by HandleNewTx"
    ).expect("metric creation failed");

    /// Total base-ledger dispatches submitted to the public tx submitter.
    pub static ref DISPATCHES: Counter = Counter::new(
        "ptm_dispatches_total",
        "Total base-ledger transaction batches dispatched"
    ).expect("metric creation failed");

    /// Endorsement round trips, split by whether the party was local or
    /// reached over transport.
    pub static ref ENDORSEMENT_ROUND_TRIPS: CounterVec = CounterVec::new(
        Opts::new("ptm_endorsement_round_trips_total", "Total endorsement requests gathered"),
        &["locality", "outcome"] // locality: local/remote, outcome: sign/endorser_submit/revert
    ).expect("metric creation failed");

    /// Receipts finalized, split by outcome.
    pub static ref RECEIPTS: CounterVec = CounterVec::new(
        Opts::new("ptm_receipts_total", "Total receipts finalized"),
        &["outcome"] // success/failed_with_message/failed_on_chain
    ).expect("metric creation failed");

    /// Transactions currently inside `assemble_transaction`, under the
    /// Domain Context's exclusivity lock. Verifies the "at most one
    /// concurrent assemble per contract" property directly.
    pub static ref ASSEMBLES_IN_FLIGHT: Gauge = Gauge::new(
        "ptm_assembles_in_flight",
        "Transactions currently holding a Domain Context assemble lock"
    ).expect("metric creation failed");

    /// Errors by component and taxonomy variant.
    pub static ref COMPONENT_ERRORS: CounterVec = CounterVec::new(
        Opts::new("ptm_component_errors_total", "Errors by component and error variant"),
        &["component", "error"]
    ).expect("metric creation failed");
}

/// Handle for the metrics registry.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TRANSACTIONS_SUBMITTED.clone()),
        Box::new(DISPATCHES.clone()),
        Box::new(ENDORSEMENT_ROUND_TRIPS.clone()),
        Box::new(RECEIPTS.clone()),
        Box::new(ASSEMBLES_IN_FLIGHT.clone()),
        Box::new(COMPONENT_ERRORS.clone()),
    ];

    for metric in metrics {
        REGISTRY.register(metric).map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle { _registry: Arc::new(REGISTRY.clone()) })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// RAII guard that increments `ASSEMBLES_IN_FLIGHT` on creation and
/// decrements it on drop, regardless of how the scope exits.
pub struct AssembleInFlightGuard;

impl AssembleInFlightGuard {
    pub fn enter() -> Self {
        ASSEMBLES_IN_FLIGHT.inc();
        Self
    }
}

impl Drop for AssembleInFlightGuard {
    fn drop(&mut self) {
        ASSEMBLES_IN_FLIGHT.dec();
    }
}
