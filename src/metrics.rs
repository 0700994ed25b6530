use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::backend::OperationKind;
use crate::errors::FailureClass;

/// Prefix shared by every exported metric.
pub const METRIC_NAMESPACE: &str = "rust_dbload";

lazy_static::lazy_static! {
    // === Operation Metrics ===

    pub static ref OPERATIONS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("operations_total", "Successful backend operations by kind")
                .namespace(METRIC_NAMESPACE),
            &["kind"]
        ).unwrap();

    pub static ref OPERATION_FAILURES_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("operation_failures_total", "Failed backend operations by failure class")
                .namespace(METRIC_NAMESPACE),
            &["class"]  // class: retryable, reconnect, unclassified
        ).unwrap();

    pub static ref OPERATION_DURATION_SECONDS: Histogram =
        Histogram::with_opts(
            HistogramOpts::new(
                "operation_duration_seconds",
                "Backend operation latencies in seconds."
            ).namespace(METRIC_NAMESPACE)
        ).unwrap();

    // === Connection Metrics ===

    pub static ref CONNECTS_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("connects_total", "Backend connections established")
                .namespace(METRIC_NAMESPACE)
        ).unwrap();

    pub static ref CONNECT_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("connect_failures_total", "Failed backend connection attempts")
                .namespace(METRIC_NAMESPACE)
        ).unwrap();

    pub static ref OPEN_CONNECTIONS: IntGauge =
        IntGauge::with_opts(
            Opts::new("open_connections", "Backend connections currently held by workers")
                .namespace(METRIC_NAMESPACE)
        ).unwrap();

    // === Profile Metrics ===

    pub static ref PROFILE_FETCH_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(
            Opts::new("profile_fetch_failures_total", "Failed profile status fetches")
                .namespace(METRIC_NAMESPACE)
        ).unwrap();

    pub static ref CURRENT_PROFILE: IntGauge =
        IntGauge::with_opts(
            Opts::new("current_profile", "Current load profile (0=off, 1=low, 2=med, 3=high)")
                .namespace(METRIC_NAMESPACE)
        ).unwrap();
}

/// Registers all metrics with the default Prometheus registry.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let registry = prometheus::default_registry();

    registry.register(Box::new(OPERATIONS_TOTAL.clone()))?;
    registry.register(Box::new(OPERATION_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(OPERATION_DURATION_SECONDS.clone()))?;

    registry.register(Box::new(CONNECTS_TOTAL.clone()))?;
    registry.register(Box::new(CONNECT_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(OPEN_CONNECTIONS.clone()))?;

    registry.register(Box::new(PROFILE_FETCH_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(CURRENT_PROFILE.clone()))?;

    init_label_values();
    Ok(())
}

/// Creates every labelled series up front so the final dump lists zeros
/// instead of omitting kinds and classes that never occurred.
pub fn init_label_values() {
    for kind in OperationKind::all() {
        OPERATIONS_TOTAL.with_label_values(&[kind.label()]);
    }
    for class in FailureClass::all() {
        OPERATION_FAILURES_TOTAL.with_label_values(&[class.label()]);
    }
}

/// Gathers and encodes metrics as a string for the final summary.
pub fn gather_metrics_string(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# ERROR ENCODING METRICS: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        eprintln!("Error encoding metrics to UTF-8: {}", e);
        String::from("# ERROR ENCODING METRICS TO UTF-8")
    })
}
