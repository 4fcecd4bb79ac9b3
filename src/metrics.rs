//! Prometheus metrics (spec.md §6 "Metrics"), modeled directly on bindy's
//! `metrics.rs`: a `LazyLock`-initialized `Registry`, `CounterVec`/
//! `HistogramVec`/`GaugeVec` statics per category, small `record_*` helper
//! functions, and a `gather_metrics()` text encoder served over `/metrics`.

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

const METRICS_NAMESPACE: &str = "ddns_sd_agent";

/// Global Prometheus metrics registry; every metric below registers itself
/// here on first access.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Abstract backend operations, labeled `op` ∈ {publish, suppress} and
/// `rrtype` (spec.md §6 category (a)).
pub static BACKEND_OPS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_backend_ops_total"),
        "Total abstract backend operations by op and record type",
    );
    let counter = CounterVec::new(opts, &["op", "rrtype", "status"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static BACKEND_OPS_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_backend_op_duration_seconds"),
        "Duration of abstract backend operations in seconds",
    )
    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["op", "rrtype"]).unwrap();
    METRICS_REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// In-progress gauge for abstract backend ops. The single-writer invariant
/// (spec.md §5: `sum_in_progress(backend_ops) ≤ 1`) is observable through
/// this metric.
pub static BACKEND_OPS_IN_PROGRESS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_backend_ops_in_progress"),
        "Abstract backend operations currently in flight",
    );
    let gauge = GaugeVec::new(opts, &["op"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Per-backend provider operations, labeled `op` ∈ {list, get, change}
/// (spec.md §6 category (b)).
pub static PROVIDER_OPS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_ops_total"),
        "Total provider-level operations by op and status",
    );
    let counter = CounterVec::new(opts, &["op", "status"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Container-runtime events, labeled `type` ∈ {started, stopped, ignored}
/// (spec.md §6 category (c)).
pub static RUNTIME_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_runtime_events_total"),
        "Total container runtime events observed by type",
    );
    let counter = CounterVec::new(opts, &["type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Exceptions raised while handling one runtime event, labeled by a coarse
/// error class (spec.md §7 `Unexpected`).
pub static EVENT_EXCEPTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_event_exceptions_total"),
        "Total unexpected errors while handling a runtime event, by class",
    );
    let counter = CounterVec::new(opts, &["class"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Conflict/transient retries against the record cache, labeled by outcome.
pub static RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_retries_total"),
        "Total conflict/transient retries by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Process start time, labeled with a build revision string when known
/// (spec.md §6: "A `start_timestamp` gauge is labeled with a build revision
/// string if known").
pub static START_TIMESTAMP: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_start_timestamp_seconds"),
        "Unix timestamp the process started, labeled by build revision",
    );
    let gauge = GaugeVec::new(opts, &["revision"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub fn record_backend_op(op: &str, rrtype: &str, status: &str, duration: Duration) {
    BACKEND_OPS_TOTAL.with_label_values(&[op, rrtype, status]).inc();
    BACKEND_OPS_DURATION_SECONDS
        .with_label_values(&[op, rrtype])
        .observe(duration.as_secs_f64());
}

pub fn backend_op_started(op: &str) {
    BACKEND_OPS_IN_PROGRESS.with_label_values(&[op]).inc();
}

pub fn backend_op_finished(op: &str) {
    BACKEND_OPS_IN_PROGRESS.with_label_values(&[op]).dec();
}

pub fn record_provider_op(op: &str, status: &str) {
    PROVIDER_OPS_TOTAL.with_label_values(&[op, status]).inc();
}

pub fn record_runtime_event(event_type: &str) {
    RUNTIME_EVENTS_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_event_exception(class: &str) {
    EVENT_EXCEPTIONS_TOTAL.with_label_values(&[class]).inc();
}

pub fn record_retry(outcome: &str) {
    RETRIES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_start_timestamp(unix_seconds: f64, revision: &str) {
    START_TIMESTAMP.with_label_values(&[revision]).set(unix_seconds);
}

/// Render every registered metric in Prometheus text exposition format.
///
/// # Errors
/// Returns an error if encoding the gathered metric families fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
