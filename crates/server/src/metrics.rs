//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the DaemonView server:
//! - HTTP request metrics (latency, counts, in-flight requests)
//! - Authentication failures and logins
//! - Ticket status transitions and current ticket counts (collected on scrape)

use once_cell::sync::Lazy;
use prometheus::{
    core::Collector, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "daemonview_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("valid histogram definition")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("daemonview_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid counter definition")
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "daemonview_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("valid gauge definition")
});

// =============================================================================
// Authentication Metrics
// =============================================================================

/// Authentication failures by reason.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "daemonview_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .expect("valid counter definition")
});

/// Login attempts by outcome (`success`, `failure`).
pub static LOGINS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("daemonview_logins_total", "Dashboard login attempts"),
        &["outcome"],
    )
    .expect("valid counter definition")
});

/// Live login sessions (collected on scrape).
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("daemonview_sessions_active", "Number of live login sessions")
        .expect("valid gauge definition")
});

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Tickets by current status (collected on scrape).
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("daemonview_tickets_by_status", "Current ticket count by status"),
        &["status"],
    )
    .expect("valid gauge definition")
});

/// Resolved or closed tickets by SLA outcome (collected on scrape).
pub static TICKETS_BY_SLA: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "daemonview_tickets_by_sla",
            "Finished ticket count by SLA outcome",
        ),
        &["outcome"],
    )
    .expect("valid gauge definition")
});

/// Ticket status transitions applied through the workflow.
pub static TICKET_STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "daemonview_ticket_status_transitions_total",
            "Ticket status transitions",
        ),
        &["from_status", "to_status"],
    )
    .expect("valid counter definition")
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        Box::new(LOGINS_TOTAL.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
        Box::new(TICKETS_BY_STATUS.clone()),
        Box::new(TICKETS_BY_SLA.clone()),
        Box::new(TICKET_STATUS_TRANSITIONS.clone()),
    ];

    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::warn!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh gauges from current application state before encoding.
pub fn collect_dynamic_metrics(state: &AppState) {
    state.sessions().purge_expired();
    SESSIONS_ACTIVE.set(state.sessions().active_count() as i64);

    match state.queries().stats() {
        Ok(stats) => {
            for (status, count) in &stats.by_status {
                TICKETS_BY_STATUS
                    .with_label_values(&[status.as_str()])
                    .set(*count);
            }
            TICKETS_BY_SLA.with_label_values(&["met"]).set(stats.sla_met);
            TICKETS_BY_SLA
                .with_label_values(&["breached"])
                .set(stats.sla_breached);
        }
        Err(e) => tracing::warn!("Skipping ticket gauges: {}", e),
    }
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid uuid pattern")
});

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("valid numeric pattern"));

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    // Applied twice: adjacent numeric segments share a slash.
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
