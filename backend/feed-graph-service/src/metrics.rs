//! Prometheus metrics for feed-graph-service.
//!
//! Collectors are process-global; `serve_metrics` renders them for `/metrics`.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

use crate::error::FeedResult;

lazy_static! {
    /// Manager operations by name and outcome (ok or error kind).
    pub static ref GRAPH_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_graph_operations_total",
        "Feed graph operations segmented by operation and result",
        &["operation", "result"]
    )
    .expect("failed to register feed_graph_operations_total");

    /// Rejected ballots by reason.
    pub static ref POLL_VOTES_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feed_poll_votes_rejected_total",
        "Poll votes rejected segmented by reason",
        &["reason"]
    )
    .expect("failed to register feed_poll_votes_rejected_total");

    /// Comments created but left top-level because the reply edge did not match.
    pub static ref REPLY_LINK_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "feed_reply_link_failures_total",
        "Comments whose REPLY_ON edge could not be written"
    )
    .expect("failed to register feed_reply_link_failures_total");
}

fn result_label<T>(result: &FeedResult<T>) -> &'static str {
    use crate::error::FeedError;

    match result {
        Ok(_) => "ok",
        Err(FeedError::NotFound(_)) => "not_found",
        Err(FeedError::Validation(_)) => "validation",
        Err(FeedError::Conflict(_)) => "conflict",
        Err(FeedError::UpstreamUnavailable(_)) => "upstream_unavailable",
    }
}

/// Count one manager operation and hand the result back unchanged
pub fn record_operation<T>(operation: &str, result: FeedResult<T>) -> FeedResult<T> {
    GRAPH_OPERATIONS_TOTAL
        .with_label_values(&[operation, result_label(&result)])
        .inc();
    result
}

pub fn record_vote_rejected(reason: &str) {
    POLL_VOTES_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_reply_link_failure() {
    REPLY_LINK_FAILURES_TOTAL.inc();
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
