//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use vframe_queue::StatusCounts;

/// Install the global Prometheus recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vframe_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vframe_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vframe_http_requests_in_flight";

    pub const JOBS_SUBMITTED_TOTAL: &str = "vframe_jobs_submitted_total";
    pub const UPLOAD_BYTES: &str = "vframe_upload_bytes";
    pub const TASKS: &str = "vframe_tasks";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted upload.
pub fn record_job_submitted(format: &str, upload_bytes: usize) {
    let labels = [("format", format.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
    histogram!(names::UPLOAD_BYTES).record(upload_bytes as f64);
}

/// Publish registry counts per status.
pub fn set_task_counts(counts: &StatusCounts) {
    for (status, count) in [
        ("pending", counts.pending),
        ("processing", counts.processing),
        ("completed", counts.completed),
        ("error", counts.error),
    ] {
        gauge!(names::TASKS, "status" => status).set(count as f64);
    }
}

/// Metrics middleware for HTTP requests.
///
/// Requests are labelled with their route template so per-job paths do not
/// create a series each.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
