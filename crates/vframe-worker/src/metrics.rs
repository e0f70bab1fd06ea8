//! Job metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that exports them.

use metrics::{counter, gauge, histogram};
use vframe_models::OutputFormat;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vframe_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vframe_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vframe_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "vframe_jobs_active";
    pub const JOB_DURATION_SECONDS: &str = "vframe_job_duration_seconds";
    pub const FRAMES_WRITTEN_TOTAL: &str = "vframe_frames_written_total";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "completed").record(duration_secs);
}

pub fn record_job_failed(duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "error").record(duration_secs);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}

pub fn record_frame_written(format: OutputFormat) {
    let labels = [("format", format.extension().to_string())];
    counter!(names::FRAMES_WRITTEN_TOTAL, &labels).increment(1);
}
