//! Prometheus metrics for reel runs.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_COMPLETED_TOTAL: &str = "reel_runs_completed_total";
    pub const RUNS_FAILED_TOTAL: &str = "reel_runs_failed_total";
    pub const SEGMENTS_REJECTED_TOTAL: &str = "reel_segments_rejected_total";
    pub const SEGMENTS_SELECTED_TOTAL: &str = "reel_segments_selected_total";
    pub const OVERLAPS_DETECTED_TOTAL: &str = "reel_overlaps_detected_total";
    pub const SELECTION_DURATION_SECONDS: &str = "reel_selection_duration_seconds";
    pub const RUN_DURATION_SECONDS: &str = "reel_run_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP listener on `port`.
pub fn install_exporter(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter on {addr}: {e}")))
}

/// Record a rejected candidate.
pub fn record_segment_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::SEGMENTS_REJECTED_TOTAL, &labels).increment(1);
}

/// Record the result of a selection run.
pub fn record_selection(selected: usize, overlaps: usize, total_duration_secs: f64) {
    counter!(names::SEGMENTS_SELECTED_TOTAL).increment(selected as u64);
    counter!(names::OVERLAPS_DETECTED_TOTAL).increment(overlaps as u64);
    histogram!(names::SELECTION_DURATION_SECONDS).record(total_duration_secs);
}

pub fn record_run_completed(elapsed_secs: f64) {
    counter!(names::RUNS_COMPLETED_TOTAL).increment(1);
    histogram!(names::RUN_DURATION_SECONDS).record(elapsed_secs);
}

pub fn record_run_failed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::RUNS_FAILED_TOTAL, &labels).increment(1);
}
