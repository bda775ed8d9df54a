//! Highlight reel worker.
//!
//! This crate provides:
//! - Boundary validation of candidate segments
//! - The selection pipeline (validate, rank, check overlaps, smooth)
//! - The job runner (fetch, select, assemble, store)
//! - Status hooks, structured run logging and metrics

pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod overlap;
pub mod pipeline;
pub mod retry;
pub mod smoothing;
pub mod status;
pub mod validation;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use job::{HighlightJob, JobOutcome, ReelJobRunner};
pub use logging::RunLogger;
pub use overlap::{detect_overlap, scan_overlaps, OverlapScan};
pub use pipeline::{SelectionConfig, SelectionPipeline, SelectionRequest, MAX_SEGMENT_SECS};
pub use retry::RetryConfig;
pub use smoothing::smooth_boundaries;
pub use status::{LoggingStatusHook, RunReporter, StatusHook};
pub use validation::{BoundaryValidator, KeywordMarkerValidator, MarkerSet, ValidationReport};
