//! Shared data models for the highlight reel engine.
//!
//! This crate provides Serde-serializable types for:
//! - Candidate and validated segments
//! - Ranked selections, overlap reports and final selections
//! - Run/segment status events
//! - Encoding configuration
//! - Timecode conversion

pub mod encoding;
pub mod segment;
pub mod selection;
pub mod status;
pub mod timecode;

// Re-export common types
pub use encoding::EncodingConfig;
pub use segment::{CandidateSegment, Segment, TensionLevel, TimeSpan, TimeValue, MAX_CONFIDENCE};
pub use selection::{
    FinalSelection, OverlapReport, RejectedSegment, RejectionReason, SelectedSegment,
};
pub use status::{PipelineStage, RunStatus, StatusEvent};
pub use timecode::{to_seconds, to_timecode, to_timecode_hms, TimecodeError};
