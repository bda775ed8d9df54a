//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Segment {segment_id} [{start:.2}s, {end:.2}s) is outside the source ({source_duration:.2}s)")]
    SourceBounds {
        segment_id: String,
        start: f64,
        end: f64,
        source_duration: f64,
    },

    #[error("Segment {segment_id} could not be assembled: {message}")]
    AssemblyFailed { segment_id: String, message: String },

    #[error("No output produced: {0}")]
    NoOutputProduced(String),

    #[error("Invalid bumper asset: {0}")]
    InvalidBumper(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn assembly_failed(segment_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AssemblyFailed {
            segment_id: segment_id.into(),
            message: message.into(),
        }
    }

    pub fn no_output(reason: impl Into<String>) -> Self {
        Self::NoOutputProduced(reason.into())
    }

    pub fn invalid_bumper(message: impl Into<String>) -> Self {
        Self::InvalidBumper(message.into())
    }

    /// Whether this error only affects one segment of a reel.
    pub fn is_segment_local(&self) -> bool {
        matches!(
            self,
            MediaError::SourceBounds { .. }
                | MediaError::AssemblyFailed { .. }
                | MediaError::FfmpegFailed { .. }
                | MediaError::Timeout(_)
        )
    }
}
