//! FFmpeg CLI wrapper for highlight reel assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress tracing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Source probing through ffprobe
//! - Logo bumper rendering
//! - Reel assembly (cut, bumper, concatenate)

pub mod bumper;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod reel;

pub use bumper::{BumperConfig, BumperPlanes, PreparedBumper};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use reel::{
    create_workspace, plan_cuts, AssembledClip, AssemblyConfig, ConcatMethod, PlannedCut,
    ReelAssembler, ReelOutput, SkippedSegment,
};
