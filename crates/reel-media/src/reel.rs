//! Reel assembly: cut, bumper, concatenate.
//!
//! # Flow
//!
//! 1. Validate the optional bumper image (decode + plane split) before any cut.
//! 2. Plan cuts against the source duration. Segments starting past the end
//!    are skipped, segments running past the end are clamped.
//! 3. Render the bumper once for the source frame size and rate. If that
//!    fails every planned cut is skipped and no reel is produced.
//! 4. Cut each planned segment into a re-encoded clip. A failing cut is logged
//!    and omitted; the rest of the reel is still produced.
//! 5. Concatenate clip [+ bumper] pieces in order into a workspace file and
//!    move it to the output path.
//!
//! Everything intermediate lives in one [`tempfile::TempDir`] that is dropped
//! on every exit path. Its path is made absolute so concat lists resolve
//! regardless of the process working directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;
use tokio::sync::watch;
use tracing::{info, warn};

use reel_models::{EncodingConfig, TimeSpan};

use crate::bumper::{render_bumper, split_planes, BumperConfig, PreparedBumper};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_normalize_filter, compose_concat_filter, concat_list, fit_frame_filter};
use crate::fs_utils::move_file;
use crate::probe::{probe_video, VideoInfo};

/// How the pieces of a reel are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcatMethod {
    /// Concat filter; every input is refit to the source frame. Always safe.
    #[default]
    Compose,
    /// Concat demuxer with stream copy. Needs identical stream parameters.
    Chain,
}

impl ConcatMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcatMethod::Compose => "compose",
            ConcatMethod::Chain => "chain",
        }
    }
}

impl FromStr for ConcatMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compose" => Ok(ConcatMethod::Compose),
            "chain" => Ok(ConcatMethod::Chain),
            other => Err(format!("unknown concat method: {other}")),
        }
    }
}

impl std::fmt::Display for ConcatMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assembler settings.
#[derive(Debug, Clone, Default)]
pub struct AssemblyConfig {
    pub encoding: EncodingConfig,
    pub bumper: BumperConfig,
    pub concat: ConcatMethod,
    /// Per-FFmpeg-process timeout
    pub timeout_secs: Option<u64>,
    /// Parent directory for the request workspace (system temp dir if unset)
    pub work_dir: Option<PathBuf>,
}

/// A segment that will be cut, with bounds already clamped to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCut {
    pub segment_id: String,
    pub start: f64,
    pub end: f64,
    /// Whether `end` was pulled back to the source duration
    pub clamped: bool,
}

impl PlannedCut {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A segment that did not make it into the reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSegment {
    pub segment_id: String,
    pub start: f64,
    pub end: f64,
    pub reason: String,
}

/// A clip that made it into the reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledClip {
    pub segment_id: String,
    pub start: f64,
    pub end: f64,
}

/// Result of a successful assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReelOutput {
    pub output_path: PathBuf,
    pub clips: Vec<AssembledClip>,
    pub skipped: Vec<SkippedSegment>,
    pub bumper_applied: bool,
    /// Clips plus bumpers, in seconds
    pub duration: f64,
}

/// Decide which segments can be cut from a source of `source_duration`.
pub fn plan_cuts<T: TimeSpan>(
    segments: &[T],
    source_duration: f64,
) -> (Vec<PlannedCut>, Vec<SkippedSegment>) {
    let mut planned = Vec::with_capacity(segments.len());
    let mut skipped = Vec::new();

    for segment in segments {
        let (id, start, end) = (segment.span_id(), segment.start(), segment.end());

        if start >= source_duration {
            let err = MediaError::SourceBounds {
                segment_id: id.to_string(),
                start,
                end,
                source_duration,
            };
            warn!(segment_id = id, start, end, source_duration, "{}", err);
            skipped.push(SkippedSegment {
                segment_id: id.to_string(),
                start,
                end,
                reason: err.to_string(),
            });
            continue;
        }

        let clamped = end > source_duration;
        let end = if clamped {
            warn!(
                segment_id = id,
                start,
                end,
                source_duration,
                "Segment end exceeds source duration, clamping"
            );
            source_duration
        } else {
            end
        };

        if start >= end {
            warn!(segment_id = id, start, end, "Empty segment after clamping, skipping");
            skipped.push(SkippedSegment {
                segment_id: id.to_string(),
                start,
                end,
                reason: "empty after clamping to source".to_string(),
            });
            continue;
        }

        planned.push(PlannedCut {
            segment_id: id.to_string(),
            start,
            end,
            clamped,
        });
    }

    (planned, skipped)
}

/// Create the request workspace under `work_dir` (system temp dir if unset)
/// and return it with its absolute path.
pub async fn create_workspace(work_dir: Option<&Path>) -> MediaResult<(TempDir, PathBuf)> {
    let workspace = match work_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            tempfile::Builder::new().prefix("reel-").tempdir_in(dir)?
        }
        None => tempfile::Builder::new().prefix("reel-").tempdir()?,
    };
    let path = tokio::fs::canonicalize(workspace.path()).await?;
    Ok((workspace, path))
}

/// Mark every planned cut as failed after the bumper could not be rendered.
fn skip_all_cuts(
    planned: &[PlannedCut],
    already_skipped: usize,
    cause: &MediaError,
) -> MediaError {
    for cut in planned {
        let err = MediaError::assembly_failed(
            &cut.segment_id,
            format!("bumper render failed: {cause}"),
        );
        warn!(
            segment_id = %cut.segment_id,
            start = cut.start,
            end = cut.end,
            "{}",
            err
        );
    }
    metrics::counter!("reel_segments_skipped_total")
        .increment((planned.len() + already_skipped) as u64);
    MediaError::no_output(format!(
        "bumper render failed, all {} planned cuts skipped: {cause}",
        planned.len()
    ))
}

/// Cuts an ordered segment list out of one source into a single reel.
#[derive(Clone, Default)]
pub struct ReelAssembler {
    config: AssemblyConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for ReelAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReelAssembler")
            .field("config", &self.config)
            .field("cancellable", &self.cancel_rx.is_some())
            .finish()
    }
}

impl ReelAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self {
            config,
            cancel_rx: None,
        }
    }

    /// Abort running FFmpeg processes when the flag flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    fn runner(&self) -> FfmpegRunner {
        let runner = FfmpegRunner::new().with_optional_timeout(self.config.timeout_secs);
        match &self.cancel_rx {
            Some(rx) => runner.with_cancel(rx.clone()),
            None => runner,
        }
    }

    /// Probe `source` and assemble the reel.
    pub async fn assemble<T: TimeSpan>(
        &self,
        segments: &[T],
        source: &Path,
        bumper_image: Option<&Path>,
        output: &Path,
    ) -> MediaResult<ReelOutput> {
        let info = probe_video(source).await?;
        self.assemble_with_info(segments, source, &info, bumper_image, output)
            .await
    }

    /// Assemble the reel from an already probed source.
    pub async fn assemble_with_info<T: TimeSpan>(
        &self,
        segments: &[T],
        source: &Path,
        info: &VideoInfo,
        bumper_image: Option<&Path>,
        output: &Path,
    ) -> MediaResult<ReelOutput> {
        let (_workspace, work_path) = create_workspace(self.config.work_dir.as_deref()).await?;
        let work = work_path.as_path();

        // Bumper problems are configuration errors, reported before any cut
        let planes = match bumper_image {
            Some(image) => {
                self.config.bumper.validate()?;
                Some(split_planes(image, work)?)
            }
            None => None,
        };

        let (planned, mut skipped) = plan_cuts(segments, info.duration);
        if planned.is_empty() {
            metrics::counter!("reel_segments_skipped_total").increment(skipped.len() as u64);
            return Err(MediaError::no_output(format!(
                "none of {} segments fall inside the {:.2}s source",
                segments.len(),
                info.duration
            )));
        }

        let runner = self.runner();

        let bumper = match &planes {
            Some(planes) => {
                let rendered = render_bumper(
                    planes,
                    &self.config.bumper,
                    info,
                    &self.config.encoding,
                    &work.join("bumper.mp4"),
                    &runner,
                )
                .await;
                match rendered {
                    Ok(rendered) => Some(rendered),
                    Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                    Err(e) => return Err(skip_all_cuts(&planned, skipped.len(), &e)),
                }
            }
            None => None,
        };

        let mut clips = Vec::with_capacity(planned.len());
        let mut inputs: Vec<PathBuf> = Vec::with_capacity(planned.len() * 2);

        for (index, cut) in planned.iter().enumerate() {
            let clip_path = work.join(format!("clip_{:03}.mp4", index + 1));
            match self.cut(&runner, source, info, cut, &clip_path).await {
                Ok(()) => {
                    info!(
                        segment_id = %cut.segment_id,
                        start = cut.start,
                        end = cut.end,
                        "Segment cut"
                    );
                    inputs.push(clip_path);
                    if let Some(bumper) = &bumper {
                        inputs.push(bumper.path.clone());
                    }
                    clips.push(AssembledClip {
                        segment_id: cut.segment_id.clone(),
                        start: cut.start,
                        end: cut.end,
                    });
                }
                Err(e) if e.is_segment_local() => {
                    let err = MediaError::assembly_failed(&cut.segment_id, e.to_string());
                    warn!(
                        segment_id = %cut.segment_id,
                        start = cut.start,
                        end = cut.end,
                        "{}",
                        err
                    );
                    skipped.push(SkippedSegment {
                        segment_id: cut.segment_id.clone(),
                        start: cut.start,
                        end: cut.end,
                        reason: err.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        metrics::counter!("reel_segments_skipped_total").increment(skipped.len() as u64);

        if clips.is_empty() {
            return Err(MediaError::no_output(format!(
                "all {} planned cuts failed",
                planned.len()
            )));
        }

        let staged = work.join("reel.mp4");
        self.concat(&runner, &inputs, info, &staged).await?;
        move_file(&staged, output).await?;

        let bumper_total = bumper
            .as_ref()
            .map(|b: &PreparedBumper| b.duration * clips.len() as f64)
            .unwrap_or(0.0);
        let duration = clips.iter().map(|c| c.end - c.start).sum::<f64>() + bumper_total;

        metrics::counter!("reel_clips_assembled_total").increment(clips.len() as u64);
        metrics::histogram!("reel_duration_seconds").record(duration);

        info!(
            output = %output.display(),
            clips = clips.len(),
            skipped = skipped.len(),
            duration,
            "Reel assembled"
        );

        Ok(ReelOutput {
            output_path: output.to_path_buf(),
            clips,
            skipped,
            bumper_applied: bumper.is_some(),
            duration,
        })
    }

    /// Cut one segment into an independent clip normalized to the reel frame.
    async fn cut(
        &self,
        runner: &FfmpegRunner,
        source: &Path,
        info: &VideoInfo,
        cut: &PlannedCut,
        output: &Path,
    ) -> MediaResult<()> {
        let encoding = &self.config.encoding;
        let mut cmd = FfmpegCommand::new(source, output)
            .seek(cut.start)
            .duration(cut.duration())
            .video_filter(fit_frame_filter(info.width, info.height, info.fps))
            .video_codec(&encoding.codec)
            .preset(&encoding.preset)
            .crf(encoding.crf)
            .pixel_format(&encoding.pixel_format);

        cmd = if info.has_audio {
            cmd.output_arg("-af")
                .output_arg(audio_normalize_filter())
                .audio_codec(&encoding.audio_codec)
                .audio_bitrate(&encoding.audio_bitrate)
        } else {
            cmd.no_audio()
        };
        let cmd = cmd.output_args(encoding.extra_args.iter().cloned());

        runner.run(&cmd).await?;

        if tokio::fs::metadata(output).await.map(|m| m.len() == 0).unwrap_or(true) {
            return Err(MediaError::assembly_failed(&cut.segment_id, "cut produced no data"));
        }
        Ok(())
    }

    async fn concat(
        &self,
        runner: &FfmpegRunner,
        inputs: &[PathBuf],
        info: &VideoInfo,
        output: &Path,
    ) -> MediaResult<()> {
        let encoding = &self.config.encoding;

        let cmd = match self.config.concat {
            ConcatMethod::Compose => {
                let mut cmd = FfmpegCommand::new(&inputs[0], output);
                for input in &inputs[1..] {
                    cmd = cmd.add_input(input);
                }
                cmd = cmd
                    .filter_complex(compose_concat_filter(
                        inputs.len(),
                        info.width,
                        info.height,
                        info.fps,
                        info.has_audio,
                    ))
                    .map("[v]")
                    .video_codec(&encoding.codec)
                    .preset(&encoding.preset)
                    .crf(encoding.crf)
                    .pixel_format(&encoding.pixel_format);
                if info.has_audio {
                    cmd.map("[a]")
                        .audio_codec(&encoding.audio_codec)
                        .audio_bitrate(&encoding.audio_bitrate)
                } else {
                    cmd
                }
            }
            ConcatMethod::Chain => {
                let list = output.with_file_name("pieces.txt");
                tokio::fs::write(&list, concat_list(inputs)).await?;
                FfmpegCommand::new(&list, output)
                    .input_arg("-f")
                    .input_arg("concat")
                    .input_arg("-safe")
                    .input_arg("0")
                    .codec_copy()
            }
        };

        let cmd = cmd.output_arg("-movflags").output_arg("+faststart");
        runner.run(&cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::Segment;
    use tempfile::TempDir;

    fn info(duration: f64) -> VideoInfo {
        VideoInfo {
            duration,
            width: 1280,
            height: 720,
            fps: 30.0,
            codec: "h264".into(),
            has_audio: true,
        }
    }

    #[test]
    fn test_concat_method_parse() {
        assert_eq!("compose".parse::<ConcatMethod>().unwrap(), ConcatMethod::Compose);
        assert_eq!(" Chain ".parse::<ConcatMethod>().unwrap(), ConcatMethod::Chain);
        assert!("splice".parse::<ConcatMethod>().is_err());
        assert_eq!(ConcatMethod::default(), ConcatMethod::Compose);
    }

    #[test]
    fn test_plan_skips_and_clamps() {
        let segments = vec![
            Segment::new("inside", 10.0, 20.0),
            Segment::new("past_end", 120.0, 130.0),
            Segment::new("overhang", 90.0, 110.0),
            Segment::new("at_end", 100.0, 105.0),
        ];

        let (planned, skipped) = plan_cuts(&segments, 100.0);

        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].segment_id, "inside");
        assert!(!planned[0].clamped);
        assert_eq!(planned[1].segment_id, "overhang");
        assert_eq!(planned[1].end, 100.0);
        assert!(planned[1].clamped);

        let skipped_ids: Vec<_> = skipped.iter().map(|s| s.segment_id.as_str()).collect();
        assert_eq!(skipped_ids, vec!["past_end", "at_end"]);
    }

    #[test]
    fn test_plan_preserves_order() {
        let segments = vec![
            Segment::new("b", 50.0, 60.0),
            Segment::new("a", 0.0, 10.0),
        ];
        let (planned, _) = plan_cuts(&segments, 100.0);
        let ids: Vec<_> = planned.iter().map(|c| c.segment_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_out_of_bounds_only_produces_no_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("reel.mp4");
        let assembler = ReelAssembler::new(AssemblyConfig {
            work_dir: Some(dir.path().join("work")),
            ..Default::default()
        });

        let segments = vec![Segment::new("late", 200.0, 210.0)];
        let result = assembler
            .assemble_with_info(&segments, &dir.path().join("source.mp4"), &info(100.0), None, &output)
            .await;

        assert!(matches!(result, Err(MediaError::NoOutputProduced(_))));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_unreadable_bumper_fails_before_cutting() {
        let dir = TempDir::new().unwrap();
        let bumper = dir.path().join("logo.png");
        std::fs::write(&bumper, b"garbage").unwrap();
        let assembler = ReelAssembler::new(AssemblyConfig {
            work_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });

        let segments = vec![Segment::new("s1", 0.0, 10.0)];
        let result = assembler
            .assemble_with_info(
                &segments,
                &dir.path().join("source.mp4"),
                &info(100.0),
                Some(&bumper),
                &dir.path().join("reel.mp4"),
            )
            .await;

        assert!(matches!(result, Err(MediaError::InvalidBumper(_))));
    }

    #[tokio::test]
    async fn test_bumper_render_failure_skips_every_cut() {
        let dir = TempDir::new().unwrap();
        let logo = dir.path().join("logo.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([200, 10, 10, 255]))
            .save(&logo)
            .unwrap();
        let work = dir.path().join("work");
        let output = dir.path().join("reel.mp4");
        let assembler = ReelAssembler::new(AssemblyConfig {
            bumper: BumperConfig::default().with_background("not-a-colour"),
            work_dir: Some(work.clone()),
            ..Default::default()
        });

        let segments = vec![Segment::new("s1", 0.0, 10.0), Segment::new("s2", 20.0, 30.0)];
        let result = assembler
            .assemble_with_info(
                &segments,
                &dir.path().join("source.mp4"),
                &info(100.0),
                Some(&logo),
                &output,
            )
            .await;

        match result {
            Err(MediaError::NoOutputProduced(reason)) => {
                assert!(reason.contains("bumper render failed"));
                assert!(reason.contains("all 2 planned cuts"));
            }
            other => panic!("expected no output, got {other:?}"),
        }
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_workspace_path_is_absolute() {
        let parent = tempfile::Builder::new()
            .prefix("reel-relative-")
            .tempdir_in(".")
            .unwrap();
        let relative = Path::new(".").join(parent.path().file_name().unwrap());
        assert!(relative.is_relative());

        let (workspace, work) = create_workspace(Some(&relative)).await.unwrap();
        assert!(work.is_absolute());
        assert!(work.is_dir());

        let pieces = vec![work.join("clip_001.mp4"), work.join("bumper.mp4")];
        let list = concat_list(&pieces);
        for line in list.lines() {
            let path = line
                .strip_prefix("file '")
                .and_then(|l| l.strip_suffix('\''))
                .unwrap();
            assert!(Path::new(path).is_absolute(), "{path} is relative");
        }

        drop(workspace);
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn test_workspace_removed_after_failure() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("work");
        let assembler = ReelAssembler::new(AssemblyConfig {
            work_dir: Some(work.clone()),
            ..Default::default()
        });

        let segments = vec![Segment::new("late", 500.0, 510.0)];
        let _ = assembler
            .assemble_with_info(&segments, &dir.path().join("s.mp4"), &info(10.0), None, &dir.path().join("o.mp4"))
            .await;

        assert_eq!(std::fs::read_dir(&work).unwrap().count(), 0);
    }
}
