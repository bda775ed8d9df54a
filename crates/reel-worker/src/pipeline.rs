//! Selection pipeline: candidates → validated → ranked → overlap-checked →
//! smoothed → final.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use reel_models::{
    CandidateSegment, FinalSelection, PipelineStage, RejectedSegment, RejectionReason, RunStatus,
    Segment, SelectedSegment,
};
use reel_ranking::{RankingRequest, RankingService};
use reel_ranking::types::{MAX_REEL_DURATION_SECS, MIN_REEL_DURATION_CAP_SECS};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::overlap::{scan_overlaps, OverlapScan};
use crate::smoothing::{smooth_boundaries, DEFAULT_MAX_GAP_SECS};
use crate::status::{LoggingStatusHook, RunReporter, StatusHook};
use crate::validation::BoundaryValidator;

/// Longest segment kept; longer candidates are cut to this length from their start.
pub const MAX_SEGMENT_SECS: f64 = 30.0;

/// Target used when neither a target nor the video duration is known.
pub const DEFAULT_TARGET_DURATION_SECS: f64 = 90.0;

/// Selection settings.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Segments under this confidence are rejected
    pub min_confidence: i32,
    /// Only segments at or above this confidence are offered to the ranker,
    /// unless none reach it
    pub ranking_confidence_floor: i32,
    /// Apply the validator's suggested boundary shifts
    pub apply_adjustments: bool,
    /// Largest gap closed by smoothing, in seconds
    pub max_gap: f64,
    /// Smooth the whole selection when any selected segment passed alignment
    pub smooth_all_if_any_validated: bool,
    /// Smooth regardless of alignment
    pub always_smooth: bool,
    pub overlap_scan: OverlapScan,
    /// Reject candidates without a description
    pub drop_empty_plots: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 5,
            ranking_confidence_floor: 7,
            apply_adjustments: false,
            max_gap: DEFAULT_MAX_GAP_SECS,
            smooth_all_if_any_validated: true,
            always_smooth: false,
            overlap_scan: OverlapScan::default(),
            drop_empty_plots: true,
        }
    }
}

/// Per-run inputs besides the candidates.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub run_id: String,
    /// Source duration in seconds, when known
    pub video_duration: Option<f64>,
    /// Explicit reel target; derived from the video duration when unset
    pub target_duration: Option<f64>,
    /// Known cast; unknown names in candidates are logged
    pub master_characters: Option<Vec<String>>,
}

impl SelectionRequest {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn with_video_duration(mut self, duration: f64) -> Self {
        self.video_duration = Some(duration);
        self
    }

    pub fn with_target_duration(mut self, target: f64) -> Self {
        self.target_duration = Some(target);
        self
    }

    pub fn with_master_characters(mut self, characters: Vec<String>) -> Self {
        self.master_characters = Some(characters);
        self
    }
}

/// Target handed to the ranker: explicit, else a quarter of the video capped
/// at 90 s, never above 120 s.
pub fn derive_target_duration(explicit: Option<f64>, video_duration: Option<f64>) -> f64 {
    let target = match (explicit, video_duration) {
        (Some(target), _) => target,
        (None, Some(duration)) => (duration / 4.0).min(MIN_REEL_DURATION_CAP_SECS),
        (None, None) => DEFAULT_TARGET_DURATION_SECS,
    };
    target.clamp(0.0, MAX_REEL_DURATION_SECS)
}

/// Upstream alignment checks a converted segment failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedChecks {
    pub segment_id: String,
    pub start: f64,
    pub end: f64,
    pub checks: Vec<String>,
}

/// Output of candidate conversion.
#[derive(Debug, Clone, Default)]
pub struct PreparedCandidates {
    pub segments: Vec<Segment>,
    pub rejected: Vec<RejectedSegment>,
    /// Kept segments with at least one failed alignment check
    pub failed_checks: Vec<FailedChecks>,
}

/// Convert candidates into segments, rejecting unparsable or empty windows
/// and clamping long ones to [`MAX_SEGMENT_SECS`].
pub fn prepare_candidates(candidates: Vec<CandidateSegment>) -> PreparedCandidates {
    let mut prepared = PreparedCandidates {
        segments: Vec::with_capacity(candidates.len()),
        ..Default::default()
    };

    for candidate in candidates {
        let segment_id = candidate.segment_id.clone();
        let failed: Vec<String> = candidate
            .failed_checks()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut segment = match candidate.into_segment() {
            Ok(segment) => segment,
            Err(e) => {
                prepared.rejected.push(RejectedSegment {
                    segment_id,
                    reason: RejectionReason::InvalidTimecode {
                        message: e.to_string(),
                    },
                });
                continue;
            }
        };

        let (start, end) = (segment.start_timestamp, segment.end_timestamp);
        if !(start >= 0.0 && end > start) {
            prepared.rejected.push(RejectedSegment {
                segment_id,
                reason: RejectionReason::InvalidTimecode {
                    message: format!("window [{start}, {end}) is empty or negative"),
                },
            });
            continue;
        }

        if end - start > MAX_SEGMENT_SECS {
            debug!(segment_id = %segment.segment_id, start, end, "Clamping segment to 30s");
            segment.end_timestamp = start + MAX_SEGMENT_SECS;
        }
        if !failed.is_empty() {
            prepared.failed_checks.push(FailedChecks {
                segment_id: segment.segment_id.clone(),
                start: segment.start_timestamp,
                end: segment.end_timestamp,
                checks: failed,
            });
        }
        prepared.segments.push(segment);
    }

    prepared
}

/// Segments offered to the ranker: those at or above `floor`, or all of them
/// when none reach it.
pub fn ranking_pool(validated: &[Segment], floor: i32) -> Vec<Segment> {
    let confident: Vec<Segment> = validated
        .iter()
        .filter(|s| s.validation_confidence >= floor)
        .cloned()
        .collect();
    if confident.is_empty() {
        validated.to_vec()
    } else {
        confident
    }
}

/// Whether the ordered selection gets smoothed.
pub fn should_smooth(config: &SelectionConfig, selected: &[SelectedSegment]) -> bool {
    config.always_smooth
        || (config.smooth_all_if_any_validated
            && selected.iter().any(|s| s.segment.alignment_validated))
}

fn rejection_kind(reason: &RejectionReason) -> &'static str {
    match reason {
        RejectionReason::InvalidTimecode { .. } => "invalid_timecode",
        RejectionReason::EmptyPlot => "empty_plot",
        RejectionReason::ValidationRejected { .. } => "validation_rejected",
    }
}

/// Runs the selection stages for one request.
#[derive(Clone)]
pub struct SelectionPipeline {
    config: SelectionConfig,
    validator: Arc<dyn BoundaryValidator>,
    ranker: Arc<dyn RankingService>,
    status: Arc<dyn StatusHook>,
}

impl SelectionPipeline {
    pub fn new(
        config: SelectionConfig,
        validator: Arc<dyn BoundaryValidator>,
        ranker: Arc<dyn RankingService>,
    ) -> Self {
        Self {
            config,
            validator,
            ranker,
            status: Arc::new(LoggingStatusHook),
        }
    }

    pub fn with_status_hook(mut self, status: Arc<dyn StatusHook>) -> Self {
        self.status = status;
        self
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Select, order and smooth segments for one reel.
    ///
    /// Per-candidate problems are absorbed into `rejected`. An empty validated
    /// set or a failed/empty ranking ends the run with an error.
    pub async fn run(
        &self,
        request: &SelectionRequest,
        candidates: Vec<CandidateSegment>,
    ) -> WorkerResult<FinalSelection> {
        let logger = RunLogger::new(&request.run_id, "selection");
        let reporter = RunReporter::new(&request.run_id, self.status.clone());
        logger.log_start(&format!("{} candidates", candidates.len()));

        // Candidates
        let PreparedCandidates {
            segments,
            mut rejected,
            failed_checks,
        } = prepare_candidates(candidates);
        for r in &rejected {
            logger.log_warning(&format!("Rejected {}: {:?}", r.segment_id, r.reason));
        }
        for failed in &failed_checks {
            logger.log_segment_warning(
                &failed.segment_id,
                failed.start,
                failed.end,
                &format!("failed alignment checks: {}", failed.checks.join(", ")),
            );
        }
        reporter
            .stage(
                PipelineStage::Candidates,
                RunStatus::Completed,
                format!("{} converted, {} rejected", segments.len(), rejected.len()),
            )
            .await;

        // Validated
        let validated = self.validate_all(segments, request, &logger, &mut rejected);
        for r in &rejected {
            metrics::record_segment_rejected(rejection_kind(&r.reason));
        }
        if validated.is_empty() {
            let err = WorkerError::NoValidatedSegments {
                rejected: rejected.len(),
            };
            reporter
                .stage(PipelineStage::Validated, RunStatus::Failed, err.to_string())
                .await;
            logger.log_error(&err.to_string());
            return Err(err);
        }
        reporter
            .stage(
                PipelineStage::Validated,
                RunStatus::Completed,
                format!("{} validated", validated.len()),
            )
            .await;

        // Ranked
        let ranked = match self.rank(request, &validated, &logger).await {
            Ok(ranked) => ranked,
            Err(err) => {
                reporter
                    .stage(PipelineStage::Ranked, RunStatus::Failed, err.to_string())
                    .await;
                logger.log_error(&err.to_string());
                return Err(err);
            }
        };
        let target_duration = derive_target_duration(request.target_duration, request.video_duration);
        reporter
            .stage(
                PipelineStage::Ranked,
                RunStatus::Completed,
                format!("{} selected", ranked.len()),
            )
            .await;

        // Overlap checked
        let overlaps = scan_overlaps(&ranked, self.config.overlap_scan);
        for overlap in &overlaps {
            warn!(
                run_id = %request.run_id,
                first = %overlap.segments[0],
                second = %overlap.segments[1],
                overlap_start = overlap.overlap_start,
                overlap_end = overlap.overlap_end,
                duration = overlap.duration,
                "Selected segments overlap"
            );
        }
        reporter
            .stage(
                PipelineStage::OverlapChecked,
                RunStatus::Completed,
                format!("{} overlaps", overlaps.len()),
            )
            .await;

        // Smoothed
        let smoothing_applied = should_smooth(&self.config, &ranked);
        let final_segments = if smoothing_applied {
            smooth_boundaries(&ranked, self.config.max_gap)
        } else {
            ranked
        };
        reporter
            .stage(
                PipelineStage::Smoothed,
                RunStatus::Completed,
                if smoothing_applied { "applied" } else { "skipped" },
            )
            .await;

        // Final
        let actual_total_duration = FinalSelection::total_duration(&final_segments);
        metrics::record_selection(final_segments.len(), overlaps.len(), actual_total_duration);
        reporter
            .stage(
                PipelineStage::Final,
                RunStatus::Completed,
                format!(
                    "{} segments, {:.2}s",
                    final_segments.len(),
                    actual_total_duration
                ),
            )
            .await;
        logger.log_completion(&format!(
            "{} segments, {:.2}s (target {:.2}s)",
            final_segments.len(),
            actual_total_duration,
            target_duration
        ));

        Ok(FinalSelection {
            segments: final_segments,
            overlaps,
            actual_total_duration,
            target_duration,
            smoothing_applied,
            rejected,
        })
    }

    fn validate_all(
        &self,
        segments: Vec<Segment>,
        request: &SelectionRequest,
        logger: &RunLogger,
        rejected: &mut Vec<RejectedSegment>,
    ) -> Vec<Segment> {
        let cast: Option<HashSet<String>> = request
            .master_characters
            .as_ref()
            .map(|names| names.iter().map(|n| n.trim().to_lowercase()).collect());

        let mut validated = Vec::with_capacity(segments.len());

        for mut segment in segments {
            if self.config.drop_empty_plots && segment.main_plot.trim().is_empty() {
                logger.log_segment_warning(
                    &segment.segment_id,
                    segment.start_timestamp,
                    segment.end_timestamp,
                    "empty plot, dropped",
                );
                rejected.push(RejectedSegment {
                    segment_id: segment.segment_id,
                    reason: RejectionReason::EmptyPlot,
                });
                continue;
            }

            if let Some(cast) = &cast {
                let unknown = unknown_characters(&segment.characters, cast);
                if !unknown.is_empty() {
                    logger.log_segment_warning(
                        &segment.segment_id,
                        segment.start_timestamp,
                        segment.end_timestamp,
                        &format!("characters not in master list: {}", unknown.join(", ")),
                    );
                }
            }

            let report = self.validator.validate(&segment);
            segment.validation_confidence = report.confidence();

            if report.confidence() < self.config.min_confidence {
                logger.log_segment_warning(
                    &segment.segment_id,
                    segment.start_timestamp,
                    segment.end_timestamp,
                    &format!(
                        "confidence {} below {}: {}",
                        report.confidence(),
                        self.config.min_confidence,
                        report.issues.join("; ")
                    ),
                );
                rejected.push(RejectedSegment {
                    segment_id: segment.segment_id,
                    reason: RejectionReason::ValidationRejected {
                        confidence: report.confidence(),
                        threshold: self.config.min_confidence,
                    },
                });
                continue;
            }

            if self.config.apply_adjustments {
                apply_adjustment(
                    &mut segment,
                    report.suggestions.adjust_start,
                    report.suggestions.adjust_end,
                    request.video_duration,
                );
            }

            validated.push(segment);
        }

        validated
    }

    async fn rank(
        &self,
        request: &SelectionRequest,
        validated: &[Segment],
        logger: &RunLogger,
    ) -> WorkerResult<Vec<SelectedSegment>> {
        let pool = ranking_pool(validated, self.config.ranking_confidence_floor);
        let offered: HashSet<String> = pool.iter().map(|s| s.segment_id.clone()).collect();
        let target = derive_target_duration(request.target_duration, request.video_duration);

        info!(
            run_id = %request.run_id,
            offered = pool.len(),
            validated = validated.len(),
            target_duration = target,
            "Requesting ranking"
        );

        let ranking_request = RankingRequest::new(target, pool);
        let mut ranked = self.ranker.rank(&ranking_request).await?;
        if ranked.is_empty() {
            return Err(WorkerError::EmptyRanking);
        }

        ranked.sort_by_key(|s| s.order);

        for selected in &ranked {
            if !offered.contains(selected.segment_id()) {
                logger.log_segment_warning(
                    selected.segment_id(),
                    selected.segment.start_timestamp,
                    selected.segment.end_timestamp,
                    "ranker returned a segment that was not offered",
                );
            }
        }

        Ok(ranked)
    }
}

fn unknown_characters(characters: &BTreeSet<String>, cast: &HashSet<String>) -> Vec<String> {
    characters
        .iter()
        .filter(|name| !cast.contains(&name.trim().to_lowercase()))
        .cloned()
        .collect()
}

/// Shift boundaries, clamped to `[0, video_duration]`. Shifts that would
/// empty the window are ignored.
fn apply_adjustment(
    segment: &mut Segment,
    adjust_start: f64,
    adjust_end: f64,
    video_duration: Option<f64>,
) {
    if adjust_start == 0.0 && adjust_end == 0.0 {
        return;
    }
    let upper = video_duration
        .filter(|d| *d > 0.0)
        .unwrap_or(f64::INFINITY);
    let start = (segment.start_timestamp + adjust_start).clamp(0.0, upper);
    let end = (segment.end_timestamp + adjust_end).clamp(0.0, upper);

    if end > start {
        debug!(
            segment_id = %segment.segment_id,
            from_start = segment.start_timestamp,
            from_end = segment.end_timestamp,
            start,
            end,
            "Applying boundary adjustment"
        );
        segment.start_timestamp = start;
        segment.end_timestamp = end;
    } else {
        warn!(
            segment_id = %segment.segment_id,
            start,
            end,
            "Ignoring adjustment that empties the segment"
        );
    }
}
