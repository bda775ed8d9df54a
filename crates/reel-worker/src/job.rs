//! Highlight reel jobs: fetch, select, assemble, store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use reel_media::{probe_video, ReelAssembler, SkippedSegment, VideoInfo};
use reel_models::{CandidateSegment, PipelineStage, RunStatus, SelectedSegment};
use reel_storage::{BlobStore, StorageError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::pipeline::{SelectionPipeline, SelectionRequest};
use crate::retry::{retry_async, RetryConfig};
use crate::status::{LoggingStatusHook, RunReporter, StatusHook};

fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One reel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightJob {
    #[serde(default = "new_run_id")]
    pub run_id: String,
    pub source_uri: String,
    pub output_uri: String,
    #[serde(default)]
    pub bumper_uri: Option<String>,
    /// Source duration; probed when absent
    #[serde(default)]
    pub video_duration: Option<f64>,
    #[serde(default)]
    pub target_duration: Option<f64>,
    #[serde(default)]
    pub master_characters: Option<Vec<String>>,
    pub candidates: Vec<CandidateSegment>,
}

impl HighlightJob {
    /// Read a job from a JSON file.
    pub async fn from_path(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let job: Self = serde_json::from_slice(&bytes)?;
        Ok(job)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.run_id.trim().is_empty() {
            return Err(WorkerError::invalid_job("run_id is empty"));
        }
        if self.source_uri.trim().is_empty() {
            return Err(WorkerError::invalid_job("source_uri is empty"));
        }
        if self.output_uri.trim().is_empty() {
            return Err(WorkerError::invalid_job("output_uri is empty"));
        }
        if self.candidates.is_empty() {
            return Err(WorkerError::invalid_job("no candidate segments"));
        }
        Ok(())
    }

    fn selection_request(&self, video_duration: Option<f64>) -> SelectionRequest {
        SelectionRequest {
            run_id: self.run_id.clone(),
            video_duration,
            target_duration: self.target_duration,
            master_characters: self.master_characters.clone(),
        }
    }
}

/// Either a reel reference or a structured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        run_id: String,
        reel_uri: String,
        segments: Vec<SelectedSegment>,
        actual_total_duration: f64,
        overlaps_detected: usize,
        skipped: Vec<SkippedSegment>,
    },
    Failed {
        run_id: String,
        /// Machine-readable error kind
        kind: String,
        reason: String,
    },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }

    pub fn run_id(&self) -> &str {
        match self {
            JobOutcome::Completed { run_id, .. } | JobOutcome::Failed { run_id, .. } => run_id,
        }
    }
}

/// Runs jobs end to end against injected collaborators.
pub struct ReelJobRunner {
    config: WorkerConfig,
    blobs: Arc<dyn BlobStore>,
    pipeline: SelectionPipeline,
    assembler: ReelAssembler,
    status: Arc<dyn StatusHook>,
    retry: RetryConfig,
}

impl ReelJobRunner {
    pub fn new(
        config: WorkerConfig,
        blobs: Arc<dyn BlobStore>,
        pipeline: SelectionPipeline,
        assembler: ReelAssembler,
    ) -> Self {
        Self {
            config,
            blobs,
            pipeline,
            assembler,
            status: Arc::new(LoggingStatusHook),
            retry: RetryConfig::new("blob_transfer"),
        }
    }

    /// Route run, stage and segment events to `status`.
    pub fn with_status_hook(mut self, status: Arc<dyn StatusHook>) -> Self {
        self.pipeline = self.pipeline.with_status_hook(status.clone());
        self.status = status;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run one job. Never returns an error; failures become
    /// [`JobOutcome::Failed`].
    pub async fn run(&self, job: HighlightJob) -> JobOutcome {
        let logger = RunLogger::new(&job.run_id, "job");
        let reporter = RunReporter::new(&job.run_id, self.status.clone());
        let started = Instant::now();

        reporter.run(RunStatus::Pending, None).await;
        reporter.run(RunStatus::Processing, None).await;
        logger.log_start(&format!(
            "source={} output={} candidates={}",
            job.source_uri,
            job.output_uri,
            job.candidates.len()
        ));

        let span = logger.create_span();
        match self.execute(&job, &reporter, &logger).instrument(span).await {
            Ok(outcome) => {
                metrics::record_run_completed(started.elapsed().as_secs_f64());
                if let JobOutcome::Completed { reel_uri, .. } = &outcome {
                    logger.log_completion(reel_uri);
                    reporter.run(RunStatus::Completed, Some(reel_uri.clone())).await;
                }
                outcome
            }
            Err(err) => {
                metrics::record_run_failed(err.kind());
                logger.log_error(&err.to_string());
                reporter.run(RunStatus::Failed, Some(err.to_string())).await;
                JobOutcome::Failed {
                    run_id: job.run_id.clone(),
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn execute(
        &self,
        job: &HighlightJob,
        reporter: &RunReporter,
        logger: &RunLogger,
    ) -> WorkerResult<JobOutcome> {
        job.validate()?;

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let workspace = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.config.work_dir)?;
        let work = workspace.path();

        let source = self.fetch(&job.source_uri, &work.join("source")).await?;
        let bumper = match &job.bumper_uri {
            Some(uri) => Some(self.fetch(uri, &work.join("bumper")).await?),
            None => None,
        };

        let mut probed: Option<VideoInfo> = None;
        let video_duration = match job.video_duration {
            Some(duration) => duration,
            None => {
                let info = probe_video(&source).await?;
                let duration = info.duration;
                probed = Some(info);
                duration
            }
        };

        let selection = self
            .pipeline
            .run(
                &job.selection_request(Some(video_duration)),
                job.candidates.clone(),
            )
            .await?;

        let info = match probed {
            Some(info) => info,
            None => probe_video(&source).await?,
        };

        for segment in &selection.segments {
            reporter
                .segment(segment.segment_id(), RunStatus::Pending, None)
                .await;
        }
        for segment in &selection.segments {
            reporter
                .segment(segment.segment_id(), RunStatus::Processing, None)
                .await;
        }

        let reel_path = work.join("reel.mp4");
        let output = match self
            .assembler
            .assemble_with_info(
                &selection.segments,
                &source,
                &info,
                bumper.as_deref(),
                &reel_path,
            )
            .await
        {
            Ok(output) => output,
            Err(err) => {
                for segment in &selection.segments {
                    reporter
                        .segment(segment.segment_id(), RunStatus::Failed, Some(err.to_string()))
                        .await;
                }
                reporter
                    .stage(PipelineStage::Assembled, RunStatus::Failed, err.to_string())
                    .await;
                return Err(err.into());
            }
        };

        for clip in &output.clips {
            reporter
                .segment(&clip.segment_id, RunStatus::Completed, None)
                .await;
        }
        for skipped in &output.skipped {
            logger.log_segment_warning(
                &skipped.segment_id,
                skipped.start,
                skipped.end,
                &skipped.reason,
            );
            reporter
                .segment(
                    &skipped.segment_id,
                    RunStatus::Failed,
                    Some(skipped.reason.clone()),
                )
                .await;
        }
        reporter
            .stage(
                PipelineStage::Assembled,
                RunStatus::Completed,
                format!("{} clips, {:.2}s", output.clips.len(), output.duration),
            )
            .await;

        let reel_uri = self.store(&output.output_path, &job.output_uri).await?;
        reporter
            .stage(PipelineStage::Stored, RunStatus::Completed, reel_uri.clone())
            .await;

        Ok(JobOutcome::Completed {
            run_id: job.run_id.clone(),
            reel_uri,
            overlaps_detected: selection.overlaps.len(),
            actual_total_duration: selection.actual_total_duration,
            segments: selection.segments,
            skipped: output.skipped,
        })
    }

    async fn fetch(&self, uri: &str, dest_dir: &Path) -> WorkerResult<PathBuf> {
        let path = retry_async(&self.retry, StorageError::is_retryable, || {
            self.blobs.fetch(uri, dest_dir)
        })
        .await?;
        Ok(path)
    }

    async fn store(&self, local: &Path, uri: &str) -> WorkerResult<String> {
        let path = retry_async(&self.retry, StorageError::is_retryable, || {
            self.blobs.store(local, uri)
        })
        .await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_defaults_run_id() {
        let json = r#"{
            "source_uri": "file:///videos/ep1.mp4",
            "output_uri": "r2://reels/ep1.mp4",
            "candidates": [
                {"segment_id": "s1", "start_timestamp": "00:10", "end_timestamp": "00:20", "main_plot": "x"}
            ]
        }"#;
        let job: HighlightJob = serde_json::from_str(json).unwrap();
        assert!(!job.run_id.is_empty());
        assert!(job.bumper_uri.is_none());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_job_without_candidates_is_invalid() {
        let job = HighlightJob {
            run_id: "r".into(),
            source_uri: "a.mp4".into(),
            output_uri: "b.mp4".into(),
            bumper_uri: None,
            video_duration: None,
            target_duration: None,
            master_characters: None,
            candidates: Vec::new(),
        };
        assert!(matches!(job.validate(), Err(WorkerError::InvalidJob(_))));
    }

    #[test]
    fn test_outcome_serialization() {
        let failed = JobOutcome::Failed {
            run_id: "r".into(),
            kind: "ranking_failure".into(),
            reason: "down".into(),
        };
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["kind"], "ranking_failure");
        assert!(!failed.is_completed());
        assert_eq!(failed.run_id(), "r");
    }
}
