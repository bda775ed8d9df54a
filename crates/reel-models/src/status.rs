//! Run and segment status reported to external dispatchers.
//!
//! The engine never persists these itself; status hooks receive them at stage
//! boundaries and may forward them to a document store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Processing status of a run or of a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted, not started
    #[default]
    Pending,
    /// Actively being processed
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage boundaries of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Candidates,
    Validated,
    Ranked,
    OverlapChecked,
    Smoothed,
    Final,
    Assembled,
    Stored,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Candidates => "candidates",
            PipelineStage::Validated => "validated",
            PipelineStage::Ranked => "ranked",
            PipelineStage::OverlapChecked => "overlap_checked",
            PipelineStage::Smoothed => "smoothed",
            PipelineStage::Final => "final",
            PipelineStage::Assembled => "assembled",
            PipelineStage::Stored => "stored",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One status transition, suitable for forwarding to a store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusEvent {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    /// Stage-level event for a run.
    pub fn stage(run_id: impl Into<String>, stage: PipelineStage, status: RunStatus) -> Self {
        Self {
            run_id: run_id.into(),
            segment_id: None,
            stage: Some(stage),
            status,
            detail: None,
            at: Utc::now(),
        }
    }

    /// Segment-level event within a run.
    pub fn segment(
        run_id: impl Into<String>,
        segment_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            segment_id: Some(segment_id.into()),
            stage: None,
            status,
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RunStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(
            serde_json::to_string(&PipelineStage::OverlapChecked).unwrap(),
            "\"overlap_checked\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
    }

    #[test]
    fn test_stage_order() {
        assert!(PipelineStage::Validated < PipelineStage::Ranked);
        assert!(PipelineStage::Smoothed < PipelineStage::Final);
    }
}
