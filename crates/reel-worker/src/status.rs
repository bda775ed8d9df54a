//! Status hooks notified at stage boundaries.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use reel_models::{PipelineStage, RunStatus, StatusEvent};

/// Receives run and segment status transitions.
///
/// Hooks must not fail the run; implementations that forward events to a
/// store handle their own errors.
#[async_trait]
pub trait StatusHook: Send + Sync {
    async fn notify(&self, event: StatusEvent);
}

/// Records every event through tracing.
#[derive(Debug, Clone, Default)]
pub struct LoggingStatusHook;

#[async_trait]
impl StatusHook for LoggingStatusHook {
    async fn notify(&self, event: StatusEvent) {
        info!(
            run_id = %event.run_id,
            segment_id = event.segment_id.as_deref().unwrap_or(""),
            stage = event.stage.map(|s| s.as_str()).unwrap_or(""),
            status = %event.status,
            detail = event.detail.as_deref().unwrap_or(""),
            "Status update"
        );
    }
}

/// Binds a hook to one run so call sites only name what changed.
#[derive(Clone)]
pub struct RunReporter {
    run_id: String,
    hook: Arc<dyn StatusHook>,
}

impl RunReporter {
    pub fn new(run_id: impl Into<String>, hook: Arc<dyn StatusHook>) -> Self {
        Self {
            run_id: run_id.into(),
            hook,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn run(&self, status: RunStatus, detail: Option<String>) {
        let event = StatusEvent {
            run_id: self.run_id.clone(),
            segment_id: None,
            stage: None,
            status,
            detail,
            at: chrono::Utc::now(),
        };
        self.hook.notify(event).await;
    }

    pub async fn stage(&self, stage: PipelineStage, status: RunStatus, detail: impl Into<String>) {
        self.hook
            .notify(StatusEvent::stage(&self.run_id, stage, status).with_detail(detail))
            .await;
    }

    pub async fn segment(&self, segment_id: &str, status: RunStatus, detail: Option<String>) {
        let event = StatusEvent::segment(&self.run_id, segment_id, status);
        let event = match detail {
            Some(detail) => event.with_detail(detail),
            None => event,
        };
        self.hook.notify(event).await;
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for assertions.
    #[derive(Default)]
    pub struct RecordingHook {
        pub events: Mutex<Vec<StatusEvent>>,
    }

    #[async_trait]
    impl StatusHook for RecordingHook {
        async fn notify(&self, event: StatusEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingHook {
        pub fn stages(&self) -> Vec<(PipelineStage, RunStatus)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| e.stage.map(|s| (s, e.status)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingHook;
    use super::*;

    #[tokio::test]
    async fn test_reporter_fills_run_id() {
        let hook = Arc::new(RecordingHook::default());
        let reporter = RunReporter::new("run-7", hook.clone());

        reporter.run(RunStatus::Processing, None).await;
        reporter
            .stage(PipelineStage::Validated, RunStatus::Completed, "2 kept")
            .await;
        reporter
            .segment("s1", RunStatus::Failed, Some("bad cut".into()))
            .await;

        let events = hook.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.run_id == "run-7"));
        assert_eq!(events[1].stage, Some(PipelineStage::Validated));
        assert_eq!(events[2].segment_id.as_deref(), Some("s1"));
        assert_eq!(events[2].detail.as_deref(), Some("bad cut"));
    }

    #[tokio::test]
    async fn test_logging_hook_accepts_events() {
        LoggingStatusHook
            .notify(StatusEvent::stage("r", PipelineStage::Final, RunStatus::Completed))
            .await;
    }
}
