//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for reel runs with tracing spans
//! and the run id attached to every line.

use tracing::{error, info, warn, Span};

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Create a new logger for a run and operation (e.g. "selection", "assembly").
    pub fn new(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Same run, different operation.
    pub fn for_operation(&self, operation: &str) -> Self {
        Self::new(&self.run_id, operation)
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    /// Warning about one segment, with its bounds as fields.
    pub fn log_segment_warning(&self, segment_id: &str, start: f64, end: f64, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            segment_id,
            start,
            end,
            "Segment warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the run id, for instrumenting futures.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger() {
        let logger = RunLogger::new("run-42", "selection");
        assert_eq!(logger.run_id(), "run-42");
        assert_eq!(logger.operation(), "selection");

        let assembly = logger.for_operation("assembly");
        assert_eq!(assembly.run_id(), "run-42");
        assert_eq!(assembly.operation(), "assembly");
    }
}
