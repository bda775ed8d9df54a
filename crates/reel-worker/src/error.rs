//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No candidate survived validation ({rejected} rejected)")]
    NoValidatedSegments { rejected: usize },

    #[error("External ranking failed: {0}")]
    Ranking(#[from] reel_ranking::RankingError),

    #[error("Ranking returned no segments")]
    EmptyRanking,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Timecode error: {0}")]
    Timecode(#[from] reel_models::TimecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Ranking(e) => e.is_retryable(),
            WorkerError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::NoValidatedSegments { .. } => "no_validated_segments",
            WorkerError::Ranking(_) | WorkerError::EmptyRanking => "ranking_failure",
            WorkerError::Media(reel_media::MediaError::NoOutputProduced(_)) => "no_output_produced",
            WorkerError::Media(_) => "media",
            WorkerError::ConfigError(_) => "config",
            WorkerError::InvalidJob(_) | WorkerError::Json(_) | WorkerError::Timecode(_) => {
                "invalid_job"
            }
            WorkerError::Storage(_) => "storage",
            WorkerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_media::MediaError;
    use reel_ranking::RankingError;
    use reel_storage::StorageError;

    #[test]
    fn test_kinds() {
        assert_eq!(
            WorkerError::NoValidatedSegments { rejected: 3 }.kind(),
            "no_validated_segments"
        );
        assert_eq!(WorkerError::from(RankingError::EmptySelection).kind(), "ranking_failure");
        assert_eq!(
            WorkerError::from(MediaError::no_output("nothing")).kind(),
            "no_output_produced"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(WorkerError::from(StorageError::upload_failed("503")).is_retryable());
        assert!(!WorkerError::from(StorageError::not_found("k")).is_retryable());
        assert!(WorkerError::from(RankingError::Timeout(5)).is_retryable());
        assert!(!WorkerError::EmptyRanking.is_retryable());
    }
}
