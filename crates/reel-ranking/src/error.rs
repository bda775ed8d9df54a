//! Ranking client error types.

use thiserror::Error;

pub type RankingResult<T> = Result<T, RankingError>;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("Ranking service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Ranking service selected no segments")]
    EmptySelection,

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RankingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RankingError::ServiceUnavailable(_) | RankingError::Timeout(_) => true,
            RankingError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
