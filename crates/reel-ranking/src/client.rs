//! Ranking service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use reel_models::SelectedSegment;

use crate::error::{RankingError, RankingResult};
use crate::types::{HealthResponse, RankingRequest, RankingResponse};

/// External service that picks and orders segments for a reel.
#[async_trait]
pub trait RankingService: Send + Sync {
    /// Return the chosen subset, each with an `order` and transition note.
    async fn rank(&self, request: &RankingRequest) -> RankingResult<Vec<SelectedSegment>>;
}

/// Configuration for the ranking client.
#[derive(Debug, Clone)]
pub struct RankingClientConfig {
    /// Base URL of the ranking service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// First retry delay; doubles on every attempt
    pub backoff_base: Duration,
}

impl Default for RankingClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RankingClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("RANKING_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("RANKING_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("RANKING_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            backoff_base: defaults.backoff_base,
        }
    }
}

/// HTTP client for the ranking service (`POST {base}/rank`).
#[derive(Debug, Clone)]
pub struct RankingClient {
    http: Client,
    config: RankingClientConfig,
}

impl RankingClient {
    pub fn new(config: RankingClientConfig) -> RankingResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RankingError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> RankingResult<Self> {
        Self::new(RankingClientConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if the ranking service is healthy.
    pub async fn health_check(&self) -> RankingResult<bool> {
        match self.http.get(self.endpoint("health")).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Ranking service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ranking service health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn post_rank(&self, request: &RankingRequest) -> RankingResult<RankingResponse> {
        let response = self
            .http
            .post(self.endpoint("rank"))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RankingError::Timeout(self.config.timeout.as_secs())
                } else {
                    RankingError::Network(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RankingError::ServiceUnavailable(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(RankingError::RequestFailed(format!(
                "Ranking service returned {status}: {body}"
            )));
        }

        RankingResponse::from_text(&body)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RankingResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RankingResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff_base * 2u32.pow(attempt);
                    warn!(
                        "Ranking request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RankingService for RankingClient {
    async fn rank(&self, request: &RankingRequest) -> RankingResult<Vec<SelectedSegment>> {
        debug!(
            segments = request.segments.len(),
            target = request.target_duration,
            "Sending ranking request"
        );

        let response = self.with_retry(|| self.post_rank(request)).await?;
        if response.selected_segments.is_empty() {
            return Err(RankingError::EmptySelection);
        }

        info!(selected = response.selected_segments.len(), "Ranking received");
        Ok(response.selected_segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::Segment;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RankingClient {
        RankingClient::new(RankingClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff_base: Duration::from_millis(10),
        })
        .unwrap()
    }

    fn request() -> RankingRequest {
        RankingRequest::new(
            60.0,
            vec![
                Segment::new("a", 0.0, 20.0).with_plot("The chase starts"),
                Segment::new("b", 30.0, 50.0).with_plot("They escape"),
            ],
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = RankingClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8002");
        assert_eq!(config.max_retries, 2);
    }

    #[tokio::test]
    async fn test_rank_parses_fenced_body() {
        let server = MockServer::start().await;
        let body = format!(
            "```json\n{}\n```",
            json!({"selected_segments": [
                {"order": 1, "transition_note": "", "segment_id": "b",
                 "start_timestamp": 30.0, "end_timestamp": 50.0}
            ]})
        );
        Mock::given(method("POST"))
            .and(path("/rank"))
            .and(body_partial_json(json!({"target_duration": 60.0, "max_duration": 120.0})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let selected = client_for(&server).rank(&request()).await.unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].segment_id(), "b");
    }

    #[tokio::test]
    async fn test_rank_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rank"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).rank(&request()).await.unwrap_err();
        assert!(matches!(err, RankingError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_rank_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rank"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad segments"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).rank(&request()).await.unwrap_err();
        assert!(matches!(err, RankingError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn test_empty_selection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"selected_segments": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).rank(&request()).await.unwrap_err();
        assert!(matches!(err, RankingError::EmptySelection));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        assert!(client_for(&server).health_check().await.unwrap());
    }
}
