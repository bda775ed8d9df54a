//! Ranking service request/response types.

use serde::{Deserialize, Serialize};

use reel_models::{Segment, SelectedSegment};

use crate::error::{RankingError, RankingResult};

/// Upper bound of any reel, in seconds.
pub const MAX_REEL_DURATION_SECS: f64 = 120.0;
/// Cap on the minimum duration the ranker is asked to reach.
pub const MIN_REEL_DURATION_CAP_SECS: f64 = 90.0;

/// Segments offered to the ranker with advisory duration targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRequest {
    pub target_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub segments: Vec<Segment>,
}

impl RankingRequest {
    /// Build a request, deriving the advisory bounds from `target_duration`.
    pub fn new(target_duration: f64, segments: Vec<Segment>) -> Self {
        let target_duration = target_duration.clamp(0.0, MAX_REEL_DURATION_SECS);
        Self {
            target_duration,
            min_duration: target_duration.min(MIN_REEL_DURATION_CAP_SECS),
            max_duration: MAX_REEL_DURATION_SECS,
            segments,
        }
    }
}

/// Ordered subset chosen by the ranker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingResponse {
    pub selected_segments: Vec<SelectedSegment>,
}

impl RankingResponse {
    /// Parse a response body that may be wrapped in markdown code fences or
    /// surrounded by prose.
    pub fn from_text(body: &str) -> RankingResult<Self> {
        let json = extract_json(body).ok_or_else(|| {
            RankingError::InvalidResponse(format!(
                "no JSON object in response: {}",
                truncate(body, 200)
            ))
        })?;
        Ok(serde_json::from_str(json)?)
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}

/// Find the JSON object inside `text`: a ```json fence, any ``` fence, or the
/// outermost braces, in that order.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(inner) = fenced(text, "```json") {
        return Some(inner);
    }
    if let Some(inner) = fenced(text, "```") {
        return Some(inner);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    let inner = rest[..end].trim();
    (!inner.is_empty()).then_some(inner)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
