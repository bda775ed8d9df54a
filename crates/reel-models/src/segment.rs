//! Segment models.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::timecode::{to_seconds, TimecodeError};

/// Confidence every segment starts from before validation.
pub const MAX_CONFIDENCE: i32 = 10;

/// Dramatic tension of a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TensionLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// Anything with a mutable `[start, end)` window and a stable id.
///
/// The overlap detector, smoother and assembler work over this trait so they
/// accept plain segments and ranked selections alike.
pub trait TimeSpan {
    fn span_id(&self) -> &str;
    fn start(&self) -> f64;
    fn end(&self) -> f64;
    fn set_start(&mut self, start: f64);
    fn set_end(&mut self, end: f64);

    fn duration(&self) -> f64 {
        self.end() - self.start()
    }
}

/// A candidate highlight with canonical second timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Stable identifier, unique within a run
    pub segment_id: String,

    /// Start in seconds
    pub start_timestamp: f64,

    /// End in seconds (exclusive)
    pub end_timestamp: f64,

    /// Participant names
    #[serde(default)]
    pub characters: BTreeSet<String>,

    /// What happens inside the window
    #[serde(default)]
    pub main_plot: String,

    #[serde(default)]
    pub tension_level: TensionLevel,

    /// 1-10
    #[serde(default = "default_importance", deserialize_with = "lenient_importance")]
    pub importance_score: u8,

    /// Set by the boundary validator; may be negative
    #[serde(default = "default_confidence")]
    pub validation_confidence: i32,

    /// True when every upstream alignment check passed
    #[serde(default)]
    pub alignment_validated: bool,
}

fn default_importance() -> u8 {
    5
}

/// Truncate to a whole score and clamp into 1-10.
fn clamp_importance(value: f64) -> u8 {
    if value.is_finite() {
        value.trunc().clamp(1.0, 10.0) as u8
    } else {
        default_importance()
    }
}

/// Accepts integers, floats, out-of-range values and numeric strings, so a
/// sloppy score never fails the whole document.
fn lenient_importance<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawScore {
        Number(f64),
        Text(String),
    }

    Ok(match RawScore::deserialize(deserializer)? {
        RawScore::Number(n) => clamp_importance(n),
        RawScore::Text(t) => t
            .trim()
            .parse::<f64>()
            .map(clamp_importance)
            .unwrap_or_else(|_| default_importance()),
    })
}

fn default_confidence() -> i32 {
    MAX_CONFIDENCE
}

impl Segment {
    /// Create a segment with default metadata.
    pub fn new(segment_id: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            segment_id: segment_id.into(),
            start_timestamp: start,
            end_timestamp: end,
            characters: BTreeSet::new(),
            main_plot: String::new(),
            tension_level: TensionLevel::default(),
            importance_score: default_importance(),
            validation_confidence: MAX_CONFIDENCE,
            alignment_validated: false,
        }
    }

    pub fn with_plot(mut self, plot: impl Into<String>) -> Self {
        self.main_plot = plot.into();
        self
    }

    pub fn with_alignment_validated(mut self, validated: bool) -> Self {
        self.alignment_validated = validated;
        self
    }

    pub fn with_characters<I, S>(mut self, characters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.characters = characters.into_iter().map(Into::into).collect();
        self
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_timestamp - self.start_timestamp
    }
}

impl TimeSpan for Segment {
    fn span_id(&self) -> &str {
        &self.segment_id
    }

    fn start(&self) -> f64 {
        self.start_timestamp
    }

    fn end(&self) -> f64 {
        self.end_timestamp
    }

    fn set_start(&mut self, start: f64) {
        self.start_timestamp = start;
    }

    fn set_end(&mut self, end: f64) {
        self.end_timestamp = end;
    }
}

/// A timestamp as annotators send it: plain seconds or timecode text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Timecode(String),
}

impl TimeValue {
    /// Resolve to seconds.
    pub fn to_seconds(&self) -> Result<f64, TimecodeError> {
        match self {
            TimeValue::Seconds(s) if s.is_finite() && *s >= 0.0 => Ok(*s),
            TimeValue::Seconds(s) => Err(TimecodeError::InvalidTimecode(s.to_string())),
            TimeValue::Timecode(text) => to_seconds(text),
        }
    }
}

impl From<f64> for TimeValue {
    fn from(value: f64) -> Self {
        TimeValue::Seconds(value)
    }
}

impl From<&str> for TimeValue {
    fn from(value: &str) -> Self {
        TimeValue::Timecode(value.to_string())
    }
}

/// Raw annotator output for one segment, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CandidateSegment {
    pub segment_id: String,

    pub start_timestamp: TimeValue,

    pub end_timestamp: TimeValue,

    #[serde(default)]
    pub characters: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_plot: Option<String>,

    #[serde(default)]
    pub tension_level: TensionLevel,

    #[serde(default = "default_importance", deserialize_with = "lenient_importance")]
    pub importance_score: u8,

    /// Named upstream checks, e.g. `no_temporal_bleeding`
    #[serde(default)]
    pub alignment_check: BTreeMap<String, bool>,
}

impl CandidateSegment {
    pub fn new(
        segment_id: impl Into<String>,
        start: impl Into<TimeValue>,
        end: impl Into<TimeValue>,
    ) -> Self {
        Self {
            segment_id: segment_id.into(),
            start_timestamp: start.into(),
            end_timestamp: end.into(),
            characters: BTreeSet::new(),
            main_plot: None,
            tension_level: TensionLevel::default(),
            importance_score: default_importance(),
            alignment_check: BTreeMap::new(),
        }
    }

    pub fn with_plot(mut self, plot: impl Into<String>) -> Self {
        self.main_plot = Some(plot.into());
        self
    }

    pub fn with_check(mut self, name: impl Into<String>, passed: bool) -> Self {
        self.alignment_check.insert(name.into(), passed);
        self
    }

    /// True when every alignment check passed (vacuously true when none ran).
    pub fn alignment_validated(&self) -> bool {
        self.alignment_check.values().all(|passed| *passed)
    }

    /// Names of the alignment checks that failed.
    pub fn failed_checks(&self) -> Vec<&str> {
        self.alignment_check
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Convert timestamps and copy metadata into a [`Segment`].
    ///
    /// Confidence starts at the maximum; the validator lowers it.
    pub fn into_segment(self) -> Result<Segment, TimecodeError> {
        let start = self.start_timestamp.to_seconds()?;
        let end = self.end_timestamp.to_seconds()?;
        let alignment_validated = self.alignment_validated();

        Ok(Segment {
            segment_id: self.segment_id,
            start_timestamp: start,
            end_timestamp: end,
            characters: self.characters,
            main_plot: self.main_plot.unwrap_or_default(),
            tension_level: self.tension_level,
            importance_score: self.importance_score.clamp(1, 10),
            validation_confidence: MAX_CONFIDENCE,
            alignment_validated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_accepts_mixed_timestamps() {
        let json = r#"{
            "segment_id": "seg_1",
            "start_timestamp": "01:30",
            "end_timestamp": 100.5,
            "main_plot": "John opens the door"
        }"#;
        let candidate: CandidateSegment = serde_json::from_str(json).unwrap();
        let segment = candidate.into_segment().unwrap();
        assert_eq!(segment.start_timestamp, 90.0);
        assert_eq!(segment.end_timestamp, 100.5);
        assert_eq!(segment.tension_level, TensionLevel::Medium);
        assert_eq!(segment.importance_score, 5);
        assert!(segment.alignment_validated);
    }

    #[test]
    fn test_alignment_requires_every_check() {
        let candidate = CandidateSegment::new("s", 0.0, 5.0)
            .with_check("summary_matches_video", true)
            .with_check("no_temporal_bleeding", false);
        assert!(!candidate.alignment_validated());
        assert_eq!(candidate.failed_checks(), vec!["no_temporal_bleeding"]);
    }

    #[test]
    fn test_invalid_timecode_is_reported() {
        let candidate = CandidateSegment::new("s", "bad", 5.0);
        assert!(candidate.into_segment().is_err());

        let candidate = CandidateSegment::new("s", -3.0, 5.0);
        assert!(candidate.into_segment().is_err());
    }

    #[test]
    fn test_importance_deserializes_leniently() {
        let parse = |score: &str| {
            let json = format!(
                r#"{{"segment_id": "s", "start_timestamp": 0, "end_timestamp": 5, "importance_score": {score}}}"#
            );
            serde_json::from_str::<CandidateSegment>(&json)
                .unwrap()
                .importance_score
        };
        assert_eq!(parse("7.5"), 7);
        assert_eq!(parse("-1"), 1);
        assert_eq!(parse("300"), 10);
        assert_eq!(parse("\"8\""), 8);
        assert_eq!(parse("\"high\""), 5);

        let segment: Segment = serde_json::from_str(
            r#"{"segment_id": "s", "start_timestamp": 0, "end_timestamp": 5, "importance_score": 9.9}"#,
        )
        .unwrap();
        assert_eq!(segment.importance_score, 9);
    }

    #[test]
    fn test_importance_is_clamped() {
        let mut candidate = CandidateSegment::new("s", 0.0, 5.0);
        candidate.importance_score = 42;
        assert_eq!(candidate.into_segment().unwrap().importance_score, 10);
    }

    #[test]
    fn test_time_span_accessors() {
        let mut segment = Segment::new("a", 2.0, 8.0);
        segment.set_end(9.0);
        assert_eq!(TimeSpan::duration(&segment), 7.0);
        assert_eq!(segment.span_id(), "a");
    }
}
