//! Lexical boundary validation.
//!
//! Annotators describe what happens inside a segment, but their summaries
//! often leak context from before or after the window ("previously", "will",
//! trailing ellipses). The validator scans the summary for such markers,
//! lowers a confidence score for each hit and suggests widening the window.

use regex::Regex;
use serde::{Deserialize, Serialize};

use reel_models::{Segment, MAX_CONFIDENCE};

use crate::error::{WorkerError, WorkerResult};

/// Confidence below which a report asks for adjustment even without issues.
pub const NEEDS_ADJUSTMENT_BELOW: i32 = 8;

/// Marker vocabulary. Every entry is matched case-insensitively on word
/// boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSet {
    /// References to earlier content anywhere in the text
    pub leading_temporal: Vec<String>,
    /// References to later content anywhere in the text
    pub trailing_temporal: Vec<String>,
    /// Action already under way when the window opens
    pub start_indicators: Vec<String>,
    /// Action still under way when the window closes
    pub end_indicators: Vec<String>,
    /// Characters at the start of the text searched for start indicators
    pub start_window_chars: usize,
    /// Characters at the end of the text searched for end indicators
    pub end_window_chars: usize,
    /// Suffixes that mark cut-off dialogue
    pub cutoff_suffixes: Vec<String>,
    pub temporal_penalty: i32,
    pub indicator_penalty: i32,
    pub cutoff_penalty: i32,
    /// Seconds suggested for moving the start earlier (negative)
    pub start_shift: f64,
    /// Seconds suggested for moving the end later (positive)
    pub end_shift: f64,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            leading_temporal: words(&[
                "previously",
                "earlier",
                "before this",
                "prior to",
                "preceding",
                "had been",
            ]),
            trailing_temporal: words(&[
                "later",
                "will",
                "about to",
                "following",
                "next",
                "subsequently",
                "then",
            ]),
            start_indicators: words(&[
                "continues",
                "still",
                "already",
                "ongoing",
                "in progress",
                "resumes",
            ]),
            end_indicators: words(&["continues", "ongoing", "begins to", "starts to", "about to"]),
            start_window_chars: 30,
            end_window_chars: 50,
            cutoff_suffixes: words(&["...", "…", "—", "–", "-"]),
            temporal_penalty: 2,
            indicator_penalty: 3,
            cutoff_penalty: 2,
            start_shift: -2.0,
            end_shift: 2.0,
        }
    }
}

/// Suggested boundary moves and the resulting confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationSuggestions {
    pub adjust_start: f64,
    pub adjust_end: f64,
    pub confidence: i32,
}

impl Default for ValidationSuggestions {
    fn default() -> Self {
        Self {
            adjust_start: 0.0,
            adjust_end: 0.0,
            confidence: MAX_CONFIDENCE,
        }
    }
}

/// Outcome of validating one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<String>,
    pub suggestions: ValidationSuggestions,
    pub needs_adjustment: bool,
}

impl ValidationReport {
    pub fn confidence(&self) -> i32 {
        self.suggestions.confidence
    }
}

/// Checks a segment's description for boundary bleeding. Never fails.
pub trait BoundaryValidator: Send + Sync {
    fn validate(&self, segment: &Segment) -> ValidationReport;
}

#[derive(Debug, Clone)]
struct Marker {
    word: String,
    pattern: Regex,
}

impl Marker {
    fn compile(word: &str) -> WorkerResult<Option<Self>> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Ok(None);
        }
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&word)))
            .map_err(|e| WorkerError::config_error(format!("marker '{word}': {e}")))?;
        Ok(Some(Self { word, pattern }))
    }

    fn compile_all(list: &[String]) -> WorkerResult<Vec<Self>> {
        let mut markers = Vec::with_capacity(list.len());
        for word in list {
            if let Some(marker) = Self::compile(word)? {
                markers.push(marker);
            }
        }
        Ok(markers)
    }
}

/// Keyword-marker implementation of [`BoundaryValidator`].
#[derive(Debug, Clone)]
pub struct KeywordMarkerValidator {
    markers: MarkerSet,
    leading: Vec<Marker>,
    trailing: Vec<Marker>,
    start_indicators: Vec<Marker>,
    end_indicators: Vec<Marker>,
}

impl KeywordMarkerValidator {
    pub fn new(markers: MarkerSet) -> WorkerResult<Self> {
        Ok(Self {
            leading: Marker::compile_all(&markers.leading_temporal)?,
            trailing: Marker::compile_all(&markers.trailing_temporal)?,
            start_indicators: Marker::compile_all(&markers.start_indicators)?,
            end_indicators: Marker::compile_all(&markers.end_indicators)?,
            markers,
        })
    }

    /// Validator with the default vocabulary.
    pub fn with_defaults() -> WorkerResult<Self> {
        Self::new(MarkerSet::default())
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Validate free text directly.
    pub fn validate_text(&self, text: &str) -> ValidationReport {
        let text = text.to_lowercase();
        let mut issues = Vec::new();
        let mut suggestions = ValidationSuggestions::default();
        let m = &self.markers;

        for marker in &self.leading {
            if marker.pattern.is_match(&text) {
                issues.push(format!(
                    "Temporal reference '{}' suggests content from before the segment",
                    marker.word
                ));
                suggestions.confidence -= m.temporal_penalty;
                suggestions.adjust_start = m.start_shift;
            }
        }
        for marker in &self.trailing {
            if marker.pattern.is_match(&text) {
                issues.push(format!(
                    "Temporal reference '{}' suggests content from after the segment",
                    marker.word
                ));
                suggestions.confidence -= m.temporal_penalty;
                suggestions.adjust_end = m.end_shift;
            }
        }

        let head_end = byte_offset_of_char(&text, m.start_window_chars);
        if let Some(marker) = self
            .start_indicators
            .iter()
            .find(|mk| mk.pattern.find_iter(&text).any(|hit| hit.end() <= head_end))
        {
            issues.push(format!(
                "Start indicator '{}' suggests the action started before the segment",
                marker.word
            ));
            suggestions.adjust_start = m.start_shift;
            suggestions.confidence -= m.indicator_penalty;
        }

        let char_count = text.chars().count();
        let tail_start = byte_offset_of_char(&text, char_count.saturating_sub(m.end_window_chars));
        if let Some(marker) = self
            .end_indicators
            .iter()
            .find(|mk| mk.pattern.find_iter(&text).any(|hit| hit.start() >= tail_start))
        {
            issues.push(format!(
                "End indicator '{}' suggests the action continues after the segment",
                marker.word
            ));
            suggestions.adjust_end = m.end_shift;
            suggestions.confidence -= m.indicator_penalty;
        }

        let trimmed = text.trim_end();
        if let Some(suffix) = m
            .cutoff_suffixes
            .iter()
            .find(|s| !s.is_empty() && trimmed.ends_with(s.as_str()))
        {
            issues.push(format!("Text ends with '{suffix}', suggesting cut-off dialogue"));
            suggestions.adjust_end = m.end_shift;
            suggestions.confidence -= m.cutoff_penalty;
        }

        let needs_adjustment = !issues.is_empty() || suggestions.confidence < NEEDS_ADJUSTMENT_BELOW;
        ValidationReport {
            issues,
            suggestions,
            needs_adjustment,
        }
    }
}

impl BoundaryValidator for KeywordMarkerValidator {
    fn validate(&self, segment: &Segment) -> ValidationReport {
        self.validate_text(&segment.main_plot)
    }
}

/// Byte offset of the `n`th character, or the text length past the end.
fn byte_offset_of_char(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> KeywordMarkerValidator {
        KeywordMarkerValidator::with_defaults().unwrap()
    }

    #[test]
    fn test_leading_temporal_word() {
        let report = validator().validate_text("Previously, John left the room");
        assert!(!report.issues.is_empty());
        assert_eq!(report.suggestions.adjust_start, -2.0);
        assert_eq!(report.suggestions.adjust_end, 0.0);
        assert!(report.needs_adjustment);
    }

    #[test]
    fn test_empty_plot_is_clean() {
        let report = validator().validate(&Segment::new("s", 0.0, 10.0));
        assert!(report.issues.is_empty());
        assert_eq!(report.confidence(), 10);
        assert!(!report.needs_adjustment);
        assert_eq!(report.suggestions.adjust_start, 0.0);
    }

    #[test]
    fn test_word_boundaries() {
        let report = validator().validate_text("William hands over the thenar splint");
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.confidence(), 10);
    }

    #[test]
    fn test_each_temporal_word_counts_once() {
        // "then" twice is one hit; "later" another
        let report = validator().validate_text("She argues, then cries, then later calls her mother");
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.confidence(), 6);
        assert_eq!(report.suggestions.adjust_end, 2.0);
    }

    #[test]
    fn test_start_indicator_window() {
        let report = validator().validate_text("The fight continues in the hallway as guards arrive");
        assert!(report.issues.iter().any(|i| i.starts_with("Start indicator")));
        assert_eq!(report.suggestions.adjust_start, -2.0);

        let late = validator().validate_text(
            "Guards arrive at the gate and search every truck while the storm is still raging",
        );
        assert!(!late.issues.iter().any(|i| i.starts_with("Start indicator")));
    }

    #[test]
    fn test_end_indicator_window() {
        let report = validator().validate_text(
            "After a long silence at the dinner table, Maria finally begins to speak",
        );
        assert!(report.issues.iter().any(|i| i.starts_with("End indicator")));
        assert_eq!(report.suggestions.adjust_end, 2.0);
        assert_eq!(report.confidence(), 7);
    }

    #[test]
    fn test_cutoff_suffixes() {
        for text in ["He says he never...", "She whispers \u{2026}  ", "Wait, I\u{2014}", "No -"] {
            let report = validator().validate_text(text);
            assert!(
                report.issues.iter().any(|i| i.contains("cut-off")),
                "{text:?} -> {:?}",
                report.issues
            );
            assert_eq!(report.suggestions.adjust_end, 2.0);
        }
    }

    #[test]
    fn test_confidence_can_go_negative() {
        let report = validator().validate_text(
            "Previously earlier before this prior to preceding had been later will next then following subsequently",
        );
        assert!(report.confidence() < 0);
        assert!(report.needs_adjustment);
    }

    #[test]
    fn test_custom_markers() {
        let markers = MarkerSet {
            leading_temporal: vec!["flashback".into()],
            trailing_temporal: Vec::new(),
            ..Default::default()
        };
        let validator = KeywordMarkerValidator::new(markers).unwrap();
        assert_eq!(validator.validate_text("A flashback to the war").confidence(), 8);
        assert_eq!(validator.validate_text("Previously on the show").confidence(), 10);
    }
}
