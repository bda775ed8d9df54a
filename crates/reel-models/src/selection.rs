//! Ranked selections and the reports produced while finalizing them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::segment::{Segment, TimeSpan};

/// A segment chosen for the reel, as returned by the ranking service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectedSegment {
    /// Position in the reel (1-based)
    pub order: u32,

    /// Editorial note on how this segment leads into the next
    #[serde(default)]
    pub transition_note: String,

    #[serde(flatten)]
    pub segment: Segment,
}

impl SelectedSegment {
    pub fn new(order: u32, segment: Segment) -> Self {
        Self {
            order,
            transition_note: String::new(),
            segment,
        }
    }

    pub fn with_transition_note(mut self, note: impl Into<String>) -> Self {
        self.transition_note = note.into();
        self
    }

    pub fn segment_id(&self) -> &str {
        &self.segment.segment_id
    }
}

impl TimeSpan for SelectedSegment {
    fn span_id(&self) -> &str {
        &self.segment.segment_id
    }

    fn start(&self) -> f64 {
        self.segment.start_timestamp
    }

    fn end(&self) -> f64 {
        self.segment.end_timestamp
    }

    fn set_start(&mut self, start: f64) {
        self.segment.start_timestamp = start;
    }

    fn set_end(&mut self, end: f64) {
        self.segment.end_timestamp = end;
    }
}

/// Overlap between two segments; `duration > 0` by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlapReport {
    /// The pair, in the order they were compared
    pub segments: [String; 2],
    pub overlap_start: f64,
    pub overlap_end: f64,
    pub duration: f64,
}

/// Why a candidate never reached the ranking stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// A timestamp could not be parsed or the window is empty
    InvalidTimecode { message: String },
    /// No description to validate
    EmptyPlot,
    /// Validator confidence under the run's threshold
    ValidationRejected { confidence: i32, threshold: i32 },
}

/// A dropped candidate and the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RejectedSegment {
    pub segment_id: String,
    pub reason: RejectionReason,
}

/// Output of the selection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FinalSelection {
    /// Selected segments sorted by `order`
    pub segments: Vec<SelectedSegment>,

    /// Overlaps found after ranking (informational)
    pub overlaps: Vec<OverlapReport>,

    /// Sum of final segment durations; authoritative
    pub actual_total_duration: f64,

    /// Duration requested from the ranker (advisory)
    pub target_duration: f64,

    pub smoothing_applied: bool,

    /// Candidates dropped before ranking
    #[serde(default)]
    pub rejected: Vec<RejectedSegment>,
}

impl FinalSelection {
    /// Sum of `end - start` over a list of spans.
    pub fn total_duration<T: TimeSpan>(spans: &[T]) -> f64 {
        spans.iter().map(|s| s.end() - s.start()).sum()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_segment_flattens_fields() {
        let json = r#"{
            "order": 2,
            "transition_note": "cut on the door slam",
            "segment_id": "seg_4",
            "start_timestamp": 12.0,
            "end_timestamp": 20.0,
            "main_plot": "The door slams",
            "alignment_validated": true
        }"#;
        let selected: SelectedSegment = serde_json::from_str(json).unwrap();
        assert_eq!(selected.order, 2);
        assert_eq!(selected.segment_id(), "seg_4");
        assert!(selected.segment.alignment_validated);

        let value = serde_json::to_value(&selected).unwrap();
        assert_eq!(value["segment_id"], "seg_4");
        assert_eq!(value["order"], 2);
    }

    #[test]
    fn test_total_duration() {
        let spans = vec![Segment::new("a", 0.0, 10.5), Segment::new("b", 10.5, 20.0)];
        assert!((FinalSelection::total_duration(&spans) - 20.0).abs() < 1e-9);
    }
}
