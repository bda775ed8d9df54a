//! Overlap detection between selected segments.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use reel_models::{OverlapReport, TimeSpan};

/// Which pairs are checked for overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapScan {
    /// Consecutive pairs in reel order
    #[default]
    Adjacent,
    /// Every pair, via a sweep over start times
    Sweep,
}

impl FromStr for OverlapScan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adjacent" => Ok(OverlapScan::Adjacent),
            "sweep" => Ok(OverlapScan::Sweep),
            other => Err(format!("unknown overlap scan: {other}")),
        }
    }
}

/// Overlap between two spans, if their half-open intervals intersect.
pub fn detect_overlap<A: TimeSpan, B: TimeSpan>(a: &A, b: &B) -> Option<OverlapReport> {
    if a.start() < b.end() && b.start() < a.end() {
        let overlap_start = a.start().max(b.start());
        let overlap_end = a.end().min(b.end());
        Some(OverlapReport {
            segments: [a.span_id().to_string(), b.span_id().to_string()],
            overlap_start,
            overlap_end,
            duration: overlap_end - overlap_start,
        })
    } else {
        None
    }
}

/// Check consecutive pairs only.
pub fn detect_adjacent_overlaps<T: TimeSpan>(spans: &[T]) -> Vec<OverlapReport> {
    spans
        .windows(2)
        .filter_map(|pair| detect_overlap(&pair[0], &pair[1]))
        .collect()
}

/// Check every pair. Spans are visited in start order while an active set
/// keeps those whose end has not been passed yet.
pub fn sweep_overlaps<T: TimeSpan>(spans: &[T]) -> Vec<OverlapReport> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| spans[a].start().total_cmp(&spans[b].start()).then(a.cmp(&b)));

    let mut active: Vec<usize> = Vec::new();
    let mut reports = Vec::new();

    for idx in order {
        let current = &spans[idx];
        active.retain(|&open| spans[open].end() > current.start());
        for &open in &active {
            // Report in reel order
            let (first, second) = if open < idx { (open, idx) } else { (idx, open) };
            if let Some(report) = detect_overlap(&spans[first], &spans[second]) {
                reports.push(report);
            }
        }
        active.push(idx);
    }

    reports
}

/// Run the configured scan.
pub fn scan_overlaps<T: TimeSpan>(spans: &[T], scan: OverlapScan) -> Vec<OverlapReport> {
    match scan {
        OverlapScan::Adjacent => detect_adjacent_overlaps(spans),
        OverlapScan::Sweep => sweep_overlaps(spans),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::Segment;

    #[test]
    fn test_partial_overlap() {
        let report = detect_overlap(&Segment::new("a", 0.0, 10.0), &Segment::new("b", 5.0, 15.0))
            .unwrap();
        assert_eq!(report.segments, ["a".to_string(), "b".to_string()]);
        assert_eq!(report.overlap_start, 5.0);
        assert_eq!(report.overlap_end, 10.0);
        assert_eq!(report.duration, 5.0);
    }

    #[test]
    fn test_touching_is_not_overlap() {
        assert!(detect_overlap(&Segment::new("a", 0.0, 10.0), &Segment::new("b", 10.0, 20.0)).is_none());
    }

    #[test]
    fn test_containment() {
        let report = detect_overlap(&Segment::new("a", 0.0, 30.0), &Segment::new("b", 10.0, 12.0))
            .unwrap();
        assert_eq!(report.duration, 2.0);
    }

    #[test]
    fn test_adjacent_misses_non_adjacent() {
        let spans = vec![
            Segment::new("a", 0.0, 10.0),
            Segment::new("b", 20.0, 30.0),
            Segment::new("c", 5.0, 8.0),
        ];
        assert!(detect_adjacent_overlaps(&spans).is_empty());

        let swept = sweep_overlaps(&spans);
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].segments, ["a".to_string(), "c".to_string()]);
        assert_eq!(swept[0].duration, 3.0);
    }

    #[test]
    fn test_sweep_finds_every_pair() {
        let spans = vec![
            Segment::new("a", 0.0, 10.0),
            Segment::new("b", 2.0, 12.0),
            Segment::new("c", 4.0, 6.0),
            Segment::new("d", 20.0, 25.0),
        ];
        let swept = sweep_overlaps(&spans);
        assert_eq!(swept.len(), 3);
        assert!(swept.iter().all(|r| r.duration > 0.0));
    }

    #[test]
    fn test_scan_parse() {
        assert_eq!("Sweep".parse::<OverlapScan>().unwrap(), OverlapScan::Sweep);
        assert!("all".parse::<OverlapScan>().is_err());
    }
}
