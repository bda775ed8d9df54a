//! Boundary smoothing between consecutive segments.

use reel_models::TimeSpan;

/// Default largest gap (seconds) that gets closed.
pub const DEFAULT_MAX_GAP_SECS: f64 = 2.0;

/// Close small gaps by moving both sides of each gap to its midpoint.
///
/// A pair is touched only when `0 < next.start - prev.end <= max_gap`;
/// overlaps and wide gaps are left alone. The input is not mutated. Each
/// pair sees the already-smoothed previous segment, in one forward pass.
pub fn smooth_boundaries<T: TimeSpan + Clone>(spans: &[T], max_gap: f64) -> Vec<T> {
    let mut smoothed: Vec<T> = Vec::with_capacity(spans.len());

    for span in spans {
        let mut current = span.clone();
        if let Some(prev) = smoothed.last_mut() {
            let gap = current.start() - prev.end();
            if gap > 0.0 && gap <= max_gap {
                let midpoint = prev.end() + gap / 2.0;
                prev.set_end(midpoint);
                current.set_start(midpoint);
            }
        }
        smoothed.push(current);
    }

    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::Segment;

    fn bounds(spans: &[Segment]) -> Vec<(f64, f64)> {
        spans.iter().map(|s| (s.start_timestamp, s.end_timestamp)).collect()
    }

    #[test]
    fn test_small_gap_closed_at_midpoint() {
        let spans = vec![Segment::new("a", 0.0, 10.0), Segment::new("b", 11.0, 20.0)];
        let smoothed = smooth_boundaries(&spans, DEFAULT_MAX_GAP_SECS);
        assert_eq!(bounds(&smoothed), vec![(0.0, 10.5), (10.5, 20.0)]);
        // input untouched
        assert_eq!(bounds(&spans), vec![(0.0, 10.0), (11.0, 20.0)]);
    }

    #[test]
    fn test_wide_gap_and_overlap_untouched() {
        let wide = vec![Segment::new("a", 0.0, 10.0), Segment::new("b", 13.0, 20.0)];
        assert_eq!(bounds(&smooth_boundaries(&wide, 2.0)), bounds(&wide));

        let overlapping = vec![Segment::new("a", 0.0, 10.0), Segment::new("b", 9.0, 20.0)];
        assert_eq!(bounds(&smooth_boundaries(&overlapping, 2.0)), bounds(&overlapping));

        let touching = vec![Segment::new("a", 0.0, 10.0), Segment::new("b", 10.0, 20.0)];
        assert_eq!(bounds(&smooth_boundaries(&touching, 2.0)), bounds(&touching));
    }

    #[test]
    fn test_gap_equal_to_max_is_closed() {
        let spans = vec![Segment::new("a", 0.0, 10.0), Segment::new("b", 12.0, 20.0)];
        assert_eq!(
            bounds(&smooth_boundaries(&spans, 2.0)),
            vec![(0.0, 11.0), (11.0, 20.0)]
        );
    }

    #[test]
    fn test_chain_of_gaps() {
        let spans = vec![
            Segment::new("a", 0.0, 10.0),
            Segment::new("b", 11.0, 20.0),
            Segment::new("c", 21.0, 30.0),
        ];
        assert_eq!(
            bounds(&smooth_boundaries(&spans, 2.0)),
            vec![(0.0, 10.5), (10.5, 20.5), (20.5, 30.0)]
        );
    }

    #[test]
    fn test_trivial_inputs() {
        let empty: Vec<Segment> = Vec::new();
        assert!(smooth_boundaries(&empty, 2.0).is_empty());
        let single = vec![Segment::new("a", 1.0, 2.0)];
        assert_eq!(bounds(&smooth_boundaries(&single, 2.0)), vec![(1.0, 2.0)]);
    }
}
