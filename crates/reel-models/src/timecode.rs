//! Timecode parsing and formatting.
//!
//! Annotators emit timestamps as `MM:SS` or `HH:MM:SS`, optionally with a
//! fractional part (`MM:SS.mmm`). Everything downstream works in seconds.
//!
//! `to_timecode` truncates to whole seconds, so a round trip through
//! `to_timecode` and `to_seconds` is lossy by up to 0.999s.

use thiserror::Error;

/// Seconds per hour/minute, as floats for timestamp math.
const SECS_PER_HOUR: f64 = 3600.0;
const SECS_PER_MINUTE: f64 = 60.0;

/// Timecode parsing error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimecodeError {
    /// Not `MM:SS` or `HH:MM:SS`
    #[error("Invalid timecode '{0}': expected MM:SS or HH:MM:SS with optional .mmm")]
    InvalidTimecode(String),
}

impl TimecodeError {
    fn invalid(text: &str) -> Self {
        Self::InvalidTimecode(text.to_string())
    }
}

/// Parse `HH:MM:SS[.mmm]` or `MM:SS[.mmm]` into seconds.
///
/// When the last whole-number component is above 99, its trailing three
/// digits are taken as milliseconds (`00:1530` is 1.530s). Some annotators run
/// seconds and milliseconds together like that. Zero-padded seconds such as
/// `00:007` stay 7s.
///
/// A `.` suffix is read as a decimal fraction of a second: `00:30.5` is 30.5s,
/// not 30.005s. Annotators that emit integer milliseconds after the dot should
/// pad them to three digits (`00:30.005`).
///
/// # Examples
/// ```
/// use reel_models::timecode::to_seconds;
/// assert_eq!(to_seconds("01:30").unwrap(), 90.0);
/// assert_eq!(to_seconds("01:00:00").unwrap(), 3600.0);
/// assert!(to_seconds("bad").is_err());
/// ```
pub fn to_seconds(text: &str) -> Result<f64, TimecodeError> {
    let trimmed = text.trim();

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (trimmed, None),
    };

    let mut millis = match fraction {
        Some(f) => parse_fraction(f).ok_or_else(|| TimecodeError::invalid(text))?,
        None => 0.0,
    };

    let raw: Vec<&str> = whole.split(':').collect();
    if raw.len() != 2 && raw.len() != 3 {
        return Err(TimecodeError::invalid(text));
    }

    let mut parts = Vec::with_capacity(raw.len());
    for component in &raw {
        parts.push(parse_component(component).ok_or_else(|| TimecodeError::invalid(text))?);
    }

    // Run-together seconds+millis, e.g. "1530" -> 1s + 530ms
    let idx = parts.len() - 1;
    if parts[idx] > 99 {
        let run_together = parts[idx];
        parts[idx] = run_together / 1000;
        millis += (run_together % 1000) as f64 / 1000.0;
    }

    let seconds = match parts.as_slice() {
        [h, m, s] => *h as f64 * SECS_PER_HOUR + *m as f64 * SECS_PER_MINUTE + *s as f64,
        [m, s] => *m as f64 * SECS_PER_MINUTE + *s as f64,
        _ => return Err(TimecodeError::invalid(text)),
    };

    Ok(seconds + millis)
}

/// Format seconds as zero-padded `MM:SS`.
///
/// Minutes are never rolled into hours: 3725s formats as `62:05`. Fractional
/// seconds are truncated and negative values format as `00:00`.
pub fn to_timecode(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Format seconds as `HH:MM:SS` with hour rollover.
///
/// Use this for long-form sources; `to_timecode` stays in minutes for
/// compatibility with annotator output.
pub fn to_timecode_hms(seconds: f64) -> String {
    let total = whole_seconds(seconds);
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    }
}

/// Digits only: rejects signs, blanks and embedded whitespace.
fn parse_component(component: &str) -> Option<u64> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    component.parse().ok()
}

/// Fractional part as a decimal fraction of a second (`5` -> 0.5, `250` -> 0.25).
fn parse_fraction(fraction: &str) -> Option<f64> {
    parse_component(fraction)?;
    format!("0.{}", fraction).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_seconds_mm_ss() {
        assert_eq!(to_seconds("01:30").unwrap(), 90.0);
        assert_eq!(to_seconds("00:00").unwrap(), 0.0);
        assert_eq!(to_seconds("53:53").unwrap(), 3233.0);
    }

    #[test]
    fn test_to_seconds_hh_mm_ss() {
        assert_eq!(to_seconds("01:00:00").unwrap(), 3600.0);
        assert_eq!(to_seconds("01:30:45").unwrap(), 5445.0);
    }

    #[test]
    fn test_to_seconds_with_milliseconds() {
        assert!((to_seconds("00:30.500").unwrap() - 30.5).abs() < 0.001);
        assert!((to_seconds("00:00:30.250").unwrap() - 30.25).abs() < 0.001);
        assert!((to_seconds("00:30.5").unwrap() - 30.5).abs() < 0.001);
    }

    #[test]
    fn test_to_seconds_run_together_millis() {
        assert!((to_seconds("00:1530").unwrap() - 1.53).abs() < 0.001);
        assert!((to_seconds("02:15300").unwrap() - 135.3).abs() < 0.001);
        assert!((to_seconds("00:250").unwrap() - 0.25).abs() < 0.001);
        assert_eq!(to_seconds("00:007").unwrap(), 7.0);
        assert_eq!(to_seconds("01:099").unwrap(), 159.0);
    }

    #[test]
    fn test_to_seconds_errors() {
        assert!(matches!(to_seconds("bad"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds("90"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds("1:2:3:4"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds("aa:10"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds("-1:10"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds("01:"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds("01:10.x"), Err(TimecodeError::InvalidTimecode(_))));
        assert!(matches!(to_seconds(""), Err(TimecodeError::InvalidTimecode(_))));
    }

    #[test]
    fn test_to_timecode() {
        assert_eq!(to_timecode(0.0), "00:00");
        assert_eq!(to_timecode(90.0), "01:30");
        assert_eq!(to_timecode(90.9), "01:30");
        assert_eq!(to_timecode(3725.0), "62:05");
        assert_eq!(to_timecode(-4.0), "00:00");
    }

    #[test]
    fn test_to_timecode_hms() {
        assert_eq!(to_timecode_hms(3725.0), "01:02:05");
        assert_eq!(to_timecode_hms(59.99), "00:00:59");
    }

    #[test]
    fn test_round_trip_within_one_second() {
        let mut s = 0.0;
        while s < 7200.0 {
            let back = to_seconds(&to_timecode(s)).unwrap();
            assert!((back - s).abs() < 1.0, "round trip of {} gave {}", s, back);
            assert!(back <= s);
            s += 0.37;
        }
    }
}
