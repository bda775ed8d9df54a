//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;

use reel_media::{AssemblyConfig, BumperConfig, ConcatMethod};
use tracing::warn;

use crate::overlap::OverlapScan;
use crate::pipeline::SelectionConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory for per-run workspaces
    pub work_dir: PathBuf,
    /// Selection pipeline settings
    pub selection: SelectionConfig,
    /// Bumper length in seconds
    pub bumper_duration_secs: f64,
    /// How reel pieces are joined
    pub concat: ConcatMethod,
    /// Per-FFmpeg-process timeout
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("reel"),
            selection: SelectionConfig::default(),
            bumper_duration_secs: reel_media::bumper::DEFAULT_BUMPER_DURATION_SECS,
            concat: ConcatMethod::default(),
            ffmpeg_timeout_secs: None,
            metrics_port: None,
        }
    }
}

/// Parse `name` from the environment, falling back to `default` when unset
/// or unparsable (the latter with a warning).
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = name, value = %raw, "Ignoring unparsable environment value");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_opt<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let selection = SelectionConfig::default();

        Self {
            work_dir: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            selection: SelectionConfig {
                min_confidence: env_or("REEL_MIN_CONFIDENCE", selection.min_confidence),
                ranking_confidence_floor: env_or(
                    "REEL_RANKING_CONFIDENCE_FLOOR",
                    selection.ranking_confidence_floor,
                ),
                apply_adjustments: env_or("REEL_APPLY_ADJUSTMENTS", selection.apply_adjustments),
                max_gap: env_or("REEL_MAX_GAP_SECS", selection.max_gap),
                smooth_all_if_any_validated: env_or(
                    "REEL_SMOOTH_IF_ANY_VALIDATED",
                    selection.smooth_all_if_any_validated,
                ),
                always_smooth: env_or("REEL_ALWAYS_SMOOTH", selection.always_smooth),
                overlap_scan: env_or::<OverlapScan>("REEL_OVERLAP_SCAN", selection.overlap_scan),
                drop_empty_plots: env_or("REEL_DROP_EMPTY_PLOTS", selection.drop_empty_plots),
            },
            bumper_duration_secs: env_or("REEL_BUMPER_DURATION_SECS", defaults.bumper_duration_secs),
            concat: env_or("REEL_CONCAT_METHOD", defaults.concat),
            ffmpeg_timeout_secs: env_opt("REEL_FFMPEG_TIMEOUT_SECS"),
            metrics_port: env_opt("METRICS_PORT"),
        }
    }

    /// Assembler settings derived from this config.
    pub fn assembly(&self) -> AssemblyConfig {
        AssemblyConfig {
            bumper: BumperConfig::default().with_duration(self.bumper_duration_secs),
            concat: self.concat,
            timeout_secs: self.ffmpeg_timeout_secs,
            work_dir: Some(self.work_dir.clone()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.selection.min_confidence, 5);
        assert_eq!(config.selection.ranking_confidence_floor, 7);
        assert_eq!(config.bumper_duration_secs, 3.0);
        assert_eq!(config.concat, ConcatMethod::Compose);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn test_env_or_falls_back() {
        std::env::set_var("REEL_TEST_BAD_NUMBER", "seven");
        std::env::set_var("REEL_TEST_GOOD_NUMBER", " 9 ");
        assert_eq!(env_or("REEL_TEST_BAD_NUMBER", 5i32), 5);
        assert_eq!(env_or("REEL_TEST_GOOD_NUMBER", 5i32), 9);
        assert_eq!(env_or("REEL_TEST_UNSET_NUMBER", 5i32), 5);
        assert_eq!(env_opt::<u64>("REEL_TEST_UNSET_NUMBER"), None);
    }

    #[test]
    fn test_assembly_config() {
        let config = WorkerConfig {
            bumper_duration_secs: 2.0,
            concat: ConcatMethod::Chain,
            ffmpeg_timeout_secs: Some(60),
            ..Default::default()
        };
        let assembly = config.assembly();
        assert_eq!(assembly.bumper.duration_secs, 2.0);
        assert_eq!(assembly.concat, ConcatMethod::Chain);
        assert_eq!(assembly.timeout_secs, Some(60));
        assert_eq!(assembly.work_dir, Some(config.work_dir));
    }
}
