//! Logo bumper clips appended after each cut segment.
//!
//! A bumper is a short clip with the logo centered over a solid background.
//! The logo image is decoded once, normalized to RGBA and written out as two
//! planes (color and alpha); FFmpeg merges them back with `alphamerge`, so
//! logos in any format the `image` crate reads keep their transparency.

use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use reel_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_normalize_filter, even, REEL_SAMPLE_RATE};
use crate::probe::VideoInfo;

pub const DEFAULT_BUMPER_DURATION_SECS: f64 = 3.0;
pub const DEFAULT_LOGO_HEIGHT_RATIO: f64 = 0.15;
pub const DEFAULT_BACKGROUND: &str = "white";

/// How bumpers look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumperConfig {
    /// Bumper length in seconds
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Logo height as a fraction of the frame height
    #[serde(default = "default_height_ratio")]
    pub height_ratio: f64,
    /// Background color, any FFmpeg color name or `0xRRGGBB`
    #[serde(default = "default_background")]
    pub background: String,
}

fn default_duration() -> f64 {
    DEFAULT_BUMPER_DURATION_SECS
}
fn default_height_ratio() -> f64 {
    DEFAULT_LOGO_HEIGHT_RATIO
}
fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

impl Default for BumperConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_BUMPER_DURATION_SECS,
            height_ratio: DEFAULT_LOGO_HEIGHT_RATIO,
            background: default_background(),
        }
    }
}

impl BumperConfig {
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_height_ratio(mut self, ratio: f64) -> Self {
        self.height_ratio = ratio;
        self
    }

    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background = color.into();
        self
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(self.duration_secs.is_finite() && self.duration_secs > 0.0) {
            return Err(MediaError::invalid_bumper(format!(
                "duration must be positive, got {}",
                self.duration_secs
            )));
        }
        if !(self.height_ratio > 0.0 && self.height_ratio <= 1.0) {
            return Err(MediaError::invalid_bumper(format!(
                "logo height ratio must be in (0, 1], got {}",
                self.height_ratio
            )));
        }
        if self.background.trim().is_empty() {
            return Err(MediaError::invalid_bumper("background color is empty"));
        }
        Ok(())
    }

    /// Logo height in pixels for a frame of `frame_height`.
    pub fn logo_height(&self, frame_height: u32) -> u32 {
        even((frame_height as f64 * self.height_ratio).round() as u32)
    }
}

/// The logo split into color and alpha planes on disk.
#[derive(Debug, Clone)]
pub struct BumperPlanes {
    pub color: PathBuf,
    pub alpha: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// A rendered bumper clip ready to be concatenated.
#[derive(Debug, Clone)]
pub struct PreparedBumper {
    pub path: PathBuf,
    pub duration: f64,
}

/// Decode `image_path` and write its color and alpha planes into `dest_dir`.
///
/// Any decode failure is an `InvalidBumper` error.
pub fn split_planes(image_path: &Path, dest_dir: &Path) -> MediaResult<BumperPlanes> {
    let decoded = image::open(image_path).map_err(|e| {
        MediaError::invalid_bumper(format!("{}: {}", image_path.display(), e))
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(MediaError::invalid_bumper(format!(
            "{} has no pixels",
            image_path.display()
        )));
    }

    let mut color = RgbImage::new(width, height);
    let mut alpha = GrayImage::new(width, height);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        color.put_pixel(x, y, Rgb([r, g, b]));
        alpha.put_pixel(x, y, Luma([a]));
    }

    let planes = BumperPlanes {
        color: dest_dir.join("bumper_color.png"),
        alpha: dest_dir.join("bumper_alpha.png"),
        width,
        height,
    };
    color.save(&planes.color)?;
    alpha.save(&planes.alpha)?;

    debug!(width, height, image = %image_path.display(), "bumper planes written");
    Ok(planes)
}

/// Solid background source for a bumper matching `frame`.
pub fn background_source(config: &BumperConfig, frame: &VideoInfo) -> String {
    format!(
        "color=c={}:s={}x{}:r={:.3}:d={:.3}",
        config.background,
        even(frame.width),
        even(frame.height),
        frame.fps,
        config.duration_secs
    )
}

/// Filter complex for inputs `0` background, `1` color plane, `2` alpha plane
/// (and `3` silence when `with_audio`). Outputs `[v]` and optionally `[a]`.
pub fn bumper_filter(config: &BumperConfig, frame: &VideoInfo, with_audio: bool) -> String {
    let logo_height = config.logo_height(frame.height);
    let mut graph = format!(
        "[1:v]format=rgb24[rgb];[2:v]format=gray[mask];\
         [rgb][mask]alphamerge,scale=-2:{logo_height}[logo];\
         [0:v][logo]overlay=(W-w)/2:(H-h)/2:shortest=1:format=auto,setsar=1,format=yuv420p[v]"
    );
    if with_audio {
        graph.push_str(&format!(";[3:a]{}[a]", audio_normalize_filter()));
    }
    graph
}

/// Render the bumper clip once for a reel whose frames look like `frame`.
pub async fn render_bumper(
    planes: &BumperPlanes,
    config: &BumperConfig,
    frame: &VideoInfo,
    encoding: &EncodingConfig,
    output: &Path,
    runner: &FfmpegRunner,
) -> MediaResult<PreparedBumper> {
    let with_audio = frame.has_audio;

    let mut cmd = FfmpegCommand::from_lavfi(background_source(config, frame), output)
        .add_input_with_args(["-loop", "1"], planes.color.to_string_lossy())
        .add_input_with_args(["-loop", "1"], planes.alpha.to_string_lossy());
    if with_audio {
        cmd = cmd.add_lavfi_input(format!("anullsrc=r={REEL_SAMPLE_RATE}:cl=stereo"));
    }

    cmd = cmd
        .filter_complex(bumper_filter(config, frame, with_audio))
        .map("[v]")
        .video_codec(&encoding.codec)
        .preset(&encoding.preset)
        .crf(encoding.crf)
        .pixel_format(&encoding.pixel_format);
    cmd = if with_audio {
        cmd.map("[a]")
            .audio_codec(&encoding.audio_codec)
            .audio_bitrate(&encoding.audio_bitrate)
    } else {
        cmd.no_audio()
    };
    let cmd = cmd.output_duration(config.duration_secs);

    info!(
        output = %output.display(),
        duration = config.duration_secs,
        logo_height = config.logo_height(frame.height),
        "Rendering bumper"
    );
    runner.run(&cmd).await?;

    if !output.exists() {
        return Err(MediaError::invalid_bumper("bumper render produced no file"));
    }

    Ok(PreparedBumper {
        path: output.to_path_buf(),
        duration: config.duration_secs,
    })
}
