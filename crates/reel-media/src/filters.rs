//! FFmpeg filter graph builders for reel pieces.

use std::path::Path;

/// Sample rate every audio track of a reel is normalized to.
pub const REEL_SAMPLE_RATE: u32 = 48_000;

/// Round a dimension down to an even value (yuv420p needs even sizes).
pub fn even(n: u32) -> u32 {
    (n - n % 2).max(2)
}

/// Scale into a `width`x`height` frame preserving aspect, letterbox the rest,
/// and resample to `fps`.
pub fn fit_frame_filter(width: u32, height: u32, fps: f64) -> String {
    let (w, h) = (even(width), even(height));
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps:.3}"
    )
}

/// Audio normalization applied to every piece so concatenation never has to
/// resample mid-stream.
pub fn audio_normalize_filter() -> String {
    format!("aformat=sample_rates={REEL_SAMPLE_RATE}:channel_layouts=stereo")
}

/// Filter complex concatenating `inputs` pieces with the concat filter.
///
/// Every video input is refit to the reel frame first. Output labels are
/// `[v]` and, when `with_audio`, `[a]`.
pub fn compose_concat_filter(
    inputs: usize,
    width: u32,
    height: u32,
    fps: f64,
    with_audio: bool,
) -> String {
    let fit = fit_frame_filter(width, height, fps);
    let mut chains = Vec::with_capacity(inputs * 2 + 1);
    let mut pads = String::new();

    for i in 0..inputs {
        chains.push(format!("[{i}:v]{fit},format=yuv420p[v{i}]"));
        pads.push_str(&format!("[v{i}]"));
        if with_audio {
            chains.push(format!("[{i}:a]{}[a{i}]", audio_normalize_filter()));
            pads.push_str(&format!("[a{i}]"));
        }
    }

    let audio_streams = usize::from(with_audio);
    let outputs = if with_audio { "[v][a]" } else { "[v]" };
    chains.push(format!("{pads}concat=n={inputs}:v=1:a={audio_streams}{outputs}"));
    chains.join(";")
}

/// Body of a concat demuxer list file.
pub fn concat_list<P: AsRef<Path>>(pieces: &[P]) -> String {
    pieces
        .iter()
        .map(|p| {
            let path = p.as_ref().to_string_lossy().replace('\'', "'\\''");
            format!("file '{path}'\n")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_dimensions() {
        assert_eq!(even(1080), 1080);
        assert_eq!(even(721), 720);
        assert_eq!(even(1), 2);
    }

    #[test]
    fn test_fit_frame_filter() {
        let filter = fit_frame_filter(1920, 1080, 30.0);
        assert!(filter.starts_with("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1920:1080:(ow-iw)/2:(oh-ih)/2"));
        assert!(filter.ends_with("fps=30.000"));
    }

    #[test]
    fn test_compose_concat_with_audio() {
        let filter = compose_concat_filter(3, 1280, 720, 25.0, true);
        assert!(filter.contains("[2:a]aformat=sample_rates=48000"));
        assert!(filter.ends_with("[v0][a0][v1][a1][v2][a2]concat=n=3:v=1:a=1[v][a]"));
    }

    #[test]
    fn test_compose_concat_silent() {
        let filter = compose_concat_filter(2, 1280, 720, 25.0, false);
        assert!(!filter.contains(":a]"));
        assert!(filter.ends_with("[v0][v1]concat=n=2:v=1:a=0[v]"));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&["/tmp/a.mp4", "/tmp/it's.mp4"]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }
}
