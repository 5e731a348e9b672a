//! Shared media helpers: file-type classification, vision-model detection,
//! image encoding and video frame extraction.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use base64::Engine;
use regex::Regex;
use tokio::process::Command;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".heic", ".heif", ".tiff", ".bmp",
];
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi", ".mkv", ".webm", ".m4v"];

/// Frame extraction keeps frames at most this wide/tall.
const VIDEO_FRAME_MAX_DIM: u32 = 768;

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(30);

/// Model-name fragments that imply image input support.
const VISION_HINTS: &[&str] = &[
    "vision",
    "llava",
    "moondream",
    "bakllava",
    "internvl",
    "minicpm-v",
    "phi-3-vision",
    "phi-3.5-vision",
    "phi-4-vision",
    "pixtral",
    "paligemma",
    "idefics",
    "qwen-vl",
    "qwen2-vl",
    "qwen3-vl",
];

fn vision_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(^|[^a-z0-9])vl([^a-z0-9]|$)").expect("valid regex"))
}

pub fn is_image_file(extension: &str) -> bool {
    let ext = extension.to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

pub fn is_video_file(extension: &str) -> bool {
    let ext = extension.to_lowercase();
    VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// Infers vision capability from a model identifier.
///
/// Checks provider-specific known models first (matched against the name
/// before any `:tag` suffix), then the shared hint list, then the `vl`
/// vision-language token.
pub fn model_supports_vision(model_name: &str, provider_models: &[&str]) -> bool {
    let model = model_name.to_lowercase();
    let model_base = model.split(':').next().unwrap_or(&model);

    if provider_models.iter().any(|v| model_base.contains(v)) {
        return true;
    }
    if VISION_HINTS.iter().any(|hint| model.contains(hint)) {
        return true;
    }
    vision_token().is_match(&model)
}

/// MIME type guessed from the file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".heic" | ".heif" => "image/heic",
        ".tiff" => "image/tiff",
        ".bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Reads and base64-encodes an image file.
///
/// Returns the encoded payload and its MIME type.
pub async fn encode_image(file_path: &Path) -> Result<(String, &'static str), std::io::Error> {
    let extension = file_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let bytes = tokio::fs::read(file_path).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok((encoded, mime_for_extension(&extension)))
}

/// Extracts up to `frame_count` video frames as base64-encoded JPEGs.
///
/// Frames are sampled at balanced timestamps via `ffmpeg`; a missing tool
/// or per-frame failure degrades to fewer (possibly zero) frames.
pub async fn extract_video_frames(
    file_path: &Path,
    frame_count: u32,
    duration_seconds: Option<f64>,
) -> Vec<String> {
    if frame_count == 0 {
        return Vec::new();
    }

    let tmpdir = match tempdir_for_frames() {
        Ok(dir) => dir,
        Err(err) => {
            log::warn!("Cannot create frame scratch directory: {err}");
            return Vec::new();
        }
    };

    let mut frames = Vec::new();
    for (index, timestamp) in sample_video_timestamps(duration_seconds, frame_count)
        .into_iter()
        .enumerate()
    {
        let output_path = tmpdir.path().join(format!("frame_{:02}.jpg", index + 1));
        if let Some(bytes) = extract_single_frame(file_path, timestamp, &output_path).await {
            frames.push(base64::engine::general_purpose::STANDARD.encode(bytes));
        }
    }

    log::debug!(
        "Extracted {} of {frame_count} frames from {}",
        frames.len(),
        file_path.display()
    );
    frames
}

fn tempdir_for_frames() -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix("namewise_frames_").tempdir()
}

async fn extract_single_frame(
    file_path: &Path,
    timestamp: f64,
    output_path: &PathBuf,
) -> Option<Vec<u8>> {
    // Scale the long edge down while keeping even dimensions for JPEG.
    let scale = format!(
        "scale='if(gt(iw,ih),min({max},iw),-2)':'if(gt(iw,ih),-2,min({max},ih))'",
        max = VIDEO_FRAME_MAX_DIM
    );
    let mut command = Command::new("ffmpeg");
    command
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-ss", &format!("{timestamp:.2}")])
        .arg("-i")
        .arg(file_path)
        .args(["-frames:v", "1", "-vf", &scale])
        .arg(output_path);

    match tokio::time::timeout(FFMPEG_TIMEOUT, command.output()).await {
        Ok(Ok(_)) => tokio::fs::read(output_path).await.ok(),
        Ok(Err(err)) => {
            log::warn!("ffmpeg unavailable: {err}");
            None
        }
        Err(_) => {
            log::warn!("ffmpeg timed out extracting frame at {timestamp:.2}s");
            None
        }
    }
}

/// Computes balanced frame timestamps, with margins that skip intro and
/// outro content when the duration is known.
pub fn sample_video_timestamps(duration_seconds: Option<f64>, frame_count: u32) -> Vec<f64> {
    if frame_count == 0 {
        return Vec::new();
    }
    let Some(duration) = duration_seconds.filter(|d| *d > 0.0) else {
        return (1..=frame_count).map(|i| i as f64).collect();
    };

    let margin = (duration * 0.08).max(0.2);
    let start = margin.min((duration - 0.2).max(0.2));
    let end = (duration - margin).max(start);

    match frame_count {
        1 => vec![(duration / 2.0).max(0.1)],
        2 => vec![start.max(0.1), end.max(0.1)],
        n => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| (start + step * i as f64).max(0.1)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions() {
        assert!(is_image_file(".JPG"));
        assert!(is_image_file(".png"));
        assert!(!is_image_file(".txt"));
        assert!(is_video_file(".mp4"));
        assert!(!is_video_file(".jpg"));
    }

    #[test]
    fn detects_vision_models() {
        assert!(model_supports_vision("llava:latest", &[]));
        assert!(model_supports_vision("qwen2-vl-7b", &[]));
        assert!(model_supports_vision("pixtral-12b", &[]));
        assert!(model_supports_vision("claude-sonnet-4", &["claude-sonnet"]));
        assert!(!model_supports_vision("deepseek-chat", &[]));
    }

    #[test]
    fn vl_token_requires_word_boundary() {
        assert!(model_supports_vision("my-vl-model", &[]));
        assert!(!model_supports_vision("overlord", &[]));
    }

    #[test]
    fn timestamps_without_duration_are_sequential() {
        assert_eq!(sample_video_timestamps(None, 3), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn timestamps_with_duration_stay_inside_margins() {
        let ts = sample_video_timestamps(Some(100.0), 4);
        assert_eq!(ts.len(), 4);
        assert!(ts[0] >= 0.1);
        assert!(ts[3] <= 92.1);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_frames_is_empty() {
        assert!(sample_video_timestamps(Some(10.0), 0).is_empty());
    }
}
