//! Per-file metadata: the snapshot consumed by prompt building and LLM
//! invocation, and the extractor that gathers it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::RenameError;
use crate::media::{is_image_file, is_video_file};

/// Files never offered as neighbor context.
const IGNORE_FILES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    ".gitignore",
    ".localized",
    ".Spotlight-V100",
    ".Trashes",
];
const IGNORE_PREFIXES: &[&str] = &[".", "_", "~"];
const IGNORE_SUFFIXES: &[&str] = &[".tmp", ".bak", ".swp", ".part", ".crdownload"];

/// Extensions read directly as text for content excerpts.
const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".csv", ".json", ".yaml", ".yml", ".log", ".ini", ".cfg", ".toml",
];

const FFPROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Extracted image attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub date_taken: Option<DateTime<Local>>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

/// Extracted video attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    pub bitrate: Option<u64>,
    pub fps: Option<f64>,
    pub creation_time: Option<DateTime<Local>>,
}

/// Snapshot of one file's context at processing time.
///
/// Immutable once built; consumed by prompt building and LLM invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_path: PathBuf,
    pub file_name: String,
    pub extension: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Local>,
    pub modified_at: DateTime<Local>,
    pub image: Option<ImageMetadata>,
    pub video: Option<VideoMetadata>,
    pub video_extract_count: u32,
    pub parent_folder_name: Option<String>,
    pub folder_context: Option<String>,
    pub include_current_filename: bool,
    pub content_excerpt: Option<String>,
    pub content_truncated: bool,
    pub content_source: Option<String>,
    pub tag_count: Option<u32>,
    pub tag_prompt: Option<String>,
    pub neighbor_names: Vec<String>,
}

impl FileMetadata {
    /// Human-readable file size used by the prompt templates.
    pub fn size_human(&self) -> String {
        let mut size = self.size_bytes as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{size:.1} {unit}");
            }
            size /= 1024.0;
        }
        format!("{size:.1} TB")
    }
}

/// Limits and exclusions applied while extracting metadata.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub neighbor_count: usize,
    pub exclude_paths: HashSet<PathBuf>,
    pub include_content: bool,
    pub content_max_chars: usize,
}

/// Gathers per-file metadata from the local filesystem and media probes.
#[derive(Debug, Default, Clone)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts all available metadata for `file_path`.
    ///
    /// Media probe and content-excerpt failures degrade to partial
    /// metadata; only a failed stat of the file itself errors.
    pub async fn extract(
        &self,
        file_path: &Path,
        options: &ExtractOptions,
    ) -> Result<FileMetadata, RenameError> {
        let stat = tokio::fs::metadata(file_path).await?;
        let extension = file_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let modified_at: DateTime<Local> = stat.modified().map(Into::into).unwrap_or_else(|_| Local::now());
        let created_at: DateTime<Local> = stat.created().map(Into::into).unwrap_or(modified_at);

        let mut metadata = FileMetadata {
            file_path: file_path.to_path_buf(),
            file_name: file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: extension.clone(),
            size_bytes: stat.len(),
            created_at,
            modified_at,
            image: None,
            video: None,
            video_extract_count: 0,
            parent_folder_name: None,
            folder_context: None,
            include_current_filename: true,
            content_excerpt: None,
            content_truncated: false,
            content_source: None,
            tag_count: None,
            tag_prompt: None,
            neighbor_names: Vec::new(),
        };

        if is_image_file(&extension) {
            metadata.image = Some(self.probe_image(file_path).await);
        } else if is_video_file(&extension) {
            metadata.video = Some(self.probe_video(file_path).await);
        }

        metadata.neighbor_names =
            neighbor_names(file_path, options.neighbor_count, &options.exclude_paths);

        if options.include_content && options.content_max_chars > 0 {
            if let Some((excerpt, truncated, source)) = self
                .content_excerpt(file_path, &extension, options.content_max_chars)
                .await
            {
                metadata.content_excerpt = Some(excerpt);
                metadata.content_truncated = truncated;
                metadata.content_source = Some(source);
            }
        }

        Ok(metadata)
    }

    /// Probes image dimensions and capture tags via ffprobe; missing tool
    /// leaves fields empty.
    async fn probe_image(&self, file_path: &Path) -> ImageMetadata {
        match ffprobe_json(file_path).await {
            Some(probe) => image_metadata_from_probe(&probe),
            None => ImageMetadata::default(),
        }
    }

    /// Probes video attributes via ffprobe.
    async fn probe_video(&self, file_path: &Path) -> VideoMetadata {
        let mut metadata = VideoMetadata::default();
        let Some(probe) = ffprobe_json(file_path).await else {
            return metadata;
        };

        if let Some(stream) = first_video_stream(&probe) {
            metadata.width = stream.get("width").and_then(|v| v.as_u64()).map(|v| v as u32);
            metadata.height = stream.get("height").and_then(|v| v.as_u64()).map(|v| v as u32);
            metadata.codec = stream
                .get("codec_name")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            metadata.fps = stream
                .get("r_frame_rate")
                .and_then(|v| v.as_str())
                .and_then(parse_frame_rate);
        }

        if let Some(format) = probe.get("format") {
            metadata.duration_seconds = format
                .get("duration")
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse().ok());
            metadata.bitrate = format
                .get("bit_rate")
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse().ok());
            metadata.creation_time = format
                .get("tags")
                .and_then(|tags| tags.get("creation_time"))
                .and_then(|v| v.as_str())
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Local));
        }

        metadata
    }

    /// Reads a capped text excerpt for text-like files.
    async fn content_excerpt(
        &self,
        file_path: &Path,
        extension: &str,
        max_chars: usize,
    ) -> Option<(String, bool, String)> {
        if !TEXT_EXTENSIONS.contains(&extension) {
            return None;
        }

        // Cap the read well above max_chars so multi-byte text still fills
        // the excerpt.
        let max_bytes = max_chars.saturating_mul(4);
        let raw = tokio::fs::read(file_path).await.ok()?;
        let over_byte_cap = raw.len() > max_bytes;
        let raw = &raw[..raw.len().min(max_bytes)];

        let text = String::from_utf8_lossy(raw);
        let cleaned = text.trim();
        if cleaned.is_empty() {
            return None;
        }

        let (excerpt, truncated_by_length) = truncate_chars(cleaned, max_chars);
        Some((excerpt, truncated_by_length || over_byte_cap, "text".to_string()))
    }
}

async fn ffprobe_json(file_path: &Path) -> Option<serde_json::Value> {
    let mut command = Command::new("ffprobe");
    command
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(file_path);

    let output = match tokio::time::timeout(FFPROBE_TIMEOUT, command.output()).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(_)) => return None,
        Ok(Err(err)) => {
            log::debug!("ffprobe unavailable: {err}");
            return None;
        }
        Err(_) => {
            log::warn!("ffprobe timed out probing {}", file_path.display());
            return None;
        }
    };

    serde_json::from_slice(&output.stdout).ok()
}

/// Decodes image attributes from ffprobe output.
///
/// Capture tags vary by container: EXIF-carrying formats expose
/// `DateTimeOriginal`/`Make`/`Model`, HEIC and camera MOV stills use the
/// QuickTime `creation_time`/`com.apple.quicktime.*` keys and an ISO 6709
/// `location` string. All lookups are case-insensitive across format and
/// stream tags.
fn image_metadata_from_probe(probe: &serde_json::Value) -> ImageMetadata {
    let mut metadata = ImageMetadata::default();

    if let Some(stream) = first_video_stream(probe) {
        metadata.width = stream.get("width").and_then(|v| v.as_u64()).map(|v| v as u32);
        metadata.height = stream.get("height").and_then(|v| v.as_u64()).map(|v| v as u32);
    }

    metadata.date_taken = find_tag(
        probe,
        &[
            "DateTimeOriginal",
            "DateTime",
            "com.apple.quicktime.creationdate",
            "creation_time",
        ],
    )
    .and_then(parse_capture_date);
    metadata.camera_make =
        find_tag(probe, &["Make", "com.apple.quicktime.make"]).map(trimmed_tag);
    metadata.camera_model =
        find_tag(probe, &["Model", "com.apple.quicktime.model"]).map(trimmed_tag);
    metadata.lens_model =
        find_tag(probe, &["LensModel", "com.apple.quicktime.camera.lens_model"]).map(trimmed_tag);

    if let Some((latitude, longitude)) = find_tag(
        probe,
        &["location", "com.apple.quicktime.location.ISO6709"],
    )
    .and_then(parse_iso6709)
    {
        metadata.gps_latitude = Some(latitude);
        metadata.gps_longitude = Some(longitude);
    }

    metadata
}

/// First matching tag value across the format section and every stream.
fn find_tag<'a>(probe: &'a serde_json::Value, names: &[&str]) -> Option<&'a str> {
    let format_tags = probe.get("format").and_then(|f| f.get("tags"));
    let stream_tags = probe
        .get("streams")
        .and_then(|s| s.as_array())
        .into_iter()
        .flatten()
        .filter_map(|s| s.get("tags"));

    for tags in format_tags.into_iter().chain(stream_tags) {
        let Some(map) = tags.as_object() else {
            continue;
        };
        for name in names {
            let found = map
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, value)| value.as_str());
            if let Some(value) = found {
                return Some(value);
            }
        }
    }
    None
}

fn trimmed_tag(value: &str) -> String {
    value.trim().to_string()
}

/// Accepts the EXIF `YYYY:MM:DD HH:MM:SS` form and RFC 3339 timestamps.
fn parse_capture_date(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S") {
        return Local.from_local_datetime(&naive).single();
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

/// Parses an ISO 6709 point (`+DD.DDDD+DDD.DDDD[+ALT]/`) into (lat, lon).
fn parse_iso6709(value: &str) -> Option<(f64, f64)> {
    let value = value.trim().trim_end_matches('/');
    let mut signs = value
        .char_indices()
        .filter(|(i, c)| matches!(c, '+' | '-') && *i > 0)
        .map(|(i, _)| i);
    let lon_start = signs.next()?;
    let lon_end = signs.next().unwrap_or(value.len());

    let latitude: f64 = value[..lon_start].parse().ok()?;
    let longitude: f64 = value[lon_start..lon_end].parse().ok()?;
    Some((latitude, longitude))
}

fn first_video_stream(probe: &serde_json::Value) -> Option<&serde_json::Value> {
    probe
        .get("streams")?
        .as_array()?
        .iter()
        .find(|s| s.get("codec_type").and_then(|v| v.as_str()) == Some("video"))
}

fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some((num / den * 100.0).round() / 100.0)
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let truncated: String = text.chars().take(max_chars).collect();
    (truncated.trim_end().to_string(), true)
}

/// Gathers sibling filenames as a naming-convention hint.
///
/// Skips the file itself, system/hidden/temp files and paths already
/// renamed this session. Same-extension siblings are preferred; selection
/// within each group is shuffled for variety. Unreadable directories yield
/// an empty list.
fn neighbor_names(file_path: &Path, count: usize, exclude_paths: &HashSet<PathBuf>) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let Some(parent) = file_path.parent() else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(parent) else {
        return Vec::new();
    };

    let target_ext = file_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut same_ext = Vec::new();
    let mut other = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path == file_path || exclude_paths.contains(&path) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if IGNORE_FILES.contains(&name.as_str())
            || IGNORE_PREFIXES.iter().any(|p| name.starts_with(p))
            || IGNORE_SUFFIXES.iter().any(|s| name.ends_with(s))
        {
            continue;
        }
        if !path.is_file() {
            continue;
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !target_ext.is_empty() && ext == target_ext {
            same_ext.push(name);
        } else {
            other.push(name);
        }
    }

    let mut rng = rand::thread_rng();
    same_ext.shuffle(&mut rng);
    other.shuffle(&mut rng);

    let mut result: Vec<String> = same_ext.into_iter().take(count).collect();
    if result.len() < count {
        result.extend(other.into_iter().take(count - result.len()));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn options(neighbors: usize) -> ExtractOptions {
        ExtractOptions {
            neighbor_count: neighbors,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn extracts_base_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Notes.TXT");
        fs::write(&path, b"hello world").unwrap();

        let metadata = MetadataExtractor::new()
            .extract(&path, &options(0))
            .await
            .unwrap();
        assert_eq!(metadata.file_name, "Notes.TXT");
        assert_eq!(metadata.extension, ".txt");
        assert_eq!(metadata.size_bytes, 11);
        assert!(metadata.neighbor_names.is_empty());
    }

    #[tokio::test]
    async fn missing_file_errors() {
        let dir = tempdir().unwrap();
        let result = MetadataExtractor::new()
            .extract(&dir.path().join("gone.txt"), &options(0))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn neighbors_prefer_same_extension_and_skip_excluded() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target.jpg");
        fs::write(&target, b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("c.txt"), b"x").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        fs::write(dir.path().join("junk.tmp"), b"x").unwrap();

        let excluded = dir.path().join("b.jpg");
        let opts = ExtractOptions {
            neighbor_count: 2,
            exclude_paths: HashSet::from([excluded]),
            ..Default::default()
        };
        let metadata = MetadataExtractor::new().extract(&target, &opts).await.unwrap();

        assert_eq!(metadata.neighbor_names.len(), 2);
        assert!(metadata.neighbor_names.contains(&"a.jpg".to_string()));
        assert!(!metadata.neighbor_names.contains(&"b.jpg".to_string()));
        assert!(!metadata.neighbor_names.contains(&".DS_Store".to_string()));
    }

    #[tokio::test]
    async fn content_excerpt_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "x".repeat(5000)).unwrap();

        let opts = ExtractOptions {
            include_content: true,
            content_max_chars: 100,
            ..Default::default()
        };
        let metadata = MetadataExtractor::new().extract(&path, &opts).await.unwrap();
        let excerpt = metadata.content_excerpt.unwrap();
        assert_eq!(excerpt.chars().count(), 100);
        assert!(metadata.content_truncated);
        assert_eq!(metadata.content_source.as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn human_size_scales_units() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"x").unwrap();
        let mut metadata = MetadataExtractor::new()
            .extract(&path, &options(0))
            .await
            .unwrap();
        metadata.size_bytes = 2_560;
        assert_eq!(metadata.size_human(), "2.5 KB");
        metadata.size_bytes = 3;
        assert_eq!(metadata.size_human(), "3.0 B");
    }

    #[test]
    fn frame_rate_parses() {
        assert_eq!(parse_frame_rate("30000/1001"), Some(29.97));
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[test]
    fn image_probe_decodes_exif_style_tags() {
        let probe = serde_json::json!({
            "streams": [{
                "codec_type": "video",
                "width": 4032,
                "height": 3024,
                "tags": {
                    "DateTimeOriginal": "2023:07:14 18:02:11",
                    "Make": "Canon ",
                    "Model": "Canon EOS R6",
                    "LensModel": "RF24-70mm F2.8 L IS USM"
                }
            }]
        });

        let metadata = image_metadata_from_probe(&probe);
        assert_eq!(metadata.width, Some(4032));
        assert_eq!(metadata.height, Some(3024));
        assert_eq!(metadata.camera_make.as_deref(), Some("Canon"));
        assert_eq!(metadata.camera_model.as_deref(), Some("Canon EOS R6"));
        assert_eq!(
            metadata.lens_model.as_deref(),
            Some("RF24-70mm F2.8 L IS USM")
        );
        let taken = metadata.date_taken.unwrap();
        assert_eq!(
            taken.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2023-07-14 18:02:11"
        );
    }

    #[test]
    fn image_probe_decodes_quicktime_tags_and_location() {
        let probe = serde_json::json!({
            "format": {
                "tags": {
                    "creation_time": "2024-03-02T09:15:00.000000Z",
                    "com.apple.quicktime.make": "Apple",
                    "com.apple.quicktime.model": "iPhone 15 Pro",
                    "com.apple.quicktime.location.ISO6709": "+37.3349-122.0090+010.000/"
                }
            },
            "streams": [{"codec_type": "video", "width": 5712, "height": 4284}]
        });

        let metadata = image_metadata_from_probe(&probe);
        assert_eq!(metadata.camera_make.as_deref(), Some("Apple"));
        assert_eq!(metadata.camera_model.as_deref(), Some("iPhone 15 Pro"));
        assert!(metadata.date_taken.is_some());
        assert_eq!(metadata.gps_latitude, Some(37.3349));
        assert_eq!(metadata.gps_longitude, Some(-122.0090));
    }

    #[test]
    fn image_probe_without_tags_keeps_fields_empty() {
        let probe = serde_json::json!({
            "streams": [{"codec_type": "video", "width": 800, "height": 600}]
        });
        let metadata = image_metadata_from_probe(&probe);
        assert_eq!(metadata.width, Some(800));
        assert!(metadata.date_taken.is_none());
        assert!(metadata.camera_make.is_none());
        assert!(metadata.gps_latitude.is_none());
    }

    #[test]
    fn iso6709_parses_signed_coordinates() {
        assert_eq!(
            parse_iso6709("-33.8688+151.2093/"),
            Some((-33.8688, 151.2093))
        );
        assert_eq!(parse_iso6709("+37.3349-122.0090+010.000/"), Some((37.3349, -122.0090)));
        assert_eq!(parse_iso6709("garbage"), None);
    }
}
