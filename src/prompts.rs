//! Prompt construction: deterministic rendering of system and user prompts
//! from a metadata snapshot, with per-file-type overrides.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::PromptOverrides;
use crate::media::{is_image_file, is_video_file};
use crate::metadata::FileMetadata;

/// File-type bucket used to pick prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Document,
    Generic,
}

const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".md", ".rtf", ".csv",
    ".odt", ".ods", ".odp",
];

impl FileKind {
    pub fn classify(extension: &str) -> Self {
        let ext = extension.to_lowercase();
        if is_image_file(&ext) {
            FileKind::Image
        } else if is_video_file(&ext) || matches!(ext.as_str(), ".wmv" | ".flv") {
            FileKind::Video
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Document
        } else {
            FileKind::Generic
        }
    }
}

const SYSTEM_PROMPT_BASE: &str = "\
You are an expert file naming specialist trained in controlled vocabularies and information retrieval principles.

TASK: Generate an optimal, descriptive filename that aids future retrieval and organization.

NAMING PRINCIPLES:
- Specificity: Distinguish this file from similar files
- Retrievability: Use terms a user would likely search for
- Clarity: Prefer standard terminology over jargon or abbreviations
- Chronology: Include dates only when meaningful to content, not merely when identifiable

RESPONSE RULES:
1. Respond ONLY with valid JSON matching {\"suggested_name\": ..., \"reasoning\": ..., \"confidence\": ..., \"tags\": [...]} - no markdown, no explanations outside JSON
2. suggested_name: lowercase, hyphen-separated, NO extension, English only
3. Be concise but precise (typically 2-12 words)

TAG FORMAT:
- Title Case, hyphen-separated (e.g., \"Web-Development\", \"Los-Angeles\")
- Tags CLASSIFY; the filename IDENTIFIES - never repeat the filename or proper-noun identifiers as tags
- Prefer terms that would also match other similar items";

const SYSTEM_PROMPT_IMAGE_EXTRA: &str = "\n
IMAGE ANALYSIS PRIORITIES:
1. Primary subject - main focus (person, object, scene, concept)
2. Action/state - what is happening
3. Context - where/when captured
4. Purpose - screenshot, photograph, diagram, artwork, meme
5. Distinguishing features - what makes this image unique";

const SYSTEM_PROMPT_VIDEO_EXTRA: &str = "\n
MOVING IMAGE ANALYSIS PRIORITIES:
1. Content type - screen recording, personal footage, tutorial, presentation
2. Primary subject across frames
3. Action or narrative being demonstrated
4. Context - software shown, location, event
Infer overall content from sample frames; note on-screen text, UI elements or watermarks.";

const SYSTEM_PROMPT_DOCUMENT_EXTRA: &str = "\n
DOCUMENT ANALYSIS PRIORITIES:
1. Document type - invoice, report, letter, contract, notes, form
2. Key entities - names, organizations, identifiers
3. Temporal markers - dates, periods, deadlines
4. Subject matter - primary topic or transaction
For business documents consider date-type-subject ordering.";

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"))
}

/// Builds system/user prompts for one file.
pub struct PromptBuilder;

impl PromptBuilder {
    /// System prompt for the file's type, honoring overrides.
    pub fn system_prompt(metadata: &FileMetadata, overrides: Option<&PromptOverrides>) -> String {
        let kind = FileKind::classify(&metadata.extension);
        if let Some(text) = overrides.and_then(|o| section_override(&o.system, kind)) {
            return text;
        }
        match kind {
            FileKind::Image => format!("{SYSTEM_PROMPT_BASE}{SYSTEM_PROMPT_IMAGE_EXTRA}"),
            FileKind::Video => format!("{SYSTEM_PROMPT_BASE}{SYSTEM_PROMPT_VIDEO_EXTRA}"),
            FileKind::Document => format!("{SYSTEM_PROMPT_BASE}{SYSTEM_PROMPT_DOCUMENT_EXTRA}"),
            FileKind::Generic => SYSTEM_PROMPT_BASE.to_string(),
        }
    }

    /// User prompt for the file's type, honoring overrides with
    /// `{placeholder}` template substitution.
    pub fn user_prompt(metadata: &FileMetadata, overrides: Option<&PromptOverrides>) -> String {
        let kind = FileKind::classify(&metadata.extension);
        if let Some(template) = overrides.and_then(|o| section_override(&o.user, kind)) {
            return render_template(&template, metadata);
        }
        match kind {
            FileKind::Image => build_image_prompt(metadata),
            FileKind::Video => build_video_prompt(metadata),
            FileKind::Document => build_document_prompt(metadata),
            FileKind::Generic => build_generic_prompt(metadata),
        }
    }
}

fn section_override(section: &crate::config::PromptSection, kind: FileKind) -> Option<String> {
    let value = match kind {
        FileKind::Image => section.image.as_deref(),
        FileKind::Video => section.video.as_deref(),
        FileKind::Document => section.document.as_deref(),
        FileKind::Generic => section.generic.as_deref(),
    };
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Substitutes `{key}` placeholders from the metadata context; unknown keys
/// render as empty strings.
fn render_template(template: &str, metadata: &FileMetadata) -> String {
    let context = template_context(metadata);
    placeholder()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            context.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn template_context(metadata: &FileMetadata) -> HashMap<String, String> {
    let mut ctx = HashMap::new();
    let file_name = if metadata.include_current_filename {
        metadata.file_name.clone()
    } else {
        String::new()
    };
    ctx.insert("file_name".into(), file_name);
    ctx.insert("extension".into(), metadata.extension.clone());
    ctx.insert("size_human".into(), metadata.size_human());
    ctx.insert("created_at".into(), metadata.created_at.to_rfc3339());
    ctx.insert("modified_at".into(), metadata.modified_at.to_rfc3339());
    ctx.insert(
        "parent_folder_name".into(),
        metadata.parent_folder_name.clone().unwrap_or_default(),
    );
    ctx.insert(
        "folder_context".into(),
        metadata.folder_context.clone().unwrap_or_default(),
    );
    ctx.insert("neighbor_names".into(), metadata.neighbor_names.join("\n"));
    ctx.insert(
        "neighbor_names_csv".into(),
        metadata.neighbor_names.join(", "),
    );
    ctx.insert(
        "content_excerpt".into(),
        metadata.content_excerpt.clone().unwrap_or_default(),
    );
    ctx.insert(
        "content_source".into(),
        metadata.content_source.clone().unwrap_or_default(),
    );
    ctx.insert(
        "content_truncated".into(),
        if metadata.content_truncated { "true" } else { "" }.to_string(),
    );
    ctx.insert(
        "tag_count".into(),
        metadata.tag_count.map(|c| c.to_string()).unwrap_or_default(),
    );
    ctx.insert(
        "tag_prompt".into(),
        metadata.tag_prompt.clone().unwrap_or_default(),
    );
    ctx.insert(
        "video_extract_count".into(),
        if metadata.video_extract_count > 0 {
            metadata.video_extract_count.to_string()
        } else {
            String::new()
        },
    );
    if let Some(image) = &metadata.image {
        ctx.insert(
            "image_date_taken".into(),
            image.date_taken.map(|d| d.to_rfc3339()).unwrap_or_default(),
        );
        ctx.insert(
            "image_width".into(),
            image.width.map(|w| w.to_string()).unwrap_or_default(),
        );
        ctx.insert(
            "image_height".into(),
            image.height.map(|h| h.to_string()).unwrap_or_default(),
        );
    }
    if let Some(video) = &metadata.video {
        ctx.insert(
            "video_duration_seconds".into(),
            video
                .duration_seconds
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
        ctx.insert(
            "video_codec".into(),
            video.codec.clone().unwrap_or_default(),
        );
    }
    ctx
}

fn push_common_header(sections: &mut Vec<String>, metadata: &FileMetadata, label: &str) {
    if metadata.include_current_filename {
        sections.push(format!("- {label}: {}", metadata.file_name));
    }
    sections.push(format!("- Size: {}", metadata.size_human()));
    if let Some(folder) = &metadata.parent_folder_name {
        sections.push(format!("- Folder: {folder}"));
    }
    if let Some(context) = &metadata.folder_context {
        sections.push(String::new());
        sections.push("## Folder Context".to_string());
        sections.push(format!("- {context}"));
    }
}

fn push_neighbors(sections: &mut Vec<String>, metadata: &FileMetadata, heading: &str) {
    if metadata.neighbor_names.is_empty() {
        return;
    }
    sections.push(String::new());
    sections.push(heading.to_string());
    for name in metadata.neighbor_names.iter().take(5) {
        sections.push(format!("- {name}"));
    }
}

fn push_content_excerpt(sections: &mut Vec<String>, metadata: &FileMetadata) {
    let Some(excerpt) = &metadata.content_excerpt else {
        return;
    };
    let mut details = Vec::new();
    if let Some(source) = &metadata.content_source {
        details.push(source.clone());
    }
    details.push(format!("{} chars", excerpt.chars().count()));
    if metadata.content_truncated {
        details.push("truncated".to_string());
    }
    sections.push(String::new());
    sections.push(format!("## Content Excerpt ({})", details.join(", ")));
    sections.push(excerpt.clone());
}

fn push_tag_guidance(sections: &mut Vec<String>, metadata: &FileMetadata, subject: &str) {
    sections.push(String::new());
    sections.push("## Tag Guidance".to_string());
    match metadata.tag_count {
        None => sections.push(format!("- Suggest relevant Finder tags for {subject}.")),
        Some(0) => sections.push("- Return an empty tags array.".to_string()),
        Some(1) => sections.push("- Suggest 1 Finder tag.".to_string()),
        Some(n) => sections.push(format!("- Suggest up to {n} Finder tags.")),
    }
    if let Some(tag_prompt) = metadata.tag_prompt.as_deref().map(str::trim) {
        if !tag_prompt.is_empty() {
            sections.push(format!("- Tag guidance: {tag_prompt}"));
        }
    }
}

fn build_image_prompt(metadata: &FileMetadata) -> String {
    let mut sections = vec![
        "Analyze this image and suggest a descriptive filename.".to_string(),
        String::new(),
        "## Current File".to_string(),
    ];
    push_common_header(&mut sections, metadata, "Filename");

    if let Some(image) = &metadata.image {
        let mut lines = Vec::new();
        if let Some(date) = image.date_taken {
            lines.push(format!("- Date taken: {}", date.format("%Y-%m-%d %H:%M")));
        }
        let camera: Vec<&str> = [image.camera_make.as_deref(), image.camera_model.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !camera.is_empty() {
            lines.push(format!("- Camera: {}", camera.join(" ")));
        }
        if let Some(lens) = &image.lens_model {
            lines.push(format!("- Lens: {lens}"));
        }
        if let (Some(lat), Some(lon)) = (image.gps_latitude, image.gps_longitude) {
            lines.push(format!("- GPS coordinates: {lat:.4}, {lon:.4}"));
        }
        if let (Some(w), Some(h)) = (image.width, image.height) {
            let orientation = match w.cmp(&h) {
                std::cmp::Ordering::Greater => "landscape",
                std::cmp::Ordering::Less => "portrait",
                std::cmp::Ordering::Equal => "square",
            };
            lines.push(format!("- Dimensions: {w}x{h} ({orientation})"));
        }
        if !lines.is_empty() {
            sections.push(String::new());
            sections.push("## Image Metadata".to_string());
            sections.extend(lines);
        }
    }

    push_neighbors(
        &mut sections,
        metadata,
        "## Other Files in Folder (for naming convention reference)",
    );
    push_content_excerpt(&mut sections, metadata);

    sections.extend([
        String::new(),
        "## Your Task".to_string(),
        "1. Describe what you see in the image".to_string(),
        "2. Identify the main subject, scene, or activity".to_string(),
        "3. Consider the metadata for additional context (date, location, camera)".to_string(),
        "4. Match the naming style of neighboring files if a pattern exists".to_string(),
    ]);
    push_tag_guidance(&mut sections, metadata, "this image");
    sections.join("\n")
}

fn build_video_prompt(metadata: &FileMetadata) -> String {
    let mut sections = vec![
        "Suggest a descriptive filename for this video based on the available information."
            .to_string(),
        String::new(),
        "## Current File".to_string(),
    ];
    push_common_header(&mut sections, metadata, "Filename");
    sections.push(format!(
        "- Created: {}",
        metadata.created_at.format("%Y-%m-%d %H:%M")
    ));

    if let Some(video) = &metadata.video {
        sections.push(String::new());
        sections.push("## Video Metadata".to_string());
        if let Some(duration) = video.duration_seconds {
            sections.push(format!("- Duration: {}", format_duration(duration)));
        }
        if let (Some(w), Some(h)) = (video.width, video.height) {
            let res_label = match h {
                h if h >= 2160 => "4K",
                h if h >= 1080 => "1080p",
                h if h >= 720 => "720p",
                _ => "SD",
            };
            sections.push(format!("- Resolution: {w}x{h} ({res_label})"));
        }
        if let Some(codec) = &video.codec {
            sections.push(format!("- Codec: {codec}"));
        }
        if let Some(fps) = video.fps {
            sections.push(format!("- Frame rate: {fps} fps"));
        }
        if let Some(recorded) = video.creation_time {
            sections.push(format!(
                "- Recording date: {}",
                recorded.format("%Y-%m-%d %H:%M")
            ));
        }
    }

    push_neighbors(&mut sections, metadata, "## Other Files in Folder");
    push_content_excerpt(&mut sections, metadata);

    let video_note = if metadata.video_extract_count > 0 {
        format!(
            "NOTE: You will receive {} extracted video frames. Use them as visual context.",
            metadata.video_extract_count
        )
    } else {
        "NOTE: You cannot see the video content. Base your suggestion on metadata and context only."
            .to_string()
    };
    sections.extend([
        String::new(),
        "## Your Task".to_string(),
        "1. Analyze the filename and metadata for clues about content".to_string(),
        "2. Consider the duration and format (screen recording? phone video? professional?)"
            .to_string(),
        "3. If the current name has meaningful parts, preserve or improve them".to_string(),
        "4. Match the naming style of neighboring files if appropriate".to_string(),
        String::new(),
        video_note,
    ]);
    push_tag_guidance(&mut sections, metadata, "this video");
    sections.join("\n")
}

fn build_document_prompt(metadata: &FileMetadata) -> String {
    let mut sections = vec![
        "Suggest a descriptive filename for this document based on the available information."
            .to_string(),
        String::new(),
        "## Current File".to_string(),
    ];
    push_common_header(&mut sections, metadata, "Filename");
    sections.push(format!(
        "- Type: {} document",
        metadata.extension.to_uppercase()
    ));
    sections.push(format!(
        "- Created: {}",
        metadata.created_at.format("%Y-%m-%d %H:%M")
    ));
    sections.push(format!(
        "- Last modified: {}",
        metadata.modified_at.format("%Y-%m-%d %H:%M")
    ));

    push_content_excerpt(&mut sections, metadata);
    push_neighbors(&mut sections, metadata, "## Other Files in Folder");

    let note_line = if metadata.content_excerpt.is_some() {
        "NOTE: A content excerpt is included above. Use it as the primary signal."
    } else {
        "NOTE: You cannot read the document content. Base your suggestion on filename and metadata only."
    };
    sections.extend([
        String::new(),
        "## Your Task".to_string(),
        "1. Analyze the current filename for any meaningful information".to_string(),
        "2. Consider the document type and typical naming conventions".to_string(),
        "3. If it's auto-generated or messy, suggest a cleaner descriptive name".to_string(),
        "4. Match the naming style of neighboring files if a pattern exists".to_string(),
        String::new(),
        note_line.to_string(),
    ]);
    push_tag_guidance(&mut sections, metadata, "this document");
    sections.join("\n")
}

fn build_generic_prompt(metadata: &FileMetadata) -> String {
    let mut sections = vec![
        "Suggest a descriptive filename for this file.".to_string(),
        String::new(),
        "## File Information".to_string(),
    ];
    push_common_header(&mut sections, metadata, "Current name");
    sections.push(format!("- Type: {}", metadata.extension));
    sections.push(format!(
        "- Created: {}",
        metadata.created_at.format("%Y-%m-%d %H:%M")
    ));

    push_content_excerpt(&mut sections, metadata);
    push_neighbors(&mut sections, metadata, "## Other Files in Folder");

    sections.push(String::new());
    sections.push(
        "Suggest a clear, descriptive name based on the current filename and context.".to_string(),
    );
    push_tag_guidance(&mut sections, metadata, "this file");
    sections.join("\n")
}

fn format_duration(seconds: f64) -> String {
    let total = seconds as u64;
    let (hours, rem) = (total / 3600, total % 3600);
    let (mins, secs) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptSection;
    use chrono::Local;
    use std::path::PathBuf;

    fn metadata(extension: &str) -> FileMetadata {
        FileMetadata {
            file_path: PathBuf::from(format!("/tmp/file{extension}")),
            file_name: format!("file{extension}"),
            extension: extension.to_string(),
            size_bytes: 1024,
            created_at: Local::now(),
            modified_at: Local::now(),
            image: None,
            video: None,
            video_extract_count: 0,
            parent_folder_name: Some("Inbox".to_string()),
            folder_context: None,
            include_current_filename: true,
            content_excerpt: None,
            content_truncated: false,
            content_source: None,
            tag_count: Some(3),
            tag_prompt: None,
            neighbor_names: vec!["beach-sunset.jpg".to_string()],
        }
    }

    #[test]
    fn classifies_file_kinds() {
        assert_eq!(FileKind::classify(".jpg"), FileKind::Image);
        assert_eq!(FileKind::classify(".mp4"), FileKind::Video);
        assert_eq!(FileKind::classify(".pdf"), FileKind::Document);
        assert_eq!(FileKind::classify(".xyz"), FileKind::Generic);
    }

    #[test]
    fn image_prompt_includes_context() {
        let prompt = PromptBuilder::user_prompt(&metadata(".jpg"), None);
        assert!(prompt.contains("Analyze this image"));
        assert!(prompt.contains("file.jpg"));
        assert!(prompt.contains("beach-sunset.jpg"));
        assert!(prompt.contains("Suggest up to 3 Finder tags."));
    }

    #[test]
    fn filename_omitted_when_disabled() {
        let mut meta = metadata(".pdf");
        meta.include_current_filename = false;
        let prompt = PromptBuilder::user_prompt(&meta, None);
        assert!(!prompt.contains("Filename: file.pdf"));
    }

    #[test]
    fn zero_tag_count_requests_empty_array() {
        let mut meta = metadata(".txt");
        meta.tag_count = Some(0);
        let prompt = PromptBuilder::user_prompt(&meta, None);
        assert!(prompt.contains("Return an empty tags array."));
    }

    #[test]
    fn overrides_win_and_render_placeholders() {
        let overrides = PromptOverrides {
            user: PromptSection {
                image: Some("Name {file_name} sized {size_human} missing {nope}".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let prompt = PromptBuilder::user_prompt(&metadata(".jpg"), Some(&overrides));
        assert_eq!(prompt, "Name file.jpg sized 1.0 KB missing ");
    }

    #[test]
    fn system_prompt_varies_by_kind() {
        let image = PromptBuilder::system_prompt(&metadata(".jpg"), None);
        let document = PromptBuilder::system_prompt(&metadata(".pdf"), None);
        assert!(image.contains("IMAGE ANALYSIS"));
        assert!(document.contains("DOCUMENT ANALYSIS"));
        assert_ne!(image, document);
    }

    #[test]
    fn duration_formats() {
        assert_eq!(format_duration(42.0), "42s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
    }
}
