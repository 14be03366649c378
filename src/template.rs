/// Naming templates and placeholder rendering.
///
/// A template's pattern mixes literal text with `{placeholder}` segments
/// filled from the file record and its extracted metadata. Rendering
/// produces the new file stem; the extension is carried over by the caller.
/// Substituted values are sanitized so a PDF titled `Q3/Q4 Report` cannot
/// smuggle a path separator into the result, and the final name is checked
/// against the usual filesystem restrictions (invalid characters, reserved
/// Windows device names, trailing dot or space, length).
use crate::metadata::UnifiedMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A naming template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Unique identifier (UUID).
    pub id: String,
    pub name: String,
    /// Naming pattern with placeholders, e.g. `{date}-{name}`.
    pub pattern: String,
    /// Extensions this template applies to; `None` means all files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_types: Option<Vec<String>>,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Template {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            pattern: pattern.into(),
            file_types: None,
            is_default: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_file_types(mut self, file_types: Vec<&str>) -> Self {
        self.file_types = Some(file_types.into_iter().map(str::to_string).collect());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Whether this template applies to a file extension.
    pub fn applies_to(&self, extension: &str) -> bool {
        match &self.file_types {
            Some(types) => types.iter().any(|t| t.eq_ignore_ascii_case(extension)),
            None => true,
        }
    }
}

/// The built-in template set used when no configuration exists.
pub fn default_templates() -> Vec<Template> {
    vec![
        Template::new("Date Prefix", "{date}-{name}")
            .with_file_types(vec!["jpg", "jpeg", "png", "heic", "webp", "gif"])
            .as_default(),
        Template::new("Camera + Date", "{camera}-{date}-{name}")
            .with_file_types(vec!["jpg", "jpeg", "heic", "tiff"]),
        Template::new("Document Date", "{date}-{name}")
            .with_file_types(vec!["pdf", "docx", "xlsx", "pptx"]),
        Template::new("Title", "{title}"),
    ]
}

/// Finds a template by id.
pub fn find_template<'a>(templates: &'a [Template], id: &str) -> Option<&'a Template> {
    templates.iter().find(|t| t.id == id)
}

/// The configured default template, if any.
pub fn default_template(templates: &[Template]) -> Option<&Template> {
    templates.iter().find(|t| t.is_default)
}

/// Errors from rendering a template pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateRenderError {
    /// The pattern names a placeholder this file has no data for.
    MissingPlaceholder { placeholder: String },
    /// The pattern names a placeholder that does not exist.
    UnknownPlaceholder { placeholder: String },
    /// The pattern has an unmatched `{` or `}`.
    UnbalancedBrace { pattern: String },
    /// The rendered name is not a valid filename.
    InvalidFilename { name: String },
}

impl std::fmt::Display for TemplateRenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateRenderError::MissingPlaceholder { placeholder } => {
                write!(f, "No data for placeholder '{{{}}}'", placeholder)
            }
            TemplateRenderError::UnknownPlaceholder { placeholder } => {
                write!(f, "Unknown placeholder '{{{}}}'", placeholder)
            }
            TemplateRenderError::UnbalancedBrace { pattern } => {
                write!(f, "Unbalanced braces in template pattern '{}'", pattern)
            }
            TemplateRenderError::InvalidFilename { name } => {
                write!(f, "Rendered name '{}' is not a valid filename", name)
            }
        }
    }
}

impl std::error::Error for TemplateRenderError {}

/// Result type for template rendering.
pub type TemplateRenderResult<T> = Result<T, TemplateRenderError>;

/// Options for rendering.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// `chrono` format string for `{date}`.
    pub date_format: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".to_string(),
        }
    }
}

/// Characters that are invalid in filenames.
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Reserved Windows device names.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Checks a filename against filesystem restrictions.
pub fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > 255 {
        return false;
    }
    if name.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return false;
    }
    let upper = name.to_uppercase();
    let base = upper.split('.').next().unwrap_or("");
    if RESERVED_NAMES.contains(&base) {
        return false;
    }
    if name.ends_with(' ') || name.ends_with('.') {
        return false;
    }
    true
}

/// Renders a template pattern into a new file stem.
///
/// The extension is not part of the pattern; callers reattach the original
/// extension to the rendered stem.
pub fn render_stem(
    pattern: &str,
    metadata: &UnifiedMetadata,
    options: &RenderOptions,
) -> TemplateRenderResult<String> {
    let mut rendered = String::new();
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut placeholder = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    placeholder.push(inner);
                }
                if !closed {
                    return Err(TemplateRenderError::UnbalancedBrace {
                        pattern: pattern.to_string(),
                    });
                }
                rendered.push_str(&resolve_placeholder(&placeholder, metadata, options)?);
            }
            '}' => {
                return Err(TemplateRenderError::UnbalancedBrace {
                    pattern: pattern.to_string(),
                });
            }
            _ => rendered.push(c),
        }
    }

    if !is_valid_filename(&rendered) {
        return Err(TemplateRenderError::InvalidFilename { name: rendered });
    }
    Ok(rendered)
}

fn resolve_placeholder(
    placeholder: &str,
    metadata: &UnifiedMetadata,
    options: &RenderOptions,
) -> TemplateRenderResult<String> {
    let file = &metadata.file;
    let value = match placeholder {
        "name" | "original" => Some(file.name.clone()),
        "date" => Some(best_date(metadata).format(&options.date_format).to_string()),
        "year" => Some(best_date(metadata).format("%Y").to_string()),
        "month" => Some(best_date(metadata).format("%m").to_string()),
        "day" => Some(best_date(metadata).format("%d").to_string()),
        "category" => Some(file.category.dir_name().to_string()),
        "camera" => metadata
            .image
            .as_ref()
            .and_then(|i| i.camera_make.clone().or_else(|| i.camera_model.clone())),
        "title" => metadata
            .pdf
            .as_ref()
            .and_then(|p| p.title.clone())
            .or_else(|| metadata.office.as_ref().and_then(|o| o.title.clone())),
        "author" => metadata
            .pdf
            .as_ref()
            .and_then(|p| p.author.clone())
            .or_else(|| metadata.office.as_ref().and_then(|o| o.creator.clone())),
        _ => {
            return Err(TemplateRenderError::UnknownPlaceholder {
                placeholder: placeholder.to_string(),
            });
        }
    };

    match value {
        Some(v) => Ok(sanitize_component(&v)),
        None => Err(TemplateRenderError::MissingPlaceholder {
            placeholder: placeholder.to_string(),
        }),
    }
}

/// Renders a folder pattern such as `{year}/{month}` or `{category}` into a
/// relative path, one validated segment per `/`.
pub fn render_folder_path(
    pattern: &str,
    metadata: &UnifiedMetadata,
    options: &RenderOptions,
) -> TemplateRenderResult<std::path::PathBuf> {
    let mut path = std::path::PathBuf::new();
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        path.push(render_stem(segment, metadata, options)?);
    }
    Ok(path)
}

/// The best available date for a file: capture date, then document creation
/// date, then the filesystem modification time.
fn best_date(metadata: &UnifiedMetadata) -> DateTime<Utc> {
    metadata
        .image
        .as_ref()
        .and_then(|i| i.date_taken)
        .or_else(|| metadata.pdf.as_ref().and_then(|p| p.creation_date))
        .or_else(|| metadata.office.as_ref().and_then(|o| o.created))
        .unwrap_or(metadata.file.modified_at)
}

/// Replaces filename-invalid characters in a substituted value and trims
/// the edges.
fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '-' } else { c })
        .collect();
    cleaned.trim().to_string()
}
