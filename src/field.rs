/// Field resolution for rule conditions.
///
/// Rule conditions address metadata through dotted field paths such as
/// `image.cameraMake`, `file.size` or `image.gps.latitude`. This module
/// walks those paths over a `UnifiedMetadata` record and reports whether
/// the field is present, preserving the native comparability of the value
/// (dates compare by instant, numbers by value).
///
/// Segments are accepted in camelCase (the on-disk rule format) or
/// snake_case. A path through a missing section (`image.cameraMake` on a
/// PDF) resolves to absent rather than an error; only structurally
/// malformed paths fail.
use crate::metadata::{FileCategory, MetadataCapability, UnifiedMetadata};
use chrono::{DateTime, Utc};

/// A resolved field value, typed so operators can compare natively.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

/// Result of resolving a field path against a metadata record.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedField {
    Present(FieldValue),
    Absent,
}

impl ResolvedField {
    /// True when the path resolved to a value.
    pub fn exists(&self) -> bool {
        matches!(self, ResolvedField::Present(_))
    }

    /// The resolved value, if present.
    pub fn value(&self) -> Option<&FieldValue> {
        match self {
            ResolvedField::Present(v) => Some(v),
            ResolvedField::Absent => None,
        }
    }
}

/// Error for structurally malformed field paths.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldResolutionError {
    /// The path is empty or contains an empty segment (`image..make`).
    MalformedPath { path: String },
}

impl std::fmt::Display for FieldResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldResolutionError::MalformedPath { path } => {
                write!(f, "Malformed field path '{}': empty segment", path)
            }
        }
    }
}

impl std::error::Error for FieldResolutionError {}

/// Result type for field resolution.
pub type FieldResult<T> = Result<T, FieldResolutionError>;

/// Resolves a dotted field path against a metadata record.
///
/// Returns `ResolvedField::Absent` for unknown field names and for paths
/// that traverse a missing section; errors only when the path itself is
/// malformed.
pub fn resolve_field(metadata: &UnifiedMetadata, field_path: &str) -> FieldResult<ResolvedField> {
    if field_path.is_empty() {
        return Err(FieldResolutionError::MalformedPath {
            path: field_path.to_string(),
        });
    }

    let segments: Vec<String> = field_path.split('.').map(normalize_segment).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FieldResolutionError::MalformedPath {
            path: field_path.to_string(),
        });
    }

    let resolved = match segments[0].as_str() {
        "file" => resolve_file_field(metadata, &segments[1..]),
        "image" => resolve_image_field(metadata, &segments[1..]),
        "pdf" => resolve_pdf_field(metadata, &segments[1..]),
        "office" => resolve_office_field(metadata, &segments[1..]),
        "extractionstatus" if segments.len() == 1 => {
            ResolvedField::Present(FieldValue::Str(status_name(metadata)))
        }
        "extractionerror" if segments.len() == 1 => opt_str(metadata.extraction_error.clone()),
        _ => ResolvedField::Absent,
    };

    Ok(resolved)
}

/// Lowercases a segment and strips underscores so camelCase and snake_case
/// spellings resolve identically.
fn normalize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn status_name(metadata: &UnifiedMetadata) -> String {
    // lowercase serde names, matching the persisted form
    serde_json::to_value(metadata.extraction_status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn opt_str(value: Option<String>) -> ResolvedField {
    match value {
        Some(s) => ResolvedField::Present(FieldValue::Str(s)),
        None => ResolvedField::Absent,
    }
}

fn opt_num<T: Into<f64>>(value: Option<T>) -> ResolvedField {
    match value {
        Some(n) => ResolvedField::Present(FieldValue::Number(n.into())),
        None => ResolvedField::Absent,
    }
}

fn opt_date(value: Option<DateTime<Utc>>) -> ResolvedField {
    match value {
        Some(d) => ResolvedField::Present(FieldValue::Date(d)),
        None => ResolvedField::Absent,
    }
}

fn resolve_file_field(metadata: &UnifiedMetadata, rest: &[String]) -> ResolvedField {
    if rest.len() != 1 {
        return ResolvedField::Absent;
    }
    let file = &metadata.file;
    match rest[0].as_str() {
        "name" => ResolvedField::Present(FieldValue::Str(file.name.clone())),
        "extension" | "ext" => ResolvedField::Present(FieldValue::Str(file.extension.clone())),
        "fullname" => ResolvedField::Present(FieldValue::Str(file.full_name.clone())),
        "path" => ResolvedField::Present(FieldValue::Str(file.path.clone())),
        "size" => ResolvedField::Present(FieldValue::Number(file.size as f64)),
        "category" => ResolvedField::Present(FieldValue::Str(category_name(file.category))),
        "createdat" => ResolvedField::Present(FieldValue::Date(file.created_at)),
        "modifiedat" => ResolvedField::Present(FieldValue::Date(file.modified_at)),
        "metadatasupported" => ResolvedField::Present(FieldValue::Bool(file.metadata_supported)),
        "metadatacapability" => ResolvedField::Present(FieldValue::Str(capability_name(
            file.metadata_capability,
        ))),
        _ => ResolvedField::Absent,
    }
}

fn category_name(category: FileCategory) -> String {
    serde_json::to_value(category)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn capability_name(capability: MetadataCapability) -> String {
    serde_json::to_value(capability)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn resolve_image_field(metadata: &UnifiedMetadata, rest: &[String]) -> ResolvedField {
    let Some(image) = &metadata.image else {
        return ResolvedField::Absent;
    };
    match rest {
        [field] => match field.as_str() {
            "datetaken" => opt_date(image.date_taken),
            "cameramake" => opt_str(image.camera_make.clone()),
            "cameramodel" => opt_str(image.camera_model.clone()),
            "width" => opt_num(image.width),
            "height" => opt_num(image.height),
            "orientation" => opt_num(image.orientation),
            "exposuretime" => opt_str(image.exposure_time.clone()),
            "fnumber" => opt_num(image.f_number),
            "iso" => opt_num(image.iso),
            // `image.gps` by itself answers presence checks
            "gps" => match image.gps {
                Some(_) => ResolvedField::Present(FieldValue::Bool(true)),
                None => ResolvedField::Absent,
            },
            _ => ResolvedField::Absent,
        },
        [first, second] if first == "gps" => {
            let Some(gps) = image.gps else {
                return ResolvedField::Absent;
            };
            match second.as_str() {
                "latitude" => ResolvedField::Present(FieldValue::Number(gps.latitude)),
                "longitude" => ResolvedField::Present(FieldValue::Number(gps.longitude)),
                _ => ResolvedField::Absent,
            }
        }
        _ => ResolvedField::Absent,
    }
}

fn resolve_pdf_field(metadata: &UnifiedMetadata, rest: &[String]) -> ResolvedField {
    let Some(pdf) = &metadata.pdf else {
        return ResolvedField::Absent;
    };
    if rest.len() != 1 {
        return ResolvedField::Absent;
    }
    match rest[0].as_str() {
        "title" => opt_str(pdf.title.clone()),
        "author" => opt_str(pdf.author.clone()),
        "subject" => opt_str(pdf.subject.clone()),
        "keywords" => opt_str(pdf.keywords.clone()),
        "creator" => opt_str(pdf.creator.clone()),
        "producer" => opt_str(pdf.producer.clone()),
        "creationdate" => opt_date(pdf.creation_date),
        "modificationdate" => opt_date(pdf.modification_date),
        "pagecount" => opt_num(pdf.page_count),
        _ => ResolvedField::Absent,
    }
}

fn resolve_office_field(metadata: &UnifiedMetadata, rest: &[String]) -> ResolvedField {
    let Some(office) = &metadata.office else {
        return ResolvedField::Absent;
    };
    if rest.len() != 1 {
        return ResolvedField::Absent;
    }
    match rest[0].as_str() {
        "title" => opt_str(office.title.clone()),
        "creator" | "author" => opt_str(office.creator.clone()),
        "subject" => opt_str(office.subject.clone()),
        "keywords" => opt_str(office.keywords.clone()),
        "description" => opt_str(office.description.clone()),
        "lastmodifiedby" => opt_str(office.last_modified_by.clone()),
        "company" => opt_str(office.company.clone()),
        "application" => opt_str(office.application.clone()),
        "pages" => opt_num(office.pages),
        "words" => opt_num(office.words),
        "created" => opt_date(office.created),
        "modified" => opt_date(office.modified),
        _ => ResolvedField::Absent,
    }
}
