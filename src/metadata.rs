/// File records and unified metadata types.
///
/// This module defines the data the rule engine consumes: the `FileInfo`
/// record produced for each scanned file, and the `UnifiedMetadata` envelope
/// that merges extractor output (EXIF, PDF, Office document properties) into
/// one extractor-agnostic shape. Extraction itself happens outside this
/// crate; extractors report failure through `ExtractionStatus`, never by
/// raising an error.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Broad file category derived from the file extension (with content
/// sniffing as a fallback for extension-less files).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Video,
    Audio,
    Archive,
    Code,
    Data,
    Other,
}

impl FileCategory {
    /// Returns the directory name used when organizing by category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            FileCategory::Image => "images",
            FileCategory::Document => "documents",
            FileCategory::Video => "videos",
            FileCategory::Audio => "audio",
            FileCategory::Archive => "archives",
            FileCategory::Code => "code",
            FileCategory::Data => "data",
            FileCategory::Other => "other",
        }
    }

    /// Maps a lowercase extension (without dot) to a category.
    pub fn from_extension(extension: &str) -> FileCategory {
        match extension {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" | "heif" | "tif" | "tiff" | "bmp"
            | "svg" | "raw" | "cr2" | "nef" | "arw" => FileCategory::Image,
            "pdf" | "doc" | "docx" | "odt" | "rtf" | "txt" | "md" | "ppt" | "pptx" | "odp" => {
                FileCategory::Document
            }
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" | "wmv" => FileCategory::Video,
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "m4a" | "wma" => FileCategory::Audio,
            "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" => FileCategory::Archive,
            "rs" | "py" | "js" | "ts" | "c" | "cpp" | "h" | "go" | "java" | "rb" | "sh" => {
                FileCategory::Code
            }
            "json" | "csv" | "xml" | "yaml" | "yml" | "toml" | "xls" | "xlsx" | "ods"
            | "sqlite" | "db" => FileCategory::Data,
            _ => FileCategory::Other,
        }
    }

    /// Maps a MIME type (from content sniffing) to a category.
    fn from_mime(mime: &str) -> FileCategory {
        if mime.starts_with("image/") {
            FileCategory::Image
        } else if mime.starts_with("video/") {
            FileCategory::Video
        } else if mime.starts_with("audio/") {
            FileCategory::Audio
        } else if mime == "application/pdf" || mime.starts_with("text/") {
            FileCategory::Document
        } else if mime == "application/zip"
            || mime == "application/gzip"
            || mime == "application/x-tar"
            || mime == "application/vnd.rar"
            || mime == "application/x-7z-compressed"
        {
            FileCategory::Archive
        } else {
            FileCategory::Other
        }
    }
}

/// How much metadata an extractor can pull out of a file of this type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetadataCapability {
    None,
    Basic,
    Extended,
    Full,
}

impl MetadataCapability {
    /// Capability level for a lowercase extension.
    pub fn from_extension(extension: &str) -> MetadataCapability {
        match extension {
            // EXIF-bearing image formats
            "jpg" | "jpeg" | "tif" | "tiff" | "heic" | "heif" => MetadataCapability::Full,
            // Image formats with dimensions but little else
            "png" | "gif" | "webp" | "bmp" => MetadataCapability::Basic,
            "pdf" => MetadataCapability::Full,
            // Office Open XML carries Dublin Core + app properties
            "docx" | "xlsx" | "pptx" => MetadataCapability::Extended,
            _ => MetadataCapability::None,
        }
    }
}

/// Information about a single scanned file.
///
/// Produced by the scanner (an external collaborator); `from_path` builds a
/// record for one file without any directory traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Full path to the file.
    pub path: String,
    /// Filename without extension.
    pub name: String,
    /// File extension, lowercase, without dot. Empty when the file has none.
    pub extension: String,
    /// Full filename with extension.
    pub full_name: String,
    /// File size in bytes.
    pub size: u64,
    /// File creation timestamp.
    pub created_at: DateTime<Utc>,
    /// File modification timestamp.
    pub modified_at: DateTime<Utc>,
    /// File category based on extension (content-sniffed when absent).
    pub category: FileCategory,
    /// Whether metadata extraction is supported for this file type.
    pub metadata_supported: bool,
    /// Level of metadata the extractors can provide.
    pub metadata_capability: MetadataCapability,
}

impl FileInfo {
    /// Builds a `FileInfo` for a single file on disk.
    ///
    /// The extension decides the category; files without a recognizable
    /// extension are sniffed by content. Creation time falls back to the
    /// modification time on filesystems that do not record it.
    pub fn from_path(path: &Path) -> std::io::Result<FileInfo> {
        let stat = std::fs::metadata(path)?;
        let full_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let modified_at: DateTime<Utc> = stat.modified()?.into();
        let created_at: DateTime<Utc> = stat
            .created()
            .map(Into::into)
            .unwrap_or(modified_at);

        let mut category = FileCategory::from_extension(&extension);
        if extension.is_empty() || category == FileCategory::Other {
            if let Some(sniffed) = sniff_category(path) {
                category = sniffed;
            }
        }

        let metadata_capability = MetadataCapability::from_extension(&extension);

        Ok(FileInfo {
            path: path.to_string_lossy().to_string(),
            name,
            extension,
            full_name,
            size: stat.len(),
            created_at,
            modified_at,
            category,
            metadata_supported: metadata_capability != MetadataCapability::None,
            metadata_capability,
        })
    }
}

/// Reads the first bytes of a file and infers a category from its content.
fn sniff_category(path: &Path) -> Option<FileCategory> {
    let mut buf = [0u8; 8192];
    let mut file = File::open(path).ok()?;
    let read = file.read(&mut buf).ok()?;
    let kind = infer::get(&buf[..read])?;
    Some(FileCategory::from_mime(kind.mime_type()))
}

/// GPS coordinates from EXIF data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// EXIF metadata extracted from an image file. Every field is optional;
/// cameras and editors are inconsistent about what they write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub date_taken: Option<DateTime<Utc>>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub gps: Option<GpsCoordinates>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub orientation: Option<u32>,
    pub exposure_time: Option<String>,
    pub f_number: Option<f64>,
    pub iso: Option<u32>,
}

/// Document information dictionary of a PDF file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub page_count: Option<u32>,
}

/// Dublin Core and application properties of an Office document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub company: Option<String>,
    pub application: Option<String>,
    pub pages: Option<u32>,
    pub words: Option<u32>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Outcome of a metadata extraction attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Success,
    Partial,
    Failed,
    Unsupported,
}

/// The merged, extractor-agnostic metadata record for one file.
///
/// At most one of `image`, `pdf`, `office` is populated; all three are
/// absent when extraction was unsupported or failed. Use the constructors
/// below rather than building the struct by hand; they keep the section
/// and status consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedMetadata {
    pub file: FileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<PdfMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office: Option<OfficeMetadata>,
    pub extraction_status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

impl UnifiedMetadata {
    /// Metadata record for a successfully extracted image file.
    pub fn from_image(file: FileInfo, image: ImageMetadata) -> Self {
        Self {
            file,
            image: Some(image),
            pdf: None,
            office: None,
            extraction_status: ExtractionStatus::Success,
            extraction_error: None,
        }
    }

    /// Metadata record for a successfully extracted PDF file.
    pub fn from_pdf(file: FileInfo, pdf: PdfMetadata) -> Self {
        Self {
            file,
            image: None,
            pdf: Some(pdf),
            office: None,
            extraction_status: ExtractionStatus::Success,
            extraction_error: None,
        }
    }

    /// Metadata record for a successfully extracted Office document.
    pub fn from_office(file: FileInfo, office: OfficeMetadata) -> Self {
        Self {
            file,
            image: None,
            pdf: None,
            office: Some(office),
            extraction_status: ExtractionStatus::Success,
            extraction_error: None,
        }
    }

    /// Metadata record for a file type no extractor supports.
    pub fn unsupported(file: FileInfo) -> Self {
        Self {
            file,
            image: None,
            pdf: None,
            office: None,
            extraction_status: ExtractionStatus::Unsupported,
            extraction_error: None,
        }
    }

    /// Metadata record for a file whose extraction failed outright.
    pub fn failed(file: FileInfo, error: impl Into<String>) -> Self {
        Self {
            file,
            image: None,
            pdf: None,
            office: None,
            extraction_status: ExtractionStatus::Failed,
            extraction_error: Some(error.into()),
        }
    }

    /// Downgrades a successful record to partial, keeping the extracted
    /// section and recording what went wrong with the rest.
    pub fn partial(mut self, error: impl Into<String>) -> Self {
        self.extraction_status = ExtractionStatus::Partial;
        self.extraction_error = Some(error.into());
        self
    }

    /// True when any extractor section is populated.
    pub fn has_metadata(&self) -> bool {
        self.image.is_some() || self.pdf.is_some() || self.office.is_some()
    }
}
