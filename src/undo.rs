/// Undo for recorded batch operations.
///
/// An undo runs as a fixed pipeline over the history entry:
/// validate → reverse files → remove directories → finalize.
///
/// Validation rejects unknown and already-undone operations before anything
/// touches the filesystem. File reversal is best-effort: records whose
/// original operation failed are skipped (there is nothing to undo), and a
/// file that cannot be restored produces a per-file failure without
/// aborting the rest. Directories created by the original operation are
/// removed only when empty (user content is never force-deleted), and a
/// file now occupying an original path is backed up with a timestamp
/// suffix rather than overwritten.
///
/// Dry-run mode computes the identical result shape with zero filesystem
/// or history mutation. Once started, an undo runs to completion; there is
/// no cancellation mid-flight.
use crate::history::{FileHistoryRecord, HistoryError, HistoryManager, OperationHistoryEntry};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Skip reason for records whose original operation did not succeed.
const SKIP_ORIGINAL_FAILED: &str = "original-operation-failed";

/// Outcome for a single file of an undo.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoFileResult {
    pub original_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_path: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Complete result of an undo request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub operation_id: String,
    /// True when no file failed to restore.
    pub success: bool,
    pub dry_run: bool,
    pub files_restored: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub directories_removed: usize,
    pub files: Vec<UndoFileResult>,
    pub duration_ms: u64,
}

/// Errors that reject an undo request before any filesystem work.
#[derive(Debug)]
pub enum UndoError {
    /// No history entry with this id.
    NotFound { operation_id: String },
    /// The operation was already undone.
    AlreadyUndone { operation_id: String },
    /// The history store could not be read or written.
    History(HistoryError),
}

impl std::fmt::Display for UndoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoError::NotFound { operation_id } => {
                write!(f, "Operation not found: {}", operation_id)
            }
            UndoError::AlreadyUndone { operation_id } => {
                write!(f, "Operation already undone: {}", operation_id)
            }
            UndoError::History(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for UndoError {}

impl From<HistoryError> for UndoError {
    fn from(e: HistoryError) -> Self {
        UndoError::History(e)
    }
}

/// Reverses recorded operations.
pub struct UndoEngine<'a> {
    history: &'a HistoryManager,
}

impl<'a> UndoEngine<'a> {
    pub fn new(history: &'a HistoryManager) -> Self {
        Self { history }
    }

    /// Undoes one recorded operation, or previews the undo when `dry_run`
    /// is set.
    pub fn undo(&self, operation_id: &str, dry_run: bool) -> Result<UndoResult, UndoError> {
        let clock = Instant::now();

        // VALIDATE
        let store = self.history.load()?;
        let entry = store
            .get(operation_id)
            .cloned()
            .ok_or_else(|| UndoError::NotFound {
                operation_id: operation_id.to_string(),
            })?;
        if entry.undone_at.is_some() {
            return Err(UndoError::AlreadyUndone {
                operation_id: operation_id.to_string(),
            });
        }

        // REVERSE_FILES: last move first, so chained renames unwind cleanly
        let mut files = Vec::with_capacity(entry.files.len());
        for record in entry.files.iter().rev() {
            files.push(reverse_file(record, dry_run));
        }
        files.reverse();

        // REMOVE_DIRECTORIES
        let directories_removed = remove_created_directories(&entry, dry_run);

        let files_restored = files.iter().filter(|f| f.success).count();
        let files_skipped = files.iter().filter(|f| f.skip_reason.is_some()).count();
        let files_failed = files
            .iter()
            .filter(|f| !f.success && f.skip_reason.is_none())
            .count();
        let success = files_failed == 0;

        // FINALIZE: a failed undo stays retryable, so the flag is only
        // stamped on success
        if !dry_run && success {
            self.history
                .mark_undone(operation_id, &Utc::now().to_rfc3339())?;
        }

        Ok(UndoResult {
            operation_id: operation_id.to_string(),
            success,
            dry_run,
            files_restored,
            files_skipped,
            files_failed,
            directories_removed,
            files,
            duration_ms: clock.elapsed().as_millis() as u64,
        })
    }
}

fn reverse_file(record: &FileHistoryRecord, dry_run: bool) -> UndoFileResult {
    let base = UndoFileResult {
        original_path: record.original_path.clone(),
        current_path: record.new_path.clone(),
        success: false,
        error: None,
        skip_reason: None,
    };

    // nothing to undo for files the original operation did not move
    if !record.success || record.new_path.is_none() {
        return UndoFileResult {
            skip_reason: Some(SKIP_ORIGINAL_FAILED.to_string()),
            ..base
        };
    }

    let current = PathBuf::from(record.new_path.as_deref().unwrap_or_default());
    let original = PathBuf::from(&record.original_path);

    if !current.exists() {
        return UndoFileResult {
            error: Some("file not found at expected location".to_string()),
            ..base
        };
    }

    if dry_run {
        return UndoFileResult {
            success: true,
            ..base
        };
    }

    // a file now occupying the original path is backed up, not overwritten
    if original.exists() {
        let backup = backup_path(&original);
        if let Err(e) = fs::rename(&original, &backup) {
            return UndoFileResult {
                error: Some(format!("could not back up conflicting file: {}", e)),
                ..base
            };
        }
    }

    match fs::rename(&current, &original) {
        Ok(()) => UndoFileResult {
            success: true,
            ..base
        },
        Err(e) => UndoFileResult {
            error: Some(format!("failed to restore file: {}", e)),
            ..base
        },
    }
}

/// Removes directories the operation created, deepest first and only when
/// empty. Non-empty directories stay, silently.
fn remove_created_directories(entry: &OperationHistoryEntry, dry_run: bool) -> usize {
    let mut directories: Vec<&String> = entry.directories_created.iter().collect();
    directories.sort_by_key(|d| std::cmp::Reverse(Path::new(d.as_str()).components().count()));

    let mut removed = 0;
    for dir in directories {
        let path = Path::new(dir);
        if !path.is_dir() || !is_empty_dir(path) {
            continue;
        }
        if dry_run {
            removed += 1;
        } else if fs::remove_dir(path).is_ok() {
            removed += 1;
        }
    }
    removed
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Backup name for a conflicting file: `file.txt` → `file.txt.bak.20251109-143052`.
fn backup_path(original: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = original
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let backup_name = format!("{}.bak.{}", filename, timestamp);
    match original.parent() {
        Some(parent) => parent.join(backup_name),
        None => PathBuf::from(backup_name),
    }
}
