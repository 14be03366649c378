/// Batch rename/move execution.
///
/// The executor consumes per-file plans (new name, optional destination
/// directory) that template resolution produced, performs the filesystem
/// work, and reports per-file outcomes plus the directories it created,
/// the exact shape the history store records for undo.
///
/// Failures are per-file: one file failing never aborts the rest of the
/// batch, and an existing file at the target path is never overwritten
/// (the plan is skipped instead).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One planned rename/move.
#[derive(Debug, Clone)]
pub struct RenamePlan {
    /// Full path of the file to rename.
    pub original_path: PathBuf,
    /// New filename, with extension.
    pub new_name: String,
    /// Destination directory; `None` renames in place.
    pub destination_dir: Option<PathBuf>,
}

/// Outcome of a single planned rename.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenameOutcome {
    Success,
    Failed,
    Skipped,
}

/// Result of one file's rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRenameResult {
    pub original_path: String,
    pub original_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    pub outcome: RenameOutcome,
    /// Whether the file left its original directory.
    pub moved_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts of a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatchRenameSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Complete result of a batch rename operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRenameResult {
    /// True when no file failed.
    pub success: bool,
    pub results: Vec<FileRenameResult>,
    pub summary: BatchRenameSummary,
    /// Directories created for moves, in creation order.
    #[serde(default)]
    pub directories_created: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Executes rename plans against the filesystem.
pub struct RenameExecutor;

impl RenameExecutor {
    /// Runs every plan in order. Plans fail or skip individually; the batch
    /// always runs to completion.
    pub fn execute(plans: &[RenamePlan]) -> BatchRenameResult {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut results = Vec::with_capacity(plans.len());
        let mut directories_created = Vec::new();

        for plan in plans {
            results.push(Self::execute_plan(plan, &mut directories_created));
        }

        let summary = BatchRenameSummary {
            total: results.len(),
            succeeded: results
                .iter()
                .filter(|r| r.outcome == RenameOutcome::Success)
                .count(),
            failed: results
                .iter()
                .filter(|r| r.outcome == RenameOutcome::Failed)
                .count(),
            skipped: results
                .iter()
                .filter(|r| r.outcome == RenameOutcome::Skipped)
                .count(),
        };

        BatchRenameResult {
            success: summary.failed == 0,
            results,
            summary,
            directories_created,
            started_at,
            completed_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
        }
    }

    fn execute_plan(plan: &RenamePlan, directories_created: &mut Vec<String>) -> FileRenameResult {
        let source = &plan.original_path;
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let moved_directory = plan.destination_dir.is_some();

        let base = FileRenameResult {
            original_path: source.to_string_lossy().to_string(),
            original_name,
            new_path: None,
            new_name: None,
            outcome: RenameOutcome::Failed,
            moved_directory,
            error: None,
        };

        if !source.exists() {
            return FileRenameResult {
                error: Some("source file not found".to_string()),
                ..base
            };
        }

        let dest_dir = match &plan.destination_dir {
            Some(dir) => dir.clone(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let target = dest_dir.join(&plan.new_name);

        if target == *source {
            return FileRenameResult {
                outcome: RenameOutcome::Skipped,
                ..base
            };
        }
        if target.exists() {
            return FileRenameResult {
                outcome: RenameOutcome::Skipped,
                error: Some(format!("target already exists: {}", target.display())),
                ..base
            };
        }

        if !dest_dir.exists()
            && let Err(e) = create_dirs_recording(&dest_dir, directories_created)
        {
            return FileRenameResult {
                error: Some(format!("failed to create {}: {}", dest_dir.display(), e)),
                ..base
            };
        }

        match fs::rename(source, &target) {
            Ok(()) => FileRenameResult {
                new_path: Some(target.to_string_lossy().to_string()),
                new_name: Some(plan.new_name.clone()),
                outcome: RenameOutcome::Success,
                ..base
            },
            Err(e) => FileRenameResult {
                error: Some(e.to_string()),
                ..base
            },
        }
    }
}

/// Creates a directory and its missing ancestors, recording each directory
/// that did not exist before (outermost first) so undo can remove them.
fn create_dirs_recording(dir: &Path, created: &mut Vec<String>) -> std::io::Result<()> {
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(dir);
    while let Some(current) = cursor {
        if current.exists() || current.as_os_str().is_empty() {
            break;
        }
        missing.push(current.to_path_buf());
        cursor = current.parent();
    }
    fs::create_dir_all(dir)?;
    for path in missing.into_iter().rev() {
        created.push(path.to_string_lossy().to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plan(source: &Path, new_name: &str) -> RenamePlan {
        RenamePlan {
            original_path: source.to_path_buf(),
            new_name: new_name.to_string(),
            destination_dir: None,
        }
    }

    #[test]
    fn test_rename_in_place() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("a.txt");
        fs::write(&source, "x").expect("Failed to write test file");

        let result = RenameExecutor::execute(&[plan(&source, "b.txt")]);
        assert!(result.success);
        assert_eq!(result.summary.succeeded, 1);
        assert!(!source.exists());
        assert!(dir.path().join("b.txt").exists());
        assert_eq!(result.results[0].new_name.as_deref(), Some("b.txt"));
    }

    #[test]
    fn test_existing_target_is_skipped_not_overwritten() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("a.txt");
        let target = dir.path().join("b.txt");
        fs::write(&source, "source").expect("Failed to write source");
        fs::write(&target, "target").expect("Failed to write target");

        let result = RenameExecutor::execute(&[plan(&source, "b.txt")]);
        assert_eq!(result.summary.skipped, 1);
        assert!(source.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "target");
    }

    #[test]
    fn test_move_creates_and_records_directories() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("photo.jpg");
        fs::write(&source, "img").expect("Failed to write test file");

        let dest = dir.path().join("2023").join("06");
        let result = RenameExecutor::execute(&[RenamePlan {
            original_path: source.clone(),
            new_name: "photo.jpg".to_string(),
            destination_dir: Some(dest.clone()),
        }]);

        assert!(result.success);
        assert!(dest.join("photo.jpg").exists());
        assert_eq!(result.directories_created.len(), 2);
        // outermost first
        assert!(result.directories_created[0].ends_with("2023"));
        assert!(result.results[0].moved_directory);
    }

    #[test]
    fn test_partial_failure_keeps_going() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let a = dir.path().join("a.txt");
        let c = dir.path().join("c.txt");
        fs::write(&a, "a").expect("Failed to write a");
        fs::write(&c, "c").expect("Failed to write c");

        let plans = vec![
            plan(&a, "a-renamed.txt"),
            plan(&dir.path().join("missing.txt"), "m-renamed.txt"),
            plan(&c, "c-renamed.txt"),
        ];
        let result = RenameExecutor::execute(&plans);

        assert!(!result.success);
        assert_eq!(result.summary.total, 3);
        assert_eq!(result.summary.succeeded, 2);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.skipped, 0);
        assert_eq!(result.results[1].outcome, RenameOutcome::Failed);
        assert!(dir.path().join("a-renamed.txt").exists());
        assert!(dir.path().join("c-renamed.txt").exists());
    }

    #[test]
    fn test_unchanged_name_is_skipped() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("same.txt");
        fs::write(&source, "x").expect("Failed to write test file");

        let result = RenameExecutor::execute(&[plan(&source, "same.txt")]);
        assert_eq!(result.summary.skipped, 1);
        assert!(source.exists());
    }
}
