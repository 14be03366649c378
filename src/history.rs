/// Operation history: the durable record of batch rename/move operations.
///
/// Every applied batch appends one entry holding the per-file outcomes and
/// the directories the operation created: everything the undo engine needs
/// to reverse it. Entries are stored newest-first in a single JSON file and
/// are immutable once written, except for `undoneAt`, which a successful
/// undo sets exactly once.
///
/// The backing file is a shared resource: loads take a shared lock, and all
/// mutations go through an exclusive-locked read-modify-write so concurrent
/// processes cannot interleave partial updates. Old stores (version 1 kept
/// a boolean `undone` flag) are migrated in place on load.
use crate::executor::{BatchRenameResult, RenameOutcome};
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current schema version of the history file.
pub const HISTORY_VERSION: u32 = 2;

/// Kind of batch operation recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Rename,
    Move,
    Organize,
}

/// Record of a single file within an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHistoryRecord {
    pub original_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    pub is_move_operation: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(default)]
    pub directories_created: usize,
}

/// One recorded batch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHistoryEntry {
    /// Unique identifier (UUID).
    pub id: String,
    /// RFC 3339 timestamp of when the operation completed.
    pub timestamp: String,
    pub operation_type: OperationType,
    pub file_count: usize,
    pub summary: OperationSummary,
    pub duration_ms: u64,
    pub files: Vec<FileHistoryRecord>,
    /// Directories the operation created, for undo cleanup.
    #[serde(default)]
    pub directories_created: Vec<String>,
    /// Set exactly once by a successful undo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undone_at: Option<String>,
}

impl OperationHistoryEntry {
    /// Builds a history entry from a finished batch.
    pub fn from_batch(result: &BatchRenameResult) -> Self {
        let files: Vec<FileHistoryRecord> = result
            .results
            .iter()
            .map(|r| FileHistoryRecord {
                original_path: r.original_path.clone(),
                new_path: r.new_path.clone(),
                is_move_operation: r.moved_directory,
                success: r.outcome == RenameOutcome::Success,
                error: r.error.clone(),
            })
            .collect();

        let operation_type = if result.results.iter().any(|r| r.moved_directory) {
            OperationType::Organize
        } else {
            OperationType::Rename
        };

        OperationHistoryEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            operation_type,
            file_count: result.results.len(),
            summary: OperationSummary {
                succeeded: result.summary.succeeded,
                skipped: result.summary.skipped,
                failed: result.summary.failed,
                directories_created: result.directories_created.len(),
            },
            duration_ms: result.duration_ms,
            files,
            directories_created: result.directories_created.clone(),
            undone_at: None,
        }
    }
}

/// Thresholds for pruning old entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneConfig {
    /// Keep at most this many entries.
    pub max_entries: Option<usize>,
    /// Drop entries older than this many days.
    pub max_age_days: Option<i64>,
}

/// Filters for querying entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub limit: Option<usize>,
    pub operation_type: Option<OperationType>,
}

/// The persisted store: entries newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStore {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pruned: Option<String>,
    pub last_modified: String,
    pub entries: Vec<OperationHistoryEntry>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            last_pruned: None,
            last_modified: Utc::now().to_rfc3339(),
            entries: Vec::new(),
        }
    }
}

impl HistoryStore {
    /// Appends an entry at the front (newest-first order).
    pub fn record(&mut self, entry: OperationHistoryEntry) {
        self.entries.insert(0, entry);
    }

    pub fn get(&self, id: &str) -> Option<&OperationHistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries matching the query, newest first.
    pub fn query(&self, options: QueryOptions) -> Vec<&OperationHistoryEntry> {
        let filtered = self
            .entries
            .iter()
            .filter(|e| match options.operation_type {
                Some(t) => e.operation_type == t,
                None => true,
            });
        match options.limit {
            Some(limit) => filtered.take(limit).collect(),
            None => filtered.collect(),
        }
    }

    /// Removes entries beyond the count or age thresholds and stamps
    /// `last_pruned`. Returns how many entries were removed. Pruning again
    /// with the same config removes nothing.
    pub fn prune(&mut self, config: PruneConfig) -> usize {
        let before = self.entries.len();

        if let Some(max_age_days) = config.max_age_days {
            let cutoff = Utc::now() - Duration::days(max_age_days);
            self.entries.retain(|e| entry_time(e) >= cutoff);
        }
        if let Some(max_entries) = config.max_entries
            && self.entries.len() > max_entries
        {
            self.entries.truncate(max_entries);
        }

        self.last_pruned = Some(Utc::now().to_rfc3339());
        before - self.entries.len()
    }

    /// Stamps `undone_at` on an entry. Returns false when the entry was
    /// already undone.
    pub fn mark_undone(&mut self, id: &str, at: &str) -> Result<bool, HistoryError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| HistoryError::EntryNotFound(id.to_string()))?;
        if entry.undone_at.is_some() {
            return Ok(false);
        }
        entry.undone_at = Some(at.to_string());
        Ok(true)
    }
}

/// Parses an entry's timestamp; unparseable timestamps sort as "now" so a
/// corrupted field never gets an entry pruned by age.
fn entry_time(entry: &OperationHistoryEntry) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Errors from loading or saving the history file.
#[derive(Debug)]
pub enum HistoryError {
    LoadFailed(String),
    SaveFailed(String),
    EntryNotFound(String),
    LockFailed(String),
    Io(std::io::Error),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::LoadFailed(msg) => write!(f, "Failed to load history: {}", msg),
            HistoryError::SaveFailed(msg) => write!(f, "Failed to save history: {}", msg),
            HistoryError::EntryNotFound(id) => write!(f, "History entry not found: {}", id),
            HistoryError::LockFailed(msg) => write!(f, "Failed to lock history file: {}", msg),
            HistoryError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        HistoryError::Io(e)
    }
}

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// File-backed history manager.
pub struct HistoryManager {
    path: PathBuf,
}

impl HistoryManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The default history file location, `history.json` in the
    /// configuration directory.
    pub fn default_path() -> PathBuf {
        crate::config::config_dir().join("history.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the store for read-only use, migrating old versions in memory.
    pub fn load(&self) -> HistoryResult<HistoryStore> {
        if !self.path.exists() {
            return Ok(HistoryStore::default());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()
            .map_err(|e| HistoryError::LockFailed(format!("shared lock: {}", e)))?;
        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        reader.read_to_string(&mut contents)?;
        // lock released when the file handle drops

        if contents.trim().is_empty() {
            return Ok(HistoryStore::default());
        }
        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| HistoryError::LoadFailed(e.to_string()))?;
        migrate_store(value)
    }

    /// Records an entry, pruning by count in the same write.
    pub fn record(
        &self,
        entry: OperationHistoryEntry,
        prune: PruneConfig,
    ) -> HistoryResult<()> {
        self.with_locked_store(move |store| {
            store.record(entry);
            if prune.max_entries.is_some() || prune.max_age_days.is_some() {
                store.prune(prune);
            }
            Ok(())
        })
    }

    /// Prunes the persisted store. Returns the number of entries removed.
    pub fn prune(&self, config: PruneConfig) -> HistoryResult<usize> {
        self.with_locked_store(move |store| Ok(store.prune(config)))
    }

    /// Stamps `undone_at` on an entry.
    pub fn mark_undone(&self, id: &str, at: &str) -> HistoryResult<bool> {
        let id = id.to_string();
        let at = at.to_string();
        self.with_locked_store(move |store| store.mark_undone(&id, &at))
    }

    /// Atomic read-modify-write on the store under an exclusive lock.
    ///
    /// The full store is read, mutated and rewritten while the lock is
    /// held, so concurrent writers serialize and a reader never observes a
    /// partial update.
    pub fn with_locked_store<F, T>(&self, modify: F) -> HistoryResult<T>
    where
        F: FnOnce(&mut HistoryStore) -> HistoryResult<T>,
    {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()
            .map_err(|e| HistoryError::LockFailed(format!("exclusive lock: {}", e)))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut store = if contents.trim().is_empty() {
            HistoryStore::default()
        } else {
            let value: Value = serde_json::from_str(&contents)
                .map_err(|e| HistoryError::LoadFailed(e.to_string()))?;
            migrate_store(value)?
        };

        let result = modify(&mut store)?;
        store.last_modified = Utc::now().to_rfc3339();

        let serialized = serde_json::to_string_pretty(&store)
            .map_err(|e| HistoryError::SaveFailed(e.to_string()))?;
        file.seek(std::io::SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;

        Ok(result)
    }
}

/// Upgrades a raw store document to the current schema.
///
/// Version 1 stores carried `version: "1.0"` and a per-entry boolean
/// `undone`; the exact undo instant was never recorded, so the store's last
/// write time is the closest known bound.
fn migrate_store(mut value: Value) -> HistoryResult<HistoryStore> {
    let version_is_string = value["version"].is_string();
    let version_num = value["version"].as_u64();
    let is_v1 = version_is_string || version_num == Some(1);

    if is_v1 {
        let last_modified = value["lastModified"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if let Some(entries) = value["entries"].as_array_mut() {
            for entry in entries {
                let Some(obj) = entry.as_object_mut() else {
                    return Err(HistoryError::LoadFailed(
                        "history entry is not an object".to_string(),
                    ));
                };
                let undone = obj
                    .remove("undone")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if undone {
                    obj.insert("undoneAt".to_string(), Value::String(last_modified.clone()));
                }
                // v1 wrote nullable fields explicitly; strip the nulls so
                // the typed deserialization sees them as absent
                if obj.get("directoriesCreated").is_some_and(Value::is_null) {
                    obj.remove("directoriesCreated");
                }
                if let Some(summary) = obj.get_mut("summary").and_then(Value::as_object_mut)
                    && summary.get("directoriesCreated").is_some_and(Value::is_null)
                {
                    summary.remove("directoriesCreated");
                }
            }
        }

        let Some(root) = value.as_object_mut() else {
            return Err(HistoryError::LoadFailed(
                "history store is not an object".to_string(),
            ));
        };
        root.insert("version".to_string(), Value::from(HISTORY_VERSION));
        if !root.contains_key("lastModified") {
            root.insert(
                "lastModified".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
    } else if let Some(v) = version_num {
        if v as u32 > HISTORY_VERSION {
            return Err(HistoryError::LoadFailed(format!(
                "unsupported history version {}",
                v
            )));
        }
    } else {
        return Err(HistoryError::LoadFailed(
            "missing history version".to_string(),
        ));
    }

    serde_json::from_value(value).map_err(|e| HistoryError::LoadFailed(e.to_string()))
}
