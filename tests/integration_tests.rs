/// Integration tests for ruletidy
///
/// These tests exercise the complete pipeline end-to-end: rule evaluation
/// and template resolution over real files, batch execution, history
/// recording, and undo.
///
/// Test categories:
/// 1. Resolution pipeline (rules → template → new name)
/// 2. Priority modes and tie-breaking across rule families
/// 3. Batch execution with partial failures
/// 4. History recording, querying and pruning
/// 5. Undo round trips and edge cases
use chrono::{TimeZone, Utc};
use ruletidy::condition::{Condition, ConditionOperator};
use ruletidy::executor::{RenameExecutor, RenamePlan};
use ruletidy::glob_match::is_glob_match;
use ruletidy::history::{HistoryManager, OperationHistoryEntry, PruneConfig, QueryOptions};
use ruletidy::metadata::{FileInfo, ImageMetadata, UnifiedMetadata};
use ruletidy::output::format_bytes;
use ruletidy::priority::{RuleFamily, RulePriorityMode};
use ruletidy::resolver::{ResolutionReason, TemplateResolver};
use ruletidy::rules::{FilenameRule, MatchMode, MetadataPatternRule};
use ruletidy::template::{RenderOptions, Template, render_stem};
use ruletidy::undo::{UndoEngine, UndoError};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture with a temporary working directory and an isolated
/// history store.
struct TestFixture {
    temp_dir: TempDir,
    history: HistoryManager,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let history = HistoryManager::new(temp_dir.path().join("history.json"));
        TestFixture { temp_dir, history }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file with content in the test directory.
    fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let file_path = self.path().join(name);
        fs::write(&file_path, content).expect("Failed to create file");
        file_path
    }

    /// Execute plans and record the batch in history, returning the id.
    fn apply_and_record(&self, plans: &[RenamePlan]) -> String {
        let result = RenameExecutor::execute(plans);
        let entry = OperationHistoryEntry::from_batch(&result);
        let id = entry.id.clone();
        self.history
            .record(entry, PruneConfig::default())
            .expect("Failed to record history");
        id
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.exists(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }
}

/// Metadata for a Canon photo, as an external EXIF extractor would
/// produce it.
fn canon_photo(path: &Path) -> UnifiedMetadata {
    let file = FileInfo::from_path(path).expect("Failed to stat file");
    UnifiedMetadata::from_image(
        file,
        ImageMetadata {
            camera_make: Some("Canon".to_string()),
            date_taken: Some(Utc.with_ymd_and_hms(2023, 6, 15, 10, 30, 0).unwrap()),
            ..Default::default()
        },
    )
}

fn canon_rule(template_id: &str, priority: i32) -> MetadataPatternRule {
    MetadataPatternRule::new(
        "Canon photos",
        vec![Condition::new(
            "image.cameraMake",
            ConditionOperator::Equals,
            json!("Canon"),
        )],
        MatchMode::All,
        template_id,
    )
    .with_priority(priority)
}

fn template_with_id(id: &str, pattern: &str) -> Template {
    let mut template = Template::new(id, pattern);
    template.id = id.to_string();
    template
}

// ============================================================================
// 1. Resolution pipeline
// ============================================================================

#[test]
fn test_full_pipeline_metadata_rule_to_rename() {
    let fx = TestFixture::new();
    let photo = fx.create_file("IMG_0001.jpg", "fake image data");
    let metadata = canon_photo(&photo);

    let templates = vec![template_with_id("tpl-camera", "{camera}-{date}-{name}")];
    let rules = vec![canon_rule("tpl-camera", 10)];

    let resolver = TemplateResolver::new(RulePriorityMode::Combined);
    let resolution = resolver.resolve_template(&metadata, &rules, &[], &templates);
    assert_eq!(resolution.template_id.as_deref(), Some("tpl-camera"));
    assert!(matches!(resolution.reason, ResolutionReason::RuleMatch { .. }));

    let stem = render_stem(
        "{camera}-{date}-{name}",
        &metadata,
        &RenderOptions::default(),
    )
    .expect("render failed");
    assert_eq!(stem, "Canon-2023-06-15-IMG_0001");

    let plan = RenamePlan {
        original_path: photo,
        new_name: format!("{}.jpg", stem),
        destination_dir: None,
    };
    let result = RenameExecutor::execute(&[plan]);
    assert!(result.success);
    fx.assert_file_exists("Canon-2023-06-15-IMG_0001.jpg");
    fx.assert_file_not_exists("IMG_0001.jpg");
}

#[test]
fn test_filename_rule_pipeline_without_metadata() {
    let fx = TestFixture::new();
    let shot = fx.create_file("Screenshot 2024-01-05.png", "pixels");
    let file = FileInfo::from_path(&shot).expect("Failed to stat file");
    let metadata = UnifiedMetadata::unsupported(file);

    let templates = vec![template_with_id("tpl-shots", "{date}-{name}")];
    let filename_rules = vec![FilenameRule::new("screenshots", "Screenshot*", "tpl-shots")];

    let resolver = TemplateResolver::new(RulePriorityMode::Combined);
    let resolution = resolver.resolve_template(&metadata, &[], &filename_rules, &templates);

    assert_eq!(resolution.template_id.as_deref(), Some("tpl-shots"));
    assert_eq!(resolution.matched_family, Some(RuleFamily::Filename));
}

#[test]
fn test_no_match_reports_default_fallback() {
    let fx = TestFixture::new();
    let doc = fx.create_file("notes.txt", "text");
    let metadata = UnifiedMetadata::unsupported(FileInfo::from_path(&doc).unwrap());

    let default = template_with_id("tpl-default", "{name}").as_default();
    let resolver = TemplateResolver::new(RulePriorityMode::Combined);

    let resolution = resolver.resolve_template(&metadata, &[], &[], &[default]);
    assert_eq!(resolution.reason, ResolutionReason::DefaultFallback);
    assert_eq!(resolution.template_id.as_deref(), Some("tpl-default"));

    let resolution = resolver.resolve_template(&metadata, &[], &[], &[]);
    assert_eq!(resolution.reason, ResolutionReason::NoDefaultAvailable);
    assert!(resolution.template_id.is_none());
}

// ============================================================================
// 2. Priority modes and ties
// ============================================================================

#[test]
fn test_metadata_first_never_yields_to_filename_rule() {
    let fx = TestFixture::new();
    let photo = fx.create_file("IMG_0002.jpg", "fake image data");
    let metadata = canon_photo(&photo);

    let rules = vec![canon_rule("tpl-metadata", 1)];
    let filename_rules =
        vec![FilenameRule::new("jpgs", "{jpg,jpeg}", "tpl-filename").with_priority(1000)];

    let resolver = TemplateResolver::new(RulePriorityMode::MetadataFirst);
    let resolution = resolver.resolve_template(&metadata, &rules, &filename_rules, &[]);

    assert_eq!(resolution.template_id.as_deref(), Some("tpl-metadata"));
    assert_eq!(resolution.matched_family, Some(RuleFamily::Metadata));
}

#[test]
fn test_combined_equal_priority_earlier_metadata_rule_wins() {
    let fx = TestFixture::new();
    let photo = fx.create_file("IMG_0003.jpg", "fake image data");
    let metadata = canon_photo(&photo);

    // two metadata rules at the same priority, both matching
    let rule_a = canon_rule("tpl-a", 5);
    let rule_b = canon_rule("tpl-b", 5);

    let resolver = TemplateResolver::new(RulePriorityMode::Combined);
    let resolution = resolver.resolve_template(&metadata, &[rule_a, rule_b], &[], &[]);
    assert_eq!(resolution.template_id.as_deref(), Some("tpl-a"));
}

#[test]
fn test_glob_match_scenarios() {
    assert!(is_glob_match("{jpg,png}", "photo.png").unwrap());
    assert!(!is_glob_match("{jpg,png}", "photo.gif").unwrap());
}

#[test]
fn test_format_bytes_scenarios() {
    assert_eq!(format_bytes(1536), "1.50 KB");
    assert_eq!(format_bytes(0), "0 B");
}

// ============================================================================
// 3. Batch execution with partial failures
// ============================================================================

#[test]
fn test_batch_partial_failure_summary_and_undo_skip() {
    let fx = TestFixture::new();
    let one = fx.create_file("one.txt", "1");
    let three = fx.create_file("three.txt", "3");

    let plans = vec![
        RenamePlan {
            original_path: one.clone(),
            new_name: "one-renamed.txt".to_string(),
            destination_dir: None,
        },
        // file #2 does not exist, so its rename fails
        RenamePlan {
            original_path: fx.path().join("two.txt"),
            new_name: "two-renamed.txt".to_string(),
            destination_dir: None,
        },
        RenamePlan {
            original_path: three.clone(),
            new_name: "three-renamed.txt".to_string(),
            destination_dir: None,
        },
    ];

    let result = RenameExecutor::execute(&plans);
    assert_eq!(result.summary.total, 3);
    assert_eq!(result.summary.succeeded, 2);
    assert_eq!(result.summary.skipped, 0);
    assert_eq!(result.summary.failed, 1);

    let entry = OperationHistoryEntry::from_batch(&result);
    assert_eq!(entry.file_count, 3);
    assert!(!entry.files[1].success);
    assert_eq!(
        entry.summary.succeeded + entry.summary.skipped + entry.summary.failed,
        entry.file_count
    );

    let id = entry.id.clone();
    fx.history
        .record(entry, PruneConfig::default())
        .expect("Failed to record history");

    // undo restores #1 and #3 and skips #2
    let engine = UndoEngine::new(&fx.history);
    let undo = engine.undo(&id, false).expect("undo failed");
    assert!(undo.success);
    assert_eq!(undo.files_restored, 2);
    assert_eq!(undo.files_skipped, 1);
    assert_eq!(
        undo.files[1].skip_reason.as_deref(),
        Some("original-operation-failed")
    );
    fx.assert_file_exists("one.txt");
    fx.assert_file_exists("three.txt");
}

// ============================================================================
// 4. History
// ============================================================================

#[test]
fn test_history_records_newest_first_and_queries() {
    let fx = TestFixture::new();
    let a = fx.create_file("a.txt", "a");
    let first = fx.apply_and_record(&[RenamePlan {
        original_path: a,
        new_name: "a2.txt".to_string(),
        destination_dir: None,
    }]);

    let b = fx.create_file("b.txt", "b");
    let second = fx.apply_and_record(&[RenamePlan {
        original_path: b,
        new_name: "b2.txt".to_string(),
        destination_dir: None,
    }]);

    let store = fx.history.load().expect("load failed");
    assert_eq!(store.entries.len(), 2);
    assert_eq!(store.entries[0].id, second);
    assert_eq!(store.entries[1].id, first);

    let limited = store.query(QueryOptions {
        limit: Some(1),
        operation_type: None,
    });
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second);
}

#[test]
fn test_prune_is_idempotent_on_disk() {
    let fx = TestFixture::new();
    for i in 0..5 {
        let f = fx.create_file(&format!("f{}.txt", i), "x");
        fx.apply_and_record(&[RenamePlan {
            original_path: f,
            new_name: format!("f{}-renamed.txt", i),
            destination_dir: None,
        }]);
    }

    let config = PruneConfig {
        max_entries: Some(2),
        max_age_days: Some(30),
    };
    let removed = fx.history.prune(config).expect("prune failed");
    assert_eq!(removed, 3);

    let ids_after_first: Vec<String> = fx
        .history
        .load()
        .unwrap()
        .entries
        .iter()
        .map(|e| e.id.clone())
        .collect();

    let removed_again = fx.history.prune(config).expect("prune failed");
    assert_eq!(removed_again, 0);

    let ids_after_second: Vec<String> = fx
        .history
        .load()
        .unwrap()
        .entries
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(ids_after_first, ids_after_second);
}

// ============================================================================
// 5. Undo round trips
// ============================================================================

#[test]
fn test_organize_then_undo_round_trip() {
    let fx = TestFixture::new();
    let photo = fx.create_file("holiday.jpg", "img");
    let dest = fx.path().join("2023").join("06");

    let id = fx.apply_and_record(&[RenamePlan {
        original_path: photo.clone(),
        new_name: "2023-06-15-holiday.jpg".to_string(),
        destination_dir: Some(dest.clone()),
    }]);

    assert!(dest.join("2023-06-15-holiday.jpg").exists());

    let engine = UndoEngine::new(&fx.history);

    // dry run first: same counts, no mutation
    let preview = engine.undo(&id, true).expect("dry run failed");
    assert!(preview.dry_run);
    assert_eq!(preview.files_restored, 1);
    assert!(dest.join("2023-06-15-holiday.jpg").exists());

    let result = engine.undo(&id, false).expect("undo failed");
    assert!(result.success);
    assert_eq!(result.directories_removed, 2);
    fx.assert_file_exists("holiday.jpg");
    assert!(!fx.path().join("2023").exists());
}

#[test]
fn test_undo_twice_is_rejected() {
    let fx = TestFixture::new();
    let a = fx.create_file("a.txt", "a");
    let id = fx.apply_and_record(&[RenamePlan {
        original_path: a,
        new_name: "a2.txt".to_string(),
        destination_dir: None,
    }]);

    let engine = UndoEngine::new(&fx.history);
    engine.undo(&id, false).expect("first undo failed");

    assert!(matches!(
        engine.undo(&id, false),
        Err(UndoError::AlreadyUndone { .. })
    ));
}
