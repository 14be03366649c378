//! Command-line interface for ruletidy.
//!
//! Wires the pipeline together: scan a folder, resolve the naming template
//! for each file through the rule engine, execute the batch, record it in
//! history, and expose history/undo/rule-priority commands. Metadata
//! extraction plugs in externally; rules over `file.*` fields and filename
//! globs are fully evaluated here.

use crate::config::AppConfig;
use crate::executor::{RenameExecutor, RenamePlan, RenameOutcome};
use crate::history::{HistoryManager, OperationHistoryEntry, OperationType, PruneConfig, QueryOptions};
use crate::metadata::{FileInfo, UnifiedMetadata};
use crate::output::{OutputFormatter, format_bytes};
use crate::resolver::{ResolutionReason, TemplateResolver};
use crate::template::{RenderOptions, find_template, render_folder_path, render_stem};
use crate::undo::UndoEngine;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rule-driven file renaming and organization with undo support.
#[derive(Debug, Parser)]
#[command(name = "ruletidy", version, about)]
pub struct Cli {
    /// Path to a configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show what a rename would do, without touching any file.
    Preview {
        /// Directory to scan.
        directory: PathBuf,
        /// Also move files into a configured folder structure (by name).
        #[arg(long)]
        organize: Option<String>,
    },
    /// Rename files according to the configured rules.
    Apply {
        /// Directory to scan.
        directory: PathBuf,
        /// Also move files into a configured folder structure (by name).
        #[arg(long)]
        organize: Option<String>,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// List recorded operations.
    History {
        /// Show at most this many entries.
        #[arg(long)]
        limit: Option<usize>,
        /// Filter by operation type (rename, move, organize).
        #[arg(long = "type")]
        operation_type: Option<String>,
    },
    /// Undo a recorded operation.
    Undo {
        /// Operation id from `history`.
        operation_id: String,
        /// Preview the undo without changing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the unified rule evaluation order and priority ties.
    Rules,
}

/// Entry point for the CLI. Returns an error message for the process to
/// surface with a non-zero exit status.
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;

    match cli.command {
        Command::Preview {
            directory,
            organize,
        } => preview(&directory, &config, organize.as_deref()),
        Command::Apply {
            directory,
            organize,
            yes,
        } => apply(&directory, &config, organize.as_deref(), yes),
        Command::History {
            limit,
            operation_type,
        } => show_history(limit, operation_type.as_deref()),
        Command::Undo {
            operation_id,
            dry_run,
        } => undo(&operation_id, dry_run),
        Command::Rules => show_rules(&config),
    }
}

/// A file with its resolved rename plan (or the reason there is none).
struct ResolvedFile {
    file: FileInfo,
    plan: Option<RenamePlan>,
    note: Option<String>,
}

/// Looks up an enabled folder structure by name.
fn find_structure<'a>(
    config: &'a AppConfig,
    name: &str,
) -> Result<&'a crate::config::FolderStructure, String> {
    config
        .folder_structures
        .iter()
        .filter(|s| s.enabled)
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("No enabled folder structure named '{}'", name))
}

/// Scans a directory (one level, files only) and resolves each file
/// through the rule engine.
fn resolve_directory(
    directory: &Path,
    config: &AppConfig,
    organize: Option<&str>,
) -> Result<Vec<ResolvedFile>, String> {
    if !directory.is_dir() {
        return Err(format!("Not a directory: {}", directory.display()));
    }
    let structure = organize.map(|name| find_structure(config, name)).transpose()?;

    let resolver = TemplateResolver::new(config.preferences.rule_priority_mode);
    let render_options = RenderOptions::default();

    let mut entries: Vec<PathBuf> = std::fs::read_dir(directory)
        .map_err(|e| format!("Error reading directory {}: {}", directory.display(), e))?
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    entries.sort();

    let pb = OutputFormatter::create_progress_bar(entries.len() as u64);
    pb.set_message("scanning");

    let mut resolved = Vec::new();
    for path in entries {
        pb.inc(1);
        let file = match FileInfo::from_path(&path) {
            Ok(file) => file,
            Err(e) => {
                OutputFormatter::warning(&format!("Skipping {}: {}", path.display(), e));
                continue;
            }
        };

        // metadata extraction is an external capability; rules over file
        // fields and filename globs are evaluated either way
        let metadata = UnifiedMetadata::unsupported(file.clone());

        let destination_dir = match structure {
            Some(s) => match render_folder_path(&s.pattern, &metadata, &render_options) {
                Ok(relative) => Some(directory.join(relative)),
                Err(e) => {
                    resolved.push(ResolvedFile {
                        file,
                        plan: None,
                        note: Some(format!("missing data for folder pattern: {}", e)),
                    });
                    continue;
                }
            },
            None => None,
        };

        let resolution = resolver.resolve_template(
            &metadata,
            &config.rules,
            &config.filename_rules,
            &config.templates,
        );

        let (plan, note) = match &resolution.template_id {
            Some(template_id) => match find_template(&config.templates, template_id) {
                Some(template) if template.applies_to(&file.extension) => {
                    match render_stem(&template.pattern, &metadata, &render_options) {
                        Ok(stem) => {
                            let new_name = if file.extension.is_empty() {
                                stem
                            } else {
                                format!("{}.{}", stem, file.extension)
                            };
                            let plan = RenamePlan {
                                original_path: path.clone(),
                                new_name,
                                destination_dir: destination_dir.clone(),
                            };
                            (Some(plan), Some(describe_reason(&resolution.reason)))
                        }
                        Err(e) => (None, Some(format!("missing data: {}", e))),
                    }
                }
                Some(_) => (None, Some("template does not apply to this file type".to_string())),
                None => (None, Some(format!("unknown template: {}", template_id))),
            },
            None => (None, Some(describe_reason(&resolution.reason))),
        };

        resolved.push(ResolvedFile { file, plan, note });
    }
    pb.finish_and_clear();
    Ok(resolved)
}

fn describe_reason(reason: &ResolutionReason) -> String {
    match reason {
        ResolutionReason::RuleMatch { rule_id } => format!("rule {}", rule_id),
        ResolutionReason::DefaultFallback => "default template".to_string(),
        ResolutionReason::NoDefaultAvailable => "no rule matched, no default template".to_string(),
    }
}

/// Whether a plan actually changes anything (name or directory).
fn plan_changes_file(plan: &RenamePlan, file: &FileInfo) -> bool {
    plan.destination_dir.is_some() || plan.new_name != file.full_name
}

fn preview(directory: &Path, config: &AppConfig, organize: Option<&str>) -> Result<(), String> {
    OutputFormatter::dry_run_notice(&format!("Analyzing {}", directory.display()));
    let resolved = resolve_directory(directory, config, organize)?;

    if resolved.is_empty() {
        OutputFormatter::plain("No files found.");
        return Ok(());
    }

    let mut would_rename = 0;
    for item in &resolved {
        let size = format_bytes(item.file.size);
        match &item.plan {
            Some(plan) if plan_changes_file(plan, &item.file) => {
                let target = match &plan.destination_dir {
                    Some(dir) => format!("{}", dir.join(&plan.new_name).display()),
                    None => plan.new_name.clone(),
                };
                OutputFormatter::plain(&format!(
                    " - {} ({}) → {}",
                    item.file.full_name, size, target
                ));
                would_rename += 1;
            }
            Some(_) => {
                OutputFormatter::plain(&format!(" - {} ({}): unchanged", item.file.full_name, size));
            }
            None => {
                OutputFormatter::plain(&format!(
                    " - {} ({}): skipped ({})",
                    item.file.full_name,
                    size,
                    item.note.as_deref().unwrap_or("no template")
                ));
            }
        }
    }

    OutputFormatter::plain("");
    OutputFormatter::success(&format!(
        "Dry run complete. {} of {} files would be renamed.",
        would_rename,
        resolved.len()
    ));
    Ok(())
}

fn apply(
    directory: &Path,
    config: &AppConfig,
    organize: Option<&str>,
    yes: bool,
) -> Result<(), String> {
    OutputFormatter::info(&format!("Organizing {}", directory.display()));
    let resolved = resolve_directory(directory, config, organize)?;

    let plans: Vec<RenamePlan> = resolved
        .iter()
        .filter(|r| {
            r.plan
                .as_ref()
                .is_some_and(|p| plan_changes_file(p, &r.file))
        })
        .filter_map(|r| r.plan.clone())
        .collect();

    if plans.is_empty() {
        OutputFormatter::plain("Nothing to rename.");
        return Ok(());
    }

    if config.preferences.confirm_before_apply && !yes && !confirm(plans.len())? {
        OutputFormatter::plain("Aborted.");
        return Ok(());
    }

    let result = RenameExecutor::execute(&plans);

    for file_result in &result.results {
        match file_result.outcome {
            RenameOutcome::Success => OutputFormatter::success(&format!(
                "{} → {}",
                file_result.original_name,
                file_result.new_name.as_deref().unwrap_or("?")
            )),
            RenameOutcome::Skipped => OutputFormatter::warning(&format!(
                "{} skipped{}",
                file_result.original_name,
                file_result
                    .error
                    .as_deref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            )),
            RenameOutcome::Failed => OutputFormatter::error(&format!(
                "{}: {}",
                file_result.original_name,
                file_result.error.as_deref().unwrap_or("unknown error")
            )),
        }
    }

    let history = HistoryManager::new(HistoryManager::default_path());
    let entry = OperationHistoryEntry::from_batch(&result);
    let operation_id = entry.id.clone();
    let prune = PruneConfig {
        max_entries: Some(config.preferences.history_max_entries),
        max_age_days: config.preferences.history_max_age_days,
    };
    match history.record(entry, prune) {
        Ok(()) => OutputFormatter::plain(&format!(
            "\nRecorded as operation {}. Use 'ruletidy undo {}' to revert.",
            operation_id, operation_id
        )),
        Err(e) => OutputFormatter::warning(&format!("Could not record history: {}", e)),
    }

    OutputFormatter::batch_summary(&result.summary, result.duration_ms);
    if !result.success {
        return Err("Some files could not be renamed.".to_string());
    }
    Ok(())
}

fn confirm(count: usize) -> Result<bool, String> {
    print!("Rename {} files? [y/N] ", count);
    std::io::stdout()
        .flush()
        .map_err(|e| format!("Error writing prompt: {}", e))?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|e| format!("Error reading answer: {}", e))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn show_history(limit: Option<usize>, operation_type: Option<&str>) -> Result<(), String> {
    let operation_type = match operation_type {
        Some("rename") => Some(OperationType::Rename),
        Some("move") => Some(OperationType::Move),
        Some("organize") => Some(OperationType::Organize),
        Some(other) => return Err(format!("Unknown operation type: {}", other)),
        None => None,
    };

    let history = HistoryManager::new(HistoryManager::default_path());
    let store = history.load().map_err(|e| e.to_string())?;
    let entries = store.query(QueryOptions {
        limit,
        operation_type,
    });

    if entries.is_empty() {
        OutputFormatter::plain("No recorded operations.");
        return Ok(());
    }

    OutputFormatter::header("HISTORY");
    for entry in entries {
        let undone = if entry.undone_at.is_some() {
            " (undone)"
        } else {
            ""
        };
        OutputFormatter::plain(&format!(
            "{}  {}  {} files ({} ok, {} skipped, {} failed){}",
            entry.id,
            entry.timestamp,
            entry.file_count,
            entry.summary.succeeded,
            entry.summary.skipped,
            entry.summary.failed,
            undone
        ));
    }
    Ok(())
}

fn undo(operation_id: &str, dry_run: bool) -> Result<(), String> {
    let history = HistoryManager::new(HistoryManager::default_path());
    let engine = UndoEngine::new(&history);

    let result = engine.undo(operation_id, dry_run).map_err(|e| e.to_string())?;

    if dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "{} files would be restored, {} skipped, {} failed, {} directories removed",
            result.files_restored,
            result.files_skipped,
            result.files_failed,
            result.directories_removed
        ));
        return Ok(());
    }

    OutputFormatter::plain(&format!("Restored: {}", result.files_restored));
    if result.files_skipped > 0 {
        OutputFormatter::plain(&format!("Skipped:  {}", result.files_skipped));
    }
    for file in result.files.iter().filter(|f| !f.success && f.skip_reason.is_none()) {
        OutputFormatter::error(&format!(
            "{}: {}",
            file.original_path,
            file.error.as_deref().unwrap_or("unknown error")
        ));
    }

    if result.success {
        OutputFormatter::success("Undo complete.");
        Ok(())
    } else {
        Err(format!(
            "{} files could not be restored; the operation remains undoable.",
            result.files_failed
        ))
    }
}

fn show_rules(config: &AppConfig) -> Result<(), String> {
    let resolver = TemplateResolver::new(config.preferences.rule_priority_mode);
    let preview = resolver
        .priority_resolver()
        .preview_rule_priority(&config.rules, &config.filename_rules);

    if preview.order.is_empty() {
        OutputFormatter::plain("No rules configured.");
        return Ok(());
    }

    OutputFormatter::header("EVALUATION ORDER");
    for (index, entry) in preview.order.iter().enumerate() {
        let family = match entry.family {
            crate::priority::RuleFamily::Metadata => "metadata",
            crate::priority::RuleFamily::Filename => "filename",
        };
        let state = if entry.enabled { "" } else { " (disabled)" };
        OutputFormatter::plain(&format!(
            "{:>3}. [{}] {} (priority {}){}",
            index + 1,
            family,
            entry.rule_name,
            entry.priority,
            state
        ));
    }

    for tie in &preview.ties {
        let names: Vec<&str> = tie.rules.iter().map(|r| r.rule_name.as_str()).collect();
        OutputFormatter::warning(&format!(
            "Priority {} is shared by: {}",
            tie.priority,
            names.join(", ")
        ));
    }
    Ok(())
}
