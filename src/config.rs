//! Application configuration: templates, rules and preferences.
//!
//! Configuration is one JSON document holding the template set, both rule
//! collections, folder structures and user preferences. Every collection is
//! optional on disk: a missing or empty config means defaults apply, so the
//! tool works with zero configuration.
//!
//! Lookup order:
//! 1. An explicitly provided path (errors are reported, not swallowed)
//! 2. `$RULETIDY_CONFIG_DIR/config.json`
//! 3. `~/.config/ruletidy/config.json`
//! 4. Built-in defaults
//!
//! A corrupt implicit config falls back to defaults with a warning rather
//! than making the tool unusable.

use crate::glob_match::compile_glob_pattern;
use crate::priority::RulePriorityMode;
use crate::rules::{FilenameRule, MetadataPatternRule};
use crate::template::{Template, default_templates};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Errors that can occur during configuration loading and saving.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid JSON or failed validation.
    ConfigInvalid(String),
    /// IO error while reading or writing configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A folder structure for organizing files into directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderStructure {
    /// Unique identifier (UUID).
    pub id: String,
    pub name: String,
    /// Folder pattern using placeholders, e.g. `{year}/{month}`.
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl FolderStructure {
    fn new(name: &str, pattern: &str, description: &str, priority: i32) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            pattern: pattern.to_string(),
            description: Some(description.to_string()),
            enabled: true,
            priority,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_history_max_entries() -> usize {
    500
}

/// User preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// How the two rule families interleave when both could match.
    #[serde(default)]
    pub rule_priority_mode: RulePriorityMode,
    /// Whether to confirm before applying renames.
    #[serde(default = "default_true")]
    pub confirm_before_apply: bool,
    /// Whether to scan subdirectories.
    #[serde(default)]
    pub recursive_scan: bool,
    /// History entries kept before pruning.
    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,
    /// Age-based pruning threshold, in days. `None` keeps entries forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_max_age_days: Option<i64>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            rule_priority_mode: RulePriorityMode::default(),
            confirm_before_apply: true,
            recursive_scan: false,
            history_max_entries: default_history_max_entries(),
            history_max_age_days: None,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Config schema version.
    pub version: u8,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub rules: Vec<MetadataPatternRule>,
    #[serde(default)]
    pub filename_rules: Vec<FilenameRule>,
    #[serde(default)]
    pub folder_structures: Vec<FolderStructure>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            version: 1,
            templates: default_templates(),
            rules: Vec::new(),
            filename_rules: Vec::new(),
            folder_structures: default_folder_structures(),
            preferences: Preferences::default(),
        }
    }
}

fn default_folder_structures() -> Vec<FolderStructure> {
    vec![
        FolderStructure::new("By Year", "{year}", "Organize files by year", 10),
        FolderStructure::new(
            "By Year and Month",
            "{year}/{month}",
            "Organize files by year and month",
            20,
        ),
        FolderStructure::new(
            "By Category",
            "{category}",
            "Organize files by type (images, documents, etc.)",
            30,
        ),
    ]
}

/// The configuration directory: `$RULETIDY_CONFIG_DIR` when set, otherwise
/// `~/.config/ruletidy`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RULETIDY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".config")
        .join("ruletidy")
}

impl AppConfig {
    /// Loads configuration with fallback to defaults.
    ///
    /// An explicitly provided path must load cleanly; the implicit config
    /// file degrades to defaults (with a warning) when corrupt, so a broken
    /// config never makes the tool unusable.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let implicit = config_dir().join("config.json");
        if implicit.exists() {
            match Self::load_from_file(&implicit) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    eprintln!("Warning: {}; using defaults", e);
                    return Ok(Self::default());
                }
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: AppConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;

        // zero-config collections fall back to the built-in sets
        if config.templates.is_empty() {
            config.templates = default_templates();
        }
        if config.folder_structures.is_empty() {
            config.folder_structures = default_folder_structures();
        }

        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON, creating the parent
    /// directory as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        // config may hold rule data the user considers private
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
        }

        Ok(())
    }

    /// Checks configuration integrity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version < 1 {
            return Err(ConfigError::ConfigInvalid(
                "config version must be >= 1".to_string(),
            ));
        }

        for template in &self.templates {
            if template.name.trim().is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "template '{}' has empty name",
                    template.id
                )));
            }
            if template.pattern.trim().is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "template '{}' has empty pattern",
                    template.name
                )));
            }
            if template.pattern.len() > 1000 {
                return Err(ConfigError::ConfigInvalid(format!(
                    "template '{}' pattern too long (max 1000 chars)",
                    template.name
                )));
            }
        }

        for rule in &self.rules {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "rule '{}' has empty name",
                    rule.id
                )));
            }
        }

        for rule in &self.filename_rules {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "filename rule '{}' has empty name",
                    rule.id
                )));
            }
            compile_glob_pattern(&rule.pattern).map_err(|e| {
                ConfigError::ConfigInvalid(format!("filename rule '{}': {}", rule.name, e))
            })?;
        }

        for structure in &self.folder_structures {
            if structure.name.trim().is_empty() || structure.pattern.trim().is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "folder structure '{}' has empty name or pattern",
                    structure.id
                )));
            }
        }

        Ok(())
    }
}
