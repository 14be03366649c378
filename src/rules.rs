/// Rule definitions and collection management.
///
/// Two independent rule families decide which naming template applies to a
/// file: metadata pattern rules (conditions over extracted metadata) and
/// filename rules (glob patterns over the filename). Both carry a priority
/// (higher evaluates first) and an enabled flag, and both target a template
/// by id. The managers own the persisted collections and handle CRUD,
/// enable/disable and reordering; evaluation never mutates a rule.
use crate::condition::Condition;
use crate::glob_match::compile_glob_pattern;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a rule's conditions combine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every condition must match (AND).
    All,
    /// At least one condition must match (OR).
    Any,
}

/// A rule matching on extracted metadata fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatternRule {
    pub id: String,
    pub name: String,
    /// Conditions in evaluation order.
    pub conditions: Vec<Condition>,
    pub match_mode: MatchMode,
    /// Higher priority evaluates first.
    pub priority: i32,
    pub enabled: bool,
    /// Template applied when the rule matches.
    pub template_id: String,
}

impl MetadataPatternRule {
    pub fn new(
        name: impl Into<String>,
        conditions: Vec<Condition>,
        match_mode: MatchMode,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            conditions,
            match_mode,
            priority: 0,
            enabled: true,
            template_id: template_id.into(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A rule matching on the filename via a glob pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilenameRule {
    pub id: String,
    pub name: String,
    /// Glob pattern with brace expansion, e.g. `*.{jpg,png}`.
    pub pattern: String,
    pub priority: i32,
    pub enabled: bool,
    pub template_id: String,
}

impl FilenameRule {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            pattern: pattern.into(),
            priority: 0,
            enabled: true,
            template_id: template_id.into(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Errors from rule collection management.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleManagerError {
    RuleNotFound { id: String },
    DuplicateId { id: String },
    InvalidRule { name: String, reason: String },
    InvalidReorder { reason: String },
}

impl std::fmt::Display for RuleManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleManagerError::RuleNotFound { id } => write!(f, "Rule not found: {}", id),
            RuleManagerError::DuplicateId { id } => write!(f, "Duplicate rule id: {}", id),
            RuleManagerError::InvalidRule { name, reason } => {
                write!(f, "Invalid rule '{}': {}", name, reason)
            }
            RuleManagerError::InvalidReorder { reason } => {
                write!(f, "Invalid reorder request: {}", reason)
            }
        }
    }
}

impl std::error::Error for RuleManagerError {}

/// Result type for rule management operations.
pub type RuleManagerResult<T> = Result<T, RuleManagerError>;

/// Owns the persisted collection of metadata pattern rules.
#[derive(Debug, Clone, Default)]
pub struct RuleManager {
    rules: Vec<MetadataPatternRule>,
}

impl RuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<MetadataPatternRule>) -> Self {
        Self { rules }
    }

    /// The rules in stored order. Stored order breaks priority ties.
    pub fn rules(&self) -> &[MetadataPatternRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<MetadataPatternRule> {
        self.rules
    }

    pub fn get(&self, id: &str) -> Option<&MetadataPatternRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn add(&mut self, rule: MetadataPatternRule) -> RuleManagerResult<()> {
        validate_name(&rule.name)?;
        if self.get(&rule.id).is_some() {
            return Err(RuleManagerError::DuplicateId { id: rule.id });
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Replaces the rule with the same id.
    pub fn update(&mut self, rule: MetadataPatternRule) -> RuleManagerResult<()> {
        validate_name(&rule.name)?;
        let slot = self
            .rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or(RuleManagerError::RuleNotFound { id: rule.id.clone() })?;
        *slot = rule;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> RuleManagerResult<MetadataPatternRule> {
        let index = self
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(RuleManagerError::RuleNotFound { id: id.to_string() })?;
        Ok(self.rules.remove(index))
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> RuleManagerResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleManagerError::RuleNotFound { id: id.to_string() })?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn set_priority(&mut self, id: &str, priority: i32) -> RuleManagerResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleManagerError::RuleNotFound { id: id.to_string() })?;
        rule.priority = priority;
        Ok(())
    }

    /// Rewrites the stored order to match `ids`, which must be a permutation
    /// of the current rule ids.
    pub fn reorder(&mut self, ids: &[String]) -> RuleManagerResult<()> {
        self.rules = reorder_by_ids(std::mem::take(&mut self.rules), ids, |r| &r.id)?;
        Ok(())
    }
}

/// Owns the persisted collection of filename rules.
///
/// Glob patterns are validated on add and update so a broken pattern is
/// rejected at authoring time, not discovered at match time.
#[derive(Debug, Clone, Default)]
pub struct FilenameRuleManager {
    rules: Vec<FilenameRule>,
}

impl FilenameRuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<FilenameRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FilenameRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<FilenameRule> {
        self.rules
    }

    pub fn get(&self, id: &str) -> Option<&FilenameRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn add(&mut self, rule: FilenameRule) -> RuleManagerResult<()> {
        validate_name(&rule.name)?;
        validate_pattern(&rule)?;
        if self.get(&rule.id).is_some() {
            return Err(RuleManagerError::DuplicateId { id: rule.id });
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn update(&mut self, rule: FilenameRule) -> RuleManagerResult<()> {
        validate_name(&rule.name)?;
        validate_pattern(&rule)?;
        let slot = self
            .rules
            .iter_mut()
            .find(|r| r.id == rule.id)
            .ok_or(RuleManagerError::RuleNotFound { id: rule.id.clone() })?;
        *slot = rule;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> RuleManagerResult<FilenameRule> {
        let index = self
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or(RuleManagerError::RuleNotFound { id: id.to_string() })?;
        Ok(self.rules.remove(index))
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> RuleManagerResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleManagerError::RuleNotFound { id: id.to_string() })?;
        rule.enabled = enabled;
        Ok(())
    }

    pub fn set_priority(&mut self, id: &str, priority: i32) -> RuleManagerResult<()> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RuleManagerError::RuleNotFound { id: id.to_string() })?;
        rule.priority = priority;
        Ok(())
    }

    pub fn reorder(&mut self, ids: &[String]) -> RuleManagerResult<()> {
        self.rules = reorder_by_ids(std::mem::take(&mut self.rules), ids, |r| &r.id)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> RuleManagerResult<()> {
    if name.trim().is_empty() {
        return Err(RuleManagerError::InvalidRule {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn validate_pattern(rule: &FilenameRule) -> RuleManagerResult<()> {
    compile_glob_pattern(&rule.pattern).map_err(|e| RuleManagerError::InvalidRule {
        name: rule.name.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn reorder_by_ids<T>(
    mut items: Vec<T>,
    ids: &[String],
    id_of: impl Fn(&T) -> &str,
) -> RuleManagerResult<Vec<T>> {
    if ids.len() != items.len() {
        return Err(RuleManagerError::InvalidReorder {
            reason: format!("expected {} ids, got {}", items.len(), ids.len()),
        });
    }
    let mut reordered = Vec::with_capacity(items.len());
    for id in ids {
        let index = items
            .iter()
            .position(|item| id_of(item) == id)
            .ok_or_else(|| RuleManagerError::InvalidReorder {
                reason: format!("unknown or duplicate id: {}", id),
            })?;
        reordered.push(items.remove(index));
    }
    Ok(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOperator;
    use serde_json::json;

    fn canon_rule() -> MetadataPatternRule {
        MetadataPatternRule::new(
            "Canon photos",
            vec![Condition::new(
                "image.cameraMake",
                ConditionOperator::Equals,
                json!("Canon"),
            )],
            MatchMode::All,
            "tpl-camera",
        )
    }

    #[test]
    fn test_add_get_remove() {
        let mut manager = RuleManager::new();
        let rule = canon_rule();
        let id = rule.id.clone();

        manager.add(rule).expect("add failed");
        assert!(manager.get(&id).is_some());

        let removed = manager.remove(&id).expect("remove failed");
        assert_eq!(removed.id, id);
        assert!(manager.get(&id).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut manager = RuleManager::new();
        let rule = canon_rule();
        let copy = rule.clone();
        manager.add(rule).expect("add failed");
        assert!(matches!(
            manager.add(copy),
            Err(RuleManagerError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut manager = RuleManager::new();
        let mut rule = canon_rule();
        rule.name = "  ".to_string();
        assert!(matches!(
            manager.add(rule),
            Err(RuleManagerError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_set_enabled_and_priority() {
        let mut manager = RuleManager::new();
        let rule = canon_rule();
        let id = rule.id.clone();
        manager.add(rule).expect("add failed");

        manager.set_enabled(&id, false).expect("set_enabled failed");
        manager.set_priority(&id, 42).expect("set_priority failed");

        let rule = manager.get(&id).unwrap();
        assert!(!rule.enabled);
        assert_eq!(rule.priority, 42);
    }

    #[test]
    fn test_filename_rule_pattern_validated() {
        let mut manager = FilenameRuleManager::new();
        let rule = FilenameRule::new("broken", "{jpg,png", "tpl-x");
        assert!(matches!(
            manager.add(rule),
            Err(RuleManagerError::InvalidRule { .. })
        ));

        let rule = FilenameRule::new("photos", "{jpg,png}", "tpl-x");
        manager.add(rule).expect("valid pattern rejected");
    }

    #[test]
    fn test_reorder_is_a_permutation() {
        let mut manager = FilenameRuleManager::new();
        let a = FilenameRule::new("a", "*.jpg", "t");
        let b = FilenameRule::new("b", "*.png", "t");
        let (id_a, id_b) = (a.id.clone(), b.id.clone());
        manager.add(a).unwrap();
        manager.add(b).unwrap();

        manager
            .reorder(&[id_b.clone(), id_a.clone()])
            .expect("reorder failed");
        assert_eq!(manager.rules()[0].id, id_b);

        // wrong length
        assert!(manager.reorder(&[id_a.clone()]).is_err());
        // duplicate entry
        assert!(manager.reorder(&[id_a.clone(), id_a]).is_err());
    }

    #[test]
    fn test_unknown_rule_errors() {
        let mut manager = RuleManager::new();
        assert!(matches!(
            manager.set_enabled("missing", true),
            Err(RuleManagerError::RuleNotFound { .. })
        ));
        assert!(matches!(
            manager.remove("missing"),
            Err(RuleManagerError::RuleNotFound { .. })
        ));
    }
}
