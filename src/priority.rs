/// Unified priority ordering across the two rule families.
///
/// Metadata rules and filename rules each carry their own priorities; when
/// both families could match the same file, a single global preference
/// (the rule priority mode) decides how they interleave:
///
/// - `combined`: one list, priority descending. At equal priority metadata
///   rules order before filename rules, and within a family the stored
///   order wins. This tie-break is deliberate and covered by tests.
/// - `metadata-first`: every enabled metadata rule is considered before any
///   filename rule, whatever the numeric priorities say.
/// - `filename-first`: the symmetric inverse.
///
/// The resolver also powers the dry-run priority preview: the resolved
/// evaluation order plus the groups of rules sharing a priority value, so
/// callers can warn about ambiguous orderings before they bite.
use crate::rules::{
    FilenameRule, FilenameRuleManager, MetadataPatternRule, RuleManager, RuleManagerError,
};
use serde::{Deserialize, Serialize};

/// How the two rule families interleave during evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RulePriorityMode {
    #[default]
    Combined,
    MetadataFirst,
    FilenameFirst,
}

/// Which family a unified entry belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleFamily {
    Metadata,
    Filename,
}

/// A rule from either family, borrowed for evaluation dispatch.
#[derive(Debug, Clone, Copy)]
pub enum UnifiedRuleRef<'a> {
    Metadata(&'a MetadataPatternRule),
    Filename(&'a FilenameRule),
}

impl UnifiedRuleRef<'_> {
    pub fn family(&self) -> RuleFamily {
        match self {
            UnifiedRuleRef::Metadata(_) => RuleFamily::Metadata,
            UnifiedRuleRef::Filename(_) => RuleFamily::Filename,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            UnifiedRuleRef::Metadata(r) => &r.id,
            UnifiedRuleRef::Filename(r) => &r.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UnifiedRuleRef::Metadata(r) => &r.name,
            UnifiedRuleRef::Filename(r) => &r.name,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            UnifiedRuleRef::Metadata(r) => r.priority,
            UnifiedRuleRef::Filename(r) => r.priority,
        }
    }

    pub fn template_id(&self) -> &str {
        match self {
            UnifiedRuleRef::Metadata(r) => &r.template_id,
            UnifiedRuleRef::Filename(r) => &r.template_id,
        }
    }
}

/// One entry of the unified priority listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRulePriority {
    pub rule_id: String,
    pub rule_name: String,
    pub family: RuleFamily,
    pub priority: i32,
    pub enabled: bool,
}

/// Identifies a rule across families, for reorder requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRuleKey {
    pub rule_id: String,
    pub family: RuleFamily,
}

/// A group of rules sharing one priority value.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriorityTie {
    pub priority: i32,
    pub rules: Vec<UnifiedRulePriority>,
}

/// Dry-run view of the resolved evaluation order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePriorityPreview {
    pub mode: RulePriorityMode,
    pub order: Vec<UnifiedRulePriority>,
    pub ties: Vec<PriorityTie>,
}

/// Errors from unified priority operations.
#[derive(Debug, Clone, PartialEq)]
pub enum RulePriorityError {
    UnknownRule { rule_id: String, family: RuleFamily },
    InvalidReorder { reason: String },
}

impl std::fmt::Display for RulePriorityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulePriorityError::UnknownRule { rule_id, family } => {
                write!(f, "Unknown {:?} rule: {}", family, rule_id)
            }
            RulePriorityError::InvalidReorder { reason } => {
                write!(f, "Invalid reorder request: {}", reason)
            }
        }
    }
}

impl std::error::Error for RulePriorityError {}

/// Result type for unified priority operations.
pub type RulePriorityResult<T> = Result<T, RulePriorityError>;

/// Produces and edits the unified evaluation order for a priority mode.
#[derive(Debug, Clone, Copy)]
pub struct UnifiedPriorityResolver {
    mode: RulePriorityMode,
}

impl UnifiedPriorityResolver {
    pub fn new(mode: RulePriorityMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RulePriorityMode {
        self.mode
    }

    /// The linear evaluation order over both families, enabled rules only.
    pub fn evaluation_order<'a>(
        &self,
        metadata_rules: &'a [MetadataPatternRule],
        filename_rules: &'a [FilenameRule],
    ) -> Vec<UnifiedRuleRef<'a>> {
        let metadata = sorted_refs(metadata_rules.iter().filter(|r| r.enabled).map(UnifiedRuleRef::Metadata));
        let filename = sorted_refs(filename_rules.iter().filter(|r| r.enabled).map(UnifiedRuleRef::Filename));

        match self.mode {
            RulePriorityMode::Combined => {
                // seeding metadata ahead of filename makes the stable sort
                // put metadata rules first at equal priority
                let mut merged: Vec<UnifiedRuleRef<'a>> =
                    metadata.into_iter().chain(filename).collect();
                merged.sort_by(|a, b| b.priority().cmp(&a.priority()));
                merged
            }
            RulePriorityMode::MetadataFirst => {
                metadata.into_iter().chain(filename).collect()
            }
            RulePriorityMode::FilenameFirst => {
                filename.into_iter().chain(metadata).collect()
            }
        }
    }

    /// The unified listing of every rule, disabled rules included, in the
    /// order the active mode would consider them.
    pub fn unified_rule_priorities(
        &self,
        metadata_rules: &[MetadataPatternRule],
        filename_rules: &[FilenameRule],
    ) -> Vec<UnifiedRulePriority> {
        let metadata = metadata_rules.iter().map(|r| UnifiedRulePriority {
            rule_id: r.id.clone(),
            rule_name: r.name.clone(),
            family: RuleFamily::Metadata,
            priority: r.priority,
            enabled: r.enabled,
        });
        let filename = filename_rules.iter().map(|r| UnifiedRulePriority {
            rule_id: r.id.clone(),
            rule_name: r.name.clone(),
            family: RuleFamily::Filename,
            priority: r.priority,
            enabled: r.enabled,
        });

        let mut entries: Vec<UnifiedRulePriority> = match self.mode {
            RulePriorityMode::Combined => metadata.chain(filename).collect(),
            RulePriorityMode::MetadataFirst => metadata.chain(filename).collect(),
            RulePriorityMode::FilenameFirst => filename.chain(metadata).collect(),
        };
        match self.mode {
            RulePriorityMode::Combined => {
                entries.sort_by(|a, b| b.priority.cmp(&a.priority));
            }
            RulePriorityMode::MetadataFirst | RulePriorityMode::FilenameFirst => {
                // sort within each family block, keeping the blocks apart
                entries.sort_by(|a, b| {
                    family_rank(self.mode, a.family)
                        .cmp(&family_rank(self.mode, b.family))
                        .then(b.priority.cmp(&a.priority))
                });
            }
        }
        entries
    }

    /// Sets one rule's priority through the owning manager.
    pub fn set_unified_rule_priority(
        &self,
        metadata_rules: &mut RuleManager,
        filename_rules: &mut FilenameRuleManager,
        rule_id: &str,
        family: RuleFamily,
        priority: i32,
    ) -> RulePriorityResult<()> {
        let result = match family {
            RuleFamily::Metadata => metadata_rules.set_priority(rule_id, priority),
            RuleFamily::Filename => filename_rules.set_priority(rule_id, priority),
        };
        result.map_err(|e| match e {
            RuleManagerError::RuleNotFound { id } => RulePriorityError::UnknownRule {
                rule_id: id,
                family,
            },
            other => RulePriorityError::InvalidReorder {
                reason: other.to_string(),
            },
        })
    }

    /// Rewrites priorities so evaluation follows `new_order`, reusing the
    /// existing priority values (highest value to the first entry) so the
    /// relative spacing between rules is preserved.
    ///
    /// `new_order` must name every rule of both families exactly once.
    pub fn reorder_unified_rules(
        &self,
        metadata_rules: &mut RuleManager,
        filename_rules: &mut FilenameRuleManager,
        new_order: &[UnifiedRuleKey],
    ) -> RulePriorityResult<()> {
        let total = metadata_rules.rules().len() + filename_rules.rules().len();
        if new_order.len() != total {
            return Err(RulePriorityError::InvalidReorder {
                reason: format!("expected {} rules, got {}", total, new_order.len()),
            });
        }

        let mut seen: Vec<&UnifiedRuleKey> = Vec::with_capacity(new_order.len());
        for key in new_order {
            if seen
                .iter()
                .any(|k| k.rule_id == key.rule_id && k.family == key.family)
            {
                return Err(RulePriorityError::InvalidReorder {
                    reason: format!("duplicate entry: {}", key.rule_id),
                });
            }
            let known = match key.family {
                RuleFamily::Metadata => metadata_rules.get(&key.rule_id).is_some(),
                RuleFamily::Filename => filename_rules.get(&key.rule_id).is_some(),
            };
            if !known {
                return Err(RulePriorityError::UnknownRule {
                    rule_id: key.rule_id.clone(),
                    family: key.family,
                });
            }
            seen.push(key);
        }

        let mut values: Vec<i32> = metadata_rules
            .rules()
            .iter()
            .map(|r| r.priority)
            .chain(filename_rules.rules().iter().map(|r| r.priority))
            .collect();
        values.sort_unstable_by(|a, b| b.cmp(a));

        for (key, priority) in new_order.iter().zip(values) {
            self.set_unified_rule_priority(
                metadata_rules,
                filename_rules,
                &key.rule_id,
                key.family,
                priority,
            )?;
        }
        Ok(())
    }

    /// Groups of enabled rules sharing a priority value. In the family-first
    /// modes only ties within the same family are ambiguous; in combined
    /// mode ties span both families.
    pub fn detect_priority_ties(
        &self,
        metadata_rules: &[MetadataPatternRule],
        filename_rules: &[FilenameRule],
    ) -> Vec<PriorityTie> {
        let entries: Vec<UnifiedRulePriority> = self
            .unified_rule_priorities(metadata_rules, filename_rules)
            .into_iter()
            .filter(|e| e.enabled)
            .collect();

        let mut ties = Vec::new();
        match self.mode {
            RulePriorityMode::Combined => collect_ties(&entries, &mut ties),
            RulePriorityMode::MetadataFirst | RulePriorityMode::FilenameFirst => {
                for family in [RuleFamily::Metadata, RuleFamily::Filename] {
                    let family_entries: Vec<UnifiedRulePriority> = entries
                        .iter()
                        .filter(|e| e.family == family)
                        .cloned()
                        .collect();
                    collect_ties(&family_entries, &mut ties);
                }
            }
        }
        ties.sort_by(|a, b| b.priority.cmp(&a.priority));
        ties
    }

    /// The resolved order plus tie warnings, for display before an apply.
    pub fn preview_rule_priority(
        &self,
        metadata_rules: &[MetadataPatternRule],
        filename_rules: &[FilenameRule],
    ) -> RulePriorityPreview {
        RulePriorityPreview {
            mode: self.mode,
            order: self.unified_rule_priorities(metadata_rules, filename_rules),
            ties: self.detect_priority_ties(metadata_rules, filename_rules),
        }
    }
}

fn sorted_refs<'a>(rules: impl Iterator<Item = UnifiedRuleRef<'a>>) -> Vec<UnifiedRuleRef<'a>> {
    let mut sorted: Vec<UnifiedRuleRef<'a>> = rules.collect();
    sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));
    sorted
}

fn family_rank(mode: RulePriorityMode, family: RuleFamily) -> u8 {
    match (mode, family) {
        (RulePriorityMode::FilenameFirst, RuleFamily::Filename) => 0,
        (RulePriorityMode::FilenameFirst, RuleFamily::Metadata) => 1,
        (_, RuleFamily::Metadata) => 0,
        (_, RuleFamily::Filename) => 1,
    }
}

fn collect_ties(entries: &[UnifiedRulePriority], ties: &mut Vec<PriorityTie>) {
    let mut by_priority: Vec<(i32, Vec<UnifiedRulePriority>)> = Vec::new();
    for entry in entries {
        match by_priority.iter_mut().find(|(p, _)| *p == entry.priority) {
            Some((_, group)) => group.push(entry.clone()),
            None => by_priority.push((entry.priority, vec![entry.clone()])),
        }
    }
    for (priority, rules) in by_priority {
        if rules.len() > 1 {
            ties.push(PriorityTie { priority, rules });
        }
    }
}
