/// Rule evaluation and best-match selection for both rule families.
///
/// Metadata pattern rules combine their conditions with AND (`all`) or OR
/// (`any`) semantics and short-circuit accordingly; filename rules match
/// their glob against the full filename. Selection is identical for both
/// families: enabled rules sorted by priority descending with the stored
/// order breaking ties, first match wins.
///
/// A rule with zero conditions never matches in either mode: an empty AND
/// would otherwise match every file on disk.
use crate::condition::{ConditionEvaluationError, ConditionEvaluator};
use crate::glob_match::{GlobError, GlobMatcher};
use crate::metadata::UnifiedMetadata;
use crate::rules::{FilenameRule, MatchMode, MetadataPatternRule};

/// Outcome of evaluating one metadata pattern rule against one file.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEvaluation {
    pub matches: bool,
    /// Field paths of conditions that matched, in evaluation order.
    pub matched_conditions: Vec<String>,
    /// Field paths of conditions that did not match.
    pub unmatched_conditions: Vec<String>,
}

/// Errors from rule evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvaluatorError {
    /// The rule is disabled and can never match.
    RuleDisabled { id: String },
    /// One or more conditions errored and no short-circuit resolved the
    /// outcome first. Carries every per-condition error.
    ConditionError {
        id: String,
        errors: Vec<ConditionEvaluationError>,
    },
    /// A filename rule's glob pattern failed to compile.
    PatternError { id: String, error: GlobError },
}

impl std::fmt::Display for RuleEvaluatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleEvaluatorError::RuleDisabled { id } => write!(f, "Rule {} is disabled", id),
            RuleEvaluatorError::ConditionError { id, errors } => {
                write!(f, "Rule {} failed to evaluate: ", id)?;
                let reasons: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", reasons.join("; "))
            }
            RuleEvaluatorError::PatternError { id, error } => {
                write!(f, "Rule {} has an invalid pattern: {}", id, error)
            }
        }
    }
}

impl std::error::Error for RuleEvaluatorError {}

/// Result type for rule evaluation.
pub type RuleEvaluatorResult<T> = Result<T, RuleEvaluatorError>;

/// Per-rule entry of a diagnostic evaluation sweep.
#[derive(Debug, Clone)]
pub struct RuleEvaluationReport {
    pub rule_id: String,
    pub rule_name: String,
    pub outcome: RuleEvaluatorResult<RuleEvaluation>,
}

/// Evaluates one metadata pattern rule against a metadata record.
///
/// `any` short-circuits true on the first matching condition; `all`
/// short-circuits false on the first non-matching one. Condition errors
/// are collected, and fail the rule only when no short-circuit decided the
/// outcome before the conditions ran out.
pub fn evaluate_rule(
    evaluator: &ConditionEvaluator,
    rule: &MetadataPatternRule,
    metadata: &UnifiedMetadata,
) -> RuleEvaluatorResult<RuleEvaluation> {
    if !rule.enabled {
        return Err(RuleEvaluatorError::RuleDisabled {
            id: rule.id.clone(),
        });
    }

    let mut matched_conditions = Vec::new();
    let mut unmatched_conditions = Vec::new();
    let mut errors = Vec::new();

    for condition in &rule.conditions {
        match evaluator.evaluate(condition, metadata) {
            Ok(true) => {
                matched_conditions.push(condition.field.clone());
                if rule.match_mode == MatchMode::Any {
                    return Ok(RuleEvaluation {
                        matches: true,
                        matched_conditions,
                        unmatched_conditions,
                    });
                }
            }
            Ok(false) => {
                unmatched_conditions.push(condition.field.clone());
                if rule.match_mode == MatchMode::All {
                    return Ok(RuleEvaluation {
                        matches: false,
                        matched_conditions,
                        unmatched_conditions,
                    });
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(RuleEvaluatorError::ConditionError {
            id: rule.id.clone(),
            errors,
        });
    }

    let matches = match rule.match_mode {
        // every condition matched, and there was at least one
        MatchMode::All => !rule.conditions.is_empty(),
        // no condition matched (or there were none)
        MatchMode::Any => false,
    };

    Ok(RuleEvaluation {
        matches,
        matched_conditions,
        unmatched_conditions,
    })
}

/// Enabled rules sorted by priority descending; stored order breaks ties.
fn sorted_enabled<'a>(rules: &'a [MetadataPatternRule]) -> Vec<&'a MetadataPatternRule> {
    let mut sorted: Vec<&MetadataPatternRule> = rules.iter().filter(|r| r.enabled).collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
}

/// Returns the highest-priority enabled rule that matches, if any.
///
/// Rules that fail with condition errors are skipped; lower-priority rules
/// still get their chance.
pub fn find_matching_rule<'a>(
    evaluator: &ConditionEvaluator,
    rules: &'a [MetadataPatternRule],
    metadata: &UnifiedMetadata,
) -> Option<&'a MetadataPatternRule> {
    sorted_enabled(rules)
        .into_iter()
        .find(|rule| matches!(evaluate_rule(evaluator, rule, metadata), Ok(e) if e.matches))
}

/// Returns every enabled rule that matches, highest priority first.
pub fn find_all_matching_rules<'a>(
    evaluator: &ConditionEvaluator,
    rules: &'a [MetadataPatternRule],
    metadata: &UnifiedMetadata,
) -> Vec<&'a MetadataPatternRule> {
    sorted_enabled(rules)
        .into_iter()
        .filter(|rule| matches!(evaluate_rule(evaluator, rule, metadata), Ok(e) if e.matches))
        .collect()
}

/// Evaluates every rule, disabled ones included, and reports each
/// outcome, for rule-authoring previews.
pub fn evaluate_all_rules(
    evaluator: &ConditionEvaluator,
    rules: &[MetadataPatternRule],
    metadata: &UnifiedMetadata,
) -> Vec<RuleEvaluationReport> {
    let mut sorted: Vec<&MetadataPatternRule> = rules.iter().collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
        .into_iter()
        .map(|rule| RuleEvaluationReport {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            outcome: evaluate_rule(evaluator, rule, metadata),
        })
        .collect()
}

/// Evaluates one filename rule against a filename.
pub fn evaluate_filename_rule(
    matcher: &GlobMatcher,
    rule: &FilenameRule,
    filename: &str,
) -> RuleEvaluatorResult<bool> {
    if !rule.enabled {
        return Err(RuleEvaluatorError::RuleDisabled {
            id: rule.id.clone(),
        });
    }
    matcher
        .matches(&rule.pattern, filename)
        .map_err(|error| RuleEvaluatorError::PatternError {
            id: rule.id.clone(),
            error,
        })
}

fn sorted_enabled_filename<'a>(rules: &'a [FilenameRule]) -> Vec<&'a FilenameRule> {
    let mut sorted: Vec<&FilenameRule> = rules.iter().filter(|r| r.enabled).collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
}

/// Returns the highest-priority enabled filename rule matching the
/// filename. Rules with invalid patterns are skipped.
pub fn find_matching_filename_rule<'a>(
    matcher: &GlobMatcher,
    rules: &'a [FilenameRule],
    filename: &str,
) -> Option<&'a FilenameRule> {
    sorted_enabled_filename(rules)
        .into_iter()
        .find(|rule| matches!(evaluate_filename_rule(matcher, rule, filename), Ok(true)))
}

/// Returns every enabled filename rule matching the filename, highest
/// priority first.
pub fn find_all_matching_filename_rules<'a>(
    matcher: &GlobMatcher,
    rules: &'a [FilenameRule],
    filename: &str,
) -> Vec<&'a FilenameRule> {
    sorted_enabled_filename(rules)
        .into_iter()
        .filter(|rule| matches!(evaluate_filename_rule(matcher, rule, filename), Ok(true)))
        .collect()
}
