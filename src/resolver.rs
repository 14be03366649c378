/// Template resolution: from a file's metadata to the naming template that
/// applies.
///
/// The resolver walks the unified priority order, dispatching each entry to
/// its family's evaluator, and stops at the first match. Rules that fail to
/// evaluate (a broken regex, an invalid glob) are skipped so one malformed
/// rule cannot block every rule below it. When nothing matches, the
/// configured default template is the fallback.
///
/// Every result carries a `reason` (the matched rule, the default
/// fallback, or the absence of a default) which feeds audit and debug
/// output.
use crate::condition::ConditionEvaluator;
use crate::glob_match::GlobMatcher;
use crate::metadata::UnifiedMetadata;
use crate::priority::{RuleFamily, RulePriorityMode, UnifiedPriorityResolver, UnifiedRuleRef};
use crate::rule_evaluator::{evaluate_filename_rule, evaluate_rule};
use crate::rules::{FilenameRule, MetadataPatternRule};
use crate::template::{Template, default_template};
use serde::Serialize;

/// Why a resolution produced the template it did.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResolutionReason {
    /// A rule matched; its template wins.
    #[serde(rename_all = "camelCase")]
    RuleMatch { rule_id: String },
    /// No rule matched; the default template applies.
    DefaultFallback,
    /// No rule matched and no default template is configured.
    NoDefaultAvailable,
}

/// Outcome of resolving the template for one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResolutionResult {
    /// The winning template, when one was found.
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_family: Option<RuleFamily>,
    pub reason: ResolutionReason,
}

/// Resolves templates for files by walking the unified rule order.
///
/// Owns the per-session evaluation caches (compiled regexes and globs), so
/// one resolver instance should be reused across a batch.
pub struct TemplateResolver {
    conditions: ConditionEvaluator,
    globs: GlobMatcher,
    priority: UnifiedPriorityResolver,
}

impl TemplateResolver {
    pub fn new(mode: RulePriorityMode) -> Self {
        Self {
            conditions: ConditionEvaluator::new(),
            globs: GlobMatcher::new(),
            priority: UnifiedPriorityResolver::new(mode),
        }
    }

    pub fn priority_resolver(&self) -> &UnifiedPriorityResolver {
        &self.priority
    }

    pub fn condition_evaluator(&self) -> &ConditionEvaluator {
        &self.conditions
    }

    /// Resolves the template for one file.
    pub fn resolve_template(
        &self,
        metadata: &UnifiedMetadata,
        metadata_rules: &[MetadataPatternRule],
        filename_rules: &[FilenameRule],
        templates: &[Template],
    ) -> TemplateResolutionResult {
        for entry in self.priority.evaluation_order(metadata_rules, filename_rules) {
            let matched = match entry {
                UnifiedRuleRef::Metadata(rule) => {
                    matches!(
                        evaluate_rule(&self.conditions, rule, metadata),
                        Ok(e) if e.matches
                    )
                }
                UnifiedRuleRef::Filename(rule) => matches!(
                    evaluate_filename_rule(&self.globs, rule, &metadata.file.full_name),
                    Ok(true)
                ),
            };
            if matched {
                return TemplateResolutionResult {
                    template_id: Some(entry.template_id().to_string()),
                    matched_rule_id: Some(entry.id().to_string()),
                    matched_rule_name: Some(entry.name().to_string()),
                    matched_family: Some(entry.family()),
                    reason: ResolutionReason::RuleMatch {
                        rule_id: entry.id().to_string(),
                    },
                };
            }
        }

        match default_template(templates) {
            Some(template) => TemplateResolutionResult {
                template_id: Some(template.id.clone()),
                matched_rule_id: None,
                matched_rule_name: None,
                matched_family: None,
                reason: ResolutionReason::DefaultFallback,
            },
            None => TemplateResolutionResult {
                template_id: None,
                matched_rule_id: None,
                matched_rule_name: None,
                matched_family: None,
                reason: ResolutionReason::NoDefaultAvailable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionOperator};
    use crate::metadata::{
        FileCategory, FileInfo, ImageMetadata, MetadataCapability, UnifiedMetadata,
    };
    use crate::rules::MatchMode;
    use chrono::Utc;
    use serde_json::json;

    fn canon_metadata() -> UnifiedMetadata {
        let file = FileInfo {
            path: "/photos/IMG_0001.jpg".to_string(),
            name: "IMG_0001".to_string(),
            extension: "jpg".to_string(),
            full_name: "IMG_0001.jpg".to_string(),
            size: 2_000_000,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            category: FileCategory::Image,
            metadata_supported: true,
            metadata_capability: MetadataCapability::Full,
        };
        UnifiedMetadata::from_image(
            file,
            ImageMetadata {
                camera_make: Some("Canon".to_string()),
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

    fn jpg_filename_rule(template_id: &str, priority: i32) -> FilenameRule {
        FilenameRule::new("jpg files", "{jpg,jpeg}", template_id).with_priority(priority)
    }

    fn default_tpl(id: &str) -> Template {
        let mut t = Template::new("fallback", "{name}").as_default();
        t.id = id.to_string();
        t
    }

    #[test]
    fn test_matching_rule_wins() {
        let resolver = TemplateResolver::new(RulePriorityMode::Combined);
        let result = resolver.resolve_template(
            &canon_metadata(),
            &[canon_rule("tpl-camera", 10)],
            &[],
            &[default_tpl("tpl-default")],
        );
        assert_eq!(result.template_id.as_deref(), Some("tpl-camera"));
        assert_eq!(result.matched_family, Some(RuleFamily::Metadata));
        assert!(matches!(result.reason, ResolutionReason::RuleMatch { .. }));
    }

    #[test]
    fn test_metadata_first_beats_higher_priority_filename_rule() {
        let resolver = TemplateResolver::new(RulePriorityMode::MetadataFirst);
        let result = resolver.resolve_template(
            &canon_metadata(),
            &[canon_rule("tpl-camera", 1)],
            &[jpg_filename_rule("tpl-jpg", 100)],
            &[],
        );
        // the filename rule's numeric priority is irrelevant in this mode
        assert_eq!(result.template_id.as_deref(), Some("tpl-camera"));
        assert_eq!(result.matched_family, Some(RuleFamily::Metadata));
    }

    #[test]
    fn test_combined_mode_respects_numeric_priority() {
        let resolver = TemplateResolver::new(RulePriorityMode::Combined);
        let result = resolver.resolve_template(
            &canon_metadata(),
            &[canon_rule("tpl-camera", 1)],
            &[jpg_filename_rule("tpl-jpg", 100)],
            &[],
        );
        assert_eq!(result.template_id.as_deref(), Some("tpl-jpg"));
        assert_eq!(result.matched_family, Some(RuleFamily::Filename));
    }

    #[test]
    fn test_combined_equal_priority_prefers_metadata() {
        let resolver = TemplateResolver::new(RulePriorityMode::Combined);
        let result = resolver.resolve_template(
            &canon_metadata(),
            &[canon_rule("tpl-camera", 5)],
            &[jpg_filename_rule("tpl-jpg", 5)],
            &[],
        );
        assert_eq!(result.template_id.as_deref(), Some("tpl-camera"));
    }

    #[test]
    fn test_default_fallback() {
        let resolver = TemplateResolver::new(RulePriorityMode::Combined);
        let result = resolver.resolve_template(
            &canon_metadata(),
            &[],
            &[],
            &[default_tpl("tpl-default")],
        );
        assert_eq!(result.template_id.as_deref(), Some("tpl-default"));
        assert_eq!(result.reason, ResolutionReason::DefaultFallback);
        assert!(result.matched_rule_id.is_none());
    }

    #[test]
    fn test_no_default_available() {
        let resolver = TemplateResolver::new(RulePriorityMode::Combined);
        let result = resolver.resolve_template(&canon_metadata(), &[], &[], &[]);
        assert!(result.template_id.is_none());
        assert_eq!(result.reason, ResolutionReason::NoDefaultAvailable);
    }

    #[test]
    fn test_broken_rule_skipped_resolution_continues() {
        let resolver = TemplateResolver::new(RulePriorityMode::Combined);
        let broken = MetadataPatternRule::new(
            "broken",
            vec![Condition::new(
                "file.name",
                ConditionOperator::MatchesRegex,
                json!("[bad"),
            )],
            MatchMode::All,
            "tpl-broken",
        )
        .with_priority(100);

        let result = resolver.resolve_template(
            &canon_metadata(),
            &[broken],
            &[jpg_filename_rule("tpl-jpg", 1)],
            &[],
        );
        assert_eq!(result.template_id.as_deref(), Some("tpl-jpg"));
    }
}
