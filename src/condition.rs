/// Single-condition evaluation for metadata pattern rules.
///
/// A condition pairs a dotted field path with an operator and a JSON value
/// (the on-disk rule format stores condition values as JSON scalars).
/// Evaluation is deliberately forgiving: a missing field or a type-mismatched
/// comparison is a non-match, not an error. Only structural problems, a
/// malformed field path or an invalid regex, surface as errors, so broken
/// rules stay visible instead of silently never matching.
use crate::field::{FieldResolutionError, FieldValue, ResolvedField, resolve_field};
use crate::metadata::UnifiedMetadata;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Comparison operator of a rule condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Exists,
    NotExists,
    MatchesRegex,
}

/// One condition of a metadata pattern rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Dotted field path, e.g. `image.cameraMake`.
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison value. Ignored by `exists` / `not-exists`.
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Errors from evaluating a single condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEvaluationError {
    /// The regex pattern of a `matches-regex` condition failed to compile.
    InvalidRegex { pattern: String, reason: String },
    /// The condition's field path is structurally malformed.
    Field(FieldResolutionError),
}

impl std::fmt::Display for ConditionEvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionEvaluationError::InvalidRegex { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConditionEvaluationError::Field(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConditionEvaluationError {}

impl From<FieldResolutionError> for ConditionEvaluationError {
    fn from(e: FieldResolutionError) -> Self {
        ConditionEvaluationError::Field(e)
    }
}

/// Result type for condition evaluation.
pub type ConditionResult<T> = Result<T, ConditionEvaluationError>;

/// Evaluates conditions against metadata records.
///
/// Owns the regex compilation cache: patterns are compiled once per
/// evaluator and reused across files. Cache writes are idempotent, so
/// concurrent first-compilations of the same pattern are harmless;
/// `clear_cache` exists for test isolation.
pub struct ConditionEvaluator {
    regex_cache: RwLock<HashMap<String, Regex>>,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self {
            regex_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluates one condition against a metadata record.
    ///
    /// `exists` / `not-exists` answer presence directly. Every other
    /// operator evaluates to `false` when the field is absent or the value
    /// types are not comparable.
    pub fn evaluate(
        &self,
        condition: &Condition,
        metadata: &UnifiedMetadata,
    ) -> ConditionResult<bool> {
        let resolved = resolve_field(metadata, &condition.field)?;

        match condition.operator {
            ConditionOperator::Exists => return Ok(resolved.exists()),
            ConditionOperator::NotExists => return Ok(!resolved.exists()),
            _ => {}
        }

        let ResolvedField::Present(value) = resolved else {
            // Absence is not failure: non-presence operators just don't match.
            return Ok(false);
        };

        match condition.operator {
            ConditionOperator::Equals => Ok(compare_eq(&value, &condition.value) == Some(true)),
            ConditionOperator::NotEquals => {
                Ok(compare_eq(&value, &condition.value) == Some(false))
            }
            ConditionOperator::Contains => Ok(string_op(&value, &condition.value, |f, v| {
                f.to_lowercase().contains(&v.to_lowercase())
            })),
            ConditionOperator::StartsWith => Ok(string_op(&value, &condition.value, |f, v| {
                f.to_lowercase().starts_with(&v.to_lowercase())
            })),
            ConditionOperator::EndsWith => Ok(string_op(&value, &condition.value, |f, v| {
                f.to_lowercase().ends_with(&v.to_lowercase())
            })),
            ConditionOperator::GreaterThan => {
                Ok(compare_order(&value, &condition.value) == Some(std::cmp::Ordering::Greater))
            }
            ConditionOperator::LessThan => {
                Ok(compare_order(&value, &condition.value) == Some(std::cmp::Ordering::Less))
            }
            ConditionOperator::MatchesRegex => self.matches_regex(&value, &condition.value),
            ConditionOperator::Exists | ConditionOperator::NotExists => unreachable!(),
        }
    }

    fn matches_regex(
        &self,
        value: &FieldValue,
        pattern: &serde_json::Value,
    ) -> ConditionResult<bool> {
        let Some(pattern) = pattern.as_str() else {
            return Ok(false);
        };
        let FieldValue::Str(haystack) = value else {
            return Ok(false);
        };
        let regex = self.cached_regex(pattern)?;
        Ok(regex.is_match(haystack))
    }

    /// Returns the compiled regex for a pattern, compiling and caching it on
    /// first use.
    fn cached_regex(&self, pattern: &str) -> ConditionResult<Regex> {
        if let Ok(cache) = self.regex_cache.read()
            && let Some(regex) = cache.get(pattern)
        {
            return Ok(regex.clone());
        }

        let regex =
            Regex::new(pattern).map_err(|e| ConditionEvaluationError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        if let Ok(mut cache) = self.regex_cache.write() {
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }

    /// Drops every cached regex. Intended for test isolation.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.regex_cache.write() {
            cache.clear();
        }
    }
}

/// Typed equality between a resolved field and a JSON condition value.
/// `None` means the two are not comparable.
fn compare_eq(field: &FieldValue, value: &serde_json::Value) -> Option<bool> {
    match (field, value) {
        (FieldValue::Str(f), serde_json::Value::String(v)) => Some(f == v),
        (FieldValue::Number(f), serde_json::Value::Number(v)) => {
            v.as_f64().map(|v| (*f - v).abs() < f64::EPSILON)
        }
        (FieldValue::Bool(f), serde_json::Value::Bool(v)) => Some(f == v),
        (FieldValue::Date(f), serde_json::Value::String(v)) => {
            parse_date_value(v).map(|v| *f == v)
        }
        _ => None,
    }
}

/// Typed ordering between a resolved field and a JSON condition value.
/// `None` means the two are not comparable; dates compare by instant.
fn compare_order(field: &FieldValue, value: &serde_json::Value) -> Option<std::cmp::Ordering> {
    match (field, value) {
        (FieldValue::Number(f), serde_json::Value::Number(v)) => {
            v.as_f64().and_then(|v| f.partial_cmp(&v))
        }
        (FieldValue::Date(f), serde_json::Value::String(v)) => {
            parse_date_value(v).map(|v| f.cmp(&v))
        }
        _ => None,
    }
}

fn string_op(
    field: &FieldValue,
    value: &serde_json::Value,
    op: impl Fn(&str, &str) -> bool,
) -> bool {
    match (field, value) {
        (FieldValue::Str(f), serde_json::Value::String(v)) => op(f, v),
        _ => false,
    }
}

/// Parses a condition's date value: RFC 3339 first, then a bare
/// `YYYY-MM-DD` (interpreted as midnight UTC).
fn parse_date_value(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        FileCategory, FileInfo, ImageMetadata, MetadataCapability, UnifiedMetadata,
    };
    use chrono::TimeZone;
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
                date_taken: Some(Utc.with_ymd_and_hms(2023, 6, 15, 10, 30, 0).unwrap()),
                iso: Some(400),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_equals_matches() {
        let evaluator = ConditionEvaluator::new();
        let condition = Condition::new(
            "image.cameraMake",
            ConditionOperator::Equals,
            json!("Canon"),
        );
        assert!(evaluator.evaluate(&condition, &canon_metadata()).unwrap());
    }

    #[test]
    fn test_equals_on_absent_field_is_false() {
        let evaluator = ConditionEvaluator::new();
        let condition = Condition::new("pdf.title", ConditionOperator::Equals, json!("Report"));
        assert!(!evaluator.evaluate(&condition, &canon_metadata()).unwrap());
    }

    #[test]
    fn test_exists_and_not_exists() {
        let evaluator = ConditionEvaluator::new();
        let meta = canon_metadata();

        let exists = Condition::new("image.cameraMake", ConditionOperator::Exists, json!(null));
        assert!(evaluator.evaluate(&exists, &meta).unwrap());

        let not_exists = Condition::new("image.gps", ConditionOperator::NotExists, json!(null));
        assert!(evaluator.evaluate(&not_exists, &meta).unwrap());
    }

    #[test]
    fn test_numeric_comparisons() {
        let evaluator = ConditionEvaluator::new();
        let meta = canon_metadata();

        let gt = Condition::new("file.size", ConditionOperator::GreaterThan, json!(1_000_000));
        assert!(evaluator.evaluate(&gt, &meta).unwrap());

        let lt = Condition::new("image.iso", ConditionOperator::LessThan, json!(100));
        assert!(!evaluator.evaluate(&lt, &meta).unwrap());
    }

    #[test]
    fn test_type_mismatch_is_non_match() {
        let evaluator = ConditionEvaluator::new();
        let meta = canon_metadata();

        // numeric operator against a string field
        let gt = Condition::new(
            "image.cameraMake",
            ConditionOperator::GreaterThan,
            json!(10),
        );
        assert!(!evaluator.evaluate(&gt, &meta).unwrap());

        // equality across types
        let eq = Condition::new("file.size", ConditionOperator::Equals, json!("big"));
        assert!(!evaluator.evaluate(&eq, &meta).unwrap());

        // not-equals across types is also a non-match, not a wildcard
        let ne = Condition::new("file.size", ConditionOperator::NotEquals, json!("big"));
        assert!(!evaluator.evaluate(&ne, &meta).unwrap());
    }

    #[test]
    fn test_string_operators_ignore_case() {
        let evaluator = ConditionEvaluator::new();
        let meta = canon_metadata();

        let contains = Condition::new("image.cameraMake", ConditionOperator::Contains, json!("anon"));
        assert!(evaluator.evaluate(&contains, &meta).unwrap());

        let starts = Condition::new("file.name", ConditionOperator::StartsWith, json!("img_"));
        assert!(evaluator.evaluate(&starts, &meta).unwrap());

        let ends = Condition::new("file.fullName", ConditionOperator::EndsWith, json!(".JPG"));
        assert!(evaluator.evaluate(&ends, &meta).unwrap());
    }

    #[test]
    fn test_date_comparison_by_instant() {
        let evaluator = ConditionEvaluator::new();
        let meta = canon_metadata();

        let after = Condition::new(
            "image.dateTaken",
            ConditionOperator::GreaterThan,
            json!("2023-01-01"),
        );
        assert!(evaluator.evaluate(&after, &meta).unwrap());

        let before = Condition::new(
            "image.dateTaken",
            ConditionOperator::LessThan,
            json!("2023-01-01T00:00:00Z"),
        );
        assert!(!evaluator.evaluate(&before, &meta).unwrap());
    }

    #[test]
    fn test_regex_match_and_cache() {
        let evaluator = ConditionEvaluator::new();
        let meta = canon_metadata();

        let condition = Condition::new(
            "file.name",
            ConditionOperator::MatchesRegex,
            json!(r"^IMG_\d{4}$"),
        );
        assert!(evaluator.evaluate(&condition, &meta).unwrap());
        // second evaluation hits the cache
        assert!(evaluator.evaluate(&condition, &meta).unwrap());

        evaluator.clear_cache();
        assert!(evaluator.evaluate(&condition, &meta).unwrap());
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let evaluator = ConditionEvaluator::new();
        let condition = Condition::new(
            "file.name",
            ConditionOperator::MatchesRegex,
            json!("[unclosed"),
        );
        let result = evaluator.evaluate(&condition, &canon_metadata());
        assert!(matches!(
            result,
            Err(ConditionEvaluationError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_regex_on_absent_field_is_false_without_compiling() {
        let evaluator = ConditionEvaluator::new();
        // invalid pattern, but the field is absent so evaluation never
        // reaches the compiler
        let condition = Condition::new(
            "pdf.title",
            ConditionOperator::MatchesRegex,
            json!("[unclosed"),
        );
        assert!(!evaluator.evaluate(&condition, &canon_metadata()).unwrap());
    }

    #[test]
    fn test_malformed_path_is_an_error() {
        let evaluator = ConditionEvaluator::new();
        let condition = Condition::new("image..make", ConditionOperator::Equals, json!("x"));
        assert!(matches!(
            evaluator.evaluate(&condition, &canon_metadata()),
            Err(ConditionEvaluationError::Field(_))
        ));
    }
}
