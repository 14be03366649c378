/// Filename glob matching with brace expansion.
///
/// Filename rules carry glob patterns like `*.{jpg,png}` or `IMG_*`. The
/// `glob` crate handles the wildcard matching but has no brace syntax, so
/// patterns are expanded into their alternatives first and a filename
/// matches when any alternative does.
///
/// Two conveniences match the application's rule format:
/// - an alternative with no glob metacharacters and no dot is extension
///   shorthand, so `{jpg,png}` matches `photo.png`;
/// - matching is case-insensitive and anchored over the full filename.
use glob::{MatchOptions, Pattern};

/// Errors from compiling a filename glob pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobError {
    /// The pattern has an unmatched `{` or `}`.
    UnbalancedBrace { pattern: String },
    /// An expanded alternative is not a valid glob.
    InvalidPattern { pattern: String, reason: String },
}

impl std::fmt::Display for GlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobError::UnbalancedBrace { pattern } => {
                write!(f, "Unbalanced braces in glob pattern '{}'", pattern)
            }
            GlobError::InvalidPattern { pattern, reason } => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for GlobError {}

/// Result type for glob compilation.
pub type GlobResult<T> = Result<T, GlobError>;

/// A glob pattern compiled into its expanded alternatives.
#[derive(Debug, Clone)]
pub struct CompiledGlobPattern {
    source: String,
    alternatives: Vec<Pattern>,
}

impl CompiledGlobPattern {
    /// The original pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tests a filename against the pattern. Anchored and case-insensitive.
    pub fn matches(&self, filename: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.alternatives
            .iter()
            .any(|p| p.matches_with(filename, options))
    }
}

/// Compiles a glob pattern, expanding brace groups into alternatives.
pub fn compile_glob_pattern(pattern: &str) -> GlobResult<CompiledGlobPattern> {
    let alternatives = expand_braces(pattern)?
        .into_iter()
        .map(|alt| {
            let normalized = normalize_alternative(&alt);
            Pattern::new(&normalized).map_err(|e| GlobError::InvalidPattern {
                pattern: alt.clone(),
                reason: e.to_string(),
            })
        })
        .collect::<GlobResult<Vec<_>>>()?;

    Ok(CompiledGlobPattern {
        source: pattern.to_string(),
        alternatives,
    })
}

/// One-shot convenience: compile and match in a single call.
pub fn is_glob_match(pattern: &str, filename: &str) -> GlobResult<bool> {
    Ok(compile_glob_pattern(pattern)?.matches(filename))
}

/// Matcher with a compilation cache, for evaluating rule sets over many
/// files. Cache writes are idempotent (recompiling an already-cached
/// pattern yields an identical entry), so concurrent first-writes are
/// harmless. `clear_cache` exists for test isolation.
pub struct GlobMatcher {
    cache: std::sync::RwLock<std::collections::HashMap<String, CompiledGlobPattern>>,
}

impl Default for GlobMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobMatcher {
    pub fn new() -> Self {
        Self {
            cache: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Tests a filename against a pattern, compiling and caching the
    /// pattern on first use.
    pub fn matches(&self, pattern: &str, filename: &str) -> GlobResult<bool> {
        if let Ok(cache) = self.cache.read()
            && let Some(compiled) = cache.get(pattern)
        {
            return Ok(compiled.matches(filename));
        }

        let compiled = compile_glob_pattern(pattern)?;
        let matched = compiled.matches(filename);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(pattern.to_string(), compiled);
        }
        Ok(matched)
    }

    /// Drops every cached pattern. Intended for test isolation.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

/// A bare alternative (no wildcards, no dot) is extension shorthand.
fn normalize_alternative(alternative: &str) -> String {
    let has_meta = alternative
        .chars()
        .any(|c| matches!(c, '*' | '?' | '[' | '.'));
    if alternative.is_empty() || has_meta {
        alternative.to_string()
    } else {
        format!("*.{}", alternative)
    }
}

/// Expands every `{a,b}` group into the full list of alternatives.
///
/// Groups may nest (`{a,b{1,2}}` → `a`, `b1`, `b2`); commas inside a nested
/// group belong to that group.
pub fn expand_braces(pattern: &str) -> GlobResult<Vec<String>> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err(GlobError::UnbalancedBrace {
                pattern: pattern.to_string(),
            });
        }
        return Ok(vec![pattern.to_string()]);
    };

    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in pattern.char_indices() {
        if i < open {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return Err(GlobError::UnbalancedBrace {
            pattern: pattern.to_string(),
        });
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    for alternative in split_alternatives(body) {
        let candidate = format!("{}{}{}", prefix, alternative, suffix);
        expanded.extend(expand_braces(&candidate)?);
    }
    Ok(expanded)
}

/// Splits a brace body on top-level commas only.
fn split_alternatives(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in body.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_shorthand() {
        assert!(is_glob_match("{jpg,png}", "photo.png").unwrap());
        assert!(is_glob_match("{jpg,png}", "photo.jpg").unwrap());
        assert!(!is_glob_match("{jpg,png}", "photo.gif").unwrap());
    }

    #[test]
    fn test_explicit_wildcard_braces() {
        assert!(is_glob_match("*.{jpg,png}", "holiday.JPG").unwrap());
        assert!(is_glob_match("IMG_*.{jpg,heic}", "IMG_0042.heic").unwrap());
        assert!(!is_glob_match("IMG_*.{jpg,heic}", "DSC_0042.heic").unwrap());
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert!(is_glob_match("{jpg,png}", "PHOTO.PNG").unwrap());
        assert!(is_glob_match("invoice-*", "Invoice-2024.pdf").unwrap());
    }

    #[test]
    fn test_match_is_anchored_over_full_name() {
        // `report` alone is extension shorthand, not a substring match
        assert!(!is_glob_match("{report}", "report.pdf").unwrap());
        assert!(is_glob_match("report.*", "report.pdf").unwrap());
        assert!(!is_glob_match("port.*", "report.pdf").unwrap());
    }

    #[test]
    fn test_expand_braces_plain_pattern() {
        assert_eq!(expand_braces("*.txt").unwrap(), vec!["*.txt".to_string()]);
    }

    #[test]
    fn test_expand_braces_multiple_groups() {
        let expanded = expand_braces("{a,b}-{1,2}").unwrap();
        assert_eq!(
            expanded,
            vec![
                "a-1".to_string(),
                "a-2".to_string(),
                "b-1".to_string(),
                "b-2".to_string()
            ]
        );
    }

    #[test]
    fn test_expand_braces_nested() {
        let expanded = expand_braces("{a,b{1,2}}").unwrap();
        assert_eq!(
            expanded,
            vec!["a".to_string(), "b1".to_string(), "b2".to_string()]
        );
    }

    #[test]
    fn test_unbalanced_braces_error() {
        assert!(matches!(
            expand_braces("{jpg,png"),
            Err(GlobError::UnbalancedBrace { .. })
        ));
        assert!(matches!(
            expand_braces("jpg}"),
            Err(GlobError::UnbalancedBrace { .. })
        ));
    }

    #[test]
    fn test_matcher_caches_patterns() {
        let matcher = GlobMatcher::new();
        assert!(matcher.matches("*.{jpg,png}", "a.png").unwrap());
        // cache hit path
        assert!(matcher.matches("*.{jpg,png}", "b.jpg").unwrap());
        matcher.clear_cache();
        assert!(!matcher.matches("*.{jpg,png}", "c.gif").unwrap());
    }

    #[test]
    fn test_invalid_glob_alternative_error() {
        assert!(matches!(
            compile_glob_pattern("[unclosed"),
            Err(GlobError::InvalidPattern { .. })
        ));
    }
}
