//! Flag validation.
//!
//! [`validate`] is a pure function of the rule and the attempt: no I/O, no
//! hidden state. For `file_exists` rules the caller resolves the artifact
//! beforehand and passes the answer in [`FlagAttempt::artifact_exists`].

use std::collections::HashMap;

use parking_lot::RwLock;
use regex::Regex;

use crate::error::{GradeError, Result};
use crate::model::{FlagCheck, FlagKind, FlagRule};

/// A submitted flag value plus anything precomputed by collaborators.
#[derive(Debug, Clone, Copy)]
pub struct FlagAttempt<'a> {
    pub value: &'a str,
    /// Result of the artifact lookup; ignored by non-`file_exists` rules.
    pub artifact_exists: bool,
}

impl<'a> FlagAttempt<'a> {
    pub fn new(value: &'a str) -> Self {
        Self {
            value,
            artifact_exists: false,
        }
    }

    pub fn with_artifact(value: &'a str, exists: bool) -> Self {
        Self {
            value,
            artifact_exists: exists,
        }
    }
}

/// Compiled flag patterns, keyed by the pattern source.
///
/// Each [`ContentVersion`](crate::model::ContentVersion) owns one, filled while
/// the version is validated, so grading never recompiles a pattern.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl PatternCache {
    /// The anchored regex for `pattern`, compiling it on first use.
    pub fn get(&self, pattern: &str) -> Result<Regex> {
        if let Some(re) = self.compiled.read().get(pattern) {
            return Ok(re.clone());
        }
        let re = compile_anchored(pattern)?;
        self.compiled.write().insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for PatternCache {
    fn clone(&self) -> Self {
        Self {
            compiled: RwLock::new(self.compiled.read().clone()),
        }
    }
}

/// Decide whether an attempt satisfies a flag rule.
///
/// Blank submissions are never correct. The only error is a regex pattern that
/// does not compile, which is a content bug. Regex rules are compiled on every
/// call; graders holding a snapshot use [`validate_cached`].
pub fn validate(rule: &FlagRule, attempt: FlagAttempt<'_>) -> Result<bool> {
    validate_cached(rule, attempt, &PatternCache::default())
}

/// [`validate`] with regex rules looked up in `patterns`.
pub fn validate_cached(
    rule: &FlagRule,
    attempt: FlagAttempt<'_>,
    patterns: &PatternCache,
) -> Result<bool> {
    let value = attempt.value.trim();
    if value.is_empty() {
        return Ok(false);
    }

    match &rule.check {
        FlagCheck::Exact {
            pattern,
            case_sensitive,
        } => {
            if *case_sensitive {
                Ok(value == pattern)
            } else {
                Ok(value.to_lowercase() == pattern.to_lowercase())
            }
        }
        FlagCheck::Regex { pattern } => Ok(patterns.get(pattern)?.is_match(value)),
        FlagCheck::FileExists => Ok(attempt.artifact_exists),
    }
}

/// Compile a flag pattern as a full-string match.
pub fn compile_anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| GradeError::Configuration(format!("invalid regex '{pattern}': {e}")))
}

/// Build a [`FlagCheck`] from loosely-typed content fields.
///
/// `value` is accepted as an alias of `pattern` for `exact` rules. Unknown
/// kinds and missing patterns are configuration errors.
pub fn check_from_parts(
    kind: &str,
    pattern: Option<String>,
    value: Option<String>,
    case_sensitive: bool,
) -> Result<FlagCheck> {
    let kind: FlagKind = kind.parse()?;
    match kind {
        FlagKind::Exact => {
            let pattern = value
                .or(pattern)
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| {
                    GradeError::Configuration("exact validator requires a value".into())
                })?;
            Ok(FlagCheck::Exact {
                pattern: pattern.trim().to_string(),
                case_sensitive,
            })
        }
        FlagKind::Regex => {
            let pattern = pattern.filter(|p| !p.is_empty()).ok_or_else(|| {
                GradeError::Configuration("regex validator requires a pattern".into())
            })?;
            compile_anchored(&pattern)?;
            Ok(FlagCheck::Regex { pattern })
        }
        FlagKind::FileExists => Ok(FlagCheck::FileExists),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(check: FlagCheck) -> FlagRule {
        FlagRule {
            name: "f".into(),
            prompt: String::new(),
            check,
        }
    }

    fn exact(pattern: &str) -> FlagRule {
        rule(FlagCheck::Exact {
            pattern: pattern.into(),
            case_sensitive: true,
        })
    }

    #[test]
    fn exact_is_case_sensitive_by_default() {
        let r = exact("FLAG{abc}");
        assert!(validate(&r, FlagAttempt::new("FLAG{abc}")).unwrap());
        assert!(!validate(&r, FlagAttempt::new("flag{abc}")).unwrap());
    }

    #[test]
    fn exact_trims_submission() {
        let r = exact("FLAG{abc}");
        assert!(validate(&r, FlagAttempt::new("  FLAG{abc}\n")).unwrap());
    }

    #[test]
    fn exact_case_insensitive_rule() {
        let r = rule(FlagCheck::Exact {
            pattern: "FLAG{abc}".into(),
            case_sensitive: false,
        });
        assert!(validate(&r, FlagAttempt::new("flag{ABC}")).unwrap());
    }

    #[test]
    fn regex_is_full_match() {
        let r = rule(FlagCheck::Regex {
            pattern: r"CTF\{[a-z]+\}".into(),
        });
        assert!(validate(&r, FlagAttempt::new("CTF{ok}")).unwrap());
        assert!(!validate(&r, FlagAttempt::new("xxCTF{ok}")).unwrap());
        assert!(!validate(&r, FlagAttempt::new("CTF{ok}yy")).unwrap());
    }

    #[test]
    fn regex_with_explicit_anchors() {
        let r = rule(FlagCheck::Regex {
            pattern: r"^CTF\{.+\}$".into(),
        });
        assert!(validate(&r, FlagAttempt::new("CTF{ok}")).unwrap());
        assert!(!validate(&r, FlagAttempt::new("nope")).unwrap());
    }

    #[test]
    fn regex_alternation_stays_anchored() {
        let r = rule(FlagCheck::Regex {
            pattern: "a|b".into(),
        });
        assert!(validate(&r, FlagAttempt::new("a")).unwrap());
        assert!(!validate(&r, FlagAttempt::new("ab")).unwrap());
    }

    #[test]
    fn file_exists_uses_precomputed_lookup() {
        let r = rule(FlagCheck::FileExists);
        assert!(validate(&r, FlagAttempt::with_artifact("loot.txt", true)).unwrap());
        assert!(!validate(&r, FlagAttempt::with_artifact("loot.txt", false)).unwrap());
    }

    #[test]
    fn blank_submission_always_invalid() {
        let rules = [
            exact("x"),
            rule(FlagCheck::Regex {
                pattern: ".*".into(),
            }),
            rule(FlagCheck::FileExists),
        ];
        for r in &rules {
            assert!(!validate(r, FlagAttempt::with_artifact("   ", true)).unwrap());
            assert!(!validate(r, FlagAttempt::with_artifact("", true)).unwrap());
        }
    }

    #[test]
    fn broken_regex_is_configuration_error() {
        let r = rule(FlagCheck::Regex {
            pattern: "CTF{(".into(),
        });
        let err = validate(&r, FlagAttempt::new("CTF{")).unwrap_err();
        assert!(matches!(err, GradeError::Configuration(_)));
    }

    #[test]
    fn pattern_cache_compiles_each_pattern_once() {
        let patterns = PatternCache::default();
        let r = rule(FlagCheck::Regex {
            pattern: r"CTF\{[a-z]+\}".into(),
        });
        assert!(validate_cached(&r, FlagAttempt::new("CTF{abc}"), &patterns).unwrap());
        assert!(!validate_cached(&r, FlagAttempt::new("xCTF{abc}"), &patterns).unwrap());
        assert_eq!(patterns.len(), 1);

        let broken = rule(FlagCheck::Regex {
            pattern: "(".into(),
        });
        assert!(validate_cached(&broken, FlagAttempt::new("x"), &patterns).is_err());
        assert_eq!(patterns.len(), 1);
    }

    #[test]
    fn check_from_parts_variants() {
        let check = check_from_parts("exact", None, Some(" CTF{hi} ".into()), true).unwrap();
        assert_eq!(
            check,
            FlagCheck::Exact {
                pattern: "CTF{hi}".into(),
                case_sensitive: true
            }
        );
        assert!(check_from_parts("exact", None, None, true).is_err());
        assert!(check_from_parts("regex", None, None, true).is_err());
        assert!(check_from_parts("regex", Some("(".into()), None, true).is_err());
        assert_eq!(
            check_from_parts("file_exists", None, None, true).unwrap(),
            FlagCheck::FileExists
        );
        let err = check_from_parts("checksum", None, None, true).unwrap_err();
        assert!(err.to_string().contains("unknown validator kind"));
    }
}
