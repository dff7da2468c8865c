//! Path exclusion rules.
//!
//! Framework internals, API routes and static assets never reach detection.
//! Callers can add their own rules on top of the built-in ones.

use crate::error::GateError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;

/// Path prefixes that are always skipped.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["/_nuxt/", "/__nuxt", "/api/"];

/// File extensions that are always skipped (case-sensitive).
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    "ico", "png", "jpg", "jpeg", "gif", "svg", "js", "css", "woff", "woff2", "webp", "avif",
];

static STATIC_ASSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.(ico|png|jpg|jpeg|gif|svg|js|css|woff|woff2|webp|avif)$")
        .expect("static asset regex")
});

/// A caller-supplied exclusion rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawExcludeRule")]
pub enum ExcludeRule {
    /// Excludes paths containing this substring.
    Literal(String),
    /// Excludes paths matching this expression anywhere.
    Pattern(Regex),
}

/// Serialized form: a bare string, or `{ "regex": "..." }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExcludeRule {
    Literal(String),
    Pattern { regex: String },
}

impl TryFrom<RawExcludeRule> for ExcludeRule {
    type Error = GateError;

    fn try_from(raw: RawExcludeRule) -> Result<Self, Self::Error> {
        match raw {
            RawExcludeRule::Literal(text) => Ok(ExcludeRule::Literal(text)),
            RawExcludeRule::Pattern { regex } => ExcludeRule::pattern(&regex),
        }
    }
}

impl ExcludeRule {
    /// Substring rule.
    pub fn literal(text: impl Into<String>) -> Self {
        ExcludeRule::Literal(text.into())
    }

    /// Regular-expression rule.
    pub fn pattern(pattern: &str) -> Result<Self, GateError> {
        Regex::new(pattern)
            .map(ExcludeRule::Pattern)
            .map_err(|source| GateError::InvalidExcludePattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Returns `true` if this rule excludes `path`.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            ExcludeRule::Literal(text) => path.contains(text.as_str()),
            ExcludeRule::Pattern(regex) => regex.is_match(path),
        }
    }
}

impl fmt::Display for ExcludeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExcludeRule::Literal(text) => write!(f, "\"{text}\""),
            ExcludeRule::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Why a path was excluded.
#[derive(Debug, Clone, Copy)]
pub enum ExclusionReason<'a> {
    /// Framework internals, API routes or a static asset.
    Default,
    /// The first caller rule that matched.
    Custom(&'a ExcludeRule),
}

impl fmt::Display for ExclusionReason<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Default => f.write_str("default"),
            ExclusionReason::Custom(rule) => write!(f, "custom {rule}"),
        }
    }
}

/// Returns the reason `path` is excluded, or `None` if it must be inspected.
///
/// Built-in rules are checked first, then `rules` in order.
pub fn exclusion_reason<'a>(path: &str, rules: &'a [ExcludeRule]) -> Option<ExclusionReason<'a>> {
    let builtin = DEFAULT_EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
        || STATIC_ASSET.is_match(path);
    if builtin {
        return Some(ExclusionReason::Default);
    }

    rules
        .iter()
        .find(|rule| rule.matches(path))
        .map(ExclusionReason::Custom)
}

/// Returns `true` if `path` skips detection entirely.
pub fn should_exclude_path(path: &str, rules: &[ExcludeRule]) -> bool {
    exclusion_reason(path, rules).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_framework_and_api_prefixes_are_excluded() {
        assert!(should_exclude_path("/_nuxt/app.js", &[]));
        assert!(should_exclude_path("/_nuxt/", &[]));
        assert!(should_exclude_path("/__nuxt_error", &[]));
        assert!(should_exclude_path("/api/visits", &[]));
    }

    #[test]
    fn test_prefix_must_be_exact() {
        assert!(!should_exclude_path("/api", &[]));
        assert!(!should_exclude_path("/_nuxt", &[]));
        assert!(!should_exclude_path("/docs/api/intro", &[]));
    }

    #[test]
    fn test_static_assets_are_excluded() {
        for path in [
            "/favicon.ico",
            "/img/logo.png",
            "/photo.jpeg",
            "/fonts/inter.woff2",
            "/hero.avif",
            "/bundle.min.js",
        ] {
            assert!(should_exclude_path(path, &[]), "{path} should be excluded");
        }
    }

    #[test]
    fn test_extension_match_is_case_sensitive_and_end_anchored() {
        assert!(!should_exclude_path("/FAVICON.ICO", &[]));
        assert!(!should_exclude_path("/logo.png/details", &[]));
        assert!(!should_exclude_path("/blog/json", &[]));
        assert!(!should_exclude_path("/", &[]));
    }

    #[test]
    fn test_literal_rule_is_substring_match() {
        let rules = vec![ExcludeRule::literal("health")];
        assert!(should_exclude_path("/internal/healthz", &rules));
        assert!(!should_exclude_path("/pricing", &rules));
    }

    #[test]
    fn test_pattern_rule() {
        let rules = vec![ExcludeRule::pattern(r"^/admin(/|$)").unwrap()];
        assert!(should_exclude_path("/admin", &rules));
        assert!(should_exclude_path("/admin/users", &rules));
        assert!(!should_exclude_path("/administrator", &rules));
    }

    #[test]
    fn test_first_matching_rule_is_reported() {
        let rules = vec![
            ExcludeRule::literal("/blog"),
            ExcludeRule::pattern("^/blog/drafts").unwrap(),
        ];
        let reason = exclusion_reason("/blog/drafts/1", &rules).unwrap();
        assert_eq!(reason.to_string(), "custom \"/blog\"");
    }

    #[test]
    fn test_builtin_rules_win_over_custom() {
        let rules = vec![ExcludeRule::literal("/api")];
        let reason = exclusion_reason("/api/x", &rules).unwrap();
        assert!(matches!(reason, ExclusionReason::Default));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = ExcludeRule::pattern("(unclosed").unwrap_err();
        assert!(matches!(err, GateError::InvalidExcludePattern { .. }));
    }

    #[test]
    fn test_rules_deserialize_from_mixed_list() {
        let json = r#"["/health", { "regex": "^/preview/" }]"#;
        let rules: Vec<ExcludeRule> = serde_json::from_str(json).unwrap();

        assert!(matches!(rules[0], ExcludeRule::Literal(ref s) if s == "/health"));
        assert!(matches!(rules[1], ExcludeRule::Pattern(_)));
        assert!(should_exclude_path("/preview/post", &rules));
    }

    #[test]
    fn test_invalid_pattern_fails_deserialization() {
        let json = r#"[{ "regex": "[" }]"#;
        assert!(serde_json::from_str::<Vec<ExcludeRule>>(json).is_err());
    }

    #[test]
    fn test_static_asset_regex_covers_extension_list() {
        for ext in DEFAULT_EXCLUDED_EXTENSIONS {
            assert!(STATIC_ASSET.is_match(&format!("/file.{ext}")), "{ext}");
            assert!(!STATIC_ASSET.is_match(&format!("/file.{ext}x")), "{ext}");
        }
        assert!(!STATIC_ASSET.is_match("/logo.PNG"));
    }

    proptest! {
        #[test]
        fn prop_asset_extensions_always_excluded(
            stem in "/[a-z0-9/_-]{0,32}",
            ext in proptest::sample::select(DEFAULT_EXCLUDED_EXTENSIONS),
        ) {
            let path = format!("{stem}.{ext}");
            prop_assert!(should_exclude_path(&path, &[]));
        }

        #[test]
        fn prop_paths_without_dot_or_reserved_prefix_are_inspected(
            path in "/[a-z0-9/-]{0,48}",
        ) {
            prop_assume!(!path.starts_with("/api/"));
            prop_assert!(!should_exclude_path(&path, &[]));
        }

        #[test]
        fn prop_literal_rule_excludes_any_path_containing_it(
            prefix in "/[a-z]{0,10}",
            needle in "[a-z]{1,8}",
            suffix in "[a-z/]{0,10}",
        ) {
            let rules = vec![ExcludeRule::literal(needle.clone())];
            let path = format!("{prefix}{needle}{suffix}");
            prop_assert!(should_exclude_path(&path, &rules));
        }
    }
}
