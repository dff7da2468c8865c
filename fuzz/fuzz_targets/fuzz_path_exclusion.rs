#![no_main]

//! Fuzz target for path exclusion.
//!
//! # Goal
//! Verify that arbitrary paths and arbitrary custom rules never cause:
//! - Panics
//! - A built-in excluded path being inspected
//! - Rule order being ignored

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spyglasses_gate::exclusion::{exclusion_reason, ExcludeRule, ExclusionReason};

#[derive(Arbitrary, Debug)]
struct Input {
    path: String,
    literals: Vec<String>,
    pattern: Option<String>,
}

fuzz_target!(|input: Input| {
    let mut rules: Vec<ExcludeRule> = input
        .literals
        .iter()
        .take(8)
        .map(|l| ExcludeRule::literal(l.clone()))
        .collect();

    // Invalid expressions are a config error, not a crash
    if let Some(pattern) = input.pattern.as_deref() {
        if pattern.len() <= 64 {
            if let Ok(rule) = ExcludeRule::pattern(pattern) {
                rules.push(rule);
            }
        }
    }

    let reason = exclusion_reason(&input.path, &rules);

    if input.path.starts_with("/api/") || input.path.starts_with("/_nuxt/") {
        assert!(matches!(reason, Some(ExclusionReason::Default)));
    }

    if let Some(ExclusionReason::Custom(rule)) = reason {
        // The reported rule must be the first one that matches
        let first = rules.iter().position(|r| r.matches(&input.path));
        let reported = rules.iter().position(|r| std::ptr::eq(r, rule));
        assert_eq!(first, reported);
    }
});
