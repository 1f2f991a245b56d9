// crates/observability/src/sanitize.rs
//! Sensitive-data redaction for span attributes and metric labels.
//!
//! `sanitize` is pure and idempotent: credential-shaped substrings are
//! masked with `***` keeping a short prefix, emails are partially
//! masked, long paths are abbreviated, and the result is truncated to
//! the mode's budget. Already-masked output passes through unchanged.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Truncation budget outside debug mode.
const MAX_LEN: usize = 1000;
/// Truncation budget in debug mode.
const MAX_LEN_DEBUG: usize = 2000;

/// Prefix characters preserved when masking a credential.
const MASK_PREFIX: usize = 6;
const MASK_PREFIX_DEBUG: usize = 12;

struct Patterns {
    sk_key: Regex,
    secret_assignment: Regex,
    long_token: Regex,
    email: Regex,
    long_path: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        // The trailing \*{0,3} swallows an existing mask so a second
        // pass recognises already-redacted keys (idempotence).
        sk_key: Regex::new(r"sk-[A-Za-z0-9_-]{8,}\*{0,3}").expect("static regex"),
        secret_assignment: Regex::new(
            r"(?i)(api[_-]?key|secret|token|password|authorization)\s*[=:]\s*([^\s,;]+)",
        )
        .expect("static regex"),
        long_token: Regex::new(r"\b[A-Za-z0-9]{40,}\b").expect("static regex"),
        email: Regex::new(
            r"\b([A-Za-z0-9._%+-])[A-Za-z0-9._%+-]*@([A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,})",
        )
        .expect("static regex"),
        long_path: Regex::new(r"(/[^/\s]+)(?:/[^/\s]+){3,}(/[^/\s]+)").expect("static regex"),
    })
}

fn mask(value: &str, prefix_len: usize) -> String {
    let prefix: String = value.chars().take(prefix_len).collect();
    format!("{prefix}***")
}

/// Redact a value before it becomes a span attribute or metric label.
///
/// Debug mode keeps longer prefixes and a larger truncation budget so
/// operators can still correlate values while masking the secret tail.
pub fn sanitize(value: &str, debug_mode: bool) -> String {
    let patterns = patterns();
    let prefix_len = if debug_mode { MASK_PREFIX_DEBUG } else { MASK_PREFIX };

    let mut out = patterns
        .sk_key
        .replace_all(value, |caps: &regex_lite::Captures| {
            if caps[0].ends_with("***") {
                caps[0].to_string()
            } else {
                mask(&caps[0], prefix_len)
            }
        })
        .into_owned();

    out = patterns
        .secret_assignment
        .replace_all(&out, |caps: &regex_lite::Captures| {
            // Idempotence: a value already reduced to a mask stays as-is.
            if caps[2].ends_with("***") {
                caps[0].to_string()
            } else {
                format!("{}={}", &caps[1], mask(&caps[2], prefix_len))
            }
        })
        .into_owned();

    out = patterns
        .long_token
        .replace_all(&out, |caps: &regex_lite::Captures| {
            mask(&caps[0], prefix_len)
        })
        .into_owned();

    out = patterns
        .email
        .replace_all(&out, "$1***@$2")
        .into_owned();

    out = patterns
        .long_path
        .replace_all(&out, "$1/...$2")
        .into_owned();

    let budget = if debug_mode { MAX_LEN_DEBUG } else { MAX_LEN };
    if out.chars().count() > budget {
        out = out.chars().take(budget).collect();
    }

    out
}
