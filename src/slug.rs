//! Slug grammar for tenant identifiers.

use std::sync::LazyLock;

use regex::Regex;

/// Full-match grammar: 3 to 50 ASCII letters, digits, `_` or `-`.
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,50}$").expect("slug grammar is a valid regex"));

/// Check `token` against the slug grammar.
///
/// No normalization happens here; callers fold case first.
pub fn is_valid_slug(token: &str) -> bool {
    SLUG_RE.is_match(token)
}
