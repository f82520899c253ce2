//! Strip code comments from diff text.
//!
//! Purely textual: `//` and `/* */` inside string literals are removed just
//! the same.

use std::sync::LazyLock;

use regex::Regex;

static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//.*").expect("valid line comment regex"));

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));

/// Remove `//` spans to end of line, then `/* ... */` blocks (across lines,
/// shortest match).
pub fn sanitize(diff: &str) -> String {
    let without_lines = LINE_COMMENT.replace_all(diff, "");
    BLOCK_COMMENT.replace_all(&without_lines, "").into_owned()
}
