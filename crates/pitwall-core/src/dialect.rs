//! Repair of the upstream feed's non-compliant JSON dialect.
//!
//! The feed emits Python-flavoured text: single-quoted strings, bare
//! `True`/`False`, and double quotes embedded unescaped inside words
//! (`DELL"EMILIA`). [`normalize`] rewrites that text in three fixed steps,
//! each relying on the previous one:
//!
//! 1. every `'` becomes `"`
//! 2. bare `True`/`False` become `true`/`false`
//! 3. a `"` with a word character on both sides is escaped
//!
//! Step 3 is a heuristic. It rewrites content as well as syntax: an
//! apostrophe inside a value comes out as an escaped double quote, and a
//! quote next to a space is left unrepaired. There is no way to tell a
//! repaired frame from a corrupted one short of parsing it, so [`decode`]
//! reports unparseable results as [`CoreError::MalformedPayload`] and
//! callers drop those frames.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::CoreError;

static BARE_TRUE: LazyLock<Regex> = LazyLock::new(|| compile(r"\bTrue\b"));
static BARE_FALSE: LazyLock<Regex> = LazyLock::new(|| compile(r"\bFalse\b"));
static EMBEDDED_QUOTE: LazyLock<Regex> = LazyLock::new(|| compile(r#"(\w)"(\w)"#));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    // Patterns are literals above; a failure here is a programming error.
    Regex::new(pattern).expect("static dialect pattern must compile")
}

/// Rewrite dialect text into text a standard JSON parser accepts.
///
/// The result is not guaranteed to parse; see the module docs.
pub fn normalize(raw: &str) -> String {
    let quoted = raw.replace('\'', "\"");
    let trued = BARE_TRUE.replace_all(&quoted, "true");
    let falsed = BARE_FALSE.replace_all(&trued, "false");
    EMBEDDED_QUOTE
        .replace_all(&falsed, r#"$1\"$2"#)
        .into_owned()
}

/// Normalize and parse a raw frame.
///
/// # Errors
///
/// Returns [`CoreError::MalformedPayload`] if the normalized text is not
/// valid JSON.
pub fn decode(raw: &str) -> Result<Value, CoreError> {
    let repaired = normalize(raw);
    serde_json::from_str(&repaired).map_err(|e| CoreError::malformed(e.to_string(), raw))
}
