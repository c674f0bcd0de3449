//! Textual cleanup applied to command payloads before JSON parsing.
//!
//! The gateway occasionally ships bodies with unescaped backslashes, stray
//! newlines, and (for chat messages) a nested-quoted `extra` field. The
//! transformations run in a fixed order and are pure, so their edge cases are
//! tested apart from classification.

use std::sync::LazyLock;

use regex::Regex;

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r]").expect("literal character class"));

/// Chat-message bodies nest a quoted JSON object in their `extra` field;
/// these rewrites unwrap it so the body parses as one structure.
const CHAT_EXTRA_REWRITES: [(&str, &str); 3] =
    [("\"extra\":\"", "\"extra\":"), ("\"{}\",", ""), ("}\",\"", "},\"")];

/// Normalize a raw command payload:
/// 1. escape bare backslashes,
/// 2. strip newlines and carriage returns,
/// 3. trim surrounding whitespace,
/// 4. for chat messages, unwrap the nested-quoted `extra` field.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut text = if raw.contains('\\') {
        raw.replace('\\', "\\\\")
    } else {
        raw.to_string()
    };

    text = LINE_BREAKS.replace_all(&text, "").into_owned();
    text = text.trim().to_string();

    if text.contains("DANMU_MSG") {
        for (from, to) in CHAT_EXTRA_REWRITES {
            text = text.replace(from, to);
        }
    }

    text
}
