//! Script-based input language detection

use chatflow_api::Language;
use regex::Regex;
use std::sync::LazyLock;

static HANGUL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Hangul}").unwrap());

/// Whether the text contains any Hangul character
pub fn contains_korean(text: &str) -> bool {
    HANGUL.is_match(text)
}

/// Detect a non-default input language from the script in use.
///
/// Returns `None` when nothing marks the text as anything but the default.
pub fn detect_language(text: &str) -> Option<Language> {
    if contains_korean(text) {
        Some(Language::Korean)
    } else {
        None
    }
}
