//! Shared utilities

use chatflow_widget::Role;

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Short label for a message role
pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User | Role::PendingUser => "you",
        Role::Assistant => "bot",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("안녕하세요", 2), "안녕...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
