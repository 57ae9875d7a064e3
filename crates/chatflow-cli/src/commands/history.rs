//! /history command - show the conversation with its sources

use super::CommandResult;
use chatflow_widget::{Message, sources::dedupe_sources};

use crate::utils::{role_label, truncate_chars};

pub struct HistoryCommand;

impl HistoryCommand {
    pub fn execute(messages: &[Message]) -> CommandResult {
        CommandResult::Message(format_history(messages))
    }
}

/// One line per message, sources indented beneath it
pub fn format_history(messages: &[Message]) -> String {
    let mut output = String::new();
    for (i, message) in messages.iter().enumerate() {
        let text = truncate_chars(&message.text.replace('\n', " "), 80);
        output.push_str(&format!("{:>3} [{}] {}\n", i, role_label(message.role), text));
        if let Some(translated) = &message.translated_text {
            output.push_str(&format!("      (sent as: {})\n", truncate_chars(translated, 60)));
        }
        output.push_str(&format_sources(message));
    }
    output.trim_end().to_string()
}

/// Citation lines for a message, repeated web sources collapsed
pub fn format_sources(message: &Message) -> String {
    let Some(docs) = &message.source_documents else {
        return String::new();
    };
    dedupe_sources(docs)
        .iter()
        .map(|doc| format!("      - {}\n", truncate_chars(&doc.display_label(), 70)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatflow_widget::SourceDocument;

    #[test]
    fn test_history_lists_roles_and_sources() {
        let messages = vec![
            Message::assistant("Hi there!"),
            Message::user("where?"),
            Message::assistant("here").with_source_documents(Some(vec![
                SourceDocument::new("https://a.com/x", "one"),
                SourceDocument::new("https://a.com/x", "two"),
            ])),
        ];
        let text = format_history(&messages);
        assert!(text.contains("[you] where?"));
        assert!(text.contains("[bot] here"));
        assert_eq!(text.matches("      - ").count(), 1);
    }
}
