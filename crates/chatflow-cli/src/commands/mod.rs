//! Slash commands for interactive mode

pub mod history;
mod prompts;
mod session;

pub use history::HistoryCommand;
pub use prompts::PromptsCommand;
pub use session::SessionCommand;

use chatflow_widget::ChatWidget;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Start a new conversation
    Clear,
    /// Submit this text as if the user typed it
    Submit(String),
    /// Show a message to the user (not sent to the chatflow)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, widget: &ChatWidget) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "prompts" | "p" => PromptsCommand::list(&widget.starter_prompts()),

        "prompt" => PromptsCommand::pick(args, &widget.starter_prompts()),

        "history" => HistoryCommand::execute(&widget.messages()),

        "session" | "s" => SessionCommand::execute(widget),

        _ => CommandResult::Unknown(command),
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /prompts, /p         List starter prompts
  /prompt <n>          Ask starter prompt number n
  /history             Show the conversation with sources
  /session, /s         Show session info
  /clear, /c           Start a new conversation
  /quit, /exit, /q     Exit chatflow"#
        .to_string()
}

#[cfg(test)]
pub(crate) fn test_widget() -> ChatWidget {
    use chatflow_api::HttpBackend;
    use chatflow_widget::{MemoryStorage, WidgetConfig, WidgetDeps};
    use std::sync::Arc;

    let deps = WidgetDeps::new(
        Arc::new(HttpBackend::new("http://localhost:3000")),
        Arc::new(MemoryStorage::new()),
    );
    ChatWidget::new(WidgetConfig::new("flow-cli"), deps)
}
