//! /session command - show session info

use super::CommandResult;
use chatflow_widget::{ChatWidget, Role};

pub struct SessionCommand;

impl SessionCommand {
    pub fn execute(widget: &ChatWidget) -> CommandResult {
        let config = widget.config();
        let messages = widget.messages();

        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("Chatflow:   {}\n", config.chatflow_id));
        output.push_str(&format!("Host:       {}\n", config.api_host));
        output.push_str(&format!("Session:    {}\n", widget.conversation_id()));
        output.push_str(&format!("Stored as:  {}\n", config.storage_key()));
        output.push('\n');

        let user_msgs = messages.iter().filter(|m| m.role.is_user()).count();
        let assistant_msgs = messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        output.push_str(&format!("Messages:   {} total\n", messages.len()));
        output.push_str(&format!(
            "            {} user, {} assistant\n",
            user_msgs, assistant_msgs
        ));
        output.push('\n');

        output.push_str(&format!(
            "Streaming:  {}\n",
            if widget.streaming_enabled() { "on" } else { "off" }
        ));
        match widget.client_id() {
            Some(id) => output.push_str(&format!("Channel:    connected ({})\n", id)),
            None => output.push_str("Channel:    not connected\n"),
        }
        output.push_str(&format!("Locale:     {:?}", widget.locale()));

        CommandResult::Message(output)
    }
}
