//! Widget event types

use chatflow_api::Message;
use serde::{Deserialize, Serialize};

/// Events emitted whenever widget state changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// A message was added at `index`
    MessageAppended { index: usize, message: Message },

    /// The message at `index` changed (streamed text, citations, translation)
    MessageUpdated { index: usize, message: Message },

    /// Submission started or finished
    BusyChanged { busy: bool },

    /// Conversation cleared and given a new id
    ConversationReset { conversation_id: String },

    /// Realtime channel connected or disconnected
    ChannelChanged { client_id: Option<String> },
}
