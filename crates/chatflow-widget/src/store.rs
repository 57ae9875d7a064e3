//! Message store: the ordered conversation and its persistence
//!
//! Every mutation writes the full session record before returning, so the
//! persisted record never lags the in-memory sequence.

use chatflow_api::{Message, SourceDocument};
use std::sync::Arc;

use crate::{
    error::Result,
    storage::{SessionRecord, SessionStorage},
};

/// Partial update applied to the last message
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePatch {
    /// Append a streamed fragment to the text
    AppendText(String),
    /// Replace the citation list
    SourceDocuments(Vec<SourceDocument>),
    /// Record the machine-translated text
    TranslatedText(String),
}

impl MessagePatch {
    fn apply(self, message: &mut Message) {
        match self {
            MessagePatch::AppendText(delta) => message.text.push_str(&delta),
            MessagePatch::SourceDocuments(docs) => message.source_documents = Some(docs),
            MessagePatch::TranslatedText(text) => message.translated_text = Some(text),
        }
    }
}

fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ordered message sequence of one conversation session
pub struct MessageStore {
    key: String,
    conversation_id: String,
    messages: Vec<Message>,
    storage: Arc<dyn SessionStorage>,
}

impl MessageStore {
    /// Start a fresh session holding only the welcome message.
    ///
    /// Nothing is persisted until the first mutation.
    pub fn new(key: impl Into<String>, welcome: &str, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            key: key.into(),
            conversation_id: new_conversation_id(),
            messages: vec![Message::assistant(welcome)],
            storage,
        }
    }

    /// Adopt the persisted session, if one exists. Returns whether it did.
    pub fn restore(&mut self) -> Result<bool> {
        match self.storage.load(&self.key)? {
            Some(record) => {
                tracing::debug!(
                    "Restored session {} ({} messages)",
                    record.chat_id,
                    record.chat_history.len()
                );
                self.conversation_id = record.chat_id;
                self.messages = record.chat_history;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add a message to the tail. Returns its index.
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.persist();
        self.messages.len() - 1
    }

    /// Patch the last message. Returns its index, or `None` when empty.
    pub fn mutate_last(&mut self, patch: MessagePatch) -> Option<usize> {
        let last = self.messages.last_mut()?;
        patch.apply(last);
        self.persist();
        Some(self.messages.len() - 1)
    }

    /// Start a new conversation: new id, only the welcome message, and the
    /// persisted record cleared.
    pub fn reset(&mut self, welcome: &str) {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::warn!("Failed to clear persisted session {}: {}", self.key, e);
        }
        self.discard(welcome);
    }

    /// Drop in-memory state without touching storage
    pub fn discard(&mut self, welcome: &str) {
        self.conversation_id = new_conversation_id();
        self.messages = vec![Message::assistant(welcome)];
    }

    /// Prior messages to send to the backend (welcome text excluded)
    pub fn history(&self, welcome: &str) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.text != welcome)
            .cloned()
            .collect()
    }

    /// The full message sequence
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last message, if any
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Session identifier sent to the backend as `chatId`
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Storage key of this session
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot of the session as persisted
    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            chat_id: self.conversation_id.clone(),
            chat_history: self.messages.clone(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.key, &self.record()) {
            tracing::warn!("Failed to persist session {}: {}", self.key, e);
        }
    }
}
