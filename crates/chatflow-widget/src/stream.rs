//! Streaming state machine
//!
//! Applies realtime channel events to the message store:
//!
//! ```text
//! Idle --start--> Streaming --token/sourceDocuments--> Streaming
//!                 Streaming --start--> Streaming (fresh message)
//! any --disconnected/teardown--> Idle
//! ```
//!
//! There is no completion event; a stream ends when the next one starts or
//! the channel goes away.

use chatflow_api::{ChannelEvent, Message};
use tokio_util::sync::CancellationToken;

use crate::store::{MessagePatch, MessageStore};

/// Where the current response stream is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
}

/// What an event did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Appended(usize),
    Updated(usize),
}

/// Channel-side state of one widget instance
#[derive(Debug, Default)]
pub struct StreamChannel {
    state: StreamState,
    client_id: Option<String>,
    cancel: Option<CancellationToken>,
}

impl StreamChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Id to send with prediction requests, once connected
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.client_id.is_some()
    }

    /// Remember the token that tears down the underlying connection
    pub fn attach(&mut self, cancel: CancellationToken) {
        self.cancel = Some(cancel);
    }

    /// Apply one event to the store
    pub fn apply(&mut self, store: &mut MessageStore, event: ChannelEvent) -> Option<StoreChange> {
        match event {
            ChannelEvent::Connected { client_id } => {
                tracing::debug!("Realtime channel connected as {}", client_id);
                self.client_id = Some(client_id);
                None
            }
            ChannelEvent::Start => {
                if self.state == StreamState::Streaming {
                    tracing::debug!("New stream started; previous one is complete");
                }
                self.state = StreamState::Streaming;
                Some(StoreChange::Appended(store.append(Message::assistant_empty())))
            }
            ChannelEvent::Token { text } => {
                if self.state == StreamState::Idle {
                    tracing::debug!("Token received outside a stream");
                }
                store
                    .mutate_last(MessagePatch::AppendText(text))
                    .map(StoreChange::Updated)
            }
            ChannelEvent::SourceDocuments { documents } => {
                if self.state == StreamState::Idle {
                    tracing::debug!("Source documents received outside a stream");
                }
                store
                    .mutate_last(MessagePatch::SourceDocuments(documents))
                    .map(StoreChange::Updated)
            }
            ChannelEvent::Disconnected => {
                tracing::debug!("Realtime channel disconnected");
                self.state = StreamState::Idle;
                self.client_id = None;
                None
            }
        }
    }

    /// Disconnect the channel and forget the client id
    pub fn teardown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.state = StreamState::Idle;
        self.client_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, SessionStorage};
    use chatflow_api::{Role, SourceDocument};
    use std::sync::Arc;

    const WELCOME: &str = "Hi there! How can I help?";

    fn setup() -> (StreamChannel, MessageStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = MessageStore::new("k", WELCOME, storage.clone());
        store.append(Message::user("question"));
        (StreamChannel::new(), store, storage)
    }

    #[test]
    fn test_start_appends_empty_assistant() {
        let (mut channel, mut store, _) = setup();
        let change = channel.apply(&mut store, ChannelEvent::Start);
        assert_eq!(change, Some(StoreChange::Appended(2)));
        assert_eq!(channel.state(), StreamState::Streaming);
        let last = store.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.text.is_empty());
    }

    #[test]
    fn test_tokens_concatenate_in_arrival_order() {
        let (mut channel, mut store, storage) = setup();
        channel.apply(&mut store, ChannelEvent::Start);
        let fragments = ["The", " quick", " brown", " fox", ""];
        for f in fragments {
            assert_eq!(
                channel.apply(&mut store, ChannelEvent::token(f)),
                Some(StoreChange::Updated(2))
            );
        }
        assert_eq!(store.last().unwrap().text, fragments.concat());
        assert_eq!(store.messages()[1].text, "question");
        let persisted = storage.load("k").unwrap().unwrap();
        assert_eq!(persisted.chat_history[2].text, "The quick brown fox");
    }

    #[test]
    fn test_source_documents_overwrite() {
        let (mut channel, mut store, _) = setup();
        channel.apply(&mut store, ChannelEvent::Start);
        channel.apply(
            &mut store,
            ChannelEvent::SourceDocuments {
                documents: vec![SourceDocument::new("a", "1"), SourceDocument::new("b", "2")],
            },
        );
        channel.apply(
            &mut store,
            ChannelEvent::SourceDocuments {
                documents: vec![SourceDocument::new("c", "3")],
            },
        );
        let docs = store.last().unwrap().source_documents.clone().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].locator(), Some("c"));
    }

    #[test]
    fn test_second_start_begins_new_message() {
        let (mut channel, mut store, _) = setup();
        channel.apply(&mut store, ChannelEvent::Start);
        channel.apply(&mut store, ChannelEvent::token("first"));
        channel.apply(&mut store, ChannelEvent::Start);
        channel.apply(&mut store, ChannelEvent::token("second"));
        assert_eq!(store.len(), 4);
        assert_eq!(store.messages()[2].text, "first");
        assert_eq!(store.messages()[3].text, "second");
    }

    #[test]
    fn test_token_while_idle_mutates_last() {
        let (mut channel, mut store, _) = setup();
        channel.apply(&mut store, ChannelEvent::token("!"));
        assert_eq!(channel.state(), StreamState::Idle);
        assert_eq!(store.last().unwrap().text, "question!");
    }

    #[test]
    fn test_connected_and_disconnected() {
        let (mut channel, mut store, _) = setup();
        channel.apply(
            &mut store,
            ChannelEvent::Connected {
                client_id: "sock-1".into(),
            },
        );
        assert_eq!(channel.client_id(), Some("sock-1"));
        channel.apply(&mut store, ChannelEvent::Start);
        channel.apply(&mut store, ChannelEvent::Disconnected);
        assert_eq!(channel.state(), StreamState::Idle);
        assert!(!channel.is_connected());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_teardown_cancels_connection() {
        let (mut channel, mut store, _) = setup();
        let cancel = CancellationToken::new();
        channel.attach(cancel.clone());
        channel.apply(
            &mut store,
            ChannelEvent::Connected {
                client_id: "sock-1".into(),
            },
        );
        channel.apply(&mut store, ChannelEvent::Start);

        channel.teardown();

        assert!(cancel.is_cancelled());
        assert_eq!(channel.state(), StreamState::Idle);
        assert_eq!(channel.client_id(), None);
    }
}
