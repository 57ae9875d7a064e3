//! The widget handle: shared state plus the collaborators it talks to.

use chatflow_api::{Backend, ChannelConnector, ChannelEvent, Message, Translator};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{
    config::WidgetConfig,
    events::WidgetEvent,
    locale::Locale,
    storage::SessionStorage,
    store::MessageStore,
    stream::{StoreChange, StreamChannel, StreamState},
};

/// Collaborators injected into a widget
#[derive(Clone)]
pub struct WidgetDeps {
    pub backend: Arc<dyn Backend>,
    pub storage: Arc<dyn SessionStorage>,
    pub translator: Option<Arc<dyn Translator>>,
    pub connector: Option<Arc<dyn ChannelConnector>>,
}

impl WidgetDeps {
    /// Backend and storage only: no translation, no realtime channel
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            backend,
            storage,
            translator: None,
            connector: None,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = Some(connector);
        self
    }
}

/// Mutable widget state; only ever touched under the widget lock
pub(crate) struct WidgetState {
    pub(crate) store: MessageStore,
    pub(crate) channel: StreamChannel,
    pub(crate) busy: bool,
    pub(crate) pending_input: String,
    pub(crate) streaming_enabled: bool,
    pub(crate) starter_prompts: Vec<String>,
    pub(crate) locale: Locale,
    /// Bumped on reset and shutdown; in-flight submissions compare against it
    pub(crate) generation: u64,
    pub(crate) listener: Option<JoinHandle<()>>,
}

impl WidgetState {
    /// Turn a store change into the event announcing it
    pub(crate) fn change_event(&self, change: StoreChange) -> Option<WidgetEvent> {
        match change {
            StoreChange::Appended(index) => {
                self.store
                    .messages()
                    .get(index)
                    .map(|message| WidgetEvent::MessageAppended {
                        index,
                        message: message.clone(),
                    })
            }
            StoreChange::Updated(index) => {
                self.store
                    .messages()
                    .get(index)
                    .map(|message| WidgetEvent::MessageUpdated {
                        index,
                        message: message.clone(),
                    })
            }
        }
    }
}

/// A cloneable handle to one chat widget instance.
///
/// All clones share the same conversation. State changes are serialized by a
/// single lock that is never held across an await.
#[derive(Clone)]
pub struct ChatWidget {
    pub(crate) config: Arc<WidgetConfig>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) translator: Option<Arc<dyn Translator>>,
    pub(crate) connector: Option<Arc<dyn ChannelConnector>>,
    pub(crate) state: Arc<Mutex<WidgetState>>,
    event_tx: broadcast::Sender<WidgetEvent>,
}

impl ChatWidget {
    /// Create a widget with a fresh session. See [`ChatWidget::bootstrap`]
    /// for the full startup sequence.
    pub fn new(config: WidgetConfig, deps: WidgetDeps) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let store = MessageStore::new(config.storage_key(), config.welcome_text(), deps.storage);
        Self {
            config: Arc::new(config),
            backend: deps.backend,
            translator: deps.translator,
            connector: deps.connector,
            state: Arc::new(Mutex::new(WidgetState {
                store,
                channel: StreamChannel::new(),
                busy: false,
                pending_input: String::new(),
                streaming_enabled: false,
                starter_prompts: Vec::new(),
                locale: Locale::default(),
                generation: 0,
                listener: None,
            })),
            event_tx,
        }
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: WidgetEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn emit_all(&self, events: impl IntoIterator<Item = WidgetEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Snapshot of the message sequence
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().store.messages().to_vec()
    }

    pub fn conversation_id(&self) -> String {
        self.state.lock().store.conversation_id().to_string()
    }

    /// Whether a submission is in flight
    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Input of the in-flight submission
    pub fn pending_input(&self) -> String {
        self.state.lock().pending_input.clone()
    }

    pub fn starter_prompts(&self) -> Vec<String> {
        self.state.lock().starter_prompts.clone()
    }

    /// Whether answers arrive over the realtime channel
    pub fn streaming_enabled(&self) -> bool {
        self.state.lock().streaming_enabled
    }

    pub fn client_id(&self) -> Option<String> {
        self.state.lock().channel.client_id().map(str::to_string)
    }

    pub fn stream_state(&self) -> StreamState {
        self.state.lock().channel.state()
    }

    pub fn locale(&self) -> Locale {
        self.state.lock().locale
    }

    /// Whether a loading indicator belongs under the last message
    pub fn shows_loading_indicator(&self) -> bool {
        let state = self.state.lock();
        state.busy && state.store.last().is_some_and(|m| m.role.is_user())
    }

    /// Whether starter prompts should be offered (nothing asked yet)
    pub fn shows_starter_prompts(&self) -> bool {
        let state = self.state.lock();
        state.store.len() == 1 && !state.starter_prompts.is_empty()
    }

    /// Apply one realtime channel event
    pub fn handle_channel_event(&self, event: ChannelEvent) {
        let events = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut events = Vec::new();
            let announces_channel = matches!(
                event,
                ChannelEvent::Connected { .. } | ChannelEvent::Disconnected
            );

            if let Some(change) = state.channel.apply(&mut state.store, event) {
                events.extend(state.change_event(change));
            }
            if announces_channel {
                events.push(WidgetEvent::ChannelChanged {
                    client_id: state.channel.client_id().map(str::to_string),
                });
            }
            events
        };
        self.emit_all(events);
    }

    /// Start a new conversation: clears history and persisted state.
    ///
    /// An in-flight submission is abandoned; its result is dropped when it
    /// arrives and the widget is free to accept input right away.
    pub fn clear(&self) {
        let (conversation_id, was_busy) = {
            let mut state = self.state.lock();
            state.store.reset(self.config.welcome_text());
            state.generation += 1;
            let was_busy = state.busy;
            state.busy = false;
            state.pending_input.clear();
            (state.store.conversation_id().to_string(), was_busy)
        };
        tracing::debug!("Conversation reset, new id {}", conversation_id);
        if was_busy {
            self.emit(WidgetEvent::BusyChanged { busy: false });
        }
        self.emit(WidgetEvent::ConversationReset { conversation_id });
    }

    /// Tear the widget down: disconnect the channel and discard in-memory
    /// state. The persisted session is left for the next bootstrap.
    pub fn shutdown(&self) {
        let was_busy = {
            let mut state = self.state.lock();
            state.channel.teardown();
            if let Some(listener) = state.listener.take() {
                listener.abort();
            }
            let was_busy = state.busy;
            state.busy = false;
            state.pending_input.clear();
            state.store.discard(self.config.welcome_text());
            state.generation += 1;
            was_busy
        };
        if was_busy {
            self.emit(WidgetEvent::BusyChanged { busy: false });
        }
        self.emit(WidgetEvent::ChannelChanged { client_id: None });
    }
}
