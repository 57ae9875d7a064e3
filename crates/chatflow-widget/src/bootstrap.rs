//! Startup: restore the session, query the backend, open the channel

use chatflow_api::ChannelEventStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    config::WidgetConfig,
    events::WidgetEvent,
    widget::{ChatWidget, WidgetDeps},
};

impl ChatWidget {
    /// Create a widget and run the startup sequence.
    ///
    /// Every step degrades on failure: an unreadable session starts fresh,
    /// a failed capability query disables streaming, a failed config query
    /// leaves no starter prompts, and a failed connect leaves no channel.
    pub async fn bootstrap(config: WidgetConfig, deps: WidgetDeps) -> Self {
        let widget = Self::new(config, deps);
        widget.restore_session();

        let (streaming, prompts) =
            tokio::join!(widget.refresh_capability(), widget.load_starter_prompts());
        tracing::debug!(
            "Bootstrap: streaming={}, {} starter prompts",
            streaming,
            prompts
        );

        widget.open_channel().await;
        widget
    }

    /// Adopt the persisted session, if there is a readable one
    pub fn restore_session(&self) -> bool {
        let restored = {
            let mut state = self.state.lock();
            match state.store.restore() {
                Ok(restored) => restored.then(|| state.store.conversation_id().to_string()),
                Err(e) => {
                    tracing::warn!("Could not restore session, starting fresh: {}", e);
                    None
                }
            }
        };
        match restored {
            Some(conversation_id) => {
                self.emit(WidgetEvent::ConversationReset { conversation_id });
                true
            }
            None => false,
        }
    }

    /// Ask the backend whether answers stream. Failure means no streaming.
    pub async fn refresh_capability(&self) -> bool {
        let streaming = match self.backend.stream_capability(&self.config.chatflow_id).await {
            Ok(capability) => capability.is_streaming,
            Err(e) => {
                tracing::warn!("Streaming capability query failed: {}", e);
                false
            }
        };
        self.state.lock().streaming_enabled = streaming;
        streaming
    }

    /// Fetch starter prompts. Returns how many were loaded.
    pub async fn load_starter_prompts(&self) -> usize {
        let prompts = match self.backend.chatbot_config(&self.config.chatflow_id).await {
            Ok(config) => config.prompts(),
            Err(e) => {
                tracing::warn!("Chatbot config query failed: {}", e);
                Vec::new()
            }
        };
        let count = prompts.len();
        self.state.lock().starter_prompts = prompts;
        count
    }

    /// Connect the realtime channel and start feeding its events into the
    /// widget. Returns whether a channel was opened.
    pub async fn open_channel(&self) -> bool {
        let Some(connector) = self.connector.as_ref() else {
            return false;
        };
        let connection = match connector.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Realtime channel unavailable: {}", e);
                return false;
            }
        };

        let cancel = connection.cancel.clone();
        let widget = self.clone();
        let listener = tokio::spawn(async move {
            widget.pump(connection.events, connection.cancel).await;
        });

        let mut state = self.state.lock();
        state.channel.attach(cancel);
        if let Some(previous) = state.listener.replace(listener) {
            previous.abort();
        }
        true
    }

    /// Apply every event of `events` until it ends
    pub async fn listen(&self, events: ChannelEventStream) {
        self.pump(events, CancellationToken::new()).await;
    }

    async fn pump(&self, mut events: ChannelEventStream, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Channel listener cancelled");
                    break;
                }
                event = events.next() => {
                    let Some(event) = event else { break };
                    let terminal = event.is_terminal();
                    self.handle_channel_event(event);
                    if terminal {
                        break;
                    }
                }
            }
        }
    }
}
