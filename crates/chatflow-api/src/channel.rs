//! Realtime event channel types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{error::Result, types::SourceDocument};

/// Events delivered by the realtime channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Channel connected; the id must accompany prediction requests
    Connected { client_id: String },
    /// A streamed answer is starting
    Start,
    /// Next fragment of the streamed answer
    Token { text: String },
    /// Citations for the streamed answer
    SourceDocuments { documents: Vec<SourceDocument> },
    /// Channel closed by either side
    Disconnected,
}

impl ChannelEvent {
    /// Create a token event
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    /// Check if this event ends the channel
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelEvent::Disconnected)
    }
}

/// A stream of channel events
pub type ChannelEventStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

/// An open channel: its events and a token that tears it down
pub struct ChannelConnection {
    pub events: ChannelEventStream,
    pub cancel: CancellationToken,
}

impl ChannelConnection {
    /// Wrap an event stream with a fresh cancellation token
    pub fn new(events: ChannelEventStream) -> Self {
        Self {
            events,
            cancel: CancellationToken::new(),
        }
    }
}

/// Opens realtime channels
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Connect and return the event stream
    async fn connect(&self) -> Result<ChannelConnection>;
}
