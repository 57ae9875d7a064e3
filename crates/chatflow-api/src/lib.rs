//! chatflow-api: Wire types and external collaborators
//!
//! This crate provides the message model shared with the chat backend, the
//! backend HTTP client, the translation client, and the realtime event
//! channel the backend streams tokens over.

pub mod backend;
pub mod channel;
pub mod error;
pub mod socket;
pub mod translate;
pub mod types;

pub use backend::{Backend, HttpBackend};
pub use channel::{ChannelConnection, ChannelConnector, ChannelEvent, ChannelEventStream};
pub use error::{Error, Result};
pub use socket::SocketIoConnector;
pub use translate::{CompletionsTranslator, Language, Translator};
pub use types::*;
