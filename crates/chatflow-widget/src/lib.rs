//! chatflow-widget: Headless chat widget state
//!
//! This crate owns the conversation a chat widget shows: the message store
//! and its persistence, the submission flow, the streaming state machine fed
//! by the realtime channel, and the bootstrap that wires them together.

mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod language;
pub mod locale;
pub mod sources;
pub mod storage;
pub mod store;
pub mod stream;
mod submit;
pub mod widget;

#[cfg(test)]
mod test_support;

pub use chatflow_api::{Message, Role, SourceDocument};
pub use config::WidgetConfig;
pub use error::{Error, Result};
pub use events::WidgetEvent;
pub use locale::Locale;
pub use storage::{FileStorage, MemoryStorage, SessionRecord, SessionStorage};
pub use store::{MessagePatch, MessageStore};
pub use stream::{StreamChannel, StreamState};
pub use submit::SubmitOutcome;
pub use widget::{ChatWidget, WidgetDeps};
