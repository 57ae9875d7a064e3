//! Per-instance widget configuration

use chatflow_api::{Language, backend::DEFAULT_API_HOST};
use serde_json::{Map, Value};

use crate::storage::storage_key;

/// Welcome text shown when the host supplies none
pub const DEFAULT_WELCOME_MESSAGE: &str = "Hi there! How can I help?";

/// Configuration supplied by the host page for one widget instance
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// Backend chatflow identifier; also keys the persisted session
    pub chatflow_id: String,
    /// Backend host
    pub api_host: String,
    /// First assistant message of every conversation
    pub welcome_message: Option<String>,
    /// Passed through to the backend as `overrideConfig`
    pub chatflow_config: Option<Map<String, Value>>,
    /// Language the backend expects questions in
    pub backend_language: Language,
}

impl WidgetConfig {
    /// Create a config with defaults for everything but the chatflow id
    pub fn new(chatflow_id: impl Into<String>) -> Self {
        Self {
            chatflow_id: chatflow_id.into(),
            api_host: DEFAULT_API_HOST.to_string(),
            welcome_message: None,
            chatflow_config: None,
            backend_language: Language::English,
        }
    }

    /// Set the backend host
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    /// Set the welcome message
    pub fn with_welcome_message(mut self, welcome: impl Into<String>) -> Self {
        self.welcome_message = Some(welcome.into());
        self
    }

    /// Set the override config sent with every question
    pub fn with_chatflow_config(mut self, config: Map<String, Value>) -> Self {
        self.chatflow_config = Some(config);
        self
    }

    /// The welcome text in effect
    pub fn welcome_text(&self) -> &str {
        self.welcome_message
            .as_deref()
            .unwrap_or(DEFAULT_WELCOME_MESSAGE)
    }

    /// Key of the persisted session record
    pub fn storage_key(&self) -> String {
        storage_key(&self.chatflow_id)
    }
}
