//! Core types shared with the chat backend

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message roles
///
/// The wire names are the ones the backend and persisted histories use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Message typed by the user
    #[serde(rename = "userMessage")]
    User,
    /// Backend answer, welcome text, or error notice
    #[serde(rename = "apiMessage")]
    Assistant,
    /// User message still waiting for the backend
    #[serde(rename = "usermessagewaiting")]
    PendingUser,
}

impl Role {
    /// Get the role as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::PendingUser => "pending-user",
        }
    }

    /// Whether this role was authored by the user
    pub fn is_user(&self) -> bool {
        matches!(self, Role::User | Role::PendingUser)
    }
}

/// A citation attached to an assistant message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    #[serde(default)]
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SourceDocument {
    /// Create a document with a `source` locator
    pub fn new(locator: impl Into<String>, page_content: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(locator.into()));
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// The `source` locator (URL or opaque identifier)
    pub fn locator(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// The locator parsed as an absolute URL, if it is one
    pub fn url(&self) -> Option<Url> {
        self.locator().and_then(|s| Url::parse(s).ok())
    }

    /// Short label: the URL path for web sources, the content otherwise
    pub fn display_label(&self) -> String {
        match self.url() {
            Some(url) => url.path().to_string(),
            None => self.page_content.clone(),
        }
    }
}

/// One turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<SourceDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_annotations: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
}

impl Message {
    fn with_role(text: impl Into<String>, role: Role) -> Self {
        Self {
            text: text.into(),
            role,
            source_documents: None,
            file_annotations: None,
            translated_text: None,
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(text, Role::User)
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(text, Role::Assistant)
    }

    /// Create an empty assistant message (streaming placeholder)
    pub fn assistant_empty() -> Self {
        Self::with_role(String::new(), Role::Assistant)
    }

    /// Attach citations
    pub fn with_source_documents(mut self, docs: Option<Vec<SourceDocument>>) -> Self {
        self.source_documents = docs;
        self
    }

    /// Attach file annotations
    pub fn with_file_annotations(mut self, annotations: Option<Vec<Value>>) -> Self {
        self.file_annotations = annotations;
        self
    }

    /// Whether this message carries at least one citation
    pub fn has_sources(&self) -> bool {
        self.source_documents
            .as_ref()
            .is_some_and(|docs| !docs.is_empty())
    }
}

/// Body of a prediction request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub question: String,
    pub history: Vec<Message>,
    pub chat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_config: Option<Map<String, Value>>,
    #[serde(rename = "socketIOClientId", skip_serializing_if = "Option::is_none")]
    pub socket_io_client_id: Option<String>,
}

/// Body of a prediction response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_documents: Option<Vec<SourceDocument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_annotations: Option<Vec<Value>>,
    /// Any other fields the backend returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PredictionResponse {
    /// Interpret an arbitrary JSON body as a response.
    ///
    /// A bare JSON string is the answer text; any non-object is treated as
    /// structured output.
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            Value::String(text) => Ok(Self {
                text: Some(text),
                ..Default::default()
            }),
            other => Ok(Self {
                json: Some(other),
                ..Default::default()
            }),
        }
    }

    /// Text to show for this response: `text`, else pretty `json`, else the
    /// whole body pretty-printed.
    pub fn display_text(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        if let Some(json) = &self.json {
            return serde_json::to_string_pretty(json).unwrap_or_default();
        }
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Whether a chatflow answers over the realtime channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCapability {
    #[serde(rename = "isStreaming", default)]
    pub is_streaming: bool,
}

/// Public chatbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotConfig {
    /// Label -> `{ "prompt": "..." }`, in configuration order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_prompts: Option<Map<String, Value>>,
}

impl ChatbotConfig {
    /// Starter prompt texts in configuration order, skipping blank entries
    pub fn prompts(&self) -> Vec<String> {
        self.starter_prompts
            .iter()
            .flat_map(|map| map.values())
            .filter_map(|entry| entry.get("prompt").and_then(Value::as_str))
            .filter(|p| !p.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}
