//! Mock collaborators shared by the widget tests

use async_trait::async_trait;
use chatflow_api::{
    Backend, ChannelConnection, ChannelConnector, ChannelEvent, ChatbotConfig, Error, Language,
    PredictionRequest, PredictionResponse, Result, StreamCapability, Translator,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::WidgetConfig;

pub(crate) const WELCOME: &str = "Welcome! Ask me anything.";

pub(crate) fn test_config() -> WidgetConfig {
    WidgetConfig::new("flow-test").with_welcome_message(WELCOME)
}

/// Canned backend answer
pub(crate) enum Reply {
    Text(String),
    Fail(u16, String),
}

/// Backend that answers from a queue and records what it was sent
pub(crate) struct MockBackend {
    replies: Mutex<VecDeque<Reply>>,
    /// `None` makes the capability query fail
    streaming: Option<bool>,
    /// `None` makes the config query fail
    config: Option<serde_json::Value>,
    pub(crate) requests: Mutex<Vec<PredictionRequest>>,
    pub(crate) capability_calls: AtomicUsize,
    pub(crate) config_calls: AtomicUsize,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            streaming: Some(false),
            config: Some(json!({})),
            requests: Mutex::new(Vec::new()),
            capability_calls: AtomicUsize::new(0),
            config_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn reply(self, reply: Reply) -> Self {
        self.replies.lock().push_back(reply);
        self
    }

    pub(crate) fn streaming(mut self, streaming: Option<bool>) -> Self {
        self.streaming = streaming;
        self
    }

    pub(crate) fn config(mut self, config: Option<serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    pub(crate) fn sent(&self) -> Vec<PredictionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn send_message(
        &self,
        _chatflow_id: &str,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(PredictionResponse {
                text: Some(text),
                ..Default::default()
            }),
            Some(Reply::Fail(status, message)) => Err(Error::api(status, message)),
            None => Ok(PredictionResponse {
                text: Some("done".into()),
                ..Default::default()
            }),
        }
    }

    async fn stream_capability(&self, _chatflow_id: &str) -> Result<StreamCapability> {
        self.capability_calls.fetch_add(1, Ordering::SeqCst);
        match self.streaming {
            Some(is_streaming) => Ok(StreamCapability { is_streaming }),
            None => Err(Error::api(503, "unavailable")),
        }
    }

    async fn chatbot_config(&self, _chatflow_id: &str) -> Result<ChatbotConfig> {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        match &self.config {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Err(Error::api(500, "Internal Error")),
        }
    }
}

/// Translator returning a fixed answer, or failing when it has none
pub(crate) struct MockTranslator {
    answer: Option<String>,
    pub(crate) calls: Mutex<Vec<(Language, Language, String)>>,
}

impl MockTranslator {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            answer: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, from: Language, to: Language, text: &str) -> Result<String> {
        self.calls.lock().push((from, to, text.to_string()));
        match &self.answer {
            Some(answer) => Ok(answer.clone()),
            None => Err(Error::api(401, "invalid key")),
        }
    }
}

/// Connector replaying a fixed event sequence
pub(crate) struct MockConnector {
    events: Mutex<Option<Vec<ChannelEvent>>>,
    fail: bool,
}

impl MockConnector {
    pub(crate) fn replaying(events: Vec<ChannelEvent>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            events: Mutex::new(None),
            fail: true,
        }
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect(&self) -> Result<ChannelConnection> {
        if self.fail {
            return Err(Error::Socket("connection refused".into()));
        }
        let events = self.events.lock().take().unwrap_or_default();
        Ok(ChannelConnection::new(Box::pin(futures::stream::iter(events))))
    }
}
