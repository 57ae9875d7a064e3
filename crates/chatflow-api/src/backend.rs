//! Chat backend client
//!
//! The widget talks to three backend endpoints: prediction (one question and
//! its history), the streaming capability query, and the public chatbot
//! configuration.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::{
    error::{Error, Result},
    types::{ChatbotConfig, PredictionRequest, PredictionResponse, StreamCapability},
};

/// Host used when the embedding page supplies none
pub const DEFAULT_API_HOST: &str = "http://localhost:3000";

/// The chat backend, as seen by the widget
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send a question with its history and return the answer
    async fn send_message(
        &self,
        chatflow_id: &str,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse>;

    /// Ask whether this chatflow streams its answers over the realtime channel
    async fn stream_capability(&self, chatflow_id: &str) -> Result<StreamCapability>;

    /// Fetch the public chatbot configuration (starter prompts)
    async fn chatbot_config(&self, chatflow_id: &str) -> Result<ChatbotConfig>;
}

/// HTTP implementation of [`Backend`]
pub struct HttpBackend {
    client: reqwest::Client,
    api_host: String,
    api_key: Option<String>,
}

impl HttpBackend {
    /// Create a backend client for an API host
    pub fn new(api_host: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_host: api_host.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Attach a bearer credential supplied by the integrating system
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Use a client with a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// The normalized API host
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    fn endpoint(&self, path: &str, chatflow_id: &str) -> String {
        format!("{}/api/v1/{}/{}", self.api_host, path, chatflow_id)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(ref key) = self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| Error::InvalidConfig(format!("invalid API key header: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).headers(self.headers()?).send().await?;
        let body = check_status(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Turn a non-success response into [`Error::Api`], otherwise return the body
async fn check_status(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        } else {
            body
        };
        return Err(Error::api(status.as_u16(), message));
    }
    Ok(body)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send_message(
        &self,
        chatflow_id: &str,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse> {
        let url = self.endpoint("prediction", chatflow_id);
        tracing::debug!(
            "POST {} (history: {} messages, streaming client: {})",
            url,
            request.history.len(),
            request.socket_io_client_id.is_some()
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;
        let body = check_status(response).await?;

        let value = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        PredictionResponse::from_value(value)
    }

    async fn stream_capability(&self, chatflow_id: &str) -> Result<StreamCapability> {
        self.get_json(&self.endpoint("chatflows-streaming", chatflow_id))
            .await
    }

    async fn chatbot_config(&self, chatflow_id: &str) -> Result<ChatbotConfig> {
        self.get_json(&self.endpoint("public-chatbotConfig", chatflow_id))
            .await
    }
}
