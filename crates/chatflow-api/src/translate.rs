//! Machine translation of user input
//!
//! Translation is best-effort: callers decide what to do when it fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default completions endpoint
pub const DEFAULT_COMPLETIONS_URL: &str =
    "https://api.openai.com/v1/engines/gpt-3.5-turbo-instruct/completions";

/// Languages the widget knows how to detect and translate between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Korean,
}

impl Language {
    /// Human-readable name, used in translation prompts
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Korean => "Korean",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "korean" | "ko" => Ok(Language::Korean),
            other => Err(Error::InvalidConfig(format!("unknown language: {}", other))),
        }
    }
}

/// Translation collaborator
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from one language to another
    async fn translate(&self, from: Language, to: Language, text: &str) -> Result<String>;
}

/// Translator backed by a text-completions endpoint
pub struct CompletionsTranslator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl CompletionsTranslator {
    /// Create a translator with a caller-supplied API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: DEFAULT_COMPLETIONS_URL.to_string(),
            api_key: api_key.into(),
            temperature: 0.7,
            max_tokens: 999,
        }
    }

    /// Point at a different completions endpoint
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn build_request(&self, from: Language, to: Language, text: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: format!(
                "Translate the following {} text to {}: {}",
                from.name(),
                to.name(),
                text
            ),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Translator for CompletionsTranslator {
    async fn translate(&self, from: Language, to: Language, text: &str) -> Result<String> {
        let request = self.build_request(from, to, text);
        tracing::debug!("Translating {} -> {} ({} chars)", from.name(), to.name(), text.len());

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status, text));
        }

        let completion: CompletionResponse = response.json().await?;
        first_choice_text(completion)
    }
}

fn first_choice_text(completion: CompletionResponse) -> Result<String> {
    completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(Error::EmptyTranslation)
}

// Request/Response types

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}
