//! Configuration file support

use chatflow_api::Language;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for the chatflow CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chatflow to talk to
    pub chatflow_id: Option<String>,
    /// Backend base URL
    pub api_host: Option<String>,
    /// Greeting shown at the start of every conversation
    pub welcome_message: Option<String>,
    /// Language the chatflow understands (english, korean)
    pub backend_language: Option<String>,
    /// Translate non-default-language input before sending (true by default)
    pub translate: Option<bool>,
    /// Completions endpoint used for translation
    pub translation_url: Option<String>,
    /// Directory holding persisted sessions
    pub storage_dir: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Extra settings forwarded with every prediction request
    pub override_config: Option<toml::Table>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    /// Bearer token for the chatflow backend
    pub chatflow: Option<String>,
    /// Key for the translation service
    pub openai: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatflow")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CHATFLOW_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Parse config file contents
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            api_host: Some(chatflow_api::backend::DEFAULT_API_HOST.to_string()),
            backend_language: Some("english".to_string()),
            translate: Some(true),
            ..Default::default()
        };

        default_config.save()?;
        Ok(path)
    }

    /// Language the chatflow expects; unknown values fall back to English
    pub fn backend_language(&self) -> Language {
        match self.backend_language.as_deref().map(str::parse::<Language>) {
            Some(Ok(language)) => language,
            Some(Err(_)) => {
                eprintln!("Warning: Unknown backend_language, using English");
                Language::default()
            }
            None => Language::default(),
        }
    }

    /// Backend key, checking config then `CHATFLOW_API_KEY`
    pub fn chatflow_api_key(&self) -> Option<String> {
        self.api_keys
            .chatflow
            .clone()
            .or_else(|| std::env::var("CHATFLOW_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }

    /// Translation key, checking config then `OPENAI_API_KEY`
    pub fn translation_api_key(&self) -> Option<String> {
        self.api_keys
            .openai
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty())
    }

    /// Override settings as JSON, ready to forward to the backend
    pub fn override_config_json(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        let table = self.override_config.as_ref()?;
        match serde_json::to_value(table) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                eprintln!("Warning: Ignoring override_config: {}", e);
                None
            }
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# chatflow configuration file
# Place at ~/.config/chatflow/config.toml (Linux) or set CHATFLOW_CONFIG_PATH

# Chatflow to talk to
# chatflow_id = "00000000-0000-0000-0000-000000000000"

# Backend base URL
api_host = "http://localhost:3000"

# Greeting shown at the start of every conversation
# welcome_message = "Hi there! How can I help?"

# Language the chatflow understands (english, korean)
backend_language = "english"

# Translate input written in another language before sending
translate = true

# Where conversations are kept between runs
# storage_dir = "~/.local/share/chatflow/sessions"

# Request timeout in seconds
# timeout_secs = 60

# Extra settings forwarded with every prediction request
# [override_config]
# temperature = 0.2

# API keys (optional - can also use environment variables
# CHATFLOW_API_KEY and OPENAI_API_KEY)
[api_keys]
# chatflow = "..."
# openai = "sk-..."
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(config.api_host.as_deref(), Some("http://localhost:3000"));
        assert_eq!(config.translate, Some(true));
        assert_eq!(config.backend_language(), Language::English);
        assert!(config.chatflow_id.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("chatflow_id = \"abc\"\n").unwrap();
        assert_eq!(config.chatflow_id.as_deref(), Some("abc"));
        assert!(config.api_keys.openai.is_none());
        assert!(config.override_config_json().is_none());
    }

    #[test]
    fn test_backend_language_parsing() {
        let config = Config::parse("backend_language = \"ko\"\n").unwrap();
        assert_eq!(config.backend_language(), Language::Korean);
        let config = Config::parse("backend_language = \"klingon\"\n").unwrap();
        assert_eq!(config.backend_language(), Language::English);
    }

    #[test]
    fn test_override_config_converted_to_json() {
        let config = Config::parse("[override_config]\ntemperature = 0.2\nsessionId = \"s1\"\n").unwrap();
        let map = config.override_config_json().unwrap();
        assert_eq!(map["temperature"], serde_json::json!(0.2));
        assert_eq!(map["sessionId"], "s1");
    }

    #[test]
    fn test_keys_from_config_take_precedence() {
        let config = Config::parse("[api_keys]\nchatflow = \"cf-key\"\nopenai = \"sk-key\"\n").unwrap();
        assert_eq!(config.chatflow_api_key().as_deref(), Some("cf-key"));
        assert_eq!(config.translation_api_key().as_deref(), Some("sk-key"));
    }
}
