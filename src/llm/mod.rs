mod retry;

pub mod anthropic;
pub mod azure;
pub mod openai;

pub use retry::{with_retry, RetryConfig};

use crate::error::{ConfigError, LlmError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// A normalized chat backend. One implementation per wire protocol; callers
/// never see provider-specific request or response shapes.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, LlmError>;

    /// Model identifier recorded on results produced from this client.
    fn model(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Azure,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Azure => "azure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "azure" => Some(Self::Azure),
            _ => None,
        }
    }
}

/// Immutable connection settings for one provider backend. Owned by exactly
/// one client; validated once at construction, not per call.
pub struct ProviderConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: SecretString,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn new(provider: Provider, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::MissingRequired("model".to_string()));
        }
        if self.api_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingRequired("api_key".to_string()));
        }
        if self.provider == Provider::Azure
            && self.base_url.as_deref().unwrap_or("").is_empty()
        {
            return Err(ConfigError::MissingRequired("base_url".to_string()));
        }
        Ok(())
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("http client: {}", e)))
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Normalized result of one adapter call. Produced once, never mutated.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub token_usage: Option<TokenUsage>,
}

/// Builds the client for the configured provider. The single place where the
/// wire protocol is chosen.
pub fn create_client(config: ProviderConfig) -> Result<Box<dyn ModelClient>, ConfigError> {
    config.validate()?;
    Ok(match config.provider {
        Provider::OpenAi => Box::new(openai::OpenAiClient::new(config)?),
        Provider::Anthropic => Box::new(anthropic::AnthropicClient::new(config)?),
        Provider::Azure => Box::new(azure::AzureClient::new(config)?),
    })
}

/// Classifies a transport-level failure so callers can decide whether to
/// retry: timeouts and connection failures are transient, everything else is
/// not.
pub(crate) fn transport_error(err: reqwest::Error, timeout_ms: u64) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout { timeout_ms }
    } else {
        LlmError::Network(err.to_string())
    }
}

/// Maps a non-2xx provider response to an error, pulling the human-readable
/// message out of the provider's error envelope when there is one.
pub(crate) async fn api_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    if status == 429 {
        return LlmError::RateLimited {
            retry_after_ms: 60_000,
        };
    }

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or(body);

    LlmError::Api { status, message }
}
