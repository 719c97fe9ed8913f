use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;
use crate::llm::{
    Provider, ProviderConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_MS,
};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Clone)]
pub struct EngineConfig {
    pub ai: AiConfig,
    pub database: DatabaseConfig,
}

#[derive(Clone)]
pub struct AiConfig {
    /// Explicit provider choice; when unset, the first configured API key
    /// wins (Anthropic > OpenAI > Azure).
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub openai_api_key: Option<SecretString>,
    pub anthropic_api_key: Option<SecretString>,
    pub azure_api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub database: String,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            ai: AiConfig {
                provider: match std::env::var("AI_PROVIDER") {
                    Ok(raw) => Some(
                        Provider::parse(&raw)
                            .ok_or_else(|| ConfigError::InvalidValue("AI_PROVIDER".into()))?,
                    ),
                    Err(_) => None,
                },
                model: std::env::var("AI_MODEL").ok(),
                openai_api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                    .ok()
                    .map(SecretString::from),
                azure_api_key: std::env::var("AZURE_OPENAI_API_KEY")
                    .ok()
                    .map(SecretString::from),
                base_url: std::env::var("AI_BASE_URL").ok(),
                max_tokens: parse_env("AI_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
                temperature: parse_env("AI_TEMPERATURE", DEFAULT_TEMPERATURE)?,
                timeout_ms: parse_env("AI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            },
            database: DatabaseConfig {
                url: std::env::var("MONGODB_URL")
                    .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                database: std::env::var("MONGODB_DB").unwrap_or_else(|_| "review_engine".to_string()),
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

impl AiConfig {
    /// Materializes the connection settings for the active provider.
    pub fn provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        let provider = self.provider.or_else(|| self.detect_provider()).ok_or_else(|| {
            ConfigError::MissingRequired("AI_PROVIDER or a provider API key".to_string())
        })?;

        let (key, key_name) = match provider {
            Provider::OpenAi => (&self.openai_api_key, "OPENAI_API_KEY"),
            Provider::Anthropic => (&self.anthropic_api_key, "ANTHROPIC_API_KEY"),
            Provider::Azure => (&self.azure_api_key, "AZURE_OPENAI_API_KEY"),
        };
        let key = key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired(key_name.to_string()))?;

        let model = self
            .model
            .clone()
            .or_else(|| default_model(provider).map(|m| m.to_string()))
            .ok_or_else(|| ConfigError::MissingRequired("AI_MODEL".to_string()))?;

        let mut config = ProviderConfig::new(provider, model, key.expose_secret())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout_ms(self.timeout_ms);
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }

        config.validate()?;
        Ok(config)
    }

    fn detect_provider(&self) -> Option<Provider> {
        if self.anthropic_api_key.is_some() {
            Some(Provider::Anthropic)
        } else if self.openai_api_key.is_some() {
            Some(Provider::OpenAi)
        } else if self.azure_api_key.is_some() {
            Some(Provider::Azure)
        } else {
            None
        }
    }
}

fn default_model(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::OpenAi => Some(DEFAULT_OPENAI_MODEL),
        Provider::Anthropic => Some(DEFAULT_ANTHROPIC_MODEL),
        // Azure deployments have no universal default name.
        Provider::Azure => None,
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            openai_api_key: None,
            anthropic_api_key: None,
            azure_api_key: None,
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "review_engine".to_string(),
        }
    }
}
