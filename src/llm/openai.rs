use crate::error::{ConfigError, LlmError};
use crate::llm::{
    api_error, transport_error, ChatCompletion, ChatMessage, ModelClient, ProviderConfig, Role,
    TokenUsage,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Chat-completions style backend.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = config.http_client()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    fn build_body(&self, messages: &[ChatMessage]) -> ApiRequest {
        ApiRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(wire_message).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

pub(super) fn wire_message(msg: &ChatMessage) -> WireMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    WireMessage {
        role: role.to_string(),
        content: msg.content.clone(),
    }
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
pub(super) struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub(super) struct ApiResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Deserialize)]
pub(super) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub(super) struct ResponseMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize)]
pub(super) struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

pub(super) fn parse_completion(response: ApiResponse) -> Result<ChatCompletion, LlmError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

    if content.is_empty() {
        return Err(LlmError::InvalidResponse(
            "empty completion content".to_string(),
        ));
    }

    Ok(ChatCompletion {
        content,
        token_usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
    })
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, LlmError> {
        let request = self.build_body(messages);

        let response = self
            .client
            .post(self.endpoint())
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout_ms))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("invalid response body: {}", e)))?;

        parse_completion(api_response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
