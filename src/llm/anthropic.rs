use crate::error::{ConfigError, LlmError};
use crate::llm::{
    api_error, transport_error, ChatCompletion, ChatMessage, ModelClient, ProviderConfig, Role,
    TokenUsage,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages-style backend. System messages travel in a dedicated top-level
/// field, not in the messages array.
pub struct AnthropicClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl AnthropicClient {
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
            .unwrap_or(DEFAULT_ANTHROPIC_URL);
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }

    fn build_body(&self, messages: &[ChatMessage]) -> ApiRequest {
        let system = partition_system(messages);
        let wire_messages = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();

        ApiRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages: wire_messages,
        }
    }
}

/// Joins all system messages into the top-level `system` field.
fn partition_system(messages: &[ChatMessage]) -> Option<String> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    }
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

fn parse_completion(response: ApiResponse) -> Result<ChatCompletion, LlmError> {
    let content = response
        .content
        .iter()
        .filter(|b| b.block_type == "text")
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("");

    if content.is_empty() {
        return Err(LlmError::InvalidResponse(
            "no text content in response".to_string(),
        ));
    }

    Ok(ChatCompletion {
        content,
        token_usage: response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }),
    })
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, LlmError> {
        let request = self.build_body(messages);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
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
