use crate::error::{ConfigError, LlmError};
use crate::llm::openai::{parse_completion, wire_message, ApiResponse, WireMessage};
use crate::llm::{api_error, transport_error, ChatCompletion, ChatMessage, ModelClient, ProviderConfig};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;

const API_VERSION: &str = "2024-02-15-preview";

/// Deployment-scoped chat-completions backend. The model name selects the
/// deployment in the URL path; `base_url` is mandatory.
pub struct AzureClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl AzureClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = config.http_client()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or("");
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            base.trim_end_matches('/'),
            self.config.model,
            API_VERSION
        )
    }

    fn build_body(&self, messages: &[ChatMessage]) -> ApiRequest {
        ApiRequest {
            messages: messages.iter().map(wire_message).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }
}

// Same envelope as the chat-completions wire, minus the model field: the
// deployment path already names it.
#[derive(Serialize)]
struct ApiRequest {
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[async_trait]
impl ModelClient for AzureClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, LlmError> {
        let request = self.build_body(messages);

        let response = self
            .client
            .post(self.endpoint())
            .header("api-key", self.config.api_key.expose_secret())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    fn client() -> AzureClient {
        AzureClient::new(
            ProviderConfig::new(Provider::Azure, "gpt-4o-review", "azure-key")
                .with_base_url("https://example.openai.azure.com/"),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_is_deployment_scoped() {
        let endpoint = client().endpoint();
        assert_eq!(
            endpoint,
            format!(
                "https://example.openai.azure.com/openai/deployments/gpt-4o-review/chat/completions?api-version={}",
                API_VERSION
            )
        );
    }

    #[test]
    fn test_build_body_has_no_model_field() {
        let body = client().build_body(&[ChatMessage::user("hi")]);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_construction_without_base_url_fails() {
        let result = AzureClient::new(ProviderConfig::new(
            Provider::Azure,
            "gpt-4o-review",
            "azure-key",
        ));
        assert!(matches!(result, Err(ConfigError::MissingRequired(_))));
    }
}
