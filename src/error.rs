use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    MissingRequired(String),

    #[error("invalid value for {0}")]
    InvalidValue(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Model output could not be turned into a result shape. Not retried
/// automatically: the same prompt is unlikely to produce better output.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no JSON object found in model output")]
    Extraction,

    #[error("malformed JSON: {0}")]
    Parse(String),

    #[error("invalid field `{field}`: {message}")]
    Field { field: String, message: String },
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
#[error("diff fetch failed: {0}")]
pub struct DiffError(pub String);

/// Uniform failure shape surfaced by the aggregator, collector, and
/// generator. `code()` carries the caller-facing classification.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Execution data is required to generate a report")]
    MissingExecution,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Validation(_) => Some("PARSE_ERROR"),
            Self::Llm(e) if e.is_timeout() => Some("TIMEOUT"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_retryable() {
        let rate_limited = LlmError::RateLimited {
            retry_after_ms: 1000,
        };
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.retry_after_ms(), Some(1000));

        assert!(LlmError::Timeout { timeout_ms: 5000 }.is_retryable());
        assert!(LlmError::Network("connection reset".to_string()).is_retryable());

        let server_error = LlmError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(server_error.is_retryable());

        let client_error = LlmError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!client_error.is_retryable());
        assert_eq!(client_error.retry_after_ms(), None);
    }

    #[test]
    fn test_engine_error_codes() {
        let parse = EngineError::Validation(ValidationError::Parse("eof".to_string()));
        assert_eq!(parse.code(), Some("PARSE_ERROR"));

        let timeout = EngineError::Llm(LlmError::Timeout { timeout_ms: 1000 });
        assert_eq!(timeout.code(), Some("TIMEOUT"));

        let network = EngineError::Llm(LlmError::Network("reset".to_string()));
        assert_eq!(network.code(), None);

        assert_eq!(EngineError::MissingExecution.code(), None);
    }

    #[test]
    fn test_missing_execution_message() {
        let msg = EngineError::MissingExecution.to_string();
        assert!(msg.contains("Execution data is required"));
    }
}
