//! AI orchestration core for a code-review workflow: provider-agnostic LLM
//! calls, strict validation of model output, multi-file review aggregation,
//! report-context collection, and state-triggered report generation.
//!
//! The crate exposes no network listener; it is a library invoked by the
//! surrounding application. Persistence and the source-control diff client
//! are reached through the traits in [`ports`].

pub mod ai;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod ports;
pub mod store;
pub mod telemetry;
pub mod trigger;
pub mod types;

pub use ai::report::ReportGenerator;
pub use ai::reviewer::{FileInput, ReviewAggregator};
pub use config::{AiConfig, DatabaseConfig, EngineConfig};
pub use context::ContextCollector;
pub use error::{ConfigError, EngineError, LlmError, StoreError, ValidationError};
pub use llm::{create_client, ChatMessage, ModelClient, Provider, ProviderConfig};
pub use trigger::CompletionTrigger;
pub use types::{
    AggregatedReviewResult, Recommendation, ReportContext, ReviewResult, ReviewStatus,
    TestReportResult, TriggerOutcome,
};
