//! LLM call orchestration.
//!
//! The orchestrator sends token-bounded chunk prompts to an [`LlmProvider`],
//! validates the responses into [`LlmSections`] and retries under an
//! explicit [`RetryPolicy`]. All configuration travels in an [`LlmConfig`]
//! passed to the constructor.
//!
//! # Example
//!
//! ```ignore
//! use tablescribe::llm::{LlmConfig, LlmOrchestrator, WorkerLlmProvider};
//!
//! let provider = Arc::new(WorkerLlmProvider::new(client.clone(), "gpt-4o-mini"));
//! let orchestrator = LlmOrchestrator::new(provider, LlmConfig::default());
//! let responses = orchestrator.execute(plan.requests).await;
//! ```

mod error;
mod orchestrator;
mod provider;
mod response;
mod retry;
mod worker_provider;

pub use error::{ErrorKind, LlmError, LlmResult};
pub use orchestrator::{ChunkStatus, LlmConfig, LlmOrchestrator, LlmResponse};
pub use provider::{Completion, CompletionRequest, LlmProvider, TokenUsage};
pub use response::{
    parse_sections, repair, AggregationRule, CategoricalDefinitions, ColumnNarrative,
    LlmSections, ParseMode, QueryExample, Relationship,
};
pub use retry::{Backoff, Jitter, RetryPolicy};
pub use worker_provider::WorkerLlmProvider;
