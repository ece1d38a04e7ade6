//! LLM provider capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::LlmResult;

/// One completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Text returned by a provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Something that completes prompts.
///
/// Implementations normalize provider-specific failures into [`LlmError`]
/// variants so the orchestrator can tell transient from permanent errors.
///
/// [`LlmError`]: super::LlmError
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<Completion>;

    /// Provider name for logs.
    fn name(&self) -> &str {
        "llm"
    }
}
