//! LLM provider backed by the worker sidecar.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::LlmResult;
use super::provider::{Completion, CompletionRequest, LlmProvider, TokenUsage};
use crate::worker::protocol::{methods, CompleteParams, CompleteResponse, UsageInfo};
use crate::worker::WorkerClient;

/// Forwards completions to the sidecar's `llm.complete` method.
pub struct WorkerLlmProvider {
    client: Arc<WorkerClient>,
    model: String,
}

impl WorkerLlmProvider {
    pub fn new(client: Arc<WorkerClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl From<UsageInfo> for TokenUsage {
    fn from(u: UsageInfo) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for WorkerLlmProvider {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<Completion> {
        let response: CompleteResponse = self
            .client
            .request(
                methods::LLM_COMPLETE,
                CompleteParams {
                    model: self.model.clone(),
                    prompt: request.prompt.clone(),
                    max_tokens: request.max_tokens,
                    temperature: request.temperature,
                },
            )
            .await?;

        Ok(Completion {
            text: response.text,
            usage: response.usage.map(Into::into),
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}
