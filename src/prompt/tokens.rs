//! Token counting capability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{LlmError, LlmResult};
use crate::worker::protocol::{methods, CountTokensParams, CountTokensResponse};
use crate::worker::WorkerClient;

/// Counts tokens for a specific model.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    async fn count_tokens(&self, text: &str) -> LlmResult<usize>;
}

/// Local estimate from character count.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenCounter {
    pub chars_per_token: f64,
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }
}

impl HeuristicTokenCounter {
    pub fn estimate(&self, text: &str) -> usize {
        let chars = text.chars().count() as f64;
        (chars / self.chars_per_token.max(0.1)).ceil() as usize
    }
}

#[async_trait]
impl TokenCounter for HeuristicTokenCounter {
    async fn count_tokens(&self, text: &str) -> LlmResult<usize> {
        Ok(self.estimate(text))
    }
}

/// Counts with the model's tokenizer through the sidecar.
pub struct WorkerTokenCounter {
    client: Arc<WorkerClient>,
    model: String,
}

impl WorkerTokenCounter {
    pub fn new(client: Arc<WorkerClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TokenCounter for WorkerTokenCounter {
    async fn count_tokens(&self, text: &str) -> LlmResult<usize> {
        let response: CountTokensResponse = self
            .client
            .request(
                methods::COUNT_TOKENS,
                CountTokensParams {
                    model: self.model.clone(),
                    text: text.to_string(),
                },
            )
            .await
            .map_err(|e| LlmError::TokenCount(e.to_string()))?;
        Ok(response.count)
    }
}
