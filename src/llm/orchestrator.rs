//! LLM call orchestration.
//!
//! Each chunk runs an explicit bounded retry loop:
//!
//! ```text
//!   attempt ──► complete ──► parse (strict, then repair) ──► Succeeded
//!      ▲            │ transient error / empty / malformed
//!      └── backoff ◄┘ (while attempts < max_attempts)
//!                   │ permanent error or attempts exhausted
//!                   └──────────────────────────────────────► Failed
//! ```
//!
//! Chunks run concurrently up to `max_in_flight`; an optional deadline
//! abandons whatever is still running and reports it as timed out.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{LlmError, LlmResult};
use super::provider::{CompletionRequest, LlmProvider, TokenUsage};
use super::response::{parse_sections, LlmSections, ParseMode};
use super::retry::RetryPolicy;
use crate::prompt::LlmRequest;

/// LLM client configuration, scoped to one orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Chunks dispatched concurrently.
    pub max_in_flight: usize,
    /// Token ceiling per prompt.
    pub token_threshold: usize,
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            max_in_flight: 4,
            token_threshold: 6000,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// Result of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub chunk_id: usize,
    pub columns: Vec<String>,
    pub token_count: usize,
    pub status: ChunkStatus,
    pub sections: Option<LlmSections>,
    /// Raw text of the accepted response.
    pub response_text: Option<String>,
    pub error: Option<String>,
    pub attempt_count: u32,
    pub usage: TokenUsage,
    pub repaired: bool,
}

impl LlmResponse {
    pub fn succeeded(&self) -> bool {
        self.status == ChunkStatus::Succeeded
    }
}

#[derive(Default)]
struct ChunkProgress {
    attempts: AtomicU32,
    usage: Mutex<TokenUsage>,
}

impl ChunkProgress {
    fn usage(&self) -> TokenUsage {
        self.usage.lock().map(|u| *u).unwrap_or_default()
    }

    fn add_usage(&self, usage: TokenUsage) {
        if let Ok(mut total) = self.usage.lock() {
            total.add(usage);
        }
    }
}

/// Sends chunked requests to a provider with retry and repair.
pub struct LlmOrchestrator {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
    permits: Option<Arc<Semaphore>>,
}

impl LlmOrchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self {
            provider,
            config,
            permits: None,
        }
    }

    /// Share a process-wide bound with sample fetches.
    pub fn with_shared_limit(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = Some(permits);
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Run every request to completion or failure.
    pub async fn execute(&self, requests: Vec<LlmRequest>) -> Vec<LlmResponse> {
        self.execute_until(requests, None).await
    }

    /// Run requests, abandoning anything still in flight at `deadline`.
    ///
    /// Responses are sorted by chunk id. Chunk failures never fail the call.
    pub async fn execute_until(
        &self,
        requests: Vec<LlmRequest>,
        deadline: Option<Instant>,
    ) -> Vec<LlmResponse> {
        let total = requests.len();
        info!(chunks = total, provider = self.provider.name(), "Dispatching LLM requests");

        let mut responses: Vec<LlmResponse> = stream::iter(requests)
            .map(|request| self.run_chunk(request, deadline))
            .buffer_unordered(self.config.max_in_flight.max(1))
            .collect()
            .await;
        responses.sort_by_key(|r| r.chunk_id);

        let failed = responses.iter().filter(|r| !r.succeeded()).count();
        info!(chunks = total, failed, "LLM requests finished");
        responses
    }

    async fn run_chunk(&self, request: LlmRequest, deadline: Option<Instant>) -> LlmResponse {
        let progress = ChunkProgress::default();

        let outcome = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.attempt_loop(&request, &progress))
                    .await
                {
                    Ok(outcome) => Some(outcome),
                    Err(_) => None,
                }
            }
            None => Some(self.attempt_loop(&request, &progress).await),
        };

        let mut response = LlmResponse {
            chunk_id: request.chunk_id,
            columns: request.columns.clone(),
            token_count: request.token_count,
            status: ChunkStatus::Succeeded,
            sections: None,
            response_text: None,
            error: None,
            attempt_count: progress.attempts.load(Ordering::SeqCst),
            usage: progress.usage(),
            repaired: false,
        };

        match outcome {
            Some(Ok((sections, mode, text))) => {
                response.sections = Some(sections);
                response.response_text = Some(text);
                response.repaired = mode == ParseMode::Repaired;
            }
            Some(Err(e)) => {
                warn!(
                    chunk_id = request.chunk_id,
                    attempts = response.attempt_count,
                    error = %e,
                    "Chunk generation failed"
                );
                response.status = ChunkStatus::Failed;
                response.error = Some(e.to_string());
            }
            None => {
                warn!(
                    chunk_id = request.chunk_id,
                    attempts = response.attempt_count,
                    "Chunk abandoned at run deadline"
                );
                response.status = ChunkStatus::TimedOut;
                response.error = Some("run deadline reached".to_string());
            }
        }
        response
    }

    async fn attempt_loop(
        &self,
        request: &LlmRequest,
        progress: &ChunkProgress,
    ) -> LlmResult<(LlmSections, ParseMode, String)> {
        let completion_request = CompletionRequest {
            prompt: request.prompt.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let policy = &self.config.retry;

        loop {
            let attempt = progress.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let result = self.attempt(&completion_request, progress).await;

            match result {
                Ok(parsed) => {
                    debug!(chunk_id = request.chunk_id, attempt, "Chunk parsed");
                    return Ok(parsed);
                }
                Err(e) if e.is_retriable() && policy.should_retry(attempt) => {
                    let delay = policy.next_delay(attempt);
                    warn!(
                        chunk_id = request.chunk_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying chunk"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        request: &CompletionRequest,
        progress: &ChunkProgress,
    ) -> LlmResult<(LlmSections, ParseMode, String)> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .acquire()
                    .await
                    .map_err(|_| LlmError::Unavailable("worker pool closed".to_string()))?,
            ),
            None => None,
        };

        let completion = self.provider.complete(request).await?;
        if let Some(usage) = completion.usage {
            progress.add_usage(usage);
        }
        let (sections, mode) = parse_sections(&completion.text)?;
        Ok((sections, mode, completion.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    use crate::llm::Completion;

    struct Scripted {
        replies: Mutex<Vec<LlmResult<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut replies: Vec<LlmResult<String>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        async fn complete(&self, _request: &CompletionRequest) -> LlmResult<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop().unwrap_or(Ok(String::new()));
            reply.map(|text| Completion {
                text,
                usage: Some(TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                }),
            })
        }
    }

    fn request(chunk_id: usize) -> LlmRequest {
        LlmRequest {
            chunk_id,
            columns: vec!["id".into()],
            prompt: "describe".into(),
            payload: "[]".into(),
            token_count: 10,
            oversized: false,
        }
    }

    fn config(attempts: u32) -> LlmConfig {
        LlmConfig {
            retry: RetryPolicy::immediate(attempts),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retries_malformed_then_succeeds() {
        let provider = Arc::new(Scripted::new(vec![
            Ok("not json".into()),
            Ok(r#"{"table_description": "ok"}"#.into()),
        ]));
        let orchestrator = LlmOrchestrator::new(provider.clone(), config(3));
        let responses = orchestrator.execute(vec![request(1)]).await;

        assert_eq!(responses[0].status, ChunkStatus::Succeeded);
        assert_eq!(responses[0].attempt_count, 2);
        assert_eq!(responses[0].usage.total(), 30);
    }

    #[tokio::test]
    async fn test_permanent_error_attempts_once() {
        let provider = Arc::new(Scripted::new(vec![Err(LlmError::AuthFailed("key".into()))]));
        let orchestrator = LlmOrchestrator::new(provider.clone(), config(5));
        let responses = orchestrator.execute(vec![request(1)]).await;

        assert_eq!(responses[0].status, ChunkStatus::Failed);
        assert_eq!(responses[0].attempt_count, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_chunk() {
        let provider = Arc::new(Scripted::new(vec![
            Err(LlmError::RateLimited("429".into())),
            Ok(String::new()),
            Ok("{broken".into()),
        ]));
        let orchestrator = LlmOrchestrator::new(provider, config(3));
        let responses = orchestrator.execute(vec![request(1)]).await;

        assert_eq!(responses[0].status, ChunkStatus::Failed);
        assert_eq!(responses[0].attempt_count, 3);
        assert!(responses[0].error.as_deref().unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn test_deadline_abandons_chunks() {
        struct Slow;
        #[async_trait]
        impl LlmProvider for Slow {
            async fn complete(&self, _request: &CompletionRequest) -> LlmResult<Completion> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(Completion::default())
            }
        }

        let orchestrator = LlmOrchestrator::new(Arc::new(Slow), config(1));
        let deadline = Instant::now() + std::time::Duration::from_millis(20);
        let responses = orchestrator
            .execute_until(vec![request(2), request(1)], Some(deadline))
            .await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].chunk_id, 1);
        assert!(responses.iter().all(|r| r.status == ChunkStatus::TimedOut));
        assert_eq!(responses[0].attempt_count, 1);
    }
}
