use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tablescribe::document::{InclusionConfig, MetadataAssembler, RunInfo};
use tablescribe::llm::{
    ChunkStatus, Completion, CompletionRequest, LlmConfig, LlmError, LlmOrchestrator, LlmProvider,
    LlmResult, RetryPolicy,
};
use tablescribe::metadata::{ColumnDescriptor, TableHandle};
use tablescribe::profiling::ProfileOutcome;
use tablescribe::prompt::LlmRequest;

/// Answers per chunk prompt; `chunk-2` never gets valid JSON.
#[derive(Default)]
struct PerChunk {
    calls: Mutex<HashMap<String, u32>>,
}

impl PerChunk {
    fn calls(&self, prompt: &str) -> u32 {
        self.calls.lock().unwrap().get(prompt).copied().unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for PerChunk {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<Completion> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.prompt.clone())
            .or_default() += 1;

        let text = match request.prompt.as_str() {
            "chunk-1" => json!({
                "table_description": "Customer accounts",
                "columns": [{"name": "account_id", "description": "Account key"}],
                "business_rules": ["one row per account"]
            })
            .to_string(),
            "chunk-3" => json!({
                "columns": [{"name": "region", "description": "Sales region"}],
                "business_rules": ["one row per account", "region is always set"]
            })
            .to_string(),
            _ => "Sorry, I can only answer in prose today.".to_string(),
        };
        Ok(Completion { text, usage: None })
    }
}

fn request(chunk_id: usize, column: &str) -> LlmRequest {
    LlmRequest {
        chunk_id,
        columns: vec![column.to_string()],
        prompt: format!("chunk-{chunk_id}"),
        payload: "[]".into(),
        token_count: 20,
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
async fn test_malformed_middle_chunk_fails_alone() {
    let provider = Arc::new(PerChunk::default());
    let orchestrator = LlmOrchestrator::new(provider.clone(), config(3));

    let responses = orchestrator
        .execute(vec![
            request(1, "account_id"),
            request(2, "plan"),
            request(3, "region"),
        ])
        .await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].status, ChunkStatus::Succeeded);
    assert_eq!(responses[1].status, ChunkStatus::Failed);
    assert_eq!(responses[1].attempt_count, 3);
    assert_eq!(responses[2].status, ChunkStatus::Succeeded);
    assert_eq!(provider.calls("chunk-2"), 3);
    assert_eq!(provider.calls("chunk-1"), 1);

    let columns = [
        ColumnDescriptor::new("account_id", "INT64"),
        ColumnDescriptor::new("plan", "STRING"),
        ColumnDescriptor::new("region", "STRING"),
    ];
    let document = MetadataAssembler::assemble(
        &TableHandle::new("", "crm", "accounts"),
        &ProfileOutcome::schema_only(&columns, vec![]),
        &responses,
        &InclusionConfig::all(),
        RunInfo::default(),
    );

    assert_eq!(document.table_description.as_deref(), Some("Customer accounts"));
    assert_eq!(
        document.column("account_id").unwrap().description.as_deref(),
        Some("Account key")
    );
    assert!(document.column("plan").unwrap().description.is_none());
    assert_eq!(
        document.column("region").unwrap().description.as_deref(),
        Some("Sales region")
    );
    assert_eq!(
        document.business_rules,
        Some(vec![
            "one row per account".to_string(),
            "region is always set".to_string()
        ])
    );

    let stats = &document.processing_stats;
    assert_eq!(stats.failed_chunks, 1);
    assert!(!stats.partial);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].starts_with("Chunk 2 of crm.accounts failed after 3 attempts"));
}

struct Rejecting {
    calls: AtomicU32,
}

#[async_trait]
impl LlmProvider for Rejecting {
    async fn complete(&self, _request: &CompletionRequest) -> LlmResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::AuthFailed("invalid api key".into()))
    }
}

#[tokio::test]
async fn test_permanent_error_is_attempted_once() {
    let provider = Arc::new(Rejecting {
        calls: AtomicU32::new(0),
    });
    let orchestrator = LlmOrchestrator::new(provider.clone(), config(5));

    let responses = orchestrator.execute(vec![request(1, "account_id")]).await;

    assert_eq!(responses[0].status, ChunkStatus::Failed);
    assert_eq!(responses[0].attempt_count, 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(responses[0].error.as_deref().unwrap().contains("invalid api key"));
}

struct Stalled;

#[async_trait]
impl LlmProvider for Stalled {
    async fn complete(&self, _request: &CompletionRequest) -> LlmResult<Completion> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Completion::default())
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_marks_chunks_timed_out() {
    let orchestrator = LlmOrchestrator::new(Arc::new(Stalled), config(1));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

    let responses = orchestrator
        .execute_until(vec![request(1, "a"), request(2, "b")], Some(deadline))
        .await;

    assert!(responses.iter().all(|r| r.status == ChunkStatus::TimedOut));
}
