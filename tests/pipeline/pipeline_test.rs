use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tablescribe::document::{InclusionConfig, SectionKey};
use tablescribe::llm::{
    Completion, CompletionRequest, LlmConfig, LlmError, LlmProvider, LlmResult, RetryPolicy,
};
use tablescribe::metadata::{ColumnDescriptor, InMemoryIntrospector, MemoryTable, TableHandle};
use tablescribe::pipeline::{generate_semantic_model, MetadataPipeline, MetadataRequest, PipelineConfig};
use tablescribe::prompt::{HeuristicTokenCounter, TokenCounter};
use tablescribe::semantic::Cardinality;

/// Tracks how many completions run at once.
#[derive(Default)]
struct Counting {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl LlmProvider for Counting {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<Completion> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = if request.prompt.contains("TABLE: shop.orders") {
            json!({
                "table_description": "Orders placed in the web shop",
                "relationships": [{
                    "column": "customer_id",
                    "target_table": "shop.customers",
                    "target_column": "customer_id",
                    "relationship_type": "many_to_one"
                }]
            })
        } else {
            json!({"table_description": "Shop customers", "relationships": []})
        };
        Ok(Completion {
            text: text.to_string(),
            usage: None,
        })
    }
}

/// Token counter that takes ten minutes per call.
struct SlowCounter;

#[async_trait]
impl TokenCounter for SlowCounter {
    async fn count_tokens(&self, text: &str) -> LlmResult<usize> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(text.len() / 4)
    }
}

struct OfflineCounter;

#[async_trait]
impl TokenCounter for OfflineCounter {
    async fn count_tokens(&self, _text: &str) -> LlmResult<usize> {
        Err(LlmError::TokenCount("tokenizer offline".into()))
    }
}

fn orders() -> TableHandle {
    TableHandle::new("", "shop", "orders")
}

fn customers() -> TableHandle {
    TableHandle::new("", "shop", "customers")
}

fn introspector() -> InMemoryIntrospector {
    let order_rows = (0..30)
        .map(|i| vec![json!(i), json!(i % 7), json!(5.0 * i as f64)])
        .collect();
    let customer_rows = (0..7)
        .map(|i| vec![json!(i), json!(["eu", "us"][i % 2])])
        .collect();
    InMemoryIntrospector::new()
        .with_table(
            &orders(),
            MemoryTable::new(vec![
                ColumnDescriptor::new("order_id", "INT64"),
                ColumnDescriptor::new("customer_id", "INT64"),
                ColumnDescriptor::new("amount", "FLOAT64"),
            ])
            .with_rows(order_rows),
        )
        .with_table(
            &customers(),
            MemoryTable::new(vec![
                ColumnDescriptor::new("customer_id", "INT64"),
                ColumnDescriptor::new("region", "STRING"),
            ])
            .with_rows(customer_rows),
        )
}

fn config(max_workers: usize, run_timeout: Option<Duration>) -> PipelineConfig {
    PipelineConfig {
        llm: LlmConfig {
            retry: RetryPolicy::immediate(1),
            ..Default::default()
        },
        max_workers,
        max_concurrent_tables: 3,
        run_timeout,
        inclusion: InclusionConfig::only(&[SectionKey::Relationships]),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_shares_one_worker_bound() {
    let provider = Arc::new(Counting {
        delay: Duration::from_millis(50),
        ..Default::default()
    });
    let pipeline = MetadataPipeline::new(
        Arc::new(introspector()),
        Arc::new(HeuristicTokenCounter::default()),
        provider.clone(),
        config(1, None),
    );

    let results = pipeline
        .generate_metadata_batch(&[orders(), customers(), orders()], &MetadataRequest::default())
        .await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(provider.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_yields_partial_document() {
    let provider = Arc::new(Counting {
        delay: Duration::from_secs(600),
        ..Default::default()
    });
    let pipeline = MetadataPipeline::new(
        Arc::new(introspector()),
        Arc::new(HeuristicTokenCounter::default()),
        provider,
        config(4, Some(Duration::from_secs(30))),
    );

    let doc = pipeline
        .generate_metadata(&orders(), &MetadataRequest::default())
        .await
        .unwrap();

    let stats = &doc.processing_stats;
    assert!(stats.partial);
    assert!(!stats.degraded);
    assert_eq!(stats.sample_rows, 30);
    assert!(doc.table_description.is_none());
    assert!(doc.relationships.is_none());
    assert!(stats.is_omitted(SectionKey::Relationships));
}

#[tokio::test(start_paused = true)]
async fn test_documents_to_semantic_model() {
    let pipeline = MetadataPipeline::new(
        Arc::new(introspector()),
        Arc::new(HeuristicTokenCounter::default()),
        Arc::new(Counting::default()),
        config(4, None),
    );
    let documents: Vec<_> = pipeline
        .generate_metadata_batch(&[orders(), customers()], &MetadataRequest::default())
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let model = generate_semantic_model(&documents, "shop", false, true, None).unwrap();

    let explore = model.explore("orders").unwrap();
    assert_eq!(explore.joins.len(), 1);
    assert_eq!(explore.joins[0].view, "customers");
    assert_eq!(explore.joins[0].relationship, Cardinality::ManyToOne);
    assert_eq!(
        explore.joins[0].sql_on,
        "${orders.customer_id} = ${customers.customer_id}"
    );
    assert!(model.view("customers").unwrap().dimension("customer_id").unwrap().primary_key);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_covers_token_counting() {
    let provider = Arc::new(Counting::default());
    let pipeline = MetadataPipeline::new(
        Arc::new(introspector()),
        Arc::new(SlowCounter),
        provider.clone(),
        config(4, Some(Duration::from_secs(5))),
    );

    let started = tokio::time::Instant::now();
    let doc = pipeline
        .generate_metadata(&orders(), &MetadataRequest::default())
        .await
        .unwrap();

    assert!(started.elapsed() <= Duration::from_secs(5));
    let stats = &doc.processing_stats;
    assert!(stats.partial);
    assert!(!stats.degraded);
    assert_eq!(stats.sample_rows, 30);
    assert!(stats.chunks.is_empty());
    assert!(stats.is_omitted(SectionKey::Relationships));
    assert_eq!(provider.peak.load(Ordering::SeqCst), 0);
    assert_eq!(doc.columns.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_token_count_failure_degrades_to_profile_only_document() {
    let provider = Arc::new(Counting::default());
    let pipeline = MetadataPipeline::new(
        Arc::new(introspector()),
        Arc::new(OfflineCounter),
        provider.clone(),
        config(4, Some(Duration::from_secs(30))),
    );

    let doc = pipeline
        .generate_metadata(&orders(), &MetadataRequest::default())
        .await
        .unwrap();

    let stats = &doc.processing_stats;
    assert!(!stats.partial);
    assert_eq!(stats.sample_rows, 30);
    assert!(doc.relationships.is_none());
    assert!(stats.is_omitted(SectionKey::Relationships));
    assert!(stats
        .errors
        .iter()
        .any(|e| e.contains("token counting failed: tokenizer offline")));
    assert!(doc.column("amount").unwrap().profile.statistics.is_some());
    assert_eq!(provider.peak.load(Ordering::SeqCst), 0);
}
