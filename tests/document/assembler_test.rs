use std::sync::Arc;

use serde_json::{json, Value};
use tablescribe::document::{InclusionConfig, MetadataAssembler, MetadataDocument, RunInfo, SectionKey};
use tablescribe::llm::{ChunkStatus, LlmResponse, LlmSections, TokenUsage};
use tablescribe::metadata::{ColumnDescriptor, InMemoryIntrospector, MemoryTable, TableHandle};
use tablescribe::profiling::{ProfileOutcome, ProfilingConfig, StatisticalProfiler};
use tablescribe::sampling::{SamplingBudget, SamplingPlanner, SqlDialect};

fn table() -> TableHandle {
    TableHandle::new("", "shop", "orders")
}

async fn outcome() -> ProfileOutcome {
    let columns = vec![
        ColumnDescriptor::new("order_id", "INT64"),
        ColumnDescriptor::new("status", "STRING"),
        ColumnDescriptor::new("amount", "FLOAT64"),
    ];
    let rows = (0..60)
        .map(|i| {
            vec![
                json!(i),
                json!(["open", "paid", "refunded"][i % 3]),
                json!(10.0 + i as f64),
            ]
        })
        .collect();
    let introspector = Arc::new(
        InMemoryIntrospector::new()
            .with_table(&table(), MemoryTable::new(columns.clone()).with_rows(rows)),
    );
    let specs = SamplingPlanner::new(introspector.clone(), SqlDialect::Ansi)
        .plan(&table(), &Default::default(), &SamplingBudget::default())
        .await
        .unwrap();
    StatisticalProfiler::new(introspector, ProfilingConfig::default())
        .profile(&table(), &columns, &specs)
        .await
        .unwrap()
}

fn response(chunk_id: usize, sections: Value) -> LlmResponse {
    LlmResponse {
        chunk_id,
        columns: vec![],
        token_count: 100,
        status: ChunkStatus::Succeeded,
        sections: Some(serde_json::from_value::<LlmSections>(sections).unwrap()),
        response_text: None,
        error: None,
        attempt_count: 1,
        usage: TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 40,
        },
        repaired: false,
    }
}

fn responses() -> Vec<LlmResponse> {
    vec![
        response(
            1,
            json!({
                "table_description": "One row per order",
                "columns": [
                    {"name": "order_id", "business_name": "Order Number"},
                    {"name": "discount_code", "description": "Not a real column"}
                ],
                "business_rules": ["amount is positive"],
                "relationships": [{"column": "order_id", "target_table": "shop.payments", "target_column": "order_id", "relationship_type": "one_to_many"}],
                "categorical_definitions": {"status": {"open": "Awaiting payment"}},
                "query_examples": [{"title": "Revenue", "sql": "SELECT SUM(amount) FROM shop.orders"}],
                "aggregation_rules": [{"column": "amount", "aggregation": "sum", "group_by": ["status"]}],
                "additional_insights": ["statuses are evenly split"]
            }),
        ),
        response(
            2,
            json!({
                "columns": [{"name": "amount", "description": "Order total"}],
                "business_rules": ["amount is positive", "refunds keep their amount"]
            }),
        ),
    ]
}

fn assemble(outcome: &ProfileOutcome, inclusion: &InclusionConfig) -> MetadataDocument {
    MetadataAssembler::assemble(&table(), outcome, &responses(), inclusion, RunInfo::default())
}

#[tokio::test]
async fn test_assembly_is_idempotent() {
    let outcome = outcome().await;
    let first = assemble(&outcome, &InclusionConfig::all()).to_json().unwrap();
    let second = assemble(&outcome, &InclusionConfig::all()).to_json().unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_merged_document() {
    let doc = assemble(&outcome().await, &InclusionConfig::all());

    assert_eq!(doc.table_description.as_deref(), Some("One row per order"));
    assert_eq!(
        doc.column("order_id").unwrap().business_name.as_deref(),
        Some("Order Number")
    );
    assert_eq!(doc.column("amount").unwrap().description.as_deref(), Some("Order total"));
    assert_eq!(
        doc.business_rules.as_deref(),
        Some(&["amount is positive".to_string(), "refunds keep their amount".to_string()][..])
    );
    assert!(doc.data_quality.is_some());

    let dropped = &doc.processing_stats.dropped_columns;
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].column, "discount_code");
    assert_eq!(doc.processing_stats.tokens.total_tokens, 280);

    let amount = doc.column("amount").unwrap().profile.statistics.as_ref().unwrap();
    assert_eq!(amount.min, 10.0);
    assert_eq!(amount.max, 69.0);
}

#[tokio::test]
async fn test_disabled_sections_are_absent() {
    let outcome = outcome().await;
    let all: Value = serde_json::from_str(&assemble(&outcome, &InclusionConfig::all()).to_json().unwrap()).unwrap();

    for key in SectionKey::ALL {
        assert!(all.get(key.as_str()).is_some(), "{key} missing");

        let without: Vec<SectionKey> = SectionKey::ALL.into_iter().filter(|k| *k != key).collect();
        let doc = assemble(&outcome, &InclusionConfig::only(&without));
        let json: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(json.get(key.as_str()).is_none(), "{key} present while disabled");
        assert!(!doc.processing_stats.is_omitted(key));

        for other in &without {
            assert!(json.get(other.as_str()).is_some(), "{other} lost when {key} disabled");
        }
    }
}

#[tokio::test]
async fn test_json_and_yaml_share_field_names() {
    let doc = assemble(&outcome().await, &InclusionConfig::all());

    let from_yaml = MetadataDocument::from_yaml(&doc.to_yaml().unwrap()).unwrap();
    let from_json = MetadataDocument::from_json(&doc.to_json().unwrap()).unwrap();
    assert_eq!(from_yaml, from_json);
    assert_eq!(from_json, doc);
}
