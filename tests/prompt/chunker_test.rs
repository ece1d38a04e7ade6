use std::sync::Arc;

use serde_json::Value;
use tablescribe::document::SectionKey;
use tablescribe::metadata::{ColumnDescriptor, TableHandle};
use tablescribe::profiling::{CategoricalValue, ColumnProfile};
use tablescribe::prompt::{ChunkPlanner, HeuristicTokenCounter, MetadataFragment, PromptTemplate};

fn table() -> TableHandle {
    TableHandle::new("", "crm", "accounts")
}

fn wide_column(i: usize) -> ColumnProfile {
    let mut profile = ColumnProfile::schema_only(&ColumnDescriptor::new(format!("attr_{i:02}"), "STRING"));
    profile.sample_values = (0..5)
        .map(|v| format!("sample value {v} for attribute number {i}"))
        .collect();
    profile
}

fn fragment(columns: Vec<ColumnProfile>) -> MetadataFragment {
    MetadataFragment {
        table: table(),
        sample_rows: 500,
        columns,
        sections: vec![SectionKey::BusinessRules, SectionKey::Relationships],
        custom_instructions: None,
    }
}

fn overhead() -> usize {
    let template = PromptTemplate::new(
        &table(),
        500,
        vec![SectionKey::BusinessRules, SectionKey::Relationships],
        None,
    );
    HeuristicTokenCounter::default().estimate(&template.render("[]"))
}

fn payload_names(payload: &str) -> Vec<String> {
    let columns: Vec<Value> = serde_json::from_str(payload).unwrap();
    columns
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_every_column_lands_in_exactly_one_chunk() {
    let columns: Vec<ColumnProfile> = (0..40).map(wide_column).collect();
    let expected: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    let threshold = overhead() + 400;

    let planner = ChunkPlanner::new(Arc::new(HeuristicTokenCounter::default()));
    let plan = planner.chunk(&fragment(columns), threshold).await.unwrap();

    assert!(plan.requests.len() > 1);
    assert!(plan.truncations.is_empty());

    let covered: Vec<String> = plan
        .requests
        .iter()
        .flat_map(|r| r.columns.iter().cloned())
        .collect();
    assert_eq!(covered, expected);

    for (idx, request) in plan.requests.iter().enumerate() {
        assert_eq!(request.chunk_id, idx + 1);
        assert!(!request.oversized);
        assert!(request.token_count <= threshold);
        assert_eq!(payload_names(&request.payload), request.columns);
        assert!(request.prompt.contains(&request.payload));
    }
}

#[tokio::test]
async fn test_oversized_column_is_truncated_not_split() {
    let mut huge = ColumnProfile::schema_only(&ColumnDescriptor::new("segment", "STRING"));
    huge.is_categorical = true;
    huge.categorical_values = (0..400)
        .map(|i| CategoricalValue {
            value: format!("customer segment label number {i}"),
            count: 1,
            percentage: 0.25,
        })
        .collect();
    let columns = vec![wide_column(1), huge, wide_column(2)];
    let threshold = overhead() + 300;

    let planner = ChunkPlanner::new(Arc::new(HeuristicTokenCounter::default()));
    let plan = planner.chunk(&fragment(columns), threshold).await.unwrap();

    let covered: Vec<&str> = plan
        .requests
        .iter()
        .flat_map(|r| r.columns.iter().map(String::as_str))
        .collect();
    assert_eq!(covered, vec!["attr_01", "segment", "attr_02"]);

    assert_eq!(plan.truncations.len(), 1);
    let truncation = &plan.truncations[0];
    assert_eq!(truncation.column, "segment");
    assert_eq!(truncation.categorical_values_before, 400);
    assert!(truncation.categorical_values_after < 400);

    let holder = plan
        .requests
        .iter()
        .find(|r| r.columns.contains(&"segment".to_string()))
        .unwrap();
    assert_eq!(truncation.chunk_id, holder.chunk_id);
}
