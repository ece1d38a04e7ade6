use std::sync::Arc;

use serde_json::json;
use tablescribe::error::PipelineError;
use tablescribe::metadata::{
    ColumnDescriptor, InMemoryIntrospector, Introspector, MemoryTable, PartitionType, TableHandle,
};
use tablescribe::sampling::{SampleStrategy, SamplingBudget, SamplingPlanner, SqlDialect};

fn daily_events() -> (TableHandle, Arc<InMemoryIntrospector>) {
    let table = TableHandle::new("analytics", "web", "events");
    let partitions = (1..=30)
        .map(|day| {
            (
                format!("2024-06-{:02}", day),
                vec![vec![json!(day), json!(format!("2024-06-{:02}", day))]],
            )
        })
        .collect();
    let data = MemoryTable::new(vec![
        ColumnDescriptor::new("event_id", "INT64"),
        ColumnDescriptor::new("event_date", "DATE"),
    ])
    .with_partitions(PartitionType::Time, Some("event_date"), partitions);
    (
        table.clone(),
        Arc::new(InMemoryIntrospector::new().with_table(&table, data)),
    )
}

fn flat_table(rows: usize, cost_per_row: f64) -> (TableHandle, Arc<InMemoryIntrospector>) {
    let table = TableHandle::new("", "shop", "orders");
    let data = MemoryTable::new(vec![ColumnDescriptor::new("order_id", "INT64")])
        .with_rows((0..rows).map(|i| vec![json!(i)]).collect());
    let introspector = InMemoryIntrospector::new()
        .with_table(&table, data)
        .with_cost_per_row(cost_per_row);
    (table, Arc::new(introspector))
}

#[tokio::test]
async fn test_only_recent_partitions_are_targeted() {
    let (table, introspector) = daily_events();
    let info = introspector.get_partition_info(&table).await.unwrap();
    let planner = SamplingPlanner::new(introspector, SqlDialect::BigQuery);

    let budget = SamplingBudget {
        max_partitions: 5,
        ..Default::default()
    };
    let specs = planner.plan(&table, &info, &budget).await.unwrap();

    assert_eq!(specs.len(), 5);
    assert!(specs.iter().all(|s| s.strategy == SampleStrategy::TimeBased));
    let targeted: Vec<&str> = specs
        .iter()
        .flat_map(|s| s.target_partitions.iter().map(String::as_str))
        .collect();
    assert_eq!(
        targeted,
        vec!["2024-06-30", "2024-06-29", "2024-06-28", "2024-06-27", "2024-06-26"]
    );
    assert!(specs
        .iter()
        .all(|s| s.partition_column.as_deref() == Some("event_date")));
}

#[tokio::test]
async fn test_unpartitioned_table_uses_random_sampling() {
    let (table, introspector) = flat_table(100, 0.0);
    let planner = SamplingPlanner::new(introspector, SqlDialect::Ansi);

    let specs = planner
        .plan(&table, &Default::default(), &SamplingBudget::default())
        .await
        .unwrap();

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].strategy, SampleStrategy::Random);
    assert_eq!(specs[0].reductions, 0);
}

#[tokio::test]
async fn test_spec_is_reduced_to_fit_max_cost() {
    let (table, introspector) = flat_table(1000, 0.5);
    let planner = SamplingPlanner::new(introspector, SqlDialect::DuckDb);

    let budget = SamplingBudget {
        sample_size: 1000,
        max_cost: Some(125.0),
        ..Default::default()
    };
    let specs = planner
        .plan(&table, &Default::default(), &budget)
        .await
        .unwrap();

    assert_eq!(specs[0].sample_size, 250);
    assert_eq!(specs[0].reductions, 2);
    assert_eq!(specs[0].estimated_cost, 125.0);
    assert!(specs.iter().all(|s| s.estimated_cost <= 125.0));
}

#[tokio::test]
async fn test_budget_that_cannot_be_met_fails() {
    let (table, introspector) = flat_table(1000, 0.5);
    let planner = SamplingPlanner::new(introspector, SqlDialect::DuckDb);

    let budget = SamplingBudget {
        sample_size: 1000,
        max_cost: Some(1.0),
        max_reduction_attempts: 4,
        ..Default::default()
    };
    let err = planner
        .plan(&table, &Default::default(), &budget)
        .await
        .unwrap_err();

    match err {
        PipelineError::CostBudgetExceeded {
            table,
            attempts,
            estimated_cost,
            ..
        } => {
            assert_eq!(table, "shop.orders");
            assert_eq!(attempts, 4);
            assert_eq!(estimated_cost, 31.0);
        }
        other => panic!("expected CostBudgetExceeded, got {other:?}"),
    }
}

fn orders_by_status(statuses: &[Option<&str>]) -> (TableHandle, InMemoryIntrospector) {
    let table = TableHandle::new("", "shop", "orders");
    let rows = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| vec![json!(i), status.map_or(json!(null), |s| json!(s))])
        .collect();
    let data = MemoryTable::new(vec![
        ColumnDescriptor::new("order_id", "INT64"),
        ColumnDescriptor::new("status", "STRING"),
    ])
    .with_rows(rows);
    (table.clone(), InMemoryIntrospector::new().with_table(&table, data))
}

fn stratified_budget(sample_size: u64, max_distinct: usize) -> SamplingBudget {
    SamplingBudget {
        sample_size,
        stratify_column: Some("status".into()),
        stratify_max_distinct: max_distinct,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_stratified_plan_splits_sample_per_stratum() {
    let (table, introspector) =
        orders_by_status(&[Some("b"), None, Some("a"), Some("c"), Some("a"), None]);
    let planner = SamplingPlanner::new(Arc::new(introspector), SqlDialect::DuckDb);

    let specs = planner
        .plan(&table, &Default::default(), &stratified_budget(40, 10))
        .await
        .unwrap();

    assert_eq!(specs.len(), 4);
    assert!(specs.iter().all(|s| s.strategy == SampleStrategy::Stratified));
    assert!(specs.iter().all(|s| s.sample_size == 10));
    let strata: Vec<Option<&str>> = specs
        .iter()
        .map(|s| s.stratum.as_ref().unwrap().value.as_deref())
        .collect();
    assert_eq!(strata, vec![Some("a"), Some("b"), Some("c"), None]);

    assert_eq!(
        specs[0].query(0).sql,
        "SELECT * FROM \"shop\".\"orders\" WHERE CAST(\"status\" AS VARCHAR) = 'a' ORDER BY RANDOM() LIMIT 10"
    );
    assert!(specs[3].query(0).sql.contains("WHERE \"status\" IS NULL"));
}

#[tokio::test]
async fn test_too_many_strata_falls_back_to_random() {
    let (table, introspector) = orders_by_status(&[Some("a"), Some("b"), Some("c")]);
    let planner = SamplingPlanner::new(Arc::new(introspector), SqlDialect::DuckDb);

    let specs = planner
        .plan(&table, &Default::default(), &stratified_budget(30, 2))
        .await
        .unwrap();

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].strategy, SampleStrategy::Random);
    assert_eq!(specs[0].sample_size, 30);
    assert!(specs[0].stratum.is_none());
}

#[tokio::test]
async fn test_failed_distinct_probe_falls_back_to_random() {
    let (table, introspector) = orders_by_status(&[Some("a"), Some("b")]);
    let planner = SamplingPlanner::new(Arc::new(introspector.failing()), SqlDialect::DuckDb);

    let specs = planner
        .plan(&table, &Default::default(), &stratified_budget(30, 10))
        .await
        .unwrap();

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].strategy, SampleStrategy::Random);
    assert!(specs[0].stratum.is_none());
}
