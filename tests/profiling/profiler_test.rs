use std::sync::Arc;

use serde_json::json;
use tablescribe::error::PipelineError;
use tablescribe::metadata::{
    ColumnDescriptor, InMemoryIntrospector, Introspector, MemoryTable, PartitionType, TableHandle,
};
use tablescribe::profiling::{ProfilingConfig, SampleStatus, StatisticalProfiler};
use tablescribe::sampling::{SamplingBudget, SamplingPlanner, SqlDialect};

const RECENT_AMOUNTS: [f64; 5] = [10.0, 20.0, 30.0, 40.0, 1000.0];

fn sales() -> (TableHandle, Vec<ColumnDescriptor>, MemoryTable) {
    let table = TableHandle::new("", "finance", "sales");
    let columns = vec![
        ColumnDescriptor::new("sale_id", "INT64"),
        ColumnDescriptor::new("amount", "NUMERIC"),
    ];
    let partitions = (1..=30)
        .map(|day| {
            let amount = if day > 25 {
                RECENT_AMOUNTS[(day - 26) as usize]
            } else {
                5000.0
            };
            (
                format!("2024-03-{:02}", day),
                vec![vec![json!(day), json!(amount)]],
            )
        })
        .collect();
    let data = MemoryTable::new(columns.clone()).with_partitions(
        PartitionType::Time,
        Some("sale_date"),
        partitions,
    );
    (table, columns, data)
}

async fn profile(
    introspector: InMemoryIntrospector,
    table: &TableHandle,
    columns: &[ColumnDescriptor],
) -> Result<tablescribe::profiling::ProfileOutcome, PipelineError> {
    let introspector = Arc::new(introspector);
    let info = introspector.get_partition_info(table).await.unwrap();
    let planner = SamplingPlanner::new(introspector.clone(), SqlDialect::BigQuery);
    let budget = SamplingBudget {
        max_partitions: 5,
        ..Default::default()
    };
    let specs = planner.plan(table, &info, &budget).await?;
    StatisticalProfiler::new(introspector, ProfilingConfig::default())
        .profile(table, columns, &specs)
        .await
}

#[tokio::test]
async fn test_statistics_come_from_recent_partitions() {
    let (table, columns, data) = sales();
    let outcome = profile(
        InMemoryIntrospector::new().with_table(&table, data),
        &table,
        &columns,
    )
    .await
    .unwrap();

    assert_eq!(outcome.sample_rows, 5);
    let amount = &outcome.columns["amount"];
    let stats = amount.statistics.as_ref().unwrap();
    assert_eq!(stats.max, 1000.0);
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.mean, 220.0);
    assert_eq!(stats.median, 30.0);

    for value in [
        stats.mean,
        stats.median,
        stats.percentiles.p5,
        stats.percentiles.p25,
        stats.percentiles.p75,
        stats.percentiles.p95,
    ] {
        assert!(value >= stats.min && value <= stats.max);
    }
}

#[tokio::test]
async fn test_unavailable_partition_is_reported() {
    let (table, columns, data) = sales();
    let introspector = InMemoryIntrospector::new()
        .with_table(&table, data)
        .with_failing_partition("2024-03-30");
    let outcome = profile(introspector, &table, &columns).await.unwrap();

    assert_eq!(outcome.sample_rows, 4);
    assert_eq!(outcome.unavailable_partitions(), vec!["2024-03-30"]);
    let failed = outcome
        .reports
        .iter()
        .find(|r| r.status == SampleStatus::Unavailable)
        .unwrap();
    assert_eq!(failed.attempts, 2);
    assert_eq!(
        outcome.columns["amount"].statistics.as_ref().unwrap().max,
        40.0
    );
}

#[tokio::test]
async fn test_no_rows_is_profiling_unavailable() {
    let (table, columns, data) = sales();
    let introspector = InMemoryIntrospector::new().with_table(&table, data).failing();
    let err = profile(introspector, &table, &columns).await.unwrap_err();

    assert!(matches!(err, PipelineError::ProfilingUnavailable { .. }));
    assert_eq!(err.table(), Some("finance.sales"));
}
