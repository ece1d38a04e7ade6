//! In-memory Introspector for fixture data and offline runs.
//!
//! Queries are interpreted from their structured parts, never from SQL.
//! Cost estimates are proportional to the rows a query would return, which
//! makes the planner's reduction loop observable without an engine.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::provider::{Introspector, MetadataResult};
use super::{ColumnDescriptor, CostEstimate, PartitionInfo, PartitionType, RowSet, TableHandle};
use crate::sampling::{Projection, SampleOrder, SampleQuery};
use crate::worker::WorkerError;

/// One table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<ColumnDescriptor>,
    pub partition_info: PartitionInfo,
    /// Rows per partition id; unpartitioned tables use the empty id.
    pub partitions: BTreeMap<String, Vec<Vec<Value>>>,
}

impl MemoryTable {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    /// Unpartitioned rows.
    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.partitions.insert(String::new(), rows);
        self
    }

    /// Partitioned rows; partitions are listed oldest first.
    pub fn with_partitions(
        mut self,
        partition_type: PartitionType,
        partition_column: Option<&str>,
        partitions: Vec<(String, Vec<Vec<Value>>)>,
    ) -> Self {
        self.partition_info = PartitionInfo {
            is_partitioned: true,
            partition_type,
            partition_column: partition_column.map(str::to_string),
            clustering_columns: self.partition_info.clustering_columns.clone(),
            available_partitions: partitions.iter().map(|(id, _)| id.clone()).collect(),
        };
        self.partitions = partitions.into_iter().collect();
        self
    }

    pub fn with_clustering(mut self, columns: &[&str]) -> Self {
        self.partition_info.clustering_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn all_rows(&self) -> Vec<&Vec<Value>> {
        self.partitions.values().flatten().collect()
    }
}

/// Introspector backed by in-memory tables.
#[derive(Debug, Default)]
pub struct InMemoryIntrospector {
    tables: HashMap<String, MemoryTable>,
    cost_per_row: f64,
    seconds_per_row: f64,
    failing_partitions: HashSet<String>,
    max_servable_rows: Option<u64>,
    fail_all: bool,
    executed: Mutex<Vec<SampleQuery>>,
}

impl InMemoryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: &TableHandle, data: MemoryTable) -> Self {
        self.tables.insert(table.qualified_name(), data);
        self
    }

    /// Cost units charged per row a query would return.
    pub fn with_cost_per_row(mut self, cost: f64) -> Self {
        self.cost_per_row = cost;
        self
    }

    /// Seconds charged per row a query would return.
    pub fn with_seconds_per_row(mut self, seconds: f64) -> Self {
        self.seconds_per_row = seconds;
        self
    }

    /// Make every sample query against a partition fail.
    pub fn with_failing_partition(mut self, partition_id: &str) -> Self {
        self.failing_partitions.insert(partition_id.to_string());
        self
    }

    /// Reject sample queries whose limit exceeds `rows`.
    pub fn with_max_servable_rows(mut self, rows: u64) -> Self {
        self.max_servable_rows = Some(rows);
        self
    }

    /// Reject every sample query.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Row-returning queries executed so far, in execution order.
    pub fn executed_queries(&self) -> Vec<SampleQuery> {
        self.executed
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    fn table(&self, table: &TableHandle) -> MetadataResult<&MemoryTable> {
        self.tables
            .get(&table.qualified_name())
            .ok_or_else(|| WorkerError::TableNotFound(table.qualified_name()))
    }

    fn candidate_rows<'a>(&self, data: &'a MemoryTable, query: &SampleQuery) -> Vec<&'a Vec<Value>> {
        let rows: Vec<&Vec<Value>> = match &query.partition {
            Some(filter) => data
                .partitions
                .get(&filter.partition_id)
                .map(|rows| rows.iter().collect())
                .unwrap_or_default(),
            None => data.all_rows(),
        };

        let Some(stratum) = &query.stratum else {
            return rows;
        };
        let Some(idx) = data.columns.iter().position(|c| c.name == stratum.column) else {
            return Vec::new();
        };
        rows.into_iter()
            .filter(|row| {
                let cell = row.get(idx).unwrap_or(&Value::Null);
                match (&stratum.value, cell) {
                    (None, Value::Null) => true,
                    (None, _) | (Some(_), Value::Null) => false,
                    (Some(expected), Value::String(s)) => s == expected,
                    (Some(expected), other) => other.to_string() == *expected,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Introspector for InMemoryIntrospector {
    async fn list_columns(&self, table: &TableHandle) -> MetadataResult<Vec<ColumnDescriptor>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn get_partition_info(&self, table: &TableHandle) -> MetadataResult<PartitionInfo> {
        Ok(self.table(table)?.partition_info.clone())
    }

    async fn dry_run_cost(&self, query: &SampleQuery) -> MetadataResult<CostEstimate> {
        let data = self.table(&query.table)?;
        let available = self.candidate_rows(data, query).len() as u64;
        let rows = available.min(query.limit);
        Ok(CostEstimate {
            estimated_rows: rows,
            estimated_bytes: rows * 64 * data.columns.len() as u64,
            estimated_cost: rows as f64 * self.cost_per_row,
            estimated_seconds: rows as f64 * self.seconds_per_row,
        })
    }

    async fn execute_sample(&self, query: &SampleQuery) -> MetadataResult<RowSet> {
        let data = self.table(&query.table)?;

        if self.fail_all {
            return Err(WorkerError::QueryFailed("sampling disabled".into()));
        }
        if let Some(filter) = &query.partition {
            if self.failing_partitions.contains(&filter.partition_id) {
                return Err(WorkerError::QueryFailed(format!(
                    "partition {} unavailable",
                    filter.partition_id
                )));
            }
        }
        if let Some(max) = self.max_servable_rows {
            if query.limit > max {
                return Err(WorkerError::Timeout(0));
            }
        }

        let rows = self.candidate_rows(data, query);

        if let Projection::Distinct(column) = &query.projection {
            let idx = data
                .columns
                .iter()
                .position(|c| &c.name == column)
                .ok_or_else(|| WorkerError::QueryFailed(format!("unknown column {}", column)))?;
            let mut seen = Vec::new();
            for row in rows {
                let cell = row.get(idx).cloned().unwrap_or(Value::Null);
                if !seen.contains(&cell) {
                    seen.push(cell);
                }
                if seen.len() as u64 >= query.limit {
                    break;
                }
            }
            return Ok(RowSet::new(
                vec![column.clone()],
                seen.into_iter().map(|v| vec![v]).collect(),
            ));
        }

        let start = match query.order {
            SampleOrder::Clustered(_) => query.offset,
            SampleOrder::Random => query.limit * query.sample_index as u64,
        } as usize;

        let sampled: Vec<Vec<Value>> = rows
            .into_iter()
            .skip(start)
            .take(query.limit as usize)
            .cloned()
            .collect();

        if let Ok(mut executed) = self.executed.lock() {
            executed.push(query.clone());
        }

        Ok(RowSet::new(data.column_names(), sampled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{PartitionFilter, SqlDialect, Stratum};
    use serde_json::json;

    fn fixture() -> (TableHandle, InMemoryIntrospector) {
        let table = TableHandle::new("", "shop", "orders");
        let data = MemoryTable::new(vec![
            ColumnDescriptor::new("id", "INT64"),
            ColumnDescriptor::new("status", "STRING"),
        ])
        .with_rows(vec![
            vec![json!(1), json!("open")],
            vec![json!(2), json!("closed")],
            vec![json!(3), json!("open")],
        ]);
        let introspector = InMemoryIntrospector::new()
            .with_table(&table, data)
            .with_cost_per_row(0.5);
        (table, introspector)
    }

    #[tokio::test]
    async fn test_execute_with_stratum() {
        let (table, introspector) = fixture();
        let q = SampleQuery::rows(
            SqlDialect::Ansi,
            &table,
            None,
            Some(Stratum {
                column: "status".into(),
                value: Some("open".into()),
            }),
            SampleOrder::Random,
            10,
            0,
        );
        let rows = introspector.execute_sample(&q).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(introspector.executed_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_scales_with_limit() {
        let (table, introspector) = fixture();
        let q = SampleQuery::rows(SqlDialect::Ansi, &table, None, None, SampleOrder::Random, 2, 0);
        let cost = introspector.dry_run_cost(&q).await.unwrap();
        assert_eq!(cost.estimated_rows, 2);
        assert_eq!(cost.estimated_cost, 1.0);
    }

    #[tokio::test]
    async fn test_distinct_probe() {
        let (table, introspector) = fixture();
        let q = SampleQuery::distinct_probe(SqlDialect::Ansi, &table, "status", 10);
        let rows = introspector.execute_sample(&q).await.unwrap();
        assert_eq!(rows.rows, vec![vec![json!("open")], vec![json!("closed")]]);
    }

    #[tokio::test]
    async fn test_failing_partition() {
        let table = TableHandle::new("", "web", "events");
        let data = MemoryTable::new(vec![ColumnDescriptor::new("n", "INT64")]).with_partitions(
            PartitionType::IntegerRange,
            Some("n"),
            vec![("0".into(), vec![vec![json!(1)]])],
        );
        let introspector = InMemoryIntrospector::new()
            .with_table(&table, data)
            .with_failing_partition("0");
        let q = SampleQuery::rows(
            SqlDialect::Ansi,
            &table,
            Some(PartitionFilter {
                partition_type: PartitionType::IntegerRange,
                column: Some("n".into()),
                partition_id: "0".into(),
                upper_bound: None,
            }),
            None,
            SampleOrder::Random,
            10,
            0,
        );
        assert!(introspector.execute_sample(&q).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let introspector = InMemoryIntrospector::new();
        let err = introspector
            .list_columns(&TableHandle::new("", "x", "y"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::TableNotFound(_)));
    }
}
