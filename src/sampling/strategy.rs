//! Sampling strategies, budgets and concrete sample specs.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::query::{PartitionFilter, SampleOrder, SampleQuery, SqlDialect, Stratum};
use crate::metadata::{PartitionType, TableHandle};

/// How rows are selected from a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStrategy {
    Random,
    Stratified,
    PartitionAware,
    TimeBased,
    Clustered,
}

impl SampleStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random" => Some(Self::Random),
            "stratified" => Some(Self::Stratified),
            "partition_aware" | "partition" => Some(Self::PartitionAware),
            "time_based" | "time" => Some(Self::TimeBased),
            "clustered" => Some(Self::Clustered),
            _ => None,
        }
    }

    /// Strategies that produce one spec per target partition.
    pub fn is_partition_oriented(&self) -> bool {
        matches!(self, Self::PartitionAware | Self::TimeBased)
    }
}

impl fmt::Display for SampleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Stratified => write!(f, "stratified"),
            Self::PartitionAware => write!(f, "partition_aware"),
            Self::TimeBased => write!(f, "time_based"),
            Self::Clustered => write!(f, "clustered"),
        }
    }
}

/// Caller-supplied limits on what sampling may read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingBudget {
    /// Rows per sample query.
    pub sample_size: u64,
    /// Queries per spec.
    pub num_samples: u32,
    /// Most recent partitions considered on partitioned tables.
    pub max_partitions: usize,
    /// Maximum estimated cost per spec (`None` = unlimited).
    pub max_cost: Option<f64>,
    /// Maximum estimated seconds per spec.
    pub timeout_seconds: u64,
    /// Halving steps allowed before giving up.
    pub max_reduction_attempts: u32,
    /// Floor for `sample_size` reductions.
    pub min_sample_size: u64,
    /// Column whose distribution should be stratified, if requested.
    pub stratify_column: Option<String>,
    /// Stratification is used only at or below this many distinct values.
    pub stratify_max_distinct: usize,
    /// Force a strategy (only `clustered` is honored, and only on clustered tables).
    pub strategy_override: Option<SampleStrategy>,
}

impl Default for SamplingBudget {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            num_samples: 1,
            max_partitions: 3,
            max_cost: None,
            timeout_seconds: 300,
            max_reduction_attempts: 4,
            min_sample_size: 10,
            stratify_column: None,
            stratify_max_distinct: 10,
            strategy_override: None,
        }
    }
}

impl SamplingBudget {
    /// Whether an estimate for a whole spec fits.
    pub fn allows(&self, estimated_cost: f64, estimated_seconds: f64) -> bool {
        let cost_ok = self.max_cost.map_or(true, |max| estimated_cost <= max);
        cost_ok && estimated_seconds <= self.timeout_seconds as f64
    }
}

/// A concrete, cost-checked plan for fetching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
    pub strategy: SampleStrategy,
    pub table: TableHandle,
    #[serde(skip)]
    pub dialect: SqlDialect,
    pub sample_size: u64,
    pub num_samples: u32,
    /// Partitions this spec reads, most recent first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_partitions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_filter: Option<PartitionFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stratum: Option<Stratum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clustering_columns: Vec<String>,
    pub estimated_cost: f64,
    pub estimated_seconds: f64,
    pub timeout_seconds: u64,
    /// Halving steps applied to fit the budget.
    pub reductions: u32,
}

impl SampleSpec {
    /// An unestimated spec over a whole table.
    pub fn new(
        strategy: SampleStrategy,
        table: &TableHandle,
        dialect: SqlDialect,
        budget: &SamplingBudget,
    ) -> Self {
        Self {
            strategy,
            table: TableHandle {
                partition_info: None,
                ..table.clone()
            },
            dialect,
            sample_size: budget.sample_size.max(1),
            num_samples: budget.num_samples.max(1),
            target_partitions: Vec::new(),
            partition_column: None,
            partition_filter: None,
            stratum: None,
            clustering_columns: Vec::new(),
            estimated_cost: 0.0,
            estimated_seconds: 0.0,
            timeout_seconds: budget.timeout_seconds,
            reductions: 0,
        }
    }

    /// Restrict the spec to one partition.
    pub fn for_partition(mut self, filter: PartitionFilter) -> Self {
        self.target_partitions = vec![filter.partition_id.clone()];
        self.partition_column = filter.column.clone();
        self.partition_filter = Some(filter);
        self
    }

    pub fn for_stratum(mut self, stratum: Stratum) -> Self {
        self.stratum = Some(stratum);
        self
    }

    pub fn clustered_by(mut self, columns: Vec<String>) -> Self {
        self.clustering_columns = columns;
        self
    }

    /// Partition type of the filter, if any.
    pub fn partition_type(&self) -> PartitionType {
        self.partition_filter
            .as_ref()
            .map(|f| f.partition_type)
            .unwrap_or_default()
    }

    fn order(&self) -> SampleOrder {
        match self.strategy {
            SampleStrategy::Clustered => SampleOrder::Clustered(self.clustering_columns.clone()),
            _ => SampleOrder::Random,
        }
    }

    /// The query for one sample index.
    pub fn query(&self, sample_index: u32) -> SampleQuery {
        SampleQuery::rows(
            self.dialect,
            &self.table,
            self.partition_filter.clone(),
            self.stratum.clone(),
            self.order(),
            self.sample_size,
            sample_index,
        )
    }

    /// All `num_samples` queries.
    pub fn queries(&self) -> Vec<SampleQuery> {
        (0..self.num_samples).map(|i| self.query(i)).collect()
    }

    /// The same spec with `sample_size` halved (never below 1).
    pub fn halved(&self) -> Self {
        Self {
            sample_size: (self.sample_size / 2).max(1),
            estimated_cost: self.estimated_cost / 2.0,
            estimated_seconds: self.estimated_seconds / 2.0,
            ..self.clone()
        }
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> String {
        let mut label = self.strategy.to_string();
        if let Some(partition) = self.target_partitions.first() {
            label.push_str(&format!(" partition={}", partition));
        }
        if let Some(stratum) = &self.stratum {
            label.push_str(&format!(
                " {}={}",
                stratum.column,
                stratum.value.as_deref().unwrap_or("NULL")
            ));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!(
            SampleStrategy::from_str("partition-aware"),
            Some(SampleStrategy::PartitionAware)
        );
        assert_eq!(SampleStrategy::TimeBased.to_string(), "time_based");
        assert!(SampleStrategy::from_str("bogus").is_none());
    }

    #[test]
    fn test_budget_allows() {
        let budget = SamplingBudget {
            max_cost: Some(10.0),
            timeout_seconds: 5,
            ..Default::default()
        };
        assert!(budget.allows(10.0, 5.0));
        assert!(!budget.allows(10.5, 1.0));
        assert!(!budget.allows(1.0, 6.0));
        assert!(SamplingBudget::default().allows(1e12, 0.0));
    }

    #[test]
    fn test_spec_queries_and_halving() {
        let table = TableHandle::new("", "shop", "orders");
        let budget = SamplingBudget {
            sample_size: 101,
            num_samples: 3,
            ..Default::default()
        };
        let spec = SampleSpec::new(SampleStrategy::Random, &table, SqlDialect::DuckDb, &budget);
        let queries = spec.queries();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[2].sample_index, 2);
        assert_eq!(spec.halved().sample_size, 50);
    }

    #[test]
    fn test_clustered_spec_uses_offsets() {
        let table = TableHandle::new("", "shop", "orders");
        let spec = SampleSpec::new(
            SampleStrategy::Clustered,
            &table,
            SqlDialect::Ansi,
            &SamplingBudget {
                sample_size: 10,
                num_samples: 2,
                ..Default::default()
            },
        )
        .clustered_by(vec!["region".into()]);
        let q = spec.query(1);
        assert_eq!(q.offset, 10);
        assert!(q.sql.contains("ORDER BY \"region\""));
    }
}
