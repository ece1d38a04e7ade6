//! Sampling planner.
//!
//! Chooses a strategy for one table, expands it into concrete specs and
//! dry-runs every spec against the budget before handing it out.
//!
//! Strategy priority:
//!
//! ```text
//!   partitioned + temporal column ──► time_based      (one spec per recent partition)
//!   partitioned                   ──► partition_aware (one spec per recent partition)
//!   stratify_column, few values   ──► stratified      (one spec per stratum)
//!   otherwise                     ──► random          (one spec)
//! ```
//!
//! `clustered` is never chosen automatically; it is honored only as an
//! override on tables that declare clustering columns.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::query::{PartitionFilter, SampleQuery, SqlDialect, Stratum};
use super::strategy::{SampleSpec, SampleStrategy, SamplingBudget};
use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{Introspector, PartitionInfo, PartitionType, TableHandle};

/// Plans cost-bounded sample specs for tables.
pub struct SamplingPlanner {
    introspector: Arc<dyn Introspector>,
    dialect: SqlDialect,
}

impl SamplingPlanner {
    pub fn new(introspector: Arc<dyn Introspector>, dialect: SqlDialect) -> Self {
        Self {
            introspector,
            dialect,
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Plan the specs for one table.
    ///
    /// Specs are returned most recent partition first. Every returned spec
    /// has been dry-run and fits `budget`; a spec that cannot be reduced to
    /// fit fails the whole plan with `CostBudgetExceeded`.
    #[tracing::instrument(skip(self, partition_info, budget), fields(table = %table))]
    pub async fn plan(
        &self,
        table: &TableHandle,
        partition_info: &PartitionInfo,
        budget: &SamplingBudget,
    ) -> PipelineResult<Vec<SampleSpec>> {
        let candidates = self.candidate_specs(table, partition_info, budget).await;

        let mut specs = Vec::with_capacity(candidates.len());
        for spec in candidates {
            specs.push(self.fit_budget(spec, budget).await?);
        }

        info!(
            specs = specs.len(),
            strategy = %specs.first().map(|s| s.strategy).unwrap_or(SampleStrategy::Random),
            "Sampling plan ready"
        );
        Ok(specs)
    }

    async fn candidate_specs(
        &self,
        table: &TableHandle,
        partition_info: &PartitionInfo,
        budget: &SamplingBudget,
    ) -> Vec<SampleSpec> {
        let partitioned =
            partition_info.is_partitioned && !partition_info.available_partitions.is_empty();

        match budget.strategy_override {
            Some(SampleStrategy::Clustered) if !partition_info.clustering_columns.is_empty() => {
                let clustering = partition_info.clustering_columns.clone();
                return if partitioned {
                    self.partition_specs(SampleStrategy::Clustered, table, partition_info, budget)
                        .into_iter()
                        .map(|s| s.clustered_by(clustering.clone()))
                        .collect()
                } else {
                    vec![self.spec(SampleStrategy::Clustered, table, budget).clustered_by(clustering)]
                };
            }
            Some(strategy) => {
                warn!(%strategy, "Strategy override ignored for this table");
            }
            None => {}
        }

        if partitioned {
            let strategy = if is_temporal(partition_info) {
                SampleStrategy::TimeBased
            } else {
                SampleStrategy::PartitionAware
            };
            return self.partition_specs(strategy, table, partition_info, budget);
        }

        if let Some(column) = &budget.stratify_column {
            if let Some(strata) = self.probe_strata(table, column, budget).await {
                let per_stratum = SamplingBudget {
                    sample_size: (budget.sample_size / strata.len() as u64).max(1),
                    ..budget.clone()
                };
                return strata
                    .into_iter()
                    .map(|stratum| {
                        self.spec(SampleStrategy::Stratified, table, &per_stratum)
                            .for_stratum(stratum)
                    })
                    .collect();
            }
        }

        vec![self.spec(SampleStrategy::Random, table, budget)]
    }

    fn spec(
        &self,
        strategy: SampleStrategy,
        table: &TableHandle,
        budget: &SamplingBudget,
    ) -> SampleSpec {
        SampleSpec::new(strategy, table, self.dialect, budget)
    }

    /// One spec per target partition, most recent first.
    fn partition_specs(
        &self,
        strategy: SampleStrategy,
        table: &TableHandle,
        partition_info: &PartitionInfo,
        budget: &SamplingBudget,
    ) -> Vec<SampleSpec> {
        let targets = partition_info.most_recent(budget.max_partitions.max(1));
        debug!(
            available = partition_info.available_partitions.len(),
            targets = ?targets,
            "Restricting scan to recent partitions"
        );

        targets
            .into_iter()
            .map(|id| {
                let upper_bound = match partition_info.partition_type {
                    PartitionType::IntegerRange => {
                        partition_info.next_after(&id).map(str::to_string)
                    }
                    _ => None,
                };
                let column = match partition_info.partition_type {
                    PartitionType::IngestionTime => None,
                    _ => partition_info.partition_column.clone(),
                };
                self.spec(strategy, table, budget).for_partition(PartitionFilter {
                    partition_type: partition_info.partition_type,
                    column,
                    partition_id: id,
                    upper_bound,
                })
            })
            .collect()
    }

    /// Distinct values of the stratification column, if there are few enough.
    async fn probe_strata(
        &self,
        table: &TableHandle,
        column: &str,
        budget: &SamplingBudget,
    ) -> Option<Vec<Stratum>> {
        let limit = budget.stratify_max_distinct as u64 + 1;
        let probe = SampleQuery::distinct_probe(self.dialect, table, column, limit);

        let rows = match self.introspector.execute_sample(&probe).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(column, error = %e, "Distinct probe failed, falling back to random sampling");
                return None;
            }
        };

        if rows.is_empty() || rows.len() > budget.stratify_max_distinct {
            debug!(
                column,
                distinct = rows.len(),
                "Column not suitable for stratification"
            );
            return None;
        }

        let mut values: Vec<Option<String>> = rows
            .rows
            .iter()
            .map(|row| match row.first() {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            })
            .collect();
        values.sort_by(|a, b| match (a, b) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(a), Some(b)) => a.cmp(b),
        });
        values.dedup();

        Some(
            values
                .into_iter()
                .map(|value| Stratum {
                    column: column.to_string(),
                    value,
                })
                .collect(),
        )
    }

    /// Dry-run a spec and halve it until it fits.
    ///
    /// `sample_size` is halved down to `min_sample_size` first, then
    /// `num_samples` down to 1.
    async fn fit_budget(
        &self,
        mut spec: SampleSpec,
        budget: &SamplingBudget,
    ) -> PipelineResult<SampleSpec> {
        let min_sample_size = budget.min_sample_size.max(1);
        loop {
            let estimate = self
                .introspector
                .dry_run_cost(&spec.query(0))
                .await
                .map_err(|source| PipelineError::Introspection {
                    table: spec.table.qualified_name(),
                    source,
                })?
                .scaled(spec.num_samples as f64);

            spec.estimated_cost = estimate.estimated_cost;
            spec.estimated_seconds = estimate.estimated_seconds;

            if budget.allows(estimate.estimated_cost, estimate.estimated_seconds) {
                return Ok(spec);
            }

            let reducible = spec.sample_size > min_sample_size || spec.num_samples > 1;
            if spec.reductions >= budget.max_reduction_attempts || !reducible {
                warn!(
                    spec = %spec.label(),
                    estimated_cost = estimate.estimated_cost,
                    estimated_seconds = estimate.estimated_seconds,
                    attempts = spec.reductions,
                    "Sample spec exceeds budget"
                );
                return Err(PipelineError::CostBudgetExceeded {
                    table: spec.table.qualified_name(),
                    estimated_cost: estimate.estimated_cost,
                    estimated_seconds: estimate.estimated_seconds,
                    max_cost: budget.max_cost,
                    timeout_seconds: budget.timeout_seconds,
                    attempts: spec.reductions,
                });
            }

            if spec.sample_size > min_sample_size {
                spec.sample_size = (spec.sample_size / 2).max(min_sample_size);
            } else {
                spec.num_samples = (spec.num_samples / 2).max(1);
            }
            spec.reductions += 1;
            debug!(
                spec = %spec.label(),
                sample_size = spec.sample_size,
                num_samples = spec.num_samples,
                reductions = spec.reductions,
                "Reduced sample spec to fit budget"
            );
        }
    }
}

/// Whether partitions map onto time: time partitions on a known column or
/// ingestion-time partitions.
fn is_temporal(info: &PartitionInfo) -> bool {
    match info.partition_type {
        PartitionType::IngestionTime => true,
        PartitionType::Time => info.partition_column.is_some(),
        _ => false,
    }
}
