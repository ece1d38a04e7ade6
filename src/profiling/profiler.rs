//! Statistical profiler.
//!
//! Executes sample specs through the introspector and turns the combined
//! rows into per-column profiles.
//!
//! ```text
//!   specs ──► fetch (bounded, retry once at half size) ──► combined RowSet
//!                         │                                     │
//!                         ▼                                     ▼
//!                  SampleReport per spec               ColumnProfile per column
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::classify::{CategoricalRule, TypeFamily};
use super::quality::{assess, QualityInput};
use super::stats::{categorical_distribution, cell_number, cell_text, numeric_stats, value_counts};
use super::types::ColumnProfile;
use crate::error::{PipelineError, PipelineResult};
use crate::metadata::{ColumnDescriptor, Introspector, RowSet, TableHandle};
use crate::sampling::{SampleSpec, SampleStrategy};
use crate::worker::{WorkerError, WorkerResult};

/// Profiler tuning.
#[derive(Debug, Clone)]
pub struct ProfilingConfig {
    /// Specs fetched concurrently for one table.
    pub max_concurrent_samples: usize,
    pub categorical: CategoricalRule,
    /// Categorical values retained per column.
    pub max_categorical_values: usize,
    /// Example values kept for non-categorical columns.
    pub sample_values: usize,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_samples: 4,
            categorical: CategoricalRule::default(),
            max_categorical_values: 25,
            sample_values: 5,
        }
    }
}

/// Outcome of fetching one spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Fetched,
    /// Fetched on the retry at half size.
    Reduced,
    Unavailable,
}

/// What happened to one spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub spec: String,
    pub strategy: SampleStrategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<String>,
    pub status: SampleStatus,
    pub attempts: u32,
    /// Sample size of the last attempt.
    pub sample_size: u64,
    pub rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Column profiles plus fetch bookkeeping for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileOutcome {
    pub columns: BTreeMap<String, ColumnProfile>,
    /// Column names in declaration order.
    pub column_order: Vec<String>,
    pub reports: Vec<SampleReport>,
    /// Rows in the combined sample.
    pub sample_rows: u64,
    /// Index of the first successfully fetched spec.
    pub primary_spec: Option<usize>,
}

impl ProfileOutcome {
    /// Schema-only outcome used in degraded mode.
    pub fn schema_only(columns: &[ColumnDescriptor], reports: Vec<SampleReport>) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| (c.name.clone(), ColumnProfile::schema_only(c)))
                .collect(),
            column_order: columns.iter().map(|c| c.name.clone()).collect(),
            reports,
            sample_rows: 0,
            primary_spec: None,
        }
    }

    /// Profiles in declaration order.
    pub fn ordered(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.column_order.iter().filter_map(|n| self.columns.get(n))
    }

    /// Partitions whose specs could not be fetched.
    pub fn unavailable_partitions(&self) -> Vec<String> {
        self.reports
            .iter()
            .filter(|r| r.status == SampleStatus::Unavailable)
            .flat_map(|r| r.partitions.iter().cloned())
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.sample_rows == 0
    }
}

/// Computes column profiles from sample specs.
pub struct StatisticalProfiler {
    introspector: Arc<dyn Introspector>,
    config: ProfilingConfig,
    permits: Arc<Semaphore>,
}

impl StatisticalProfiler {
    /// Create a profiler with its own fetch bound.
    pub fn new(introspector: Arc<dyn Introspector>, config: ProfilingConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_samples.max(1)));
        Self {
            introspector,
            config,
            permits,
        }
    }

    /// Share a process-wide bound with other profilers and LLM calls.
    pub fn with_shared_limit(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = permits;
        self
    }

    pub fn config(&self) -> &ProfilingConfig {
        &self.config
    }

    /// Profile a table from its specs.
    ///
    /// `columns` supplies declared types and nullability. Statistics are
    /// computed over every successfully fetched spec combined; specs that
    /// fail twice are reported as unavailable. Fails with
    /// `ProfilingUnavailable` when no spec yields rows.
    #[tracing::instrument(skip_all, fields(table = %table, specs = specs.len()))]
    pub async fn profile(
        &self,
        table: &TableHandle,
        columns: &[ColumnDescriptor],
        specs: &[SampleSpec],
    ) -> PipelineResult<ProfileOutcome> {
        if specs.is_empty() {
            return Err(PipelineError::ProfilingUnavailable {
                table: table.qualified_name(),
                reason: "no sample specs were planned".to_string(),
            });
        }

        let fetched: Vec<(SampleReport, Option<RowSet>)> = stream::iter(specs.iter())
            .map(|spec| self.fetch_spec(spec))
            .buffered(self.config.max_concurrent_samples.max(1))
            .collect()
            .await;

        let mut combined = RowSet::default();
        let mut reports = Vec::with_capacity(fetched.len());
        let mut primary_spec = None;
        for (idx, (report, rows)) in fetched.into_iter().enumerate() {
            if let Some(rows) = rows {
                primary_spec.get_or_insert(idx);
                combined.extend_from(rows);
            }
            reports.push(report);
        }

        if primary_spec.is_none() {
            let last_error = reports
                .iter()
                .rev()
                .find_map(|r| r.error.clone())
                .unwrap_or_default();
            return Err(PipelineError::ProfilingUnavailable {
                table: table.qualified_name(),
                reason: format!("all {} sample specs failed: {}", specs.len(), last_error),
            });
        }

        let profiles = columns
            .iter()
            .map(|c| (c.name.clone(), self.profile_column(c, &combined)))
            .collect();

        let outcome = ProfileOutcome {
            columns: profiles,
            column_order: columns.iter().map(|c| c.name.clone()).collect(),
            reports,
            sample_rows: combined.len() as u64,
            primary_spec,
        };

        info!(
            rows = outcome.sample_rows,
            columns = outcome.columns.len(),
            unavailable = outcome.unavailable_partitions().len(),
            "Profiling complete"
        );
        Ok(outcome)
    }

    /// Fetch one spec, retrying once at half size.
    async fn fetch_spec(&self, spec: &SampleSpec) -> (SampleReport, Option<RowSet>) {
        let mut report = SampleReport {
            spec: spec.label(),
            strategy: spec.strategy,
            partitions: spec.target_partitions.clone(),
            status: SampleStatus::Fetched,
            attempts: 1,
            sample_size: spec.sample_size,
            rows: 0,
            error: None,
        };

        let first_error = match self.run_spec(spec).await {
            Ok(rows) => {
                report.rows = rows.len() as u64;
                debug!(spec = %report.spec, rows = report.rows, "Sample fetched");
                return (report, Some(rows));
            }
            Err(e) => e,
        };

        let reduced = spec.halved();
        warn!(
            spec = %report.spec,
            error = %first_error,
            sample_size = reduced.sample_size,
            "Sample failed, retrying at half size"
        );
        report.attempts = 2;
        report.sample_size = reduced.sample_size;

        match self.run_spec(&reduced).await {
            Ok(rows) => {
                report.status = SampleStatus::Reduced;
                report.rows = rows.len() as u64;
                (report, Some(rows))
            }
            Err(e) => {
                warn!(spec = %report.spec, error = %e, "Sample unavailable");
                report.status = SampleStatus::Unavailable;
                report.error = Some(e.to_string());
                (report, None)
            }
        }
    }

    /// Run every query of a spec; any failure fails the spec.
    async fn run_spec(&self, spec: &SampleSpec) -> WorkerResult<RowSet> {
        let mut rows = RowSet::default();
        for query in spec.queries() {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| WorkerError::ChannelClosed)?;
            rows.extend_from(self.introspector.execute_sample(&query).await?);
        }
        Ok(rows)
    }

    fn profile_column(&self, column: &ColumnDescriptor, rows: &RowSet) -> ColumnProfile {
        let sample_rows = rows.len() as u64;
        let cells = rows.column_values(&column.name).unwrap_or_default();
        let texts: Vec<String> = cells.iter().filter_map(|v| cell_text(v)).collect();
        let non_null = texts.len() as u64;
        let distinct_count = value_counts(&texts).len() as u64;

        let family = TypeFamily::from_declared(&column.data_type);
        let is_numerical = family.is_numeric();
        let is_categorical =
            self.config
                .categorical
                .is_categorical(&column.name, family, distinct_count, non_null);

        let statistics = if is_numerical {
            let numbers: Vec<f64> = cells.iter().filter_map(|v| cell_number(v)).collect();
            numeric_stats(&numbers)
        } else {
            None
        };

        let (categorical_values, other_values) = if is_categorical {
            categorical_distribution(&texts, self.config.max_categorical_values)
        } else {
            (Vec::new(), None)
        };

        let sample_values = if is_categorical {
            Vec::new()
        } else {
            let mut seen = HashSet::new();
            texts
                .iter()
                .filter(|v| seen.insert(v.as_str()))
                .take(self.config.sample_values)
                .cloned()
                .collect()
        };

        let quality = assess(&QualityInput {
            name: &column.name,
            family,
            declared_nullable: column.is_nullable,
            sample_rows,
            values: &texts,
            distinct_count,
            other_values: other_values.as_ref(),
        });

        ColumnProfile {
            name: column.name.clone(),
            declared_type: column.data_type.clone(),
            is_nullable: column.is_nullable,
            is_numerical,
            is_categorical,
            is_temporal: family.is_temporal(),
            sample_rows,
            null_count: sample_rows - non_null,
            distinct_count,
            statistics,
            categorical_values,
            other_values,
            sample_values,
            quality,
        }
    }
}
