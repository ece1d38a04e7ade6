//! Per-table metadata runs and batches.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Settings;
use crate::document::{InclusionConfig, MetadataAssembler, MetadataDocument, RunInfo};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{LlmConfig, LlmOrchestrator, LlmProvider};
use crate::metadata::{ColumnDescriptor, Introspector, TableHandle};
use crate::profiling::{ProfileOutcome, ProfilingConfig, StatisticalProfiler};
use crate::prompt::{ChunkPlanner, MetadataFragment, TokenCounter};
use crate::sampling::{SamplingBudget, SamplingPlanner, SqlDialect};

/// Pipeline-wide configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dialect: SqlDialect,
    pub budget: SamplingBudget,
    pub profiling: ProfilingConfig,
    pub llm: LlmConfig,
    /// Sample fetches and LLM calls in flight across every table.
    pub max_workers: usize,
    /// Tables processed concurrently by a batch.
    pub max_concurrent_tables: usize,
    /// Deadline for each table run.
    pub run_timeout: Option<Duration>,
    /// Fall back to schema-only documents when sampling is unavailable.
    pub allow_schema_only: bool,
    pub inclusion: InclusionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::default(),
            budget: SamplingBudget::default(),
            profiling: ProfilingConfig::default(),
            llm: LlmConfig::default(),
            max_workers: 8,
            max_concurrent_tables: 2,
            run_timeout: None,
            allow_schema_only: false,
            inclusion: InclusionConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings, dialect: SqlDialect) -> Self {
        Self {
            dialect,
            budget: settings.sampling.clone(),
            profiling: settings.profiling.to_config(),
            llm: settings.llm.to_config(),
            max_workers: settings.pipeline.max_workers,
            max_concurrent_tables: settings.pipeline.max_concurrent_tables,
            run_timeout: settings.pipeline.run_timeout_seconds.map(Duration::from_secs),
            allow_schema_only: settings.pipeline.allow_schema_only,
            inclusion: settings.inclusion.clone(),
        }
    }
}

/// Caller options for one metadata run. Unset fields use the pipeline
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRequest {
    pub sample_size: Option<u64>,
    pub num_samples: Option<u32>,
    pub max_partitions: Option<usize>,
    pub inclusion: Option<InclusionConfig>,
    pub custom_instructions: Option<String>,
    pub allow_schema_only: Option<bool>,
}

/// Runs introspection, sampling, profiling, chunking, LLM generation and
/// assembly for tables.
pub struct MetadataPipeline {
    introspector: Arc<dyn Introspector>,
    planner: SamplingPlanner,
    profiler: StatisticalProfiler,
    chunker: ChunkPlanner,
    orchestrator: LlmOrchestrator,
    config: PipelineConfig,
}

impl MetadataPipeline {
    /// Build a pipeline whose profilers and LLM calls share one bound of
    /// `config.max_workers` permits.
    pub fn new(
        introspector: Arc<dyn Introspector>,
        token_counter: Arc<dyn TokenCounter>,
        provider: Arc<dyn LlmProvider>,
        config: PipelineConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            planner: SamplingPlanner::new(introspector.clone(), config.dialect),
            profiler: StatisticalProfiler::new(introspector.clone(), config.profiling.clone())
                .with_shared_limit(permits.clone()),
            chunker: ChunkPlanner::new(token_counter),
            orchestrator: LlmOrchestrator::new(provider, config.llm.clone())
                .with_shared_limit(permits),
            introspector,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Effective sampling budget for a request.
    pub fn budget_for(&self, request: &MetadataRequest) -> SamplingBudget {
        let base = &self.config.budget;
        SamplingBudget {
            sample_size: request.sample_size.unwrap_or(base.sample_size),
            num_samples: request.num_samples.unwrap_or(base.num_samples),
            max_partitions: request.max_partitions.unwrap_or(base.max_partitions),
            ..base.clone()
        }
    }

    /// Generate the metadata document for one table.
    ///
    /// Only introspection errors, and sampling failures outside schema-only
    /// mode, fail the call. Token counting errors, failed chunks and an
    /// expired run deadline are recorded in `processing_stats` instead.
    #[tracing::instrument(skip(self, request), fields(table = %table))]
    pub async fn generate_metadata(
        &self,
        table: &TableHandle,
        request: &MetadataRequest,
    ) -> PipelineResult<MetadataDocument> {
        let started = Instant::now();
        let deadline = self.config.run_timeout.map(|t| started + t);
        let inclusion = request
            .inclusion
            .clone()
            .unwrap_or_else(|| self.config.inclusion.clone());
        let allow_schema_only = request
            .allow_schema_only
            .unwrap_or(self.config.allow_schema_only);

        let (columns, partition_info) =
            self.introspector
                .introspect(table)
                .await
                .map_err(|source| PipelineError::Introspection {
                    table: table.qualified_name(),
                    source,
                })?;
        if columns.is_empty() {
            return Err(PipelineError::InvalidRequest(format!(
                "table {} has no columns",
                table
            )));
        }
        let table = table.clone().with_partition_info(partition_info);

        let mut run = RunInfo::default();
        let sampled = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.profile(&table, &columns, request))
                .await
                .ok(),
            None => Some(self.profile(&table, &columns, request).await),
        };

        let outcome = match sampled {
            Some(Ok(outcome)) => outcome,
            Some(Err(e)) if allow_schema_only && is_sampling_failure(&e) => {
                warn!(error = %e, "Sampling unavailable; continuing schema-only");
                run.degraded = true;
                run.errors.push(e.to_string());
                ProfileOutcome::schema_only(&columns, Vec::new())
            }
            Some(Err(e)) => return Err(e),
            None => {
                warn!("Run deadline reached during sampling");
                run.partial = true;
                run.degraded = true;
                run.errors.push("run deadline reached during sampling".to_string());
                run.generation_skipped = Some("run deadline reached during sampling".to_string());
                ProfileOutcome::schema_only(&columns, Vec::new())
            }
        };

        let responses = if run.generation_skipped.is_some() {
            Vec::new()
        } else {
            let fragment = MetadataFragment::from_outcome(
                &table,
                &outcome,
                inclusion.generated(),
                request.custom_instructions.clone(),
            );
            let threshold = self.orchestrator.config().token_threshold;
            let planned = match deadline {
                Some(deadline) => {
                    tokio::time::timeout_at(deadline, self.chunker.chunk(&fragment, threshold))
                        .await
                        .ok()
                }
                None => Some(self.chunker.chunk(&fragment, threshold).await),
            };

            match planned {
                Some(Ok(plan)) => {
                    run.truncations = plan.truncations;
                    self.orchestrator.execute_until(plan.requests, deadline).await
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Chunking failed; skipping generation");
                    run.errors.push(format!("chunking failed for {}: {}", table, e));
                    run.generation_skipped = Some(format!("chunking failed: {}", e));
                    Vec::new()
                }
                None => {
                    warn!("Run deadline reached during chunking");
                    run.partial = true;
                    run.errors.push("run deadline reached during chunking".to_string());
                    run.generation_skipped = Some("run deadline reached during chunking".to_string());
                    Vec::new()
                }
            }
        };

        run.duration = started.elapsed();
        let document = MetadataAssembler::assemble(&table, &outcome, &responses, &inclusion, run);

        info!(
            columns = document.columns.len(),
            failed_chunks = document.processing_stats.failed_chunks,
            partial = document.processing_stats.partial,
            degraded = document.processing_stats.degraded,
            "Metadata generated"
        );
        Ok(document)
    }

    async fn profile(
        &self,
        table: &TableHandle,
        columns: &[ColumnDescriptor],
        request: &MetadataRequest,
    ) -> PipelineResult<ProfileOutcome> {
        let budget = self.budget_for(request);
        let partition_info = table.partition_info.clone().unwrap_or_default();
        let specs = self.planner.plan(table, &partition_info, &budget).await?;
        self.profiler.profile(table, columns, &specs).await
    }

    /// Generate documents for several tables.
    ///
    /// Up to `max_concurrent_tables` tables run at once, all drawing on the
    /// same worker bound. Results are returned in input order; one table's
    /// failure does not affect the others.
    pub async fn generate_metadata_batch(
        &self,
        tables: &[TableHandle],
        request: &MetadataRequest,
    ) -> Vec<PipelineResult<MetadataDocument>> {
        info!(tables = tables.len(), "Starting batch");
        let results: Vec<PipelineResult<MetadataDocument>> = stream::iter(tables.iter())
            .map(|table| self.generate_metadata(table, request))
            .buffered(self.config.max_concurrent_tables.max(1))
            .collect()
            .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(tables = tables.len(), failed, "Batch finished");
        results
    }
}

fn is_sampling_failure(e: &PipelineError) -> bool {
    matches!(
        e,
        PipelineError::CostBudgetExceeded { .. } | PipelineError::ProfilingUnavailable { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::llm::{Completion, CompletionRequest, LlmResult, RetryPolicy};
    use crate::metadata::{InMemoryIntrospector, MemoryTable};
    use crate::prompt::HeuristicTokenCounter;

    struct Describer;

    #[async_trait]
    impl LlmProvider for Describer {
        async fn complete(&self, _request: &CompletionRequest) -> LlmResult<Completion> {
            Ok(Completion {
                text: json!({
                    "table_description": "Customer orders",
                    "columns": [{"name": "amount", "description": "Order total"}],
                    "business_rules": ["amount is never negative"]
                })
                .to_string(),
                usage: None,
            })
        }
    }

    fn orders() -> TableHandle {
        TableHandle::new("", "shop", "orders")
    }

    fn introspector() -> InMemoryIntrospector {
        let rows = (1..=20)
            .map(|i| vec![json!(i), json!(i as f64 * 2.5), json!(if i % 2 == 0 { "paid" } else { "open" })])
            .collect();
        InMemoryIntrospector::new().with_table(
            &orders(),
            MemoryTable::new(vec![
                ColumnDescriptor::new("order_id", "INT64"),
                ColumnDescriptor::new("amount", "FLOAT64"),
                ColumnDescriptor::new("status", "STRING"),
            ])
            .with_rows(rows),
        )
    }

    fn pipeline(introspector: InMemoryIntrospector, config: PipelineConfig) -> MetadataPipeline {
        MetadataPipeline::new(
            Arc::new(introspector),
            Arc::new(HeuristicTokenCounter::default()),
            Arc::new(Describer),
            config,
        )
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            llm: LlmConfig {
                retry: RetryPolicy::immediate(1),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_metadata() {
        let pipeline = pipeline(introspector(), config());
        let doc = pipeline
            .generate_metadata(&orders(), &MetadataRequest::default())
            .await
            .unwrap();

        assert_eq!(doc.table_description.as_deref(), Some("Customer orders"));
        assert_eq!(doc.column_order, vec!["order_id", "amount", "status"]);
        assert_eq!(doc.column("amount").unwrap().description.as_deref(), Some("Order total"));
        assert_eq!(doc.processing_stats.sample_rows, 20);
        assert!(!doc.processing_stats.partial);
        assert!(doc.table.partition_info.is_none());
    }

    #[tokio::test]
    async fn test_sampling_failure_without_schema_only() {
        let pipeline = pipeline(introspector().failing(), config());
        let err = pipeline
            .generate_metadata(&orders(), &MetadataRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProfilingUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_schema_only_fallback() {
        let pipeline = pipeline(introspector().failing(), config());
        let request = MetadataRequest {
            allow_schema_only: Some(true),
            ..Default::default()
        };
        let doc = pipeline.generate_metadata(&orders(), &request).await.unwrap();

        assert!(doc.processing_stats.degraded);
        assert_eq!(doc.processing_stats.sample_rows, 0);
        assert_eq!(doc.columns.len(), 3);
        assert!(doc.data_quality.is_none());
        assert!(doc.column("amount").unwrap().profile.statistics.is_none());
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let pipeline = pipeline(introspector(), config());
        let missing = TableHandle::new("", "shop", "missing");
        let results = pipeline
            .generate_metadata_batch(&[missing, orders()], &MetadataRequest::default())
            .await;

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(PipelineError::Introspection { .. })));
        assert_eq!(results[1].as_ref().unwrap().table.name, "orders");
    }

    #[test]
    fn test_request_overrides_budget() {
        let pipeline = pipeline(introspector(), config());
        let budget = pipeline.budget_for(&MetadataRequest {
            sample_size: Some(50),
            max_partitions: Some(5),
            ..Default::default()
        });
        assert_eq!(budget.sample_size, 50);
        assert_eq!(budget.max_partitions, 5);
        assert_eq!(budget.num_samples, SamplingBudget::default().num_samples);
    }
}
