//! Metadata assembly.
//!
//! Merges deterministic profiles with the sections of successful LLM
//! chunks. Narratives are matched to columns by exact name; anything that
//! names a column the table does not have is dropped and recorded.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::Hash;
use std::time::Duration;

use tracing::{debug, warn};

use super::document::{DataQualitySummary, DocumentColumn, MetadataDocument, QualityScores};
use super::inclusion::{InclusionConfig, SectionKey};
use super::stats::{ChunkStats, DroppedReference, OmittedSection, ProcessingStats};
use crate::error::PipelineError;
use crate::llm::{ChunkStatus, LlmResponse, LlmSections, TokenUsage};
use crate::metadata::TableHandle;
use crate::profiling::ProfileOutcome;
use crate::prompt::TruncationRecord;

/// Run facts that are not part of the profiles or LLM output.
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    pub duration: Duration,
    pub truncations: Vec<TruncationRecord>,
    pub partial: bool,
    pub degraded: bool,
    pub errors: Vec<String>,
    /// Why no LLM calls were made, when they were skipped.
    pub generation_skipped: Option<String>,
}

/// Builds [`MetadataDocument`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataAssembler;

/// Accumulates one list section across chunks.
struct ListSection<T> {
    items: Vec<T>,
    provided: bool,
}

impl<T: Clone + Eq + Hash> ListSection<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            provided: false,
        }
    }

    fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        self.provided = true;
        self.items.extend(items);
    }

    /// Exact duplicates removed, first occurrence kept.
    fn finish(self) -> (Vec<T>, bool) {
        let mut seen = HashSet::new();
        let items = self
            .items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect();
        (items, self.provided)
    }
}

impl MetadataAssembler {
    /// Assemble a document.
    ///
    /// Deterministic: identical inputs produce identical profile, statistic
    /// and quality sections.
    pub fn assemble(
        table: &TableHandle,
        profiles: &ProfileOutcome,
        responses: &[LlmResponse],
        inclusion: &InclusionConfig,
        run: RunInfo,
    ) -> MetadataDocument {
        let mut responses: Vec<&LlmResponse> = responses.iter().collect();
        responses.sort_by_key(|r| r.chunk_id);

        let known: BTreeSet<&str> = profiles.columns.keys().map(String::as_str).collect();
        let mut columns: BTreeMap<String, DocumentColumn> = profiles
            .columns
            .iter()
            .map(|(name, profile)| (name.clone(), DocumentColumn::new(profile.clone())))
            .collect();

        let mut dropped = Vec::new();
        let mut table_description = None;
        let mut narrated: HashSet<String> = HashSet::new();
        let mut business_rules = ListSection::new();
        let mut relationships = ListSection::new();
        let mut query_examples = ListSection::new();
        let mut aggregation_rules = ListSection::new();
        let mut additional_insights = ListSection::new();
        let mut categorical_definitions: Option<BTreeMap<String, BTreeMap<String, String>>> = None;

        for response in responses.iter().filter(|r| r.succeeded()) {
            let Some(sections) = &response.sections else {
                continue;
            };
            let chunk_id = response.chunk_id;
            let mut reject = |section: &str, column: &str| {
                warn!(chunk_id, section, column, "Dropping reference to unknown column");
                dropped.push(DroppedReference {
                    section: section.to_string(),
                    column: column.to_string(),
                    chunk_id,
                });
            };

            if table_description.is_none() {
                table_description = sections
                    .table_description
                    .clone()
                    .filter(|d| !d.trim().is_empty());
            }

            for narrative in sections.columns.iter().flatten() {
                match columns.get_mut(&narrative.name) {
                    Some(column) if narrated.insert(narrative.name.clone()) => {
                        column.description = narrative.description.clone();
                        column.business_name = narrative.business_name.clone();
                        column.purpose = narrative.purpose.clone();
                    }
                    Some(_) => {}
                    None => reject("columns", &narrative.name),
                }
            }

            let LlmSections {
                business_rules: rules,
                relationships: rels,
                categorical_definitions: defs,
                query_examples: examples,
                aggregation_rules: aggs,
                additional_insights: insights,
                ..
            } = sections;

            if let Some(rules) = rules {
                business_rules.extend(rules.iter().cloned());
            }
            if let Some(rels) = rels {
                relationships.extend(rels.iter().filter_map(|r| {
                    if known.contains(r.column.as_str()) {
                        Some(r.clone())
                    } else {
                        reject(SectionKey::Relationships.as_str(), &r.column);
                        None
                    }
                }));
            }
            if let Some(examples) = examples {
                query_examples.extend(examples.iter().cloned());
            }
            if let Some(aggs) = aggs {
                aggregation_rules.extend(aggs.iter().filter_map(|a| {
                    let unknown = std::iter::once(&a.column)
                        .chain(a.group_by.iter())
                        .find(|c| !known.contains(c.as_str()));
                    match unknown {
                        Some(column) => {
                            reject(SectionKey::AggregationRules.as_str(), column);
                            None
                        }
                        None => Some(a.clone()),
                    }
                }));
            }
            if let Some(insights) = insights {
                additional_insights.extend(insights.iter().cloned());
            }
            if let Some(defs) = defs {
                let merged = categorical_definitions.get_or_insert_with(BTreeMap::new);
                for (column, values) in defs {
                    if !known.contains(column.as_str()) {
                        reject(SectionKey::CategoricalDefinitions.as_str(), column);
                        continue;
                    }
                    let entry = merged.entry(column.clone()).or_default();
                    for (value, meaning) in values {
                        entry.entry(value.clone()).or_insert_with(|| meaning.clone());
                    }
                }
            }
        }

        let failed: Vec<usize> = responses
            .iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.chunk_id)
            .collect();

        let mut omitted = Vec::new();
        let mut resolve = |key: SectionKey, provided: bool, empty: bool| -> bool {
            if !inclusion.is_enabled(key) {
                return false;
            }
            let reason = if let (false, Some(skipped)) = (provided, &run.generation_skipped) {
                Some(format!("not generated; {}", skipped))
            } else if !provided && !failed.is_empty() {
                Some(format!("not generated; failed chunks: {:?}", failed))
            } else if !provided {
                Some("not returned by the model".to_string())
            } else if empty {
                Some("no entries".to_string())
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    debug!(section = %key, %reason, "Section omitted");
                    omitted.push(OmittedSection {
                        section: key,
                        reason,
                    });
                    false
                }
                None => true,
            }
        };

        let (rules, rules_provided) = business_rules.finish();
        let business_rules = resolve(SectionKey::BusinessRules, rules_provided, rules.is_empty())
            .then_some(rules);

        let (rels, rels_provided) = relationships.finish();
        let relationships =
            resolve(SectionKey::Relationships, rels_provided, rels.is_empty()).then_some(rels);

        let defs_provided = categorical_definitions.is_some();
        let defs = categorical_definitions.unwrap_or_default();
        let categorical_definitions = resolve(
            SectionKey::CategoricalDefinitions,
            defs_provided,
            defs.is_empty(),
        )
        .then_some(defs);

        let (examples, examples_provided) = query_examples.finish();
        let query_examples = resolve(
            SectionKey::QueryExamples,
            examples_provided,
            examples.is_empty(),
        )
        .then_some(examples);

        let (aggs, aggs_provided) = aggregation_rules.finish();
        let aggregation_rules =
            resolve(SectionKey::AggregationRules, aggs_provided, aggs.is_empty()).then_some(aggs);

        let (insights, insights_provided) = additional_insights.finish();
        let additional_insights = resolve(
            SectionKey::AdditionalInsights,
            insights_provided,
            insights.is_empty(),
        )
        .then_some(insights);

        let data_quality = if inclusion.data_quality {
            let summary = summarize_quality(profiles);
            if summary.is_none() {
                omitted.push(OmittedSection {
                    section: SectionKey::DataQuality,
                    reason: "no sample rows were profiled".to_string(),
                });
            }
            summary
        } else {
            None
        };

        let mut usage = TokenUsage::default();
        for response in &responses {
            usage.add(response.usage);
        }

        let mut errors = run.errors;
        for response in responses.iter().filter(|r| !r.succeeded()) {
            errors.push(
                PipelineError::ChunkGenerationFailed {
                    table: table.qualified_name(),
                    chunk_id: response.chunk_id,
                    attempts: response.attempt_count,
                    reason: response.error.clone().unwrap_or_default(),
                }
                .to_string(),
            );
        }

        let processing_stats = ProcessingStats {
            duration_ms: run.duration.as_millis() as u64,
            tokens: usage.into(),
            sample_rows: profiles.sample_rows,
            samples: profiles.reports.clone(),
            unavailable_partitions: profiles.unavailable_partitions(),
            chunks: responses.iter().map(|r| ChunkStats::from(*r)).collect(),
            failed_chunks: failed.len(),
            truncations: run.truncations,
            inclusion: inclusion.clone(),
            partial: run.partial || responses.iter().any(|r| r.status == ChunkStatus::TimedOut),
            degraded: run.degraded || profiles.is_degraded(),
            omitted_sections: omitted,
            dropped_columns: dropped,
            errors,
        };

        MetadataDocument {
            table: TableHandle {
                partition_info: None,
                ..table.clone()
            },
            table_description,
            column_order: profiles.column_order.clone(),
            columns,
            business_rules,
            relationships,
            categorical_definitions,
            query_examples,
            aggregation_rules,
            additional_insights,
            data_quality,
            processing_stats,
        }
    }
}

/// Average quality of measured columns and their issues.
fn summarize_quality(profiles: &ProfileOutcome) -> Option<DataQualitySummary> {
    let measured: Vec<_> = profiles.ordered().filter(|p| p.is_measured()).collect();
    if measured.is_empty() {
        return None;
    }
    let n = measured.len() as f64;
    let avg = |f: fn(&crate::profiling::QualityMetrics) -> f64| {
        let mean = measured.iter().map(|p| f(&p.quality)).sum::<f64>() / n;
        (mean * 10_000.0).round() / 10_000.0
    };

    Some(DataQualitySummary {
        overall: QualityScores {
            completeness: avg(|q| q.completeness),
            uniqueness: avg(|q| q.uniqueness),
            validity: avg(|q| q.validity),
            consistency: avg(|q| q.consistency),
        },
        measured_columns: measured.len(),
        issues: measured
            .iter()
            .filter(|p| !p.quality.issues.is_empty())
            .map(|p| (p.name.clone(), p.quality.issues.clone()))
            .collect(),
    })
}
