//! Token-bounded chunking of column profiles.
//!
//! Columns are packed greedily, whole columns only. After packing, each
//! chunk's full prompt is recounted; a chunk over the threshold sheds its
//! last column into the next chunk. A column too large on its own has its
//! categorical and sample lists halved until it fits, and the truncation
//! is recorded.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::template::PromptTemplate;
use super::tokens::TokenCounter;
use crate::document::SectionKey;
use crate::llm::LlmResult;
use crate::metadata::TableHandle;
use crate::profiling::{CategoricalValue, ColumnProfile, NumericStats, OtherValues, ProfileOutcome};

/// Profiling output to be described by the LLM.
#[derive(Debug, Clone)]
pub struct MetadataFragment {
    pub table: TableHandle,
    pub sample_rows: u64,
    /// Columns in declaration order.
    pub columns: Vec<ColumnProfile>,
    pub sections: Vec<SectionKey>,
    pub custom_instructions: Option<String>,
}

impl MetadataFragment {
    pub fn from_outcome(
        table: &TableHandle,
        outcome: &ProfileOutcome,
        sections: Vec<SectionKey>,
        custom_instructions: Option<String>,
    ) -> Self {
        Self {
            table: table.clone(),
            sample_rows: outcome.sample_rows,
            columns: outcome.ordered().cloned().collect(),
            sections,
            custom_instructions,
        }
    }
}

/// One prompt, covering a disjoint set of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// 1-based position in the plan.
    pub chunk_id: usize,
    pub columns: Vec<String>,
    pub prompt: String,
    /// JSON array of the chunk's column objects.
    pub payload: String,
    pub token_count: usize,
    /// The prompt exceeds the threshold even with one truncated column.
    pub oversized: bool,
}

/// A column whose lists were cut to fit the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationRecord {
    pub column: String,
    pub chunk_id: usize,
    pub categorical_values_before: usize,
    pub categorical_values_after: usize,
    pub sample_values_before: usize,
    pub sample_values_after: usize,
    /// Still over the threshold after truncation.
    pub oversized: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkPlan {
    pub requests: Vec<LlmRequest>,
    pub truncations: Vec<TruncationRecord>,
}

/// Canonical, compact form of a column in a prompt payload.
#[derive(Serialize)]
struct PromptColumn<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    declared_type: &'a str,
    nullable: bool,
    numerical: bool,
    categorical: bool,
    temporal: bool,
    null_count: u64,
    distinct_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<&'a NumericStats>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    categorical_values: &'a [CategoricalValue],
    #[serde(skip_serializing_if = "Option::is_none")]
    other_values: Option<&'a OtherValues>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    sample_values: &'a [String],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    quality_issues: &'a [String],
}

/// Serialize one column with its lists cut to the given lengths.
fn serialize_column(profile: &ColumnProfile, categorical: usize, samples: usize) -> String {
    let column = PromptColumn {
        name: &profile.name,
        declared_type: &profile.declared_type,
        nullable: profile.is_nullable,
        numerical: profile.is_numerical,
        categorical: profile.is_categorical,
        temporal: profile.is_temporal,
        null_count: profile.null_count,
        distinct_count: profile.distinct_count,
        statistics: profile.statistics.as_ref(),
        categorical_values: &profile.categorical_values[..categorical.min(profile.categorical_values.len())],
        other_values: profile.other_values.as_ref(),
        sample_values: &profile.sample_values[..samples.min(profile.sample_values.len())],
        quality_issues: &profile.quality.issues,
    };
    serde_json::to_string(&column).unwrap_or_else(|_| format!("{{\"name\":{:?}}}", profile.name))
}

/// A serialized column ready for packing.
#[derive(Debug, Clone)]
struct PackedColumn {
    name: String,
    json: String,
    tokens: usize,
    oversized: bool,
}

fn payload(columns: &[PackedColumn]) -> String {
    let parts: Vec<&str> = columns.iter().map(|c| c.json.as_str()).collect();
    format!("[{}]", parts.join(","))
}

/// Packs column profiles into token-bounded requests.
pub struct ChunkPlanner {
    counter: Arc<dyn TokenCounter>,
}

impl ChunkPlanner {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Split a fragment into requests whose prompts stay under
    /// `token_threshold` tokens.
    ///
    /// Every column appears in exactly one request, in declaration order.
    pub async fn chunk(
        &self,
        fragment: &MetadataFragment,
        token_threshold: usize,
    ) -> LlmResult<ChunkPlan> {
        let template = PromptTemplate::new(
            &fragment.table,
            fragment.sample_rows,
            fragment.sections.clone(),
            fragment.custom_instructions.clone(),
        );
        let overhead = self.counter.count_tokens(&template.render("[]")).await?;
        let budget = token_threshold.saturating_sub(overhead);

        let mut packed = Vec::with_capacity(fragment.columns.len());
        let mut truncations = Vec::new();
        for profile in &fragment.columns {
            let (column, truncation) = self.pack_column(profile, budget).await?;
            if let Some(t) = truncation {
                truncations.push(t);
            }
            packed.push(column);
        }

        // greedy packing on additive estimates
        let mut groups: VecDeque<Vec<PackedColumn>> = VecDeque::new();
        let mut current: Vec<PackedColumn> = Vec::new();
        let mut used = 0usize;
        for column in packed {
            let fits = used + column.tokens <= budget;
            if column.oversized || (!current.is_empty() && !fits) {
                if !current.is_empty() {
                    groups.push_back(std::mem::take(&mut current));
                }
                used = 0;
            }
            used += column.tokens;
            let alone = column.oversized;
            current.push(column);
            if alone {
                groups.push_back(std::mem::take(&mut current));
                used = 0;
            }
        }
        if !current.is_empty() {
            groups.push_back(current);
        }

        // recount full prompts, shedding trailing columns where needed
        let mut requests = Vec::new();
        while let Some(mut group) = groups.pop_front() {
            let body = payload(&group);
            let prompt = template.render(&body);
            let token_count = self.counter.count_tokens(&prompt).await?;

            if token_count > token_threshold && group.len() > 1 {
                if let Some(last) = group.pop() {
                    debug!(column = %last.name, token_count, "Shedding column to next chunk");
                    match groups.front_mut() {
                        Some(next) if !next.first().map_or(false, |c| c.oversized) => {
                            next.insert(0, last)
                        }
                        _ => groups.push_front(vec![last]),
                    }
                }
                groups.push_front(group);
                continue;
            }

            let chunk_id = requests.len() + 1;
            let oversized = token_count > token_threshold;
            if oversized {
                warn!(chunk_id, token_count, token_threshold, "Chunk exceeds token threshold");
            }
            requests.push(LlmRequest {
                chunk_id,
                columns: group.iter().map(|c| c.name.clone()).collect(),
                prompt,
                payload: body,
                token_count,
                oversized,
            });
        }

        for truncation in &mut truncations {
            if let Some(request) = requests.iter().find(|r| r.columns.contains(&truncation.column)) {
                truncation.chunk_id = request.chunk_id;
                truncation.oversized = request.oversized;
            }
        }

        debug!(
            chunks = requests.len(),
            truncated = truncations.len(),
            "Chunk plan ready"
        );
        Ok(ChunkPlan {
            requests,
            truncations,
        })
    }

    /// Serialize a column, halving its lists until it fits `budget`.
    async fn pack_column(
        &self,
        profile: &ColumnProfile,
        budget: usize,
    ) -> LlmResult<(PackedColumn, Option<TruncationRecord>)> {
        let mut categorical = profile.categorical_values.len();
        let mut samples = profile.sample_values.len();
        let mut json = serialize_column(profile, categorical, samples);
        // +1 for the separating comma
        let mut tokens = self.counter.count_tokens(&json).await? + 1;

        if tokens <= budget {
            return Ok((
                PackedColumn {
                    name: profile.name.clone(),
                    json,
                    tokens,
                    oversized: false,
                },
                None,
            ));
        }

        while tokens > budget && (categorical > 0 || samples > 0) {
            categorical /= 2;
            samples /= 2;
            json = serialize_column(profile, categorical, samples);
            tokens = self.counter.count_tokens(&json).await? + 1;
        }

        let oversized = tokens > budget;
        warn!(
            column = %profile.name,
            categorical_values = categorical,
            sample_values = samples,
            oversized,
            "Truncated column profile to fit token threshold"
        );

        let record = TruncationRecord {
            column: profile.name.clone(),
            chunk_id: 0,
            categorical_values_before: profile.categorical_values.len(),
            categorical_values_after: categorical,
            sample_values_before: profile.sample_values.len(),
            sample_values_after: samples,
            oversized,
        };
        Ok((
            PackedColumn {
                name: profile.name.clone(),
                json,
                tokens,
                oversized,
            },
            Some(record),
        ))
    }
}
