//! Run bookkeeping carried in every document.

use serde::{Deserialize, Serialize};

use super::inclusion::{InclusionConfig, SectionKey};
use crate::llm::{ChunkStatus, LlmResponse, TokenUsage};
use crate::profiling::SampleReport;
use crate::prompt::TruncationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<TokenUsage> for TokenTotals {
    fn from(u: TokenUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total(),
        }
    }
}

/// Per-chunk outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStats {
    pub chunk_id: usize,
    pub columns: Vec<String>,
    pub token_count: usize,
    pub attempts: u32,
    pub status: ChunkStatus,
    #[serde(default)]
    pub repaired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&LlmResponse> for ChunkStats {
    fn from(r: &LlmResponse) -> Self {
        Self {
            chunk_id: r.chunk_id,
            columns: r.columns.clone(),
            token_count: r.token_count,
            attempts: r.attempt_count,
            status: r.status,
            repaired: r.repaired,
            error: r.error.clone(),
        }
    }
}

/// An enabled section that is absent from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OmittedSection {
    pub section: SectionKey,
    pub reason: String,
}

/// LLM output that named a column the table does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedReference {
    /// `columns` or an optional section name.
    pub section: String,
    pub column: String,
    pub chunk_id: usize,
}

/// Everything needed to audit or reproduce a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProcessingStats {
    pub duration_ms: u64,
    pub tokens: TokenTotals,
    pub sample_rows: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<SampleReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_partitions: Vec<String>,
    #[serde(default)]
    pub chunks: Vec<ChunkStats>,
    #[serde(default)]
    pub failed_chunks: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub truncations: Vec<TruncationRecord>,
    pub inclusion: InclusionConfig,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_sections: Vec<OmittedSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<DroppedReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ProcessingStats {
    pub fn is_omitted(&self, section: SectionKey) -> bool {
        self.omitted_sections.iter().any(|o| o.section == section)
    }
}
