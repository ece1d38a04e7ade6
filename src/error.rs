//! Pipeline error taxonomy.
//!
//! Errors are scoped to one table run: a `PipelineError` aborts the table
//! it was raised for and nothing else. Chunk-level LLM failures never
//! surface here as errors; they are recorded in `processing_stats`.

use thiserror::Error;

use crate::config::SettingsError;
use crate::llm::LlmError;
use crate::semantic::SemanticError;
use crate::worker::WorkerError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Sampling would exceed the budget even after every allowed reduction.
    #[error(
        "Sampling {table} exceeds budget after {attempts} reductions \
         (estimated cost {estimated_cost:.4}, {estimated_seconds:.1}s)"
    )]
    CostBudgetExceeded {
        table: String,
        estimated_cost: f64,
        estimated_seconds: f64,
        max_cost: Option<f64>,
        timeout_seconds: u64,
        attempts: u32,
    },

    /// No sample could be fetched for the table.
    #[error("Profiling unavailable for {table}: {reason}")]
    ProfilingUnavailable { table: String, reason: String },

    /// One LLM chunk could not be generated.
    #[error("Chunk {chunk_id} of {table} failed after {attempts} attempts: {reason}")]
    ChunkGenerationFailed {
        table: String,
        chunk_id: usize,
        attempts: u32,
        reason: String,
    },

    /// The semantic model has structural conflicts.
    #[error("Semantic model '{model}' failed validation: {}", issues.join("; "))]
    ModelValidationFailed { model: String, issues: Vec<String> },

    #[error("Introspection of {table} failed: {source}")]
    Introspection {
        table: String,
        #[source]
        source: WorkerError,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Semantic(SemanticError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl From<SemanticError> for PipelineError {
    fn from(e: SemanticError) -> Self {
        match e {
            SemanticError::ModelValidationFailed { model, issues } => {
                Self::ModelValidationFailed { model, issues }
            }
            other => Self::Semantic(other),
        }
    }
}

impl PipelineError {
    /// Table the error belongs to, when known.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CostBudgetExceeded { table, .. }
            | Self::ProfilingUnavailable { table, .. }
            | Self::ChunkGenerationFailed { table, .. }
            | Self::Introspection { table, .. } => Some(table),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_lifted() {
        let err: PipelineError = SemanticError::ModelValidationFailed {
            model: "shop".into(),
            issues: vec!["duplicate view 'orders'".into(), "unknown view 'x'".into()],
        }
        .into();
        assert!(matches!(err, PipelineError::ModelValidationFailed { .. }));
        assert_eq!(
            err.to_string(),
            "Semantic model 'shop' failed validation: duplicate view 'orders'; unknown view 'x'"
        );
    }

    #[test]
    fn test_table_context() {
        let err = PipelineError::ProfilingUnavailable {
            table: "sales.orders".into(),
            reason: "all 3 sample specs failed".into(),
        };
        assert_eq!(err.table(), Some("sales.orders"));
        assert!(err.to_string().contains("sales.orders"));
    }
}
