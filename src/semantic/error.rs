//! Semantic model errors.

use thiserror::Error;

use super::types::ModelState;

pub type SemanticResult<T> = Result<T, SemanticError>;

#[derive(Debug, Error)]
pub enum SemanticError {
    /// Every issue found in one validation pass; no partial model is returned.
    #[error("Semantic model '{model}' failed validation: {}", issues.join("; "))]
    ModelValidationFailed { model: String, issues: Vec<String> },

    #[error("Semantic model '{model}' cannot move from {from} to {to}")]
    InvalidTransition {
        model: String,
        from: ModelState,
        to: ModelState,
    },

    #[error("No documents to build semantic model '{0}' from")]
    NoDocuments(String),

    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),
}
