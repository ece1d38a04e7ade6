//! End-to-end metadata generation.
//!
//! ```text
//!   TableHandle
//!       │ Introspector::introspect
//!       ▼
//!   SamplingPlanner::plan ──► StatisticalProfiler::profile ──┐
//!       (CostBudgetExceeded / ProfilingUnavailable           │
//!        ──► schema-only when allowed)                       ▼
//!   ChunkPlanner::chunk ──► LlmOrchestrator::execute_until ──► MetadataAssembler
//!                                                               │
//!                                                               ▼
//!                                                        MetadataDocument
//!                                                               │ generate_semantic_model
//!                                                               ▼
//!                                                         SemanticModel
//! ```
//!
//! Every sample fetch and LLM call of every table in a batch draws from one
//! shared semaphore of `max_workers` permits.

mod runner;

pub use runner::{MetadataPipeline, MetadataRequest, PipelineConfig};

use crate::document::MetadataDocument;
use crate::error::PipelineResult;
use crate::semantic::{GenerationRequest, SemanticModel, SemanticModelGenerator};

/// Build a final semantic model from documents, appending onto `existing`
/// when given.
pub fn generate_semantic_model(
    documents: &[MetadataDocument],
    model_name: &str,
    include_derived_tables: bool,
    include_explores: bool,
    existing: Option<SemanticModel>,
) -> PipelineResult<SemanticModel> {
    let request = GenerationRequest {
        include_derived_tables,
        include_explores,
        ..GenerationRequest::new(model_name)
    };
    Ok(SemanticModelGenerator::generate(documents, &request, existing)?)
}
