//! # tablescribe
//!
//! Statistically grounded, LLM-assisted metadata for analytical tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Introspector (columns, partitions, rows)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sampling]
//! ┌─────────────────────────────────────────────────────────┐
//! │         Cost-bounded, partition-aware SampleSpecs        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [profiling]
//! ┌─────────────────────────────────────────────────────────┐
//! │   ColumnProfiles (statistics, categories, quality)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [prompt + llm]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Token-bounded chunks ──► retried, repaired responses   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [document]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  MetadataDocument                        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SemanticModel (views, explores) ──► LookML        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Database and LLM wire protocols live in a worker sidecar reached through
//! [`worker::WorkerClient`]; [`pipeline::MetadataPipeline`] wires the stages
//! together.

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod metadata;
pub mod pipeline;
pub mod profiling;
pub mod prompt;
pub mod sampling;
pub mod semantic;
pub mod worker;

pub use document::{InclusionConfig, MetadataDocument};
pub use error::{PipelineError, PipelineResult};
pub use metadata::TableHandle;
pub use pipeline::{generate_semantic_model, MetadataPipeline, MetadataRequest, PipelineConfig};
pub use semantic::SemanticModel;
