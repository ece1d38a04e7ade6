//! Metadata documents.
//!
//! ```text
//!   ProfileOutcome ─┐
//!                   ├──► MetadataAssembler::assemble ──► MetadataDocument
//!   LlmResponse*  ──┤                                     ├─ columns (profile + narrative)
//!                   │                                     ├─ optional sections
//!   InclusionConfig ┘                                     ├─ data_quality
//!                                                         └─ processing_stats
//! ```

mod assembler;
#[allow(clippy::module_inception)]
mod document;
mod inclusion;
mod stats;

pub use assembler::{MetadataAssembler, RunInfo};
pub use document::{DataQualitySummary, DocumentColumn, MetadataDocument, QualityScores};
pub use inclusion::{InclusionConfig, SectionKey};
pub use stats::{
    ChunkStats, DroppedReference, OmittedSection, ProcessingStats, TokenTotals,
};
