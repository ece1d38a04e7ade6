//! BI semantic models built from metadata documents.
//!
//! A [`SemanticModel`] holds one view per documented table (dimensions and
//! measures), optional rollup views over derived tables, and explores whose
//! joins come from documented relationships. Generation runs through a small
//! state machine:
//!
//! 1. **Draft** - views and explores built from documents
//! 2. **Validated** - structural checks passed
//! 3. **Appended** - merged into an existing model (append mode only)
//! 4. **Final** - re-validated and ready to render
//!
//! Models persist as JSON for later append runs and render to LookML.

mod append;
mod error;
mod generator;
mod joins;
pub mod lookml;
mod naming;
mod types;
mod validation;

pub use append::append;
pub use error::{SemanticError, SemanticResult};
pub use generator::{GenerationRequest, SemanticModelGenerator};
pub use joins::build_explores;
pub use types::{
    Cardinality, DerivedTable, Dimension, DimensionType, Join, JoinType, Measure, MeasureType,
    ModelState, SemanticExplore, SemanticModel, SemanticView, Timeframe,
};
pub use validation::{ensure_valid, validate};
