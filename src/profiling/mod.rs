//! Deterministic column profiling.
//!
//! Statistics, categorical distributions and quality metrics all come from
//! fetched sample rows; no LLM output ever reaches this module.

mod classify;
mod profiler;
mod quality;
mod stats;
mod types;

pub use classify::{CategoricalRule, TypeFamily};
pub use profiler::{
    ProfileOutcome, ProfilingConfig, SampleReport, SampleStatus, StatisticalProfiler,
};
pub use quality::{expected_formats, value_shape, ValueFormat};
pub use stats::{categorical_distribution, numeric_stats, percentile};
pub use types::{
    CategoricalValue, ColumnProfile, NumericStats, OtherValues, Percentiles, QualityMetrics,
};
