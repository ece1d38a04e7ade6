//! Column profile types.

use serde::{Deserialize, Serialize};

use crate::metadata::ColumnDescriptor;

/// Linear-interpolated percentiles of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

/// Summary statistics of the numeric values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1); 0 for a single value.
    pub stddev: f64,
    pub percentiles: Percentiles,
}

/// One retained categorical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalValue {
    pub value: String,
    pub count: u64,
    /// Share of non-null sampled values, 0 to 100.
    pub percentage: f64,
}

/// Values folded out of the retained categorical list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherValues {
    pub distinct_values: u64,
    pub count: u64,
    pub percentage: f64,
}

/// Data-quality signals computed from sample counts.
///
/// Every ratio is in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub uniqueness: f64,
    pub validity: f64,
    pub consistency: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl QualityMetrics {
    /// Placeholder for columns profiled without any sample rows.
    pub fn unmeasured() -> Self {
        Self {
            completeness: 0.0,
            uniqueness: 0.0,
            validity: 0.0,
            consistency: 0.0,
            issues: vec!["not measured: no sample rows were fetched".to_string()],
        }
    }
}

/// Deterministic profile of one column.
///
/// Built once per profiling run and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub declared_type: String,
    pub is_nullable: bool,
    pub is_numerical: bool,
    pub is_categorical: bool,
    #[serde(default)]
    pub is_temporal: bool,
    /// Rows in the combined sample.
    pub sample_rows: u64,
    pub null_count: u64,
    pub distinct_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<NumericStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categorical_values: Vec<CategoricalValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_values: Option<OtherValues>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<String>,
    pub quality: QualityMetrics,
}

impl ColumnProfile {
    /// Profile carrying schema facts only (degraded mode).
    pub fn schema_only(column: &ColumnDescriptor) -> Self {
        let family = super::classify::TypeFamily::from_declared(&column.data_type);
        Self {
            name: column.name.clone(),
            declared_type: column.data_type.clone(),
            is_nullable: column.is_nullable,
            is_numerical: family.is_numeric(),
            is_categorical: false,
            is_temporal: family.is_temporal(),
            sample_rows: 0,
            null_count: 0,
            distinct_count: 0,
            statistics: None,
            categorical_values: Vec::new(),
            other_values: None,
            sample_values: Vec::new(),
            quality: QualityMetrics::unmeasured(),
        }
    }

    /// Whether the profile was computed from fetched rows.
    pub fn is_measured(&self) -> bool {
        self.sample_rows > 0
    }
}
