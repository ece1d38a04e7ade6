//! The metadata document and its serialized forms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats::ProcessingStats;
use crate::llm::{AggregationRule, CategoricalDefinitions, QueryExample, Relationship};
use crate::metadata::TableHandle;
use crate::profiling::ColumnProfile;

/// A profiled column plus its generated narrative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentColumn {
    #[serde(flatten)]
    pub profile: ColumnProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl DocumentColumn {
    pub fn new(profile: ColumnProfile) -> Self {
        Self {
            profile,
            description: None,
            business_name: None,
            purpose: None,
        }
    }
}

/// Average quality over the measured columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub completeness: f64,
    pub uniqueness: f64,
    pub validity: f64,
    pub consistency: f64,
}

/// Table-level data-quality section, computed from column profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualitySummary {
    pub overall: QualityScores,
    pub measured_columns: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub issues: BTreeMap<String, Vec<String>>,
}

/// Business-readable metadata for one table.
///
/// Optional sections are `None` when disabled or not computed and are then
/// left out of the serialized form entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub table: TableHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_description: Option<String>,
    /// Column names in declaration order.
    pub column_order: Vec<String>,
    pub columns: BTreeMap<String, DocumentColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_rules: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical_definitions: Option<CategoricalDefinitions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_examples: Option<Vec<QueryExample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_rules: Option<Vec<AggregationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_insights: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQualitySummary>,
    pub processing_stats: ProcessingStats,
}

impl MetadataDocument {
    /// Columns in declaration order.
    pub fn ordered_columns(&self) -> impl Iterator<Item = &DocumentColumn> {
        self.column_order.iter().filter_map(|n| self.columns.get(n))
    }

    pub fn column(&self, name: &str) -> Option<&DocumentColumn> {
        self.columns.get(name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
