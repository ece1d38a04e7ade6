//! Caller-selected optional sections.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Optional sections of a metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    BusinessRules,
    Relationships,
    CategoricalDefinitions,
    QueryExamples,
    AggregationRules,
    AdditionalInsights,
    DataQuality,
}

impl SectionKey {
    pub const ALL: [SectionKey; 7] = [
        SectionKey::BusinessRules,
        SectionKey::Relationships,
        SectionKey::CategoricalDefinitions,
        SectionKey::QueryExamples,
        SectionKey::AggregationRules,
        SectionKey::AdditionalInsights,
        SectionKey::DataQuality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessRules => "business_rules",
            Self::Relationships => "relationships",
            Self::CategoricalDefinitions => "categorical_definitions",
            Self::QueryExamples => "query_examples",
            Self::AggregationRules => "aggregation_rules",
            Self::AdditionalInsights => "additional_insights",
            Self::DataQuality => "data_quality",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Sections produced by the LLM (data quality is computed locally).
    pub fn is_generated(&self) -> bool {
        !matches!(self, Self::DataQuality)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional sections to compute and include.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionConfig {
    pub business_rules: bool,
    pub relationships: bool,
    pub categorical_definitions: bool,
    pub query_examples: bool,
    pub aggregation_rules: bool,
    pub additional_insights: bool,
    pub data_quality: bool,
}

impl Default for InclusionConfig {
    fn default() -> Self {
        Self::all()
    }
}

impl InclusionConfig {
    pub fn all() -> Self {
        Self {
            business_rules: true,
            relationships: true,
            categorical_definitions: true,
            query_examples: true,
            aggregation_rules: true,
            additional_insights: true,
            data_quality: true,
        }
    }

    pub fn none() -> Self {
        Self {
            business_rules: false,
            relationships: false,
            categorical_definitions: false,
            query_examples: false,
            aggregation_rules: false,
            additional_insights: false,
            data_quality: false,
        }
    }

    /// Only the given sections.
    pub fn only(keys: &[SectionKey]) -> Self {
        let mut config = Self::none();
        for key in keys {
            config.set(*key, true);
        }
        config
    }

    pub fn is_enabled(&self, key: SectionKey) -> bool {
        match key {
            SectionKey::BusinessRules => self.business_rules,
            SectionKey::Relationships => self.relationships,
            SectionKey::CategoricalDefinitions => self.categorical_definitions,
            SectionKey::QueryExamples => self.query_examples,
            SectionKey::AggregationRules => self.aggregation_rules,
            SectionKey::AdditionalInsights => self.additional_insights,
            SectionKey::DataQuality => self.data_quality,
        }
    }

    pub fn set(&mut self, key: SectionKey, enabled: bool) {
        let flag = match key {
            SectionKey::BusinessRules => &mut self.business_rules,
            SectionKey::Relationships => &mut self.relationships,
            SectionKey::CategoricalDefinitions => &mut self.categorical_definitions,
            SectionKey::QueryExamples => &mut self.query_examples,
            SectionKey::AggregationRules => &mut self.aggregation_rules,
            SectionKey::AdditionalInsights => &mut self.additional_insights,
            SectionKey::DataQuality => &mut self.data_quality,
        };
        *flag = enabled;
    }

    pub fn without(mut self, key: SectionKey) -> Self {
        self.set(key, false);
        self
    }

    /// Enabled sections in canonical order.
    pub fn enabled(&self) -> Vec<SectionKey> {
        SectionKey::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    /// Enabled sections the LLM is asked for.
    pub fn generated(&self) -> Vec<SectionKey> {
        self.enabled().into_iter().filter(|k| k.is_generated()).collect()
    }
}
