//! Semantic model types: views, dimensions, measures and explores.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{SemanticError, SemanticResult};

/// Lifecycle of a generated model.
///
/// ```text
/// Draft ──► Validated ──► Final
///               │           ▲
///               └► Appended ┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    Draft,
    Validated,
    Appended,
    Final,
}

impl ModelState {
    pub fn can_transition_to(self, next: ModelState) -> bool {
        matches!(
            (self, next),
            (ModelState::Draft, ModelState::Validated)
                | (ModelState::Validated, ModelState::Appended)
                | (ModelState::Validated, ModelState::Final)
                | (ModelState::Appended, ModelState::Final)
        )
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelState::Draft => "draft",
            ModelState::Validated => "validated",
            ModelState::Appended => "appended",
            ModelState::Final => "final",
        };
        write!(f, "{}", s)
    }
}

/// Cardinality of a join between two views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Parse a declared relationship type such as `many_to_one`, `N:1` or
    /// `foreign_key`. Unrecognized types yield `None`.
    pub fn from_relationship_type(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "one_to_one" | "1:1" => Some(Cardinality::OneToOne),
            "one_to_many" | "1:n" | "1:m" => Some(Cardinality::OneToMany),
            "many_to_one" | "n:1" | "m:1" | "foreign_key" => Some(Cardinality::ManyToOne),
            "many_to_many" | "n:n" | "m:n" | "n:m" => Some(Cardinality::ManyToMany),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::OneToOne => "one_to_one",
            Cardinality::OneToMany => "one_to_many",
            Cardinality::ManyToOne => "many_to_one",
            Cardinality::ManyToMany => "many_to_many",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    Number,
    String,
    Yesno,
    /// Rendered as a `dimension_group` with timeframes.
    Time,
}

impl DimensionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionType::Number => "number",
            DimensionType::String => "string",
            DimensionType::Yesno => "yesno",
            DimensionType::Time => "time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Raw,
    Time,
    Date,
    Week,
    Month,
    Quarter,
    Year,
}

impl Timeframe {
    /// Timeframes for a date column.
    pub const DATE: &'static [Timeframe] = &[
        Timeframe::Raw,
        Timeframe::Date,
        Timeframe::Week,
        Timeframe::Month,
        Timeframe::Quarter,
        Timeframe::Year,
    ];

    /// Timeframes for a timestamp column.
    pub const TIMESTAMP: &'static [Timeframe] = &[
        Timeframe::Raw,
        Timeframe::Time,
        Timeframe::Date,
        Timeframe::Week,
        Timeframe::Month,
        Timeframe::Quarter,
        Timeframe::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Raw => "raw",
            Timeframe::Time => "time",
            Timeframe::Date => "date",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::Quarter => "quarter",
            Timeframe::Year => "year",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    pub sql: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only for time dimensions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeframes: Vec<Timeframe>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, dimension_type: DimensionType, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension_type,
            sql: sql.into(),
            primary_key: false,
            label: None,
            description: None,
            timeframes: Vec::new(),
            hidden: false,
        }
    }

    /// Names this dimension can be referenced by. A time dimension group
    /// exposes one field per timeframe.
    pub fn field_names(&self) -> Vec<String> {
        if self.dimension_type == DimensionType::Time {
            self.timeframes
                .iter()
                .map(|t| format!("{}_{}", self.name, t.as_str()))
                .collect()
        } else {
            vec![self.name.clone()]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureType {
    Count,
    CountDistinct,
    Sum,
    Average,
    Min,
    Max,
}

impl MeasureType {
    /// Parse an aggregation name (`sum`, `avg`, `count_distinct`, ...).
    pub fn from_aggregation(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "count" => Some(MeasureType::Count),
            "count_distinct" | "distinct_count" => Some(MeasureType::CountDistinct),
            "sum" | "total" => Some(MeasureType::Sum),
            "avg" | "average" | "mean" => Some(MeasureType::Average),
            "min" | "minimum" => Some(MeasureType::Min),
            "max" | "maximum" => Some(MeasureType::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Count => "count",
            MeasureType::CountDistinct => "count_distinct",
            MeasureType::Sum => "sum",
            MeasureType::Average => "average",
            MeasureType::Min => "min",
            MeasureType::Max => "max",
        }
    }

    /// SQL aggregate function for this measure.
    pub fn sql_function(&self) -> &'static str {
        match self {
            MeasureType::Count | MeasureType::CountDistinct => "COUNT",
            MeasureType::Sum => "SUM",
            MeasureType::Average => "AVG",
            MeasureType::Min => "MIN",
            MeasureType::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(rename = "type")]
    pub measure_type: MeasureType,
    /// Absent for plain row counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Measure {
    pub fn count() -> Self {
        Self {
            name: "count".to_string(),
            measure_type: MeasureType::Count,
            sql: None,
            label: None,
            description: None,
        }
    }

    pub fn over(name: impl Into<String>, measure_type: MeasureType, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measure_type,
            sql: Some(sql.into()),
            label: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedTable {
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticView {
    pub name: String,
    /// Absent for derived-table views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_table_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_table: Option<DerivedTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

impl SemanticView {
    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Whether `field` can be referenced as `${view.field}`.
    pub fn has_field(&self, field: &str) -> bool {
        self.dimensions
            .iter()
            .any(|d| d.name == field || d.field_names().iter().any(|n| n == field))
            || self.measures.iter().any(|m| m.name == field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    LeftOuter,
    Inner,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::LeftOuter => "left_outer",
            JoinType::Inner => "inner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// The joined view.
    pub view: String,
    #[serde(rename = "type")]
    pub join_type: JoinType,
    /// `${base.key} = ${view.key}`
    pub sql_on: String,
    pub relationship: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticExplore {
    pub name: String,
    pub base_view: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub joins: Vec<Join>,
}

/// A BI semantic model over one or more documented tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub name: String,
    pub state: ModelState,
    #[serde(default)]
    pub views: Vec<SemanticView>,
    #[serde(default)]
    pub explores: Vec<SemanticExplore>,
}

impl SemanticModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ModelState::Draft,
            views: Vec::new(),
            explores: Vec::new(),
        }
    }

    pub fn view(&self, name: &str) -> Option<&SemanticView> {
        self.views.iter().find(|v| v.name == name)
    }

    pub fn explore(&self, name: &str) -> Option<&SemanticExplore> {
        self.explores.iter().find(|e| e.name == name)
    }

    /// Move to `next`, refusing transitions the lifecycle does not allow.
    pub(crate) fn transition(&mut self, next: ModelState) -> SemanticResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(SemanticError::InvalidTransition {
                model: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn to_json(&self) -> SemanticResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> SemanticResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
