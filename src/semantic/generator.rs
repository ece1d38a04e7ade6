//! Semantic model generation from metadata documents.
//!
//! ```text
//!   MetadataDocument* ──► draft ──► validate ──► [append onto existing] ──► finalize
//!                           │                          │                      │
//!                        Draft                  Validated/Appended          Final
//! ```
//!
//! Dimensions and measures come only from profiled column facts; LLM text
//! contributes labels and descriptions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::append::append;
use super::error::{SemanticError, SemanticResult};
use super::joins::build_explores;
use super::naming;
use super::types::{
    DerivedTable, Dimension, DimensionType, Measure, MeasureType, ModelState, SemanticModel,
    SemanticView, Timeframe,
};
use super::validation::ensure_valid;
use crate::document::{DocumentColumn, MetadataDocument};
use crate::profiling::TypeFamily;

/// Options for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub model_name: String,
    /// Emit a `<view>_rollup` derived table per document with aggregation rules.
    pub include_derived_tables: bool,
    /// Emit one explore per table view, with joins from relationship metadata.
    pub include_explores: bool,
    /// In append mode, replace existing entries with the same name.
    pub overwrite: bool,
    /// `column` or `view.column` entries to leave out of the model.
    pub exclude_columns: Vec<String>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            model_name: "tablescribe".to_string(),
            include_derived_tables: false,
            include_explores: true,
            overwrite: false,
            exclude_columns: Vec::new(),
        }
    }
}

impl GenerationRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    fn is_excluded(&self, view: &str, column: &str) -> bool {
        self.exclude_columns.iter().any(|e| match e.split_once('.') {
            Some((v, c)) => v == view && c == column,
            None => e == column,
        })
    }
}

/// Builds [`SemanticModel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticModelGenerator;

impl SemanticModelGenerator {
    /// Generate a final model, optionally appending onto `existing`.
    ///
    /// Fails with [`SemanticError::ModelValidationFailed`] listing every
    /// issue; no partial model is returned.
    pub fn generate(
        documents: &[MetadataDocument],
        request: &GenerationRequest,
        existing: Option<SemanticModel>,
    ) -> SemanticResult<SemanticModel> {
        if documents.is_empty() {
            return Err(SemanticError::NoDocuments(request.model_name.clone()));
        }

        let mut model = Self::draft(documents, request);
        ensure_valid(&model)?;
        model.transition(ModelState::Validated)?;

        if let Some(existing) = existing {
            model = append(existing, model, request.overwrite)?;
        }

        ensure_valid(&model)?;
        model.transition(ModelState::Final)?;
        info!(
            model = %model.name,
            views = model.views.len(),
            explores = model.explores.len(),
            "Semantic model generated"
        );
        Ok(model)
    }

    /// Build the unvalidated draft: one view per document, plus rollups and
    /// explores when requested.
    pub fn draft(documents: &[MetadataDocument], request: &GenerationRequest) -> SemanticModel {
        let mut model = SemanticModel::new(request.model_name.clone());
        for doc in documents {
            let view = table_view(doc, request);
            if request.include_derived_tables {
                if let Some(rollup) = rollup_view(doc, &view) {
                    model.views.push(view);
                    model.views.push(rollup);
                    continue;
                }
            }
            model.views.push(view);
        }
        if request.include_explores {
            model.explores = build_explores(documents, &model.views);
        }
        model
    }
}

fn column_dimension(view: &str, column: &DocumentColumn) -> Option<Dimension> {
    let profile = &column.profile;
    let family = TypeFamily::from_declared(&profile.declared_type);
    let sql = format!("${{TABLE}}.{}", profile.name);
    let name = naming::view_name(&profile.name);

    let mut dimension = match family {
        TypeFamily::Binary => {
            debug!(view, column = %profile.name, "Skipping binary column");
            return None;
        }
        TypeFamily::Boolean => Dimension::new(name, DimensionType::Yesno, sql),
        TypeFamily::Date => {
            let mut d = Dimension::new(name, DimensionType::Time, sql);
            d.timeframes = Timeframe::DATE.to_vec();
            d
        }
        TypeFamily::Timestamp => {
            let mut d = Dimension::new(name, DimensionType::Time, sql);
            d.timeframes = Timeframe::TIMESTAMP.to_vec();
            d
        }
        _ if profile.is_numerical => Dimension::new(name, DimensionType::Number, sql),
        _ => Dimension::new(name, DimensionType::String, sql),
    };
    dimension.label = Some(
        column
            .business_name
            .clone()
            .unwrap_or_else(|| naming::label(&profile.name)),
    );
    dimension.description = column.description.clone();
    Some(dimension)
}

/// Additive measures for continuous numeric columns.
fn column_measures(column: &DocumentColumn) -> Vec<Measure> {
    let profile = &column.profile;
    let family = TypeFamily::from_declared(&profile.declared_type);
    if !profile.is_numerical
        || profile.is_categorical
        || family == TypeFamily::Boolean
        || naming::looks_like_key(&profile.name)
    {
        return Vec::new();
    }

    let name = naming::view_name(&profile.name);
    let sql = format!("${{TABLE}}.{}", profile.name);
    let label = column
        .business_name
        .clone()
        .unwrap_or_else(|| naming::label(&profile.name));

    let mut measures = Vec::new();
    if !naming::looks_like_ratio(&profile.name) {
        let mut total = Measure::over(format!("total_{}", name), MeasureType::Sum, sql.clone());
        total.label = Some(format!("Total {}", label));
        measures.push(total);
    }
    let mut average = Measure::over(format!("average_{}", name), MeasureType::Average, sql);
    average.label = Some(format!("Average {}", label));
    measures.push(average);
    measures
}

fn table_view(doc: &MetadataDocument, request: &GenerationRequest) -> SemanticView {
    let view = naming::view_name(&doc.table.name);
    let mut dimensions = Vec::new();
    let mut measures = vec![Measure::count()];

    for column in doc.ordered_columns() {
        if request.is_excluded(&view, &column.profile.name) {
            debug!(view = %view, column = %column.profile.name, "Column excluded");
            continue;
        }
        if let Some(dimension) = column_dimension(&view, column) {
            dimensions.push(dimension);
            measures.extend(column_measures(column));
        }
    }

    mark_primary_key(&doc.table.name, doc, &mut dimensions);

    let taken: HashSet<String> = dimensions.iter().flat_map(|d| d.field_names()).collect();
    measures.retain(|m| {
        let clash = taken.contains(&m.name);
        if clash {
            debug!(view = %view, measure = %m.name, "Measure name collides with a dimension");
        }
        !clash
    });

    SemanticView {
        name: view,
        sql_table_name: Some(doc.table.qualified_name()),
        derived_table: None,
        description: doc.table_description.clone(),
        dimensions,
        measures,
    }
}

/// Flag at most one key dimension: the table's own key name if present,
/// otherwise a key-like column that was unique and non-null in the sample.
fn mark_primary_key(table: &str, doc: &MetadataDocument, dimensions: &mut [Dimension]) {
    let column_of = |d: &Dimension| {
        d.sql
            .strip_prefix("${TABLE}.")
            .and_then(|c| doc.column(c))
            .map(|c| &c.profile)
    };

    let own = dimensions.iter().position(|d| {
        d.dimension_type != DimensionType::Time
            && column_of(d).is_some_and(|p| naming::is_own_key(table, &p.name))
    });
    let unique = || {
        dimensions.iter().position(|d| {
            column_of(d).is_some_and(|p| {
                naming::looks_like_key(&p.name)
                    && p.is_measured()
                    && p.null_count == 0
                    && p.distinct_count == p.sample_rows
            })
        })
    };

    if let Some(i) = own.or_else(unique) {
        dimensions[i].primary_key = true;
    }
}

/// `<view>_rollup`: the document's aggregation rules grouped by its
/// categorical columns.
fn rollup_view(doc: &MetadataDocument, base: &SemanticView) -> Option<SemanticView> {
    let rules = doc.aggregation_rules.as_ref()?;

    let mut group_by: Vec<String> = doc
        .ordered_columns()
        .filter(|c| c.profile.is_categorical && !naming::looks_like_key(&c.profile.name))
        .map(|c| c.profile.name.clone())
        .collect();
    for rule in rules {
        for column in &rule.group_by {
            if !group_by.contains(column) {
                group_by.push(column.clone());
            }
        }
    }

    let mut aggregates: Vec<(String, MeasureType, String)> = Vec::new();
    for rule in rules {
        let Some(measure_type) = MeasureType::from_aggregation(&rule.aggregation) else {
            debug!(column = %rule.column, aggregation = %rule.aggregation, "Unknown aggregation");
            continue;
        };
        let alias = format!("{}_{}", measure_type.as_str(), naming::view_name(&rule.column));
        if aggregates.iter().any(|(a, _, _)| *a == alias) || group_by.contains(&alias) {
            continue;
        }
        let expr = match measure_type {
            MeasureType::CountDistinct => format!("COUNT(DISTINCT {})", rule.column),
            other => format!("{}({})", other.sql_function(), rule.column),
        };
        aggregates.push((alias, measure_type, expr));
    }
    if aggregates.is_empty() {
        return None;
    }

    let mut select: Vec<String> = group_by.clone();
    select.extend(aggregates.iter().map(|(alias, _, expr)| format!("{} AS {}", expr, alias)));
    let mut sql = format!(
        "SELECT {} FROM {}",
        select.join(", "),
        doc.table.qualified_name()
    );
    if !group_by.is_empty() {
        sql.push_str(&format!(" GROUP BY {}", group_by.join(", ")));
    }

    let dimensions = group_by
        .iter()
        .map(|column| {
            let name = naming::view_name(column);
            let dimension_type = base
                .dimension(&name)
                .map(|d| d.dimension_type)
                .filter(|t| *t != DimensionType::Time)
                .unwrap_or(DimensionType::String);
            let mut d = Dimension::new(name, dimension_type, format!("${{TABLE}}.{}", column));
            d.label = Some(naming::label(column));
            d
        })
        .collect();

    // pre-aggregated values are re-aggregated; counts add up
    let measures = aggregates
        .into_iter()
        .map(|(alias, measure_type, _)| {
            let reaggregate = match measure_type {
                MeasureType::Count | MeasureType::CountDistinct | MeasureType::Sum => {
                    MeasureType::Sum
                }
                other => other,
            };
            let mut m = Measure::over(alias.clone(), reaggregate, format!("${{TABLE}}.{}", alias));
            m.label = Some(naming::label(&alias));
            m
        })
        .collect();

    Some(SemanticView {
        name: format!("{}_rollup", base.name),
        sql_table_name: None,
        derived_table: Some(DerivedTable { sql }),
        description: Some(format!("Pre-aggregated rollup of {}", base.name)),
        dimensions,
        measures,
    })
}
