//! Append mode: merge a newly generated model into an existing one.
//!
//! Entries are matched by name. New views, fields, explores and joins are
//! added; existing ones are kept as they are (hand edits survive) unless
//! `overwrite` is set.

use tracing::debug;

use super::error::SemanticResult;
use super::types::{ModelState, SemanticExplore, SemanticModel, SemanticView};

/// Merge `incoming` (a validated draft) into `existing`.
pub fn append(
    existing: SemanticModel,
    mut incoming: SemanticModel,
    overwrite: bool,
) -> SemanticResult<SemanticModel> {
    incoming.transition(ModelState::Appended)?;

    let mut merged = SemanticModel {
        name: existing.name,
        state: incoming.state,
        views: existing.views,
        explores: existing.explores,
    };

    for view in incoming.views {
        match merged.views.iter_mut().find(|v| v.name == view.name) {
            Some(current) => merge_view(current, view, overwrite),
            None => {
                debug!(view = %view.name, "Appending new view");
                merged.views.push(view);
            }
        }
    }

    for explore in incoming.explores {
        match merged.explores.iter_mut().find(|e| e.name == explore.name) {
            Some(current) => merge_explore(current, explore, overwrite),
            None => merged.explores.push(explore),
        }
    }

    Ok(merged)
}

fn merge_view(current: &mut SemanticView, incoming: SemanticView, overwrite: bool) {
    if overwrite {
        current.sql_table_name = incoming.sql_table_name;
        current.derived_table = incoming.derived_table;
        current.description = incoming.description.or(current.description.take());
    } else if current.description.is_none() {
        current.description = incoming.description;
    }

    for dimension in incoming.dimensions {
        match current.dimensions.iter_mut().find(|d| d.name == dimension.name) {
            Some(existing) if overwrite => *existing = dimension,
            Some(_) => {}
            None => {
                debug!(view = %current.name, dimension = %dimension.name, "Appending dimension");
                current.dimensions.push(dimension);
            }
        }
    }

    for measure in incoming.measures {
        match current.measures.iter_mut().find(|m| m.name == measure.name) {
            Some(existing) if overwrite => *existing = measure,
            Some(_) => {}
            None => {
                debug!(view = %current.name, measure = %measure.name, "Appending measure");
                current.measures.push(measure);
            }
        }
    }
}

fn merge_explore(current: &mut SemanticExplore, incoming: SemanticExplore, overwrite: bool) {
    if overwrite {
        current.base_view = incoming.base_view;
        current.description = incoming.description.or(current.description.take());
    }
    for join in incoming.joins {
        match current.joins.iter_mut().find(|j| j.view == join.view) {
            Some(existing) if overwrite => *existing = join,
            Some(_) => {}
            None => current.joins.push(join),
        }
    }
}
