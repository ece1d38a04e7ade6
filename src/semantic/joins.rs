//! Explore and join inference from relationship metadata.

use tracing::debug;

use super::naming;
use super::types::{Cardinality, Join, JoinType, SemanticExplore, SemanticView};
use crate::document::MetadataDocument;

/// One explore per table view; joins come from the view's documented
/// relationships.
///
/// A relationship yields no join when its type is unknown, its target table
/// is outside the model or matches more than one view, or the target column
/// has no dimension.
pub fn build_explores(documents: &[MetadataDocument], views: &[SemanticView]) -> Vec<SemanticExplore> {
    let table_views: Vec<(&MetadataDocument, &SemanticView)> = documents
        .iter()
        .filter_map(|doc| {
            let name = naming::view_name(&doc.table.name);
            views
                .iter()
                .find(|v| v.name == name && v.derived_table.is_none())
                .map(|v| (doc, v))
        })
        .collect();

    table_views
        .iter()
        .map(|(doc, base)| {
            let mut joins: Vec<Join> = Vec::new();
            for rel in doc.relationships.iter().flatten() {
                let Some(cardinality) = rel
                    .relationship_type
                    .as_deref()
                    .and_then(Cardinality::from_relationship_type)
                else {
                    debug!(view = %base.name, column = %rel.column, "Relationship type unknown; no join");
                    continue;
                };

                let targets: Vec<&SemanticView> = table_views
                    .iter()
                    .filter(|(d, _)| {
                        naming::matches_table(&rel.target_table, &d.table.name)
                            || rel.target_table == d.table.qualified_name()
                    })
                    .map(|(_, v)| *v)
                    .collect();
                let target = match targets.as_slice() {
                    [single] if single.name != base.name => *single,
                    [] => {
                        debug!(view = %base.name, target = %rel.target_table, "Join target outside model");
                        continue;
                    }
                    [_] => continue,
                    _ => {
                        debug!(view = %base.name, target = %rel.target_table, "Ambiguous join target");
                        continue;
                    }
                };

                let base_field = naming::view_name(&rel.column);
                let target_field = naming::view_name(&rel.target_column);
                if base.dimension(&base_field).is_none() || target.dimension(&target_field).is_none() {
                    debug!(view = %base.name, target = %target.name, "Join key has no dimension");
                    continue;
                }
                if joins.iter().any(|j| j.view == target.name) {
                    continue;
                }

                joins.push(Join {
                    view: target.name.clone(),
                    join_type: JoinType::LeftOuter,
                    sql_on: format!(
                        "${{{}.{}}} = ${{{}.{}}}",
                        base.name, base_field, target.name, target_field
                    ),
                    relationship: cardinality,
                });
            }

            SemanticExplore {
                name: base.name.clone(),
                base_view: base.name.clone(),
                description: base.description.clone(),
                joins,
            }
        })
        .collect()
}
