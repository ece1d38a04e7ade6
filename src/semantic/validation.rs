//! Structural validation of semantic models.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::error::{SemanticError, SemanticResult};
use super::types::SemanticModel;

/// `${view.field}` references in join conditions.
static FIELD_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Every structural issue in the model, in a stable order.
pub fn validate(model: &SemanticModel) -> Vec<String> {
    let mut issues = Vec::new();

    if model.name.trim().is_empty() {
        issues.push("model name is empty".to_string());
    }

    let mut views = HashSet::new();
    for view in &model.views {
        if !views.insert(view.name.as_str()) {
            issues.push(format!("duplicate view '{}'", view.name));
        }
        if view.sql_table_name.is_none() && view.derived_table.is_none() {
            issues.push(format!("view '{}' has no table or derived table", view.name));
        }

        // A dimension group claims its own name and one field per timeframe.
        let mut fields = HashSet::new();
        let names = view
            .dimensions
            .iter()
            .flat_map(|d| {
                let mut names = d.field_names();
                if !names.contains(&d.name) {
                    names.insert(0, d.name.clone());
                }
                names
            })
            .chain(view.measures.iter().map(|m| m.name.clone()));
        for name in names {
            if !fields.insert(name.clone()) {
                issues.push(format!("duplicate field '{}' in view '{}'", name, view.name));
            }
        }
        if view.dimensions.iter().filter(|d| d.primary_key).count() > 1 {
            issues.push(format!("view '{}' has more than one primary key", view.name));
        }
    }

    let mut explores = HashSet::new();
    for explore in &model.explores {
        if !explores.insert(explore.name.as_str()) {
            issues.push(format!("duplicate explore '{}'", explore.name));
        }
        if model.view(&explore.base_view).is_none() {
            issues.push(format!(
                "explore '{}' references unknown view '{}'",
                explore.name, explore.base_view
            ));
        }

        let mut in_scope: HashSet<&str> = HashSet::from([explore.base_view.as_str()]);
        in_scope.extend(explore.joins.iter().map(|j| j.view.as_str()));

        for join in &explore.joins {
            if model.view(&join.view).is_none() {
                issues.push(format!(
                    "join '{}' in explore '{}' references unknown view",
                    join.view, explore.name
                ));
            }
            let refs: Vec<_> = FIELD_REF.captures_iter(&join.sql_on).collect();
            if refs.is_empty() {
                issues.push(format!(
                    "join '{}' in explore '{}' has no field references",
                    join.view, explore.name
                ));
            }
            for caps in refs {
                let (view, field) = (&caps[1], &caps[2]);
                match model.view(view) {
                    Some(v) if !in_scope.contains(view) => issues.push(format!(
                        "join '{}' in explore '{}' references view '{}' outside the explore",
                        join.view, explore.name, v.name
                    )),
                    Some(v) if !v.has_field(field) => issues.push(format!(
                        "join '{}' in explore '{}' references unknown field '{}.{}'",
                        join.view, explore.name, view, field
                    )),
                    Some(_) => {}
                    None => issues.push(format!(
                        "join '{}' in explore '{}' references unknown view '{}'",
                        join.view, explore.name, view
                    )),
                }
            }
        }
    }

    issues
}

/// Fail with [`SemanticError::ModelValidationFailed`] if any issue exists.
pub fn ensure_valid(model: &SemanticModel) -> SemanticResult<()> {
    let issues = validate(model);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(SemanticError::ModelValidationFailed {
            model: model.name.clone(),
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::{
        Cardinality, Dimension, DimensionType, Join, JoinType, Measure, SemanticExplore,
        SemanticView, Timeframe,
    };

    fn view(name: &str, fields: &[&str]) -> SemanticView {
        SemanticView {
            name: name.into(),
            sql_table_name: Some(format!("shop.{}", name)),
            derived_table: None,
            description: None,
            dimensions: fields
                .iter()
                .map(|f| Dimension::new(*f, DimensionType::Number, format!("${{TABLE}}.{}", f)))
                .collect(),
            measures: vec![Measure::count()],
        }
    }

    #[test]
    fn test_valid_model_has_no_issues() {
        let mut model = SemanticModel::new("shop");
        model.views = vec![view("orders", &["user_id"]), view("users", &["user_id"])];
        model.explores = vec![SemanticExplore {
            name: "orders".into(),
            base_view: "orders".into(),
            description: None,
            joins: vec![Join {
                view: "users".into(),
                join_type: JoinType::LeftOuter,
                sql_on: "${orders.user_id} = ${users.user_id}".into(),
                relationship: Cardinality::ManyToOne,
            }],
        }];
        assert!(validate(&model).is_empty());
    }

    #[test]
    fn test_dimension_group_fields_clash_with_columns() {
        let mut placed = Dimension::new("placed_on", DimensionType::Time, "${TABLE}.placed_on");
        placed.timeframes = Timeframe::DATE.to_vec();
        let mut orders = view("orders", &["placed_on_date"]);
        orders.dimensions.push(placed);

        let mut model = SemanticModel::new("shop");
        model.views = vec![orders];
        assert_eq!(
            validate(&model),
            vec!["duplicate field 'placed_on_date' in view 'orders'"]
        );
    }

    #[test]
    fn test_every_issue_is_reported() {
        let mut model = SemanticModel::new("shop");
        model.views = vec![
            view("orders", &["user_id", "user_id"]),
            view("orders", &["id"]),
        ];
        model.explores = vec![SemanticExplore {
            name: "orders".into(),
            base_view: "orders".into(),
            description: None,
            joins: vec![Join {
                view: "users".into(),
                join_type: JoinType::LeftOuter,
                sql_on: "${orders.customer_id} = ${users.user_id}".into(),
                relationship: Cardinality::ManyToOne,
            }],
        }];

        let err = ensure_valid(&model).unwrap_err();
        let SemanticError::ModelValidationFailed { issues, .. } = err else {
            panic!("expected validation failure");
        };
        assert_eq!(
            issues,
            vec![
                "duplicate field 'user_id' in view 'orders'",
                "duplicate view 'orders'",
                "join 'users' in explore 'orders' references unknown view",
                "join 'users' in explore 'orders' references unknown field 'orders.customer_id'",
                "join 'users' in explore 'orders' references unknown view 'users'",
            ]
        );
    }
}
