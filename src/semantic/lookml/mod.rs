//! LookML rendering.
//!
//! One `<view>.view.lkml` file per view and a `<model>.model.lkml` file
//! holding the connection, includes and explores.

mod format;

use super::types::{Dimension, DimensionType, Measure, SemanticExplore, SemanticModel, SemanticView};
use format::{quote_string, IndentWriter};

/// A rendered LookML file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookmlFile {
    pub path: String,
    pub contents: String,
}

fn write_dimension(w: &mut IndentWriter, dimension: &Dimension) {
    if dimension.dimension_type == DimensionType::Time {
        w.open("dimension_group", &dimension.name);
        w.write_line("type: time");
        let timeframes: Vec<&str> = dimension.timeframes.iter().map(|t| t.as_str()).collect();
        w.write_line(&format!("timeframes: [{}]", timeframes.join(", ")));
    } else {
        w.open("dimension", &dimension.name);
        if dimension.primary_key {
            w.write_line("primary_key: yes");
        }
        w.write_line(&format!("type: {}", dimension.dimension_type.as_str()));
    }
    w.write_line(&format!("sql: {} ;;", dimension.sql));
    if let Some(label) = &dimension.label {
        w.write_line(&format!("label: {}", quote_string(label)));
    }
    if let Some(description) = &dimension.description {
        w.write_line(&format!("description: {}", quote_string(description)));
    }
    if dimension.hidden {
        w.write_line("hidden: yes");
    }
    w.close();
}

fn write_measure(w: &mut IndentWriter, measure: &Measure) {
    w.open("measure", &measure.name);
    w.write_line(&format!("type: {}", measure.measure_type.as_str()));
    if let Some(sql) = &measure.sql {
        w.write_line(&format!("sql: {} ;;", sql));
    }
    if let Some(label) = &measure.label {
        w.write_line(&format!("label: {}", quote_string(label)));
    }
    if let Some(description) = &measure.description {
        w.write_line(&format!("description: {}", quote_string(description)));
    }
    w.close();
}

/// Render one view.
pub fn render_view(view: &SemanticView) -> String {
    let mut w = IndentWriter::new();
    w.open("view", &view.name);
    if let Some(table) = &view.sql_table_name {
        w.write_line(&format!("sql_table_name: {} ;;", table));
    }
    if let Some(derived) = &view.derived_table {
        w.write_line("derived_table: {");
        w.indent();
        w.write_line(&format!("sql: {} ;;", derived.sql));
        w.close();
    }
    if let Some(description) = &view.description {
        w.write_line(&format!("description: {}", quote_string(description)));
    }
    for dimension in &view.dimensions {
        w.blank_line();
        write_dimension(&mut w, dimension);
    }
    for measure in &view.measures {
        w.blank_line();
        write_measure(&mut w, measure);
    }
    w.close();
    w.into_string()
}

/// Render one explore with its joins.
pub fn render_explore(explore: &SemanticExplore) -> String {
    let mut w = IndentWriter::new();
    w.open("explore", &explore.name);
    if explore.base_view != explore.name {
        w.write_line(&format!("view_name: {}", explore.base_view));
    }
    if let Some(description) = &explore.description {
        w.write_line(&format!("description: {}", quote_string(description)));
    }
    for join in &explore.joins {
        w.blank_line();
        w.open("join", &join.view);
        w.write_line(&format!("type: {}", join.join_type.as_str()));
        w.write_line(&format!("sql_on: {} ;;", join.sql_on));
        w.write_line(&format!("relationship: {}", join.relationship.as_str()));
        w.close();
    }
    w.close();
    w.into_string()
}

/// Render the model file: connection, view includes and every explore.
pub fn render_model(model: &SemanticModel, connection: &str) -> String {
    let mut out = format!(
        "connection: {}\n\ninclude: \"*.view.lkml\"\n",
        quote_string(connection)
    );
    for explore in &model.explores {
        out.push('\n');
        out.push_str(&render_explore(explore));
    }
    out
}

/// Render every file of the model.
pub fn render_files(model: &SemanticModel, connection: &str) -> Vec<LookmlFile> {
    let mut files: Vec<LookmlFile> = model
        .views
        .iter()
        .map(|view| LookmlFile {
            path: format!("{}.view.lkml", view.name),
            contents: render_view(view),
        })
        .collect();
    files.push(LookmlFile {
        path: format!("{}.model.lkml", model.name),
        contents: render_model(model, connection),
    });
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::types::{
        Cardinality, DerivedTable, Join, JoinType, MeasureType, Timeframe,
    };

    #[test]
    fn test_render_view() {
        let mut id = Dimension::new("order_id", DimensionType::Number, "${TABLE}.order_id");
        id.primary_key = true;
        let mut placed = Dimension::new("placed_at", DimensionType::Time, "${TABLE}.placed_at");
        placed.timeframes = Timeframe::DATE.to_vec();
        let view = SemanticView {
            name: "orders".into(),
            sql_table_name: Some("shop.orders".into()),
            derived_table: None,
            description: Some("One row per \"order\"".into()),
            dimensions: vec![id, placed],
            measures: vec![Measure::count()],
        };

        insta::assert_snapshot!(render_view(&view), @r#"
        view: orders {
          sql_table_name: shop.orders ;;
          description: "One row per \"order\""

          dimension: order_id {
            primary_key: yes
            type: number
            sql: ${TABLE}.order_id ;;
          }

          dimension_group: placed_at {
            type: time
            timeframes: [raw, date, week, month, quarter, year]
            sql: ${TABLE}.placed_at ;;
          }

          measure: count {
            type: count
          }
        }
        "#);
    }

    #[test]
    fn test_render_derived_view_and_model() {
        let mut model = SemanticModel::new("shop");
        model.views.push(SemanticView {
            name: "orders_rollup".into(),
            sql_table_name: None,
            derived_table: Some(DerivedTable {
                sql: "SELECT status, SUM(amount) AS sum_amount FROM shop.orders GROUP BY status".into(),
            }),
            description: None,
            dimensions: vec![],
            measures: vec![Measure::over("sum_amount", MeasureType::Sum, "${TABLE}.sum_amount")],
        });
        model.explores.push(SemanticExplore {
            name: "orders".into(),
            base_view: "orders".into(),
            description: None,
            joins: vec![Join {
                view: "users".into(),
                join_type: JoinType::LeftOuter,
                sql_on: "${orders.user_id} = ${users.user_id}".into(),
                relationship: Cardinality::ManyToOne,
            }],
        });

        let files = render_files(&model, "warehouse");
        assert_eq!(files[0].path, "orders_rollup.view.lkml");
        assert!(files[0].contents.contains("  derived_table: {\n    sql: SELECT status"));
        assert_eq!(files[1].path, "shop.model.lkml");
        insta::assert_snapshot!(files[1].contents, @r#"
        connection: "warehouse"

        include: "*.view.lkml"

        explore: orders {

          join: users {
            type: left_outer
            sql_on: ${orders.user_id} = ${users.user_id} ;;
            relationship: many_to_one
          }
        }
        "#);
    }
}
