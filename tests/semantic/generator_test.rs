use tablescribe::document::{InclusionConfig, MetadataAssembler, MetadataDocument, RunInfo};
use tablescribe::error::PipelineError;
use tablescribe::metadata::{ColumnDescriptor, TableHandle};
use tablescribe::pipeline::generate_semantic_model;
use tablescribe::profiling::ProfileOutcome;
use tablescribe::semantic::{lookml, DimensionType, ModelState, SemanticModel};

fn document(schema: &str, table: &str, columns: &[(&str, &str)]) -> MetadataDocument {
    let descriptors: Vec<ColumnDescriptor> = columns
        .iter()
        .map(|(name, data_type)| ColumnDescriptor::new(*name, *data_type))
        .collect();
    MetadataAssembler::assemble(
        &TableHandle::new("", schema, table),
        &ProfileOutcome::schema_only(&descriptors, vec![]),
        &[],
        &InclusionConfig::none(),
        RunInfo::default(),
    )
}

#[test]
fn test_append_adds_new_fields_and_keeps_hand_edits() {
    let first = document("app", "users", &[("user_id", "INT64"), ("email", "STRING")]);
    let model = generate_semantic_model(&[first], "app", false, true, None).unwrap();
    assert_eq!(model.state, ModelState::Final);

    // hand edit the persisted model
    let mut saved: SemanticModel = SemanticModel::from_json(&model.to_json().unwrap()).unwrap();
    let users = saved.views.iter_mut().find(|v| v.name == "users").unwrap();
    let user_id = users.dimensions.iter_mut().find(|d| d.name == "user_id").unwrap();
    user_id.label = Some("Customer Number".to_string());

    // user_id is now declared as a string, which would classify it differently
    let second = document(
        "app",
        "users",
        &[("user_id", "STRING"), ("email", "STRING"), ("signup_source", "STRING")],
    );
    let merged = generate_semantic_model(&[second], "app", false, true, Some(saved)).unwrap();

    assert_eq!(merged.state, ModelState::Final);
    let users = merged.view("users").unwrap();
    let user_id = users.dimension("user_id").unwrap();
    assert_eq!(user_id.label.as_deref(), Some("Customer Number"));
    assert_eq!(user_id.dimension_type, DimensionType::Number);
    assert_eq!(
        users.dimension("signup_source").unwrap().label.as_deref(),
        Some("Signup Source")
    );
    let names: Vec<&str> = users.dimensions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["user_id", "email", "signup_source"]);
    assert_eq!(merged.explores.len(), 1);
}

#[test]
fn test_conflicting_documents_fail_validation() {
    let a = document("app", "users", &[("user_id", "INT64")]);
    let b = document("crm", "users", &[("user_id", "INT64")]);

    let err = generate_semantic_model(&[a, b], "app", false, true, None).unwrap_err();
    match err {
        PipelineError::ModelValidationFailed { model, issues } => {
            assert_eq!(model, "app");
            assert!(issues.contains(&"duplicate view 'users'".to_string()));
            assert!(issues.contains(&"duplicate explore 'users'".to_string()));
        }
        other => panic!("expected ModelValidationFailed, got {other:?}"),
    }
}

#[test]
fn test_no_documents_is_an_error() {
    assert!(generate_semantic_model(&[], "app", false, true, None).is_err());
}

#[test]
fn test_render_generated_view() {
    let orders = document(
        "shop",
        "orders",
        &[
            ("order_id", "INT64"),
            ("status", "STRING"),
            ("amount", "NUMERIC"),
            ("placed_on", "DATE"),
        ],
    );
    let model = generate_semantic_model(&[orders], "shop", false, false, None).unwrap();
    assert!(model.explores.is_empty());

    insta::assert_snapshot!(lookml::render_view(&model.views[0]), @r#"
    view: orders {
      sql_table_name: shop.orders ;;

      dimension: order_id {
        primary_key: yes
        type: number
        sql: ${TABLE}.order_id ;;
        label: "Order Id"
      }

      dimension: status {
        type: string
        sql: ${TABLE}.status ;;
        label: "Status"
      }

      dimension: amount {
        type: number
        sql: ${TABLE}.amount ;;
        label: "Amount"
      }

      dimension_group: placed_on {
        type: time
        timeframes: [raw, date, week, month, quarter, year]
        sql: ${TABLE}.placed_on ;;
        label: "Placed On"
      }

      measure: count {
        type: count
      }

      measure: total_amount {
        type: sum
        sql: ${TABLE}.amount ;;
        label: "Total Amount"
      }

      measure: average_amount {
        type: average
        sql: ${TABLE}.amount ;;
        label: "Average Amount"
      }
    }
    "#);
}
