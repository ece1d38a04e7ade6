//! Naming helpers for views, fields and labels.

use inflector::Inflector;

/// Irregular plurals common in warehouse table names.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("analysis", "analyses"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("address", "addresses"),
    ("status", "statuses"),
];

pub fn singularize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *plural || lower == *singular {
            return singular.to_string();
        }
    }
    word.to_singular()
}

/// LookML-safe identifier for a table or column name.
pub fn view_name(table: &str) -> String {
    table.to_snake_case()
}

/// Human label for a field name (`signup_source` → `Signup Source`).
pub fn label(name: &str) -> String {
    name.to_title_case()
}

/// Whether a column name reads as a key or identifier.
pub fn looks_like_key(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower == "id"
        || lower == "key"
        || lower.ends_with("_id")
        || lower.ends_with("_key")
        || lower.ends_with("_uuid")
        || lower.ends_with("_code")
        || lower.ends_with("_number")
        || lower.ends_with("_no")
}

/// Whether `column` is the natural primary key name for `table`
/// (`id`, or `user_id` on `users`).
pub fn is_own_key(table: &str, column: &str) -> bool {
    let lower = column.to_lowercase();
    if lower == "id" {
        return true;
    }
    let entity = singularize(&table.to_lowercase());
    lower == format!("{}_id", entity) || lower == format!("{}_key", entity)
}

/// Column names that read as ratios and should only be averaged.
pub fn looks_like_ratio(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower.ends_with("_rate")
        || lower.ends_with("_pct")
        || lower.ends_with("_percent")
        || lower.ends_with("_percentage")
        || lower.ends_with("_ratio")
        || lower.ends_with("_avg")
        || lower.ends_with("_average")
}

/// Whether a relationship target names this table (`customers`,
/// `sales.customers` and `customer` all match `customers`).
pub fn matches_table(target: &str, table: &str) -> bool {
    let target = target.rsplit('.').next().unwrap_or(target).to_lowercase();
    let table = table.to_lowercase();
    target == table || singularize(&target) == singularize(&table)
}
