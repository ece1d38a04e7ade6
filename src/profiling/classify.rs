//! Declared-type families and column classification.

use serde::{Deserialize, Serialize};

/// Coarse family of a database-specific type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFamily {
    Integer,
    Float,
    Decimal,
    Boolean,
    String,
    Date,
    Time,
    Timestamp,
    Uuid,
    Json,
    Binary,
    Other,
}

impl TypeFamily {
    /// Map a declared type (any dialect) to its family.
    ///
    /// Parameters (`VARCHAR(255)`, `NUMERIC(10, 2)`) and element types
    /// (`ARRAY<STRING>`) are ignored; arrays and structs map to `Other`.
    pub fn from_declared(declared: &str) -> Self {
        let lower = declared.trim().to_lowercase();
        if lower.starts_with("array") || lower.starts_with("struct") || lower.ends_with("[]") {
            return Self::Other;
        }
        let base = lower
            .split(|c: char| c == '(' || c == '<')
            .next()
            .unwrap_or("")
            .trim();

        match base {
            "bool" | "boolean" | "bit" => Self::Boolean,
            "tinyint" | "smallint" | "int" | "integer" | "bigint" | "int2" | "int4" | "int8"
            | "int16" | "int32" | "int64" | "hugeint" | "serial" | "bigserial" | "byteint" => {
                Self::Integer
            }
            "real" | "float" | "float4" | "float8" | "float32" | "float64" | "double"
            | "double precision" => Self::Float,
            "decimal" | "numeric" | "number" | "bignumeric" | "money" | "smallmoney" => {
                Self::Decimal
            }
            "text" | "string" | "varchar" | "nvarchar" | "char" | "nchar" | "character"
            | "character varying" | "clob" | "ntext" | "citext" => Self::String,
            "date" => Self::Date,
            "time" | "time without time zone" => Self::Time,
            "timestamp" | "datetime" | "datetime2" | "timestamptz" | "timestamp_ntz"
            | "timestamp_ltz" | "timestamp_tz" | "timestamp with time zone"
            | "timestamp without time zone" | "datetimeoffset" | "smalldatetime" => {
                Self::Timestamp
            }
            "uuid" | "guid" | "uniqueidentifier" => Self::Uuid,
            "json" | "jsonb" | "variant" | "object" => Self::Json,
            "binary" | "blob" | "bytea" | "bytes" | "varbinary" | "image" => Self::Binary,
            _ => Self::Other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::Timestamp)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Other)
    }

    /// Families whose values are never treated as categories.
    fn excluded_from_categories(&self) -> bool {
        matches!(self, Self::Json | Self::Binary | Self::Timestamp | Self::Time)
    }
}

/// Thresholds and overrides for categorical classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalRule {
    /// Maximum distinct values of a categorical column.
    pub threshold: u64,
    /// Maximum distinct / non-null ratio of a categorical column.
    pub max_ratio: f64,
    pub force_categorical: Vec<String>,
    pub force_non_categorical: Vec<String>,
}

impl Default for CategoricalRule {
    fn default() -> Self {
        Self {
            threshold: 20,
            max_ratio: 0.5,
            force_categorical: Vec::new(),
            force_non_categorical: Vec::new(),
        }
    }
}

impl CategoricalRule {
    /// Decide whether a column is categorical.
    ///
    /// Overrides win; otherwise both the distinct count and the distinct
    /// ratio must be at or below their limits. Declared-numeric columns can
    /// be categorical too.
    pub fn is_categorical(
        &self,
        column: &str,
        family: TypeFamily,
        distinct: u64,
        non_null: u64,
    ) -> bool {
        if self.force_non_categorical.iter().any(|c| c == column) {
            return false;
        }
        if self.force_categorical.iter().any(|c| c == column) {
            return true;
        }
        if non_null == 0 || family.excluded_from_categories() {
            return false;
        }
        let ratio = distinct as f64 / non_null as f64;
        distinct <= self.threshold && ratio <= self.max_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_families() {
        assert_eq!(TypeFamily::from_declared("INT64"), TypeFamily::Integer);
        assert_eq!(TypeFamily::from_declared("NUMERIC(10, 2)"), TypeFamily::Decimal);
        assert_eq!(TypeFamily::from_declared("varchar(255)"), TypeFamily::String);
        assert_eq!(
            TypeFamily::from_declared("timestamp with time zone"),
            TypeFamily::Timestamp
        );
        assert_eq!(TypeFamily::from_declared("ARRAY<STRING>"), TypeFamily::Other);
        assert_eq!(TypeFamily::from_declared("DATE"), TypeFamily::Date);
        assert!(TypeFamily::from_declared("FLOAT64").is_numeric());
    }

    #[test]
    fn test_low_cardinality_numeric_is_categorical() {
        let rule = CategoricalRule::default();
        assert!(rule.is_categorical("rating", TypeFamily::Integer, 5, 1000));
        assert!(!rule.is_categorical("amount", TypeFamily::Decimal, 950, 1000));
    }

    #[test]
    fn test_ratio_limit_on_small_samples() {
        let rule = CategoricalRule::default();
        // 4 distinct values in 5 rows is not a category
        assert!(!rule.is_categorical("name", TypeFamily::String, 4, 5));
    }

    #[test]
    fn test_overrides_win() {
        let rule = CategoricalRule {
            force_categorical: vec!["zip".into()],
            force_non_categorical: vec!["status".into()],
            ..Default::default()
        };
        assert!(rule.is_categorical("zip", TypeFamily::String, 900, 1000));
        assert!(!rule.is_categorical("status", TypeFamily::String, 3, 1000));
        assert!(!rule.is_categorical("ts", TypeFamily::Timestamp, 2, 1000));
    }
}
