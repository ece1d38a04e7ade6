//! Metadata types for the introspection abstraction.
//!
//! These types are Rust-native representations of table metadata,
//! convertible from worker protocol types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::worker::protocol;

/// Identity of the physical table under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableHandle {
    /// Database / project. May be empty when the connection implies it.
    #[serde(default)]
    pub database: String,
    /// Schema / dataset.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Partition metadata, once introspected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_info: Option<PartitionInfo>,
}

impl TableHandle {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
            partition_info: None,
        }
    }

    /// Parse `database.schema.table`, `schema.table` or `table`.
    ///
    /// Returns `None` for empty segments or more than three parts.
    pub fn parse(qualified: &str) -> Option<Self> {
        let parts: Vec<&str> = qualified.trim().split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        match parts.as_slice() {
            [table] => Some(Self::new("", "", *table)),
            [schema, table] => Some(Self::new("", *schema, *table)),
            [database, schema, table] => Some(Self::new(*database, *schema, *table)),
            _ => None,
        }
    }

    /// Attach introspected partition metadata.
    pub fn with_partition_info(mut self, info: PartitionInfo) -> Self {
        self.partition_info = Some(info);
        self
    }

    /// Dotted name, skipping empty leading parts.
    pub fn qualified_name(&self) -> String {
        [&self.database, &self.schema, &self.name]
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Physical partitioning scheme of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartitionType {
    /// Partitioned on a DATE/TIMESTAMP column.
    Time,
    /// Partitioned on integer ranges.
    IntegerRange,
    /// Partitioned on load time (pseudo-column).
    IngestionTime,
    /// Not partitioned.
    #[default]
    None,
}

impl PartitionType {
    fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "time" | "day" | "hour" | "month" | "year" => Self::Time,
            "integer_range" | "range" => Self::IntegerRange,
            "ingestion_time" | "ingestion" => Self::IngestionTime,
            _ => Self::None,
        }
    }

    /// Whether partitions correspond to points in time.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Time | Self::IngestionTime)
    }
}

/// Partition and clustering metadata of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PartitionInfo {
    pub is_partitioned: bool,
    pub partition_type: PartitionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_column: Option<String>,
    #[serde(default)]
    pub clustering_columns: Vec<String>,
    /// Partition identifiers ordered oldest → newest.
    #[serde(default)]
    pub available_partitions: Vec<String>,
}

impl PartitionInfo {
    /// Metadata for a table without partitions.
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    /// The `n` most recent partitions, most recent first.
    pub fn most_recent(&self, n: usize) -> Vec<String> {
        self.available_partitions
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    /// The partition that follows `id`, if any (used as a range upper bound).
    pub fn next_after(&self, id: &str) -> Option<&str> {
        let pos = self.available_partitions.iter().position(|p| p == id)?;
        self.available_partitions.get(pos + 1).map(String::as_str)
    }
}

impl From<protocol::PartitionInfoResponse> for PartitionInfo {
    fn from(p: protocol::PartitionInfoResponse) -> Self {
        let partition_type = if p.is_partitioned {
            p.partition_type
                .as_deref()
                .map(PartitionType::from_str)
                .unwrap_or_default()
        } else {
            PartitionType::None
        };
        Self {
            is_partitioned: p.is_partitioned,
            partition_type,
            partition_column: p.partition_column,
            clustering_columns: p.clustering_columns,
            available_partitions: p.partitions,
        }
    }
}

/// A column as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Database-specific type name.
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            description: None,
            is_primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }
}

impl From<protocol::ColumnInfo> for ColumnDescriptor {
    fn from(c: protocol::ColumnInfo) -> Self {
        Self {
            name: c.name,
            data_type: c.data_type,
            is_nullable: c.is_nullable,
            description: c.description,
            is_primary_key: c.is_primary_key,
        }
    }
}

/// Result of a dry run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostEstimate {
    pub estimated_rows: u64,
    pub estimated_bytes: u64,
    pub estimated_cost: f64,
    pub estimated_seconds: f64,
}

impl CostEstimate {
    /// Scale every component (used for multi-query specs).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            estimated_rows: (self.estimated_rows as f64 * factor).round() as u64,
            estimated_bytes: (self.estimated_bytes as f64 * factor).round() as u64,
            estimated_cost: self.estimated_cost * factor,
            estimated_seconds: self.estimated_seconds * factor,
        }
    }
}

impl From<protocol::DryRunResponse> for CostEstimate {
    fn from(r: protocol::DryRunResponse) -> Self {
        Self {
            estimated_rows: r.estimated_rows,
            estimated_bytes: r.estimated_bytes,
            estimated_cost: r.estimated_cost,
            estimated_seconds: r.estimated_seconds,
        }
    }
}

/// Rows returned by a sample query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, in row order. Missing cells read as null.
    pub fn column_values(&self, name: &str) -> Option<Vec<&serde_json::Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).unwrap_or(&serde_json::Value::Null))
                .collect(),
        )
    }

    /// Append rows from another set with the same or a reordered column list.
    pub fn extend_from(&mut self, other: RowSet) {
        if self.columns.is_empty() {
            *self = other;
            return;
        }
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.columns.iter().position(|o| o == c))
            .collect();
        for row in other.rows {
            let aligned = mapping
                .iter()
                .map(|idx| {
                    idx.and_then(|i| row.get(i).cloned())
                        .unwrap_or(serde_json::Value::Null)
                })
                .collect();
            self.rows.push(aligned);
        }
    }
}

impl From<protocol::ExecuteQueryResponse> for RowSet {
    fn from(r: protocol::ExecuteQueryResponse) -> Self {
        Self {
            columns: r.columns.into_iter().map(|c| c.name).collect(),
            rows: r.rows,
        }
    }
}
