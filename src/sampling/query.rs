//! Sample query construction and dialect-aware SQL rendering.
//!
//! A [`SampleQuery`] carries both the rendered SQL (what the worker sends to
//! the engine) and its structured parts (what an in-memory introspector or a
//! test needs to interpret the query without parsing SQL).

use serde::{Deserialize, Serialize};

use crate::metadata::{PartitionType, TableHandle};

/// SQL dialects the sampler can render for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Ansi,
    BigQuery,
    Postgres,
    DuckDb,
    Snowflake,
}

impl SqlDialect {
    /// Parse a dialect (or driver) name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ansi" => Some(Self::Ansi),
            "bigquery" | "bq" => Some(Self::BigQuery),
            "postgres" | "postgresql" | "redshift" => Some(Self::Postgres),
            "duckdb" | "duck" => Some(Self::DuckDb),
            "snowflake" => Some(Self::Snowflake),
            _ => None,
        }
    }

    /// Quote a single identifier.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::BigQuery => format!("`{}`", ident.replace('`', "\\`")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    fn random_fn(&self) -> &'static str {
        match self {
            Self::BigQuery => "RAND()",
            _ => "RANDOM()",
        }
    }

    fn text_type(&self) -> &'static str {
        match self {
            Self::BigQuery => "STRING",
            _ => "VARCHAR",
        }
    }

    /// Pseudo-column carrying the load time of ingestion-time partitions.
    pub fn ingestion_column(&self) -> &'static str {
        "_PARTITIONTIME"
    }

    /// Render a fully qualified table reference.
    pub fn table_ref(&self, table: &TableHandle) -> String {
        [&table.database, &table.schema, &table.name]
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| self.quote_ident(p))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Quote a string literal (single quotes doubled).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Restriction of a sample to one physical partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionFilter {
    pub partition_type: PartitionType,
    /// Partition column; `None` means the engine's ingestion pseudo-column.
    pub column: Option<String>,
    pub partition_id: String,
    /// Next partition id, used as the exclusive upper bound of integer ranges.
    pub upper_bound: Option<String>,
}

/// Restriction of a sample to one categorical value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stratum {
    pub column: String,
    /// `None` selects the NULL stratum.
    pub value: Option<String>,
}

/// Row ordering applied before the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SampleOrder {
    /// Engine-side random ordering.
    #[default]
    Random,
    /// Contiguous blocks along the clustering key.
    Clustered(Vec<String>),
}

/// What the query selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Projection {
    /// Every column (`SELECT *`).
    #[default]
    All,
    /// Distinct values of one column (stratification probe).
    Distinct(String),
}

/// A concrete sample query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleQuery {
    pub table: TableHandle,
    pub projection: Projection,
    pub partition: Option<PartitionFilter>,
    pub stratum: Option<Stratum>,
    pub order: SampleOrder,
    pub limit: u64,
    pub offset: u64,
    /// Index of this query among the spec's `num_samples` queries.
    pub sample_index: u32,
    /// Rendered SQL.
    pub sql: String,
}

impl SampleQuery {
    /// Build and render a row sample.
    pub fn rows(
        dialect: SqlDialect,
        table: &TableHandle,
        partition: Option<PartitionFilter>,
        stratum: Option<Stratum>,
        order: SampleOrder,
        limit: u64,
        sample_index: u32,
    ) -> Self {
        let offset = match order {
            SampleOrder::Clustered(_) => limit * sample_index as u64,
            SampleOrder::Random => 0,
        };
        let mut query = Self {
            table: TableHandle {
                partition_info: None,
                ..table.clone()
            },
            projection: Projection::All,
            partition,
            stratum,
            order,
            limit,
            offset,
            sample_index,
            sql: String::new(),
        };
        query.sql = query.render(dialect);
        query
    }

    /// Build and render a distinct-value probe for stratification.
    pub fn distinct_probe(
        dialect: SqlDialect,
        table: &TableHandle,
        column: &str,
        limit: u64,
    ) -> Self {
        let mut query = Self {
            table: TableHandle {
                partition_info: None,
                ..table.clone()
            },
            projection: Projection::Distinct(column.to_string()),
            partition: None,
            stratum: None,
            order: SampleOrder::Random,
            limit,
            offset: 0,
            sample_index: 0,
            sql: String::new(),
        };
        query.sql = query.render(dialect);
        query
    }

    /// Render the structured query for a dialect.
    pub fn render(&self, dialect: SqlDialect) -> String {
        let mut sql = match &self.projection {
            Projection::All => format!("SELECT * FROM {}", dialect.table_ref(&self.table)),
            Projection::Distinct(col) => format!(
                "SELECT DISTINCT {} FROM {}",
                dialect.quote_ident(col),
                dialect.table_ref(&self.table)
            ),
        };

        let mut predicates = Vec::new();
        if let Some(filter) = &self.partition {
            predicates.push(render_partition_filter(dialect, filter));
        }
        if let Some(stratum) = &self.stratum {
            let col = dialect.quote_ident(&stratum.column);
            predicates.push(match &stratum.value {
                Some(v) => format!(
                    "CAST({} AS {}) = {}",
                    col,
                    dialect.text_type(),
                    quote_literal(v)
                ),
                None => format!("{} IS NULL", col),
            });
        }
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        if matches!(self.projection, Projection::All) {
            match &self.order {
                SampleOrder::Random => {
                    sql.push_str(" ORDER BY ");
                    sql.push_str(dialect.random_fn());
                }
                SampleOrder::Clustered(cols) if !cols.is_empty() => {
                    let cols: Vec<String> = cols.iter().map(|c| dialect.quote_ident(c)).collect();
                    sql.push_str(" ORDER BY ");
                    sql.push_str(&cols.join(", "));
                }
                SampleOrder::Clustered(_) => {}
            }
        }

        sql.push_str(&format!(" LIMIT {}", self.limit));
        if self.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", self.offset));
        }
        sql
    }
}

fn render_partition_filter(dialect: SqlDialect, filter: &PartitionFilter) -> String {
    let column = match &filter.column {
        Some(c) => dialect.quote_ident(c),
        None => dialect.ingestion_column().to_string(),
    };
    let id = filter.partition_id.as_str();

    match filter.partition_type {
        PartitionType::Time | PartitionType::IngestionTime => render_time_filter(&column, id),
        PartitionType::IntegerRange => match id.parse::<i64>() {
            Ok(start) => match filter.upper_bound.as_deref().and_then(|b| b.parse::<i64>().ok()) {
                Some(end) => format!("{} >= {} AND {} < {}", column, start, column, end),
                None => format!("{} >= {}", column, start),
            },
            Err(_) => format!("{} = {}", column, quote_literal(id)),
        },
        PartitionType::None => format!("{} = {}", column, quote_literal(id)),
    }
}

/// Time partition ids follow the `YYYY[MM[DD[HH]]]` convention.
fn render_time_filter(column: &str, id: &str) -> String {
    if !id.chars().all(|c| c.is_ascii_digit()) {
        return format!("{} = {}", column, quote_literal(id));
    }
    match id.len() {
        4 => format!("EXTRACT(YEAR FROM {}) = {}", column, id),
        6 => format!(
            "EXTRACT(YEAR FROM {}) = {} AND EXTRACT(MONTH FROM {}) = {}",
            column,
            &id[..4],
            column,
            id[4..6].parse::<u32>().unwrap_or(0)
        ),
        8 => format!(
            "CAST({} AS DATE) = DATE '{}-{}-{}'",
            column,
            &id[..4],
            &id[4..6],
            &id[6..8]
        ),
        10 => format!(
            "CAST({} AS DATE) = DATE '{}-{}-{}' AND EXTRACT(HOUR FROM {}) = {}",
            column,
            &id[..4],
            &id[4..6],
            &id[6..8],
            column,
            id[8..10].parse::<u32>().unwrap_or(0)
        ),
        _ => format!("{} = {}", column, quote_literal(id)),
    }
}
