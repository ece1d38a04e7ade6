//! Protocol types for worker communication.
//!
//! The worker sidecar owns the database drivers and the LLM provider SDKs.
//! Every request is a single NDJSON line carrying a [`RequestEnvelope`];
//! every reply is a [`ResponseEnvelope`] correlated by `id`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Method name (e.g., "metadata.get_columns").
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error information in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Error codes the worker is known to emit.
pub mod codes {
    pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";
    pub const QUERY_FAILED: &str = "QUERY_FAILED";
    pub const TABLE_NOT_FOUND: &str = "TABLE_NOT_FOUND";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const AUTH_FAILED: &str = "AUTH_FAILED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
    pub const WORKER_EXITED: &str = "WORKER_EXITED";
}

// ============================================================================
// Connection Parameters (included in all database requests)
// ============================================================================

/// Database connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Database driver name (e.g., "bigquery", "postgres", "duckdb").
    pub driver: String,
    /// Driver-specific connection string.
    pub connection_string: String,
}

/// Fully qualified table reference.
#[derive(Debug, Clone, Serialize)]
pub struct TableRefParams {
    /// Database / project name (may be empty).
    pub database: String,
    /// Schema / dataset name.
    pub schema: String,
    /// Table name.
    pub table: String,
}

// ============================================================================
// Metadata Request Parameters
// ============================================================================

/// Parameters for `metadata.get_columns`.
#[derive(Debug, Clone, Serialize)]
pub struct GetColumnsParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    #[serde(flatten)]
    pub table: TableRefParams,
}

/// Parameters for `metadata.get_partition_info`.
#[derive(Debug, Clone, Serialize)]
pub struct GetPartitionInfoParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    #[serde(flatten)]
    pub table: TableRefParams,
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Parameters for `query.dry_run` and `query.execute`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryParams {
    #[serde(flatten)]
    pub connection: ConnectionParams,
    /// SQL text to run.
    pub sql: String,
    /// Row cap enforced by the worker in addition to the SQL `LIMIT`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rows: Option<u64>,
    /// Server-side timeout for the statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

// ============================================================================
// LLM Parameters
// ============================================================================

/// Parameters for `llm.complete`.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteParams {
    /// Provider-specific model identifier.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Maximum completion tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Parameters for `tokens.count`.
#[derive(Debug, Clone, Serialize)]
pub struct CountTokensParams {
    /// Model whose tokenizer should be used.
    pub model: String,
    /// Text to count.
    pub text: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Column information as reported by the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Database-specific type name.
    pub data_type: String,
    /// Whether NULL values are allowed.
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    /// Column comment, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub is_primary_key: bool,
}

fn default_true() -> bool {
    true
}

/// Response from `metadata.get_columns`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetColumnsResponse {
    pub columns: Vec<ColumnInfo>,
}

/// Response from `metadata.get_partition_info`.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionInfoResponse {
    pub is_partitioned: bool,
    /// One of "time", "integer_range", "ingestion_time", "none".
    #[serde(default)]
    pub partition_type: Option<String>,
    #[serde(default)]
    pub partition_column: Option<String>,
    #[serde(default)]
    pub clustering_columns: Vec<String>,
    /// Partition identifiers, oldest first.
    #[serde(default)]
    pub partitions: Vec<String>,
}

/// Response from `query.dry_run`.
#[derive(Debug, Clone, Deserialize)]
pub struct DryRunResponse {
    /// Rows the engine expects to scan.
    #[serde(default)]
    pub estimated_rows: u64,
    /// Bytes the engine expects to scan.
    #[serde(default)]
    pub estimated_bytes: u64,
    /// Engine-specific cost unit (e.g., billed dollars, planner cost).
    #[serde(default)]
    pub estimated_cost: f64,
    /// Expected wall-clock seconds, when the engine reports one.
    #[serde(default)]
    pub estimated_seconds: f64,
}

/// Column information in query results.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResultColumn {
    /// Column name or alias.
    pub name: String,
    /// Database-specific type.
    pub data_type: String,
}

/// Response from `query.execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteQueryResponse {
    /// Result column descriptions.
    pub columns: Vec<QueryResultColumn>,
    /// Result data rows.
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Number of rows returned.
    pub row_count: i64,
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Response from `llm.complete`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteResponse {
    /// Completion text (may be empty).
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

/// Response from `tokens.count`.
#[derive(Debug, Clone, Deserialize)]
pub struct CountTokensResponse {
    pub count: usize,
}

// ============================================================================
// Method Names
// ============================================================================

/// Worker method names.
pub mod methods {
    pub const GET_COLUMNS: &str = "metadata.get_columns";
    pub const GET_PARTITION_INFO: &str = "metadata.get_partition_info";
    pub const DRY_RUN: &str = "query.dry_run";
    pub const EXECUTE_QUERY: &str = "query.execute";
    pub const LLM_COMPLETE: &str = "llm.complete";
    pub const COUNT_TOKENS: &str = "tokens.count";
}
