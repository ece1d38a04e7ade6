//! WorkerIntrospector implementation.
//!
//! This module provides the primary Introspector implementation that
//! uses the WorkerClient for async RPC calls to the worker sidecar.

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::{Introspector, MetadataResult};
use super::{ColumnDescriptor, CostEstimate, PartitionInfo, RowSet, TableHandle};
use crate::sampling::SampleQuery;
use crate::worker::protocol::{self, methods, ConnectionParams, TableRefParams};
use crate::worker::WorkerClient;

/// Introspector implementation that uses the WorkerClient.
///
/// # Example
///
/// ```ignore
/// use tablescribe::worker::WorkerClient;
/// use tablescribe::metadata::WorkerIntrospector;
///
/// let client = WorkerClient::spawn("./tablescribe-worker").await?;
/// let introspector = WorkerIntrospector::new(
///     Arc::new(client),
///     "bigquery",
///     "bigquery://my-project",
/// );
///
/// let columns = introspector.list_columns(&table).await?;
/// ```
pub struct WorkerIntrospector {
    client: Arc<WorkerClient>,
    connection: ConnectionParams,
    /// Statement timeout forwarded with sample queries.
    query_timeout_seconds: Option<u64>,
}

impl WorkerIntrospector {
    /// Create a new WorkerIntrospector.
    ///
    /// # Arguments
    ///
    /// * `client` - The worker client (shared reference).
    /// * `driver` - Database driver name (e.g., "bigquery", "duckdb").
    /// * `connection_string` - Driver-specific connection string.
    pub fn new(
        client: Arc<WorkerClient>,
        driver: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            client,
            connection: ConnectionParams {
                driver: driver.into(),
                connection_string: connection_string.into(),
            },
            query_timeout_seconds: None,
        }
    }

    /// Forward a statement timeout with every sample query.
    pub fn with_query_timeout(mut self, seconds: u64) -> Self {
        self.query_timeout_seconds = Some(seconds);
        self
    }

    /// Get the driver name.
    pub fn driver(&self) -> &str {
        &self.connection.driver
    }

    fn table_params(table: &TableHandle) -> TableRefParams {
        TableRefParams {
            database: table.database.clone(),
            schema: table.schema.clone(),
            table: table.name.clone(),
        }
    }

    fn query_params(&self, query: &SampleQuery) -> protocol::QueryParams {
        protocol::QueryParams {
            connection: self.connection.clone(),
            sql: query.sql.clone(),
            max_rows: Some(query.limit),
            timeout_seconds: self.query_timeout_seconds,
        }
    }
}

#[async_trait]
impl Introspector for WorkerIntrospector {
    async fn list_columns(&self, table: &TableHandle) -> MetadataResult<Vec<ColumnDescriptor>> {
        let response: protocol::GetColumnsResponse = self
            .client
            .request(
                methods::GET_COLUMNS,
                protocol::GetColumnsParams {
                    connection: self.connection.clone(),
                    table: Self::table_params(table),
                },
            )
            .await?;

        Ok(response.columns.into_iter().map(Into::into).collect())
    }

    async fn get_partition_info(&self, table: &TableHandle) -> MetadataResult<PartitionInfo> {
        let response: protocol::PartitionInfoResponse = self
            .client
            .request(
                methods::GET_PARTITION_INFO,
                protocol::GetPartitionInfoParams {
                    connection: self.connection.clone(),
                    table: Self::table_params(table),
                },
            )
            .await?;

        Ok(response.into())
    }

    async fn dry_run_cost(&self, query: &SampleQuery) -> MetadataResult<CostEstimate> {
        let response: protocol::DryRunResponse = self
            .client
            .request(methods::DRY_RUN, self.query_params(query))
            .await?;

        Ok(response.into())
    }

    async fn execute_sample(&self, query: &SampleQuery) -> MetadataResult<RowSet> {
        let response: protocol::ExecuteQueryResponse = self
            .client
            .request(methods::EXECUTE_QUERY, self.query_params(query))
            .await?;

        Ok(response.into())
    }
}
