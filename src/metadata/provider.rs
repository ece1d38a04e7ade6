//! Introspector trait definition.
//!
//! The Introspector trait abstracts over the ways this crate reaches a
//! table: the primary implementation forwards to the worker sidecar, the
//! in-memory implementation serves fixture data.

use async_trait::async_trait;

use super::types::*;
use crate::sampling::SampleQuery;
use crate::worker::WorkerError;

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, WorkerError>;

/// Capability for inspecting and sampling a table.
///
/// # Example
///
/// ```ignore
/// use tablescribe::metadata::Introspector;
///
/// async fn example(introspector: &impl Introspector, table: &TableHandle) -> MetadataResult<()> {
///     let columns = introspector.list_columns(table).await?;
///     let partitions = introspector.get_partition_info(table).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Introspector: Send + Sync {
    /// Columns of a table in declaration order.
    async fn list_columns(&self, table: &TableHandle) -> MetadataResult<Vec<ColumnDescriptor>>;

    /// Partitioning and clustering metadata.
    async fn get_partition_info(&self, table: &TableHandle) -> MetadataResult<PartitionInfo>;

    /// Estimate the cost of a query without running it.
    async fn dry_run_cost(&self, query: &SampleQuery) -> MetadataResult<CostEstimate>;

    /// Run a sample query.
    async fn execute_sample(&self, query: &SampleQuery) -> MetadataResult<RowSet>;

    /// Fetch columns and partition info together.
    ///
    /// Default implementation issues both requests concurrently.
    async fn introspect(
        &self,
        table: &TableHandle,
    ) -> MetadataResult<(Vec<ColumnDescriptor>, PartitionInfo)> {
        let (columns, partitions) =
            futures::future::join(self.list_columns(table), self.get_partition_info(table)).await;
        Ok((columns?, partitions?))
    }
}
