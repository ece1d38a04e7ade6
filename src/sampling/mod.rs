//! Cost-bounded, partition-aware sampling.
//!
//! The planner turns table metadata and a [`SamplingBudget`] into
//! [`SampleSpec`]s; each spec expands into one or more [`SampleQuery`]s
//! rendered for the connection's [`SqlDialect`].
//!
//! # Example
//!
//! ```ignore
//! use tablescribe::sampling::{SamplingBudget, SamplingPlanner, SqlDialect};
//!
//! let planner = SamplingPlanner::new(introspector.clone(), SqlDialect::BigQuery);
//! let budget = SamplingBudget { max_partitions: 5, max_cost: Some(1.0), ..Default::default() };
//! let specs = planner.plan(&table, &partition_info, &budget).await?;
//! ```

mod planner;
mod query;
mod strategy;

pub use planner::SamplingPlanner;
pub use query::{
    quote_literal, PartitionFilter, Projection, SampleOrder, SampleQuery, SqlDialect, Stratum,
};
pub use strategy::{SampleSpec, SampleStrategy, SamplingBudget};
