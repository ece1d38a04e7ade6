//! Table introspection.
//!
//! Everything the pipeline learns about a physical table flows through the
//! [`Introspector`] trait: declared columns, partition layout, dry-run cost
//! estimates and sample rows.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Introspector                             │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  WorkerIntrospector         │  InMemoryIntrospector       │  │
//! │  │  - list_columns()           │  (fixture tables, offline   │  │
//! │  │  - get_partition_info()     │   runs and tests)           │  │
//! │  │  - dry_run_cost()           │                             │  │
//! │  │  - execute_sample()         │                             │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      WorkerClient                               │
//! │              (NDJSON over stdin/stdout)                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tablescribe::metadata::{Introspector, TableHandle, WorkerIntrospector};
//! use tablescribe::worker::WorkerClient;
//!
//! let client = WorkerClient::spawn("./tablescribe-worker").await?;
//! let introspector = WorkerIntrospector::new(Arc::new(client), "duckdb", "./data.duckdb");
//!
//! let table = TableHandle::parse("main.orders").unwrap();
//! let (columns, partitions) = introspector.introspect(&table).await?;
//! ```

mod memory;
mod provider;
mod types;
mod worker_provider;

pub use memory::{InMemoryIntrospector, MemoryTable};
pub use provider::{Introspector, MetadataResult};
pub use types::*;
pub use worker_provider::WorkerIntrospector;
