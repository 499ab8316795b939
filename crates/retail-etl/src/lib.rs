//! Retail ETL Pipelines
//!
//! Extract raw retail tables (sales, customers, products, shipping) from
//! object storage, local files, HTTP pages or a SQL source, clean them behind
//! schema gates, derive analytics and load the results into object storage
//! or a relational warehouse.
//!
//! # Overview
//!
//! - **Cleaning**: header normalisation, null handling, date-tolerant parsing
//! - **Schema gates**: an advisory check before each transform and a fatal
//!   check after it
//! - **Analytics**: anomaly detection, quantile buckets, rolling forecasts,
//!   revenue concentration, calendar features
//! - **Orchestration**: named tasks with explicit dependencies, run in
//!   topological order with progress reporting and cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use retail_etl::{EtlConfig, LocalObjectStore, MemoryWarehouse, PipelineEnv, PipelineRunner, RunContext, Workflow};
//! use std::sync::Arc;
//!
//! let config = EtlConfig::from_yaml_file("config.yaml")?;
//! let env = PipelineEnv::new(
//!     RunContext::new(config)?,
//!     Arc::new(LocalObjectStore::new("./data")),
//!     Arc::new(MemoryWarehouse::new()),
//! );
//!
//! let run = PipelineRunner::builder()
//!     .on_progress(|update| println!("[{:?}] {}", update.stage, update.message))
//!     .build()
//!     .run(&Workflow::SalesAnalysis.build(env))?;
//!
//! for table in &run.summary.tables {
//!     println!("{}: {} rows", table.name, table.rows);
//! }
//! ```
//!
//! # Storage and warehouse
//!
//! Sources and sinks sit behind the [`extract::ObjectStore`],
//! [`extract::QuerySource`] and [`load::Warehouse`] traits. The crate ships
//! a filesystem store, in-memory doubles for both, and a [`load::SqlWarehouse`]
//! that renders statements for an injected [`load::SqlExecutor`].

pub mod cleaner;
pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod schema;
pub mod transform;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{DateFormat, HeaderStyle};
pub use config::{ConfigValidationError, EtlConfig, EtlConfigBuilder, RunContext};
pub use error::{EtlError, Result as EtlResult, ResultExt};
pub use extract::{LocalObjectStore, MemoryObjectStore, ObjectStore, QuerySource};
pub use load::{
    MemoryWarehouse, RecordingExecutor, SqlExecutor, SqlWarehouse, TableTarget, Warehouse,
    WriteMode,
};
pub use pipeline::{
    Artifacts, CancellationToken, ClosureProgressReporter, PipelineEnv, PipelineRun,
    PipelineRunner, PipelineRunnerBuilder, PipelineStage, ProgressReporter, ProgressUpdate,
    RunSummary, TaskGraph, Workflow,
};
pub use schema::{GateState, TableSchema, ValidationReport, post_check, pre_check};
pub use types::FileFormat;
