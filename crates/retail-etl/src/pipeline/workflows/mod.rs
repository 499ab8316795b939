//! The seven ETL workflows, each built as a [`TaskGraph`].
//!
//! A workflow is a set of pure table transforms (public, unit tested) plus a
//! `build` function wiring them into tasks over a [`PipelineEnv`].

pub mod file_formats;
pub mod order_fulfillment;
pub mod regional_sales;
pub mod retail;
pub mod sales_analysis;
pub mod sales_etl;
pub mod sales_insights;

use super::graph::TaskGraph;
use crate::config::RunContext;
use crate::error::Result;
use crate::extract::{ObjectStore, QuerySource, list_object_paths, read_object, select_path};
use crate::load::{Warehouse, WriteMode, load_to_store};
use crate::types::FileFormat;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a workflow touches outside its own tables.
#[derive(Clone)]
pub struct PipelineEnv {
    pub context: RunContext,
    pub store: Arc<dyn ObjectStore>,
    pub warehouse: Arc<dyn Warehouse>,
    /// Optional relational source read by the file-formats exercise.
    pub query_source: Option<Arc<dyn QuerySource>>,
}

static_assertions::assert_impl_all!(PipelineEnv: Send, Sync);

impl PipelineEnv {
    pub fn new(
        context: RunContext,
        store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            context,
            store,
            warehouse,
            query_source: None,
        }
    }

    pub fn with_query_source(mut self, source: Arc<dyn QuerySource>) -> Self {
        self.query_source = Some(source);
        self
    }

    /// Read the first `format` object under `folder` whose key contains `token`.
    pub(crate) fn read_selected(&self, folder: &str, format: FileFormat, token: &str) -> Result<DataFrame> {
        let bucket = self.context.bucket();
        let paths = list_object_paths(self.store.as_ref(), bucket, folder, format)?;
        let key = select_path(&paths, token)?;
        read_object(self.store.as_ref(), bucket, key)
    }

    /// Put `table` at `key` in the configured bucket.
    pub(crate) fn write_object(&self, key: &str, format: FileFormat, table: &DataFrame) -> Result<()> {
        load_to_store(self.store.as_ref(), self.context.bucket(), key, format, table)
    }

    /// Write `table` to the warehouse target registered for `entity`.
    pub(crate) fn load_entity(&self, entity: &str, table: &DataFrame, mode: &WriteMode) -> Result<usize> {
        let target = self.context.target_or_default(entity);
        let rows = self.warehouse.write(&target, table, mode)?;
        info!("Loaded {} rows of '{}' into {}", rows, entity, target);
        Ok(rows)
    }

    /// Like [`load_entity`](Self::load_entity) but an empty table is skipped.
    pub(crate) fn load_entity_if_any(
        &self,
        entity: &str,
        table: &DataFrame,
        mode: &WriteMode,
    ) -> Result<usize> {
        if table.height() == 0 {
            warn!("Nothing to load for '{}', skipping", entity);
            return Ok(0);
        }
        self.load_entity(entity, table, mode)
    }
}

impl fmt::Debug for PipelineEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEnv")
            .field("context", &self.context)
            .field("query_source", &self.query_source.is_some())
            .finish_non_exhaustive()
    }
}

/// The available workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Workflow {
    Retail,
    SalesAnalysis,
    SalesInsights,
    OrderFulfillment,
    FileFormats,
    SalesEtl,
    RegionalSales,
}

impl Workflow {
    pub const ALL: [Workflow; 7] = [
        Self::Retail,
        Self::SalesAnalysis,
        Self::SalesInsights,
        Self::OrderFulfillment,
        Self::FileFormats,
        Self::SalesEtl,
        Self::RegionalSales,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::SalesAnalysis => "sales_analysis",
            Self::SalesInsights => "sales_insights",
            Self::OrderFulfillment => "order_fulfillment",
            Self::FileFormats => "file_formats",
            Self::SalesEtl => "sales_etl",
            Self::RegionalSales => "regional_sales",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Retail => "Clean raw sales and products and write them back to storage",
            Self::SalesAnalysis => {
                "Clean, merge and analyse sales, customers and products into warehouse tables"
            }
            Self::SalesInsights => "Enrich sales and write hourly, ranking and seasonal analytics",
            Self::OrderFulfillment => "Merge orders with shipping, segment deliveries and upsert",
            Self::FileFormats => "Read CSV, Parquet and JSON sources, validate and export",
            Self::SalesEtl => "Clean a day-first sales export, price discounts and replace the table",
            Self::RegionalSales => "Total sales per region and append them to the warehouse",
        }
    }

    pub fn build(&self, env: PipelineEnv) -> TaskGraph {
        match self {
            Self::Retail => retail::build(env),
            Self::SalesAnalysis => sales_analysis::build(env),
            Self::SalesInsights => sales_insights::build(env),
            Self::OrderFulfillment => order_fulfillment::build(env),
            Self::FileFormats => file_formats::build(env),
            Self::SalesEtl => sales_etl::build(env),
            Self::RegionalSales => regional_sales::build(env),
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Workflow {
    type Err = crate::error::EtlError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|w| w.name() == wanted)
            .ok_or_else(|| crate::error::EtlError::InvalidConfig(format!("unknown pipeline '{s}'")))
    }
}
