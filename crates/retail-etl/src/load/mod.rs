//! Writing finished tables to storage, local files and the warehouse.
//!
//! This module provides functionality for:
//! - Serializing a table as CSV (header, no index), JSON records or Parquet
//! - Putting the serialized bytes into an object store
//! - Writing local output files
//! - Replacing or upserting warehouse tables

mod warehouse;

pub use warehouse::{
    MemoryWarehouse, RecordingExecutor, SqlExecutor, SqlWarehouse, TableTarget, Warehouse,
    WriteMode, create_table_sql, insert_sql, sql_literal, sql_type,
};

use crate::error::{EtlError, Result};
use crate::extract::{ObjectStore, s3_path};
use crate::types::FileFormat;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Serialize a table in the given format.
pub fn write_table(table: &DataFrame, format: FileFormat) -> Result<Vec<u8>> {
    let mut df = table.clone();
    let mut buf: Vec<u8> = Vec::new();
    match format {
        FileFormat::Csv => {
            CsvWriter::new(&mut buf).include_header(true).finish(&mut df)?;
        }
        FileFormat::Json => {
            JsonWriter::new(&mut buf)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)?;
        }
        FileFormat::Parquet => {
            ParquetWriter::new(&mut buf).finish(&mut df)?;
        }
    }
    Ok(buf)
}

/// Serialize `table` and put it at `bucket/key`.
pub fn load_to_store(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    format: FileFormat,
    table: &DataFrame,
) -> Result<()> {
    let path = s3_path(bucket, key);
    info!("Loading {} rows to {}", table.height(), path);
    let bytes = write_table(table, format).map_err(|e| {
        error!("Error serializing table for {}: {}", path, e);
        EtlError::write_failed(&path, e)
    })?;
    store.put(bucket, key, bytes).inspect_err(|e| error!("Error loading {}: {}", path, e))?;
    info!("Loaded data to {}", path);
    Ok(())
}

/// Write `table` to `dir/file_name.<ext>`, creating `dir` first.
///
/// Returns the written path.
pub fn load_local(
    dir: impl AsRef<Path>,
    file_name: &str,
    format: FileFormat,
    table: &DataFrame,
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| EtlError::write_failed(dir.display().to_string(), e))?;
    let path = dir.join(format!("{file_name}.{}", format.extension()));
    let target = path.display().to_string();

    let bytes = write_table(table, format).map_err(|e| EtlError::write_failed(&target, e))?;
    fs::write(&path, bytes).map_err(|e| {
        error!("Error loading data to {}: {}", target, e);
        EtlError::write_failed(&target, e)
    })?;
    info!("Loaded {} to {}", file_name, target);
    Ok(path)
}
