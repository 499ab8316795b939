//! Locating source objects and reading them into tables.
//!
//! This module provides functionality for:
//! - Listing object keys under a storage prefix by file format
//! - Picking the object for an entity by a name token
//! - Parsing CSV, JSON and Parquet bytes into tables
//! - Reading local JSON files, HTTP sources and relational queries

mod database;
mod json;
mod local;
mod store;

#[cfg(feature = "http")]
mod api;

#[cfg(feature = "http")]
pub use api::{BROWSER_USER_AGENT, HTTP_TIMEOUT_SECS, fetch_json_table, fetch_weather};
pub use database::{QuerySource, extract_from_database};
pub use json::{flatten_record, normalize_nested, records_to_table, value_to_table};
pub use local::{read_json_records, read_nested_json, read_local_table, scrape_current_weather};
pub use store::{LocalObjectStore, MemoryObjectStore, ObjectStore, s3_path};

use crate::error::{EtlError, Result};
use crate::types::FileFormat;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::{debug, error, info, warn};

/// Parse object bytes in the given format.
///
/// Any parser failure becomes [`EtlError::ReadFailed`] naming `source_name`.
pub fn read_table(bytes: Vec<u8>, format: FileFormat, source_name: &str) -> Result<DataFrame> {
    let parsed = match format {
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| EtlError::read_failed(source_name, e)),
        FileFormat::Json => serde_json::from_slice::<serde_json::Value>(&bytes)
            .map_err(|e| EtlError::read_failed(source_name, e))
            .and_then(|value| value_to_table(&value))
            .map_err(|e| match e {
                EtlError::ReadFailed { reason, .. } => EtlError::read_failed(source_name, reason),
                other => EtlError::read_failed(source_name, other),
            }),
        FileFormat::Parquet => ParquetReader::new(Cursor::new(bytes))
            .finish()
            .map_err(|e| EtlError::read_failed(source_name, e)),
    }?;
    debug!("Read {} rows x {} columns from {}", parsed.height(), parsed.width(), source_name);
    Ok(parsed)
}

/// Keys under `prefix` with the extension of `format`.
///
/// Fails with [`EtlError::NotFound`] when the prefix is empty or nothing
/// has the extension.
pub fn list_object_paths(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    format: FileFormat,
) -> Result<Vec<String>> {
    let keys = store.list(bucket, prefix)?;
    if keys.is_empty() {
        error!("No files found in {}", s3_path(bucket, prefix));
        return Err(EtlError::NotFound(format!(
            "no objects under {}",
            s3_path(bucket, prefix)
        )));
    }

    let matching: Vec<String> = keys.into_iter().filter(|k| format.matches(k)).collect();
    if matching.is_empty() {
        error!("No {} files found in {}", format, s3_path(bucket, prefix));
        return Err(EtlError::NotFound(format!(
            "no {} objects under {}",
            format,
            s3_path(bucket, prefix)
        )));
    }

    info!("Found {} {} files in {}", matching.len(), format, s3_path(bucket, prefix));
    Ok(matching)
}

/// First path whose lowercase form contains `token`.
pub fn select_path<'a>(paths: &'a [String], token: &str) -> Result<&'a str> {
    let token = token.to_lowercase();
    paths
        .iter()
        .find(|p| p.to_lowercase().contains(&token))
        .map(String::as_str)
        .ok_or_else(|| EtlError::NotFound(format!("no '{token}' file among {} paths", paths.len())))
}

/// Read every `format` object under `prefix`, keyed by object key.
///
/// Empty tables are skipped with a warning; a read failure is logged and
/// returned.
pub fn extract_tables(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    format: FileFormat,
) -> Result<BTreeMap<String, DataFrame>> {
    let mut tables = BTreeMap::new();
    for key in list_object_paths(store, bucket, prefix, format)? {
        let path = s3_path(bucket, &key);
        let table = store
            .get(bucket, &key)
            .and_then(|bytes| read_table(bytes, format, &path))
            .inspect_err(|e| error!("Error reading {}: {}", path, e))?;

        if table.height() == 0 {
            warn!("Skipping empty table {}", path);
            continue;
        }
        info!("Extracted {} rows from {}", table.height(), path);
        tables.insert(key, table);
    }
    Ok(tables)
}

/// Map each entity token to the first table whose key contains it.
///
/// Tokens without a matching table are left out; callers decide whether
/// that is fatal.
pub fn route_tables(
    tables: &BTreeMap<String, DataFrame>,
    tokens: &[&str],
) -> BTreeMap<String, DataFrame> {
    let mut routed = BTreeMap::new();
    for token in tokens {
        let hit = tables
            .iter()
            .find(|(key, _)| key.to_lowercase().contains(&token.to_lowercase()));
        match hit {
            Some((key, table)) => {
                debug!("Routed {} to '{}'", key, token);
                routed.insert(token.to_string(), table.clone());
            }
            None => warn!("No table found for '{}'", token),
        }
    }
    routed
}

/// Fetch a single object and parse it by its extension.
pub fn read_object(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<DataFrame> {
    let format = FileFormat::from_extension(key).ok_or_else(|| {
        EtlError::read_failed(s3_path(bucket, key), "unrecognised file extension")
    })?;
    let path = s3_path(bucket, key);
    let bytes = store.get(bucket, key)?;
    read_table(bytes, format, &path).inspect_err(|e| error!("Error reading {}: {}", path, e))
}
