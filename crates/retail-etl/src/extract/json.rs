//! JSON documents to tables.
//!
//! Accepts a records array (`[{"a": 1}, ...]`) or the `split` layout
//! (`{"columns": [...], "data": [[...], ...]}`). Nested objects are flattened
//! with `.`-joined names. Column types are inferred from the non-null values:
//! all booleans, all integers, any float, otherwise strings.

use crate::error::{EtlError, Result};
use polars::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Flatten nested objects into `parent.child` keys.
pub fn flatten_record(record: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into("", record, &mut flat);
    flat
}

fn flatten_into(prefix: &str, record: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in record {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(&name, inner, out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}

fn column_from_values(name: &str, values: &[Value]) -> Column {
    let present = || values.iter().filter(|v| !v.is_null());

    if present().all(Value::is_boolean) && present().next().is_some() {
        let data: Vec<Option<bool>> = values.iter().map(Value::as_bool).collect();
        return Series::new(name.into(), data).into();
    }
    if present().all(|v| v.is_i64() || v.is_u64()) && present().next().is_some() {
        let data: Vec<Option<i64>> = values.iter().map(Value::as_i64).collect();
        return Series::new(name.into(), data).into();
    }
    if present().all(Value::is_number) && present().next().is_some() {
        let data: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        return Series::new(name.into(), data).into();
    }
    let data: Vec<Option<String>> = values
        .iter()
        .map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect();
    Series::new(name.into(), data).into()
}

/// Build a table from flat or nested records; missing keys become null.
///
/// Columns keep the order in which their key first appears.
pub fn records_to_table(records: &[Map<String, Value>]) -> Result<DataFrame> {
    let flat: Vec<Map<String, Value>> = records.iter().map(flatten_record).collect();

    let mut order: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for record in &flat {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                order.push(key.clone());
            }
        }
    }

    let columns: Vec<Column> = order
        .iter()
        .map(|name| {
            let values: Vec<Value> = flat
                .iter()
                .map(|r| r.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            column_from_values(name, &values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Convert a parsed JSON document into a table.
pub fn value_to_table(value: &Value) -> Result<DataFrame> {
    match value {
        Value::Array(items) => {
            let records = items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map.clone()),
                    other => Err(EtlError::read_failed(
                        "json",
                        format!("expected an object per record, got {other}"),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            records_to_table(&records)
        }
        Value::Object(map) if map.contains_key("columns") && map.contains_key("data") => {
            split_to_table(map)
        }
        Value::Object(map) => records_to_table(std::slice::from_ref(map)),
        other => Err(EtlError::read_failed(
            "json",
            format!("unsupported JSON document: {other}"),
        )),
    }
}

fn split_to_table(map: &Map<String, Value>) -> Result<DataFrame> {
    let columns: Vec<String> = map
        .get("columns")
        .and_then(Value::as_array)
        .ok_or_else(|| EtlError::read_failed("json", "'columns' must be an array"))?
        .iter()
        .map(|c| match c {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    let rows = map
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| EtlError::read_failed("json", "'data' must be an array"))?;

    let records = rows
        .iter()
        .map(|row| {
            let cells = row
                .as_array()
                .ok_or_else(|| EtlError::read_failed("json", "each 'data' row must be an array"))?;
            if cells.len() != columns.len() {
                return Err(EtlError::read_failed(
                    "json",
                    format!("row has {} cells for {} columns", cells.len(), columns.len()),
                ));
            }
            Ok(columns.iter().cloned().zip(cells.iter().cloned()).collect())
        })
        .collect::<Result<Vec<Map<String, Value>>>>()?;

    if records.is_empty() {
        let empty: Vec<Column> = columns
            .iter()
            .map(|c| Series::new(c.as_str().into(), Vec::<Option<String>>::new()).into())
            .collect();
        return Ok(DataFrame::new(empty)?);
    }
    records_to_table(&records)
}

/// Explode `record_path` of each record into rows, carrying `meta` fields.
///
/// Records without the path contribute no rows.
pub fn normalize_nested(value: &Value, record_path: &str, meta: &[&str]) -> Result<DataFrame> {
    let parents = value
        .as_array()
        .ok_or_else(|| EtlError::read_failed("json", "expected a top-level array"))?;

    let mut rows = Vec::new();
    for parent in parents {
        let Some(parent) = parent.as_object() else {
            continue;
        };
        let Some(children) = parent.get(record_path).and_then(Value::as_array) else {
            continue;
        };
        for child in children {
            let mut row = match child {
                Value::Object(map) => map.clone(),
                other => {
                    let mut map = Map::new();
                    map.insert(record_path.to_string(), other.clone());
                    map
                }
            };
            for key in meta {
                row.insert(
                    key.to_string(),
                    parent.get(*key).cloned().unwrap_or(Value::Null),
                );
            }
            rows.push(row);
        }
    }
    records_to_table(&rows)
}
