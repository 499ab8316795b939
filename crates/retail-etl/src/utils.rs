//! Shared table helpers used across the cleaners, transforms and schema gate.
//!
//! Most transforms in this crate pull a column out as plain Rust values,
//! compute over them, and push a new column back. The helpers here keep that
//! round trip consistent (null handling, casting, row filtering).

use crate::error::{EtlError, Result};
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// The datetime type every parsed date column is normalised to.
pub fn datetime_ms() -> DataType {
    DataType::Datetime(TimeUnit::Milliseconds, None)
}

// =============================================================================
// Column Access
// =============================================================================

/// Borrow a column as a Series, mapping a missing column to [`EtlError::ColumnNotFound`].
pub fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| EtlError::ColumnNotFound(name.to_string()))
}

/// Check if a table carries a column.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Fail with [`EtlError::MissingColumns`] unless every column is present.
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !has_column(df, c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EtlError::MissingColumns(missing))
    }
}

/// Column values as `f64` (integers widened, non-numeric values null).
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let s = series(df, name)?;
    let cast = s.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Column values as `i64` (floats truncated).
pub fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let s = series(df, name)?;
    let cast = s.cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

/// Column values rendered as strings.
pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    series_str_values(series(df, name)?)
}

/// Series values rendered as strings.
pub fn series_str_values(s: &Series) -> Result<Vec<Option<String>>> {
    let cast = s.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(|v| v.to_string()))
        .collect())
}

/// Datetime column values as epoch milliseconds.
pub fn millis_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let s = series(df, name)?;
    if !is_datetime_dtype(s.dtype()) {
        return Err(EtlError::InvalidConfig(format!(
            "column '{name}' is {} but a datetime column is required",
            s.dtype()
        )));
    }
    let cast = s.cast(&datetime_ms())?.cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

/// Datetime column values as naive timestamps.
pub fn datetime_values(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    Ok(millis_values(df, name)?
        .into_iter()
        .map(|v| v.and_then(millis_to_naive))
        .collect())
}

/// Convert epoch milliseconds to a naive UTC timestamp.
pub fn millis_to_naive(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Convert a naive UTC timestamp to epoch milliseconds.
pub fn naive_to_millis(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

/// Build a `Datetime[ms]` series from epoch milliseconds.
pub fn datetime_series(name: &str, millis: Vec<Option<i64>>) -> Result<Series> {
    Ok(Series::new(name.into(), millis).cast(&datetime_ms())?)
}

/// Render a single cell for logs and failure reports.
pub fn display_any(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "null".to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Row Filtering
// =============================================================================

/// Keep the rows where `mask` is true.
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}

/// Column names of `subset`, checked against `df`.
fn subset_names(df: &DataFrame, subset: Option<&[&str]>) -> Result<Option<Vec<String>>> {
    match subset {
        Some(cols) => {
            require_columns(df, cols)?;
            Ok(Some(cols.iter().map(|c| c.to_string()).collect()))
        }
        None => Ok(None),
    }
}

/// Drop rows with a null in any of `subset` (every column when `None`).
pub fn drop_nulls(df: &DataFrame, subset: Option<&[&str]>) -> Result<DataFrame> {
    let names = subset_names(df, subset)?;
    Ok(df.drop_nulls(names.as_deref())?)
}

/// Drop duplicate rows keeping the first occurrence, preserving row order.
///
/// With a `subset`, rows are compared on those columns only.
pub fn drop_duplicates(df: &DataFrame, subset: Option<&[&str]>) -> Result<DataFrame> {
    let names = subset_names(df, subset)?;
    Ok(df.unique_stable(names.as_deref(), UniqueKeepStrategy::First, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_helpers() {
        assert!(is_integer_dtype(&DataType::Int32));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(is_datetime_dtype(&DataType::Date));
    }

    #[test]
    fn test_require_columns_lists_all_missing() {
        let df = df!("a" => [1i64]).unwrap();
        let err = require_columns(&df, &["a", "b", "c"]).unwrap_err();
        match err {
            EtlError::MissingColumns(cols) => assert_eq!(cols, vec!["b", "c"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_f64_values_widens_integers() {
        let df = df!("qty" => [Some(1i64), None, Some(3)]).unwrap();
        assert_eq!(f64_values(&df, "qty").unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_missing_column_maps_to_column_not_found() {
        let df = df!("a" => [1i64]).unwrap();
        assert!(matches!(
            f64_values(&df, "zzz"),
            Err(EtlError::ColumnNotFound(name)) if name == "zzz"
        ));
    }

    #[test]
    fn test_drop_nulls_subset() {
        let df = df!(
            "region" => [Some("north"), None, Some("south")],
            "note" => [None, Some("x"), None]
        )
        .unwrap();
        let out = drop_nulls(&df, Some(&["region"])).unwrap();
        assert_eq!(out.height(), 2);

        let out = drop_nulls(&df, None).unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn test_drop_duplicates_keeps_first_in_order() {
        let df = df!(
            "id" => [3i64, 1, 3, 2, 1],
            "v" => ["a", "b", "a", "c", "z"]
        )
        .unwrap();

        let out = drop_duplicates(&df, None).unwrap();
        assert_eq!(i64_values(&out, "id").unwrap(), vec![Some(3), Some(1), Some(2), Some(1)]);

        let out = drop_duplicates(&df, Some(&["id"])).unwrap();
        assert_eq!(i64_values(&out, "id").unwrap(), vec![Some(3), Some(1), Some(2)]);
    }

    #[test]
    fn test_drop_duplicates_compares_whole_values() {
        let df = df!(
            "a" => ["x\u{1f}y", "x"],
            "b" => ["z", "y\u{1f}z"]
        )
        .unwrap();
        assert_eq!(drop_duplicates(&df, None).unwrap().height(), 2);
    }

    #[test]
    fn test_drop_helpers_reject_unknown_subset() {
        let df = df!("a" => [1i64]).unwrap();
        assert!(drop_nulls(&df, Some(&["zzz"])).is_err());
        assert!(drop_duplicates(&df, Some(&["zzz"])).is_err());
    }

    #[test]
    fn test_datetime_round_trip_through_millis() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let s = datetime_series("ts", vec![Some(naive_to_millis(&dt)), None]).unwrap();
        let df = DataFrame::new(vec![s.into()]).unwrap();
        assert_eq!(datetime_values(&df, "ts").unwrap(), vec![Some(dt), None]);
    }
}
