//! Column-level cleaning: header normalisation, renames, string casing,
//! numeric filters, null fills and derived arithmetic columns.

use crate::error::{EtlError, Result};
use crate::utils::{f64_values, filter_rows, has_column, i64_values, require_columns, series, str_values};
use polars::prelude::*;
use tracing::debug;

/// How raw header names are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderStyle {
    /// Trim, lowercase, spaces to underscores (`" Time stamp"` -> `time_stamp`).
    #[default]
    SnakeLower,
    /// Trim and replace spaces with underscores, keeping case.
    Underscored,
}

impl HeaderStyle {
    pub fn apply(&self, name: &str) -> String {
        let trimmed = name.trim();
        let cased = match self {
            Self::SnakeLower => trimmed.to_lowercase(),
            Self::Underscored => trimmed.to_string(),
        };
        cased.replace(' ', "_")
    }
}

/// Rewrite every header with `style`.
pub fn normalize_headers(mut df: DataFrame, style: HeaderStyle) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| style.apply(c.as_str()))
        .collect();
    df.set_column_names(names.iter().map(|n| n.as_str()))?;
    Ok(df)
}

/// Rename the listed columns; pairs whose source column is absent are skipped.
pub fn rename_columns(mut df: DataFrame, renames: &[(&str, &str)]) -> Result<DataFrame> {
    for (from, to) in renames {
        if has_column(&df, from) {
            df.rename(from, (*to).into())?;
            debug!("Renamed column {} to {}", from, to);
        }
    }
    Ok(df)
}

/// Apply `f` to every non-null value of a string column.
pub fn map_strings<F>(mut df: DataFrame, column: &str, f: F) -> Result<DataFrame>
where
    F: Fn(&str) -> String,
{
    let mapped: Vec<Option<String>> = str_values(&df, column)?
        .into_iter()
        .map(|v| v.map(|s| f(&s)))
        .collect();
    df.with_column(Series::new(column.into(), mapped))?;
    Ok(df)
}

/// Trim and lowercase a string column.
pub fn lowercase(df: DataFrame, column: &str) -> Result<DataFrame> {
    map_strings(df, column, |s| s.trim().to_lowercase())
}

/// Trim and uppercase a string column.
pub fn uppercase(df: DataFrame, column: &str) -> Result<DataFrame> {
    map_strings(df, column, |s| s.trim().to_uppercase())
}

/// Keep rows where every listed column is strictly positive.
///
/// Nulls never compare greater than zero, so they are dropped too.
pub fn filter_positive(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    require_columns(&df, columns)?;
    let mut keep = vec![true; df.height()];
    for column in columns {
        for (flag, value) in keep.iter_mut().zip(f64_values(&df, column)?) {
            if !value.is_some_and(|v| v > 0.0) {
                *flag = false;
            }
        }
    }
    let before = df.height();
    let out = filter_rows(&df, &keep)?;
    debug!(
        "Dropped {} rows with non-positive {:?}",
        before - out.height(),
        columns
    );
    Ok(out)
}

/// Fill nulls of an integer column and cast it to Int64.
pub fn fill_null_int(mut df: DataFrame, column: &str, value: i64) -> Result<DataFrame> {
    let filled: Vec<i64> = i64_values(&df, column)?
        .into_iter()
        .map(|v| v.unwrap_or(value))
        .collect();
    df.with_column(Series::new(column.into(), filled))?;
    Ok(df)
}

/// Fill nulls of a numeric column and cast it to Float64.
pub fn fill_null_float(mut df: DataFrame, column: &str, value: f64) -> Result<DataFrame> {
    let filled: Vec<f64> = f64_values(&df, column)?
        .into_iter()
        .map(|v| v.unwrap_or(value))
        .collect();
    df.with_column(Series::new(column.into(), filled))?;
    Ok(df)
}

/// Cast a column to Int64 (floats truncated).
pub fn cast_int(mut df: DataFrame, column: &str) -> Result<DataFrame> {
    let cast = series(&df, column)?.cast(&DataType::Int64)?;
    df.with_column(cast)?;
    Ok(df)
}

/// `out = left * right` as Float64.
pub fn with_product(mut df: DataFrame, left: &str, right: &str, out: &str) -> Result<DataFrame> {
    let product = zip_f64(&df, left, right, |a, b| Some(a * b))?;
    df.with_column(Series::new(out.into(), product))?;
    Ok(df)
}

/// `out = numerator / denominator` as Float64; a zero denominator gives null.
pub fn with_ratio(mut df: DataFrame, numerator: &str, denominator: &str, out: &str) -> Result<DataFrame> {
    let ratio = zip_f64(&df, numerator, denominator, |n, d| {
        if d == 0.0 { None } else { Some(n / d) }
    })?;
    df.with_column(Series::new(out.into(), ratio))?;
    Ok(df)
}

fn zip_f64<F>(df: &DataFrame, left: &str, right: &str, f: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    let l = f64_values(df, left)?;
    let r = f64_values(df, right)?;
    Ok(l.into_iter()
        .zip(r)
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => f(a, b),
            _ => None,
        })
        .collect())
}

/// Keep only the listed columns, in the given order.
pub fn select_columns(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    require_columns(df, columns)?;
    Ok(df.select(columns.iter().copied())?)
}

/// Fail when the table has no rows.
pub fn ensure_not_empty(df: &DataFrame, name: &str) -> Result<()> {
    if df.height() == 0 {
        return Err(EtlError::EmptyTable(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_styles() {
        assert_eq!(HeaderStyle::SnakeLower.apply(" Time stamp "), "time_stamp");
        assert_eq!(HeaderStyle::SnakeLower.apply("proDuct Id"), "product_id");
        assert_eq!(HeaderStyle::Underscored.apply(" Order Date"), "Order_Date");
    }

    #[test]
    fn test_normalize_then_rename() {
        let df = df!(
            "sales id" => [1i64],
            "qty" => [2i64],
            "Time stamp" => ["2024-01-01"]
        )
        .unwrap();
        let df = normalize_headers(df, HeaderStyle::SnakeLower).unwrap();
        let df = rename_columns(df, &[("qty", "quantity"), ("time_stamp", "timestamp"), ("absent", "x")])
            .unwrap();

        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["sales_id", "quantity", "timestamp"]);
    }

    #[test]
    fn test_filter_positive_drops_zero_negative_and_null() {
        let df = df!(
            "price" => [Some(10.0), Some(0.0), Some(5.0), None, Some(2.0)],
            "quantity" => [Some(1i64), Some(1), Some(-2), Some(1), Some(3)]
        )
        .unwrap();
        let out = filter_positive(df, &["price", "quantity"]).unwrap();

        assert_eq!(out.height(), 2);
        for v in f64_values(&out, "price").unwrap() {
            assert!(v.unwrap() > 0.0);
        }
        for v in i64_values(&out, "quantity").unwrap() {
            assert!(v.unwrap() > 0);
        }
    }

    #[test]
    fn test_lowercase_trims() {
        let df = df!("region" => [Some("  North "), None]).unwrap();
        let out = lowercase(df, "region").unwrap();
        assert_eq!(
            str_values(&out, "region").unwrap(),
            vec![Some("north".to_string()), None]
        );
    }

    #[test]
    fn test_fill_nulls() {
        let df = df!(
            "order_id" => [Some(1.0), None],
            "amount" => [None, Some(2.5)]
        )
        .unwrap();
        let df = fill_null_int(df, "order_id", -1).unwrap();
        let df = fill_null_float(df, "amount", 0.0).unwrap();

        assert_eq!(series(&df, "order_id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(i64_values(&df, "order_id").unwrap(), vec![Some(1), Some(-1)]);
        assert_eq!(f64_values(&df, "amount").unwrap(), vec![Some(0.0), Some(2.5)]);
    }

    #[test]
    fn test_product_and_ratio() {
        let df = df!(
            "amount" => [10.0, 4.0],
            "quantity" => [3i64, 0],
            "profit" => [6.0, 1.0]
        )
        .unwrap();
        let df = with_product(df, "amount", "quantity", "total_revenue").unwrap();
        let df = with_ratio(df, "profit", "total_revenue", "profit_margin").unwrap();

        assert_eq!(
            f64_values(&df, "total_revenue").unwrap(),
            vec![Some(30.0), Some(0.0)]
        );
        assert_eq!(
            f64_values(&df, "profit_margin").unwrap(),
            vec![Some(0.2), None]
        );
    }

    #[test]
    fn test_select_and_empty_checks() {
        let df = df!("a" => [1i64], "b" => [2i64]).unwrap();
        let out = select_columns(&df, &["b"]).unwrap();
        assert_eq!(out.width(), 1);
        assert!(select_columns(&df, &["c"]).is_err());

        let empty = df.head(Some(0));
        assert!(matches!(
            ensure_not_empty(&empty, "sales"),
            Err(EtlError::EmptyTable(_))
        ));
    }
}
