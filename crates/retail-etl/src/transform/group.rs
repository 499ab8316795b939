//! Sorted group-by over one or more key columns.
//!
//! Groups come out in ascending key order and rows with a null key are
//! dropped, matching what a sorted dataframe group-by produces.

use crate::error::Result;
use crate::utils::require_columns;
use polars::prelude::*;

fn key_exprs(keys: &[&str]) -> Vec<Expr> {
    keys.iter().map(|k| col(*k)).collect()
}

/// Group `df` by `keys` and evaluate `aggs` per group, sorted by key.
pub fn group_agg(df: &DataFrame, keys: &[&str], aggs: Vec<Expr>) -> Result<DataFrame> {
    require_columns(df, keys)?;
    let by = key_exprs(keys);

    let mut lf = df.clone().lazy();
    if let Some(keyed) = by.iter().cloned().map(Expr::is_not_null).reduce(Expr::and) {
        lf = lf.filter(keyed);
    }
    Ok(lf
        .group_by(by.clone())
        .agg(aggs)
        .sort_by_exprs(by, SortMultipleOptions::default())
        .collect()?)
}

/// Float sum of `value` named `out` (0 for an all-null group).
pub fn sum_as(value: &str, out: &str) -> Expr {
    col(value).cast(DataType::Float64).sum().alias(out)
}

/// Integer sum of `value` named `out`.
pub fn int_sum_as(value: &str, out: &str) -> Expr {
    col(value).cast(DataType::Int64).sum().alias(out)
}

/// Number of distinct non-null values of `value` named `out`.
pub fn n_unique_as(value: &str, out: &str) -> Expr {
    col(value)
        .drop_nulls()
        .n_unique()
        .cast(DataType::Int64)
        .alias(out)
}

/// `keys` plus one summed column, in ascending key order.
pub fn group_sum(df: &DataFrame, keys: &[&str], value: &str, out: &str) -> Result<DataFrame> {
    group_agg(df, keys, vec![sum_as(value, out)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{f64_values, i64_values, series, str_values};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_groups_sorted_and_null_keys_dropped() {
        let df = df!(
            "region" => [Some("south"), Some("north"), None, Some("south")],
            "sales" => [1.0, 2.0, 4.0, 8.0]
        )
        .unwrap();
        let out = group_sum(&df, &["region"], "sales", "total").unwrap();

        assert_eq!(
            str_values(&out, "region").unwrap(),
            vec![Some("north".to_string()), Some("south".to_string())]
        );
        assert_eq!(f64_values(&out, "total").unwrap(), vec![Some(2.0), Some(9.0)]);
    }

    #[test]
    fn test_composite_keys_keep_dtypes() {
        let df = df!(
            "brand" => ["B", "A", "B", "B"],
            "product_id" => [2i64, 1, 1, 2],
            "quantity" => [1i64, 2, 3, 4]
        )
        .unwrap();
        let out = group_agg(&df, &["brand", "product_id"], vec![int_sum_as("quantity", "units")])
            .unwrap();

        assert_eq!(out.height(), 3);
        assert_eq!(series(&out, "product_id").unwrap().dtype(), &DataType::Int64);
        assert_eq!(
            str_values(&out, "brand").unwrap(),
            vec![Some("A".to_string()), Some("B".to_string()), Some("B".to_string())]
        );
        assert_eq!(i64_values(&out, "units").unwrap(), vec![Some(2), Some(3), Some(5)]);
    }

    #[test]
    fn test_n_unique_ignores_nulls() {
        let df = df!(
            "month" => [1i64, 1, 1, 2],
            "customer_id" => [Some(7i64), Some(7), Some(8), None]
        )
        .unwrap();
        let out = group_agg(&df, &["month"], vec![n_unique_as("customer_id", "customers")]).unwrap();
        assert_eq!(i64_values(&out, "customers").unwrap(), vec![Some(2), Some(0)]);
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let df = df!("sales" => [1.0]).unwrap();
        assert!(group_sum(&df, &["region"], "sales", "total").is_err());
    }
}
