//! Labelled interval bucketing over absolute edges (`cut`) or quantiles
//! (`qcut`).

use crate::error::{EtlError, Result};
use crate::utils::f64_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Which side of each interval is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Closed {
    /// `(a, b]`: a value on an edge lands in the lower bucket.
    #[default]
    Right,
    /// `[a, b)`: a value on an edge lands in the upper bucket.
    Left,
}

fn validate(edges: &[f64], labels: &[&str]) -> Result<()> {
    if edges.len() < 2 {
        return Err(EtlError::InvalidBuckets(
            "at least two edges are required".to_string(),
        ));
    }
    if labels.len() != edges.len() - 1 {
        return Err(EtlError::InvalidBuckets(format!(
            "{} labels given for {} intervals",
            labels.len(),
            edges.len() - 1
        )));
    }
    if edges.iter().any(|e| e.is_nan()) {
        return Err(EtlError::InvalidBuckets("edges must not be NaN".to_string()));
    }
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(EtlError::InvalidBuckets(format!(
            "edges must increase strictly, got {edges:?}"
        )));
    }
    Ok(())
}

fn bucket_index(v: f64, edges: &[f64], closed: Closed, include_lowest: bool) -> Option<usize> {
    if include_lowest && v == edges[0] {
        return Some(0);
    }
    edges.windows(2).position(|w| match closed {
        Closed::Right => v > w[0] && v <= w[1],
        Closed::Left => v >= w[0] && v < w[1],
    })
}

/// Assign each value the label of the interval it falls in.
///
/// Values outside every interval and nulls get no label.
pub fn cut(
    values: &[Option<f64>],
    edges: &[f64],
    labels: &[&str],
    closed: Closed,
) -> Result<Vec<Option<String>>> {
    validate(edges, labels)?;
    Ok(values
        .iter()
        .map(|v| {
            v.filter(|v| !v.is_nan())
                .and_then(|v| bucket_index(v, edges, closed, false))
                .map(|i| labels[i].to_string())
        })
        .collect())
}

/// Quantile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending and non-empty.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Edges at the given quantiles of the non-null values.
pub fn quantile_edges(values: &[Option<f64>], quantiles: &[f64]) -> Result<Vec<f64>> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Err(EtlError::InvalidBuckets(
            "cannot compute quantiles of an empty column".to_string(),
        ));
    }
    sorted.sort_by(f64::total_cmp);
    Ok(quantiles.iter().map(|&q| quantile(&sorted, q)).collect())
}

/// Bucket values by quantiles; the lowest value belongs to the first bucket.
///
/// Duplicate edges (too few distinct values for the requested quantiles)
/// are rejected.
pub fn qcut(
    values: &[Option<f64>],
    quantiles: &[f64],
    labels: &[&str],
) -> Result<Vec<Option<String>>> {
    let edges = quantile_edges(values, quantiles)?;
    validate(&edges, labels).map_err(|e| match e {
        EtlError::InvalidBuckets(reason) => EtlError::InvalidBuckets(format!(
            "quantile edges are not unique ({reason})"
        )),
        other => other,
    })?;
    Ok(values
        .iter()
        .map(|v| {
            v.filter(|v| !v.is_nan())
                .and_then(|v| bucket_index(v, &edges, Closed::Right, true))
                .map(|i| labels[i].to_string())
        })
        .collect())
}

/// Append `cut` labels of `column` as `out`.
pub fn with_cut(
    mut df: DataFrame,
    column: &str,
    out: &str,
    edges: &[f64],
    labels: &[&str],
    closed: Closed,
) -> Result<DataFrame> {
    let buckets = cut(&f64_values(&df, column)?, edges, labels, closed)?;
    df.with_column(Series::new(out.into(), buckets))?;
    Ok(df)
}

/// Append `qcut` labels of `column` as `out`.
pub fn with_qcut(
    mut df: DataFrame,
    column: &str,
    out: &str,
    quantiles: &[f64],
    labels: &[&str],
) -> Result<DataFrame> {
    let buckets = qcut(&f64_values(&df, column)?, quantiles, labels)?;
    df.with_column(Series::new(out.into(), buckets))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn as_strs(v: &[Option<String>]) -> Vec<Option<&str>> {
        v.iter().map(|l| l.as_deref()).collect()
    }

    #[test]
    fn test_right_closed_boundary_goes_low() {
        let out = cut(
            &[Some(100.0), Some(100.5), Some(500.0), Some(-1.0), None],
            &[-1.0, 100.0, 500.0, f64::INFINITY],
            &["low", "medium", "high"],
            Closed::Right,
        )
        .unwrap();
        assert_eq!(
            as_strs(&out),
            vec![Some("low"), Some("medium"), Some("medium"), None, None]
        );
    }

    #[test]
    fn test_left_closed_boundary_goes_high() {
        let out = cut(
            &[Some(50.0), Some(0.0), Some(200.0)],
            &[0.0, 50.0, 200.0, f64::INFINITY],
            &["low", "medium", "high"],
            Closed::Left,
        )
        .unwrap();
        assert_eq!(as_strs(&out), vec![Some("medium"), Some("low"), Some("high")]);
    }

    #[test]
    fn test_customer_segments() {
        let out = cut(
            &[Some(999.0), Some(1000.0), Some(7500.0), Some(25_000.0)],
            &[0.0, 1000.0, 5000.0, 10_000.0, f64::INFINITY],
            &["Low", "Medium", "High", "VIP"],
            Closed::Right,
        )
        .unwrap();
        assert_eq!(
            as_strs(&out),
            vec![Some("Low"), Some("Low"), Some("High"), Some("VIP")]
        );
    }

    #[test]
    fn test_invalid_edges_and_labels() {
        let values = [Some(1.0)];
        assert!(matches!(
            cut(&values, &[0.0, 0.0, 1.0], &["a", "b"], Closed::Right),
            Err(EtlError::InvalidBuckets(_))
        ));
        assert!(matches!(
            cut(&values, &[0.0, 1.0], &["a", "b"], Closed::Right),
            Err(EtlError::InvalidBuckets(_))
        ));
    }

    #[test]
    fn test_linear_quantiles() {
        let sorted = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(quantile(&sorted, 0.0), 10.0);
        assert!((quantile(&sorted, 0.2) - 18.0).abs() < 1e-9);
        assert!((quantile(&sorted, 0.8) - 42.0).abs() < 1e-9);
        assert_eq!(quantile(&sorted, 1.0), 50.0);
    }

    #[test]
    fn test_qcut_includes_lowest_value() {
        let values: Vec<Option<f64>> = [30.0, 10.0, 50.0, 20.0, 40.0].into_iter().map(Some).collect();
        let out = qcut(
            &values,
            &[0.0, 0.2, 0.8, 1.0],
            &["Low Performer", "Average", "Bestseller"],
        )
        .unwrap();
        assert_eq!(
            as_strs(&out),
            vec![
                Some("Average"),
                Some("Low Performer"),
                Some("Bestseller"),
                Some("Average"),
                Some("Average"),
            ]
        );
    }

    #[test]
    fn test_qcut_rejects_duplicate_edges() {
        let values = vec![Some(5.0); 4];
        let err = qcut(&values, &[0.0, 0.5, 1.0], &["a", "b"]).unwrap_err();
        assert!(err.to_string().contains("not unique"));
    }
}
