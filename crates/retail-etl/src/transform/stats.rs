//! Descriptive statistics, z-score anomalies and rolling means.

use crate::error::Result;
use crate::utils::{f64_values, filter_rows};
use polars::prelude::*;
use tracing::{debug, info};

/// Number of standard deviations below the mean that marks an anomaly.
pub const ANOMALY_SIGMAS: f64 = 3.0;

/// Arithmetic mean, `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// `mean - 3 * sigma` over the values, `None` for empty input.
///
/// With near-zero variance the threshold sits right under the mean.
pub fn anomaly_threshold(values: &[f64]) -> Option<f64> {
    Some(mean(values)? - ANOMALY_SIGMAS * population_std(values)?)
}

/// Rows whose `column` value lies strictly below [`anomaly_threshold`].
///
/// Nulls are ignored when computing the threshold and never flagged.
/// Returns the flagged rows and the threshold used.
pub fn detect_anomalies(df: &DataFrame, column: &str) -> Result<(DataFrame, Option<f64>)> {
    let values = f64_values(df, column)?;
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let threshold = anomaly_threshold(&present);

    let mask: Vec<bool> = match threshold {
        Some(t) => values.iter().map(|v| v.is_some_and(|v| v < t)).collect(),
        None => vec![false; df.height()],
    };
    let anomalies = filter_rows(df, &mask)?;

    info!(
        "Detected {} anomalies in '{}' (threshold {:?})",
        anomalies.height(),
        column,
        threshold
    );
    Ok((anomalies, threshold))
}

/// Rolling-window options for a trailing mean over `window` rows, emitted
/// once at least `min_periods` non-null values are in the window.
fn trailing_window(window: usize, min_periods: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: window.max(1),
        min_periods: min_periods.max(1),
        ..Default::default()
    }
}

/// Append a trailing rolling mean of `column` as `out`, in current row order.
pub fn with_rolling_mean(
    df: DataFrame,
    column: &str,
    window: usize,
    min_periods: usize,
    out: &str,
) -> Result<DataFrame> {
    debug!("Rolling mean of '{}' over {} rows into '{}'", column, window, out);
    Ok(df
        .lazy()
        .with_column(
            col(column)
                .cast(DataType::Float64)
                .rolling_mean(trailing_window(window, min_periods))
                .alias(out),
        )
        .collect()?)
}
