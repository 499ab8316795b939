//! Aggregated views over enriched sales: revenue concentration, peak hours,
//! product ranking and seasonal totals.

use super::bucketing::with_qcut;
use super::group::{group_agg, group_sum, int_sum_as, sum_as};
use crate::error::Result;
use crate::utils::{f64_values, require_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Row order in which the cumulative share accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareOrder {
    /// Ascending group key, as a sorted group-by emits the groups.
    #[default]
    ByKey,
    /// Largest share first (Pareto order); ties keep key order.
    ByShareDesc,
}

/// Group `df` by `dimension`, sum `measure` into `total_name`, and add
/// `revenue_share` and `cumulative_share`.
///
/// The cumulative column is the running sum of shares in `order`, so the
/// last row is 1.0 whenever the grand total is positive. A zero grand total
/// gives zero shares.
pub fn revenue_concentration(
    df: &DataFrame,
    dimension: &str,
    measure: &str,
    total_name: &str,
    order: ShareOrder,
) -> Result<DataFrame> {
    let grouped = group_sum(df, &[dimension], measure, total_name)?;
    let totals: Vec<f64> = f64_values(&grouped, total_name)?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect();
    let grand_total: f64 = totals.iter().sum();

    let shares: Vec<f64> = totals
        .iter()
        .map(|t| if grand_total == 0.0 { 0.0 } else { t / grand_total })
        .collect();

    let mut grouped = grouped;
    if order == ShareOrder::ByShareDesc {
        let mut idx: Vec<usize> = (0..shares.len()).collect();
        idx.sort_by(|&a, &b| shares[b].total_cmp(&shares[a]));
        let take = IdxCa::from_vec("idx".into(), idx.iter().map(|&i| i as IdxSize).collect());
        grouped = grouped.take(&take)?;
        let reordered: Vec<f64> = idx.iter().map(|&i| shares[i]).collect();
        return finish_shares(grouped, reordered);
    }
    finish_shares(grouped, shares)
}

fn finish_shares(mut grouped: DataFrame, shares: Vec<f64>) -> Result<DataFrame> {
    let mut running = 0.0;
    let cumulative: Vec<f64> = shares
        .iter()
        .map(|s| {
            running += s;
            running.min(1.0)
        })
        .collect();
    debug!("Computed shares for {} groups", shares.len());
    grouped.with_column(Series::new("revenue_share".into(), shares))?;
    grouped.with_column(Series::new("cumulative_share".into(), cumulative))?;
    Ok(grouped)
}

/// Sum `measure` per `(region, category, hour)` and keep, for every
/// `(region, category)`, the hour with the highest total (first on ties).
pub fn hourly_peaks(df: &DataFrame, measure: &str, out: &str) -> Result<DataFrame> {
    require_columns(df, &["region", "category", "hour", measure])?;
    let hourly = group_sum(df, &["region", "category", "hour"], measure, out)?;
    let pair = [col("region"), col("category")];

    // hourly rows are sorted by hour within each pair, so `first` breaks ties
    Ok(hourly
        .lazy()
        .filter(col(out).eq(col(out).max().over(pair.clone())))
        .group_by_stable(pair)
        .agg([col("hour").first(), col(out).first()])
        .collect()?)
}

/// Dense rank of `value` within each `group`, highest value ranked 1.
pub fn dense_rank_within(df: DataFrame, group: &str, value: &str, out: &str) -> Result<DataFrame> {
    let options = RankOptions {
        method: RankMethod::Dense,
        descending: true,
    };
    Ok(df
        .lazy()
        .with_column(
            col(value)
                .cast(DataType::Float64)
                .rank(options, None)
                .over([col(group)])
                .cast(DataType::Int64)
                .alias(out),
        )
        .collect()?)
}

/// Per-product revenue and units within brand, a quantile value bucket and
/// the revenue rank inside the brand.
pub fn product_ranking(df: &DataFrame) -> Result<DataFrame> {
    let ranking = group_agg(
        df,
        &["brand", "product_id", "category", "rating"],
        vec![sum_as("total_sales", "revenue"), int_sum_as("quantity", "sales_count")],
    )?;

    let ranking = with_qcut(
        ranking,
        "revenue",
        "value_bucket",
        &[0.0, 0.2, 0.8, 1.0],
        &crate::schema::catalog::sales_insights::VALUE_BUCKETS,
    )?;
    dense_rank_within(ranking, "brand", "revenue", "brand_rank")
}

/// Totals of `measure` per `(quarter, category)`.
pub fn seasonal_totals(df: &DataFrame, measure: &str) -> Result<DataFrame> {
    group_sum(df, &["quarter", "category"], measure, measure)
}
