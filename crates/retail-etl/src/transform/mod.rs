//! Merging and aggregation over cleaned tables.
//!
//! This module provides functionality for:
//! - Joining cleaned tables on foreign keys
//! - Sorted group-by with sums and distinct counts
//! - Interval and quantile bucketing
//! - Anomaly thresholds and rolling means
//! - Calendar features, segmentation and revenue concentration

mod analytics;
mod bucketing;
mod calendar;
mod group;
mod merge;
mod segments;
mod stats;

pub use analytics::{
    ShareOrder, dense_rank_within, hourly_peaks, product_ranking, revenue_concentration,
    seasonal_totals,
};
pub use bucketing::{Closed, cut, qcut, quantile, quantile_edges, with_cut, with_qcut};
pub use calendar::{
    hour, iso_week, month_end, quarter_label, weekday_name, with_date_feature, with_month_end,
    year_month,
};
pub use group::{group_agg, group_sum, int_sum_as, n_unique_as, sum_as};
pub use merge::{JoinKind, join_on, merge_chain};
pub use segments::{
    FAST_DELIVERY_DAYS, SEGMENT_EDGES, SLOW_DELIVERY_DAYS, delivery_category, monthly_aggregates,
    segment_customers, segment_deliveries,
};
pub use stats::{
    ANOMALY_SIGMAS, anomaly_threshold, detect_anomalies, mean, population_std, with_rolling_mean,
};
