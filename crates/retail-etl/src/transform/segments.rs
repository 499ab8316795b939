//! Row and customer segmentation plus monthly rollups.

use super::bucketing::{Closed, with_cut};
use super::calendar::with_month_end;
use super::group::{group_agg, group_sum, n_unique_as, sum_as};
use super::merge::{JoinKind, join_on};
use crate::error::Result;
use crate::schema::catalog::sales_analysis::SEGMENTS;
use crate::utils::{drop_nulls, i64_values, require_columns};
use polars::prelude::*;
use tracing::info;

/// Spend edges for [`SEGMENTS`], right-closed.
pub const SEGMENT_EDGES: [f64; 5] = [0.0, 1000.0, 5000.0, 10_000.0, f64::INFINITY];

/// Shipping times below this many days are `fast`.
pub const FAST_DELIVERY_DAYS: i64 = 3;
/// Shipping times above this many days are `slow`.
pub const SLOW_DELIVERY_DAYS: i64 = 10;

/// Monthly totals of `total_revenue` and distinct customers.
///
/// Orders are bucketed by the last day of their month; `order_date` in the
/// output holds that month end. Months without orders are not emitted.
pub fn monthly_aggregates(df: &DataFrame) -> Result<DataFrame> {
    require_columns(df, &["order_date", "total_revenue", "customer_id"])?;
    let bucketed = with_month_end(df.clone(), "order_date", "month_end")?;

    let mut monthly = group_agg(
        &bucketed,
        &["month_end"],
        vec![
            sum_as("total_revenue", "total_sales"),
            n_unique_as("customer_id", "unique_customers"),
        ],
    )?;
    monthly.rename("month_end", "order_date".into())?;

    info!("Aggregated sales into {} months", monthly.height());
    Ok(monthly)
}

/// Segment customers by their total spend.
///
/// Spend is summed per `customer_id` over `sales`, joined onto `customers`
/// (customers without orders are dropped), bucketed into [`SEGMENTS`] and
/// stamped with the customer's `signup_date` as `segmentation_date`.
pub fn segment_customers(sales: &DataFrame, customers: &DataFrame) -> Result<DataFrame> {
    require_columns(sales, &["customer_id", "total_revenue"])?;
    require_columns(customers, &["customer_id", "signup_date"])?;

    let spend = group_sum(sales, &["customer_id"], "total_revenue", "total_spent")?;

    let joined = join_on(customers, &spend, "customer_id", JoinKind::Left)?;
    let joined = drop_nulls(&joined, Some(&["total_spent"]))?;

    let mut segmented = with_cut(
        joined,
        "total_spent",
        "customer_segment",
        &SEGMENT_EDGES,
        &SEGMENTS,
        Closed::Right,
    )?;
    let signup = segmented.column("signup_date")?.clone();
    segmented.with_column(signup.with_name("segmentation_date".into()))?;

    info!("Segmented {} customers", segmented.height());
    Ok(segmented)
}

/// Delivery speed label for a shipping time; unknown times are `standard`.
pub fn delivery_category(shipping_days: Option<i64>) -> &'static str {
    match shipping_days {
        Some(days) if days < FAST_DELIVERY_DAYS => "fast",
        Some(days) if days > SLOW_DELIVERY_DAYS => "slow",
        _ => "standard",
    }
}

/// Append `delivery_category` from `shipping_days`.
pub fn segment_deliveries(mut df: DataFrame) -> Result<DataFrame> {
    let labels: Vec<&str> = i64_values(&df, "shipping_days")?
        .into_iter()
        .map(delivery_category)
        .collect();
    df.with_column(Series::new("delivery_category".into(), labels))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{datetime_series, f64_values, naive_to_millis, str_values};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn millis(y: i32, m: u32, d: u32) -> Option<i64> {
        Some(naive_to_millis(
            &NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_monthly_aggregates() {
        let dates = datetime_series(
            "order_date",
            vec![millis(2024, 1, 3), millis(2024, 1, 20), millis(2024, 3, 1), millis(2024, 1, 31)],
        )
        .unwrap();
        let mut df = df!(
            "customer_id" => [1i64, 2, 1, 1],
            "total_revenue" => [10.0, 5.0, 7.0, 1.0]
        )
        .unwrap();
        df.with_column(dates).unwrap();

        let out = monthly_aggregates(&df).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(
            crate::utils::millis_values(&out, "order_date").unwrap(),
            vec![millis(2024, 1, 31), millis(2024, 3, 31)]
        );
        assert_eq!(f64_values(&out, "total_sales").unwrap(), vec![Some(16.0), Some(7.0)]);
        assert_eq!(
            i64_values(&out, "unique_customers").unwrap(),
            vec![Some(2), Some(1)]
        );
    }

    #[test]
    fn test_segment_customers_drops_customers_without_orders() {
        let sales = df!(
            "customer_id" => [1i64, 1, 2],
            "total_revenue" => [600.0, 600.0, 12_000.0]
        )
        .unwrap();
        let mut customers = df!("customer_id" => [1i64, 2, 3]).unwrap();
        customers
            .with_column(
                datetime_series("signup_date", vec![millis(2023, 1, 1), millis(2023, 2, 1), millis(2023, 3, 1)])
                    .unwrap(),
            )
            .unwrap();

        let out = segment_customers(&sales, &customers).unwrap();
        let out = out.sort(["customer_id"], SortMultipleOptions::default()).unwrap();

        assert_eq!(i64_values(&out, "customer_id").unwrap(), vec![Some(1), Some(2)]);
        assert_eq!(
            str_values(&out, "customer_segment").unwrap(),
            vec![Some("Medium".to_string()), Some("VIP".to_string())]
        );
        assert_eq!(
            crate::utils::millis_values(&out, "segmentation_date").unwrap(),
            vec![millis(2023, 1, 1), millis(2023, 2, 1)]
        );
    }

    #[test]
    fn test_delivery_boundaries() {
        assert_eq!(delivery_category(Some(2)), "fast");
        assert_eq!(delivery_category(Some(3)), "standard");
        assert_eq!(delivery_category(Some(10)), "standard");
        assert_eq!(delivery_category(Some(11)), "slow");
        assert_eq!(delivery_category(None), "standard");
    }

    #[test]
    fn test_segment_deliveries_requires_shipping_days() {
        let df = df!("order_id" => [1i64]).unwrap();
        assert!(segment_deliveries(df).is_err());
    }
}
