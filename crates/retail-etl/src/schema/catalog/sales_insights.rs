//! Sales and product catalog feeding the insights tables.

use crate::schema::{Check, ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

pub const SALES_BUCKETS: [&str; 3] = ["low", "medium", "high"];
pub const VALUE_BUCKETS: [&str; 3] = ["Low Performer", "Average", "Bestseller"];

pub static SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("insights_sales_input")
        .column(ColumnSpec::new("sales_id", ScalarType::Int))
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("region", ScalarType::Str).nullable())
        .column(ColumnSpec::new("quantity", ScalarType::Int))
        .column(ColumnSpec::new("price", ScalarType::Float))
        .column(ColumnSpec::new("timestamp", ScalarType::Str).nullable())
});

pub static SALES_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("insights_sales_output")
        .column(ColumnSpec::new("sales_id", ScalarType::Int))
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("region", ScalarType::Str).check(Check::IsLower))
        .column(ColumnSpec::new("quantity", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("price", ScalarType::Float).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("timestamp", ScalarType::DateTime))
        .column(ColumnSpec::new("total_sales", ScalarType::Float).check(Check::Ge(0.0)))
});

pub static PRODUCTS_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("insights_products_input")
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("category", ScalarType::Str).nullable())
        .column(ColumnSpec::new("brand", ScalarType::Str).nullable())
        .column(ColumnSpec::new("rating", ScalarType::Float))
});

pub static PRODUCTS_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("insights_products_output")
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("category", ScalarType::Str).nullable().check(Check::IsLower))
        .column(ColumnSpec::new("brand", ScalarType::Str).nullable().check(Check::IsUpper))
        .column(ColumnSpec::new("rating", ScalarType::Float))
});

pub static ENRICHED_SALES: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("enriched_sales")
        .column(
            ColumnSpec::new("month", ScalarType::Str)
                .check(Check::matches(r"^\d{4}-\d{2}$").expect("Invalid regex: month")),
        )
        .column(ColumnSpec::new("week", ScalarType::Int).check(Check::InRange { min: 1.0, max: 53.0 }))
        .column(ColumnSpec::new("weekday", ScalarType::Str))
        .column(ColumnSpec::new("hour", ScalarType::Int).check(Check::InRange { min: 0.0, max: 23.0 }))
        .column(ColumnSpec::new("sales_bucket", ScalarType::Str).check(Check::is_in(SALES_BUCKETS)))
});

pub static HOURLY_TREND: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("hourly_sales_trend")
        .column(ColumnSpec::new("region", ScalarType::Str).check(Check::NonEmpty))
        .column(ColumnSpec::new("category", ScalarType::Str))
        .column(ColumnSpec::new("hour", ScalarType::Int).check(Check::InRange { min: 0.0, max: 23.0 }))
        .column(ColumnSpec::new("hourly_total_sales", ScalarType::Float).check(Check::Ge(0.0)))
});

pub static PRODUCT_RANKING: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("product_sales_ranking")
        .column(ColumnSpec::new("brand", ScalarType::Str))
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("revenue", ScalarType::Float).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("sales_count", ScalarType::Int).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("value_bucket", ScalarType::Str).check(Check::is_in(VALUE_BUCKETS)))
        .column(ColumnSpec::new("brand_rank", ScalarType::Int).check(Check::Ge(1.0)))
});

pub static SEASONAL_PATTERN: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("seasonal_sales_pattern")
        .column(
            ColumnSpec::new("quarter", ScalarType::Str)
                .check(Check::matches(r"^\d{4}Q[1-4]$").expect("Invalid regex: quarter")),
        )
        .column(ColumnSpec::new("category", ScalarType::Str))
        .column(ColumnSpec::new("total_sales", ScalarType::Float).check(Check::Ge(0.0)))
});

pub static REVENUE_CONCENTRATION: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("revenue_concentration")
        .column(ColumnSpec::new("region", ScalarType::Str).check(Check::NonEmpty))
        .column(ColumnSpec::new("region_revenue", ScalarType::Float).check(Check::Ge(0.0)))
        .column(
            ColumnSpec::new("revenue_share", ScalarType::Float)
                .check(Check::InRange { min: 0.0, max: 1.0 }),
        )
        .column(
            ColumnSpec::new("cumulative_share", ScalarType::Float)
                .check(Check::InRange { min: 0.0, max: 1.0 }),
        )
});
