//! Sales, customers and products exports plus the analytics tables derived
//! from them.

use crate::schema::{Check, ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

/// Labels produced by customer segmentation, lowest spend first.
pub const SEGMENTS: [&str; 4] = ["Low", "Medium", "High", "VIP"];

pub static SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales_input")
        .column(ColumnSpec::new("order_id", ScalarType::Int).unique())
        .column(ColumnSpec::new("customer_id", ScalarType::Int))
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("order_date", ScalarType::Str))
        .column(ColumnSpec::new("amount", ScalarType::Float))
        .column(ColumnSpec::new("quantity", ScalarType::Int))
        .column(ColumnSpec::new("discount", ScalarType::Float))
        .column(ColumnSpec::new("profit", ScalarType::Float))
});

pub static SALES_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales_output")
        .column(ColumnSpec::new("order_id", ScalarType::Int).unique())
        .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("product_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .column(ColumnSpec::new("amount", ScalarType::Float).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("quantity", ScalarType::Int).check(Check::Gt(0.0)))
        .column(
            ColumnSpec::new("discount", ScalarType::Float)
                .check(Check::InRange { min: 0.0, max: 1.0 }),
        )
        .column(ColumnSpec::new("profit", ScalarType::Float))
        .column(ColumnSpec::new("total_revenue", ScalarType::Float).check(Check::Gt(0.0)))
});

pub static CUSTOMERS_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("customers_input")
        .column(ColumnSpec::new("customer_id", ScalarType::Int).unique())
});

pub static CUSTOMERS_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("customers_output")
        .column(
            ColumnSpec::new("customer_id", ScalarType::Int)
                .unique()
                .check(Check::Gt(0.0)),
        )
        .column(ColumnSpec::new("name", ScalarType::Str).check(Check::len_between(0, 100)))
        .column(
            ColumnSpec::new("email", ScalarType::Str).check(
                Check::matches(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
                    .expect("Invalid regex: email"),
            ),
        )
        .column(ColumnSpec::new("signup_date", ScalarType::DateTime))
});

pub static PRODUCTS_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("products_input")
        .column(ColumnSpec::new("product_id", ScalarType::Int).unique())
        .column(ColumnSpec::new("name", ScalarType::Str))
        .column(ColumnSpec::new("category", ScalarType::Str))
        .column(ColumnSpec::new("price", ScalarType::Float))
});

pub static PRODUCTS_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("products_output")
        .column(
            ColumnSpec::new("product_id", ScalarType::Int)
                .unique()
                .check(Check::Gt(0.0)),
        )
        .column(ColumnSpec::new("name", ScalarType::Str).check(Check::max_len(100)))
        .column(ColumnSpec::new("category", ScalarType::Str))
        .column(ColumnSpec::new("price", ScalarType::Float).check(Check::Ge(0.0)))
});

/// Columns the monthly rollup reads from the merged sales.
pub static MONTHLY_SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("monthly_sales_input")
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("total_revenue", ScalarType::Float).check(Check::Ge(0.0)))
});

pub static MONTHLY_SALES: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("monthly_sales")
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .column(ColumnSpec::new("total_sales", ScalarType::Float).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("unique_customers", ScalarType::Int).check(Check::Gt(0.0)))
});

pub static SEGMENTED_CUSTOMERS: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("segmented_customers")
        .column(
            ColumnSpec::new("customer_id", ScalarType::Int)
                .unique()
                .check(Check::Gt(0.0)),
        )
        .column(ColumnSpec::new("total_spent", ScalarType::Float).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("customer_segment", ScalarType::Str).check(Check::is_in(SEGMENTS)))
        .column(ColumnSpec::new("segmentation_date", ScalarType::DateTime))
});

pub static SALES_ANOMALIES: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales_anomalies")
        .column(ColumnSpec::new("order_id", ScalarType::Int))
        .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("product_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .column(ColumnSpec::new("total_revenue", ScalarType::Float))
});

pub static SALES_FORECAST: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales_forecast")
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .column(ColumnSpec::new("total_revenue", ScalarType::Float).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("sales_forecast", ScalarType::Float).check(Check::Ge(0.0)))
});
