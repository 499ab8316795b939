//! Raw retail exports: sales CSV and products JSON.
//!
//! Input schemas use the raw headers as they arrive (`sales id`, `qty`,
//! `Time stamp`); output schemas use the cleaned names.

use crate::schema::{Check, ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

/// Header renames applied to sales after normalisation.
pub const SALES_RENAMES: &[(&str, &str)] = &[("qty", "quantity"), ("time_stamp", "timestamp")];

pub static SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("retail_sales_input")
        .column(ColumnSpec::new("sales id", ScalarType::Int))
        .column(ColumnSpec::new("proDuct Id", ScalarType::Int))
        .column(ColumnSpec::new("Region", ScalarType::Str).nullable())
        .column(ColumnSpec::new("qty", ScalarType::Int))
        .column(ColumnSpec::new("Price", ScalarType::Float))
        .column(ColumnSpec::new("Time stamp", ScalarType::Str).nullable())
        .column(ColumnSpec::new("discount", ScalarType::Float))
        .column(ColumnSpec::new("order_status", ScalarType::Str))
});

pub static SALES_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("retail_sales_output")
        .column(ColumnSpec::new("sales_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("product_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("region", ScalarType::Str).check(Check::IsLower))
        .column(ColumnSpec::new("quantity", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("price", ScalarType::Float).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("timestamp", ScalarType::DateTime))
        .column(
            ColumnSpec::new("discount", ScalarType::Float)
                .check(Check::InRange { min: 0.0, max: 1.0 }),
        )
        .column(ColumnSpec::new("order_status", ScalarType::Str))
});

pub static PRODUCTS_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("retail_products_input")
        .column(ColumnSpec::new("product_id", ScalarType::Int))
        .column(ColumnSpec::new("category", ScalarType::Str))
        .column(ColumnSpec::new("brand", ScalarType::Str))
        .column(ColumnSpec::new("rating", ScalarType::Float))
        .column(ColumnSpec::new("in_stock", ScalarType::Bool))
        .column(ColumnSpec::new("launch_date", ScalarType::Str).nullable())
});

pub static PRODUCTS_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("retail_products_output")
        .column(ColumnSpec::new("product_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("category", ScalarType::Str).check(Check::FirstCharUpper))
        .column(
            ColumnSpec::new("brand", ScalarType::Str)
                .check(Check::matches(r"^Brand[A-Z]$").expect("Invalid regex: brand")),
        )
        .column(
            ColumnSpec::new("rating", ScalarType::Float)
                .check(Check::InRange { min: 0.0, max: 5.0 }),
        )
        .column(ColumnSpec::new("in_stock", ScalarType::Bool))
        .column(ColumnSpec::new("launch_date", ScalarType::DateTime))
});
