//! Day-first sales export loaded as a single relational table.
//!
//! Input schemas use the raw headers (`Order Date`, `Diskount`); the output
//! schema uses the cleaned names.

use crate::schema::{Check, ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

/// Header renames applied after normalisation.
pub const SALES_RENAMES: &[(&str, &str)] = &[("diskount", "discount")];

pub static SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales_etl_input")
        .column(ColumnSpec::new("Order ID", ScalarType::Int))
        .column(ColumnSpec::new("Customer ID", ScalarType::Int))
        .column(ColumnSpec::new("Order Date", ScalarType::Str).nullable())
        .column(ColumnSpec::new("Amount", ScalarType::Float).nullable())
        .column(ColumnSpec::new("Quantity", ScalarType::Int))
        .column(ColumnSpec::new("Diskount", ScalarType::Float))
});

pub static SALES_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales_etl_output")
        .column(ColumnSpec::new("order_id", ScalarType::Int))
        .column(ColumnSpec::new("customer_id", ScalarType::Int))
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .column(ColumnSpec::new("amount", ScalarType::Float).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("quantity", ScalarType::Int))
        .column(
            ColumnSpec::new("discount", ScalarType::Float)
                .check(Check::InRange { min: 0.0, max: 100.0 }),
        )
        .column(ColumnSpec::new("total_amount", ScalarType::Float))
});
