//! Per-region sales totals.

use crate::schema::{ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

pub static SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("regional_sales_input")
        .column(ColumnSpec::new("region", ScalarType::Str))
        .column(ColumnSpec::new("sales", ScalarType::Float))
});

pub static REGION_TOTALS: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("region_totals")
        .column(ColumnSpec::new("region", ScalarType::Str).unique())
        .column(ColumnSpec::new("sales", ScalarType::Float))
        .strict()
});
