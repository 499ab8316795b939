//! File-format lab and exercise tables.
//!
//! The lab cleans sales read from CSV and Parquet. The exercise validates
//! local JSON exports and a scraped weather row against strict schemas.

use crate::schema::{Check, ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

pub static LAB_SALES_INPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("lab_sales_input")
        .column(ColumnSpec::new("order_id", ScalarType::Float).nullable())
        .column(ColumnSpec::new("customer_id", ScalarType::Float).nullable())
        .column(ColumnSpec::new("amount", ScalarType::Float).nullable())
        .column(ColumnSpec::new("quantity", ScalarType::Float).nullable())
        .column(ColumnSpec::new("order_date", ScalarType::Str).nullable())
});

pub static LAB_SALES_OUTPUT: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("lab_sales_output")
        .column(ColumnSpec::new("order_id", ScalarType::Int).check(Check::Ge(-1.0)))
        .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Ge(-1.0)))
        .column(ColumnSpec::new("amount", ScalarType::Float).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("quantity", ScalarType::Int).check(Check::Ge(0.0)))
        .column(ColumnSpec::new("order_date", ScalarType::DateTime).nullable())
        .column(ColumnSpec::new("total_revenue", ScalarType::Float).check(Check::Ge(0.0)))
});

pub static CUSTOMERS: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("customers")
        .column(
            ColumnSpec::new("customer_id", ScalarType::Int)
                .unique()
                .check(Check::Ge(0.0)),
        )
        .column(
            ColumnSpec::new("name", ScalarType::Str)
                .check(Check::matches(r"^[A-Za-z\s'-]+$").expect("Invalid regex: name")),
        )
        .column(
            ColumnSpec::new("email", ScalarType::Str).check(
                Check::matches(r"^[\w\.-]+@[\w\.-]+\.\w{2,4}$").expect("Invalid regex: email"),
            ),
        )
        .strict()
});

pub static ORDERS: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("orders")
        .column(ColumnSpec::new("order_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("product", ScalarType::Str).check(Check::len_between(1, 100)))
        .column(ColumnSpec::new("quantity", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("price", ScalarType::Float).check(Check::Gt(0.0)))
        .strict()
});

pub static SALES: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("sales")
        .column(ColumnSpec::new("order_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("amount", ScalarType::Float).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("quantity", ScalarType::Int).check(Check::Gt(0.0)))
        .column(ColumnSpec::new("order_date", ScalarType::DateTime))
        .strict()
});

pub static WEATHER: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("weather")
        .column(ColumnSpec::new("city", ScalarType::Str).check(Check::len_between(1, 100)))
        .column(ColumnSpec::new("temperature", ScalarType::Str).check(Check::len_between(1, 100)))
        .column(ColumnSpec::new("feels_like", ScalarType::Str).check(Check::len_between(1, 100)))
        .strict()
});
