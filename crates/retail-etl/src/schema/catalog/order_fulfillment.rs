//! Order fulfillment tables loaded to the warehouse.

use crate::schema::{Check, ColumnSpec, ScalarType, TableSchema};
use once_cell::sync::Lazy;

pub const DELIVERY_CATEGORIES: [&str; 3] = ["fast", "standard", "slow"];
pub const PRICE_CATEGORIES: [&str; 3] = ["low", "medium", "high"];

/// Columns kept in the upserted table, key first.
pub const TRANSFORMED_COLUMNS: [&str; 5] = [
    "order_id",
    "customer_id",
    "total_revenue",
    "profit_margin",
    "shipping_days",
];

/// Merged and enriched orders, checked before the raw load.
pub static ENRICHED_ORDERS: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("enriched_orders")
        .column(ColumnSpec::new("order_id", ScalarType::Int))
        .column(ColumnSpec::new("shipping_days", ScalarType::Int).nullable())
        .column(
            ColumnSpec::new("delivery_category", ScalarType::Str)
                .check(Check::is_in(DELIVERY_CATEGORIES)),
        )
        .column(ColumnSpec::new("total_revenue", ScalarType::Float).nullable())
        .column(ColumnSpec::new("profit_margin", ScalarType::Float).nullable())
        .column(ColumnSpec::new("discounted_price", ScalarType::Float).nullable())
        .column(
            ColumnSpec::new("product_category", ScalarType::Str)
                .nullable()
                .check(Check::is_in(PRICE_CATEGORIES)),
        )
});

/// Rows upserted on `order_id`; the key must be unique within a batch.
pub static TRANSFORMED_ORDERS: Lazy<TableSchema> = Lazy::new(|| {
    TableSchema::new("transformed_sales_data")
        .column(ColumnSpec::new("order_id", ScalarType::Int).unique())
        .column(ColumnSpec::new("customer_id", ScalarType::Int))
        .column(ColumnSpec::new("total_revenue", ScalarType::Float).nullable())
        .column(ColumnSpec::new("profit_margin", ScalarType::Float).nullable())
        .column(ColumnSpec::new("shipping_days", ScalarType::Int).nullable())
        .strict()
});
