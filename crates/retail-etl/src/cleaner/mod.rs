//! Per-table cleaning.
//!
//! This module provides functionality for:
//! - Normalising header names and renaming columns
//! - Parsing fixed or mixed date layouts (invalid values become null)
//! - Dropping nulls and duplicates
//! - Filtering on numeric predicates
//! - Deriving computed columns such as revenue

mod columns;
mod dates;

pub use columns::{
    HeaderStyle, cast_int, ensure_not_empty, fill_null_float, fill_null_int, filter_positive,
    lowercase, map_strings, normalize_headers, rename_columns, select_columns, uppercase,
    with_product, with_ratio,
};
pub use dates::{DateFormat, fill_null_dates, parse_date_column, parse_dates};
pub use crate::utils::{drop_duplicates, drop_nulls};
