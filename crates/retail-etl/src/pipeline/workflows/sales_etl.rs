//! Sales ETL: one day-first sales CSV cleaned, priced with its discount and
//! loaded as a warehouse table.

use super::PipelineEnv;
use crate::cleaner::{
    DateFormat, HeaderStyle, fill_null_dates, fill_null_float, normalize_headers, parse_date_column,
    rename_columns,
};
use crate::error::{EtlError, Result};
use crate::load::WriteMode;
use crate::pipeline::graph::TaskGraph;
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::sales_etl::{SALES_INPUT, SALES_OUTPUT, SALES_RENAMES};
use crate::schema::{post_check, pre_check};
use crate::types::FileFormat;
use crate::utils::series;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Layout of `order_date` in the export.
pub const DATE_LAYOUT: &str = "%d-%m-%y";

/// Warehouse entity the cleaned table is loaded as.
pub const LOAD_ENTITY: &str = "sales_data";

/// Stamped on orders whose date is missing or unparseable.
pub fn default_order_date() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .ok_or_else(|| EtlError::InvalidConfig("invalid default order date".to_string()))
}

/// Clean the export and add `total_amount`.
///
/// Headers are snake-cased and `diskount` becomes `discount`. Dates are
/// day-first with a fallback of [`default_order_date`], a missing `amount`
/// counts as 0, and `total_amount = amount * quantity * (1 - discount / 100)`
/// rounded to cents.
pub fn transform_sales(raw: DataFrame) -> Result<DataFrame> {
    info!("Transforming sales data");
    let df = pre_check(&SALES_INPUT, raw).into_table();

    let df = normalize_headers(df, HeaderStyle::SnakeLower)?;
    let df = rename_columns(df, SALES_RENAMES)?;

    let mut df = parse_date_column(df, "order_date", &DateFormat::fixed(DATE_LAYOUT))?;
    let dates = fill_null_dates(series(&df, "order_date")?, default_order_date()?)?;
    df.with_column(dates)?;

    let df = fill_null_float(df, "amount", 0.0)?;
    let df = df
        .lazy()
        .with_column(
            (col("amount")
                * col("quantity").cast(DataType::Float64)
                * (lit(1.0) - col("discount").cast(DataType::Float64) / lit(100.0)))
            .round(2, RoundMode::HalfAwayFromZero)
            .alias("total_amount"),
        )
        .collect()?;

    let df = post_check(&SALES_OUTPUT, df)?;
    info!("Transformed {} sales rows", df.height());
    Ok(df)
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let (extract_env, load_env) = (env.clone(), env);

    TaskGraph::new("sales_etl")
        .task("extract_sales", PipelineStage::Extracting, &[], move |a| {
            let folder = &extract_env.context.storage().folder;
            a.insert("raw_sales", extract_env.read_selected(folder, FileFormat::Csv, "sales")?);
            Ok(())
        })
        .task("transform_sales", PipelineStage::Cleaning, &["extract_sales"], |a| {
            let sales = transform_sales(a.cloned("raw_sales")?)?;
            a.insert("sales", sales);
            Ok(())
        })
        .task("load_sales", PipelineStage::Loading, &["transform_sales"], move |a| {
            load_env.load_entity(LOAD_ENTITY, a.get("sales")?, &WriteMode::Replace)?;
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::extract::{MemoryObjectStore, ObjectStore, read_table};
    use crate::load::TableTarget;
    use crate::pipeline::graph::PipelineRunner;
    use crate::utils::{datetime_values, f64_values, has_column, i64_values, naive_to_millis};
    use pretty_assertions::assert_eq;

    const SALES_CSV: &str = "Order ID,Customer ID,Order Date,Amount,Quantity,Diskount
1,10,05-03-23,100.0,2,10
2,11,not a date,19.99,3,0
3,12,,,4,5
";

    fn raw_sales() -> DataFrame {
        read_table(SALES_CSV.as_bytes().to_vec(), FileFormat::Csv, "sales_data.csv").unwrap()
    }

    #[test]
    fn test_transform_renames_and_prices() {
        let sales = transform_sales(raw_sales()).unwrap();

        assert!(has_column(&sales, "discount"));
        assert!(!has_column(&sales, "diskount"));
        assert_eq!(
            f64_values(&sales, "total_amount").unwrap(),
            vec![Some(180.0), Some(59.97), Some(0.0)]
        );
        assert_eq!(f64_values(&sales, "amount").unwrap()[2], Some(0.0));
    }

    #[test]
    fn test_missing_dates_fall_back_to_default() {
        let sales = transform_sales(raw_sales()).unwrap();
        let fallback = default_order_date().unwrap();
        let march = NaiveDate::from_ymd_opt(2023, 3, 5).unwrap().and_time(NaiveTime::MIN);

        assert_eq!(
            datetime_values(&sales, "order_date").unwrap(),
            vec![Some(march), Some(fallback), Some(fallback)]
        );
        assert_eq!(naive_to_millis(&fallback), 1_672_531_200_000);
    }

    #[test]
    fn test_discount_over_one_hundred_is_rejected() {
        let raw = read_table(
            b"Order ID,Customer ID,Order Date,Amount,Quantity,Diskount\n1,10,05-03-23,10.0,1,150\n".to_vec(),
            FileFormat::Csv,
            "sales_data.csv",
        )
        .unwrap();
        let err = transform_sales(raw).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
        assert_eq!(err.validation_report().unwrap().failures[0].column, "discount");
    }

    #[test]
    fn test_pipeline_replaces_warehouse_table() {
        let store = MemoryObjectStore::new();
        store.put(BUCKET, "raw/sales_data.csv", SALES_CSV.as_bytes().to_vec()).unwrap();
        let (env, _, warehouse) = env(store);
        let graph = build(env);

        PipelineRunner::default().run(&graph).unwrap();
        PipelineRunner::default().run(&graph).unwrap();

        let loaded = warehouse
            .table(&TableTarget::new("ANALYTICS", "", LOAD_ENTITY))
            .unwrap();
        assert_eq!(i64_values(&loaded, "order_id").unwrap(), vec![Some(1), Some(2), Some(3)]);
    }
}
