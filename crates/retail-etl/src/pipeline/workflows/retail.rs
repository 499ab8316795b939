//! Retail cleaning: raw sales CSV and products JSON in, cleaned CSVs out.

use super::PipelineEnv;
use crate::cleaner::{
    DateFormat, HeaderStyle, drop_duplicates, drop_nulls, filter_positive, lowercase,
    normalize_headers, parse_date_column, rename_columns,
};
use crate::error::Result;
use crate::pipeline::graph::TaskGraph;
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::retail::{
    PRODUCTS_INPUT, PRODUCTS_OUTPUT, SALES_INPUT, SALES_OUTPUT, SALES_RENAMES,
};
use crate::schema::{post_check, pre_check};
use crate::types::FileFormat;
use polars::prelude::DataFrame;
use std::sync::Arc;
use tracing::info;

pub const CLEANED_SALES_FILE: &str = "cleaned_sales.csv";
pub const CLEANED_PRODUCTS_FILE: &str = "cleaned_products.csv";

/// Clean raw sales: normalised headers, no nulls, positive price and
/// quantity, lowercase region, parsed timestamps, no duplicate rows.
pub fn transform_sales_data(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning sales data");
    let df = pre_check(&SALES_INPUT, raw).into_table();

    let df = normalize_headers(df, HeaderStyle::SnakeLower)?;
    let df = rename_columns(df, SALES_RENAMES)?;
    let df = drop_nulls(&df, None)?;
    let df = filter_positive(df, &["price", "quantity"])?;
    let df = lowercase(df, "region")?;
    let df = parse_date_column(df, "timestamp", &DateFormat::Mixed)?;
    let df = drop_duplicates(&df, None)?;

    let df = post_check(&SALES_OUTPUT, df)?;
    info!("Sales data cleaned successfully");
    Ok(df)
}

/// Clean raw products: normalised headers, no nulls, parsed launch dates,
/// no duplicate rows.
pub fn transform_products_data(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning products data");
    let df = pre_check(&PRODUCTS_INPUT, raw).into_table();

    let df = normalize_headers(df, HeaderStyle::SnakeLower)?;
    let df = drop_nulls(&df, None)?;
    let df = parse_date_column(df, "launch_date", &DateFormat::Mixed)?;
    let df = drop_duplicates(&df, None)?;

    let df = post_check(&PRODUCTS_OUTPUT, df)?;
    info!("Products data cleaned successfully");
    Ok(df)
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let (e1, e2, e3, e4) = (env.clone(), env.clone(), env.clone(), env);

    TaskGraph::new("retail")
        .task("extract_sales", PipelineStage::Extracting, &[], move |a| {
            let folder = &e1.context.storage().input_folder;
            a.insert("raw_sales", e1.read_selected(folder, FileFormat::Csv, "sales")?);
            Ok(())
        })
        .task("extract_products", PipelineStage::Extracting, &[], move |a| {
            let folder = &e2.context.storage().input_folder;
            a.insert("raw_products", e2.read_selected(folder, FileFormat::Json, "product")?);
            Ok(())
        })
        .task("transform_sales", PipelineStage::Cleaning, &["extract_sales"], |a| {
            let sales = transform_sales_data(a.cloned("raw_sales")?)?;
            a.insert("sales", sales);
            Ok(())
        })
        .task("transform_products", PipelineStage::Cleaning, &["extract_products"], |a| {
            let products = transform_products_data(a.cloned("raw_products")?)?;
            a.insert("products", products);
            Ok(())
        })
        .task("load_sales", PipelineStage::Loading, &["transform_sales"], move |a| {
            let key = e3.context.output_key(CLEANED_SALES_FILE);
            e3.write_object(&key, FileFormat::Csv, a.get("sales")?)
        })
        .task("load_products", PipelineStage::Loading, &["transform_products"], move |a| {
            let key = e4.context.output_key(CLEANED_PRODUCTS_FILE);
            e4.write_object(&key, FileFormat::Csv, a.get("products")?)
        })
}
