//! Sales insights: clean sales and products, enrich every sale with
//! calendar features and a size bucket, and write four analytics tables.

use super::PipelineEnv;
use crate::cleaner::{
    DateFormat, HeaderStyle, drop_duplicates, drop_nulls, filter_positive, lowercase,
    normalize_headers, parse_date_column, uppercase, with_product,
};
use crate::error::Result;
use crate::pipeline::graph::TaskGraph;
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::sales_insights::{
    ENRICHED_SALES, HOURLY_TREND, PRODUCT_RANKING, PRODUCTS_INPUT, PRODUCTS_OUTPUT,
    REVENUE_CONCENTRATION, SALES_BUCKETS, SALES_INPUT, SALES_OUTPUT, SEASONAL_PATTERN,
};
use crate::schema::{post_check, pre_check};
use crate::transform::{
    Closed, JoinKind, ShareOrder, hour, hourly_peaks, iso_week, join_on, product_ranking,
    quarter_label, revenue_concentration, seasonal_totals, weekday_name, with_cut,
    with_date_feature, year_month,
};
use crate::types::FileFormat;
use polars::prelude::DataFrame;
use std::sync::Arc;
use tracing::info;

/// Right-closed edges of the `low`/`medium`/`high` sale buckets.
pub const SALES_BUCKET_EDGES: [f64; 4] = [-1.0, 100.0, 500.0, f64::INFINITY];

enum Folder {
    Output,
    Analytics,
}

/// `(artifact, producing task, file name, folder, format)`.
const OUTPUTS: [(&str, &str, &str, Folder, FileFormat); 8] = [
    ("sales", "clean_sales", "cleaned_sales.csv", Folder::Output, FileFormat::Csv),
    ("products", "clean_products", "cleaned_products.json", Folder::Output, FileFormat::Json),
    ("merged", "merge", "merged_data.csv", Folder::Output, FileFormat::Csv),
    ("enriched", "enrich", "enriched_data.csv", Folder::Output, FileFormat::Csv),
    ("hourly_trend", "hourly_trend", "hourly_sales_trend.csv", Folder::Analytics, FileFormat::Csv),
    ("product_ranking", "product_ranking", "product_sales_ranking.csv", Folder::Analytics, FileFormat::Csv),
    ("seasonal_pattern", "seasonal_pattern", "seasonal_sales_pattern.csv", Folder::Analytics, FileFormat::Csv),
    (
        "revenue_concentration",
        "revenue_concentration",
        "revenue_concentration.csv",
        Folder::Analytics,
        FileFormat::Csv,
    ),
];

pub fn clean_sales(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning sales data");
    let df = pre_check(&SALES_INPUT, raw).into_table();

    let df = normalize_headers(df, HeaderStyle::Underscored)?;
    let df = lowercase(df, "region")?;
    let df = drop_nulls(&df, Some(&["region", "timestamp"]))?;
    let df = filter_positive(df, &["price", "quantity"])?;
    let df = parse_date_column(df, "timestamp", &DateFormat::Mixed)?;
    let df = with_product(df, "quantity", "price", "total_sales")?;

    post_check(&SALES_OUTPUT, df)
}

pub fn clean_products(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning products data");
    let df = pre_check(&PRODUCTS_INPUT, raw).into_table();

    let df = normalize_headers(df, HeaderStyle::Underscored)?;
    let df = lowercase(df, "category")?;
    let df = uppercase(df, "brand")?;
    let df = drop_nulls(&df, Some(&["product_id", "rating"]))?;
    let df = drop_duplicates(&df, None)?;

    post_check(&PRODUCTS_OUTPUT, df)
}

pub fn merge_sales_and_products(sales: &DataFrame, products: &DataFrame) -> Result<DataFrame> {
    join_on(sales, products, "product_id", JoinKind::Inner)
}

/// Month, ISO week, weekday, hour and sales bucket of every sale.
pub fn enrich(merged: DataFrame) -> Result<DataFrame> {
    info!("Enriching merged data");
    let df = with_date_feature(merged, "timestamp", "month", year_month)?;
    let df = with_date_feature(df, "timestamp", "week", iso_week)?;
    let df = with_date_feature(df, "timestamp", "weekday", weekday_name)?;
    let df = with_date_feature(df, "timestamp", "hour", hour)?;
    let df = with_cut(
        df,
        "total_sales",
        "sales_bucket",
        &SALES_BUCKET_EDGES,
        &SALES_BUCKETS,
        Closed::Right,
    )?;
    post_check(&ENRICHED_SALES, df)
}

/// Peak hour per region and category.
pub fn hourly_sales_trend(enriched: &DataFrame) -> Result<DataFrame> {
    post_check(&HOURLY_TREND, hourly_peaks(enriched, "total_sales", "hourly_total_sales")?)
}

pub fn product_sales_ranking(enriched: &DataFrame) -> Result<DataFrame> {
    post_check(&PRODUCT_RANKING, product_ranking(enriched)?)
}

/// Sales per quarter (`YYYYQn`) and category.
pub fn seasonal_sales_pattern(enriched: &DataFrame) -> Result<DataFrame> {
    let with_quarter = with_date_feature(enriched.clone(), "timestamp", "quarter", quarter_label)?;
    post_check(&SEASONAL_PATTERN, seasonal_totals(&with_quarter, "total_sales")?)
}

pub fn region_revenue_concentration(enriched: &DataFrame, order: ShareOrder) -> Result<DataFrame> {
    let shares = revenue_concentration(enriched, "region", "total_sales", "region_revenue", order)?;
    post_check(&REVENUE_CONCENTRATION, shares)
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let (e1, e2) = (env.clone(), env.clone());

    let mut graph = TaskGraph::new("sales_insights")
        .task("extract_sales", PipelineStage::Extracting, &[], move |a| {
            let folder = &e1.context.storage().folder;
            a.insert("raw_sales", e1.read_selected(folder, FileFormat::Csv, "sales")?);
            Ok(())
        })
        .task("extract_products", PipelineStage::Extracting, &[], move |a| {
            let folder = &e2.context.storage().folder;
            a.insert("raw_products", e2.read_selected(folder, FileFormat::Json, "product")?);
            Ok(())
        })
        .task("clean_sales", PipelineStage::Cleaning, &["extract_sales"], |a| {
            let sales = clean_sales(a.cloned("raw_sales")?)?;
            a.insert("sales", sales);
            Ok(())
        })
        .task("clean_products", PipelineStage::Cleaning, &["extract_products"], |a| {
            let products = clean_products(a.cloned("raw_products")?)?;
            a.insert("products", products);
            Ok(())
        })
        .task("merge", PipelineStage::Transforming, &["clean_sales", "clean_products"], |a| {
            let merged = merge_sales_and_products(a.get("sales")?, a.get("products")?)?;
            a.insert("merged", merged);
            Ok(())
        })
        .task("enrich", PipelineStage::Transforming, &["merge"], |a| {
            let enriched = enrich(a.cloned("merged")?)?;
            a.insert("enriched", enriched);
            Ok(())
        })
        .task("hourly_trend", PipelineStage::Transforming, &["enrich"], |a| {
            let trend = hourly_sales_trend(a.get("enriched")?)?;
            a.insert("hourly_trend", trend);
            Ok(())
        })
        .task("product_ranking", PipelineStage::Transforming, &["enrich"], |a| {
            let ranking = product_sales_ranking(a.get("enriched")?)?;
            a.insert("product_ranking", ranking);
            Ok(())
        })
        .task("seasonal_pattern", PipelineStage::Transforming, &["enrich"], |a| {
            let pattern = seasonal_sales_pattern(a.get("enriched")?)?;
            a.insert("seasonal_pattern", pattern);
            Ok(())
        })
        .task("revenue_concentration", PipelineStage::Transforming, &["enrich"], |a| {
            let shares = region_revenue_concentration(a.get("enriched")?, ShareOrder::default())?;
            a.insert("revenue_concentration", shares);
            Ok(())
        });

    for (artifact, producer, file_name, folder, format) in OUTPUTS {
        let env = env.clone();
        let key = match folder {
            Folder::Output => env.context.output_key(file_name),
            Folder::Analytics => env.context.analytics_key(file_name),
        };
        graph = graph.task(
            &format!("write_{artifact}"),
            PipelineStage::Loading,
            &[producer],
            move |a| env.write_object(&key, format, a.get(artifact)?),
        );
    }
    graph
}
