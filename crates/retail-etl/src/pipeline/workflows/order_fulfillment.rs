//! Order fulfillment: merge sales, products, customers and shipping, label
//! delivery speed and price band, then load a raw table and upsert a
//! compact one keyed on `order_id`.

use super::PipelineEnv;
use crate::cleaner::{
    DateFormat, HeaderStyle, drop_duplicates, normalize_headers, parse_date_column,
    rename_columns, select_columns, with_product, with_ratio,
};
use crate::error::{EtlError, Result};
use crate::extract::{extract_tables, route_tables};
use crate::load::WriteMode;
use crate::pipeline::graph::TaskGraph;
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::order_fulfillment::{
    ENRICHED_ORDERS, PRICE_CATEGORIES, TRANSFORMED_COLUMNS, TRANSFORMED_ORDERS,
};
use crate::schema::post_check;
use crate::transform::{Closed, merge_chain, segment_deliveries, with_cut};
use crate::types::FileFormat;
use crate::utils::{f64_values, has_column, require_columns};
use polars::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entity tokens in merge order.
pub const ENTITIES: [&str; 4] = ["sales", "product", "customer", "shipping"];

/// Join key for each table after the first.
pub const MERGE_KEYS: [&str; 3] = ["product_id", "customer_id", "order_id"];

/// Date columns parsed wherever present.
pub const DATE_COLUMNS: [&str; 3] = ["order_date", "signup_date", "delivery_date"];

/// Day-month-two-digit-year layout of every date in these exports.
pub const DATE_LAYOUT: &str = "%d-%m-%y";

/// Right-closed edges of the `low`/`medium`/`high` price bands.
pub const PRICE_EDGES: [f64; 4] = [0.0, 50.0, 200.0, f64::INFINITY];

pub const RAW_ENTITY: &str = "raw_sales_data";
pub const TRANSFORMED_ENTITY: &str = "transformed_sales_data";

/// Normalise headers, apply `renames` and parse known date columns.
///
/// Empty tables are skipped, so the result may be shorter than the input.
pub fn clean_tables(tables: Vec<DataFrame>, renames: &[(&str, &str)]) -> Result<Vec<DataFrame>> {
    let format = DateFormat::fixed(DATE_LAYOUT);
    let mut cleaned = Vec::with_capacity(tables.len());
    for (i, table) in tables.into_iter().enumerate() {
        if table.height() == 0 {
            warn!("Table at index {} is empty, skipping cleaning", i);
            continue;
        }
        let mut df = normalize_headers(table, HeaderStyle::SnakeLower)?;
        df = rename_columns(df, renames)?;
        for column in DATE_COLUMNS {
            if has_column(&df, column) {
                df = parse_date_column(df, column, &format)?;
                debug!("Converted column {} to datetime in table {}", column, i);
            }
        }
        cleaned.push(df);
    }
    Ok(cleaned)
}

/// Drop exact duplicate rows from every table.
pub fn remove_duplicates(tables: Vec<DataFrame>) -> Result<Vec<DataFrame>> {
    tables
        .into_iter()
        .enumerate()
        .map(|(i, table)| {
            let deduped = drop_duplicates(&table, None)?;
            info!("Removed {} duplicates from table {}", table.height() - deduped.height(), i);
            Ok(deduped)
        })
        .collect()
}

/// `total_revenue`, `profit_margin` and `discounted_price` (discount in
/// percent).
pub fn compute_derived_columns(df: DataFrame) -> Result<DataFrame> {
    require_columns(&df, &["quantity", "amount", "profit", "discount"])?;
    let df = with_product(df, "quantity", "amount", "total_revenue")?;
    let mut df = with_ratio(df, "profit", "total_revenue", "profit_margin")?;

    let discounted: Vec<Option<f64>> = f64_values(&df, "amount")?
        .into_iter()
        .zip(f64_values(&df, "discount")?)
        .map(|(amount, discount)| Some(amount? * (1.0 - discount? / 100.0)))
        .collect();
    df.with_column(Series::new("discounted_price".into(), discounted))?;
    Ok(df)
}

/// Price band of `amount`.
pub fn categorize_products(df: DataFrame) -> Result<DataFrame> {
    with_cut(df, "amount", "product_category", &PRICE_EDGES, &PRICE_CATEGORIES, Closed::Right)
}

/// Merged orders with delivery segment, derived columns and price band.
pub fn enrich_orders(tables: &[DataFrame]) -> Result<DataFrame> {
    let merged = merge_chain(tables, &MERGE_KEYS)?;
    let merged = segment_deliveries(merged)?;
    let merged = compute_derived_columns(merged)?;
    let merged = categorize_products(merged)?;
    post_check(&ENRICHED_ORDERS, merged)
}

/// The upserted projection: one row per `order_id`, first occurrence wins.
pub fn transformed_orders(enriched: &DataFrame) -> Result<DataFrame> {
    let projected = select_columns(enriched, &TRANSFORMED_COLUMNS)?;
    let deduped = drop_duplicates(&projected, Some(&["order_id"]))?;
    if deduped.height() < projected.height() {
        warn!(
            "Dropped {} rows with a repeated order_id before upsert",
            projected.height() - deduped.height()
        );
    }
    post_check(&TRANSFORMED_ORDERS, deduped)
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let (extract_env, raw_env, upsert_env) = (env.clone(), env.clone(), env);

    TaskGraph::new("order_fulfillment")
        .task("extract", PipelineStage::Extracting, &[], move |a| {
            let ctx = &extract_env.context;
            let tables = extract_tables(
                extract_env.store.as_ref(),
                ctx.bucket(),
                &ctx.storage().folder,
                FileFormat::Csv,
            )?;
            let mut routed = route_tables(&tables, &ENTITIES);
            for token in ENTITIES {
                let table = routed
                    .remove(token)
                    .ok_or_else(|| EtlError::NotFound(format!("no {token} file found")))?;
                a.insert(token, table);
            }
            Ok(())
        })
        .task("clean", PipelineStage::Cleaning, &["extract"], |a| {
            let raw = ENTITIES
                .iter()
                .map(|token| a.cloned(token))
                .collect::<Result<Vec<_>>>()?;
            let cleaned = remove_duplicates(clean_tables(raw, &[("diskount", "discount")])?)?;
            for (token, table) in ENTITIES.iter().zip(cleaned) {
                a.insert(format!("clean_{token}"), table);
            }
            Ok(())
        })
        .task("enrich", PipelineStage::Transforming, &["clean"], |a| {
            let tables = ENTITIES
                .iter()
                .map(|token| a.cloned(&format!("clean_{token}")))
                .collect::<Result<Vec<_>>>()?;
            let enriched = enrich_orders(&tables)?;
            a.insert("enriched", enriched);
            Ok(())
        })
        .task("load_raw", PipelineStage::Loading, &["enrich"], move |a| {
            raw_env.load_entity(RAW_ENTITY, a.get("enriched")?, &WriteMode::Replace)?;
            Ok(())
        })
        .task("load_transformed", PipelineStage::Loading, &["enrich"], move |a| {
            let transformed = transformed_orders(a.get("enriched")?)?;
            upsert_env.load_entity(TRANSFORMED_ENTITY, &transformed, &WriteMode::upsert("order_id"))?;
            a.insert("transformed", transformed);
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::extract::{MemoryObjectStore, read_table};
    use crate::load::TableTarget;
    use crate::pipeline::graph::PipelineRunner;
    use crate::utils::{i64_values, str_values};
    use pretty_assertions::assert_eq;

    const SALES_CSV: &str = "Order ID,customer_id,product_id,amount,quantity,profit,Diskount,order_date
1,1,10,40.0,2,8.0,10,05-01-24
2,2,11,150.0,1,30.0,0,06-01-24
3,1,12,500.0,1,100.0,20,07-01-24
3,1,12,500.0,1,100.0,20,07-01-24
";
    const PRODUCTS_CSV: &str = "product_id,product_name,category\n10,Pen,Office\n11,Lamp,Home\n12,Desk,Home\n";
    const CUSTOMERS_CSV: &str = "customer_id,customer_name,signup_date\n1,Ann,01-01-23\n2,Ben,02-02-23\n";
    const SHIPPING_CSV: &str = "order_id,shipping_days,delivery_date\n1,2,07-01-24\n2,5,11-01-24\n3,12,19-01-24\n";

    fn csv(text: &str) -> DataFrame {
        read_table(text.as_bytes().to_vec(), FileFormat::Csv, "test.csv").unwrap()
    }

    fn strings(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    fn cleaned() -> Vec<DataFrame> {
        let raw = vec![csv(SALES_CSV), csv(PRODUCTS_CSV), csv(CUSTOMERS_CSV), csv(SHIPPING_CSV)];
        remove_duplicates(clean_tables(raw, &[("diskount", "discount")]).unwrap()).unwrap()
    }

    fn store() -> MemoryObjectStore {
        MemoryObjectStore::new()
            .with_object(BUCKET, "raw/sales.csv", SALES_CSV)
            .with_object(BUCKET, "raw/products.csv", PRODUCTS_CSV)
            .with_object(BUCKET, "raw/customers.csv", CUSTOMERS_CSV)
            .with_object(BUCKET, "raw/shipping.csv", SHIPPING_CSV)
    }

    #[test]
    fn test_clean_tables_renames_and_parses_dates() {
        let tables = cleaned();
        let sales = &tables[0];
        assert!(has_column(sales, "order_id"));
        assert!(has_column(sales, "discount"));
        assert_eq!(sales.height(), 3);
        assert!(matches!(
            sales.column("order_date").unwrap().dtype(),
            DataType::Datetime(_, _)
        ));
    }

    #[test]
    fn test_clean_tables_skips_empty_tables() {
        let empty = DataFrame::new(vec![Series::new("a".into(), Vec::<i64>::new()).into()]).unwrap();
        let cleaned = clean_tables(vec![empty, csv(PRODUCTS_CSV)], &[]).unwrap();
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn test_enrich_orders_labels_delivery_and_price() {
        let enriched = enrich_orders(&cleaned()).unwrap();
        assert_eq!(i64_values(&enriched, "order_id").unwrap(), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(
            str_values(&enriched, "delivery_category").unwrap(),
            strings(&["fast", "standard", "slow"])
        );
        assert_eq!(
            str_values(&enriched, "product_category").unwrap(),
            strings(&["low", "medium", "high"])
        );
        assert_eq!(
            f64_values(&enriched, "discounted_price").unwrap(),
            vec![Some(36.0), Some(150.0), Some(400.0)]
        );
        assert_eq!(
            f64_values(&enriched, "profit_margin").unwrap(),
            vec![Some(0.1), Some(0.2), Some(0.2)]
        );
    }

    #[test]
    fn test_transformed_orders_keep_first_per_order() {
        let enriched = df!(
            "order_id" => [1i64, 1, 2],
            "customer_id" => [5i64, 6, 7],
            "total_revenue" => [10.0, 20.0, 30.0],
            "profit_margin" => [0.1, 0.2, 0.3],
            "shipping_days" => [1i64, 2, 3],
            "extra" => ["a", "b", "c"]
        )
        .unwrap();
        let transformed = transformed_orders(&enriched).unwrap();
        assert_eq!(transformed.width(), 5);
        assert_eq!(i64_values(&transformed, "customer_id").unwrap(), vec![Some(5), Some(7)]);
    }

    #[test]
    fn test_rerun_upserts_instead_of_duplicating() {
        let (env, _, warehouse) = env(store());
        let graph = build(env);
        PipelineRunner::default().run(&graph).unwrap();
        PipelineRunner::default().run(&graph).unwrap();

        let target = TableTarget::new("ANALYTICS", "", TRANSFORMED_ENTITY);
        let transformed = warehouse.table(&target).unwrap();
        assert_eq!(transformed.height(), 3);
        let raw = warehouse.table(&TableTarget::new("ANALYTICS", "", RAW_ENTITY)).unwrap();
        assert_eq!(raw.height(), 3);
    }

    #[test]
    fn test_missing_shipping_is_not_found() {
        let store = MemoryObjectStore::new()
            .with_object(BUCKET, "raw/sales.csv", SALES_CSV)
            .with_object(BUCKET, "raw/products.csv", PRODUCTS_CSV)
            .with_object(BUCKET, "raw/customers.csv", CUSTOMERS_CSV);
        let (env, _, _) = env(store);
        let err = PipelineRunner::default().run(&build(env)).unwrap_err();
        assert!(err.to_string().contains("no shipping file found"));
    }
}
