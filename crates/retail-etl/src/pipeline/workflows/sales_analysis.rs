//! Sales analysis: clean sales, customers and products, merge them and
//! derive monthly totals, customer segments, anomalies and a rolling
//! forecast, then load every table to the warehouse.

use super::PipelineEnv;
use crate::cleaner::{
    DateFormat, HeaderStyle, drop_nulls, filter_positive, normalize_headers, parse_date_column,
    select_columns, with_product, with_ratio,
};
use crate::error::{EtlError, Result};
use crate::extract::{extract_tables, route_tables};
use crate::load::WriteMode;
use crate::pipeline::graph::TaskGraph;
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::sales_analysis::{
    CUSTOMERS_INPUT, CUSTOMERS_OUTPUT, MONTHLY_SALES, MONTHLY_SALES_INPUT, PRODUCTS_INPUT,
    PRODUCTS_OUTPUT, SALES_ANOMALIES, SALES_FORECAST, SALES_INPUT, SALES_OUTPUT, SEGMENTED_CUSTOMERS,
};
use crate::schema::{post_check, pre_check};
use crate::transform::{
    JoinKind, detect_anomalies, join_on, monthly_aggregates, segment_customers, with_rolling_mean,
};
use crate::types::FileFormat;
use polars::prelude::DataFrame;
use std::sync::Arc;
use tracing::info;

/// Rows averaged by the sales forecast.
pub const FORECAST_WINDOW: usize = 7;

const ENTITIES: [&str; 3] = ["sales", "customer", "product"];

/// `(warehouse entity, artifact, producing task, empty allowed)`.
const LOADS: [(&str, &str, &str, bool); 7] = [
    ("sales", "sales", "clean_sales", false),
    ("customers", "customers", "clean_customers", false),
    ("products", "products", "clean_products", false),
    ("monthly_sales", "monthly_sales", "aggregate_monthly", false),
    ("segmented_customers", "segmented_customers", "segment_customers", false),
    ("detect_sales_anomalies", "sales_anomalies", "detect_anomalies", true),
    ("forecast_sales", "sales_forecast", "forecast_sales", false),
];

fn normalize(raw: DataFrame) -> Result<DataFrame> {
    let df = normalize_headers(raw, HeaderStyle::SnakeLower)?;
    drop_nulls(&df, None)
}

/// Normalised sales with parsed dates and `total_revenue`.
///
/// Rows without a positive `amount` and `quantity` are dropped.
pub fn clean_sales(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning sales data");
    let df = normalize(pre_check(&SALES_INPUT, raw).into_table())?;
    let df = parse_date_column(df, "order_date", &DateFormat::Mixed)?;
    let df = filter_positive(df, &["amount", "quantity"])?;
    let df = with_product(df, "amount", "quantity", "total_revenue")?;
    post_check(&SALES_OUTPUT, df)
}

pub fn clean_customers(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning customers data");
    let df = normalize(pre_check(&CUSTOMERS_INPUT, raw).into_table())?;
    let df = parse_date_column(df, "signup_date", &DateFormat::Mixed)?;
    post_check(&CUSTOMERS_OUTPUT, df)
}

pub fn clean_products(raw: DataFrame) -> Result<DataFrame> {
    info!("Cleaning products data");
    let df = normalize(pre_check(&PRODUCTS_INPUT, raw).into_table())?;
    post_check(&PRODUCTS_OUTPUT, df)
}

/// Sales joined to customers and products, with `profit_margin`.
pub fn merge_data(sales: &DataFrame, customers: &DataFrame, products: &DataFrame) -> Result<DataFrame> {
    info!("Merging data");
    let merged = join_on(sales, customers, "customer_id", JoinKind::Inner)?;
    let merged = join_on(&merged, products, "product_id", JoinKind::Inner)?;
    with_ratio(merged, "profit", "total_revenue", "profit_margin")
}

pub fn monthly_sales(merged: &DataFrame) -> Result<DataFrame> {
    let merged = pre_check(&MONTHLY_SALES_INPUT, merged.clone());
    post_check(&MONTHLY_SALES, monthly_aggregates(&merged.table)?)
}

pub fn customer_segments(sales: &DataFrame, customers: &DataFrame) -> Result<DataFrame> {
    let segmented = segment_customers(sales, customers)?;
    let segmented = select_columns(
        &segmented,
        &["customer_id", "total_spent", "customer_segment", "segmentation_date"],
    )?;
    post_check(&SEGMENTED_CUSTOMERS, segmented)
}

pub fn sales_anomalies(sales: &DataFrame) -> Result<DataFrame> {
    let (anomalies, _) = detect_anomalies(sales, "total_revenue")?;
    let anomalies = select_columns(
        &anomalies,
        &["order_id", "customer_id", "product_id", "order_date", "total_revenue"],
    )?;
    post_check(&SALES_ANOMALIES, anomalies)
}

/// Trailing mean of `total_revenue` over [`FORECAST_WINDOW`] rows, in the
/// row order of the cleaned sales.
pub fn sales_forecast(sales: &DataFrame) -> Result<DataFrame> {
    let forecast = with_rolling_mean(sales.clone(), "total_revenue", FORECAST_WINDOW, 1, "sales_forecast")?;
    let forecast = select_columns(&forecast, &["order_date", "total_revenue", "sales_forecast"])?;
    info!("Sales forecasting completed for {} records", forecast.height());
    post_check(&SALES_FORECAST, forecast)
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let extract_env = env.clone();

    let mut graph = TaskGraph::new("sales_analysis")
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
                a.insert(format!("raw_{token}"), table);
            }
            Ok(())
        })
        .task("clean_sales", PipelineStage::Cleaning, &["extract"], |a| {
            let sales = clean_sales(a.cloned("raw_sales")?)?;
            a.insert("sales", sales);
            Ok(())
        })
        .task("clean_customers", PipelineStage::Cleaning, &["extract"], |a| {
            let customers = clean_customers(a.cloned("raw_customer")?)?;
            a.insert("customers", customers);
            Ok(())
        })
        .task("clean_products", PipelineStage::Cleaning, &["extract"], |a| {
            let products = clean_products(a.cloned("raw_product")?)?;
            a.insert("products", products);
            Ok(())
        })
        .task(
            "merge",
            PipelineStage::Transforming,
            &["clean_sales", "clean_customers", "clean_products"],
            |a| {
                let merged = merge_data(a.get("sales")?, a.get("customers")?, a.get("products")?)?;
                a.insert("merged", merged);
                Ok(())
            },
        )
        .task("aggregate_monthly", PipelineStage::Transforming, &["merge"], |a| {
            let monthly = monthly_sales(a.get("merged")?)?;
            a.insert("monthly_sales", monthly);
            Ok(())
        })
        .task(
            "segment_customers",
            PipelineStage::Transforming,
            &["clean_sales", "clean_customers"],
            |a| {
                let segments = customer_segments(a.get("sales")?, a.get("customers")?)?;
                a.insert("segmented_customers", segments);
                Ok(())
            },
        )
        .task("detect_anomalies", PipelineStage::Transforming, &["clean_sales"], |a| {
            let anomalies = sales_anomalies(a.get("sales")?)?;
            a.insert("sales_anomalies", anomalies);
            Ok(())
        })
        .task("forecast_sales", PipelineStage::Transforming, &["clean_sales"], |a| {
            let forecast = sales_forecast(a.get("sales")?)?;
            a.insert("sales_forecast", forecast);
            Ok(())
        });

    for (entity, artifact, producer, allow_empty) in LOADS {
        let env = env.clone();
        graph = graph.task(
            &format!("load_{entity}"),
            PipelineStage::Loading,
            &[producer],
            move |a| {
                let table = a.get(artifact)?;
                if allow_empty {
                    env.load_entity_if_any(entity, table, &WriteMode::Replace)?;
                } else {
                    env.load_entity(entity, table, &WriteMode::Replace)?;
                }
                Ok(())
            },
        );
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::extract::{MemoryObjectStore, read_table};
    use crate::load::TableTarget;
    use crate::pipeline::graph::PipelineRunner;
    use crate::utils::{f64_values, i64_values, str_values};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    const SALES_CSV: &str = "order_id,customer_id,product_id,order_date,amount,quantity,discount,profit
1,1,100,2024-01-05,50.0,2,0.1,20.0
2,2,101,2024-01-20,700.0,2,0.0,150.0
3,1,101,2024-02-03,300.0,1,0.2,60.0
4,3,100,2024-02-10,25.0,4,0.0,10.0
";

    const CUSTOMERS_CSV: &str = "customer_id,name,email,signup_date
1,Alice,alice@example.com,2023-05-01
2,Bob,bob@example.com,2023-06-15
3,Cara,cara@example.com,2023-07-20
4,Dan,dan@example.com,2023-08-01
";

    const PRODUCTS_CSV: &str = "product_id,name,category,price
100,Widget,Tools,25.0
101,Gadget,Electronics,300.0
";

    fn csv(text: &str) -> DataFrame {
        read_table(text.as_bytes().to_vec(), FileFormat::Csv, "test.csv").unwrap()
    }

    #[test]
    fn test_clean_sales_adds_total_revenue() {
        let sales = clean_sales(csv(SALES_CSV)).unwrap();
        assert_eq!(
            f64_values(&sales, "total_revenue").unwrap(),
            vec![Some(100.0), Some(1400.0), Some(300.0), Some(100.0)]
        );
        assert!(matches!(
            sales.column("order_date").unwrap().dtype(),
            DataType::Datetime(_, _)
        ));
    }

    #[test]
    fn test_clean_sales_drops_non_positive_rows() {
        let raw = csv("order_id,customer_id,product_id,order_date,amount,quantity,discount,profit
1,1,100,2024-01-05,50.0,2,0.1,20.0
2,1,100,2024-01-06,0.0,2,0.0,0.0
3,2,101,2024-01-07,30.0,0,0.0,5.0
4,2,101,2024-01-08,-10.0,1,0.0,1.0
");
        let sales = clean_sales(raw).unwrap();

        assert_eq!(i64_values(&sales, "order_id").unwrap(), vec![Some(1)]);
        assert_eq!(f64_values(&sales, "total_revenue").unwrap(), vec![Some(100.0)]);
    }

    #[test]
    fn test_monthly_sales_precheck_is_advisory() {
        let sales = clean_sales(csv(SALES_CSV)).unwrap();
        // customer_id 0 fails the advisory input check but still aggregates
        let mut merged = sales.clone();
        merged
            .with_column(Series::new("customer_id".into(), vec![0i64, 2, 1, 3]))
            .unwrap();

        let monthly = monthly_sales(&merged).unwrap();
        assert_eq!(monthly.height(), 2);
        assert_eq!(
            i64_values(&monthly, "unique_customers").unwrap(),
            vec![Some(2), Some(2)]
        );
    }

    #[test]
    fn test_clean_customers_rejects_bad_email() {
        let raw = csv("customer_id,name,email,signup_date\n1,Alice,not-an-email,2023-05-01\n");
        let err = clean_customers(raw).unwrap_err();
        let report = err.validation_report().unwrap();
        assert_eq!(report.failures[0].column, "email");
    }

    #[test]
    fn test_merge_computes_profit_margin() {
        let sales = clean_sales(csv(SALES_CSV)).unwrap();
        let customers = clean_customers(csv(CUSTOMERS_CSV)).unwrap();
        let products = clean_products(csv(PRODUCTS_CSV)).unwrap();

        let merged = merge_data(&sales, &customers, &products).unwrap();
        assert_eq!(merged.height(), 4);
        let margins = f64_values(&merged, "profit_margin").unwrap();
        assert_eq!(margins[0], Some(0.2));
    }

    #[test]
    fn test_customer_segments_keep_four_columns() {
        let sales = clean_sales(csv(SALES_CSV)).unwrap();
        let customers = clean_customers(csv(CUSTOMERS_CSV)).unwrap();

        let segments = customer_segments(&sales, &customers).unwrap();
        assert_eq!(segments.width(), 4);
        assert_eq!(i64_values(&segments, "customer_id").unwrap(), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(
            str_values(&segments, "customer_segment").unwrap(),
            vec![Some("Low".to_string()), Some("Medium".to_string()), Some("Low".to_string())]
        );
    }

    #[test]
    fn test_sales_anomalies_flag_the_low_outlier() {
        let mut revenue = vec![100.0; 11];
        revenue.push(0.0);
        let n = revenue.len() as i64;
        let sales = df!(
            "order_id" => (1..=n).collect::<Vec<_>>(),
            "customer_id" => vec![1i64; revenue.len()],
            "product_id" => vec![7i64; revenue.len()],
            "order_date" => vec!["2024-01-01"; revenue.len()],
            "total_revenue" => revenue
        )
        .unwrap();
        let sales = parse_date_column(sales, "order_date", &DateFormat::Mixed).unwrap();

        let anomalies = sales_anomalies(&sales).unwrap();
        assert_eq!(i64_values(&anomalies, "order_id").unwrap(), vec![Some(12)]);
    }

    #[test]
    fn test_sales_forecast_rolls_in_row_order() {
        let sales = clean_sales(csv(SALES_CSV)).unwrap();
        let forecast = sales_forecast(&sales).unwrap();
        assert_eq!(
            f64_values(&forecast, "sales_forecast").unwrap(),
            vec![Some(100.0), Some(750.0), Some(600.0), Some(475.0)]
        );
    }

    #[test]
    fn test_pipeline_loads_every_nonempty_table() {
        let store = MemoryObjectStore::new()
            .with_object(BUCKET, "raw/sales.csv", SALES_CSV)
            .with_object(BUCKET, "raw/customers.csv", CUSTOMERS_CSV)
            .with_object(BUCKET, "raw/products.csv", PRODUCTS_CSV);
        let (env, _, warehouse) = env(store);

        PipelineRunner::default().run(&build(env)).unwrap();

        let monthly = warehouse
            .table(&TableTarget::new("ANALYTICS", "", "monthly_sales"))
            .unwrap();
        assert_eq!(f64_values(&monthly, "total_sales").unwrap(), vec![Some(1500.0), Some(400.0)]);
        assert_eq!(i64_values(&monthly, "unique_customers").unwrap(), vec![Some(2), Some(2)]);
        assert_eq!(warehouse.table_names().len(), 6);
        assert!(warehouse
            .table(&TableTarget::new("ANALYTICS", "", "detect_sales_anomalies"))
            .is_none());
    }

    #[test]
    fn test_pipeline_requires_every_entity() {
        let store = MemoryObjectStore::new()
            .with_object(BUCKET, "raw/sales.csv", SALES_CSV)
            .with_object(BUCKET, "raw/products.csv", PRODUCTS_CSV);
        let (env, _, _) = env(store);
        let err = PipelineRunner::default().run(&build(env)).unwrap_err();
        assert!(err.to_string().contains("no customer file found"));
    }
}
