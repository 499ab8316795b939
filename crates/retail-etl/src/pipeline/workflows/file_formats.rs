//! File-format lab and exercise.
//!
//! The lab reads the same sales from CSV and Parquet objects, cleans both and
//! loads one warehouse table per format. The exercise validates local JSON
//! exports (customers, nested orders), the raw CSV sales, and optionally a
//! scraped weather row and a database table, then writes them back out to
//! local files and storage.

use super::PipelineEnv;
use crate::cleaner::{
    DateFormat, HeaderStyle, cast_int, fill_null_float, fill_null_int, normalize_headers,
    parse_date_column, with_product,
};
use crate::error::{EtlError, Result};
use crate::extract::{extract_from_database, read_json_records, read_nested_json};
use crate::load::{WriteMode, load_local};
use crate::pipeline::graph::{Artifacts, TaskGraph};
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::file_formats::{
    CUSTOMERS, LAB_SALES_INPUT, LAB_SALES_OUTPUT, ORDERS, SALES, WEATHER,
};
use crate::schema::{post_check, pre_check};
use crate::types::FileFormat;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DATE_LAYOUT: &str = "%d-%m-%y";
pub const CSV_ENTITY: &str = "sales_data_csv";
pub const PARQUET_ENTITY: &str = "sales_data_parquet";
pub const CUSTOMERS_FILE: &str = "customers.json";
pub const ORDERS_FILE: &str = "orders.json";
pub const DATABASE_QUERY: &str = "SELECT * FROM sales_data;";
/// Storage prefix receiving the exercise uploads.
pub const UPLOAD_FOLDER: &str = "test_load_data";

/// Clean lab sales: snake_case headers, day-first dates, `-1` for missing
/// ids, `0` for missing amounts and quantities, and a revenue column.
pub fn transform_lab_sales(raw: DataFrame) -> Result<DataFrame> {
    info!("Transforming lab sales data");
    let df = normalize_headers(raw, HeaderStyle::SnakeLower)?;
    let df = pre_check(&LAB_SALES_INPUT, df).into_table();

    let df = parse_date_column(df, "order_date", &DateFormat::fixed(DATE_LAYOUT))?;
    let df = fill_null_int(df, "order_id", -1)?;
    let df = fill_null_int(df, "customer_id", -1)?;
    let df = fill_null_float(df, "amount", 0.0)?;
    let df = fill_null_int(df, "quantity", 0)?;
    let df = with_product(df, "amount", "quantity", "total_revenue")?;

    post_check(&LAB_SALES_OUTPUT, df)
}

/// Customers exactly as exported; ids unique, names and emails well formed.
pub fn validate_customers(raw: DataFrame) -> Result<DataFrame> {
    post_check(&CUSTOMERS, raw)
}

/// Flattened order lines with integer ids.
pub fn validate_orders(raw: DataFrame) -> Result<DataFrame> {
    let df = cast_int(raw, "order_id")?;
    let df = cast_int(df, "customer_id")?;
    post_check(&ORDERS, df)
}

/// Raw CSV sales with parsed dates; every value must be present and positive.
pub fn validate_sales(raw: DataFrame) -> Result<DataFrame> {
    let df = normalize_headers(raw, HeaderStyle::SnakeLower)?;
    let df = parse_date_column(df, "order_date", &DateFormat::Mixed)?;
    post_check(&SALES, df)
}

pub fn validate_weather(raw: DataFrame) -> Result<DataFrame> {
    post_check(&WEATHER, raw)
}

fn local_input(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    if !path.is_file() {
        return Err(EtlError::NotFound(format!(
            "no {} in {}",
            file_name,
            dir.display()
        )));
    }
    Ok(path)
}

/// Weather page and city, when both are configured and HTTP is compiled in.
fn weather_source(env: &PipelineEnv) -> Option<(String, String)> {
    let api = env.context.api();
    let (url, city) = (api.weather_url.clone()?, api.city.clone()?);
    if cfg!(feature = "http") {
        Some((url, city))
    } else {
        warn!("Weather source configured but HTTP support is not compiled in, skipping");
        None
    }
}

#[cfg(feature = "http")]
fn fetch_weather(url: &str, city: &str) -> Result<DataFrame> {
    crate::extract::fetch_weather(url, city)
}

#[cfg(not(feature = "http"))]
fn fetch_weather(url: &str, _city: &str) -> Result<DataFrame> {
    Err(EtlError::InvalidConfig(format!(
        "cannot fetch {url}: built without the http feature"
    )))
}

fn export_local(env: &PipelineEnv, artifacts: &Artifacts) -> Result<()> {
    let dir = &env.context.local().output_dir;
    if artifacts.contains("database_sales") {
        load_local(dir, "sales_data_db", FileFormat::Json, artifacts.get("database_sales")?)?;
    }
    load_local(dir, "customers_data", FileFormat::Json, artifacts.get("customers")?)?;
    load_local(dir, "orders_data", FileFormat::Json, artifacts.get("orders")?)?;
    load_local(dir, "sales_data", FileFormat::Csv, artifacts.get("sales")?)?;
    if artifacts.contains("weather") {
        load_local(dir, "weather_data", FileFormat::Csv, artifacts.get("weather")?)?;
    }
    Ok(())
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let weather = weather_source(&env);
    let has_database = env.query_source.is_some();

    let mut validate_deps = vec!["extract_customers", "extract_orders", "extract_csv_sales"];
    if weather.is_some() {
        validate_deps.push("extract_weather");
    }
    let mut export_deps = vec!["validate_exercise"];
    if has_database {
        export_deps.push("extract_database");
    }

    let (e1, e2, e3, e4) = (env.clone(), env.clone(), env.clone(), env.clone());
    let (e5, e6, e7, e8) = (env.clone(), env.clone(), env.clone(), env.clone());

    let mut graph = TaskGraph::new("file_formats")
        .task("extract_csv_sales", PipelineStage::Extracting, &[], move |a| {
            let folder = &e1.context.storage().folder;
            a.insert("raw_csv_sales", e1.read_selected(folder, FileFormat::Csv, "sales")?);
            Ok(())
        })
        .task("extract_parquet_sales", PipelineStage::Extracting, &[], move |a| {
            let folder = &e2.context.storage().folder;
            a.insert("raw_parquet_sales", e2.read_selected(folder, FileFormat::Parquet, "sales")?);
            Ok(())
        })
        .task("transform_csv_sales", PipelineStage::Cleaning, &["extract_csv_sales"], |a| {
            let sales = transform_lab_sales(a.cloned("raw_csv_sales")?)?;
            a.insert("lab_csv_sales", sales);
            Ok(())
        })
        .task("transform_parquet_sales", PipelineStage::Cleaning, &["extract_parquet_sales"], |a| {
            let sales = transform_lab_sales(a.cloned("raw_parquet_sales")?)?;
            a.insert("lab_parquet_sales", sales);
            Ok(())
        })
        .task("load_csv_sales", PipelineStage::Loading, &["transform_csv_sales"], move |a| {
            e3.load_entity(CSV_ENTITY, a.get("lab_csv_sales")?, &WriteMode::Replace)?;
            Ok(())
        })
        .task("load_parquet_sales", PipelineStage::Loading, &["transform_parquet_sales"], move |a| {
            e4.load_entity(PARQUET_ENTITY, a.get("lab_parquet_sales")?, &WriteMode::Replace)?;
            Ok(())
        })
        .task("extract_customers", PipelineStage::Extracting, &[], move |a| {
            let path = local_input(&e5.context.local().data_dir, CUSTOMERS_FILE)?;
            a.insert("raw_customers", read_json_records(path)?);
            Ok(())
        })
        .task("extract_orders", PipelineStage::Extracting, &[], move |a| {
            let path = local_input(&e6.context.local().data_dir, ORDERS_FILE)?;
            let orders = read_nested_json(path, "order_details", &["order_id", "customer_id"])?;
            a.insert("raw_orders", orders);
            Ok(())
        });

    if let Some((url, city)) = weather {
        graph = graph.task("extract_weather", PipelineStage::Extracting, &[], move |a| {
            a.insert("raw_weather", fetch_weather(&url, &city)?);
            Ok(())
        });
    }

    if let Some(source) = env.query_source.clone() {
        graph = graph.task("extract_database", PipelineStage::Extracting, &[], move |a| {
            a.insert("database_sales", extract_from_database(source.as_ref(), DATABASE_QUERY)?);
            Ok(())
        });
    }

    graph
        .task("validate_exercise", PipelineStage::Validating, &validate_deps, |a| {
            let customers = validate_customers(a.cloned("raw_customers")?)?;
            let orders = validate_orders(a.cloned("raw_orders")?)?;
            let sales = validate_sales(a.cloned("raw_csv_sales")?)?;
            a.insert("customers", customers);
            a.insert("orders", orders);
            a.insert("sales", sales);
            if a.contains("raw_weather") {
                let weather = validate_weather(a.cloned("raw_weather")?)?;
                a.insert("weather", weather);
            }
            Ok(())
        })
        .task("export_local", PipelineStage::Loading, &export_deps, move |a| {
            export_local(&e7, a)
        })
        .task("upload_exports", PipelineStage::Loading, &["validate_exercise"], move |a| {
            let sales_key = format!("{UPLOAD_FOLDER}/sales_data.csv");
            let orders_key = format!("{UPLOAD_FOLDER}/orders_data.csv");
            e8.write_object(&sales_key, FileFormat::Csv, a.get("sales")?)?;
            e8.write_object(&orders_key, FileFormat::Csv, a.get("orders")?)
        })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::{EtlConfig, RunContext};
    use crate::extract::{MemoryObjectStore, ObjectStore, read_local_table, read_table};
    use crate::load::{MemoryWarehouse, TableTarget, write_table};
    use crate::pipeline::graph::PipelineRunner;
    use crate::utils::{f64_values, i64_values, millis_values};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SALES_CSV: &str = "Order ID,Customer ID,Amount,Quantity,Order Date
1,10,25.5,2,05-01-24
2,11,10.0,1,06-01-24
";

    const CUSTOMERS_JSON: &str = r#"[
        {"customer_id": 10, "name": "Ana Petrova", "email": "ana@example.com"},
        {"customer_id": 11, "name": "Ivan O'Neil", "email": "ivan.o@example.org"}
    ]"#;

    const ORDERS_JSON: &str = r#"[
        {"order_id": 1, "customer_id": 10, "order_details": [
            {"product": "Lamp", "quantity": 2, "price": 12.75}
        ]},
        {"order_id": 2, "customer_id": 11, "order_details": [
            {"product": "Desk", "quantity": 1, "price": 10.0},
            {"product": "Chair", "quantity": 4, "price": 2.5}
        ]}
    ]"#;

    fn raw_lab_sales() -> DataFrame {
        df!(
            "Order ID" => [Some(1.0), None, Some(3.0)],
            "Customer ID" => [Some(10.0), Some(11.0), None],
            "Amount" => [Some(20.0), None, Some(5.0)],
            "Quantity" => [Some(2.0), Some(1.0), None],
            "Order Date" => [Some("05-01-24"), Some("not a date"), None::<&str>]
        )
        .unwrap()
    }

    fn parquet_sales() -> Vec<u8> {
        write_table(&raw_lab_sales(), FileFormat::Parquet).unwrap()
    }

    fn local_context(data: &Path, output: &Path) -> RunContext {
        let config = EtlConfig::builder()
            .bucket(BUCKET)
            .folder("raw")
            .database("ANALYTICS")
            .local_dirs(data, output)
            .build()
            .unwrap();
        RunContext::new(config).unwrap()
    }

    fn write_inputs(dir: &Path) {
        std::fs::write(dir.join(CUSTOMERS_FILE), CUSTOMERS_JSON).unwrap();
        std::fs::write(dir.join(ORDERS_FILE), ORDERS_JSON).unwrap();
    }

    #[test]
    fn test_transform_lab_sales_fills_missing_values() {
        let sales = transform_lab_sales(raw_lab_sales()).unwrap();

        assert_eq!(i64_values(&sales, "order_id").unwrap(), vec![Some(1), Some(-1), Some(3)]);
        assert_eq!(i64_values(&sales, "customer_id").unwrap(), vec![Some(10), Some(11), Some(-1)]);
        assert_eq!(i64_values(&sales, "quantity").unwrap(), vec![Some(2), Some(1), Some(0)]);
        assert_eq!(
            f64_values(&sales, "total_revenue").unwrap(),
            vec![Some(40.0), Some(0.0), Some(0.0)]
        );
        let dates = millis_values(&sales, "order_date").unwrap();
        assert!(dates[0].is_some());
        assert_eq!(&dates[1..], &[None, None]);
    }

    #[test]
    fn test_transform_lab_sales_rejects_negative_amounts() {
        let raw = df!(
            "order_id" => [1i64],
            "customer_id" => [2i64],
            "amount" => [-4.0],
            "quantity" => [1i64],
            "order_date" => ["05-01-24"]
        )
        .unwrap();
        let err = transform_lab_sales(raw).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
    }

    #[test]
    fn test_validate_customers_rejects_bad_email() {
        let raw = df!(
            "customer_id" => [1i64, 2],
            "name" => ["Ana", "Bo"],
            "email" => ["ana@example.com", "not-an-email"]
        )
        .unwrap();
        let err = validate_customers(raw).unwrap_err();
        let report = err.validation_report().unwrap();
        assert_eq!(report.failures[0].column, "email");
    }

    #[test]
    fn test_validate_sales_is_strict_about_columns() {
        let csv = "order_id,customer_id,amount,quantity,order_date,note\n1,2,3.0,1,2024-01-05,x\n";
        let raw = read_table(csv.as_bytes().to_vec(), FileFormat::Csv, "sales.csv").unwrap();
        let err = validate_sales(raw).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
    }

    #[test]
    fn test_pipeline_loads_both_formats_and_exports() {
        let data = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_inputs(data.path());

        let store = Arc::new(
            MemoryObjectStore::new()
                .with_object(BUCKET, "raw/sales_data.csv", SALES_CSV)
                .with_object(BUCKET, "raw/sales_data.parquet", parquet_sales()),
        );
        let warehouse = Arc::new(MemoryWarehouse::new());
        let env = PipelineEnv::new(
            local_context(data.path(), output.path()),
            store.clone(),
            warehouse.clone(),
        );

        let run = PipelineRunner::default().run(&build(env)).unwrap();
        assert_eq!(run.summary.tasks.len(), 11);

        let csv = warehouse.table(&TableTarget::new("ANALYTICS", "", CSV_ENTITY)).unwrap();
        assert_eq!(csv.height(), 2);
        let parquet = warehouse.table(&TableTarget::new("ANALYTICS", "", PARQUET_ENTITY)).unwrap();
        assert_eq!(i64_values(&parquet, "order_id").unwrap(), vec![Some(1), Some(-1), Some(3)]);

        let orders = read_local_table(output.path().join("orders_data.json")).unwrap();
        assert_eq!(orders.height(), 3);
        assert!(output.path().join("customers_data.json").is_file());
        assert!(output.path().join("sales_data.csv").is_file());
        assert!(!output.path().join("weather_data.csv").exists());

        let uploaded = store.get(BUCKET, "test_load_data/orders_data.csv").unwrap();
        let uploaded = read_table(uploaded, FileFormat::Csv, "orders_data.csv").unwrap();
        assert_eq!(uploaded.height(), 3);
    }

    #[test]
    fn test_pipeline_exports_database_table_when_source_is_set() {
        let data = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_inputs(data.path());

        let store = MemoryObjectStore::new()
            .with_object(BUCKET, "raw/sales_data.csv", SALES_CSV)
            .with_object(BUCKET, "raw/sales_data.parquet", parquet_sales());
        let (env, _, _) = env(store);
        let env = PipelineEnv {
            context: local_context(data.path(), output.path()),
            ..env
        }
        .with_query_source(Arc::new(|_: &str| -> Result<DataFrame> {
            Ok(df!("order_id" => [7i64], "amount" => [1.5])?)
        }));

        let graph = build(env);
        assert!(graph.ordered_names().unwrap().contains(&"extract_database"));
        PipelineRunner::default().run(&graph).unwrap();

        let exported = read_local_table(output.path().join("sales_data_db.json")).unwrap();
        assert_eq!(i64_values(&exported, "order_id").unwrap(), vec![Some(7)]);
    }

    #[test]
    fn test_pipeline_requires_local_exports() {
        let data = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let store = MemoryObjectStore::new()
            .with_object(BUCKET, "raw/sales_data.csv", SALES_CSV)
            .with_object(BUCKET, "raw/sales_data.parquet", parquet_sales());
        let env = PipelineEnv::new(
            local_context(data.path(), output.path()),
            Arc::new(store),
            Arc::new(MemoryWarehouse::new()),
        );

        let err = PipelineRunner::default().run(&build(env)).unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
