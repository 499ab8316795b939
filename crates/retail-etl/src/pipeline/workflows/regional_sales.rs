//! Regional sales: total `sales` per region appended to a warehouse table.

use super::PipelineEnv;
use crate::error::Result;
use crate::load::WriteMode;
use crate::pipeline::graph::TaskGraph;
use crate::pipeline::progress::PipelineStage;
use crate::schema::catalog::regional_sales::{REGION_TOTALS, SALES_INPUT};
use crate::schema::{post_check, pre_check};
use crate::transform::group_sum;
use crate::types::FileFormat;
use crate::utils::series;
use polars::prelude::DataFrame;
use polars::prelude::DataType;
use std::sync::Arc;
use tracing::info;

/// Warehouse entity the totals are appended to.
pub const LOAD_ENTITY: &str = "regional_sales";

/// Sum of `sales` per `region`, in region order.
///
/// `sales` must be numeric or a string of numbers; anything else fails the
/// cast instead of becoming null.
pub fn aggregate_regions(raw: DataFrame) -> Result<DataFrame> {
    let mut df = pre_check(&SALES_INPUT, raw).into_table();
    let sales = series(&df, "sales")?.strict_cast(&DataType::Float64)?;
    df.with_column(sales)?;

    let totals = group_sum(&df, &["region"], "sales", "sales")?;
    info!("Aggregated sales into {} regions", totals.height());
    post_check(&REGION_TOTALS, totals)
}

pub fn build(env: PipelineEnv) -> TaskGraph {
    let env = Arc::new(env);
    let (extract_env, load_env) = (env.clone(), env);

    TaskGraph::new("regional_sales")
        .task("extract_sales", PipelineStage::Extracting, &[], move |a| {
            let folder = &extract_env.context.storage().folder;
            a.insert("raw_sales", extract_env.read_selected(folder, FileFormat::Csv, "sales")?);
            Ok(())
        })
        .task("aggregate_regions", PipelineStage::Transforming, &["extract_sales"], |a| {
            let totals = aggregate_regions(a.cloned("raw_sales")?)?;
            a.insert("region_totals", totals);
            Ok(())
        })
        .task("load_region_totals", PipelineStage::Loading, &["aggregate_regions"], move |a| {
            load_env.load_entity(LOAD_ENTITY, a.get("region_totals")?, &WriteMode::Append)?;
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
    use crate::utils::{f64_values, str_values};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    const SALES_CSV: &str = "region,sales
west,10
east,2.5
west,5
east,7.5
";

    #[test]
    fn test_sums_per_region() {
        let raw = read_table(SALES_CSV.as_bytes().to_vec(), FileFormat::Csv, "sales.csv").unwrap();
        let totals = aggregate_regions(raw).unwrap();

        assert_eq!(
            str_values(&totals, "region").unwrap(),
            vec![Some("east".to_string()), Some("west".to_string())]
        );
        assert_eq!(f64_values(&totals, "sales").unwrap(), vec![Some(10.0), Some(15.0)]);
    }

    #[test]
    fn test_string_sales_are_cast() {
        let raw = df!("region" => ["north", "north"], "sales" => ["1.5", "2"]).unwrap();
        let totals = aggregate_regions(raw).unwrap();
        assert_eq!(f64_values(&totals, "sales").unwrap(), vec![Some(3.5)]);
    }

    #[test]
    fn test_non_numeric_sales_fail() {
        let raw = df!("region" => ["north"], "sales" => ["lots"]).unwrap();
        assert!(aggregate_regions(raw).is_err());
    }

    #[test]
    fn test_pipeline_appends_each_run() {
        let store = MemoryObjectStore::new();
        store.put(BUCKET, "raw/sales.csv", SALES_CSV.as_bytes().to_vec()).unwrap();
        let (env, _, warehouse) = env(store);
        let graph = build(env);

        PipelineRunner::default().run(&graph).unwrap();
        PipelineRunner::default().run(&graph).unwrap();

        let loaded = warehouse
            .table(&TableTarget::new("ANALYTICS", "", LOAD_ENTITY))
            .unwrap();
        assert_eq!(loaded.height(), 4);
    }
}
