//! Relational sources.
//!
//! Connection handling stays with the implementor; a pipeline only needs
//! "run this query, give me a table".

use crate::error::Result;
use polars::prelude::*;
use tracing::info;

/// Anything that can answer a SQL query with a table.
pub trait QuerySource: Send + Sync {
    fn query(&self, sql: &str) -> Result<DataFrame>;
}

impl<F> QuerySource for F
where
    F: Fn(&str) -> Result<DataFrame> + Send + Sync,
{
    fn query(&self, sql: &str) -> Result<DataFrame> {
        self(sql)
    }
}

/// Run `sql` against `source`, logging the call and the result shape.
pub fn extract_from_database(source: &dyn QuerySource, sql: &str) -> Result<DataFrame> {
    info!("Extracting data from database");
    let df = source.query(sql)?;
    info!("Extracted {:?} from database", df.shape());
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use pretty_assertions::assert_eq;

    fn sales_source(sql: &str) -> Result<DataFrame> {
        if !sql.to_lowercase().contains("from sales") {
            return Err(EtlError::NotFound(format!("no relation in '{sql}'")));
        }
        Ok(df!("sale_id" => [1i64, 2], "amount" => [9.5, 3.0])?)
    }

    #[test]
    fn test_extract_from_closure_source() {
        let df = extract_from_database(&sales_source, "SELECT * FROM sales").unwrap();
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn test_query_errors_propagate() {
        let err = extract_from_database(&sales_source, "SELECT 1").unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
