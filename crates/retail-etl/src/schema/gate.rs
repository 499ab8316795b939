//! The schema gate.
//!
//! A table moves through the gate as
//! `Unvalidated -> Passed | PassedWithWarnings` on the pre-transform check
//! and then `Accepted | Rejected` on the post-transform check. The two checks
//! are separate functions because their contracts differ: the pre-check
//! never fails and hands back the data untouched, the post-check turns any
//! failure into [`EtlError::SchemaViolation`].

use super::{FailureCase, TableSchema, ValidationReport};
use crate::error::{EtlError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Where a table stands in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Unvalidated,
    /// Pre-check found nothing.
    Passed,
    /// Pre-check found violations; the data continues anyway.
    PassedWithWarnings,
    /// Post-check found nothing.
    Accepted,
    /// Post-check found violations; the run stops.
    Rejected,
}

impl GateState {
    /// Whether the table may continue to the next stage.
    pub fn may_proceed(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Output of [`pre_check`]: the unchanged table plus what was found.
#[derive(Debug, Clone)]
pub struct PreChecked {
    pub table: DataFrame,
    pub state: GateState,
    pub report: ValidationReport,
}

impl PreChecked {
    pub fn into_table(self) -> DataFrame {
        self.table
    }
}

/// Advisory validation before a transform.
///
/// Violations are logged at `warn` and recorded in the report; the original
/// table is returned as-is, whatever the outcome.
pub fn pre_check(schema: &TableSchema, table: DataFrame) -> PreChecked {
    let report = match schema.validate(&table) {
        Ok(report) => report,
        Err(e) => {
            let mut report = ValidationReport::new(&schema.name);
            report.rows_checked = table.height();
            report.push(FailureCase::column("*", "validation", e.to_string()));
            report
        }
    };

    let state = if report.is_valid() {
        debug!("Pre-validation of '{}' passed", schema.name);
        GateState::Passed
    } else {
        warn!("Pre-validation failed, continuing with unvalidated data: {}", report);
        GateState::PassedWithWarnings
    };

    PreChecked {
        table,
        state,
        report,
    }
}

/// Blocking validation after a transform.
///
/// Returns the table when every check passes, otherwise
/// [`EtlError::SchemaViolation`] carrying every failure case.
pub fn post_check(schema: &TableSchema, table: DataFrame) -> Result<DataFrame> {
    let report = schema.validate(&table)?;
    if report.is_valid() {
        info!(
            "Post-validation of '{}' accepted {} rows",
            schema.name,
            table.height()
        );
        Ok(table)
    } else {
        error!("Post-validation rejected table: {}", report);
        Err(EtlError::SchemaViolation(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Check, ColumnSpec, ScalarType};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn schema() -> TableSchema {
        TableSchema::new("sales_output")
            .column(ColumnSpec::new("customer_id", ScalarType::Int).check(Check::Gt(0.0)))
            .column(
                ColumnSpec::new("discount", ScalarType::Float)
                    .check(Check::InRange { min: 0.0, max: 1.0 }),
            )
    }

    #[test]
    fn test_pre_check_returns_nonconforming_rows() {
        let df = df!(
            "customer_id" => [-5i64, 2],
            "discount" => [0.1, 0.2]
        )
        .unwrap();
        let checked = pre_check(&schema(), df.clone());

        assert_eq!(checked.state, GateState::PassedWithWarnings);
        assert!(checked.state.may_proceed());
        assert_eq!(checked.report.failed_rows().into_iter().collect::<Vec<_>>(), vec![0]);
        assert!(checked.table.equals_missing(&df));
    }

    #[test]
    fn test_pre_check_passes_clean_table() {
        let df = df!("customer_id" => [1i64], "discount" => [0.0]).unwrap();
        assert_eq!(pre_check(&schema(), df).state, GateState::Passed);
    }

    #[test]
    fn test_post_check_rejects_out_of_range_discount() {
        let df = df!("customer_id" => [1i64, 2], "discount" => [0.5, 1.5]).unwrap();
        let err = post_check(&schema(), df).unwrap_err();

        assert_eq!(err.error_code(), "SCHEMA_VIOLATION");
        let report = err.validation_report().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].check, "in_range(0, 1)");
        assert_eq!(report.failures[0].row, Some(1));
    }

    #[test]
    fn test_post_check_accepts_valid_table() {
        let df = df!("customer_id" => [1i64], "discount" => [1.0]).unwrap();
        assert_eq!(post_check(&schema(), df).unwrap().height(), 1);
    }
}
