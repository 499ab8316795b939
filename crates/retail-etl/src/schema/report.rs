//! Validation failure reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Number of failure cases rendered by `Display` before the rest are summarised.
const DISPLAY_LIMIT: usize = 10;

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCase {
    /// Column the check ran against.
    pub column: String,

    /// Check description, e.g. `greater_than(0)`.
    pub check: String,

    /// Row index for value-level failures; `None` for column-level ones
    /// (missing column, wrong dtype, undeclared column).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,

    /// Offending value, or the reason for a column-level failure.
    pub value: String,
}

impl FailureCase {
    /// A value-level failure at `row`.
    pub fn row(
        column: impl Into<String>,
        check: impl Into<String>,
        row: usize,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            check: check.into(),
            row: Some(row),
            value: value.into(),
        }
    }

    /// A failure that concerns the column as a whole.
    pub fn column(
        column: impl Into<String>,
        check: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            check: check.into(),
            row: None,
            value: reason.into(),
        }
    }
}

impl fmt::Display for FailureCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(
                f,
                "{} {} failed at row {} (value: {})",
                self.column, self.check, row, self.value
            ),
            None => write!(f, "{} {} failed: {}", self.column, self.check, self.value),
        }
    }
}

/// Every failure collected while validating one table against one schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Name of the schema that was applied.
    pub schema: String,

    /// Rows in the validated table.
    pub rows_checked: usize,

    pub failures: Vec<FailureCase>,
}

impl ValidationReport {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            rows_checked: 0,
            failures: Vec::new(),
        }
    }

    pub fn push(&mut self, failure: FailureCase) {
        self.failures.push(failure);
    }

    /// True when no check failed.
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Distinct columns with at least one failure.
    pub fn failed_columns(&self) -> BTreeSet<&str> {
        self.failures.iter().map(|f| f.column.as_str()).collect()
    }

    /// Distinct rows with at least one value-level failure.
    pub fn failed_rows(&self) -> BTreeSet<usize> {
        self.failures.iter().filter_map(|f| f.row).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "Schema '{}' passed", self.schema);
        }
        write!(
            f,
            "Schema '{}' failed with {} failure case(s): ",
            self.schema,
            self.failures.len()
        )?;
        for (i, failure) in self.failures.iter().take(DISPLAY_LIMIT).enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        if self.failures.len() > DISPLAY_LIMIT {
            write!(f, "; ... and {} more", self.failures.len() - DISPLAY_LIMIT)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_lists_failures() {
        let mut report = ValidationReport::new("sales_output");
        report.push(FailureCase::row("discount", "in_range(0, 1)", 2, "1.5"));
        report.push(FailureCase::column("timestamp", "column_in_dataframe", "column is missing"));

        assert_eq!(
            report.to_string(),
            "Schema 'sales_output' failed with 2 failure case(s): \
             discount in_range(0, 1) failed at row 2 (value: 1.5); \
             timestamp column_in_dataframe failed: column is missing"
        );
    }

    #[test]
    fn test_display_truncates() {
        let mut report = ValidationReport::new("s");
        for row in 0..12 {
            report.push(FailureCase::row("a", "greater_than(0)", row, "-1"));
        }
        assert!(report.to_string().ends_with("; ... and 2 more"));
        assert_eq!(report.failed_rows().len(), 12);
        assert_eq!(report.failed_columns().len(), 1);
    }

    #[test]
    fn test_serialize_skips_missing_row() {
        let case = FailureCase::column("a", "dtype('Int')", "found str");
        let json = serde_json::to_string(&case).unwrap();
        assert!(!json.contains("\"row\""));
    }
}
