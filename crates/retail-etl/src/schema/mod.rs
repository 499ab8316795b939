//! Declarative table schemas and the validation gate.
//!
//! A [`TableSchema`] lists the columns a table must carry, each with a
//! scalar type, nullability, uniqueness and a list of value [`Check`]s.
//! Validation is lazy: every failing check on every row is collected into a
//! [`ValidationReport`] instead of stopping at the first one.
//!
//! The gate in [`gate`] applies schemas with two different contracts: a
//! pre-transform check that only warns, and a post-transform check that
//! rejects the table.

pub mod catalog;
mod check;
mod gate;
mod report;

pub use check::Check;
pub use gate::{GateState, PreChecked, post_check, pre_check};
pub use report::{FailureCase, ValidationReport};

use crate::error::Result;
use crate::utils::{display_any, is_integer_dtype};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Logical column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Int,
    /// Any numeric column; integer columns are accepted.
    Float,
    Str,
    Bool,
    DateTime,
}

impl ScalarType {
    /// Whether a physical dtype satisfies this type.
    pub fn accepts(&self, dtype: &DataType) -> bool {
        match self {
            Self::Int => is_integer_dtype(dtype),
            Self::Float => {
                is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
            }
            Self::Str => matches!(dtype, DataType::String),
            Self::Bool => matches!(dtype, DataType::Boolean),
            Self::DateTime => matches!(dtype, DataType::Datetime(_, _) | DataType::Date),
        }
    }

    /// Whether a column of this type can be produced by cleaning a column of
    /// type `earlier` without loosening its contract.
    ///
    /// Parsing turns strings into datetimes and integer ids may be read as
    /// floats before the cast, so both are refinements.
    pub fn refines(&self, earlier: ScalarType) -> bool {
        *self == earlier
            || matches!(
                (earlier, self),
                (Self::Str, Self::DateTime) | (Self::Float, Self::Int)
            )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int64",
            Self::Float => "float64",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::DateTime => "datetime64[ms]",
        };
        f.write_str(name)
    }
}

/// Contract for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub scalar_type: ScalarType,
    pub nullable: bool,
    pub unique: bool,
    pub checks: Vec<Check>,
}

impl ColumnSpec {
    /// A required, non-nullable column with no value checks.
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            nullable: false,
            unique: false,
            checks: Vec::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
}

/// Contract for a whole table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    /// Reject columns the schema does not declare.
    pub strict: bool,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            strict: false,
        }
    }

    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Run every check and collect all failures.
    ///
    /// A column with the wrong dtype gets one column-level failure and its
    /// value checks are skipped.
    pub fn validate(&self, df: &DataFrame) -> Result<ValidationReport> {
        let mut report = ValidationReport::new(&self.name);
        report.rows_checked = df.height();

        for spec in &self.columns {
            let Ok(column) = df.column(&spec.name) else {
                report.push(FailureCase::column(
                    &spec.name,
                    "column_in_dataframe",
                    "column is missing",
                ));
                continue;
            };
            let series = column.as_materialized_series();

            if !spec.scalar_type.accepts(series.dtype()) {
                report.push(FailureCase::column(
                    &spec.name,
                    format!("dtype('{}')", spec.scalar_type),
                    format!("found {}", series.dtype()),
                ));
                continue;
            }

            if !spec.nullable && series.null_count() > 0 {
                for (row, is_null) in series.is_null().into_iter().enumerate() {
                    if is_null == Some(true) {
                        report.push(FailureCase::row(&spec.name, "not_nullable", row, "null"));
                    }
                }
            }

            if spec.unique {
                for row in duplicate_rows(series)? {
                    report.push(FailureCase::row(
                        &spec.name,
                        "field_uniqueness",
                        row,
                        display_any(&series.get(row)?),
                    ));
                }
            }

            for check in &spec.checks {
                let name = check.to_string();
                for (row, value) in check.failures(series)? {
                    report.push(FailureCase::row(&spec.name, name.clone(), row, value));
                }
            }
        }

        if self.strict {
            for name in df.get_column_names() {
                if self.get(name.as_str()).is_none() {
                    report.push(FailureCase::column(
                        name.as_str(),
                        "column_in_schema",
                        "column is not declared",
                    ));
                }
            }
        }

        Ok(report)
    }
}

/// Rows holding a non-null value that occurs more than once.
fn duplicate_rows(series: &Series) -> Result<Vec<usize>> {
    let mut keys = Vec::with_capacity(series.len());
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in 0..series.len() {
        let value = series.get(row)?;
        if value.is_null() {
            keys.push(None);
            continue;
        }
        let key = display_any(&value);
        *counts.entry(key.clone()).or_insert(0) += 1;
        keys.push(Some(key));
    }
    Ok(keys
        .into_iter()
        .enumerate()
        .filter_map(|(row, key)| match key {
            Some(k) if counts.get(&k).copied().unwrap_or(0) > 1 => Some(row),
            _ => None,
        })
        .collect())
}
