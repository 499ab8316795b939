//! Error types for the retail ETL pipelines.
//!
//! Every stage surfaces failures to its caller instead of recovering locally.
//! The variants map onto the failure classes a run can hit: a missing source
//! object, a malformed source, a fatal schema violation after a transform,
//! and a failed write. An advisory pre-transform mismatch is never an error
//! value; it is logged and recorded on the gate state instead.
//!
//! Errors serialize as `{code, message}` so the CLI can emit them in its
//! JSON report.

use crate::schema::ValidationReport;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the ETL pipelines.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Run was cancelled through its cancellation token.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// No object or file matched the lookup.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A source object could not be parsed into a table.
    #[error("Failed to read '{source_name}': {reason}")]
    ReadFailed { source_name: String, reason: String },

    /// A post-transform schema rejected the table.
    #[error("{0}")]
    SchemaViolation(ValidationReport),

    /// Writing to a warehouse table or storage target failed.
    #[error("Failed to write '{target}': {reason}")]
    WriteFailed { target: String, reason: String },

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// A transform needs columns the table does not carry.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bucket edges or labels do not describe a valid partition.
    #[error("Invalid buckets: {0}")]
    InvalidBuckets(String),

    /// A loader was handed a table with no rows.
    #[error("Table '{0}' is empty")]
    EmptyTable(String),

    /// Task graph is malformed (cycle, unknown dependency, missing artifact).
    #[error("Task graph error: {0}")]
    TaskGraph(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request error (only with the "http" feature).
    #[cfg(feature = "http")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EtlError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for a read failure on a named source.
    pub fn read_failed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::ReadFailed {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a write failure on a named target.
    pub fn write_failed(target: impl Into<String>, reason: impl ToString) -> Self {
        EtlError::WriteFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Get a stable error code for reports and exit handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ReadFailed { .. } => "READ_FAILED",
            Self::SchemaViolation(_) => "SCHEMA_VIOLATION",
            Self::WriteFailed { .. } => "WRITE_FAILED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidBuckets(_) => "INVALID_BUCKETS",
            Self::EmptyTable(_) => "EMPTY_TABLE",
            Self::TaskGraph(_) => "TASK_GRAPH_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Yaml(_) => "YAML_ERROR",
            #[cfg(feature = "http")]
            Self::Http(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The validation report when this error is a schema violation.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::SchemaViolation(report) => Some(report),
            Self::WithContext { source, .. } => source.validation_report(),
            _ => None,
        }
    }
}

impl Serialize for EtlError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EtlError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EtlError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FailureCase, ValidationReport};

    #[test]
    fn test_error_code() {
        assert_eq!(EtlError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            EtlError::ColumnNotFound("amount".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            EtlError::read_failed("s3://b/k.csv", "bad row").error_code(),
            "READ_FAILED"
        );
    }

    #[test]
    fn test_is_cancelled_through_context() {
        assert!(EtlError::Cancelled.is_cancelled());
        assert!(EtlError::Cancelled.with_context("task merge").is_cancelled());
        assert!(!EtlError::NotFound("sales".to_string()).is_cancelled());
    }

    #[test]
    fn test_error_serialization() {
        let error = EtlError::NotFound("No sales file found".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("NOT_FOUND"));
        assert!(json.contains("No sales file found"));
    }

    #[test]
    fn test_with_context_preserves_code() {
        let error = EtlError::ColumnNotFound("region".to_string()).with_context("While cleaning");
        assert!(error.to_string().contains("While cleaning"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_schema_violation_exposes_report() {
        let mut report = ValidationReport::new("sales_output");
        report.push(FailureCase::row("discount", "in_range(0, 1)", 0, "1.5"));
        let error = EtlError::SchemaViolation(report).with_context("transform_sales");

        let report = error.validation_report().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(error.error_code(), "SCHEMA_VIOLATION");
    }

    #[test]
    fn test_missing_columns_message() {
        let error = EtlError::MissingColumns(vec!["profit".to_string(), "discount".to_string()]);
        assert_eq!(
            error.to_string(),
            "Missing required columns: profit, discount"
        );
    }
}
