//! Configuration types for the ETL pipelines.
//!
//! The configuration mirrors the declarative YAML file each pipeline reads at
//! process start: a storage connection id, bucket and folder names, and the
//! warehouse database with one `{schema, table}` target per loaded entity.
//! Use [`EtlConfig::builder()`] for programmatic setup or
//! [`EtlConfig::from_yaml_file`] to load the file. Once resolved, the config is
//! frozen into a [`RunContext`] for a single execution.

use crate::error::{EtlError, Result, ResultExt};
use crate::load::TableTarget;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Object storage locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Bucket holding every input and output object.
    pub bucket: String,

    /// Prefix scanned by pipelines that read a single folder.
    #[serde(default)]
    pub folder: String,

    /// Prefix holding raw inputs.
    #[serde(default)]
    pub input_folder: String,

    /// Prefix receiving cleaned tables.
    #[serde(default)]
    pub output_folder: String,

    /// Prefix receiving analytics tables.
    #[serde(default)]
    pub analytics_folder: String,
}

/// A warehouse destination for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub schema: String,
    pub table: String,
}

/// Warehouse connection and per-entity targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WarehouseConfig {
    /// Connection identifier resolved by the external connection layer.
    #[serde(default)]
    pub conn_id: String,

    /// Database all targets live in.
    #[serde(default)]
    pub database: String,

    /// Entity name (e.g. `sales`, `monthly_sales`) to schema/table.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

/// Local filesystem locations used by the file-based pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory holding local JSON inputs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory receiving local outputs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// HTTP sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// Weather page scraped for the current temperature.
    #[serde(default)]
    pub weather_url: Option<String>,

    /// City label attached to the scraped weather row.
    #[serde(default)]
    pub city: Option<String>,
}

/// Resolved configuration for the ETL pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Storage connection identifier.
    #[serde(default = "default_conn_id")]
    pub aws_conn_id: String,

    /// Object storage locations.
    pub s3: StorageConfig,

    /// Warehouse targets.
    #[serde(default, alias = "warehouse")]
    pub snowflake: WarehouseConfig,

    /// Local filesystem locations.
    #[serde(default)]
    pub local: LocalConfig,

    /// HTTP sources.
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_conn_id() -> String {
    "aws_default".to_string()
}

impl EtlConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EtlConfigBuilder {
        EtlConfigBuilder::default()
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EtlConfig = serde_yaml::from_str(yaml)?;
        config
            .validate()
            .map_err(|e| EtlError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path)
            .context(format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigValidationError::EmptyField("s3.bucket".to_string()));
        }

        for (entity, target) in &self.snowflake.targets {
            if target.schema.trim().is_empty() {
                return Err(ConfigValidationError::IncompleteTarget {
                    entity: entity.clone(),
                    field: "schema".to_string(),
                });
            }
            if target.table.trim().is_empty() {
                return Err(ConfigValidationError::IncompleteTarget {
                    entity: entity.clone(),
                    field: "table".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Required field '{0}' is empty")]
    EmptyField(String),

    #[error("Warehouse target '{entity}' has an empty '{field}'")]
    IncompleteTarget { entity: String, field: String },
}

/// Builder for [`EtlConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EtlConfigBuilder {
    aws_conn_id: Option<String>,
    s3: StorageConfig,
    conn_id: Option<String>,
    database: Option<String>,
    targets: BTreeMap<String, TargetConfig>,
    local: Option<LocalConfig>,
    api: ApiConfig,
}

impl EtlConfigBuilder {
    /// Set the storage connection id.
    pub fn aws_conn_id(mut self, id: impl Into<String>) -> Self {
        self.aws_conn_id = Some(id.into());
        self
    }

    /// Set the bucket all objects are read from and written to.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.s3.bucket = bucket.into();
        self
    }

    /// Set the single-folder prefix.
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.s3.folder = folder.into();
        self
    }

    /// Set the raw input prefix.
    pub fn input_folder(mut self, folder: impl Into<String>) -> Self {
        self.s3.input_folder = folder.into();
        self
    }

    /// Set the cleaned output prefix.
    pub fn output_folder(mut self, folder: impl Into<String>) -> Self {
        self.s3.output_folder = folder.into();
        self
    }

    /// Set the analytics output prefix.
    pub fn analytics_folder(mut self, folder: impl Into<String>) -> Self {
        self.s3.analytics_folder = folder.into();
        self
    }

    /// Set the warehouse connection id.
    pub fn warehouse_conn_id(mut self, id: impl Into<String>) -> Self {
        self.conn_id = Some(id.into());
        self
    }

    /// Set the warehouse database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Register a warehouse target for an entity.
    pub fn target(
        mut self,
        entity: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        self.targets.insert(
            entity.into(),
            TargetConfig {
                schema: schema.into(),
                table: table.into(),
            },
        );
        self
    }

    /// Set local input/output directories.
    pub fn local_dirs(mut self, data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        self.local = Some(LocalConfig {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
        });
        self
    }

    /// Set the weather page and city.
    pub fn weather(mut self, url: impl Into<String>, city: impl Into<String>) -> Self {
        self.api.weather_url = Some(url.into());
        self.api.city = Some(city.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EtlConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<EtlConfig, ConfigValidationError> {
        let config = EtlConfig {
            aws_conn_id: self.aws_conn_id.unwrap_or_else(default_conn_id),
            s3: self.s3,
            snowflake: WarehouseConfig {
                conn_id: self.conn_id.unwrap_or_default(),
                database: self.database.unwrap_or_default(),
                targets: self.targets,
            },
            local: self.local.unwrap_or_default(),
            api: self.api,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration frozen for one pipeline execution.
///
/// Cheap accessors only; nothing here is mutable once constructed.
#[derive(Debug, Clone)]
pub struct RunContext {
    config: EtlConfig,
}

impl RunContext {
    /// Freeze a validated configuration.
    pub fn new(config: EtlConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| EtlError::InvalidConfig(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn bucket(&self) -> &str {
        &self.config.s3.bucket
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.config.s3
    }

    pub fn local(&self) -> &LocalConfig {
        &self.config.local
    }

    pub fn api(&self) -> &ApiConfig {
        &self.config.api
    }

    /// Object key under the output folder.
    pub fn output_key(&self, file_name: &str) -> String {
        join_key(&self.config.s3.output_folder, file_name)
    }

    /// Object key under the analytics folder.
    pub fn analytics_key(&self, file_name: &str) -> String {
        join_key(&self.config.s3.analytics_folder, file_name)
    }

    /// Resolve the warehouse target registered for `entity`.
    pub fn target(&self, entity: &str) -> Result<TableTarget> {
        let target = self.config.snowflake.targets.get(entity).ok_or_else(|| {
            EtlError::InvalidConfig(format!("no warehouse target configured for '{entity}'"))
        })?;
        Ok(TableTarget::new(
            &self.config.snowflake.database,
            &target.schema,
            &target.table,
        ))
    }

    /// Resolve the target for `entity`, falling back to a table of the same
    /// name in the default schema when none is configured.
    pub fn target_or_default(&self, entity: &str) -> TableTarget {
        self.target(entity).unwrap_or_else(|_| {
            TableTarget::new(&self.config.snowflake.database, "", entity)
        })
    }
}

/// Join a folder prefix and a file name into an object key.
pub fn join_key(folder: &str, file_name: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{folder}/{file_name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
aws_conn_id: aws_default
s3:
  bucket: retail-bucket
  folder: exercise
  input_folder: raw
  output_folder: cleaned
  analytics_folder: analytics
snowflake:
  conn_id: snowflake_default
  database: RETAIL
  targets:
    sales:
      schema: PUBLIC
      table: CLEANED_SALES
    monthly_sales:
      schema: ANALYTICS
      table: MONTHLY_SALES
"#;

    #[test]
    fn test_from_yaml_str() {
        let config = EtlConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.aws_conn_id, "aws_default");
        assert_eq!(config.s3.bucket, "retail-bucket");
        assert_eq!(config.s3.analytics_folder, "analytics");
        assert_eq!(config.snowflake.targets.len(), 2);
        assert_eq!(config.local, LocalConfig::default());
    }

    #[test]
    fn test_run_context_target_lookup() {
        let ctx = RunContext::new(EtlConfig::from_yaml_str(SAMPLE).unwrap()).unwrap();
        let target = ctx.target("monthly_sales").unwrap();
        assert_eq!(target.qualified_name(), "RETAIL.ANALYTICS.MONTHLY_SALES");
        assert!(ctx.target("unknown").is_err());
        assert_eq!(ctx.output_key("cleaned_sales.csv"), "cleaned/cleaned_sales.csv");
    }

    #[test]
    fn test_builder_defaults() {
        let config = EtlConfig::builder().bucket("b").build().unwrap();
        assert_eq!(config.aws_conn_id, "aws_default");
        assert!(config.snowflake.targets.is_empty());
    }

    #[test]
    fn test_validation_empty_bucket() {
        let result = EtlConfig::builder().build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyField(field) if field == "s3.bucket"
        ));
    }

    #[test]
    fn test_validation_incomplete_target() {
        let result = EtlConfig::builder()
            .bucket("b")
            .target("sales", "PUBLIC", " ")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::IncompleteTarget { .. }
        ));
    }

    #[test]
    fn test_yaml_missing_bucket_is_invalid_config() {
        let err = EtlConfig::from_yaml_str("s3:\n  bucket: ''\n").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("", "a.csv"), "a.csv");
        assert_eq!(join_key("out/", "a.csv"), "out/a.csv");
    }
}
