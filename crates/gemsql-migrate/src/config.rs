//! Migrator configuration.

use std::path::{Path, PathBuf};

use gemsql_core::{MigrationFormat, SchemaConfig};
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Directory, under the output directory, holding the snapshot document.
pub const SNAPSHOT_DIR: &str = ".gem";

/// File name of the snapshot document.
pub const SNAPSHOT_FILE: &str = "snapshots.json";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./migrations";

/// What a run does when one table fails to compile or diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop at the first failure. Nothing is written.
    #[default]
    Abort,
    /// Log and skip the failing table; the others proceed.
    Continue,
}

/// Settings for a [`Migrator`](crate::Migrator) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Migration file layout.
    pub format: MigrationFormat,
    /// Directory receiving migration files and the snapshot store.
    pub output_dir: PathBuf,
    /// Compiler and diff settings.
    pub schema: SchemaConfig,
    /// Append raw SQL to `aggregation.sql` instead of writing one file per
    /// table. Only valid with [`MigrationFormat::RawSql`].
    pub aggregate_raw_sql: bool,
    /// Failure handling.
    pub error_policy: ErrorPolicy,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            format: MigrationFormat::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            schema: SchemaConfig::default(),
            aggregate_raw_sql: false,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl MigratorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the migration file layout.
    #[must_use]
    pub fn with_format(mut self, format: MigrationFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the compiler and diff settings.
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }

    /// Enables or disables raw SQL aggregation.
    #[must_use]
    pub fn aggregate_raw_sql(mut self, aggregate: bool) -> Self {
        self.aggregate_raw_sql = aggregate;
        self
    }

    /// Sets the failure handling.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Parses a configuration document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Serialization`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Path of the snapshot document.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(SNAPSHOT_DIR).join(SNAPSHOT_FILE)
    }

    /// The output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Checks that the settings can be used together.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidConfig`] if the output directory is
    /// empty or aggregation is requested with a format other than raw SQL.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(MigrateError::InvalidConfig(
                "output directory must not be empty".into(),
            ));
        }
        if self.aggregate_raw_sql && self.format != MigrationFormat::RawSql {
            return Err(MigrateError::InvalidConfig(format!(
                "raw SQL aggregation requires the raw format, not {}",
                self.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemsql_core::Quote;

    #[test]
    fn defaults() {
        let config = MigratorConfig::default();
        assert_eq!(config.format, MigrationFormat::RawSql);
        assert_eq!(config.output_dir, PathBuf::from("./migrations"));
        assert_eq!(config.schema.quote, Quote::BACKTICK);
        assert!(!config.schema.keep_dropped_columns);
        assert!(!config.aggregate_raw_sql);
        assert_eq!(config.error_policy, ErrorPolicy::Abort);
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("./migrations/.gem/snapshots.json")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn aggregation_needs_raw_format() {
        let config = MigratorConfig::new()
            .with_format(MigrationFormat::Goose)
            .aggregate_raw_sql(true);
        assert!(matches!(
            config.validate(),
            Err(MigrateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_output_dir_is_rejected() {
        let config = MigratorConfig::new().with_output_dir("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_document() {
        let config = MigratorConfig::from_json(
            r#"{"format": "goose", "error_policy": "continue", "schema": {"keep_dropped_columns": true}}"#,
        )
        .unwrap();
        assert_eq!(config.format, MigrationFormat::Goose);
        assert_eq!(config.error_policy, ErrorPolicy::Continue);
        assert!(config.schema.keep_dropped_columns);
        assert_eq!(config.schema.quote, Quote::BACKTICK);
        assert_eq!(config.output_dir, PathBuf::from("./migrations"));
    }

    #[test]
    fn malformed_document_is_a_serialization_error() {
        assert!(matches!(
            MigratorConfig::from_json(r#"{"format": "flyway"}"#),
            Err(MigrateError::Serialization(_))
        ));
    }
}
