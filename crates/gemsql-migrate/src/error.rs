//! Error types for migration generation.

use std::path::PathBuf;

use gemsql_core::SchemaError;

/// Errors that can occur while generating migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A model could not be compiled or its snapshot could not be diffed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// IO error reading or writing a file.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The migrator configuration is not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MigrateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
