//! Error types for schema compilation and diffing.

/// Errors that can occur while compiling or diffing a model's schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A field's annotation could not be interpreted.
    #[error("Invalid metadata on {model}.{field}: {message}")]
    Metadata {
        /// Type name of the model being compiled.
        model: String,
        /// Declared name of the offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Stored or freshly generated SQL text did not match the expected grammar.
    #[error("Failed to parse schema of table '{table}': {message}")]
    Parse {
        /// Table whose text failed to parse.
        table: String,
        /// Error message.
        message: String,
    },

    /// The snapshot document could not be encoded or decoded.
    #[error("Snapshot serialization error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A model manifest is not valid JSON or does not describe models.
    #[error("Invalid manifest: {0}")]
    Manifest(#[source] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn metadata(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Metadata {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
