//! Declarative model descriptions.
//!
//! A manifest lists models as plain data, which lets tools compile schemas
//! without linking the model types:
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "name": "User",
//!       "table": "users",
//!       "fields": [
//!         { "name": "ID", "kind": "uint", "tag": "primaryKey;autoIncrement" },
//!         { "name": "Email", "kind": "string", "tag": "size:150;uniqueIndex" },
//!         { "name": "Age", "kind": "int", "optional": true, "tag": "default:18" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::metadata::{FieldMeta, MetadataProvider};

/// One model described as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Type name of the model.
    pub name: String,
    /// Explicit table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Fields in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
}

impl MetadataProvider for ModelSpec {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    fn fields(&self) -> Vec<FieldMeta> {
        self.fields.clone()
    }
}

/// A set of declarative models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// The models.
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

impl Manifest {
    /// Parses a manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Manifest`] when the document is not a valid
    /// manifest.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(SchemaError::Manifest)
    }
}
