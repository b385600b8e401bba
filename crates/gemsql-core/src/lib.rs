//! # gemsql-core
//!
//! Schema compiler and snapshot diff engine for tag-annotated data models.
//!
//! This crate provides:
//! - A compiler turning model metadata (field kinds plus `;`-separated tags such
//!   as `primaryKey;size:100;index:idx_name,priority:2`) into canonical
//!   `CREATE TABLE` / `CREATE INDEX` text
//! - A snapshot store remembering the text emitted for each table
//! - A diff engine re-parsing stored and fresh text into reversible
//!   `ALTER TABLE` / index statements
//! - Renderers for raw SQL, goose and golang-migrate migration files
//!
//! ## Compiling a model
//!
//! ```rust
//! use gemsql_core::{compile, FieldKind, FieldMeta, Model, SchemaConfig};
//!
//! struct User;
//!
//! impl Model for User {
//!     const TYPE_NAME: &'static str = "User";
//!
//!     fn fields() -> Vec<FieldMeta> {
//!         vec![
//!             FieldMeta::new("ID", FieldKind::Uint).tag("primaryKey;autoIncrement"),
//!             FieldMeta::new("Name", FieldKind::String).tag("size:100;index"),
//!         ]
//!     }
//! }
//!
//! let compiled = compile(&User::model(), &SchemaConfig::default()).unwrap();
//! assert_eq!(
//!     compiled.create_sql,
//!     "CREATE TABLE IF NOT EXISTS `users` (\n  \
//!      `id` INTEGER UNSIGNED AUTO_INCREMENT NOT NULL,\n  \
//!      `name` VARCHAR(100) NOT NULL,\n  \
//!      PRIMARY KEY (`id`)\n);"
//! );
//! assert_eq!(compiled.index_sql, ["CREATE INDEX `idx_name` ON `users` (`name`);"]);
//! ```
//!
//! With the `gemsql-derive` crate the `Model` impl is generated by
//! `#[derive(Model)]`.
//!
//! ## Planning a change
//!
//! ```rust
//! use gemsql_core::{
//!     compile, plan, FieldKind, FieldMeta, ModelSpec, SchemaConfig, SnapshotStore, TableChange,
//! };
//!
//! let mut model = ModelSpec {
//!     name: "Post".into(),
//!     table: None,
//!     fields: vec![FieldMeta::new("ID", FieldKind::U64).tag("primaryKey")],
//! };
//! let config = SchemaConfig::default();
//! let mut store = SnapshotStore::new();
//!
//! let first = compile(&model, &config).unwrap();
//! assert_eq!(plan(&first, &store, &config).unwrap(), TableChange::Create);
//! store.record(&first);
//!
//! model.fields.push(FieldMeta::new("Title", FieldKind::String));
//! let second = compile(&model, &config).unwrap();
//! let TableChange::Alter(diff) = plan(&second, &store, &config).unwrap() else {
//!     unreachable!()
//! };
//! assert_eq!(
//!     diff.up_statements(),
//!     ["ALTER TABLE `posts` ADD COLUMN `title` VARCHAR(255) NOT NULL;"]
//! );
//! ```

pub mod annotation;
pub mod compiler;
pub mod config;
pub mod diff;
pub mod error;
pub mod format;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod snapshot;

pub use annotation::{Annotation, Annotations};
pub use compiler::{compile, CompiledTable};
pub use config::{Quote, SchemaConfig, UnsupportedQuote};
pub use diff::{diff_table, AlterOperation, TableDiff};
pub use error::{Result, SchemaError};
pub use format::{
    render_alter, render_create, wrap_do_not_edit, MigrationFile, MigrationFormat, MigrationKind,
    RenderedMigration,
};
pub use manifest::{Manifest, ModelSpec};
pub use metadata::{
    extract, table_name, FieldDescriptor, FieldKind, FieldMeta, MetadataProvider, Model, ModelOf,
};
pub use parser::{parse_create_table, parse_index, parse_indexes};
pub use plan::{plan, TableChange, VersionSequence};
pub use schema::{ColumnDefinition, IndexDefinition, TableDefinition};
pub use snapshot::{content_hash, Snapshot, SnapshotStore};
