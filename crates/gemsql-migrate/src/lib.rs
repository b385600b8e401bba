//! Snapshot-driven SQL migration file generator.
//!
//! `gemsql-migrate` compiles a set of models with `gemsql-core`, compares
//! each table against the snapshot recorded by the previous run, and writes
//! migration files for the tables that changed:
//! - New tables get a `<version>_create_<table>` migration
//! - Changed tables get a `<version>_alter_<table>` migration with reversible
//!   statements
//! - Unchanged tables (and whitespace-only differences) produce nothing
//!
//! Snapshots are kept in `<output_dir>/.gem/snapshots.json`.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemsql_derive::Model;
//! use gemsql_migrate::{Migrator, MigratorConfig};
//!
//! #[derive(Model)]
//! struct User {
//!     #[gem("primaryKey;autoIncrement")]
//!     id: u64,
//!     #[gem("size:100;index")]
//!     name: String,
//! }
//!
//! let mut migrator = Migrator::new(MigratorConfig::new().with_output_dir("migrations"));
//! migrator.add_model::<User>();
//! let report = migrator.generate()?;
//! println!("{} file(s) written", report.written.len());
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Generate migrations for the models of a JSON manifest
//! gemsql-migrate generate --manifest models.json --out migrations --format goose
//!
//! # Print the compiled schema without touching disk
//! gemsql-migrate sql --manifest models.json
//! ```

pub mod config;
pub mod error;
pub mod store;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use gemsql_core::format::{aggregation_chunk, AGGREGATION_FILE};
use gemsql_core::{
    compile, plan, render_alter, render_create, table_name, CompiledTable, MetadataProvider,
    Model, RenderedMigration, SchemaError, TableChange, VersionSequence,
};
use tracing::{debug, error, info};

pub use config::{ErrorPolicy, MigratorConfig};
pub use error::{MigrateError, Result};

/// Marker file written into the output directory.
pub const DO_NOT_EDIT_FILE: &str = "DO_NOT_EDIT.md";

const DO_NOT_EDIT_CONTENT: &str = "# DO NOT EDIT\n\n\
Every file in this directory is generated by gemsql-migrate.\n\n\
Change the models and run the generator again instead of editing these files.\n\
The `.gem/snapshots.json` document records the schema each table had when its\n\
last migration was generated.\n";

/// A table that failed to compile or diff under [`ErrorPolicy::Continue`].
#[derive(Debug)]
pub struct TableFailure {
    /// Table name.
    pub table: String,
    /// What went wrong.
    pub error: SchemaError,
}

/// Outcome of a [`Migrator::generate`] run.
#[derive(Debug, Default)]
pub struct GenerateReport {
    /// Tables that got a create migration.
    pub created: Vec<String>,
    /// Tables that got an alter migration.
    pub altered: Vec<String>,
    /// Tables whose snapshot matched.
    pub unchanged: Vec<String>,
    /// Tables whose text changed without a schema change.
    pub cosmetic: Vec<String>,
    /// Tables skipped because of an error.
    pub failures: Vec<TableFailure>,
    /// Files written or appended to, in write order.
    pub written: Vec<PathBuf>,
}

impl GenerateReport {
    /// Returns `true` if no migration was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.altered.is_empty()
    }
}

/// Collects models and generates their migrations.
pub struct Migrator {
    config: MigratorConfig,
    models: Vec<Box<dyn MetadataProvider>>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("config", &self.config)
            .field(
                "models",
                &self.models.iter().map(|m| m.type_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Migrator {
    /// Creates a migrator without models.
    #[must_use]
    pub const fn new(config: MigratorConfig) -> Self {
        Self {
            config,
            models: Vec::new(),
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Registers a model type.
    pub fn add_model<T: Model + 'static>(&mut self) -> &mut Self {
        self.add_provider(Box::new(T::model()))
    }

    /// Registers any metadata provider, such as a manifest
    /// [`ModelSpec`](gemsql_core::ModelSpec).
    pub fn add_provider(&mut self, provider: Box<dyn MetadataProvider>) -> &mut Self {
        self.models.push(provider);
        self
    }

    /// Compiles every model in table-name order without touching disk.
    ///
    /// # Errors
    ///
    /// Returns the first compile error.
    pub fn compile_all(&self) -> Result<Vec<CompiledTable>> {
        self.sorted_models()
            .into_iter()
            .map(|model| compile(model, &self.config.schema).map_err(MigrateError::from))
            .collect()
    }

    /// Generates migrations, using the current local time for versions.
    ///
    /// # Errors
    ///
    /// See [`Migrator::generate_at`].
    pub fn generate(&self) -> Result<GenerateReport> {
        self.generate_at(Local::now().naive_local())
    }

    /// Generates migrations as if run at `now`.
    ///
    /// Every table is planned before anything is written. Under
    /// [`ErrorPolicy::Abort`] the first failure returns an error and leaves
    /// the output directory untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidConfig`] for unusable settings,
    /// [`MigrateError::Schema`] for a failing table under
    /// [`ErrorPolicy::Abort`] or a corrupt snapshot document, and
    /// [`MigrateError::Io`] when a file cannot be read or written.
    pub fn generate_at(&self, now: NaiveDateTime) -> Result<GenerateReport> {
        self.config.validate()?;
        let mut report = GenerateReport::default();
        if self.models.is_empty() {
            return Ok(report);
        }

        let snapshot_path = self.config.snapshot_path();
        let mut store = store::load(&snapshot_path)?;
        let models = self.sorted_models();
        let count = u64::try_from(models.len()).unwrap_or(u64::MAX);
        let mut versions = VersionSequence::new(version_base(&now).saturating_sub(count));
        let mut rendered: Vec<RenderedMigration> = Vec::new();

        for model in models {
            let table = table_name(model);
            let Some(version) = versions.next() else {
                return Err(MigrateError::InvalidConfig("migration version overflow".into()));
            };

            let planned = compile(model, &self.config.schema).and_then(|compiled| {
                plan(&compiled, &store, &self.config.schema).map(|change| (compiled, change))
            });
            let (compiled, change) = match planned {
                Ok(planned) => planned,
                Err(e) => match self.config.error_policy {
                    ErrorPolicy::Abort => return Err(e.into()),
                    ErrorPolicy::Continue => {
                        error!(table = %table, error = %e, "skipping table");
                        report.failures.push(TableFailure { table, error: e });
                        continue;
                    }
                },
            };

            match change {
                TableChange::Create => {
                    debug!(table = %table, version, "create");
                    rendered.push(render_create(
                        self.config.format,
                        version,
                        &compiled,
                        self.config.schema.quote,
                    ));
                    store.record(&compiled);
                    report.created.push(table);
                }
                TableChange::Alter(diff) => {
                    debug!(
                        table = %table,
                        version,
                        statements = diff.up_statements().len(),
                        "alter"
                    );
                    rendered.push(render_alter(self.config.format, version, &table, &diff));
                    store.record(&compiled);
                    report.altered.push(table);
                }
                TableChange::Unchanged => {
                    debug!(table = %table, "unchanged");
                    report.unchanged.push(table);
                }
                TableChange::Cosmetic => {
                    debug!(table = %table, "cosmetic change only, snapshot kept");
                    report.cosmetic.push(table);
                }
            }
        }

        self.prepare_output_dir()?;
        if self.config.aggregate_raw_sql {
            self.append_aggregation(&now, &rendered, &mut report)?;
        } else {
            self.write_files(&rendered, &mut report)?;
        }
        if !rendered.is_empty() {
            store::save(&snapshot_path, &store)?;
        }

        info!(
            created = report.created.len(),
            altered = report.altered.len(),
            unchanged = report.unchanged.len(),
            failed = report.failures.len(),
            "migration generation done"
        );
        Ok(report)
    }

    fn sorted_models(&self) -> Vec<&dyn MetadataProvider> {
        let mut models: Vec<(String, &dyn MetadataProvider)> = self
            .models
            .iter()
            .map(|m| (table_name(m.as_ref()), m.as_ref()))
            .collect();
        models.sort_by(|a, b| a.0.cmp(&b.0));
        models.into_iter().map(|(_, m)| m).collect()
    }

    fn prepare_output_dir(&self) -> Result<()> {
        let dir = self.config.output_dir();
        fs::create_dir_all(dir).map_err(|e| MigrateError::io(dir, e))?;
        let marker = dir.join(DO_NOT_EDIT_FILE);
        fs::write(&marker, DO_NOT_EDIT_CONTENT).map_err(|e| MigrateError::io(&marker, e))
    }

    fn write_files(
        &self,
        rendered: &[RenderedMigration],
        report: &mut GenerateReport,
    ) -> Result<()> {
        for migration in rendered {
            for file in migration.files() {
                let path = self.config.output_dir().join(&file.filename);
                fs::write(&path, file.content).map_err(|e| MigrateError::io(&path, e))?;
                info!("OK\t{}", file.filename);
                report.written.push(path);
            }
        }
        Ok(())
    }

    fn append_aggregation(
        &self,
        now: &NaiveDateTime,
        rendered: &[RenderedMigration],
        report: &mut GenerateReport,
    ) -> Result<()> {
        if rendered.is_empty() {
            return Ok(());
        }
        let bodies: Vec<&str> = rendered.iter().map(|m| m.up_body.as_str()).collect();
        let chunk = aggregation_chunk(&now.format("%Y-%m-%d %H:%M:%S").to_string(), &bodies);

        let path = self.config.output_dir().join(AGGREGATION_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| MigrateError::io(&path, e))?;
        file.write_all(chunk.as_bytes())
            .map_err(|e| MigrateError::io(&path, e))?;
        info!("OK\t{}", path.display());
        report.written.push(path);
        Ok(())
    }
}

/// `YYYYMMDDhhmmss` of `now` as a number.
fn version_base(now: &NaiveDateTime) -> u64 {
    let date = u64::from(now.year().unsigned_abs()) * 10_000
        + u64::from(now.month()) * 100
        + u64::from(now.day());
    let time =
        u64::from(now.hour()) * 10_000 + u64::from(now.minute()) * 100 + u64::from(now.second());
    date * 1_000_000 + time
}
