//! gemsql-migrate CLI
//!
//! Command-line tool for generating migrations from a model manifest.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gemsql_core::{Manifest, MigrationFormat, Quote, SchemaConfig};
use gemsql_migrate::{ErrorPolicy, Migrator, MigratorConfig};

/// Snapshot-driven SQL migrations for tagged models.
#[derive(Parser)]
#[command(name = "gemsql-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate migration files for models whose schema changed.
    Generate {
        /// JSON manifest describing the models.
        #[arg(short, long, env = "GEMSQL_MANIFEST")]
        manifest: PathBuf,

        /// JSON migrator configuration. Flags override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for migrations and snapshots.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Migration layout: raw, goose or golang-migrate.
        #[arg(short, long)]
        format: Option<MigrationFormat>,

        /// Identifier quote: `, " or [].
        #[arg(short, long)]
        quote: Option<Quote>,

        /// Never emit DROP COLUMN for removed fields.
        #[arg(long)]
        keep_dropped_columns: bool,

        /// Append raw SQL to aggregation.sql instead of one file per table.
        #[arg(long)]
        aggregate: bool,

        /// Skip failing tables instead of aborting the run.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Print the compiled schema of every model.
    Sql {
        /// JSON manifest describing the models.
        #[arg(short, long, env = "GEMSQL_MANIFEST")]
        manifest: PathBuf,

        /// Identifier quote: `, " or [].
        #[arg(short, long, default_value_t = Quote::BACKTICK)]
        quote: Quote,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Generate {
            manifest,
            config,
            out,
            format,
            quote,
            keep_dropped_columns,
            aggregate,
            continue_on_error,
        } => {
            let mut config = match config {
                Some(path) => {
                    let json = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    MigratorConfig::from_json(&json)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => MigratorConfig::new(),
            };
            if let Some(out) = out {
                config.output_dir = out;
            }
            if let Some(format) = format {
                config.format = format;
            }
            if let Some(quote) = quote {
                config.schema.quote = quote;
            }
            if keep_dropped_columns {
                config.schema.keep_dropped_columns = true;
            }
            if aggregate {
                config.aggregate_raw_sql = true;
            }
            if continue_on_error {
                config.error_policy = ErrorPolicy::Continue;
            }

            let migrator = migrator_for(&manifest, config)?;
            let report = migrator.generate()?;

            if report.is_empty() && report.failures.is_empty() {
                info!("No changes detected.");
            } else {
                info!(
                    "{} created, {} altered, {} file(s) written",
                    report.created.len(),
                    report.altered.len(),
                    report.written.len()
                );
            }
            for table in &report.cosmetic {
                info!("{table}: formatting changed, no migration needed");
            }
            for failure in &report.failures {
                warn!("{}: {}", failure.table, failure.error);
            }
            if !report.failures.is_empty() {
                bail!("{} table(s) failed", report.failures.len());
            }
        }

        Commands::Sql { manifest, quote } => {
            let config = MigratorConfig::new().with_schema(SchemaConfig::new().with_quote(quote));
            let migrator = migrator_for(&manifest, config)?;
            for table in migrator.compile_all()? {
                println!("-- {}", table.name());
                println!("{}", table.create_sql);
                for index in &table.index_sql {
                    println!("{index}");
                }
                println!();
            }
        }
    }

    Ok(())
}

fn migrator_for(manifest: &Path, config: MigratorConfig) -> anyhow::Result<Migrator> {
    let json = fs::read_to_string(manifest)
        .with_context(|| format!("reading manifest {}", manifest.display()))?;
    let manifest_doc = Manifest::from_json(&json)
        .with_context(|| format!("parsing manifest {}", manifest.display()))?;

    let mut migrator = Migrator::new(config);
    for model in manifest_doc.models {
        migrator.add_provider(Box::new(model));
    }
    Ok(migrator)
}
