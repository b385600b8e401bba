//! Migration file rendering for the supported migration tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compiler::CompiledTable;
use crate::config::Quote;
use crate::diff::TableDiff;

/// Marker line opening and closing every generated file.
pub const DO_NOT_EDIT: &str = "-- DO NOT EDIT THIS FILE!!!";

/// Attribution line written under [`DO_NOT_EDIT`].
pub const GENERATED_BY: &str = "-- Generated by gemsql";

/// Name of the file collecting aggregated raw SQL.
pub const AGGREGATION_FILE: &str = "aggregation.sql";

/// Output layout of migration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationFormat {
    /// Plain `.sql` files with the up statements only.
    #[default]
    #[serde(rename = "raw")]
    RawSql,
    /// One file per migration with `-- +goose Up` / `-- +goose Down`
    /// sections.
    #[serde(rename = "goose")]
    Goose,
    /// Paired `.up.sql` / `.down.sql` files.
    #[serde(rename = "golang-migrate")]
    GolangMigrate,
}

impl MigrationFormat {
    /// Canonical name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RawSql => "raw",
            Self::Goose => "goose",
            Self::GolangMigrate => "golang-migrate",
        }
    }
}

impl fmt::Display for MigrationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a migration format name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown migration format '{0}' (expected raw, goose or golang-migrate)")]
pub struct UnknownFormat(pub String);

impl FromStr for MigrationFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "sql" | "raw-sql" => Ok(Self::RawSql),
            "goose" => Ok(Self::Goose),
            "golang-migrate" | "migrate" => Ok(Self::GolangMigrate),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Whether a migration creates or alters its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    /// First migration of a table.
    Create,
    /// Change to an existing table.
    Alter,
}

impl MigrationKind {
    /// Filename component.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Alter => "alter",
        }
    }
}

/// A file ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name relative to the output directory.
    pub filename: String,
    /// Full file content, including the DO NOT EDIT banner.
    pub content: String,
}

/// The down half of a two-file migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownMigration {
    /// File name relative to the output directory.
    pub filename: String,
    /// Body without the banner.
    pub body: String,
}

/// One table's migration before the banner is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMigration {
    /// Migration version.
    pub version: u64,
    /// Table the migration applies to.
    pub table: String,
    /// Create or alter.
    pub kind: MigrationKind,
    /// Name of the up (or only) file.
    pub up_filename: String,
    /// Body of the up (or only) file.
    pub up_body: String,
    /// Separate down file, for formats that use one.
    pub down: Option<DownMigration>,
}

impl RenderedMigration {
    /// The files to write, each wrapped in the DO NOT EDIT banner.
    #[must_use]
    pub fn files(&self) -> Vec<MigrationFile> {
        let mut files = vec![MigrationFile {
            filename: self.up_filename.clone(),
            content: wrap_do_not_edit(&self.up_body),
        }];
        if let Some(down) = &self.down {
            files.push(MigrationFile {
                filename: down.filename.clone(),
                content: wrap_do_not_edit(&down.body),
            });
        }
        files
    }
}

/// Wraps a body in the DO NOT EDIT banner.
#[must_use]
pub fn wrap_do_not_edit(body: &str) -> String {
    format!("{DO_NOT_EDIT}\n--\n{GENERATED_BY}\n\n{body}\n\n{DO_NOT_EDIT}")
}

/// Renders the create migration of a newly seen table.
#[must_use]
pub fn render_create(
    format: MigrationFormat,
    version: u64,
    compiled: &CompiledTable,
    quote: Quote,
) -> RenderedMigration {
    let table = compiled.name();
    let schema = &compiled.create_sql;
    let indexes = compiled.index_sql.join("\n");
    let drop_table = format!("DROP TABLE IF EXISTS {};", quote.ident(table));
    let with_indexes = |sep: &str| {
        if indexes.is_empty() {
            schema.clone()
        } else {
            format!("{schema}{sep}{indexes}")
        }
    };

    let (up_body, down) = match format {
        MigrationFormat::RawSql => (with_indexes("\n"), None),
        MigrationFormat::Goose => (
            format!(
                "-- +goose Up\n{}\n\n-- +goose Down\n{drop_table}\n",
                with_indexes("\n\n")
            ),
            None,
        ),
        MigrationFormat::GolangMigrate => (
            with_indexes("\n\n"),
            Some(DownMigration {
                filename: filename(format, version, MigrationKind::Create, table, "down"),
                body: drop_table,
            }),
        ),
    };

    RenderedMigration {
        version,
        table: table.to_string(),
        kind: MigrationKind::Create,
        up_filename: filename(format, version, MigrationKind::Create, table, "up"),
        up_body,
        down,
    }
}

/// Renders the alter migration of a changed table.
#[must_use]
pub fn render_alter(
    format: MigrationFormat,
    version: u64,
    table: &str,
    diff: &TableDiff,
) -> RenderedMigration {
    let up = diff.up_statements().join("\n");
    let down = diff.down_statements().join("\n");

    let (up_body, down) = match format {
        MigrationFormat::RawSql => (up, None),
        MigrationFormat::Goose => (
            format!("-- +goose Up\n{up}\n\n-- +goose Down\n{down}\n"),
            None,
        ),
        MigrationFormat::GolangMigrate => (
            up,
            Some(DownMigration {
                filename: filename(format, version, MigrationKind::Alter, table, "down"),
                body: down,
            }),
        ),
    };

    RenderedMigration {
        version,
        table: table.to_string(),
        kind: MigrationKind::Alter,
        up_filename: filename(format, version, MigrationKind::Alter, table, "up"),
        up_body,
        down,
    }
}

/// Builds the text appended to [`AGGREGATION_FILE`] for one run.
///
/// `generated_at` is the run's local time as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn aggregation_chunk<S: AsRef<str>>(generated_at: &str, bodies: &[S]) -> String {
    let mut chunk = format!("\n\n-- {generated_at}\n{GENERATED_BY}\n");
    for body in bodies {
        chunk.push('\n');
        chunk.push_str(body.as_ref());
        chunk.push_str("\n\n");
    }
    chunk
}

fn filename(
    format: MigrationFormat,
    version: u64,
    kind: MigrationKind,
    table: &str,
    direction: &str,
) -> String {
    let kind = kind.as_str();
    match format {
        MigrationFormat::RawSql | MigrationFormat::Goose => format!("{version}_{kind}_{table}.sql"),
        MigrationFormat::GolangMigrate => format!("{version}_{kind}_{table}.{direction}.sql"),
    }
}
