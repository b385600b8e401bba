//! Change planning: what a run should do for one compiled table.

use tracing::debug;

use crate::compiler::CompiledTable;
use crate::config::SchemaConfig;
use crate::diff::{diff_table, TableDiff};
use crate::error::Result;
use crate::snapshot::{content_hash, SnapshotStore};

/// The planned change for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableChange {
    /// No snapshot exists: emit a create migration.
    Create,
    /// Hashes match: nothing to do.
    Unchanged,
    /// Hashes differ but the parsed definitions are equal. The snapshot is
    /// left as is and no file is emitted.
    Cosmetic,
    /// The table changed: emit an alter migration.
    Alter(TableDiff),
}

impl TableChange {
    /// Returns `true` if a migration file should be written and the
    /// snapshot updated.
    #[must_use]
    pub const fn is_emitting(&self) -> bool {
        matches!(self, Self::Create | Self::Alter(_))
    }
}

/// Plans the change for a compiled table against the stored snapshots.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`](crate::SchemaError::Parse) if the stored
/// text of the table cannot be parsed.
pub fn plan(
    compiled: &CompiledTable,
    store: &SnapshotStore,
    config: &SchemaConfig,
) -> Result<TableChange> {
    let Some(snapshot) = store.get(compiled.name()) else {
        debug!(table = compiled.name(), "no snapshot, planning create");
        return Ok(TableChange::Create);
    };

    if content_hash(&compiled.create_sql, &compiled.index_sql) == snapshot.hash {
        return Ok(TableChange::Unchanged);
    }

    let diff = diff_table(
        compiled.name(),
        &snapshot.schema,
        &compiled.create_sql,
        &snapshot.indexes,
        &compiled.index_sql,
        config,
    )?;
    if diff.is_empty() {
        debug!(table = compiled.name(), "hash changed without schema changes");
        return Ok(TableChange::Cosmetic);
    }
    Ok(TableChange::Alter(diff))
}

/// Monotonic migration version numbers.
///
/// `VersionSequence::new(base)` yields `base + 1`, `base + 2`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionSequence {
    current: u64,
}

impl VersionSequence {
    /// Starts a sequence whose first version is `base + 1`.
    #[must_use]
    pub const fn new(base: u64) -> Self {
        Self { current: base }
    }

    /// The most recently issued version (or the base).
    #[must_use]
    pub const fn current(&self) -> u64 {
        self.current
    }
}

impl Iterator for VersionSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.current = self.current.checked_add(1)?;
        Some(self.current)
    }
}
