//! Table diff engine.
//!
//! Compares the stored SQL text of a table against the freshly compiled text
//! and produces reversible `ALTER TABLE` / index statements.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::parser::{parse_create_table, parse_indexes};
use crate::schema::{drop_index_sql, ColumnDefinition, IndexDefinition};

/// One reversible change: the statement to apply and the one undoing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterOperation {
    /// Statement applied by the up migration.
    pub up: String,
    /// Statement applied by the down migration.
    pub down: String,
}

impl AlterOperation {
    fn new(up: String, down: String) -> Self {
        Self { up, down }
    }
}

/// Changes between two versions of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDiff {
    /// Column operations: adds, then modifies, then drops.
    pub columns: Vec<AlterOperation>,
    /// Index operations in index-name order.
    pub indexes: Vec<AlterOperation>,
}

impl TableDiff {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.indexes.is_empty()
    }

    /// Up statements: column operations followed by index operations.
    #[must_use]
    pub fn up_statements(&self) -> Vec<String> {
        self.operations().map(|op| op.up.clone()).collect()
    }

    /// Down statements, in reverse order of the up statements.
    #[must_use]
    pub fn down_statements(&self) -> Vec<String> {
        self.operations().rev().map(|op| op.down.clone()).collect()
    }

    fn operations(&self) -> impl DoubleEndedIterator<Item = &AlterOperation> {
        self.columns.iter().chain(self.indexes.iter())
    }
}

/// Diffs the stored text of `table` against its newly compiled text.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] naming `table` if either side cannot be
/// parsed.
pub fn diff_table<S: AsRef<str>, T: AsRef<str>>(
    table: &str,
    old_schema: &str,
    new_schema: &str,
    old_indexes: &[S],
    new_indexes: &[T],
    config: &SchemaConfig,
) -> Result<TableDiff> {
    let with_table = |e: SchemaError| match e {
        SchemaError::Parse { message, .. } => SchemaError::parse(table, message),
        other => other,
    };
    let old = parse_create_table(old_schema).map_err(with_table)?;
    let new = parse_create_table(new_schema).map_err(with_table)?;
    let q = config.quote;
    let t = q.ident(table);

    let add = |c: &ColumnDefinition| format!("ALTER TABLE {t} ADD COLUMN {};", c.to_sql(q));
    let modify = |c: &ColumnDefinition| format!("ALTER TABLE {t} MODIFY COLUMN {};", c.to_sql(q));
    let drop_column =
        |c: &ColumnDefinition| format!("ALTER TABLE {t} DROP COLUMN {};", q.ident(&c.name));

    let mut diff = TableDiff::default();

    for column in &new.columns {
        if old.column(&column.name).is_none() {
            diff.columns.push(AlterOperation::new(add(column), drop_column(column)));
        }
    }
    for column in &new.columns {
        if let Some(previous) = old.column(&column.name) {
            if !previous.same_definition(column) {
                diff.columns.push(AlterOperation::new(modify(column), modify(previous)));
            }
        }
    }
    for column in &old.columns {
        if new.column(&column.name).is_some() {
            continue;
        }
        if config.keep_dropped_columns {
            debug!(table, column = %column.name, "keeping dropped column");
            continue;
        }
        diff.columns.push(AlterOperation::new(drop_column(column), add(column)));
    }

    let old_indexes = parse_indexes(old_indexes).map_err(with_table)?;
    let new_indexes = parse_indexes(new_indexes).map_err(with_table)?;
    let names: BTreeSet<&String> = old_indexes.keys().chain(new_indexes.keys()).collect();
    let create = |i: &IndexDefinition| i.to_sql(table, q);
    let drop_index = |i: &IndexDefinition| drop_index_sql(&i.name, table, q);

    for name in names {
        match (old_indexes.get(name), new_indexes.get(name)) {
            (None, Some(added)) => diff
                .indexes
                .push(AlterOperation::new(create(added), drop_index(added))),
            (Some(removed), None) => diff
                .indexes
                .push(AlterOperation::new(drop_index(removed), create(removed))),
            (Some(previous), Some(current)) if !previous.same_shape(current) => {
                diff.indexes.push(AlterOperation::new(
                    format!("{}\n{}", drop_index(previous), create(current)),
                    format!("{}\n{}", drop_index(current), create(previous)),
                ));
            }
            _ => {}
        }
    }

    debug!(
        table,
        columns = diff.columns.len(),
        indexes = diff.indexes.len(),
        "diffed table"
    );
    Ok(diff)
}
