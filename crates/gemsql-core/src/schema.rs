//! Structured table, column and index definitions and their canonical SQL.

use std::collections::{BTreeMap, HashSet};

use crate::config::Quote;

/// Constraint keywords in their canonical order.
pub const AUTO_INCREMENT: &str = "AUTO_INCREMENT";
/// Column-level uniqueness.
pub const UNIQUE: &str = "UNIQUE";
/// Non-nullability.
pub const NOT_NULL: &str = "NOT NULL";

/// A column: name, SQL type and ordered constraint list.
///
/// Constraints are stored as rendered strings (`CHECK (age > 0)`,
/// `DEFAULT 18`, ...) in the order auto-increment, check, unique, not-null,
/// default, comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column name, unquoted.
    pub name: String,
    /// SQL type, including a trailing `NULL` marker for nullable columns.
    pub sql_type: String,
    /// Constraints in canonical order.
    pub constraints: Vec<String>,
}

impl ColumnDefinition {
    /// Creates a column without constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            constraints: Vec::new(),
        }
    }

    /// Appends a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Renders `<quoted name> <type> <constraints...>`.
    #[must_use]
    pub fn to_sql(&self, quote: Quote) -> String {
        let mut sql = format!("{} {}", quote.ident(&self.name), self.sql_type);
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint);
        }
        sql
    }

    /// Two columns are the same when type and constraint list (in order)
    /// match.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.sql_type == other.sql_type && self.constraints == other.constraints
    }
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name, unquoted.
    pub name: String,
    /// Columns in contribution order.
    pub columns: Vec<String>,
    /// Whether the index is UNIQUE.
    pub unique: bool,
    /// Tie-break rank per column; lower sorts first.
    pub priorities: BTreeMap<String, i64>,
}

impl IndexDefinition {
    /// Creates an index with no columns.
    #[must_use]
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            unique,
            priorities: BTreeMap::new(),
        }
    }

    /// Adds a column with its priority.
    pub fn push(&mut self, column: impl Into<String>, priority: i64) {
        let column = column.into();
        self.priorities.insert(column.clone(), priority);
        self.columns.push(column);
    }

    /// Columns sorted by ascending priority (stable for ties), with
    /// duplicates removed.
    #[must_use]
    pub fn ordered_columns(&self) -> Vec<String> {
        let mut columns: Vec<&String> = self.columns.iter().collect();
        columns.sort_by_key(|c| self.priorities.get(*c).copied().unwrap_or_default());
        dedup(columns.into_iter().cloned())
    }

    /// Renders `CREATE [UNIQUE] INDEX <name> ON <table> (<columns>);`.
    #[must_use]
    pub fn to_sql(&self, table: &str, quote: Quote) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            if self.unique { "UNIQUE " } else { "" },
            quote.ident(&self.name),
            quote.ident(table),
            quote.ident_list(&self.ordered_columns()),
        )
    }

    /// Order-insensitive comparison of column sets plus uniqueness.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        if self.unique != other.unique {
            return false;
        }
        let mut a = dedup(self.columns.iter().cloned());
        let mut b = dedup(other.columns.iter().cloned());
        a.sort();
        b.sort();
        a == b
    }
}

/// Renders `DROP INDEX <name> ON <table>;`.
#[must_use]
pub fn drop_index_sql(name: &str, table: &str, quote: Quote) -> String {
    format!("DROP INDEX {} ON {};", quote.ident(name), quote.ident(table))
}

/// A table: name, ordered columns and primary key columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name, unquoted.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Primary key columns; empty when the table has none.
    pub primary_key: Vec<String>,
}

impl TableDefinition {
    /// Creates an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Renders the canonical `CREATE TABLE IF NOT EXISTS` statement, one
    /// column per line and a trailing `PRIMARY KEY` clause.
    #[must_use]
    pub fn to_sql(&self, quote: Quote) -> String {
        let mut lines: Vec<String> = self.columns.iter().map(|c| c.to_sql(quote)).collect();
        if !self.primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", quote.ident_list(&self.primary_key)));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n);",
            quote.ident(&self.name),
            lines.join(",\n  ")
        )
    }
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDefinition {
        TableDefinition {
            name: "users".into(),
            columns: vec![
                ColumnDefinition::new("id", "INTEGER UNSIGNED")
                    .constraint(AUTO_INCREMENT)
                    .constraint(NOT_NULL),
                ColumnDefinition::new("age", "INTEGER NULL").constraint("DEFAULT 18"),
            ],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn renders_create_table() {
        assert_eq!(
            users().to_sql(Quote::BACKTICK),
            "CREATE TABLE IF NOT EXISTS `users` (\n  \
             `id` INTEGER UNSIGNED AUTO_INCREMENT NOT NULL,\n  \
             `age` INTEGER NULL DEFAULT 18,\n  \
             PRIMARY KEY (`id`)\n);"
        );
    }

    #[test]
    fn renders_without_primary_key() {
        let mut table = users();
        table.primary_key.clear();
        let sql = table.to_sql(Quote::DOUBLE);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"users\" (\n"));
        assert!(sql.ends_with("\"age\" INTEGER NULL DEFAULT 18\n);"));
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn index_columns_follow_priority_then_declaration() {
        let mut idx = IndexDefinition::new("udx_a_b_c", true);
        idx.push("email", 3);
        idx.push("score", 2);
        idx.push("is_active", 1);
        idx.push("tenant", 1);
        assert_eq!(idx.ordered_columns(), ["is_active", "tenant", "score", "email"]);
        assert_eq!(
            idx.to_sql("users", Quote::BACKTICK),
            "CREATE UNIQUE INDEX `udx_a_b_c` ON `users` (`is_active`, `tenant`, `score`, `email`);"
        );
    }

    #[test]
    fn index_duplicates_collapse() {
        let mut idx = IndexDefinition::new("idx_name", false);
        idx.push("name", 0);
        idx.push("name", 0);
        assert_eq!(
            idx.to_sql("users", Quote::BRACKETS),
            "CREATE INDEX [idx_name] ON [users] ([name]);"
        );
    }

    #[test]
    fn index_shape_ignores_column_order() {
        let mut a = IndexDefinition::new("idx", false);
        a.push("x", 0);
        a.push("y", 0);
        let mut b = IndexDefinition::new("idx", false);
        b.push("y", 0);
        b.push("x", 0);
        assert!(a.same_shape(&b));

        b.unique = true;
        assert!(!a.same_shape(&b));
    }

    #[test]
    fn column_comparison_is_order_sensitive() {
        let a = ColumnDefinition::new("c", "INTEGER")
            .constraint(UNIQUE)
            .constraint(NOT_NULL);
        let b = ColumnDefinition::new("c", "INTEGER")
            .constraint(NOT_NULL)
            .constraint(UNIQUE);
        assert!(!a.same_definition(&b));
        assert!(a.same_definition(&a.clone()));
    }

    #[test]
    fn drop_index_is_quoted() {
        assert_eq!(
            drop_index_sql("idx_name", "users", Quote::DOUBLE),
            "DROP INDEX \"idx_name\" ON \"users\";"
        );
    }
}
