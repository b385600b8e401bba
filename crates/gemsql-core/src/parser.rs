//! Re-parser for the SQL text the compiler emits.
//!
//! Stored snapshots are plain SQL, so the diff engine parses both the stored
//! and the freshly compiled text back into definitions. Identifiers may be
//! quoted with backticks, double quotes or brackets regardless of the quote
//! style in use, so snapshots survive a quote change.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{Result, SchemaError};
use crate::schema::{ColumnDefinition, IndexDefinition, TableDefinition};

/// Matches one identifier in any supported quote style.
const IDENT: &str = r#"`[^`]+`|"[^"]+"|\[[^\]]+\]|[^\s(]+"#;

/// Constraint keywords that end a column's type, in canonical order.
const KEYWORDS: [&str; 6] = [
    "AUTO_INCREMENT",
    "CHECK",
    "UNIQUE",
    "NOT NULL",
    "DEFAULT",
    "COMMENT",
];

/// Parses a `CREATE TABLE` statement.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] if the statement header, a column entry or
/// the primary key clause does not match the grammar.
pub fn parse_create_table(sql: &str) -> Result<TableDefinition> {
    let header = Regex::new(&format!(
        r"(?is)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?({IDENT})\s*\((.*)\)\s*;?\s*$"
    ))
    .map_err(|e| SchemaError::parse("", e.to_string()))?;

    let caps = header
        .captures(sql)
        .ok_or_else(|| SchemaError::parse(first_line(sql), "not a CREATE TABLE statement"))?;
    let name = unquote(&caps[1]);
    let mut table = TableDefinition::new(&name);

    for entry in split_top_level(&caps[2], ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some(columns) = primary_key_columns(entry) {
            table.primary_key = columns;
            continue;
        }
        let column = parse_column(entry).map_err(|message| SchemaError::parse(&name, message))?;
        if table.column(&column.name).is_some() {
            return Err(SchemaError::parse(
                &name,
                format!("duplicate column '{}'", column.name),
            ));
        }
        table.columns.push(column);
    }

    if table.columns.is_empty() {
        return Err(SchemaError::parse(&name, "table has no columns"));
    }
    Ok(table)
}

/// Parses a `CREATE [UNIQUE] INDEX` statement.
///
/// Columns get ascending priorities in their written order, so rendering the
/// result keeps that order.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] if the statement does not match.
pub fn parse_index(sql: &str) -> Result<IndexDefinition> {
    let pattern = Regex::new(&format!(
        r"(?is)^\s*CREATE\s+(UNIQUE\s+)?INDEX\s+({IDENT})\s+ON\s+({IDENT})\s*\((.*)\)\s*;?\s*$"
    ))
    .map_err(|e| SchemaError::parse("", e.to_string()))?;

    let caps = pattern
        .captures(sql)
        .ok_or_else(|| SchemaError::parse(first_line(sql), "not a CREATE INDEX statement"))?;
    let mut index = IndexDefinition::new(unquote(&caps[2]), caps.get(1).is_some());

    let mut priority = 0;
    for column in split_top_level(&caps[4], ',') {
        let column = unquote(column.trim());
        if column.is_empty() {
            continue;
        }
        if !index.columns.contains(&column) {
            index.push(column, priority);
            priority += 1;
        }
    }
    if index.columns.is_empty() {
        return Err(SchemaError::parse(&caps[3], format!("index '{}' has no columns", index.name)));
    }
    Ok(index)
}

/// Parses a list of index statements, keyed by index name.
///
/// Statements sharing a name are merged into one index; duplicate columns
/// collapse.
///
/// # Errors
///
/// Returns the first statement's parse error.
pub fn parse_indexes<S: AsRef<str>>(statements: &[S]) -> Result<BTreeMap<String, IndexDefinition>> {
    let mut indexes: BTreeMap<String, IndexDefinition> = BTreeMap::new();
    for sql in statements {
        let sql = sql.as_ref();
        if sql.trim().is_empty() {
            continue;
        }
        let parsed = parse_index(sql)?;
        match indexes.get_mut(&parsed.name) {
            Some(existing) => {
                let mut next = i64::try_from(existing.columns.len()).unwrap_or(i64::MAX);
                for column in parsed.ordered_columns() {
                    if !existing.columns.contains(&column) {
                        existing.push(column, next);
                        next += 1;
                    }
                }
            }
            None => {
                indexes.insert(parsed.name.clone(), parsed);
            }
        }
    }
    Ok(indexes)
}

/// Spells a column fragment the way the parser reads it back: tokens outside
/// quotes and parentheses separated by single spaces.
pub(crate) fn canonical_fragment(text: &str) -> String {
    let tokens = split_top_level(text, ' ');
    let tokens: Vec<&str> = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    tokens.join(" ")
}

/// First constraint keyword in a column type, which would end the type when
/// the column is parsed back.
pub(crate) fn constraint_keyword(sql_type: &str) -> Option<String> {
    let tokens = split_top_level(sql_type, ' ');
    let tokens: Vec<&str> = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    (0..tokens.len()).find_map(|i| match keyword_width(&tokens[i..]) {
        0 => None,
        width => Some(tokens[i..i + width].join(" ")),
    })
}

fn parse_column(entry: &str) -> std::result::Result<ColumnDefinition, String> {
    let (name, rest) = split_ident(entry).ok_or_else(|| format!("malformed column '{entry}'"))?;
    let tokens = split_top_level(rest, ' ');
    let tokens: Vec<&str> = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();

    let mut sql_type: Vec<&str> = Vec::new();
    let mut constraints: Vec<Vec<&str>> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let width = keyword_width(&tokens[i..]);
        if width > 0 {
            constraints.push(tokens[i..i + width].to_vec());
            i += width;
            continue;
        }
        match constraints.last_mut() {
            Some(current) => current.push(tokens[i]),
            None => sql_type.push(tokens[i]),
        }
        i += 1;
    }

    if sql_type.is_empty() {
        return Err(format!("column '{name}' has no type"));
    }
    Ok(ColumnDefinition {
        name,
        sql_type: sql_type.join(" "),
        constraints: constraints.into_iter().map(|c| c.join(" ")).collect(),
    })
}

/// Number of tokens a constraint keyword spans at the start of `tokens`, or 0.
fn keyword_width(tokens: &[&str]) -> usize {
    let first = tokens[0].to_ascii_uppercase();
    if first == "NOT" && tokens.get(1).is_some_and(|t| t.eq_ignore_ascii_case("NULL")) {
        return 2;
    }
    let starts_keyword = KEYWORDS
        .iter()
        .any(|k| first == *k || (*k == "CHECK" && first.starts_with("CHECK(")));
    usize::from(starts_keyword)
}

fn primary_key_columns(entry: &str) -> Option<Vec<String>> {
    let upper = entry.to_ascii_uppercase();
    let rest = upper.strip_prefix("PRIMARY")?.trim_start().strip_prefix("KEY")?;
    let offset = entry.len() - rest.len();
    let list = entry[offset..].trim().strip_prefix('(')?.strip_suffix(')')?;
    Some(
        split_top_level(list, ',')
            .iter()
            .map(|c| unquote(c.trim()))
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

/// Splits a leading identifier off `entry`.
fn split_ident(entry: &str) -> Option<(String, &str)> {
    let close = match entry.chars().next()? {
        '`' => '`',
        '"' => '"',
        '[' => ']',
        _ => {
            let end = entry.find(char::is_whitespace).unwrap_or(entry.len());
            return Some((entry[..end].to_string(), &entry[end..]));
        }
    };
    let end = entry[1..].find(close)? + 1;
    Some((entry[1..end].to_string(), &entry[end + 1..]))
}

/// Strips one layer of identifier quoting.
fn unquote(ident: &str) -> String {
    let ident = ident.trim();
    for (open, close) in [('`', '`'), ('"', '"'), ('[', ']')] {
        if let Some(inner) = ident.strip_prefix(open).and_then(|s| s.strip_suffix(close)) {
            return inner.to_string();
        }
    }
    ident.to_string()
}

/// Splits at `sep` outside parentheses and quotes. A space separator also
/// splits on any whitespace.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        let is_sep = if sep == ' ' { c.is_whitespace() } else { c == sep };
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            _ if is_sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn first_line(sql: &str) -> String {
    sql.trim().lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Quote;
    use crate::schema::{AUTO_INCREMENT, NOT_NULL};

    const USERS: &str = "CREATE TABLE IF NOT EXISTS `users` (
  `id` INTEGER UNSIGNED AUTO_INCREMENT NOT NULL,
  `price` DECIMAL(10,2) NOT NULL DEFAULT 0.00,
  `age` INTEGER CHECK (age > 0) UNIQUE NOT NULL DEFAULT 18 COMMENT 'Age, in years',
  `nick` VARCHAR(255) NULL,
  PRIMARY KEY (`id`)
);";

    #[test]
    fn parses_columns_and_primary_key() {
        let table = parse_create_table(USERS).unwrap();
        assert_eq!(table.name, "users");
        assert_eq!(table.primary_key, ["id"]);
        assert_eq!(table.columns.len(), 4);

        let id = table.column("id").unwrap();
        assert_eq!(id.sql_type, "INTEGER UNSIGNED");
        assert_eq!(id.constraints, [AUTO_INCREMENT, NOT_NULL]);

        let price = table.column("price").unwrap();
        assert_eq!(price.sql_type, "DECIMAL(10,2)");
        assert_eq!(price.constraints, [NOT_NULL, "DEFAULT 0.00"]);

        let age = table.column("age").unwrap();
        assert_eq!(
            age.constraints,
            ["CHECK (age > 0)", "UNIQUE", NOT_NULL, "DEFAULT 18", "COMMENT 'Age, in years'"]
        );

        let nick = table.column("nick").unwrap();
        assert_eq!(nick.sql_type, "VARCHAR(255) NULL");
        assert!(nick.constraints.is_empty());
    }

    #[test]
    fn render_round_trip() {
        let table = parse_create_table(USERS).unwrap();
        assert_eq!(table.to_sql(Quote::BACKTICK), USERS);
        assert_eq!(parse_create_table(&table.to_sql(Quote::BRACKETS)).unwrap(), table);
        assert_eq!(parse_create_table(&table.to_sql(Quote::DOUBLE)).unwrap(), table);
    }

    #[test]
    fn tolerates_hand_edited_whitespace() {
        let table = parse_create_table(
            "create table users (id   INTEGER\n\n NOT   NULL ,\n name VARCHAR(10));",
        )
        .unwrap();
        assert_eq!(table.name, "users");
        assert_eq!(table.column("id").unwrap().constraints, ["NOT NULL"]);
        assert_eq!(table.column("name").unwrap().sql_type, "VARCHAR(10)");
        assert!(table.primary_key.is_empty());
    }

    #[test]
    fn default_may_contain_keywords_in_quotes() {
        let table =
            parse_create_table("CREATE TABLE t (`s` VARCHAR(20) NOT NULL DEFAULT 'NOT NULL');")
                .unwrap();
        assert_eq!(
            table.column("s").unwrap().constraints,
            ["NOT NULL", "DEFAULT 'NOT NULL'"]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_create_table("DROP TABLE users;"),
            Err(SchemaError::Parse { .. })
        ));
        assert!(parse_create_table("CREATE TABLE t ();").is_err());
        let err = parse_create_table("CREATE TABLE t (`a` NOT NULL);").unwrap_err();
        assert!(err.to_string().contains("'t'"), "{err}");
    }

    #[test]
    fn parses_index_statements() {
        let index =
            parse_index("CREATE UNIQUE INDEX `udx_x` ON `users` (`b`, `a`, `b`);").unwrap();
        assert_eq!(index.name, "udx_x");
        assert!(index.unique);
        assert_eq!(index.ordered_columns(), ["b", "a"]);
        assert_eq!(
            index.to_sql("users", Quote::BACKTICK),
            "CREATE UNIQUE INDEX `udx_x` ON `users` (`b`, `a`);"
        );

        let plain = parse_index("CREATE INDEX [idx_y] ON [users] ([c])").unwrap();
        assert!(!plain.unique);
        assert_eq!(plain.columns, ["c"]);

        assert!(parse_index("CREATE TABLE x (a INT);").is_err());
    }

    #[test]
    fn merges_indexes_by_name() {
        let indexes = parse_indexes(&[
            "CREATE INDEX `idx_a` ON `t` (`x`);",
            "CREATE INDEX `idx_a` ON `t` (`y`, `x`);",
            "",
            "CREATE UNIQUE INDEX `udx_b` ON `t` (`z`);",
        ])
        .unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes["idx_a"].ordered_columns(), ["x", "y"]);
        assert!(indexes["udx_b"].unique);
    }
}
