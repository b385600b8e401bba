//! Snapshots of the last emitted schema per table.
//!
//! A snapshot keeps the SQL text the compiler produced when the last
//! migration for a table was generated, plus a content hash of that text.
//! The persisted document is a JSON array of snapshots sorted by name.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::compiler::CompiledTable;
use crate::error::Result;

/// Collapses every whitespace run to a single space and trims the ends.
#[must_use]
pub fn normalize_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// MD5 (lowercase hex) over the normalized schema followed by each
/// normalized index statement.
#[must_use]
pub fn content_hash<S: AsRef<str>>(schema: &str, indexes: &[S]) -> String {
    let mut content = normalize_whitespace(schema);
    for index in indexes {
        content.push_str(&normalize_whitespace(index.as_ref()));
    }
    format!("{:x}", md5::compute(content.as_bytes()))
}

/// The stored state of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Table name.
    pub name: String,
    /// Content hash of `schema` and `indexes`.
    pub hash: String,
    /// `CREATE TABLE` text.
    pub schema: String,
    /// `CREATE INDEX` statements. Missing or `null` in a document reads as
    /// no indexes.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub indexes: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Snapshot {
    /// Captures the compiled text of a table.
    #[must_use]
    pub fn of(compiled: &CompiledTable) -> Self {
        Self {
            name: compiled.name().to_string(),
            hash: content_hash(&compiled.create_sql, &compiled.index_sql),
            schema: compiled.create_sql.clone(),
            indexes: compiled.index_sql.clone(),
        }
    }
}

/// In-memory snapshot collection keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStore {
    snapshots: BTreeMap<String, Snapshot>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from its JSON document. Blank input is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Snapshot`](crate::SchemaError::Snapshot) if the
    /// document is not a JSON array of snapshots.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::new());
        }
        let list: Vec<Snapshot> = serde_json::from_str(json)?;
        Ok(list.into_iter().collect())
    }

    /// Serializes the store as a pretty-printed JSON array sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Snapshot`](crate::SchemaError::Snapshot) if
    /// encoding fails.
    pub fn to_json(&self) -> Result<String> {
        let list: Vec<&Snapshot> = self.snapshots.values().collect();
        Ok(serde_json::to_string_pretty(&list)?)
    }

    /// Looks up a table's snapshot.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Snapshot> {
        self.snapshots.get(name)
    }

    /// Stores the compiled state of a table, replacing any previous one.
    pub fn record(&mut self, compiled: &CompiledTable) {
        self.insert(Snapshot::of(compiled));
    }

    /// Inserts a snapshot, replacing any with the same name.
    pub fn insert(&mut self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.name.clone(), snapshot);
    }

    /// Iterates snapshots in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.values()
    }

    /// Number of tables stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if no table is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl FromIterator<Snapshot> for SnapshotStore {
    fn from_iter<I: IntoIterator<Item = Snapshot>>(iter: I) -> Self {
        let mut store = Self::new();
        for snapshot in iter {
            store.insert(snapshot);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(name: &str) -> Snapshot {
        let schema = format!("CREATE TABLE IF NOT EXISTS `{name}` (\n  `id` INTEGER NOT NULL\n);");
        Snapshot {
            name: name.into(),
            hash: content_hash::<&str>(&schema, &[]),
            schema,
            indexes: vec![],
        }
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(normalize_whitespace("  a \n\t b  c "), "a b c");
    }

    #[test]
    fn hash_ignores_cosmetic_whitespace() {
        let a = content_hash(
            "CREATE TABLE t (\n  `a` INT\n);",
            &["CREATE INDEX `i` ON `t` (`a`);"],
        );
        let b = content_hash(
            "CREATE TABLE t ( `a`   INT );",
            &["  CREATE INDEX `i` ON `t` (`a`);\n"],
        );
        let c = content_hash("CREATE TABLE t ( `a` INT );", &["CREATE INDEX `j` ON `t` (`a`);"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn json_is_a_sorted_array() {
        let store: SnapshotStore = [snapshot("users"), snapshot("orders")].into_iter().collect();
        let json = store.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let names: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["orders", "users"]);

        let loaded = SnapshotStore::from_json(&json).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn blank_document_is_empty() {
        assert!(SnapshotStore::from_json("").unwrap().is_empty());
        assert!(SnapshotStore::from_json(" \n").unwrap().is_empty());
        assert!(SnapshotStore::from_json("{\"name\": 1}").is_err());
    }

    #[test]
    fn missing_indexes_default_to_empty() {
        let store = SnapshotStore::from_json(
            r#"[{"name":"t","hash":"x","schema":"CREATE TABLE t (a INT);"}]"#,
        )
        .unwrap();
        assert!(store.get("t").unwrap().indexes.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn null_indexes_read_as_empty() {
        let store = SnapshotStore::from_json(
            r#"[
                {"name":"t","hash":"x","schema":"CREATE TABLE t (a INT);","indexes":null},
                {"name":"u","hash":"y","schema":"CREATE TABLE u (a INT);","indexes":["CREATE INDEX i ON u (a);"]}
            ]"#,
        )
        .unwrap();
        assert!(store.get("t").unwrap().indexes.is_empty());
        assert_eq!(store.get("u").unwrap().indexes.len(), 1);
        assert!(store.to_json().unwrap().contains("\"indexes\": []"));
    }
}
