//! Loading and saving the snapshot document.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use gemsql_core::SnapshotStore;
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Loads the snapshot store. A missing file is an empty store.
///
/// # Errors
///
/// Returns an IO error if the file exists but cannot be read, or a schema
/// error if it is not a valid snapshot document.
pub fn load(path: &Path) -> Result<SnapshotStore> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no snapshot store yet");
            return Ok(SnapshotStore::new());
        }
        Err(e) => return Err(MigrateError::io(path, e)),
    };
    let store = SnapshotStore::from_json(&json)?;
    debug!(path = %path.display(), tables = store.len(), "loaded snapshots");
    Ok(store)
}

/// Writes the snapshot store, replacing the previous document.
///
/// The document is written to a sibling temporary file first and then
/// renamed over the target.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be created or the file cannot
/// be written.
pub fn save(path: &Path, store: &SnapshotStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MigrateError::io(parent, e))?;
    }
    let json = store.to_json()?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| MigrateError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| MigrateError::io(path, e))?;
    debug!(path = %path.display(), tables = store.len(), "saved snapshots");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemsql_core::Snapshot;

    fn store() -> SnapshotStore {
        std::iter::once(Snapshot {
            name: "users".into(),
            hash: "abc".into(),
            schema: "CREATE TABLE `users` (`id` INTEGER NOT NULL);".into(),
            indexes: vec!["CREATE INDEX `idx_id` ON `users` (`id`);".into()],
        })
        .collect()
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gem").join("snapshots.json");
        save(&path, &store()).unwrap();

        assert_eq!(load(&path).unwrap(), store());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(MigrateError::Schema(_))));
    }
}
