//! Local object store
//!
//! Objects live at `{root}/{type_plural}/{sanitized_name}_{id}.json` as
//! pretty, key-sorted JSON. The id suffix is authoritative: renaming an
//! object remotely moves its file on the next write.

use std::fs;

use cfgsync_fs::{NormalizedPath, io, sanitize_file_stem};
use serde::Serialize;
use serde_json::Value;

use crate::ledger::Ledger;
use crate::model::{ConfigObject, ObjectType};
use crate::{Error, Result};

/// An object read from disk together with its sync state.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    pub object: ConfigObject,
    pub file_path: NormalizedPath,
    /// Hash recorded at the last pull or push, if any
    pub last_synced_hash: Option<String>,
}

/// A file that could not be read as a configuration object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptFile {
    pub object_type: ObjectType,
    pub path: String,
    pub message: String,
}

/// Result of listing a type directory.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub records: Vec<LocalRecord>,
    pub corrupt: Vec<CorruptFile>,
}

impl Enumeration {
    /// Fill `last_synced_hash` from the ledger.
    pub fn with_ledger(mut self, ledger: &Ledger) -> Self {
        for record in &mut self.records {
            record.last_synced_hash = ledger
                .entry(record.object.object_type, record.object.id)
                .map(|e| e.hash.clone());
        }
        self
    }

    fn extend(&mut self, other: Enumeration) {
        self.records.extend(other.records);
        self.corrupt.extend(other.corrupt);
    }
}

/// Filesystem-backed store for one workspace root.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: NormalizedPath,
}

impl LocalStore {
    pub fn new(root: impl Into<NormalizedPath>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    pub fn type_dir(&self, object_type: ObjectType) -> NormalizedPath {
        self.root.join(object_type.plural())
    }

    /// File name for an object: `{sanitized_name}_{id}.json`.
    pub fn file_name(object: &ConfigObject) -> String {
        format!("{}_{}.json", sanitize_file_stem(&object.name), object.id)
    }

    /// Path relative to the root: `{plural}/{file_name}`.
    pub fn relative_path(object: &ConfigObject) -> String {
        format!("{}/{}", object.object_type.plural(), Self::file_name(object))
    }

    /// Persist `object`, replacing any earlier file for the same id.
    pub fn write(&self, object: &ConfigObject) -> Result<NormalizedPath> {
        let path = self.type_dir(object.object_type).join(&Self::file_name(object));

        for stale in self.paths_for_id(object.object_type, object.id)? {
            if stale != path {
                io::remove_file_if_exists(&stale)?;
                tracing::debug!(path = %stale, "Removed stale file after rename");
            }
        }

        io::write_text(&path, &object.to_canonical_json()?)?;
        tracing::trace!(object_type = %object.object_type, id = object.id, path = %path, "Wrote object");
        Ok(path)
    }

    /// Read one object. `Ok(None)` when no file exists for the id.
    ///
    /// A malformed file is reported as [`Error::CorruptRecord`].
    pub fn read(&self, object_type: ObjectType, id: u64) -> Result<Option<LocalRecord>> {
        match self.paths_for_id(object_type, id)?.into_iter().next() {
            Some(path) => self.read_path(object_type, path).map(Some),
            None => Ok(None),
        }
    }

    /// All readable objects of one type, sorted by id. Bad files are
    /// collected in `corrupt` and never abort the listing.
    pub fn enumerate(&self, object_type: ObjectType) -> Result<Enumeration> {
        let mut enumeration = Enumeration::default();
        for path in self.json_files(object_type)? {
            match self.read_path(object_type, path.clone()) {
                Ok(record) => enumeration.records.push(record),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Skipping corrupt local record");
                    enumeration.corrupt.push(CorruptFile {
                        object_type,
                        path: path.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        enumeration.records.sort_by_key(|r| r.object.id);
        Ok(enumeration)
    }

    /// [`enumerate`](Self::enumerate) over every object type.
    pub fn enumerate_all(&self) -> Result<Enumeration> {
        let mut all = Enumeration::default();
        for object_type in ObjectType::ALL {
            all.extend(self.enumerate(object_type)?);
        }
        Ok(all)
    }

    /// Delete the file(s) for an object. Returns whether anything was removed.
    pub fn remove(&self, object_type: ObjectType, id: u64) -> Result<bool> {
        let mut removed = false;
        for path in self.paths_for_id(object_type, id)? {
            removed |= io::remove_file_if_exists(&path)?;
        }
        Ok(removed)
    }

    fn read_path(&self, object_type: ObjectType, path: NormalizedPath) -> Result<LocalRecord> {
        let corrupt = |message: String| Error::CorruptRecord {
            path: path.to_native(),
            message,
        };

        let text = io::read_text(&path).map_err(|e| corrupt(e.to_string()))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
        let Value::Object(content) = value else {
            return Err(corrupt("top-level value is not an object".into()));
        };
        let object =
            ConfigObject::from_content(object_type, content).map_err(|e| corrupt(e.to_string()))?;

        if file_id(&path) != Some(object.id) {
            return Err(corrupt(format!(
                "file name does not match object id {}",
                object.id
            )));
        }

        Ok(LocalRecord {
            object,
            file_path: path,
            last_synced_hash: None,
        })
    }

    fn paths_for_id(&self, object_type: ObjectType, id: u64) -> Result<Vec<NormalizedPath>> {
        Ok(self
            .json_files(object_type)?
            .into_iter()
            .filter(|p| file_id(p) == Some(id))
            .collect())
    }

    fn json_files(&self, object_type: ObjectType) -> Result<Vec<NormalizedPath>> {
        let dir = self.type_dir(object_type);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let native = dir.to_native();
        let mut files = Vec::new();
        for entry in fs::read_dir(&native).map_err(|e| cfgsync_fs::Error::io(&native, e))? {
            let entry = entry.map_err(|e| cfgsync_fs::Error::io(&native, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                files.push(dir.join(&name));
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Id encoded in `{stem}_{id}.json`.
fn file_id(path: &NormalizedPath) -> Option<u64> {
    let stem = path.file_name()?.strip_suffix(".json")?;
    let (_, id) = stem.rsplit_once('_')?;
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn queue(id: u64, name: &str, extra: Value) -> ConfigObject {
        let mut content = serde_json::Map::new();
        content.insert("id".into(), json!(id));
        content.insert("name".into(), json!(name));
        if let Value::Object(extra) = extra {
            content.extend(extra);
        }
        ConfigObject::from_content(ObjectType::Queue, content).unwrap()
    }

    fn store() -> (TempDir, LocalStore) {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn write_uses_sanitized_name_and_id() {
        let (_temp, store) = store();
        let path = store.write(&queue(100, "Invoices / EU", json!({}))).unwrap();
        assert!(path.as_str().ends_with("queues/Invoices_EU_100.json"));
    }

    #[test]
    fn writing_twice_is_byte_identical() {
        let (_temp, store) = store();
        let object = queue(1, "Q", json!({"b": 2, "a": {"y": 1, "x": 2}}));
        let path = store.write(&object).unwrap();
        let first = fs::read(path.to_native()).unwrap();
        store.write(&object).unwrap();
        let second = fs::read(path.to_native()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rename_replaces_old_file() {
        let (_temp, store) = store();
        store.write(&queue(5, "Old", json!({}))).unwrap();
        store.write(&queue(5, "New", json!({}))).unwrap();

        let listed = store.enumerate(ObjectType::Queue).unwrap();
        assert_eq!(listed.records.len(), 1);
        assert!(listed.records[0].file_path.as_str().ends_with("New_5.json"));
    }

    #[test]
    fn read_returns_none_for_unknown_id() {
        let (_temp, store) = store();
        assert!(store.read(ObjectType::Schema, 42).unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_isolated() {
        let (temp, store) = store();
        store.write(&queue(1, "Good", json!({}))).unwrap();
        fs::write(temp.path().join("queues/Bad_2.json"), "{ not json").unwrap();

        let listed = store.enumerate(ObjectType::Queue).unwrap();
        assert_eq!(listed.records.len(), 1);
        assert_eq!(listed.corrupt.len(), 1);
        assert!(listed.corrupt[0].path.ends_with("Bad_2.json"));

        let err = store.read(ObjectType::Queue, 2).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }));
    }

    #[test]
    fn undecodable_file_is_corrupt() {
        let (temp, store) = store();
        fs::create_dir_all(temp.path().join("queues")).unwrap();
        fs::write(temp.path().join("queues/Q_6.json"), [0xff, 0xfe, 0x7b]).unwrap();

        let err = store.read(ObjectType::Queue, 6).unwrap_err();
        assert!(matches!(err, Error::CorruptRecord { .. }), "{err:?}");
        assert_eq!(store.enumerate(ObjectType::Queue).unwrap().corrupt.len(), 1);
    }

    #[test]
    fn mismatched_id_is_corrupt() {
        let (temp, store) = store();
        fs::create_dir_all(temp.path().join("queues")).unwrap();
        fs::write(
            temp.path().join("queues/Q_3.json"),
            "{\"id\": 4, \"name\": \"Q\"}\n",
        )
        .unwrap();
        let listed = store.enumerate(ObjectType::Queue).unwrap();
        assert!(listed.records.is_empty());
        assert_eq!(listed.corrupt.len(), 1);
    }

    #[test]
    fn remove_deletes_file() {
        let (_temp, store) = store();
        store.write(&queue(9, "Q", json!({}))).unwrap();
        assert!(store.remove(ObjectType::Queue, 9).unwrap());
        assert!(!store.remove(ObjectType::Queue, 9).unwrap());
    }
}
