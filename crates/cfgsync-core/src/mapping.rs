//! ID mapping between a source and a target tenant
//!
//! Built during copy, persisted next to the workspace as
//! `.id_mapping_{source}_to_{target}.json`, and read back by compare and
//! deploy. Entries are append-only: a source id never changes target.

use std::collections::BTreeMap;
use std::path::Path;

use cfgsync_fs::{ConfigStore, NormalizedPath, constants::id_mapping_file_name};

use crate::model::ObjectType;
use crate::{Error, Result};

/// On-disk shape: `{type_tag: {source_id: target_id}}`.
type MappingFile = BTreeMap<String, BTreeMap<String, u64>>;

/// `(type, source_id) -> target_id` for one tenant pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    source_tenant: String,
    target_tenant: String,
    entries: BTreeMap<ObjectType, BTreeMap<u64, u64>>,
}

impl IdMapping {
    pub fn new(source_tenant: impl Into<String>, target_tenant: impl Into<String>) -> Self {
        Self {
            source_tenant: source_tenant.into(),
            target_tenant: target_tenant.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn source_tenant(&self) -> &str {
        &self.source_tenant
    }

    pub fn target_tenant(&self) -> &str {
        &self.target_tenant
    }

    /// Path of the side file for this tenant pair under `root`.
    pub fn path_in(root: &NormalizedPath, source_tenant: &str, target_tenant: &str) -> NormalizedPath {
        root.join(&id_mapping_file_name(source_tenant, target_tenant))
    }

    /// Record a mapping.
    ///
    /// Re-recording the same pair is a no-op; a different target for an
    /// already-mapped source id is a [`Error::MappingConflict`].
    pub fn put(&mut self, object_type: ObjectType, source_id: u64, target_id: u64) -> Result<()> {
        let ids = self.entries.entry(object_type).or_default();
        match ids.get(&source_id) {
            Some(&existing) if existing == target_id => Ok(()),
            Some(&existing) => Err(Error::MappingConflict {
                object_type,
                source_id,
                existing,
                attempted: target_id,
            }),
            None => {
                ids.insert(source_id, target_id);
                Ok(())
            }
        }
    }

    pub fn get(&self, object_type: ObjectType, source_id: u64) -> Option<u64> {
        self.entries.get(&object_type)?.get(&source_id).copied()
    }

    /// Like [`get`](Self::get) but missing entries are an error.
    pub fn require(&self, object_type: ObjectType, source_id: u64) -> Result<u64> {
        self.get(object_type, source_id).ok_or_else(|| {
            Error::NotFound(format!(
                "no {} mapping for source id {} ({} -> {})",
                object_type, source_id, self.source_tenant, self.target_tenant
            ))
        })
    }

    /// Reverse lookup.
    pub fn source_for(&self, object_type: ObjectType, target_id: u64) -> Option<u64> {
        self.entries
            .get(&object_type)?
            .iter()
            .find_map(|(&src, &tgt)| (tgt == target_id).then_some(src))
    }

    /// Merge `other` into `self`, failing on any contradicting entry.
    pub fn union(&mut self, other: &IdMapping) -> Result<()> {
        for (&object_type, ids) in &other.entries {
            for (&source_id, &target_id) in ids {
                self.put(object_type, source_id, target_id)?;
            }
        }
        Ok(())
    }

    /// Entries of one type, ordered by source id.
    pub fn entries(&self, object_type: ObjectType) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries
            .get(&object_type)
            .into_iter()
            .flat_map(|ids| ids.iter().map(|(&s, &t)| (s, t)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the persisted mapping for a tenant pair, or start an empty one.
    pub fn load_or_new(root: &NormalizedPath, source_tenant: &str, target_tenant: &str) -> Result<Self> {
        let path = Self::path_in(root, source_tenant, target_tenant);
        let mut mapping = Self::new(source_tenant, target_tenant);
        if let Some(file) = ConfigStore::new().load_optional::<MappingFile>(&path)? {
            mapping.absorb(file)?;
            tracing::debug!(path = %path, entries = mapping.len(), "Loaded ID mapping");
        }
        Ok(mapping)
    }

    /// Load a mapping file from an explicit path.
    pub fn load_file(path: &Path, source_tenant: &str, target_tenant: &str) -> Result<Self> {
        let file: MappingFile = ConfigStore::new().load(&NormalizedPath::new(path))?;
        let mut mapping = Self::new(source_tenant, target_tenant);
        mapping.absorb(file)?;
        Ok(mapping)
    }

    /// Persist atomically under `root`, returning the written path.
    pub fn save(&self, root: &NormalizedPath) -> Result<NormalizedPath> {
        let path = Self::path_in(root, &self.source_tenant, &self.target_tenant);
        let file: MappingFile = self
            .entries
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(t, ids)| {
                let ids = ids.iter().map(|(s, t)| (s.to_string(), *t)).collect();
                (t.tag().to_string(), ids)
            })
            .collect();
        ConfigStore::new().save(&path, &file)?;
        Ok(path)
    }

    fn absorb(&mut self, file: MappingFile) -> Result<()> {
        for (tag, ids) in file {
            let object_type = tag.parse::<ObjectType>()?;
            for (source_id, target_id) in ids {
                let source_id = source_id.parse::<u64>().map_err(|_| Error::InvalidConfig {
                    message: format!("non-numeric source id '{source_id}' in {tag} mapping"),
                })?;
                self.put(object_type, source_id, target_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn put_is_idempotent_and_append_only() {
        let mut mapping = IdMapping::new("prod", "staging");
        mapping.put(ObjectType::Queue, 100, 5100).unwrap();
        mapping.put(ObjectType::Queue, 100, 5100).unwrap();
        assert_eq!(mapping.len(), 1);

        let err = mapping.put(ObjectType::Queue, 100, 5101).unwrap_err();
        assert!(matches!(
            err,
            Error::MappingConflict { existing: 5100, attempted: 5101, .. }
        ));
        assert_eq!(mapping.get(ObjectType::Queue, 100), Some(5100));
    }

    #[test]
    fn ids_are_scoped_by_type() {
        let mut mapping = IdMapping::new("a", "b");
        mapping.put(ObjectType::Queue, 1, 10).unwrap();
        mapping.put(ObjectType::Schema, 1, 20).unwrap();
        assert_eq!(mapping.get(ObjectType::Queue, 1), Some(10));
        assert_eq!(mapping.get(ObjectType::Schema, 1), Some(20));
        assert_eq!(mapping.get(ObjectType::Hook, 1), None);
        assert_eq!(mapping.source_for(ObjectType::Schema, 20), Some(1));
        assert!(mapping.require(ObjectType::Hook, 1).is_err());
    }

    #[test]
    fn union_rejects_contradictions() {
        let mut a = IdMapping::new("a", "b");
        a.put(ObjectType::Hook, 3, 30).unwrap();
        let mut b = IdMapping::new("a", "b");
        b.put(ObjectType::Hook, 4, 40).unwrap();
        a.union(&b).unwrap();
        assert_eq!(a.len(), 2);

        let mut c = IdMapping::new("a", "b");
        c.put(ObjectType::Hook, 3, 31).unwrap();
        assert!(a.union(&c).is_err());
    }

    #[test]
    fn save_writes_type_keyed_file_and_loads_back() {
        let temp = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp.path());
        let mut mapping = IdMapping::new("prod", "staging");
        mapping.put(ObjectType::Workspace, 111, 9001).unwrap();
        mapping.put(ObjectType::EmailTemplate, 7, 70).unwrap();

        let path = mapping.save(&root).unwrap();
        assert!(path.as_str().ends_with(".id_mapping_prod_to_staging.json"));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path.to_native()).unwrap()).unwrap();
        assert_eq!(raw["workspace"]["111"], 9001);
        assert_eq!(raw["email_template"]["7"], 70);

        let loaded = IdMapping::load_or_new(&root, "prod", "staging").unwrap();
        assert_eq!(loaded, mapping);
    }

    #[test]
    fn load_or_new_without_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let mapping =
            IdMapping::load_or_new(&NormalizedPath::new(temp.path()), "x", "y").unwrap();
        assert!(mapping.is_empty());
    }
}
