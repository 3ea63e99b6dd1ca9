//! Target ledger
//!
//! Per tenant pair, the content hash each target object had right after
//! copy or deploy last wrote it. The target tenant is never pulled, so this
//! is the only baseline deploy has for the target side of its three-way
//! classification. Persisted as
//! `.cfgsync/target_{source}_to_{target}.json`.

use std::collections::BTreeMap;

use cfgsync_fs::{ConfigStore, NormalizedPath, WorkspacePath, constants::target_ledger_file_name};

use crate::model::{ConfigObject, ObjectType};
use crate::reference::normalize_references;
use crate::{Error, Result};

/// On-disk shape: `{type_tag: {target_id: hash}}`.
type LedgerFile = BTreeMap<String, BTreeMap<String, String>>;

/// Target object as deploy compares it: references without base URL.
pub fn target_view(object: &ConfigObject) -> ConfigObject {
    ConfigObject {
        content: normalize_references(&object.content, None),
        ..object.clone()
    }
}

/// Last written hashes of one target tenant, keyed by target id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetLedger {
    source_tenant: String,
    target_tenant: String,
    hashes: BTreeMap<ObjectType, BTreeMap<u64, String>>,
}

impl TargetLedger {
    pub fn new(source_tenant: impl Into<String>, target_tenant: impl Into<String>) -> Self {
        Self {
            source_tenant: source_tenant.into(),
            target_tenant: target_tenant.into(),
            hashes: BTreeMap::new(),
        }
    }

    pub fn path_in(root: &NormalizedPath, source_tenant: &str, target_tenant: &str) -> NormalizedPath {
        root.join(WorkspacePath::StateDir.as_str())
            .join(&target_ledger_file_name(source_tenant, target_tenant))
    }

    /// Load the ledger for a tenant pair, or start an empty one.
    pub fn load_or_new(root: &NormalizedPath, source_tenant: &str, target_tenant: &str) -> Result<Self> {
        let path = Self::path_in(root, source_tenant, target_tenant);
        let mut ledger = Self::new(source_tenant, target_tenant);
        let Some(file) = ConfigStore::new().load_optional::<LedgerFile>(&path)? else {
            return Ok(ledger);
        };
        for (tag, ids) in file {
            let object_type = tag.parse::<ObjectType>()?;
            let entries = ledger.hashes.entry(object_type).or_default();
            for (target_id, hash) in ids {
                let target_id = target_id.parse::<u64>().map_err(|_| Error::InvalidConfig {
                    message: format!("non-numeric target id '{target_id}' in {path}"),
                })?;
                entries.insert(target_id, hash);
            }
        }
        Ok(ledger)
    }

    pub fn save(&self, root: &NormalizedPath) -> Result<()> {
        let path = Self::path_in(root, &self.source_tenant, &self.target_tenant);
        let file: LedgerFile = self
            .hashes
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(t, ids)| {
                let ids = ids.iter().map(|(id, h)| (id.to_string(), h.clone())).collect();
                (t.tag().to_string(), ids)
            })
            .collect();
        ConfigStore::new().save(&path, &file)?;
        Ok(())
    }

    pub fn hash(&self, object_type: ObjectType, target_id: u64) -> Option<&str> {
        self.hashes.get(&object_type)?.get(&target_id).map(String::as_str)
    }

    /// Remember `stored` as just written to the target.
    pub fn record(&mut self, stored: &ConfigObject) {
        self.hashes
            .entry(stored.object_type)
            .or_default()
            .insert(stored.id, target_view(stored).content_hash());
    }

    /// Record `stored` and persist right away.
    pub fn record_and_save(&mut self, root: &NormalizedPath, stored: &ConfigObject) -> Result<()> {
        self.record(stored);
        self.save(root)
    }

    pub fn len(&self) -> usize {
        self.hashes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn object(object_type: ObjectType, value: Value) -> ConfigObject {
        let Value::Object(map) = value else {
            unreachable!()
        };
        ConfigObject::from_content(object_type, map).unwrap()
    }

    #[test]
    fn hash_ignores_base_url_and_volatile_fields() {
        let a = object(
            ObjectType::Queue,
            json!({"id": 5, "name": "Q", "schema": "https://a.example.com/api/v1/schemas/7",
                   "modified_at": "2026-01-01T00:00:00Z"}),
        );
        let b = object(
            ObjectType::Queue,
            json!({"id": 5, "name": "Q", "schema": "https://b.example.com/api/v1/schemas/7"}),
        );
        assert_eq!(target_view(&a).content_hash(), target_view(&b).content_hash());
    }

    #[test]
    fn records_persist_per_tenant_pair() {
        let temp = TempDir::new().unwrap();
        let root = NormalizedPath::new(temp.path());
        let schema = object(ObjectType::Schema, json!({"id": 5001, "name": "S"}));

        let mut ledger = TargetLedger::new("prod", "staging");
        ledger.record_and_save(&root, &schema).unwrap();
        assert!(temp.path().join(".cfgsync/target_prod_to_staging.json").is_file());

        let loaded = TargetLedger::load_or_new(&root, "prod", "staging").unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(
            loaded.hash(ObjectType::Schema, 5001),
            Some(target_view(&schema).content_hash().as_str())
        );
        assert!(loaded.hash(ObjectType::Schema, 5002).is_none());
        assert!(TargetLedger::load_or_new(&root, "prod", "qa").unwrap().is_empty());
    }
}
