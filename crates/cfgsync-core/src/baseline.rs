//! Three-way baselines
//!
//! The baseline of an object is its last committed version when the
//! workspace sits in a git working tree, otherwise the hash recorded in the
//! ledger at the last pull or push. The snapshot is captured synchronously
//! so no repository handle is ever held across remote I/O.

use std::collections::{BTreeMap, BTreeSet};

use cfgsync_fs::NormalizedPath;
use cfgsync_git::{CommitInfo, CommittedTree};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::ledger::Ledger;
use crate::model::{ConfigObject, ObjectRef, ObjectType};

/// Where a baseline hash came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// Version at `HEAD` of the enclosing git working tree
    Committed,
    /// Hash recorded in the sync ledger
    LastPull,
    /// Hash recorded when copy or deploy last wrote the target object
    LastWrite,
    /// No baseline known
    Unavailable,
}

/// Baseline of a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub hash: Option<String>,
    pub source: BaselineSource,
}

/// Baselines for every object of a workspace at one point in time.
#[derive(Debug, Clone, Default)]
pub struct BaselineSnapshot {
    committed: Option<BTreeMap<ObjectRef, String>>,
    commit: Option<CommitInfo>,
    synced: BTreeMap<ObjectRef, String>,
    last_pull: Option<DateTime<Utc>>,
}

impl BaselineSnapshot {
    /// Read committed versions (if any) and ledger hashes for `root`.
    pub fn capture(root: &NormalizedPath, ledger: &Ledger) -> Result<Self> {
        let synced = ledger
            .entries()
            .iter()
            .map(|e| (ObjectRef::new(e.object_type, e.id), e.hash.clone()))
            .collect();

        let (committed, commit) = match CommittedTree::discover(&root.to_native())? {
            Some(tree) => {
                let hashes = committed_hashes(&tree)?;
                tracing::debug!(
                    objects = hashes.len(),
                    "Using committed versions as baseline"
                );
                (Some(hashes), tree.head().cloned())
            }
            None => (None, None),
        };

        Ok(Self {
            committed,
            commit,
            synced,
            last_pull: ledger.last_pull,
        })
    }

    /// A snapshot from the ledger only, ignoring any working tree.
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self {
            committed: None,
            commit: None,
            synced: ledger
                .entries()
                .iter()
                .map(|e| (ObjectRef::new(e.object_type, e.id), e.hash.clone()))
                .collect(),
            last_pull: ledger.last_pull,
        }
    }

    /// Whether a git working tree backs this snapshot.
    pub fn has_working_tree(&self) -> bool {
        self.committed.is_some()
    }

    /// Commit used as baseline, if the branch has history.
    pub fn commit(&self) -> Option<&CommitInfo> {
        self.commit.as_ref()
    }

    pub fn last_pull(&self) -> Option<DateTime<Utc>> {
        self.last_pull
    }

    /// Baseline of `key`: committed version first, then ledger.
    pub fn baseline(&self, key: ObjectRef) -> Baseline {
        if let Some(hash) = self.committed.as_ref().and_then(|c| c.get(&key)) {
            return Baseline {
                hash: Some(hash.clone()),
                source: BaselineSource::Committed,
            };
        }
        match self.synced.get(&key) {
            Some(hash) => Baseline {
                hash: Some(hash.clone()),
                source: BaselineSource::LastPull,
            },
            None => Baseline {
                hash: None,
                source: BaselineSource::Unavailable,
            },
        }
    }

    /// Hash recorded at the last pull or push, ignoring commits.
    pub fn synced_hash(&self, key: ObjectRef) -> Option<&str> {
        self.synced.get(&key).map(String::as_str)
    }

    /// Every object that has a baseline of either kind.
    pub fn keys(&self) -> BTreeSet<ObjectRef> {
        let mut keys: BTreeSet<ObjectRef> = self.synced.keys().copied().collect();
        if let Some(committed) = &self.committed {
            keys.extend(committed.keys().copied());
        }
        keys
    }
}

fn committed_hashes(tree: &CommittedTree) -> Result<BTreeMap<ObjectRef, String>> {
    let mut hashes = BTreeMap::new();
    for object_type in ObjectType::ALL {
        for file in tree.list_dir(object_type.plural())? {
            if !file.name.ends_with(".json") {
                continue;
            }
            match parse_committed(object_type, &file.content) {
                Some(object) => {
                    hashes.insert(object.key(), object.content_hash());
                }
                None => tracing::warn!(
                    object_type = %object_type,
                    file = %file.name,
                    "Ignoring unreadable committed record"
                ),
            }
        }
    }
    Ok(hashes)
}

fn parse_committed(object_type: ObjectType, content: &[u8]) -> Option<ConfigObject> {
    match serde_json::from_slice::<Value>(content).ok()? {
        Value::Object(map) => ConfigObject::from_content(object_type, map).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use cfgsync_test_utils::git::{commit_all, real_git_repo};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn schema(threshold: f64) -> ConfigObject {
        let Value::Object(map) = json!({"id": 200, "name": "S", "score_threshold": threshold})
        else {
            unreachable!()
        };
        ConfigObject::from_content(ObjectType::Schema, map).unwrap()
    }

    #[test]
    fn ledger_baseline_without_working_tree() {
        let temp = TempDir::new().unwrap();
        let mut ledger = Ledger::new();
        ledger.record(ObjectType::Schema, 200, "sha256:x".into(), None);

        let snapshot = BaselineSnapshot::capture(&NormalizedPath::new(temp.path()), &ledger).unwrap();
        assert!(!snapshot.has_working_tree());

        let key = ObjectRef::new(ObjectType::Schema, 200);
        assert_eq!(snapshot.baseline(key).source, BaselineSource::LastPull);
        assert_eq!(
            snapshot.baseline(ObjectRef::new(ObjectType::Queue, 1)).source,
            BaselineSource::Unavailable
        );
    }

    #[test]
    fn committed_version_takes_precedence_over_ledger() {
        let temp = TempDir::new().unwrap();
        let repo = real_git_repo(temp.path());
        let store = LocalStore::new(temp.path());
        store.write(&schema(0.5)).unwrap();
        commit_all(&repo, "baseline");
        store.write(&schema(0.9)).unwrap();

        let mut ledger = Ledger::new();
        ledger.record(ObjectType::Schema, 200, schema(0.7).content_hash(), None);

        let snapshot = BaselineSnapshot::capture(&NormalizedPath::new(temp.path()), &ledger).unwrap();
        let baseline = snapshot.baseline(ObjectRef::new(ObjectType::Schema, 200));
        assert_eq!(baseline.source, BaselineSource::Committed);
        assert_eq!(baseline.hash, Some(schema(0.5).content_hash()));
        assert_eq!(snapshot.commit().unwrap().message, "baseline");
    }

    #[test]
    fn uncommitted_objects_fall_back_to_ledger() {
        let temp = TempDir::new().unwrap();
        real_git_repo(temp.path());
        let mut ledger = Ledger::new();
        ledger.record(ObjectType::Schema, 200, "sha256:l".into(), None);

        let snapshot = BaselineSnapshot::capture(&NormalizedPath::new(temp.path()), &ledger).unwrap();
        assert!(snapshot.has_working_tree());
        let baseline = snapshot.baseline(ObjectRef::new(ObjectType::Schema, 200));
        assert_eq!(baseline.source, BaselineSource::LastPull);
        assert_eq!(baseline.hash.as_deref(), Some("sha256:l"));
    }
}
