//! Sync ledger
//!
//! The ledger records, per object, the content hash last seen in sync with
//! the tenant. It is the fallback three-way baseline when no committed
//! version exists, and carries the last pull time used when there is no
//! baseline at all.

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::model::ObjectType;

const LEDGER_VERSION: &str = "1.0";

/// Sync state of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub object_type: ObjectType,
    pub id: u64,
    /// Content hash at the last successful pull or push
    pub hash: String,
    /// Remote `modified_at` observed at that time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_modified_at: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
}

/// Persistent per-workspace sync ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// Ledger format version for forward compatibility
    version: String,
    /// Tenant the workspace was last pulled from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pull: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: Vec<LedgerEntry>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION.to_string(),
            tenant: None,
            last_pull: None,
            entries: Vec::new(),
        }
    }

    /// Load a ledger from a TOML file with shared lock
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, locked, or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        file.lock_shared()?;

        // Read through the locked handle
        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        let ledger: Ledger = toml::from_str(&content)?;

        Ok(ledger)
    }

    /// Load the ledger, or an empty one if the file does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save the ledger to a TOML file atomically with exclusive lock
    ///
    /// Entries are written sorted by type and id so identical state always
    /// produces an identical file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut sorted = self.clone();
        sorted
            .entries
            .sort_by(|a, b| (a.object_type, a.id).cmp(&(b.object_type, b.id)));
        let content = toml::to_string_pretty(&sorted)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock_file.lock_exclusive()?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entry(&self, object_type: ObjectType, id: u64) -> Option<&LedgerEntry> {
        self.entries
            .iter()
            .find(|e| e.object_type == object_type && e.id == id)
    }

    /// Record `hash` as the synced state of an object, replacing any
    /// previous entry.
    pub fn record(
        &mut self,
        object_type: ObjectType,
        id: u64,
        hash: String,
        remote_modified_at: Option<DateTime<Utc>>,
    ) {
        let entry = LedgerEntry {
            object_type,
            id,
            hash,
            remote_modified_at,
            synced_at: Utc::now(),
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.object_type == object_type && e.id == id)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Forget an object. Returns the removed entry if there was one.
    pub fn remove(&mut self, object_type: ObjectType, id: u64) -> Option<LedgerEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.object_type == object_type && e.id == id)?;
        Some(self.entries.remove(pos))
    }
}
