//! Diff engine
//!
//! Classifies every object present locally, remotely, or in the baseline
//! ([`classify`]) and produces field-level diffs of two payloads
//! ([`StructuralDiff`]).

mod classify;
mod structural;

pub use classify::{ChangeState, Classification, ClassifyInput, classify};
pub use structural::{FieldChange, StructuralDiff};

use std::collections::BTreeMap;

use serde::Serialize;

use crate::baseline::{Baseline, BaselineSource};
use crate::model::{ConfigObject, ObjectRef};
use crate::report::ItemFailure;
use crate::store::CorruptFile;

/// Classification of one object with the hashes it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    pub key: ObjectRef,
    pub name: String,
    pub baseline_hash: Option<String>,
    pub local_hash: Option<String>,
    pub remote_hash: Option<String>,
    pub state: ChangeState,
    pub baseline_source: BaselineSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DiffRecord {
    /// Classify `key` from its local and remote versions.
    pub fn compute(
        key: ObjectRef,
        local: Option<&ConfigObject>,
        remote: Option<&ConfigObject>,
        baseline: &Baseline,
        last_pull: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        let local_hash = local.map(ConfigObject::content_hash);
        let remote_hash = remote.map(ConfigObject::content_hash);
        let classification = classify(&ClassifyInput {
            baseline: baseline.hash.as_deref(),
            local: local_hash.as_deref(),
            remote: remote_hash.as_deref(),
            remote_modified_at: remote.and_then(ConfigObject::modified_at),
            last_pull,
        });
        let name = local
            .or(remote)
            .map(|o| o.name.clone())
            .unwrap_or_default();

        Self {
            key,
            name,
            baseline_hash: baseline.hash.clone(),
            local_hash,
            remote_hash,
            state: classification.state,
            baseline_source: baseline.source,
            note: classification.note,
        }
    }
}

/// Count of records per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub local_modified: usize,
    pub remote_modified: usize,
    pub conflict: usize,
    pub local_only: usize,
    pub remote_only: usize,
}

/// Full three-way diff of a workspace against its tenant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub records: Vec<DiffRecord>,
    /// Local files that could not be read
    pub corrupt: Vec<CorruptFile>,
    /// Remote reads that failed
    pub failed: Vec<ItemFailure>,
}

impl DiffReport {
    pub fn record(&self, key: ObjectRef) -> Option<&DiffRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    pub fn with_state(&self, state: ChangeState) -> impl Iterator<Item = &DiffRecord> {
        self.records.iter().filter(move |r| r.state == state)
    }

    pub fn conflicts(&self) -> Vec<&DiffRecord> {
        self.with_state(ChangeState::Conflict).collect()
    }

    /// Whether anything differs or could not be checked.
    pub fn has_changes(&self) -> bool {
        self.records.iter().any(|r| r.state != ChangeState::Unchanged)
            || !self.corrupt.is_empty()
            || !self.failed.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        let counts: BTreeMap<ChangeState, usize> =
            self.records.iter().fold(BTreeMap::new(), |mut acc, r| {
                *acc.entry(r.state).or_default() += 1;
                acc
            });
        let count = |state| counts.get(&state).copied().unwrap_or(0);
        DiffSummary {
            unchanged: count(ChangeState::Unchanged),
            local_modified: count(ChangeState::LocalModified),
            remote_modified: count(ChangeState::RemoteModified),
            conflict: count(ChangeState::Conflict),
            local_only: count(ChangeState::LocalOnly),
            remote_only: count(ChangeState::RemoteOnly),
        }
    }
}
