//! Pull and push reports

use serde::Serialize;

use crate::diff::{ChangeState, DiffRecord};
use crate::model::ObjectRef;
use crate::report::{CreatedItem, ItemFailure, ItemRef, SkippedItem};

/// Outcome of a pull.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PullReport {
    /// Objects written to the local store
    pub written: Vec<ItemRef>,
    /// Objects whose local copy already matched
    pub unchanged: Vec<ItemRef>,
    /// Objects left alone because of unpushed local edits
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<ItemFailure>,
    pub cancelled: bool,
}

impl PullReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty() && !self.cancelled
    }
}

/// Overall result of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    /// Writes were issued
    Completed,
    /// Planned only
    DryRun,
    /// Conflicts without `force`; nothing was written
    Rejected,
    /// No local object differs from its synced state
    NothingToPush,
}

/// Remote write a push will issue for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushAction {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPush {
    pub key: ObjectRef,
    pub name: String,
    pub action: PushAction,
    pub state: ChangeState,
}

/// Outcome of a push.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub status: PushStatus,
    pub planned: Vec<PlannedPush>,
    pub created: Vec<CreatedItem>,
    pub updated: Vec<ItemRef>,
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<ItemFailure>,
    /// Objects changed on both sides
    pub conflicts: Vec<DiffRecord>,
    pub cancelled: bool,
}

impl PushReport {
    pub(crate) fn new(status: PushStatus) -> Self {
        Self {
            status,
            planned: Vec::new(),
            created: Vec::new(),
            updated: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            conflicts: Vec::new(),
            cancelled: false,
        }
    }

    /// Number of remote writes issued.
    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}
