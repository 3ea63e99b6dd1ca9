//! Synchronization between a workspace and its tenant
//!
//! - [`SyncEngine::pull`] mirrors a scope into the local store
//! - [`SyncEngine::diff`] reports three-way change states
//! - [`SyncEngine::push`] sends local edits back

mod engine;
mod report;
mod scope;

pub use engine::{PullOptions, PushOptions, SyncEngine};
pub use report::{PlannedPush, PullReport, PushAction, PushReport, PushStatus};
pub use scope::{Batch, PullScope, Relation, ScopeWalk, WORKSPACE_RELATIONS};
