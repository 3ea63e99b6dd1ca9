//! Three-way change classification

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Change state of one object across baseline, local, and remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeState {
    Unchanged,
    LocalModified,
    RemoteModified,
    Conflict,
    LocalOnly,
    RemoteOnly,
}

impl ChangeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::LocalModified => "local_modified",
            Self::RemoteModified => "remote_modified",
            Self::Conflict => "conflict",
            Self::LocalOnly => "local_only",
            Self::RemoteOnly => "remote_only",
        }
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashes and timestamps the classification is computed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyInput<'a> {
    pub baseline: Option<&'a str>,
    pub local: Option<&'a str>,
    pub remote: Option<&'a str>,
    /// Remote `modified_at`, used only without a baseline
    pub remote_modified_at: Option<DateTime<Utc>>,
    /// Reference time, used only without a baseline
    pub last_pull: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub state: ChangeState,
    /// Explains states that were not read directly off the hashes
    pub note: Option<String>,
}

impl Classification {
    fn plain(state: ChangeState) -> Self {
        Self { state, note: None }
    }

    fn noted(state: ChangeState, note: impl Into<String>) -> Self {
        Self {
            state,
            note: Some(note.into()),
        }
    }
}

/// Classify one object.
///
/// Equal local and remote hashes are `unchanged` whatever the baseline says,
/// which also covers edits that converged on both sides. Without a
/// baseline, diverging copies are `local_modified` unless the remote was
/// modified strictly after the last pull.
pub fn classify(input: &ClassifyInput<'_>) -> Classification {
    use ChangeState::*;

    match (input.baseline, input.local, input.remote) {
        (_, None, None) => Classification::plain(Unchanged),
        (_, Some(local), Some(remote)) if local == remote => Classification::plain(Unchanged),

        (Some(base), Some(local), Some(remote)) => {
            if local == base {
                Classification::plain(RemoteModified)
            } else if remote == base {
                Classification::plain(LocalModified)
            } else {
                Classification::plain(Conflict)
            }
        }

        (Some(base), Some(local), None) => {
            if local == base {
                Classification::noted(RemoteModified, "deleted remotely")
            } else {
                Classification::noted(Conflict, "edited locally but deleted remotely")
            }
        }
        (Some(base), None, Some(remote)) => {
            if remote == base {
                Classification::noted(LocalModified, "deleted locally; deletions are never pushed")
            } else {
                Classification::noted(Conflict, "deleted locally but edited remotely")
            }
        }

        (None, Some(_), Some(_)) => infer_without_baseline(input),
        (None, Some(_), None) => Classification::plain(LocalOnly),
        (None, None, Some(_)) => Classification::plain(RemoteOnly),
    }
}

fn infer_without_baseline(input: &ClassifyInput<'_>) -> Classification {
    match (input.remote_modified_at, input.last_pull) {
        (Some(modified), Some(pulled)) if modified > pulled => Classification::noted(
            ChangeState::RemoteModified,
            format!("no baseline; remote modified at {modified} after last pull at {pulled}"),
        ),
        (_, Some(pulled)) => Classification::noted(
            ChangeState::LocalModified,
            format!("no baseline; remote not modified since last pull at {pulled}"),
        ),
        (_, None) => Classification::noted(
            ChangeState::LocalModified,
            "no baseline and no recorded pull; assuming local edit",
        ),
    }
}
