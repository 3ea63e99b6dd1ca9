//! Commit metadata for the baseline commit.

use chrono::{DateTime, TimeZone, Utc};
use git2::Commit;

/// Information about a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Short commit hash (7 characters)
    pub hash: String,

    /// First line of the commit message
    pub message: String,

    /// Commit author name
    pub author: String,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// Extract display metadata from a commit.
    pub fn from_commit(commit: &Commit<'_>) -> Self {
        let timestamp: DateTime<Utc> = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_default();

        let message = commit
            .message()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .to_string();

        let author = commit.author();
        let author_name = author.name().unwrap_or("Unknown").to_string();

        Self {
            hash: format!("{:.7}", commit.id()),
            message,
            author: author_name,
            timestamp,
        }
    }
}
