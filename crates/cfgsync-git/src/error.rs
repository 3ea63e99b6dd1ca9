//! Error types for cfgsync-git

use std::path::PathBuf;

/// Result type for cfgsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cfgsync-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] cfgsync_fs::Error),

    #[error("Workspace {path} is not inside the repository working tree")]
    OutsideWorkTree { path: PathBuf },
}
