//! Version-control collaborator for cfgsync
//!
//! When a workspace lives inside a git working tree, the last committed
//! version of each object file is the three-way baseline. This crate reads
//! those committed versions without touching the index or working tree.

pub mod commits;
pub mod committed;
pub mod error;

pub use commits::CommitInfo;
pub use committed::{CommittedFile, CommittedTree};
pub use error::{Error, Result};
