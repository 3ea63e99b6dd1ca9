//! Filesystem primitives for cfgsync
//!
//! Provides normalized path handling, deterministic file naming, atomic
//! locked writes, content checksums, and a small format-agnostic document
//! store used for configuration, ledgers, and ID mapping files.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;

pub use config::ConfigStore;
pub use constants::WorkspacePath;
pub use error::{Error, Result};
pub use path::{NormalizedPath, sanitize_file_stem};
