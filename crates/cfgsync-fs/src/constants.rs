//! Well-known paths inside a cfgsync workspace.

use std::path::Path;

/// Standard workspace markers and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspacePath {
    /// The `.cfgsync` directory (workspace marker and state root)
    StateDir,
    /// `.cfgsync/config.toml`
    Config,
    /// `.cfgsync/config.local.toml` (machine-local overrides)
    LocalConfig,
    /// `.cfgsync/ledger.toml` (last-synced baselines)
    Ledger,
    /// The `.git` directory
    GitDir,
}

impl WorkspacePath {
    /// Get the path relative to the workspace root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateDir => ".cfgsync",
            Self::Config => ".cfgsync/config.toml",
            Self::LocalConfig => ".cfgsync/config.local.toml",
            Self::Ledger => ".cfgsync/ledger.toml",
            Self::GitDir => ".git",
        }
    }
}

/// File name of the ID mapping side file for a tenant pair.
///
/// `{root}/.id_mapping_{source}_to_{target}.json`
pub fn id_mapping_file_name(source_tenant: &str, target_tenant: &str) -> String {
    format!(
        ".id_mapping_{}_to_{}.json",
        crate::sanitize_file_stem(source_tenant),
        crate::sanitize_file_stem(target_tenant)
    )
}

/// File name of the target ledger for a tenant pair, under the state dir.
///
/// `{root}/.cfgsync/target_{source}_to_{target}.json`
pub fn target_ledger_file_name(source_tenant: &str, target_tenant: &str) -> String {
    format!(
        "target_{}_to_{}.json",
        crate::sanitize_file_stem(source_tenant),
        crate::sanitize_file_stem(target_tenant)
    )
}

impl AsRef<Path> for WorkspacePath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for WorkspacePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
