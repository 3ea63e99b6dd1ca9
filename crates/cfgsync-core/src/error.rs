//! Error types for cfgsync-core

use std::path::PathBuf;

use crate::model::ObjectType;
use crate::remote::RemoteError;

/// Result type for cfgsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration-level failures.
///
/// Per-object problems encountered during bulk operations are collected in
/// the operation reports instead of being returned as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parsed but is semantically invalid
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A tenant name that is not declared in the configuration
    #[error("Unknown tenant '{name}'")]
    UnknownTenant { name: String },

    /// No token could be resolved for a tenant that must be contacted
    #[error("Missing credentials for tenant '{tenant}' (set {hint})")]
    MissingCredentials { tenant: String, hint: String },

    /// The tenant's base URL cannot be reached at all
    #[error("Tenant '{tenant}' is unreachable at {base_url}: {message}")]
    Unreachable {
        tenant: String,
        base_url: String,
        message: String,
    },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An ID mapping entry would be overwritten with a different target
    #[error(
        "Mapping conflict for {object_type} {source_id}: already mapped to {existing}, refusing {attempted}"
    )]
    MappingConflict {
        object_type: ObjectType,
        source_id: u64,
        existing: u64,
        attempted: u64,
    },

    /// The object type dependency graph contains a cycle
    #[error("Dependency cycle among object types: {types}")]
    DependencyCycle { types: String },

    /// A local record could not be parsed
    #[error("Corrupt local record {path}: {message}")]
    CorruptRecord { path: PathBuf, message: String },

    /// A remote payload is not a valid configuration object
    #[error("Invalid {object_type} object: {message}")]
    InvalidObject {
        object_type: ObjectType,
        message: String,
    },

    /// Unknown type tag or plural
    #[error("Unknown object type '{0}'")]
    UnknownObjectType(String),

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from cfgsync-fs
    #[error(transparent)]
    Fs(#[from] cfgsync_fs::Error),

    /// Git error from cfgsync-git
    #[error(transparent)]
    Git(#[from] cfgsync_git::Error),

    /// Remote error that escaped per-object handling
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
