//! Remote configuration service seam
//!
//! The engine talks to a tenant only through [`RemoteClient`]. Two
//! implementations ship with the crate: [`HttpRemote`] for the real REST
//! API and [`MemoryRemote`], an in-process tenant used by tests and dry
//! experiments.

mod error;
mod fetch;
mod http;
mod memory;
mod retry;

pub use error::{FailureKind, RemoteError};
pub use fetch::Fetcher;
pub use http::HttpRemote;
pub use memory::{CallCounts, InjectedFailure, MemoryRemote, Operation};
pub use retry::{RetryPolicy, fetch_with_retry, write_once};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::{Map, Value};

use crate::config::TenantContext;
use crate::model::{ConfigObject, ObjectType};

/// Per-type CRUD against one tenant.
///
/// `create` and `update` receive payloads without the volatile
/// service-owned fields and return the object as stored remotely.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// The tenant this client is bound to.
    fn tenant(&self) -> &TenantContext;

    /// Every object of a type.
    async fn list(&self, object_type: ObjectType) -> Result<Vec<ConfigObject>, RemoteError>;

    async fn get(&self, object_type: ObjectType, id: u64) -> Result<ConfigObject, RemoteError>;

    async fn create(
        &self,
        object_type: ObjectType,
        content: &Map<String, Value>,
    ) -> Result<ConfigObject, RemoteError>;

    /// Replace the writable fields of an existing object.
    async fn update(
        &self,
        object_type: ObjectType,
        id: u64,
        content: &Map<String, Value>,
    ) -> Result<ConfigObject, RemoteError>;
}
