//! Retried, bounded-parallel reads

use futures::future::join_all;
use serde_json::{Map, Value};

use super::{RemoteClient, RemoteError, RetryPolicy, fetch_with_retry, write_once};
use crate::model::{ConfigObject, ObjectType};
use crate::{Error, Result};

/// Read helper bound to one client, retry policy, and concurrency limit.
pub struct Fetcher<'a> {
    remote: &'a dyn RemoteClient,
    retry: &'a RetryPolicy,
    concurrency: usize,
}

impl<'a> Fetcher<'a> {
    pub fn new(remote: &'a dyn RemoteClient, retry: &'a RetryPolicy, concurrency: usize) -> Self {
        Self {
            remote,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    pub fn remote(&self) -> &'a dyn RemoteClient {
        self.remote
    }

    pub async fn list(&self, object_type: ObjectType) -> std::result::Result<Vec<ConfigObject>, RemoteError> {
        let what = format!("list {}", object_type.plural());
        fetch_with_retry(self.retry, &what, || self.remote.list(object_type)).await
    }

    pub async fn get(&self, object_type: ObjectType, id: u64) -> std::result::Result<ConfigObject, RemoteError> {
        let what = format!("get {}/{}", object_type.plural(), id);
        fetch_with_retry(self.retry, &what, || self.remote.get(object_type, id)).await
    }

    /// Like [`get`](Self::get) but a missing object is `Ok(None)`.
    pub async fn get_optional(
        &self,
        object_type: ObjectType,
        id: u64,
    ) -> std::result::Result<Option<ConfigObject>, RemoteError> {
        match self.get(object_type, id).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch many objects of one type, `concurrency` at a time.
    ///
    /// Results keep the order of `ids`.
    pub async fn get_many(
        &self,
        object_type: ObjectType,
        ids: &[u64],
    ) -> Vec<(u64, std::result::Result<ConfigObject, RemoteError>)> {
        let mut results = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.concurrency) {
            let fetched = join_all(chunk.iter().map(|&id| self.get(object_type, id))).await;
            results.extend(chunk.iter().copied().zip(fetched));
        }
        results
    }

    pub async fn create(
        &self,
        object_type: ObjectType,
        content: &Map<String, Value>,
    ) -> std::result::Result<ConfigObject, RemoteError> {
        write_once(self.retry, self.remote.create(object_type, content)).await
    }

    pub async fn update(
        &self,
        object_type: ObjectType,
        id: u64,
        content: &Map<String, Value>,
    ) -> std::result::Result<ConfigObject, RemoteError> {
        write_once(self.retry, self.remote.update(object_type, id, content)).await
    }

    /// Turn a fatal remote error into the operation-level error.
    pub fn fatal(&self, error: &RemoteError) -> Error {
        let tenant = self.remote.tenant();
        Error::Unreachable {
            tenant: tenant.name.clone(),
            base_url: tenant.base_url.clone(),
            message: error.to_string(),
        }
    }

    /// `Err` for fatal errors, otherwise hands the error back for per-object reporting.
    pub fn check_fatal(&self, error: RemoteError) -> Result<RemoteError> {
        if error.is_fatal() {
            Err(self.fatal(&error))
        } else {
            Ok(error)
        }
    }
}
