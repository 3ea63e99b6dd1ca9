//! In-process tenant
//!
//! Behaves like the configuration service closely enough to drive every
//! operation end to end: it assigns ids, stamps `url` and `modified_at`,
//! rejects references to its own objects that do not exist, and counts
//! calls. Failures can be injected per operation and object.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{RemoteClient, RemoteError};
use crate::config::TenantContext;
use crate::model::{ConfigObject, ObjectRef, ObjectType, writable_content};
use crate::reference::parse_reference;

/// Remote operation kinds, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
}

/// Number of calls served per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub create: usize,
    pub update: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list + self.get + self.create + self.update
    }

    pub fn writes(&self) -> usize {
        self.create + self.update
    }
}

/// A failure returned instead of serving matching calls.
#[derive(Debug, Clone)]
pub struct InjectedFailure {
    pub operation: Operation,
    pub object_type: ObjectType,
    /// `None` matches any id (and creates, which have none yet)
    pub id: Option<u64>,
    /// Only creates whose payload `name` equals this match
    pub name: Option<String>,
    pub error: RemoteError,
    /// How many matching calls fail before the failure is used up
    pub times: usize,
}

impl InjectedFailure {
    pub fn new(operation: Operation, object_type: ObjectType, error: RemoteError) -> Self {
        Self {
            operation,
            object_type,
            id: None,
            name: None,
            error,
            times: usize::MAX,
        }
    }

    pub fn for_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn for_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn times(mut self, times: usize) -> Self {
        self.times = times;
        self
    }

    fn matches(&self, operation: Operation, object_type: ObjectType, id: Option<u64>, name: Option<&str>) -> bool {
        self.times > 0
            && self.operation == operation
            && self.object_type == object_type
            && (self.id.is_none() || self.id == id)
            && (self.name.is_none() || self.name.as_deref() == name)
    }
}

#[derive(Debug)]
struct State {
    objects: BTreeMap<ObjectRef, ConfigObject>,
    next_id: u64,
    clock: DateTime<Utc>,
    calls: CallCounts,
    failures: Vec<InjectedFailure>,
}

/// An in-memory tenant.
#[derive(Debug)]
pub struct MemoryRemote {
    tenant: TenantContext,
    state: Mutex<State>,
}

impl MemoryRemote {
    /// Empty tenant assigning ids from 1.
    pub fn new(tenant: TenantContext) -> Self {
        Self {
            tenant,
            state: Mutex::new(State {
                objects: BTreeMap::new(),
                next_id: 1,
                clock: Utc::now(),
                calls: CallCounts::default(),
                failures: Vec::new(),
            }),
        }
    }

    /// Start assigning ids at `first_id`, keeping tenants visibly distinct.
    pub fn with_id_start(self, first_id: u64) -> Self {
        self.lock().next_id = first_id;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object as if it already existed. Not counted as a call.
    ///
    /// `content` must carry an `id`; `url` and `modified_at` are stamped.
    pub fn insert(&self, object_type: ObjectType, content: Value) -> ConfigObject {
        let Value::Object(mut content) = content else {
            panic!("MemoryRemote::insert expects a JSON object");
        };
        let id = content
            .get("id")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| panic!("MemoryRemote::insert expects a numeric id"));

        let mut state = self.lock();
        let now = state.tick();
        state.next_id = state.next_id.max(id + 1);
        self.stamp(&mut content, object_type, id, now);
        let object = ConfigObject::from_content(object_type, content)
            .unwrap_or_else(|e| panic!("MemoryRemote::insert: {e}"));
        state.objects.insert(object.key(), object.clone());
        object
    }

    /// Change an object out of band, as another user of the tenant would.
    pub fn edit(&self, object_type: ObjectType, id: u64, change: impl FnOnce(&mut Map<String, Value>)) {
        let mut state = self.lock();
        let now = state.tick();
        let key = ObjectRef::new(object_type, id);
        let Some(object) = state.objects.get(&key).cloned() else {
            panic!("MemoryRemote::edit: {key} does not exist");
        };
        let mut content = object.content;
        change(&mut content);
        self.stamp(&mut content, object_type, id, now);
        if let Ok(updated) = ConfigObject::from_content(object_type, content) {
            state.objects.insert(key, updated);
        }
    }

    /// Delete an object out of band.
    pub fn delete(&self, object_type: ObjectType, id: u64) -> bool {
        self.lock()
            .objects
            .remove(&ObjectRef::new(object_type, id))
            .is_some()
    }

    pub fn object(&self, object_type: ObjectType, id: u64) -> Option<ConfigObject> {
        self.lock()
            .objects
            .get(&ObjectRef::new(object_type, id))
            .cloned()
    }

    pub fn objects(&self, object_type: ObjectType) -> Vec<ConfigObject> {
        self.lock()
            .objects
            .values()
            .filter(|o| o.object_type == object_type)
            .cloned()
            .collect()
    }

    pub fn all_objects(&self) -> Vec<ConfigObject> {
        self.lock().objects.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn reset_calls(&self) {
        self.lock().calls = CallCounts::default();
    }

    pub fn inject(&self, failure: InjectedFailure) {
        self.lock().failures.push(failure);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    fn stamp(&self, content: &mut Map<String, Value>, object_type: ObjectType, id: u64, now: DateTime<Utc>) {
        content.insert("id".into(), Value::from(id));
        content.insert(
            "url".into(),
            Value::from(self.tenant.object_url(ObjectRef::new(object_type, id))),
        );
        content.insert("modified_at".into(), Value::from(now.to_rfc3339()));
    }

    /// Every reference to this tenant must point at an existing object.
    fn validate(&self, state: &State, content: &Map<String, Value>) -> Result<(), RemoteError> {
        for (field, value) in content {
            if let Some(missing) = dangling(value, &self.tenant.base_url, state) {
                return Err(RemoteError::Validation {
                    field: field.clone(),
                    message: format!("Invalid hyperlink - object {missing} does not exist"),
                });
            }
        }
        Ok(())
    }
}

impl State {
    /// Strictly increasing timestamps, even for calls within one tick.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now().max(self.clock + Duration::milliseconds(1));
        self.clock = now;
        now
    }

    fn take_failure(
        &mut self,
        operation: Operation,
        object_type: ObjectType,
        id: Option<u64>,
        name: Option<&str>,
    ) -> Option<RemoteError> {
        let failure = self
            .failures
            .iter_mut()
            .find(|f| f.matches(operation, object_type, id, name))?;
        failure.times -= 1;
        Some(failure.error.clone())
    }
}

fn dangling(value: &Value, base_url: &str, state: &State) -> Option<ObjectRef> {
    match value {
        Value::String(s) => parse_reference(s)
            .filter(|p| p.base_url == base_url && !state.objects.contains_key(&p.target))
            .map(|p| p.target),
        Value::Array(items) => items.iter().find_map(|v| dangling(v, base_url, state)),
        Value::Object(map) => map.values().find_map(|v| dangling(v, base_url, state)),
        _ => None,
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    async fn list(&self, object_type: ObjectType) -> Result<Vec<ConfigObject>, RemoteError> {
        let mut state = self.lock();
        state.calls.list += 1;
        if let Some(error) = state.take_failure(Operation::List, object_type, None, None) {
            return Err(error);
        }
        Ok(state
            .objects
            .values()
            .filter(|o| o.object_type == object_type)
            .cloned()
            .collect())
    }

    async fn get(&self, object_type: ObjectType, id: u64) -> Result<ConfigObject, RemoteError> {
        let mut state = self.lock();
        state.calls.get += 1;
        if let Some(error) = state.take_failure(Operation::Get, object_type, Some(id), None) {
            return Err(error);
        }
        state
            .objects
            .get(&ObjectRef::new(object_type, id))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                resource: format!("{}/{}", object_type.plural(), id),
            })
    }

    async fn create(
        &self,
        object_type: ObjectType,
        content: &Map<String, Value>,
    ) -> Result<ConfigObject, RemoteError> {
        let mut state = self.lock();
        state.calls.create += 1;
        let name = content.get("name").and_then(Value::as_str);
        if let Some(error) = state.take_failure(Operation::Create, object_type, None, name) {
            return Err(error);
        }

        let mut content = writable_content(content);
        self.validate(&state, &content)?;

        let id = state.next_id;
        state.next_id += 1;
        let now = state.tick();
        self.stamp(&mut content, object_type, id, now);
        let object = ConfigObject::from_content(object_type, content).map_err(|e| {
            RemoteError::Decode {
                message: e.to_string(),
            }
        })?;
        state.objects.insert(object.key(), object.clone());
        Ok(object)
    }

    async fn update(
        &self,
        object_type: ObjectType,
        id: u64,
        content: &Map<String, Value>,
    ) -> Result<ConfigObject, RemoteError> {
        let mut state = self.lock();
        state.calls.update += 1;
        if let Some(error) = state.take_failure(Operation::Update, object_type, Some(id), None) {
            return Err(error);
        }

        let key = ObjectRef::new(object_type, id);
        if !state.objects.contains_key(&key) {
            return Err(RemoteError::NotFound {
                resource: format!("{}/{}", object_type.plural(), id),
            });
        }

        let mut content = writable_content(content);
        self.validate(&state, &content)?;

        let now = state.tick();
        self.stamp(&mut content, object_type, id, now);
        let object = ConfigObject::from_content(object_type, content).map_err(|e| {
            RemoteError::Decode {
                message: e.to_string(),
            }
        })?;
        state.objects.insert(key, object.clone());
        Ok(object)
    }
}
