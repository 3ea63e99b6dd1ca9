//! Itemized outcome records shared by every operation report

use serde::Serialize;

use crate::model::{ConfigObject, ObjectRef, ObjectType};
use crate::remote::{FailureKind, RemoteError};
use crate::store::CorruptFile;

/// An object that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub object_type: ObjectType,
    /// `None` when a whole listing failed
    pub id: Option<u64>,
    pub name: String,
    pub kind: FailureKind,
    /// Offending field for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ItemFailure {
    pub fn remote(object_type: ObjectType, id: Option<u64>, name: &str, error: &RemoteError) -> Self {
        Self {
            object_type,
            id,
            name: name.to_string(),
            kind: error.kind(),
            field: error.field().map(str::to_string),
            message: error.to_string(),
        }
    }

    pub fn for_object(object: &ConfigObject, error: &RemoteError) -> Self {
        Self::remote(object.object_type, Some(object.id), &object.name, error)
    }

    pub fn local(object_type: ObjectType, id: Option<u64>, name: &str, error: &crate::Error) -> Self {
        let kind = match error {
            crate::Error::CorruptRecord { .. } => FailureKind::CorruptLocal,
            _ => FailureKind::Local,
        };
        Self {
            object_type,
            id,
            name: name.to_string(),
            kind,
            field: None,
            message: error.to_string(),
        }
    }
}

impl From<&CorruptFile> for ItemFailure {
    fn from(file: &CorruptFile) -> Self {
        Self {
            object_type: file.object_type,
            id: None,
            name: file.path.clone(),
            kind: FailureKind::CorruptLocal,
            field: None,
            message: file.message.clone(),
        }
    }
}

/// An object an operation wrote or found in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub key: ObjectRef,
    pub name: String,
}

impl ItemRef {
    pub fn of(object: &ConfigObject) -> Self {
        Self {
            key: object.key(),
            name: object.name.clone(),
        }
    }
}

/// An object deliberately left alone, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub key: ObjectRef,
    pub name: String,
    pub reason: String,
}

impl SkippedItem {
    pub fn new(key: ObjectRef, name: &str, reason: impl Into<String>) -> Self {
        Self {
            key,
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// An object created in a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedItem {
    pub object_type: ObjectType,
    /// Id the object had before creation (source tenant or local staging id)
    pub source_id: u64,
    pub target_id: u64,
    pub name: String,
}
