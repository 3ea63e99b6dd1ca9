//! Configuration object model
//!
//! Every remote object is carried as a tagged envelope: a stable
//! [`ObjectType`], the tenant-scoped numeric id, a display name, and the open
//! field map returned by the service. Nothing is modeled per type beyond the
//! tag, so reference handling and hashing work uniformly across types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Top-level fields owned by the remote service.
///
/// They are excluded from content hashes and stripped before an object is
/// written to another tenant.
pub const VOLATILE_FIELDS: &[&str] = &["id", "url", "modified_at", "modified_by", "created_at"];

/// Kind of configuration object.
///
/// Variant order is the declaration order used wherever types are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Workspace,
    Queue,
    Schema,
    Hook,
    Connector,
    Inbox,
    EmailTemplate,
    Rule,
    Engine,
    EngineField,
}

impl ObjectType {
    /// Every type, in declaration order.
    pub const ALL: [ObjectType; 10] = [
        ObjectType::Workspace,
        ObjectType::Queue,
        ObjectType::Schema,
        ObjectType::Hook,
        ObjectType::Connector,
        ObjectType::Inbox,
        ObjectType::EmailTemplate,
        ObjectType::Rule,
        ObjectType::Engine,
        ObjectType::EngineField,
    ];

    /// Stable snake_case tag used in ledgers and mapping files.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Queue => "queue",
            Self::Schema => "schema",
            Self::Hook => "hook",
            Self::Connector => "connector",
            Self::Inbox => "inbox",
            Self::EmailTemplate => "email_template",
            Self::Rule => "rule",
            Self::Engine => "engine",
            Self::EngineField => "engine_field",
        }
    }

    /// URL path segment and local directory name.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Workspace => "workspaces",
            Self::Queue => "queues",
            Self::Schema => "schemas",
            Self::Hook => "hooks",
            Self::Connector => "connectors",
            Self::Inbox => "inboxes",
            Self::EmailTemplate => "email_templates",
            Self::Rule => "rules",
            Self::Engine => "engines",
            Self::EngineField => "engine_fields",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn from_plural(plural: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.plural() == plural)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    /// Accepts either the tag (`email_template`) or the plural (`email_templates`).
    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s)
            .or_else(|| Self::from_plural(s))
            .ok_or_else(|| Error::UnknownObjectType(s.to_string()))
    }
}

/// Identity of an object within one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub id: u64,
}

impl ObjectRef {
    pub fn new(object_type: ObjectType, id: u64) -> Self {
        Self { object_type, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_type, self.id)
    }
}

/// A configuration object as fetched from, or staged for, a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigObject {
    pub object_type: ObjectType,
    pub id: u64,
    pub name: String,
    /// Full payload, including the volatile service-owned fields
    pub content: Map<String, Value>,
}

impl ConfigObject {
    /// Build an object from a raw payload.
    ///
    /// `id` is required; `name` defaults to empty.
    pub fn from_content(object_type: ObjectType, content: Map<String, Value>) -> Result<Self> {
        let id = content
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidObject {
                object_type,
                message: "missing numeric 'id' field".into(),
            })?;
        let name = content
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            object_type,
            id,
            name,
            content,
        })
    }

    pub fn key(&self) -> ObjectRef {
        ObjectRef::new(self.object_type, self.id)
    }

    /// `sha256:` digest of the canonical non-volatile content.
    ///
    /// Field order never affects the result.
    pub fn content_hash(&self) -> String {
        content_hash(&self.content)
    }

    /// Payload without the service-owned fields, ready for create/update.
    pub fn writable_content(&self) -> Map<String, Value> {
        writable_content(&self.content)
    }

    /// Remote last-modified timestamp, when present and parseable.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.content
            .get("modified_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Every reference to another known object in the payload.
    pub fn references(&self) -> Vec<ObjectRef> {
        crate::reference::references(&self.content)
    }

    /// Pretty, key-sorted JSON with a trailing newline.
    ///
    /// Identical content always serializes to identical bytes.
    pub fn to_canonical_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(&canonical_value(&Value::Object(
            self.content.clone(),
        )))?;
        json.push('\n');
        Ok(json)
    }
}

/// `sha256:` digest of the canonical non-volatile fields of `content`.
pub fn content_hash(content: &Map<String, Value>) -> String {
    let stable = Value::Object(writable_content(content));
    cfgsync_fs::checksum::content_hash(&canonical_value(&stable).to_string())
}

/// `content` with the [`VOLATILE_FIELDS`] removed.
pub fn writable_content(content: &Map<String, Value>) -> Map<String, Value> {
    content
        .iter()
        .filter(|(key, _)| !is_volatile(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

pub fn is_volatile(field: &str) -> bool {
    VOLATILE_FIELDS.contains(&field)
}

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical_value(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> ConfigObject {
        let Value::Object(map) = value else {
            panic!("fixture must be an object")
        };
        ConfigObject::from_content(ObjectType::Queue, map).unwrap()
    }

    #[test]
    fn tags_and_plurals_round_trip() {
        for t in ObjectType::ALL {
            assert_eq!(ObjectType::from_tag(t.tag()), Some(t));
            assert_eq!(ObjectType::from_plural(t.plural()), Some(t));
            assert_eq!(t.tag().parse::<ObjectType>().unwrap(), t);
        }
        assert_eq!(ObjectType::EmailTemplate.plural(), "email_templates");
        assert_eq!(ObjectType::Inbox.plural(), "inboxes");
        assert!("users".parse::<ObjectType>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_tag() {
        let json = serde_json::to_string(&ObjectType::EngineField).unwrap();
        assert_eq!(json, "\"engine_field\"");
    }

    #[test]
    fn from_content_requires_id() {
        let mut map = Map::new();
        map.insert("name".into(), json!("no id"));
        let err = ConfigObject::from_content(ObjectType::Hook, map).unwrap_err();
        assert!(matches!(err, Error::InvalidObject { .. }));
    }

    #[test]
    fn hash_ignores_field_order_and_volatile_fields() {
        let a = object(json!({"id": 1, "name": "Q", "settings": {"a": 1, "b": [1, 2]}}));
        let b = object(json!({
            "settings": {"b": [1, 2], "a": 1},
            "name": "Q",
            "id": 1,
            "url": "https://x/api/v1/queues/1",
            "modified_at": "2026-01-01T00:00:00Z"
        }));
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(a.content_hash().starts_with("sha256:"));
    }

    #[test]
    fn hash_changes_with_content() {
        let a = object(json!({"id": 1, "name": "Q", "threshold": 0.8}));
        let b = object(json!({"id": 1, "name": "Q", "threshold": 0.9}));
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn canonical_json_is_stable() {
        let a = object(json!({"name": "Q", "id": 7, "z": {"y": 1, "x": 2}}));
        let first = a.to_canonical_json().unwrap();
        let second = a.clone().to_canonical_json().unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("}\n"));
        assert!(first.find("\"id\"").unwrap() < first.find("\"name\"").unwrap());
    }

    #[test]
    fn modified_at_parses_rfc3339() {
        let a = object(json!({"id": 1, "modified_at": "2026-03-01T10:00:00+02:00"}));
        assert_eq!(
            a.modified_at().unwrap().to_rfc3339(),
            "2026-03-01T08:00:00+00:00"
        );
        let b = object(json!({"id": 1, "modified_at": "yesterday"}));
        assert_eq!(b.modified_at(), None);
    }
}
