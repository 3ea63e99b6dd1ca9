//! Shared fixtures for the integration tests
//!
//! The source tenant holds two workspaces. Workspace 111 owns two queues
//! and everything reachable from them; workspace 112 owns one queue with
//! its own schema and hook, which must never be pulled or copied with 111.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use cfgsync_core::model::ObjectType;
use cfgsync_core::remote::{MemoryRemote, RemoteClient};
use cfgsync_core::reference::parse_reference;
use cfgsync_core::{ConfigObject, LocalStore, RetryPolicy, SyncEngine, TenantContext};
use cfgsync_fs::NormalizedPath;
use serde_json::{Value, json};
use tempfile::TempDir;

pub const SOURCE_URL: &str = "https://source.example.com/api/v1";
pub const TARGET_URL: &str = "https://target.example.com/api/v1";

/// Objects reachable from workspace 111.
pub const WORKSPACE_111_SIZE: usize = 13;

pub fn source_tenant() -> MemoryRemote {
    let remote = MemoryRemote::new(TenantContext::new("source", SOURCE_URL).with_token("t"));
    seed(&remote);
    remote
}

pub fn empty_tenant(name: &str, base_url: &str, first_id: u64) -> MemoryRemote {
    MemoryRemote::new(TenantContext::new(name, base_url).with_token("t")).with_id_start(first_id)
}

fn link(plural: &str, id: u64) -> Value {
    Value::from(format!("{SOURCE_URL}/{plural}/{id}"))
}

fn seed(remote: &MemoryRemote) {
    use ObjectType::*;

    remote.insert(
        Workspace,
        json!({"id": 111, "name": "Invoices", "organization": format!("{SOURCE_URL}/organizations/1")}),
    );
    remote.insert(Workspace, json!({"id": 112, "name": "Receipts"}));

    remote.insert(
        Schema,
        json!({
            "id": 200,
            "name": "S200",
            "score_threshold": 0.8,
            "content": [{"category": "section", "id": "basic_info", "children": [{"id": "invoice_id", "type": "string"}]}]
        }),
    );
    remote.insert(Schema, json!({"id": 201, "name": "S201", "score_threshold": 0.5}));
    remote.insert(Schema, json!({"id": 202, "name": "S202", "score_threshold": 0.5}));
    remote.insert(Engine, json!({"id": 600, "name": "E600", "type": "extractor"}));

    remote.insert(
        Queue,
        json!({
            "id": 100,
            "name": "Q100",
            "workspace": link("workspaces", 111),
            "schema": link("schemas", 200),
            "engine": link("engines", 600),
            "hooks": [link("hooks", 300), link("hooks", 301)],
            "inbox": link("inboxes", 500),
            "settings": {"columns": ["status", "due_date"]}
        }),
    );
    remote.insert(
        Queue,
        json!({
            "id": 101,
            "name": "Q101",
            "workspace": link("workspaces", 111),
            "schema": link("schemas", 201),
            "hooks": [link("hooks", 301)],
            "connector": link("connectors", 400)
        }),
    );
    remote.insert(
        Queue,
        json!({
            "id": 102,
            "name": "Q102",
            "workspace": link("workspaces", 112),
            "schema": link("schemas", 202),
            "hooks": [link("hooks", 302)]
        }),
    );

    remote.insert(
        Hook,
        json!({
            "id": 300,
            "name": "H300",
            "queues": [link("queues", 100)],
            "events": ["annotation_content.initialize"],
            "token_owner": format!("{SOURCE_URL}/users/9")
        }),
    );
    remote.insert(
        Hook,
        json!({
            "id": 301,
            "name": "H301",
            "queues": [link("queues", 100), link("queues", 101)],
            "run_after": [link("hooks", 300)]
        }),
    );
    remote.insert(Hook, json!({"id": 302, "name": "H302", "queues": [link("queues", 102)]}));

    remote.insert(
        Connector,
        json!({"id": 400, "name": "C400", "queues": [link("queues", 101)], "service_url": "https://connector.example.com"}),
    );
    remote.insert(Inbox, json!({"id": 500, "name": "I500", "queues": [link("queues", 100)], "email": "in@example.com"}));
    remote.insert(EmailTemplate, json!({"id": 700, "name": "T700", "queue": link("queues", 100), "subject": "Rejected"}));
    remote.insert(
        Rule,
        json!({"id": 800, "name": "R800", "queues": [link("queues", 100)], "schema": link("schemas", 200), "enabled": true}),
    );
    remote.insert(EngineField, json!({"id": 900, "name": "invoice_id", "engine": link("engines", 600)}));
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
        multiplier: 2.0,
        call_timeout: Duration::from_secs(5),
    }
}

/// A workspace directory with a sync engine rooted in it.
pub struct Workspace {
    pub dir: TempDir,
    pub engine: SyncEngine,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let engine = SyncEngine::new(NormalizedPath::new(dir.path())).with_retry(fast_retry());
        Self { dir, engine }
    }

    pub fn root(&self) -> NormalizedPath {
        NormalizedPath::new(self.dir.path())
    }

    pub fn store(&self) -> &LocalStore {
        self.engine.store()
    }

    pub fn local(&self, object_type: ObjectType, id: u64) -> ConfigObject {
        self.store()
            .read(object_type, id)
            .unwrap()
            .unwrap_or_else(|| panic!("{object_type:?} {id} is not in the workspace"))
            .object
    }

    /// Edit the local copy of an object in place.
    pub fn edit(&self, object_type: ObjectType, id: u64, field: &str, value: Value) {
        let mut object = self.local(object_type, id);
        object.content.insert(field.to_string(), value);
        self.store().write(&object).unwrap();
    }

    /// Relative path to raw file content for every object file.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let root = self.root();
        self.store()
            .enumerate_all()
            .unwrap()
            .records
            .into_iter()
            .map(|r| {
                let relative = r.file_path.strip_prefix(&root).unwrap_or_default().to_string();
                let content = std::fs::read_to_string(r.file_path.to_native()).unwrap();
                (relative, content)
            })
            .collect()
    }
}

/// References into `remote` that do not resolve to one of its objects.
pub fn dangling_references(remote: &MemoryRemote) -> Vec<String> {
    let base_url = &remote.tenant().base_url;
    let mut dangling = Vec::new();
    for object in remote.all_objects() {
        for value in object.content.values() {
            collect_dangling(value, base_url, remote, &object, &mut dangling);
        }
    }
    dangling
}

fn collect_dangling(value: &Value, base_url: &str, remote: &MemoryRemote, owner: &ConfigObject, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(parsed) = parse_reference(s)
                && parsed.base_url == base_url
                && remote.object(parsed.target.object_type, parsed.target.id).is_none()
            {
                out.push(format!("{} -> {s}", owner.key()));
            }
        }
        Value::Array(items) => items
            .iter()
            .for_each(|v| collect_dangling(v, base_url, remote, owner, out)),
        Value::Object(map) => map
            .values()
            .for_each(|v| collect_dangling(v, base_url, remote, owner, out)),
        _ => {}
    }
}

/// Known-type references in `remote` that point at any other base URL.
pub fn foreign_references(remote: &MemoryRemote) -> Vec<String> {
    let base_url = &remote.tenant().base_url;
    remote
        .all_objects()
        .iter()
        .flat_map(|o| {
            o.content
                .iter()
                .filter(|(field, _)| field.as_str() != "url")
                .flat_map(|(_, v)| strings(v))
                .filter_map(|s| {
                    let base = parse_reference(&s)?.base_url.to_string();
                    Some((s, base))
                })
                .filter(|(_, base)| base != base_url)
                .map(|(s, _)| format!("{} -> {s}", o.key()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(strings).collect(),
        Value::Object(map) => map.values().flat_map(strings).collect(),
        _ => Vec::new(),
    }
}
