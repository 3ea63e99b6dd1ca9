//! Which remote objects belong to a pull
//!
//! A workspace scope walks a relation table instead of hard-coded fetch
//! logic: each type is either the root, fetched by following references
//! from already-collected objects, or listed and filtered to those that
//! reference a collected object.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{ConfigObject, ObjectRef, ObjectType};
use crate::remote::{Fetcher, RemoteError};
use crate::report::ItemFailure;
use crate::Result;

/// Portion of a tenant an operation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "id")]
pub enum PullScope {
    /// Every object of every type
    Tenant,
    /// One workspace and everything hanging off it
    Workspace(u64),
}

/// How objects of one type enter a workspace scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The workspace itself
    Root,
    /// Fetched by id where collected objects of these types reference them
    ReferencedBy(&'static [ObjectType]),
    /// Listed, keeping objects that reference a collected object of these types
    Referencing(&'static [ObjectType]),
}

/// The workspace subgraph, in fetch order.
pub const WORKSPACE_RELATIONS: &[(ObjectType, Relation)] = &[
    (ObjectType::Workspace, Relation::Root),
    (ObjectType::Queue, Relation::Referencing(&[ObjectType::Workspace])),
    (ObjectType::Schema, Relation::ReferencedBy(&[ObjectType::Queue])),
    (ObjectType::Hook, Relation::ReferencedBy(&[ObjectType::Queue])),
    (ObjectType::Connector, Relation::ReferencedBy(&[ObjectType::Queue])),
    (ObjectType::Inbox, Relation::ReferencedBy(&[ObjectType::Queue])),
    (ObjectType::Engine, Relation::ReferencedBy(&[ObjectType::Queue])),
    (ObjectType::EmailTemplate, Relation::Referencing(&[ObjectType::Queue])),
    (ObjectType::Rule, Relation::Referencing(&[ObjectType::Queue, ObjectType::Schema])),
    (ObjectType::EngineField, Relation::Referencing(&[ObjectType::Engine])),
];

/// Objects of one type fetched in one step of the walk.
#[derive(Debug)]
pub struct Batch {
    pub object_type: ObjectType,
    pub objects: Vec<ConfigObject>,
    pub failed: Vec<ItemFailure>,
}

impl Batch {
    fn empty(object_type: ObjectType) -> Self {
        Self {
            object_type,
            objects: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Step-by-step walk of a scope, one type per step.
///
/// Callers process each batch before asking for the next, so a failure in
/// a later step leaves earlier work in place.
pub struct ScopeWalk {
    scope: PullScope,
    step: usize,
    collected: BTreeSet<ObjectRef>,
    /// Outgoing references of every collected object
    referenced: BTreeSet<ObjectRef>,
}

impl ScopeWalk {
    pub fn new(scope: PullScope) -> Self {
        Self {
            scope,
            step: 0,
            collected: BTreeSet::new(),
            referenced: BTreeSet::new(),
        }
    }

    /// Types visited, in order.
    pub fn types(&self) -> Vec<ObjectType> {
        match self.scope {
            PullScope::Tenant => ObjectType::ALL.to_vec(),
            PullScope::Workspace(_) => WORKSPACE_RELATIONS.iter().map(|(t, _)| *t).collect(),
        }
    }

    /// Every object collected so far.
    pub fn collected(&self) -> &BTreeSet<ObjectRef> {
        &self.collected
    }

    /// Fetch the next type. `Ok(None)` once the walk is complete.
    ///
    /// Per-object failures end up in the batch; only fatal remote errors
    /// are returned as `Err`.
    pub async fn next(&mut self, fetcher: &Fetcher<'_>) -> Result<Option<Batch>> {
        let batch = match self.scope {
            PullScope::Tenant => {
                let Some(&object_type) = ObjectType::ALL.get(self.step) else {
                    return Ok(None);
                };
                self.list(fetcher, object_type, |_| true).await?
            }
            PullScope::Workspace(workspace_id) => {
                let Some(&(object_type, relation)) = WORKSPACE_RELATIONS.get(self.step) else {
                    return Ok(None);
                };
                self.fetch_related(fetcher, object_type, relation, workspace_id)
                    .await?
            }
        };
        self.step += 1;

        for object in &batch.objects {
            self.collected.insert(object.key());
            self.referenced.extend(object.references());
        }
        Ok(Some(batch))
    }

    async fn fetch_related(
        &self,
        fetcher: &Fetcher<'_>,
        object_type: ObjectType,
        relation: Relation,
        workspace_id: u64,
    ) -> Result<Batch> {
        match relation {
            Relation::Root => self.get_ids(fetcher, object_type, vec![workspace_id]).await,
            Relation::ReferencedBy(_) => {
                let ids = self
                    .referenced
                    .iter()
                    .filter(|r| r.object_type == object_type)
                    .map(|r| r.id)
                    .collect();
                self.get_ids(fetcher, object_type, ids).await
            }
            Relation::Referencing(owners) => {
                let wanted: BTreeSet<ObjectRef> = self
                    .collected
                    .iter()
                    .filter(|r| owners.contains(&r.object_type))
                    .copied()
                    .collect();
                if wanted.is_empty() {
                    return Ok(Batch::empty(object_type));
                }
                self.list(fetcher, object_type, |object| {
                    object.references().iter().any(|r| wanted.contains(r))
                })
                .await
            }
        }
    }

    async fn list(
        &self,
        fetcher: &Fetcher<'_>,
        object_type: ObjectType,
        keep: impl Fn(&ConfigObject) -> bool,
    ) -> Result<Batch> {
        let mut batch = Batch::empty(object_type);
        match fetcher.list(object_type).await {
            Ok(objects) => batch.objects = objects.into_iter().filter(|o| keep(o)).collect(),
            Err(e) => {
                let e = fetcher.check_fatal(e)?;
                tracing::warn!(object_type = %object_type, error = %e, "Listing failed");
                batch.failed.push(ItemFailure::remote(object_type, None, "", &e));
            }
        }
        batch.objects.sort_by_key(|o| o.id);
        Ok(batch)
    }

    async fn get_ids(&self, fetcher: &Fetcher<'_>, object_type: ObjectType, ids: Vec<u64>) -> Result<Batch> {
        let mut batch = Batch::empty(object_type);
        for (id, result) in fetcher.get_many(object_type, &ids).await {
            match result {
                Ok(object) => batch.objects.push(object),
                Err(e) => {
                    let e: RemoteError = fetcher.check_fatal(e)?;
                    tracing::warn!(object_type = %object_type, id, error = %e, "Fetch failed");
                    batch.failed.push(ItemFailure::remote(object_type, Some(id), "", &e));
                }
            }
        }
        batch.objects.sort_by_key(|o| o.id);
        Ok(batch)
    }
}
