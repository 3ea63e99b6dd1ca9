//! Cross-tenant copy
//!
//! Replicates an object graph from a source tenant into a target tenant in
//! type-graph order. Every created object is recorded in the persisted
//! [`IdMapping`] before the next one is processed, so a copy that stops
//! halfway can simply be run again: objects already mapped are not created
//! twice.
//!
//! References come in two kinds. A reference whose type is a declared
//! dependency (a hook's queue) must resolve before the object is created.
//! Any other reference into the copied set (a queue's hook list) is dropped
//! at creation and restored by a final link pass once its target exists.
//! A rerun also relinks objects copied earlier whose target still lacks
//! such a reference.
//!
//! Every write is recorded in the [`TargetLedger`] so that a later deploy
//! can tell its own writes from changes made in the target.

use std::collections::BTreeSet;

use cfgsync_fs::NormalizedPath;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::config::DEFAULT_CONCURRENCY;
use crate::graph::TypeGraph;
use crate::mapping::IdMapping;
use crate::model::{ConfigObject, ObjectRef, ObjectType};
use crate::reference::{Retarget, references, retarget_references};
use crate::remote::{Fetcher, RemoteClient, RetryPolicy};
use crate::report::{CreatedItem, ItemFailure, ItemRef, SkippedItem};
use crate::sync::{PullScope, ScopeWalk};
use crate::target_ledger::TargetLedger;

/// Outcome of a copy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyReport {
    pub created: Vec<CreatedItem>,
    /// Target objects updated by the link pass
    pub linked: Vec<ItemRef>,
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<ItemFailure>,
    pub cancelled: bool,
    /// Mapping file the session wrote to
    pub mapping_file: String,
}

/// Payload for writing `object` into a target tenant.
///
/// References into `scope` are pointed at the id `resolve` returns; those
/// it cannot resolve yet are dropped and the returned flag is set.
/// References outside `scope` are pointed at their target when `resolve`
/// knows one and otherwise left untouched.
pub(crate) fn target_payload(
    object: &ConfigObject,
    scope: &BTreeSet<ObjectRef>,
    target_base_url: &str,
    resolve: impl Fn(ObjectRef) -> Option<u64>,
) -> (Map<String, Value>, bool) {
    let mut incomplete = false;
    let payload = retarget_references(&object.writable_content(), target_base_url, |r| {
        match resolve(r) {
            Some(id) => Retarget::To(id),
            None if scope.contains(&r) => {
                incomplete = true;
                Retarget::Drop
            }
            None => Retarget::Keep,
        }
    });
    (payload, incomplete)
}

/// Type position in `order`, for sorting.
pub(crate) fn rank(order: &[ObjectType], object_type: ObjectType) -> usize {
    order
        .iter()
        .position(|t| *t == object_type)
        .unwrap_or(order.len())
}

enum Readiness {
    Ready,
    AlreadyCopied(u64),
    /// A dependency has not been copied yet
    Waiting(ObjectRef),
    /// A dependency failed
    Blocked(ObjectRef),
}

/// Object created with references left out.
struct PendingLink {
    object: ConfigObject,
    target_id: u64,
    payload: Map<String, Value>,
}

struct Session {
    mapping: IdMapping,
    written: TargetLedger,
    scope: BTreeSet<ObjectRef>,
    /// Objects that failed or were skipped because of a failure
    broken: BTreeSet<ObjectRef>,
    pending: Vec<PendingLink>,
    report: CopyReport,
}

/// Copies objects from one tenant into another.
pub struct CopyEngine<'a> {
    /// Workspace root holding the mapping file
    root: NormalizedPath,
    source: &'a dyn RemoteClient,
    target: &'a dyn RemoteClient,
    graph: TypeGraph,
    retry: RetryPolicy,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<'a> CopyEngine<'a> {
    pub fn new(root: NormalizedPath, source: &'a dyn RemoteClient, target: &'a dyn RemoteClient) -> Self {
        Self {
            root,
            source,
            target,
            graph: TypeGraph::standard(),
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_graph(mut self, graph: TypeGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Mapping file for this tenant pair.
    pub fn mapping_path(&self) -> NormalizedPath {
        IdMapping::path_in(&self.root, &self.source.tenant().name, &self.target.tenant().name)
    }

    /// Copy one workspace and everything hanging off it.
    pub async fn copy_workspace(&self, workspace_id: u64) -> Result<CopyReport> {
        self.copy_scope(PullScope::Workspace(workspace_id)).await
    }

    /// Copy every object of the source tenant.
    pub async fn copy_all(&self) -> Result<CopyReport> {
        self.copy_scope(PullScope::Tenant).await
    }

    async fn copy_scope(&self, scope: PullScope) -> Result<CopyReport> {
        self.source.tenant().require_credentials()?;
        self.target.tenant().require_credentials()?;
        tracing::info!(
            source = %self.source.tenant().name,
            target = %self.target.tenant().name,
            ?scope,
            "Copying"
        );

        let reader = Fetcher::new(self.source, &self.retry, self.concurrency);
        let mut walk = ScopeWalk::new(scope);
        let mut objects = Vec::new();
        let mut read_failures = Vec::new();
        while let Some(batch) = walk.next(&reader).await? {
            read_failures.extend(batch.failed);
            objects.extend(batch.objects);
            if self.cancel.is_cancelled() {
                return Ok(CopyReport {
                    failed: read_failures,
                    cancelled: true,
                    mapping_file: self.mapping_path().to_string(),
                    ..CopyReport::default()
                });
            }
        }

        let mut report = self.copy_objects(objects).await?;
        read_failures.append(&mut report.failed);
        report.failed = read_failures;
        Ok(report)
    }

    /// Create `objects` in the target tenant.
    ///
    /// # Errors
    ///
    /// Only for missing target credentials, an unreachable target, a
    /// dependency cycle in the type graph, or an unreadable or unwritable
    /// mapping file. Per-object outcomes are in the report.
    pub async fn copy_objects(&self, objects: Vec<ConfigObject>) -> Result<CopyReport> {
        let target = self.target.tenant();
        target.require_credentials()?;

        let order = self.graph.order()?;
        let source = &self.source.tenant().name;
        let mapping = IdMapping::load_or_new(&self.root, source, &target.name)?;
        let written = TargetLedger::load_or_new(&self.root, source, &target.name)?;
        let mut objects = objects;
        objects.sort_by_key(|o| (rank(&order, o.object_type), o.id));

        let mut session = Session {
            mapping,
            written,
            scope: objects.iter().map(ConfigObject::key).collect(),
            broken: BTreeSet::new(),
            pending: Vec::new(),
            report: CopyReport {
                mapping_file: self.mapping_path().to_string(),
                ..CopyReport::default()
            },
        };
        let writer = Fetcher::new(self.target, &self.retry, self.concurrency);

        let mut deferred = Vec::new();
        let mut copied = Vec::new();
        for object in objects {
            if self.cancel.is_cancelled() {
                session.report.cancelled = true;
                return Ok(session.report);
            }
            match self.readiness(&object, &session) {
                Readiness::Ready => self.create(&writer, &object, &mut session).await?,
                Readiness::Waiting(dependency) => {
                    tracing::debug!(object = %object.key(), %dependency, "Deferring until dependency is copied");
                    deferred.push(object);
                }
                Readiness::AlreadyCopied(target_id) => {
                    self.set_aside(&object, Readiness::AlreadyCopied(target_id), &mut session);
                    copied.push((object, target_id));
                }
                other => self.set_aside(&object, other, &mut session),
            }
        }

        for object in deferred {
            if self.cancel.is_cancelled() {
                session.report.cancelled = true;
                return Ok(session.report);
            }
            match self.readiness(&object, &session) {
                Readiness::Ready => self.create(&writer, &object, &mut session).await?,
                other => self.set_aside(&object, other, &mut session),
            }
        }

        self.resume_links(&writer, copied, &mut session).await?;
        self.link(&writer, &mut session).await?;

        let report = session.report;
        tracing::info!(
            created = report.created.len(),
            linked = report.linked.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Copy finished"
        );
        Ok(report)
    }

    fn readiness(&self, object: &ConfigObject, session: &Session) -> Readiness {
        if let Some(target_id) = session.mapping.get(object.object_type, object.id) {
            return Readiness::AlreadyCopied(target_id);
        }
        let dependencies: Vec<ObjectRef> = object
            .references()
            .into_iter()
            .filter(|r| session.scope.contains(r) && self.graph.depends_on(object.object_type, r.object_type))
            .collect();

        if let Some(failed) = dependencies.iter().find(|d| session.broken.contains(d)) {
            return Readiness::Blocked(*failed);
        }
        match dependencies
            .iter()
            .find(|d| session.mapping.get(d.object_type, d.id).is_none())
        {
            Some(missing) => Readiness::Waiting(*missing),
            None => Readiness::Ready,
        }
    }

    fn set_aside(&self, object: &ConfigObject, readiness: Readiness, session: &mut Session) {
        let key = object.key();
        let reason = match readiness {
            Readiness::AlreadyCopied(target_id) => {
                tracing::debug!(object = %key, target_id, "Already copied");
                format!("already copied as {}", ObjectRef::new(key.object_type, target_id))
            }
            Readiness::Blocked(dependency) => format!("dependency {dependency} failed"),
            Readiness::Waiting(dependency) => format!("dependency {dependency} was not copied"),
            Readiness::Ready => return,
        };
        if !matches!(readiness, Readiness::AlreadyCopied(_)) {
            tracing::warn!(object = %key, %reason, "Skipping");
            session.broken.insert(key);
        }
        session
            .report
            .skipped
            .push(SkippedItem::new(key, &object.name, reason));
    }

    async fn create(&self, writer: &Fetcher<'_>, object: &ConfigObject, session: &mut Session) -> Result<()> {
        let key = object.key();
        let target = self.target.tenant();
        let (payload, incomplete) = target_payload(object, &session.scope, &target.base_url, |r| {
            session.mapping.get(r.object_type, r.id)
        });

        match writer.create(key.object_type, &payload).await {
            Ok(created) => {
                session.mapping.put(key.object_type, key.id, created.id)?;
                session.mapping.save(&self.root)?;
                session.written.record_and_save(&self.root, &created)?;
                tracing::debug!(object = %key, target_id = created.id, "Created");
                session.report.created.push(CreatedItem {
                    object_type: key.object_type,
                    source_id: key.id,
                    target_id: created.id,
                    name: created.name.clone(),
                });
                if incomplete {
                    session.pending.push(PendingLink {
                        object: object.clone(),
                        target_id: created.id,
                        payload,
                    });
                }
            }
            Err(e) => {
                let e = writer.check_fatal(e)?;
                tracing::warn!(object = %key, error = %e, "Create failed");
                session.broken.insert(key);
                session.report.failed.push(ItemFailure::for_object(object, &e));
            }
        }
        Ok(())
    }

    /// Queue links for objects an earlier run copied.
    ///
    /// That run may have stopped before its link pass, or a reference
    /// target may only exist now. An object is queued when its target
    /// lacks a reference the current mapping can resolve.
    async fn resume_links(
        &self,
        writer: &Fetcher<'_>,
        copied: Vec<(ConfigObject, u64)>,
        session: &mut Session,
    ) -> Result<()> {
        let base_url = &self.target.tenant().base_url;
        for (object, target_id) in copied {
            let links_back = object
                .references()
                .into_iter()
                .any(|r| session.scope.contains(&r) && !self.graph.depends_on(object.object_type, r.object_type));
            if !links_back {
                continue;
            }
            if self.cancel.is_cancelled() {
                session.report.cancelled = true;
                break;
            }

            let current = match writer.get(object.object_type, target_id).await {
                Ok(current) => current,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(object = %object.key(), target_id, "Mapped target no longer exists");
                    continue;
                }
                Err(e) => {
                    let e = writer.check_fatal(e)?;
                    session.report.failed.push(ItemFailure::for_object(&object, &e));
                    continue;
                }
            };
            let (payload, _) = target_payload(&object, &session.scope, base_url, |r| {
                session.mapping.get(r.object_type, r.id)
            });
            let present = current.references();
            if references(&payload).iter().all(|r| present.contains(r)) {
                continue;
            }
            tracing::debug!(object = %object.key(), target_id, "Relinking earlier copy");
            session.pending.push(PendingLink {
                object,
                target_id,
                payload: current.writable_content(),
            });
        }
        Ok(())
    }

    /// Restore references that were dropped at creation.
    async fn link(&self, writer: &Fetcher<'_>, session: &mut Session) -> Result<()> {
        let base_url = &self.target.tenant().base_url;
        for link in std::mem::take(&mut session.pending) {
            if self.cancel.is_cancelled() {
                session.report.cancelled = true;
                break;
            }
            let (payload, _) = target_payload(&link.object, &session.scope, base_url, |r| {
                session.mapping.get(r.object_type, r.id)
            });
            if payload == link.payload {
                continue;
            }

            let object_type = link.object.object_type;
            match writer.update(object_type, link.target_id, &payload).await {
                Ok(updated) => {
                    tracing::debug!(object = %updated.key(), "Linked");
                    session.written.record_and_save(&self.root, &updated)?;
                    session.report.linked.push(ItemRef::of(&updated));
                }
                Err(e) => {
                    let e = writer.check_fatal(e)?;
                    tracing::warn!(object = %link.object.key(), error = %e, "Link update failed");
                    session.report.failed.push(ItemFailure::for_object(&link.object, &e));
                }
            }
        }
        Ok(())
    }
}
