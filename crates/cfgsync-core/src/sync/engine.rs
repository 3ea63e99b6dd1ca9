//! SyncEngine implementation
//!
//! The SyncEngine moves objects between one tenant and the local store:
//! - **pull**: fetch a scope and write it locally, refreshing baselines
//! - **diff**: classify every object against baseline, local, and remote
//! - **push**: send local edits back, refusing on conflicts

use std::collections::{BTreeMap, BTreeSet};

use cfgsync_fs::{NormalizedPath, WorkspacePath};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::report::{PlannedPush, PullReport, PushAction, PushReport, PushStatus};
use super::scope::{PullScope, ScopeWalk};
use crate::baseline::BaselineSnapshot;
use crate::config::DEFAULT_CONCURRENCY;
use crate::diff::{ChangeState, DiffRecord, DiffReport};
use crate::graph::TypeGraph;
use crate::ledger::Ledger;
use crate::mapping::IdMapping;
use crate::model::{ConfigObject, ObjectRef, ObjectType};
use crate::reference::rewrite_references;
use crate::remote::{Fetcher, RemoteClient, RetryPolicy};
use crate::report::{CreatedItem, ItemFailure, ItemRef, SkippedItem};
use crate::store::LocalStore;
use crate::{Error, Result};

/// Source side of the session mapping that tracks ids of objects created
/// by a push.
const STAGED: &str = "local";

/// Options for pull
#[derive(Debug, Clone, Copy, Default)]
pub struct PullOptions {
    /// Replace local files even when they carry edits that were never pushed
    pub overwrite_local: bool,
}

/// Options for push
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Classify and plan without any remote write
    pub dry_run: bool,
    /// Push conflicting objects too, overwriting the remote version
    pub force: bool,
}

/// Engine for synchronizing a workspace with its tenant
pub struct SyncEngine {
    /// Workspace root
    root: NormalizedPath,
    store: LocalStore,
    retry: RetryPolicy,
    concurrency: usize,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            store: LocalStore::new(root.clone()),
            root,
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop between objects once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Get the path to the ledger file
    pub fn ledger_path(&self) -> NormalizedPath {
        self.root.join(WorkspacePath::Ledger.as_str())
    }

    /// Load the ledger, or an empty one before the first pull
    pub fn load_ledger(&self) -> Result<Ledger> {
        Ledger::load_or_default(self.ledger_path().as_ref())
    }

    fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        ledger.save(self.ledger_path().as_ref())
    }

    fn fetcher<'a>(&'a self, remote: &'a dyn RemoteClient) -> Fetcher<'a> {
        Fetcher::new(remote, &self.retry, self.concurrency)
    }

    /// Fetch `scope` from the tenant into the local store.
    ///
    /// Each object is written and its baseline saved before the next one is
    /// processed, so an interrupted pull keeps everything done so far.
    ///
    /// # Errors
    ///
    /// Only for missing credentials, an unreachable tenant, or an unreadable
    /// or unwritable ledger. Per-object problems are in the report.
    pub async fn pull(
        &self,
        remote: &dyn RemoteClient,
        scope: PullScope,
        options: PullOptions,
    ) -> Result<PullReport> {
        let tenant = remote.tenant();
        tenant.require_credentials()?;
        tracing::info!(tenant = %tenant.name, ?scope, "Pulling");

        let mut ledger = self.load_ledger()?;
        let snapshot = BaselineSnapshot::capture(&self.root, &ledger)?;
        let fetcher = self.fetcher(remote);
        let mut walk = ScopeWalk::new(scope);
        let mut report = PullReport::default();

        'walk: loop {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(batch) = walk.next(&fetcher).await? else {
                break;
            };
            report.failed.extend(batch.failed);

            for object in &batch.objects {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'walk;
                }
                self.pull_object(object, &snapshot, &mut ledger, options, &mut report)?;
            }
        }

        if !report.cancelled {
            ledger.tenant = Some(tenant.name.clone());
            ledger.last_pull = Some(Utc::now());
            self.save_ledger(&ledger)?;
        }

        tracing::info!(
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Pull finished"
        );
        Ok(report)
    }

    fn pull_object(
        &self,
        object: &ConfigObject,
        snapshot: &BaselineSnapshot,
        ledger: &mut Ledger,
        options: PullOptions,
        report: &mut PullReport,
    ) -> Result<()> {
        let key = object.key();
        let remote_hash = object.content_hash();

        let local_hash = match self.store.read(key.object_type, key.id) {
            Ok(record) => record.map(|r| r.object.content_hash()),
            Err(e @ Error::CorruptRecord { .. }) => {
                if !options.overwrite_local {
                    tracing::warn!(object = %key, error = %e, "Keeping unreadable local file");
                    report.skipped.push(SkippedItem::new(
                        key,
                        &object.name,
                        format!("local file is unreadable: {e}"),
                    ));
                    return Ok(());
                }
                None
            }
            Err(e) => return Err(e),
        };

        if local_hash.as_deref() == Some(remote_hash.as_str()) {
            if ledger.entry(key.object_type, key.id).map(|e| e.hash.as_str()) != Some(remote_hash.as_str()) {
                ledger.record(key.object_type, key.id, remote_hash, object.modified_at());
                self.save_ledger(ledger)?;
            }
            report.unchanged.push(ItemRef::of(object));
            return Ok(());
        }

        if let Some(local_hash) = &local_hash
            && !options.overwrite_local
        {
            let synced = snapshot
                .synced_hash(key)
                .map(str::to_string)
                .or_else(|| snapshot.baseline(key).hash);
            if synced.as_deref() != Some(local_hash.as_str()) {
                tracing::warn!(object = %key, "Skipping object with unpushed local edits");
                report.skipped.push(SkippedItem::new(
                    key,
                    &object.name,
                    "local edits not pushed yet; push them or pull with overwrite",
                ));
                return Ok(());
            }
        }

        if let Err(e) = self.store.write(object) {
            tracing::warn!(object = %key, error = %e, "Could not write object");
            report
                .failed
                .push(ItemFailure::local(key.object_type, Some(key.id), &object.name, &e));
            return Ok(());
        }
        ledger.record(key.object_type, key.id, remote_hash, object.modified_at());
        self.save_ledger(ledger)?;
        tracing::debug!(object = %key, name = %object.name, "Pulled");
        report.written.push(ItemRef::of(object));
        Ok(())
    }

    /// Three-way diff of the local store against the tenant.
    ///
    /// Objects known locally or in the baseline but outside the walked
    /// scope are fetched by id so remote deletions show up.
    pub async fn diff(&self, remote: &dyn RemoteClient, scope: PullScope) -> Result<DiffReport> {
        remote.tenant().require_credentials()?;

        let ledger = self.load_ledger()?;
        let snapshot = BaselineSnapshot::capture(&self.root, &ledger)?;
        let local = self.store.enumerate_all()?;
        let fetcher = self.fetcher(remote);

        let mut report = DiffReport {
            corrupt: local.corrupt,
            ..DiffReport::default()
        };
        let local_objects: BTreeMap<ObjectRef, ConfigObject> = local
            .records
            .into_iter()
            .map(|r| (r.object.key(), r.object))
            .collect();

        let mut remote_objects = BTreeMap::new();
        let mut walk = ScopeWalk::new(scope);
        while let Some(batch) = walk.next(&fetcher).await? {
            report.failed.extend(batch.failed);
            remote_objects.extend(batch.objects.into_iter().map(|o| (o.key(), o)));
        }

        let mut keys: BTreeSet<ObjectRef> = local_objects.keys().copied().collect();
        keys.extend(snapshot.keys());
        let outside: Vec<ObjectRef> = keys
            .iter()
            .filter(|k| !remote_objects.contains_key(k))
            .copied()
            .collect();

        let mut unresolved = BTreeSet::new();
        for (object_type, ids) in ids_by_type(&outside) {
            for (id, result) in fetcher.get_many(object_type, &ids).await {
                match result {
                    Ok(object) => {
                        remote_objects.insert(object.key(), object);
                    }
                    Err(e) if e.is_not_found() => {}
                    Err(e) => {
                        let e = fetcher.check_fatal(e)?;
                        let key = ObjectRef::new(object_type, id);
                        let name = local_objects.get(&key).map(|o| o.name.as_str()).unwrap_or("");
                        report
                            .failed
                            .push(ItemFailure::remote(object_type, Some(id), name, &e));
                        unresolved.insert(key);
                    }
                }
            }
        }
        keys.extend(remote_objects.keys().copied());

        for key in keys {
            let local = local_objects.get(&key);
            let remote = remote_objects.get(&key);
            if unresolved.contains(&key) || (local.is_none() && remote.is_none()) {
                continue;
            }
            report.records.push(DiffRecord::compute(
                key,
                local,
                remote,
                &snapshot.baseline(key),
                snapshot.last_pull(),
            ));
        }

        let summary = report.summary();
        tracing::info!(
            unchanged = summary.unchanged,
            local_modified = summary.local_modified,
            remote_modified = summary.remote_modified,
            conflict = summary.conflict,
            local_only = summary.local_only,
            remote_only = summary.remote_only,
            "Diff computed"
        );
        Ok(report)
    }

    /// Send local edits to the tenant.
    ///
    /// Only objects whose content differs from their synced state are
    /// considered, so a push right after a pull issues no remote call at
    /// all. Conflicts reject the whole push unless `force` is set.
    /// Local deletions are never pushed.
    pub async fn push(&self, remote: &dyn RemoteClient, options: PushOptions) -> Result<PushReport> {
        let mut ledger = self.load_ledger()?;
        let snapshot = BaselineSnapshot::capture(&self.root, &ledger)?;
        let local = self.store.enumerate_all()?;
        let corrupt: Vec<ItemFailure> = local.corrupt.iter().map(ItemFailure::from).collect();

        let candidates: Vec<ConfigObject> = local
            .records
            .into_iter()
            .map(|r| r.object)
            .filter(|object| {
                let key = object.key();
                let synced = snapshot
                    .synced_hash(key)
                    .map(str::to_string)
                    .or_else(|| snapshot.baseline(key).hash);
                synced.as_deref() != Some(object.content_hash().as_str())
            })
            .collect();

        if candidates.is_empty() {
            tracing::info!("Nothing to push");
            let mut report = PushReport::new(PushStatus::NothingToPush);
            report.failed = corrupt;
            return Ok(report);
        }

        let tenant = remote.tenant();
        tenant.require_credentials()?;
        tracing::info!(tenant = %tenant.name, candidates = candidates.len(), "Planning push");

        let fetcher = self.fetcher(remote);
        let mut report = PushReport::new(PushStatus::Completed);
        report.failed = corrupt;
        let mut plan: Vec<(ConfigObject, PlannedPush)> = Vec::new();
        let mut converged: Vec<ConfigObject> = Vec::new();

        for (object_type, objects) in objects_by_type(candidates) {
            let ids: Vec<u64> = objects.iter().map(|o| o.id).collect();
            let fetched = fetcher.get_many(object_type, &ids).await;

            for (object, (_, result)) in objects.into_iter().zip(fetched) {
                let current = match result {
                    Ok(current) => Some(current),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => {
                        let e = fetcher.check_fatal(e)?;
                        report.failed.push(ItemFailure::for_object(&object, &e));
                        continue;
                    }
                };

                let key = object.key();
                let record = DiffRecord::compute(
                    key,
                    Some(&object),
                    current.as_ref(),
                    &snapshot.baseline(key),
                    snapshot.last_pull(),
                );
                let action = if current.is_some() {
                    PushAction::Update
                } else {
                    PushAction::Create
                };
                let planned = PlannedPush {
                    key,
                    name: object.name.clone(),
                    action,
                    state: record.state,
                };

                match record.state {
                    ChangeState::Unchanged => converged.extend(current),
                    ChangeState::LocalModified | ChangeState::LocalOnly => plan.push((object, planned)),
                    ChangeState::Conflict => {
                        if options.force {
                            plan.push((object, planned));
                        }
                        report.conflicts.push(record);
                    }
                    ChangeState::RemoteModified | ChangeState::RemoteOnly => {
                        report.skipped.push(SkippedItem::new(
                            key,
                            &object.name,
                            record
                                .note
                                .unwrap_or_else(|| "changed remotely since last sync; pull first".into()),
                        ));
                    }
                }
            }
        }

        let order = TypeGraph::standard().order()?;
        let rank = |t: ObjectType| order.iter().position(|o| *o == t).unwrap_or(order.len());
        plan.sort_by_key(|(object, _)| (rank(object.object_type), object.id));
        report.planned = plan.iter().map(|(_, p)| p.clone()).collect();

        if !report.conflicts.is_empty() && !options.force {
            tracing::warn!(conflicts = report.conflicts.len(), "Push rejected because of conflicts");
            report.status = PushStatus::Rejected;
            return Ok(report);
        }
        if options.dry_run {
            report.status = PushStatus::DryRun;
            return Ok(report);
        }

        for current in &converged {
            ledger.record(
                current.object_type,
                current.id,
                current.content_hash(),
                current.modified_at(),
            );
        }
        if !converged.is_empty() {
            self.save_ledger(&ledger)?;
        }

        if plan.is_empty() {
            report.status = PushStatus::NothingToPush;
            return Ok(report);
        }

        let mut session = IdMapping::new(STAGED, &tenant.name);
        let mut failed_keys: BTreeSet<ObjectRef> = BTreeSet::new();

        for (object, planned) in plan {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let key = object.key();
            if let Some(dependency) = object.references().into_iter().find(|r| failed_keys.contains(r)) {
                failed_keys.insert(key);
                report.skipped.push(SkippedItem::new(
                    key,
                    &object.name,
                    format!("dependency {dependency} failed"),
                ));
                continue;
            }

            let content = rewrite_references(&object.writable_content(), &session, &tenant.base_url);
            let result = match planned.action {
                PushAction::Create => fetcher.create(key.object_type, &content).await,
                PushAction::Update => fetcher.update(key.object_type, key.id, &content).await,
            };
            let stored = match result {
                Ok(stored) => stored,
                Err(e) => {
                    let e = fetcher.check_fatal(e)?;
                    tracing::warn!(object = %key, error = %e, "Push failed");
                    failed_keys.insert(key);
                    report.failed.push(ItemFailure::for_object(&object, &e));
                    continue;
                }
            };

            match planned.action {
                PushAction::Create => {
                    session.put(key.object_type, key.id, stored.id)?;
                    if stored.id != key.id {
                        self.store.remove(key.object_type, key.id)?;
                        ledger.remove(key.object_type, key.id);
                    }
                    tracing::debug!(object = %key, created = stored.id, "Created");
                    report.created.push(CreatedItem {
                        object_type: key.object_type,
                        source_id: key.id,
                        target_id: stored.id,
                        name: stored.name.clone(),
                    });
                }
                PushAction::Update => {
                    tracing::debug!(object = %key, "Updated");
                    report.updated.push(ItemRef::of(&stored));
                }
            }

            if let Err(e) = self.store.write(&stored) {
                report
                    .failed
                    .push(ItemFailure::local(stored.object_type, Some(stored.id), &stored.name, &e));
            }
            ledger.record(
                stored.object_type,
                stored.id,
                stored.content_hash(),
                stored.modified_at(),
            );
            self.save_ledger(&ledger)?;
        }

        tracing::info!(
            created = report.created.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Push finished"
        );
        Ok(report)
    }
}

fn ids_by_type(keys: &[ObjectRef]) -> BTreeMap<ObjectType, Vec<u64>> {
    let mut grouped: BTreeMap<ObjectType, Vec<u64>> = BTreeMap::new();
    for key in keys {
        grouped.entry(key.object_type).or_default().push(key.id);
    }
    grouped
}

fn objects_by_type(objects: Vec<ConfigObject>) -> BTreeMap<ObjectType, Vec<ConfigObject>> {
    let mut grouped: BTreeMap<ObjectType, Vec<ConfigObject>> = BTreeMap::new();
    for object in objects {
        grouped.entry(object.object_type).or_default().push(object);
    }
    grouped
}
