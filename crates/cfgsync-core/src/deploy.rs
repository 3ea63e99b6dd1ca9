//! Deploy a reviewed local graph into a target tenant
//!
//! Each local object is classified against its target counterpart and then
//! created or updated. The baseline is the target hash recorded in the
//! [`TargetLedger`] when copy or deploy last wrote the object. Without one,
//! the last pull time is the reference for the pulled tenant and any other
//! target counts as not yet pulled. Objects absent locally are never
//! deleted from the target. Across tenants, counterparts are found through
//! the persisted [`IdMapping`], which every create extends.

use std::collections::{BTreeMap, BTreeSet};

use cfgsync_fs::{NormalizedPath, WorkspacePath};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::baseline::{Baseline, BaselineSource};
use crate::config::DEFAULT_CONCURRENCY;
use crate::copy::{rank, target_payload};
use crate::diff::{ChangeState, DiffRecord};
use crate::graph::TypeGraph;
use crate::ledger::Ledger;
use crate::mapping::IdMapping;
use crate::model::{ConfigObject, ObjectRef, ObjectType};
use crate::reference::normalize_references;
use crate::remote::{Fetcher, RemoteClient, RetryPolicy};
use crate::report::{CreatedItem, ItemFailure, ItemRef, SkippedItem};
use crate::store::LocalStore;
use crate::target_ledger::{TargetLedger, target_view};

/// Tenant name used as mapping source when the workspace was never pulled.
const UNPULLED: &str = "local";

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Plan only
    pub dry_run: bool,
    /// Overwrite target objects changed since cfgsync last wrote them
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployAction {
    Create,
    Update,
    Unchanged,
    Skip,
}

/// What deploy does with one local object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDeploy {
    pub key: ObjectRef,
    /// Counterpart in the target tenant, if one exists
    pub target_id: Option<u64>,
    pub name: String,
    pub action: DeployAction,
    pub state: ChangeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeployReport {
    pub dry_run: bool,
    pub planned: Vec<PlannedDeploy>,
    pub created: Vec<CreatedItem>,
    pub updated: Vec<ItemRef>,
    /// Target objects updated to restore references left out at creation
    pub linked: Vec<ItemRef>,
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<ItemFailure>,
    pub cancelled: bool,
    pub mapping_file: String,
}

impl DeployReport {
    pub fn count(&self, action: DeployAction) -> usize {
        self.planned.iter().filter(|p| p.action == action).count()
    }
}

/// Deploys the local store of a workspace into a target tenant.
pub struct DeployEngine<'a> {
    root: NormalizedPath,
    store: LocalStore,
    target: &'a dyn RemoteClient,
    mapping: Option<IdMapping>,
    graph: TypeGraph,
    retry: RetryPolicy,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<'a> DeployEngine<'a> {
    pub fn new(root: NormalizedPath, target: &'a dyn RemoteClient) -> Self {
        Self {
            store: LocalStore::new(root.clone()),
            root,
            target,
            mapping: None,
            graph: TypeGraph::standard(),
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `mapping` instead of the persisted one for the pulled tenant.
    pub fn with_mapping(mut self, mapping: IdMapping) -> Self {
        self.mapping = Some(mapping);
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

    /// Classify every local object and, unless `dry_run`, write the plan.
    ///
    /// # Errors
    ///
    /// Only for missing target credentials, an unreachable target, or an
    /// unreadable ledger or mapping file.
    pub async fn deploy(&self, options: DeployOptions) -> Result<DeployReport> {
        let ledger = Ledger::load_or_default(self.root.join(WorkspacePath::Ledger.as_str()).as_ref())?;
        let target = self.target.tenant();
        let mut mapping = match &self.mapping {
            Some(mapping) => mapping.clone(),
            None => {
                let source = ledger.tenant.as_deref().unwrap_or(UNPULLED);
                IdMapping::load_or_new(&self.root, source, &target.name)?
            }
        };
        let same_tenant = mapping.source_tenant() == target.name;
        let mut written = TargetLedger::load_or_new(&self.root, mapping.source_tenant(), mapping.target_tenant())?;

        let local = self.store.enumerate_all()?;
        let mut report = DeployReport {
            dry_run: options.dry_run,
            failed: local.corrupt.iter().map(ItemFailure::from).collect(),
            mapping_file: IdMapping::path_in(&self.root, mapping.source_tenant(), mapping.target_tenant())
                .to_string(),
            ..DeployReport::default()
        };
        if local.records.is_empty() {
            return Ok(report);
        }

        target.require_credentials()?;
        tracing::info!(
            target = %target.name,
            objects = local.records.len(),
            dry_run = options.dry_run,
            "Planning deploy"
        );

        let fetcher = Fetcher::new(self.target, &self.retry, self.concurrency);
        let scope: BTreeSet<ObjectRef> = local.records.iter().map(|r| r.object.key()).collect();
        let resolve = |mapping: &IdMapping, r: ObjectRef| {
            mapping
                .get(r.object_type, r.id)
                .or(same_tenant.then_some(r.id))
        };

        let mut by_type: BTreeMap<ObjectType, Vec<ConfigObject>> = BTreeMap::new();
        for record in local.records {
            by_type
                .entry(record.object.object_type)
                .or_default()
                .push(record.object);
        }

        let mut plan: Vec<(ConfigObject, PlannedDeploy)> = Vec::new();
        for (object_type, objects) in by_type {
            let ids: Vec<u64> = objects
                .iter()
                .filter_map(|o| resolve(&mapping, o.key()))
                .collect();
            let mut current: BTreeMap<u64, _> = fetcher
                .get_many(object_type, &ids)
                .await
                .into_iter()
                .collect();

            for object in objects {
                let target_id = resolve(&mapping, object.key());
                let fetched = match target_id.and_then(|id| current.remove(&id)) {
                    None => None,
                    Some(Ok(found)) => Some(found),
                    Some(Err(e)) if e.is_not_found() => None,
                    Some(Err(e)) => {
                        let e = fetcher.check_fatal(e)?;
                        report.failed.push(ItemFailure::for_object(&object, &e));
                        continue;
                    }
                };
                let planned = self.plan_object(
                    &object,
                    target_id,
                    fetched.as_ref(),
                    &mapping,
                    &written,
                    same_tenant.then_some(&ledger),
                    options,
                );
                plan.push((object, planned));
            }
        }

        let order = self.graph.order()?;
        plan.sort_by_key(|(object, _)| (rank(&order, object.object_type), object.id));
        report.planned = plan.iter().map(|(_, p)| p.clone()).collect();
        if options.dry_run {
            return Ok(report);
        }

        let mut broken: BTreeSet<ObjectRef> = BTreeSet::new();
        let mut pending = Vec::new();
        for (object, planned) in plan {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            let key = object.key();
            match planned.action {
                DeployAction::Unchanged => continue,
                DeployAction::Skip => {
                    report.skipped.push(SkippedItem::new(
                        key,
                        &object.name,
                        planned.reason.unwrap_or_default(),
                    ));
                    continue;
                }
                DeployAction::Create | DeployAction::Update => {}
            }
            if let Some(dependency) = object.references().into_iter().find(|r| broken.contains(r)) {
                broken.insert(key);
                report
                    .skipped
                    .push(SkippedItem::new(key, &object.name, format!("dependency {dependency} failed")));
                continue;
            }

            let (payload, incomplete) =
                target_payload(&object, &scope, &target.base_url, |r| resolve(&mapping, r));
            let result = match (planned.action, planned.target_id) {
                (DeployAction::Update, Some(target_id)) => fetcher.update(key.object_type, target_id, &payload).await,
                _ => fetcher.create(key.object_type, &payload).await,
            };
            let stored = match result {
                Ok(stored) => stored,
                Err(e) => {
                    let e = fetcher.check_fatal(e)?;
                    tracing::warn!(object = %key, error = %e, "Deploy failed");
                    broken.insert(key);
                    report.failed.push(ItemFailure::for_object(&object, &e));
                    continue;
                }
            };

            written.record_and_save(&self.root, &stored)?;
            if planned.action == DeployAction::Create {
                mapping.put(key.object_type, key.id, stored.id)?;
                mapping.save(&self.root)?;
                tracing::debug!(object = %key, target_id = stored.id, "Created");
                report.created.push(CreatedItem {
                    object_type: key.object_type,
                    source_id: key.id,
                    target_id: stored.id,
                    name: stored.name.clone(),
                });
                if incomplete {
                    pending.push((object, stored.id, payload));
                }
            } else {
                tracing::debug!(object = %key, target_id = stored.id, "Updated");
                report.updated.push(ItemRef::of(&stored));
            }
        }

        for (object, target_id, created_payload) in pending {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let (payload, _) = target_payload(&object, &scope, &target.base_url, |r| resolve(&mapping, r));
            if payload == created_payload {
                continue;
            }
            match fetcher.update(object.object_type, target_id, &payload).await {
                Ok(updated) => {
                    written.record_and_save(&self.root, &updated)?;
                    report.linked.push(ItemRef::of(&updated));
                }
                Err(e) => {
                    let e = fetcher.check_fatal(e)?;
                    report.failed.push(ItemFailure::for_object(&object, &e));
                }
            }
        }

        tracing::info!(
            created = report.created.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Deploy finished"
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_object(
        &self,
        object: &ConfigObject,
        target_id: Option<u64>,
        current: Option<&ConfigObject>,
        mapping: &IdMapping,
        written: &TargetLedger,
        pulled_from_target: Option<&Ledger>,
        options: DeployOptions,
    ) -> PlannedDeploy {
        let key = object.key();
        let mapped = mapping.get(key.object_type, key.id).is_some();

        // Both sides in target numbering, references without base URL.
        let local_view = ConfigObject {
            content: normalize_references(
                &object.writable_content(),
                pulled_from_target.is_none().then_some(mapping),
            ),
            ..object.clone()
        };
        let remote_view = current.map(target_view);
        let baseline = match current.and_then(|c| written.hash(c.object_type, c.id)) {
            Some(hash) => Baseline {
                hash: Some(hash.to_string()),
                source: BaselineSource::LastWrite,
            },
            None => Baseline {
                hash: None,
                source: BaselineSource::Unavailable,
            },
        };
        let record = DiffRecord::compute(
            key,
            Some(&local_view),
            remote_view.as_ref(),
            &baseline,
            pulled_from_target.and_then(|l| l.last_pull),
        );

        let (action, reason) = match record.state {
            ChangeState::LocalOnly if mapped => (
                DeployAction::Skip,
                Some(format!(
                    "mapped target {} no longer exists",
                    target_id.map(|id| id.to_string()).unwrap_or_default()
                )),
            ),
            ChangeState::LocalOnly => (DeployAction::Create, None),
            ChangeState::Unchanged => (DeployAction::Unchanged, None),
            ChangeState::LocalModified => (DeployAction::Update, None),
            ChangeState::RemoteModified | ChangeState::Conflict if options.force => (DeployAction::Update, None),
            ChangeState::RemoteModified => (
                DeployAction::Skip,
                Some("target changed since it was last written; use force to overwrite".to_string()),
            ),
            ChangeState::Conflict => (
                DeployAction::Skip,
                Some("changed locally and in the target; use force to overwrite".to_string()),
            ),
            ChangeState::RemoteOnly => (DeployAction::Skip, Some(format!("unexpected state {}", record.state))),
        };

        PlannedDeploy {
            key,
            target_id: current.map(|c| c.id),
            name: object.name.clone(),
            action,
            state: record.state,
            reason,
        }
    }
}
