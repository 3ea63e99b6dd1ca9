//! Field-level comparison of two pulled workspaces
//!
//! Objects are paired through an [`IdMapping`] when one is given and by
//! identical id otherwise (the same tenant before and after). References
//! are reduced to `plural/id` tokens, with source ids translated, so tenant
//! base URLs and renumbering never show up as differences.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::diff::StructuralDiff;
use crate::mapping::IdMapping;
use crate::model::{ConfigObject, ObjectRef, ObjectType};
use crate::reference::normalize_references;
use crate::report::ItemRef;
use crate::store::{CorruptFile, LocalStore};

/// One source object and its counterpart in the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectComparison {
    pub object_type: ObjectType,
    pub source_id: u64,
    pub target_id: u64,
    pub source_name: String,
    pub target_name: String,
    pub diff: StructuralDiff,
}

impl ObjectComparison {
    pub fn is_equivalent(&self) -> bool {
        self.diff.is_equivalent()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    pub pairs: Vec<ObjectComparison>,
    pub source_only: Vec<ItemRef>,
    pub target_only: Vec<ItemRef>,
    /// Unreadable files on either side
    pub corrupt: Vec<CorruptFile>,
}

impl ComparisonReport {
    /// Pairs whose content differs.
    pub fn changed(&self) -> impl Iterator<Item = &ObjectComparison> {
        self.pairs.iter().filter(|p| !p.is_equivalent())
    }

    pub fn is_identical(&self) -> bool {
        self.changed().next().is_none() && self.source_only.is_empty() && self.target_only.is_empty()
    }
}

/// Compares two local stores.
pub struct Comparator {
    source: LocalStore,
    target: LocalStore,
    mapping: Option<IdMapping>,
}

impl Comparator {
    pub fn new(source: LocalStore, target: LocalStore) -> Self {
        Self {
            source,
            target,
            mapping: None,
        }
    }

    /// Pair objects through `mapping` instead of by id.
    pub fn with_mapping(mut self, mapping: IdMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn compare(&self) -> Result<ComparisonReport> {
        let source = self.source.enumerate_all()?;
        let target = self.target.enumerate_all()?;

        let mut report = ComparisonReport::default();
        report.corrupt.extend(source.corrupt);
        report.corrupt.extend(target.corrupt);

        let targets: BTreeMap<ObjectRef, ConfigObject> = target
            .records
            .into_iter()
            .map(|r| (r.object.key(), r.object))
            .collect();
        let mut paired: BTreeSet<ObjectRef> = BTreeSet::new();

        for record in source.records {
            let object = record.object;
            let counterpart = self
                .counterpart(object.key())
                .and_then(|key| targets.get(&key));
            let Some(target_object) = counterpart else {
                report.source_only.push(ItemRef::of(&object));
                continue;
            };
            paired.insert(target_object.key());
            report.pairs.push(ObjectComparison {
                object_type: object.object_type,
                source_id: object.id,
                target_id: target_object.id,
                source_name: object.name.clone(),
                target_name: target_object.name.clone(),
                diff: StructuralDiff::compute(
                    &comparable(&object, self.mapping.as_ref()),
                    &comparable(target_object, None),
                ),
            });
        }

        report.target_only = targets
            .values()
            .filter(|o| !paired.contains(&o.key()))
            .map(ItemRef::of)
            .collect();

        tracing::info!(
            pairs = report.pairs.len(),
            changed = report.changed().count(),
            source_only = report.source_only.len(),
            target_only = report.target_only.len(),
            "Comparison finished"
        );
        Ok(report)
    }

    fn counterpart(&self, key: ObjectRef) -> Option<ObjectRef> {
        match &self.mapping {
            Some(mapping) => mapping
                .get(key.object_type, key.id)
                .map(|id| ObjectRef::new(key.object_type, id)),
            None => Some(key),
        }
    }
}

fn comparable(object: &ConfigObject, mapping: Option<&IdMapping>) -> Value {
    Value::Object(normalize_references(&object.writable_content(), mapping))
}
