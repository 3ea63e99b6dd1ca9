//! Dependency graph between object types
//!
//! Edges point from dependent to dependency: a queue references its
//! workspace, schema, and engine, so `Queue -> {Workspace, Schema, Engine}`.
//! Copy and push process types in [`TypeGraph::order`], dependencies first.
//!
//! # Example
//!
//! ```
//! use cfgsync_core::graph::TypeGraph;
//! use cfgsync_core::model::ObjectType;
//!
//! let order = TypeGraph::standard().order().unwrap();
//! assert_eq!(order[0], ObjectType::Workspace);
//! let queue = order.iter().position(|t| *t == ObjectType::Queue).unwrap();
//! let hook = order.iter().position(|t| *t == ObjectType::Hook).unwrap();
//! assert!(queue < hook);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::model::ObjectType;
use crate::{Error, Result};

/// Directed acyclic graph of type dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeGraph {
    /// Key depends on each value
    edges: BTreeMap<ObjectType, BTreeSet<ObjectType>>,
}

impl TypeGraph {
    /// A graph with every type and no edges.
    pub fn new() -> Self {
        Self {
            edges: ObjectType::ALL
                .into_iter()
                .map(|t| (t, BTreeSet::new()))
                .collect(),
        }
    }

    /// The dependency structure of the configuration service.
    pub fn standard() -> Self {
        use ObjectType::*;

        let mut graph = Self::new();
        graph.add_edges(Queue, &[Workspace, Schema, Engine]);
        graph.add_edges(Hook, &[Queue]);
        graph.add_edges(Connector, &[Queue]);
        graph.add_edges(Inbox, &[Queue]);
        graph.add_edges(EmailTemplate, &[Queue]);
        graph.add_edges(Rule, &[Queue, Schema]);
        graph.add_edges(EngineField, &[Engine, Schema]);
        graph
    }

    /// Declare that `dependent` depends on `dependency`.
    pub fn add_edge(&mut self, dependent: ObjectType, dependency: ObjectType) {
        self.edges.entry(dependency).or_default();
        self.edges.entry(dependent).or_default().insert(dependency);
    }

    pub fn add_edges(&mut self, dependent: ObjectType, dependencies: &[ObjectType]) {
        for &dependency in dependencies {
            self.add_edge(dependent, dependency);
        }
    }

    /// Direct dependencies of a type.
    pub fn dependencies_of(&self, object_type: ObjectType) -> impl Iterator<Item = ObjectType> + '_ {
        self.edges.get(&object_type).into_iter().flatten().copied()
    }

    pub fn depends_on(&self, dependent: ObjectType, dependency: ObjectType) -> bool {
        self.edges
            .get(&dependent)
            .is_some_and(|deps| deps.contains(&dependency))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Topological order, dependencies first (Kahn's algorithm).
    ///
    /// Among types that are ready at the same time, declaration order wins,
    /// so the result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyCycle` naming the types left unsorted.
    pub fn order(&self) -> Result<Vec<ObjectType>> {
        let mut pending: BTreeMap<ObjectType, usize> = self
            .edges
            .iter()
            .map(|(&t, deps)| (t, deps.len()))
            .collect();

        let mut ready: BTreeSet<ObjectType> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&t, _)| t)
            .collect();

        let mut result = Vec::with_capacity(self.edges.len());
        while let Some(current) = ready.pop_first() {
            result.push(current);
            pending.remove(&current);

            for (&dependent, deps) in &self.edges {
                if deps.contains(&current)
                    && let Some(count) = pending.get_mut(&dependent)
                {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if !pending.is_empty() {
            let types = pending
                .keys()
                .map(|t| t.tag())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::DependencyCycle { types });
        }

        Ok(result)
    }
}
