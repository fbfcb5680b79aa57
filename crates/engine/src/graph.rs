//! Dependency graph builder
//!
//! Turns a sealed model's declared dependencies into a directed graph
//! with one node per attribute and edges dependency → dependent. The
//! graph also exposes the reverse-dependency closure used by
//! dependency-aware cache invalidation.

use indexmap::{IndexMap, IndexSet};

use metron_foundation::AttributeId;
use metron_model::{DefinitionError, SealedModel};

use crate::error::Result;

/// Directed dependency graph over attribute identities.
///
/// Nodes are indexed densely in model declaration order, which is the
/// tie-break order for updates inside a cyclic group.
pub struct DependencyGraph {
    nodes: Vec<AttributeId>,
    index: IndexMap<AttributeId, usize>,
    /// Edge dependency → dependent: `dependents[d]` are nodes that read `d`
    dependents: Vec<Vec<usize>>,
    /// Declared dependencies per node (deduplicated, declaration order)
    dependencies: Vec<Vec<usize>>,
    self_loop: Vec<bool>,
}

impl DependencyGraph {
    /// Build the graph from a sealed model.
    ///
    /// Unknown dependencies are rejected again here even though the
    /// registry validates at seal time; the graph is the last line
    /// before evaluation. Self-dependencies are kept as self-loop edges,
    /// never silently dropped: they mark their node as cyclic.
    pub fn build(model: &SealedModel) -> Result<Self> {
        let nodes: Vec<AttributeId> = model.attribute_ids().cloned().collect();
        let index: IndexMap<AttributeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut dependents = vec![Vec::new(); nodes.len()];
        let mut dependencies = vec![Vec::new(); nodes.len()];
        let mut self_loop = vec![false; nodes.len()];

        for (node, id) in nodes.iter().enumerate() {
            let attr = model
                .resolve(id)
                .ok_or_else(|| DefinitionError::UnknownAttribute(id.clone()))?;
            let mut seen: IndexSet<usize> = IndexSet::new();
            for dep in attr.dependencies() {
                let dep_node = *index.get(dep).ok_or_else(|| {
                    DefinitionError::UnknownDependency {
                        attribute: id.clone(),
                        dependency: dep.clone(),
                    }
                })?;
                if !seen.insert(dep_node) {
                    continue;
                }
                if dep_node == node {
                    self_loop[node] = true;
                }
                dependencies[node].push(dep_node);
                dependents[dep_node].push(node);
            }
        }

        Ok(Self {
            nodes,
            index,
            dependents,
            dependencies,
            self_loop,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Attribute identity of a node index.
    pub fn id(&self, node: usize) -> &AttributeId {
        &self.nodes[node]
    }

    /// Node index of an attribute identity.
    pub fn index_of(&self, id: &AttributeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Nodes that read this node's value.
    pub fn dependents_of(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    /// Declared dependencies of this node.
    pub fn dependencies_of(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    pub fn has_self_loop(&self, node: usize) -> bool {
        self.self_loop[node]
    }

    /// Transitive downstream closure of an attribute: itself plus every
    /// attribute whose value can change when it changes. Drives
    /// dependency-aware cache invalidation.
    pub fn downstream_closure(&self, id: &AttributeId) -> IndexSet<AttributeId> {
        let mut closure = IndexSet::new();
        let Some(start) = self.index_of(id) else {
            return closure;
        };
        let mut queue = vec![start];
        let mut visited = vec![false; self.nodes.len()];
        visited[start] = true;
        while let Some(node) = queue.pop() {
            closure.insert(self.nodes[node].clone());
            for &dep in &self.dependents[node] {
                if !visited[dep] {
                    visited[dep] = true;
                    queue.push(dep);
                }
            }
        }
        closure
    }
}
