use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::node::{DependencyNode, ModuleId, NodeKind};
use crate::error::Result;
use crate::manifest::ManifestSource;

/// Every node discovered during one build, in discovery order.
///
/// Nodes are only ever appended. A node becomes visible here together with
/// its complete dependency list, since the manifest is fetched before insert.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Vec<DependencyNode>,
    index: HashMap<ModuleId, usize>,
    discovered: Arc<AtomicUsize>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing node, or fetches the manifest for `id` and
    /// inserts a new support node.
    pub fn get_or_create(
        &mut self,
        id: &ModuleId,
        source: &dyn ManifestSource,
    ) -> Result<&DependencyNode> {
        let idx = self.get_or_create_index(id, NodeKind::Support, source)?;
        Ok(&self.nodes[idx])
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&DependencyNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// All nodes in insertion order.
    pub fn all(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn applications(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes
            .iter()
            .filter(|node| node.kind() == NodeKind::Application)
    }

    pub fn supports(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes
            .iter()
            .filter(|node| node.kind() == NodeKind::Support)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Shared count of inserted nodes, readable from other threads.
    pub fn discovered_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.discovered)
    }

    pub(crate) fn get_or_create_index(
        &mut self,
        id: &ModuleId,
        kind: NodeKind,
        source: &dyn ManifestSource,
    ) -> Result<usize> {
        if let Some(&idx) = self.index.get(id) {
            return Ok(idx);
        }
        let deps = match kind {
            NodeKind::Support => source.fetch_dependencies(id)?,
            NodeKind::Application => source.fetch_application_dependencies(id)?,
        };
        debug!(module = %id, kind = kind.as_str(), deps = deps.len(), "fetched manifest");
        Ok(self.insert(DependencyNode::new(id.clone(), kind, deps)))
    }

    /// Inserts a node whose manifest was fetched by the caller. Existing ids
    /// keep their node.
    pub(crate) fn insert(&mut self, node: DependencyNode) -> usize {
        if let Some(&idx) = self.index.get(node.id()) {
            return idx;
        }
        let idx = self.nodes.len();
        self.index.insert(node.id().clone(), idx);
        self.nodes.push(node);
        self.discovered.fetch_add(1, Ordering::Relaxed);
        idx
    }

    pub(crate) fn index_of(&self, id: &ModuleId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node(&self, idx: usize) -> &DependencyNode {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut DependencyNode {
        &mut self.nodes[idx]
    }
}
