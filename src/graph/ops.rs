use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::node::{DependencyNode, ModuleId, NodeKind};
use crate::core::store::GraphStore;

/// Nodes grouped by tier, lowest tier first. Within a band nodes keep
/// insertion order.
pub fn tier_bands(store: &GraphStore) -> BTreeMap<u32, Vec<&DependencyNode>> {
    let mut bands: BTreeMap<u32, Vec<&DependencyNode>> = BTreeMap::new();
    for node in store.all() {
        bands.entry(node.tier()).or_default().push(node);
    }
    bands
}

pub fn max_tier(store: &GraphStore) -> u32 {
    store.all().iter().map(DependencyNode::tier).max().unwrap_or(0)
}

pub fn max_support_tier(store: &GraphStore) -> u32 {
    store.supports().map(DependencyNode::tier).max().unwrap_or(0)
}

/// Nodes that list `id` as a direct dependency, sorted by id.
pub fn direct_dependents<'a>(store: &'a GraphStore, id: &ModuleId) -> Vec<&'a ModuleId> {
    let mut dependents: Vec<&ModuleId> = store
        .all()
        .iter()
        .filter(|node| node.dependencies().contains(id))
        .map(DependencyNode::id)
        .collect();
    dependents.sort();
    dependents
}

/// Graph view with edges drawn dependency -> dependent, so a topological
/// order lists dependencies first. Dependencies missing from the store are
/// left out.
pub fn to_petgraph(store: &GraphStore) -> (DiGraph<ModuleId, ()>, HashMap<ModuleId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let mut indices = HashMap::new();
    for node in store.all() {
        let idx = graph.add_node(node.id().clone());
        indices.insert(node.id().clone(), idx);
    }
    for node in store.all() {
        let to = indices[node.id()];
        for dep in node.dependencies() {
            if let Some(&from) = indices.get(dep) {
                graph.add_edge(from, to, ());
            }
        }
    }
    (graph, indices)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeViolation {
    pub from: ModuleId,
    pub to: ModuleId,
    pub from_tier: u32,
    pub to_tier: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierMismatch {
    pub module: ModuleId,
    pub tier: u32,
    pub expected: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TierReport {
    /// Nodes without dependencies whose tier is not 1.
    pub leaf_violations: Vec<ModuleId>,
    /// Edges `a -> b` where `tier(a) <= tier(b)`.
    pub edge_violations: Vec<EdgeViolation>,
    /// `(node, dependency)` pairs whose dependency is not in the store.
    pub dangling: Vec<(ModuleId, ModuleId)>,
    /// Support nodes whose tier differs from an independent longest-path
    /// computation.
    pub oracle_mismatches: Vec<TierMismatch>,
}

impl TierReport {
    pub fn is_clean(&self) -> bool {
        self.violation_count() == 0
    }

    pub fn violation_count(&self) -> usize {
        self.leaf_violations.len()
            + self.edge_violations.len()
            + self.dangling.len()
            + self.oracle_mismatches.len()
    }
}

pub fn check_tiers(store: &GraphStore) -> TierReport {
    let mut report = TierReport::default();

    for node in store.all() {
        if node.is_leaf() && node.tier() != 1 {
            report.leaf_violations.push(node.id().clone());
        }
        for dep in node.dependencies() {
            match store.get(dep) {
                Some(target) if node.tier() <= target.tier() => {
                    report.edge_violations.push(EdgeViolation {
                        from: node.id().clone(),
                        to: dep.clone(),
                        from_tier: node.tier(),
                        to_tier: target.tier(),
                    });
                }
                Some(_) => {}
                None => report.dangling.push((node.id().clone(), dep.clone())),
            }
        }
    }

    report.oracle_mismatches = oracle_mismatches(store);
    report
}

// A cyclic store already shows up as edge violations, so the oracle only
// runs when a topological order exists.
fn oracle_mismatches(store: &GraphStore) -> Vec<TierMismatch> {
    let (graph, _) = to_petgraph(store);
    let Ok(order) = toposort(&graph, None) else {
        return Vec::new();
    };

    let mut expected: HashMap<NodeIndex, u32> = HashMap::new();
    for idx in order {
        let tier = graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|dep| expected.get(&dep).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(1);
        expected.insert(idx, tier);
    }

    let mut mismatches = Vec::new();
    for idx in graph.node_indices() {
        let id = &graph[idx];
        let Some(node) = store.get(id) else {
            continue;
        };
        if node.kind() != NodeKind::Support {
            continue;
        }
        let want = expected.get(&idx).copied().unwrap_or(0);
        if node.tier() != want {
            mismatches.push(TierMismatch {
                module: id.clone(),
                tier: node.tier(),
                expected: want,
            });
        }
    }
    mismatches
}
