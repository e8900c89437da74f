use std::collections::HashSet;
use std::fmt;

/// Identifier of one module release, `<family>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_parts(family: &str, version: &str) -> Self {
        Self(format!("{family}/{version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last `/`. Families may be nested (`ag/cp`).
    pub fn family(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((family, _)) => family,
            None => &self.0,
        }
    }

    pub fn version(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, version)) => version,
            None => "",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Support,
    Application,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Support => "support",
            NodeKind::Application => "application",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Unvisited,
    InProgress,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct DependencyNode {
    id: ModuleId,
    kind: NodeKind,
    dependencies: Vec<ModuleId>,
    tier: u32,
    state: TraversalState,
}

impl DependencyNode {
    pub fn new(id: ModuleId, kind: NodeKind, dependencies: Vec<ModuleId>) -> Self {
        let mut seen = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect();
        Self {
            id,
            kind,
            dependencies,
            tier: 0,
            state: TraversalState::Unvisited,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    /// `0` until the node is finalized.
    pub fn tier(&self) -> u32 {
        self.tier
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    pub fn is_leaf(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == TraversalState::Finalized
    }

    pub(crate) fn mark_in_progress(&mut self) {
        self.state = TraversalState::InProgress;
    }

    pub(crate) fn finalize(&mut self, tier: u32) {
        debug_assert!(tier > 0, "tier 0 is reserved for unfinalized nodes");
        self.tier = tier;
        self.state = TraversalState::Finalized;
    }

    /// Drops an in-progress marker left behind by an aborted traversal.
    pub(crate) fn reset_if_in_progress(&mut self) {
        if self.state == TraversalState::InProgress {
            self.state = TraversalState::Unvisited;
        }
    }

    /// Replaces a finalized tier. Only the application post-pass does this.
    pub(crate) fn override_tier(&mut self, tier: u32) {
        self.tier = tier;
        self.state = TraversalState::Finalized;
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== Node: {} =====", self.id)?;
        write!(f, "Node Tier Level: {}", self.tier)?;
        if self.dependencies.is_empty() {
            return Ok(());
        }
        write!(f, "\nNode dependencies:")?;
        for dep in &self.dependencies {
            write!(f, "\n{dep}")?;
        }
        Ok(())
    }
}
