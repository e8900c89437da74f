use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use crate::core::node::ModuleId;
use crate::error::{Result, TierGraphError};
use crate::manifest::traits::ManifestSource;

/// Manifest source backed by in-memory tables. Counts every fetch so callers
/// can check that a module was looked up only once.
#[derive(Debug, Default)]
pub struct StaticSource {
    supports: BTreeMap<ModuleId, Vec<ModuleId>>,
    applications: HashMap<ModuleId, Vec<ModuleId>>,
    unavailable: HashSet<ModuleId>,
    fetches: Mutex<HashMap<ModuleId, usize>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, id: &str, deps: &[&str]) -> Self {
        self.supports.insert(ModuleId::new(id), to_ids(deps));
        self
    }

    pub fn with_application(mut self, id: &str, deps: &[&str]) -> Self {
        self.applications.insert(ModuleId::new(id), to_ids(deps));
        self
    }

    /// Lookups of `id` fail as if the backing store were unreachable.
    pub fn with_unavailable(mut self, id: &str) -> Self {
        self.unavailable.insert(ModuleId::new(id));
        self
    }

    pub fn fetch_count(&self, id: &ModuleId) -> usize {
        self.fetches
            .lock()
            .map(|fetches| fetches.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches
            .lock()
            .map(|fetches| fetches.values().sum())
            .unwrap_or(0)
    }

    fn lookup(
        &self,
        table: &dyn Fn(&ModuleId) -> Option<Vec<ModuleId>>,
        id: &ModuleId,
    ) -> Result<Vec<ModuleId>> {
        if let Ok(mut fetches) = self.fetches.lock() {
            *fetches.entry(id.clone()).or_insert(0) += 1;
        }
        if self.unavailable.contains(id) {
            return Err(TierGraphError::SourceUnavailable {
                module: id.clone(),
                reason: "backing store unreachable".to_string(),
            });
        }
        table(id).ok_or_else(|| TierGraphError::NotFound {
            module: id.clone(),
            location: "memory".to_string(),
        })
    }
}

fn to_ids(deps: &[&str]) -> Vec<ModuleId> {
    deps.iter().map(|dep| ModuleId::new(*dep)).collect()
}

impl ManifestSource for StaticSource {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn fetch_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.lookup(&|id| self.supports.get(id).cloned(), module)
    }

    fn fetch_application_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.lookup(&|id| self.applications.get(id).cloned(), module)
    }

    fn catalog_root(&self) -> String {
        "memory".to_string()
    }

    fn list_families(&self, _catalog_root: &str) -> Result<Vec<String>> {
        let mut families: Vec<String> = self
            .supports
            .keys()
            .map(|id| id.family().to_string())
            .collect();
        families.sort();
        families.dedup();
        Ok(families)
    }

    fn list_versions(&self, _catalog_root: &str, family: &str) -> Result<Vec<String>> {
        Ok(self
            .supports
            .keys()
            .filter(|id| id.family() == family)
            .map(|id| id.version().to_string())
            .collect())
    }
}
