use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, TiersConfig};
use crate::core::node::{DependencyNode, ModuleId, NodeKind, TraversalState};
use crate::core::store::GraphStore;
use crate::error::{Result, TierGraphError};
use crate::manifest::ManifestSource;
use crate::util::parallel::map_in_parallel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationTierPolicy {
    /// Applications sit one tier above the highest support module.
    Outermost,
    /// Applications keep their own longest-path tier.
    LongestPath,
}

impl ApplicationTierPolicy {
    pub fn parse(value: &str) -> std::result::Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "outermost" => Ok(ApplicationTierPolicy::Outermost),
            "longest-path" | "longest_path" => Ok(ApplicationTierPolicy::LongestPath),
            other => Err(ConfigError::Invalid {
                field: "tiers.application_policy".to_string(),
                reason: format!("unknown policy '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub application_policy: ApplicationTierPolicy,
    pub allow_empty_applications: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            application_policy: ApplicationTierPolicy::Outermost,
            allow_empty_applications: false,
        }
    }
}

impl BuildOptions {
    pub fn from_config(tiers: &TiersConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            application_policy: ApplicationTierPolicy::parse(&tiers.application_policy)?,
            allow_empty_applications: tiers.allow_empty_applications,
        })
    }
}

/// Discovers modules through a [`ManifestSource`] and assigns each one its
/// tier: 1 for modules without dependencies, otherwise one more than the
/// highest tier among its dependencies.
///
/// Each manifest is fetched once and each tier computed once, no matter how
/// many paths reach a module. A dependency cycle aborts the build with
/// [`TierGraphError::CyclicDependency`].
pub struct GraphBuilder<'a> {
    source: &'a dyn ManifestSource,
    options: BuildOptions,
    store: GraphStore,
    path: Vec<usize>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(source: &'a dyn ManifestSource, options: BuildOptions) -> Self {
        Self {
            source,
            options,
            store: GraphStore::new(),
            path: Vec::new(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn discovered_counter(&self) -> Arc<AtomicUsize> {
        self.store.discovered_counter()
    }

    /// Tier of `id`, creating and tiering everything beneath it as needed.
    pub fn assign_tier(&mut self, id: &ModuleId) -> Result<u32> {
        let result = self
            .store
            .get_or_create_index(id, NodeKind::Support, self.source)
            .and_then(|idx| self.tier_of(idx));
        if result.is_err() {
            self.abandon_path();
        }
        result
    }

    pub fn add_support(&mut self, id: &ModuleId) -> Result<u32> {
        let tier = self.assign_tier(id)?;
        info!(module = %id, tier, nodes = self.store.len(), "support graph built");
        Ok(tier)
    }

    /// Seeds an application and tiers everything it depends on. Returns the
    /// application's longest-path tier; the outermost policy is applied by
    /// [`GraphBuilder::finish`].
    pub fn add_application(&mut self, id: &ModuleId) -> Result<u32> {
        let idx = match self.store.index_of(id) {
            Some(idx) => {
                if self.store.node(idx).kind() != NodeKind::Application {
                    warn!(module = %id, "already known as a support module, keeping its kind");
                }
                idx
            }
            None => {
                let deps = self.source.fetch_application_dependencies(id)?;
                debug!(module = %id, deps = deps.len(), "fetched application manifest");
                if deps.is_empty() && !self.options.allow_empty_applications {
                    return Err(TierGraphError::EmptyDependencySet { module: id.clone() });
                }
                self.store
                    .insert(DependencyNode::new(id.clone(), NodeKind::Application, deps))
            }
        };
        let result = self.tier_of(idx);
        if result.is_err() {
            self.abandon_path();
        }
        let tier = result?;
        info!(module = %id, tier, nodes = self.store.len(), "application graph built");
        Ok(tier)
    }

    /// Tiers every `family/version` listed under the source's catalog root,
    /// the same root its support manifests are fetched from. With `jobs > 1`
    /// the manifests not yet in the store are fetched in parallel first.
    /// Returns the number of catalog entries.
    pub fn build_catalog(&mut self, jobs: usize) -> Result<usize> {
        let root = self.source.catalog_root();
        let mut ids = Vec::new();
        for family in self.source.list_families(&root)? {
            for version in self.source.list_versions(&root, &family)? {
                ids.push(ModuleId::from_parts(&family, &version));
            }
        }
        debug!(catalog = %root, modules = ids.len(), "catalog listed");

        if jobs > 1 {
            let pending: Vec<ModuleId> = ids
                .iter()
                .filter(|id| !self.store.contains(id))
                .cloned()
                .collect();
            let source = self.source;
            let fetched = map_in_parallel(pending, jobs, |id| {
                let deps = source.fetch_dependencies(&id);
                (id, deps)
            });
            for (id, deps) in fetched {
                let deps = deps?;
                self.store
                    .insert(DependencyNode::new(id, NodeKind::Support, deps));
            }
        }

        for id in &ids {
            self.assign_tier(id)?;
        }
        info!(catalog = %root, modules = ids.len(), nodes = self.store.len(), "catalog graph built");
        Ok(ids.len())
    }

    /// Applies the application tier policy and hands over the graph.
    pub fn finish(mut self) -> GraphStore {
        if self.options.application_policy == ApplicationTierPolicy::Outermost {
            let max_support = self
                .store
                .supports()
                .map(DependencyNode::tier)
                .max()
                .unwrap_or(0);
            let applications: Vec<usize> = (0..self.store.len())
                .filter(|&idx| self.store.node(idx).kind() == NodeKind::Application)
                .collect();
            for idx in applications {
                self.store.node_mut(idx).override_tier(max_support + 1);
            }
        }
        self.store
    }

    fn tier_of(&mut self, idx: usize) -> Result<u32> {
        let node = self.store.node(idx);
        match node.state() {
            TraversalState::Finalized => {
                trace!(module = %node.id(), tier = node.tier(), "already tiered");
                return Ok(node.tier());
            }
            TraversalState::InProgress => return Err(self.cycle_error(idx)),
            TraversalState::Unvisited => {}
        }

        let deps = node.dependencies().to_vec();
        self.store.node_mut(idx).mark_in_progress();
        self.path.push(idx);

        let mut tier = 1;
        for dep in &deps {
            let dep_idx = self
                .store
                .get_or_create_index(dep, NodeKind::Support, self.source)?;
            let dep_tier = self.tier_of(dep_idx)?;
            tier = tier.max(dep_tier + 1);
        }

        self.path.pop();
        self.store.node_mut(idx).finalize(tier);
        trace!(module = %self.store.node(idx).id(), tier, "tiered");
        Ok(tier)
    }

    fn cycle_error(&self, reentered: usize) -> TierGraphError {
        let start = self
            .path
            .iter()
            .position(|&idx| idx == reentered)
            .unwrap_or(0);
        let mut cycle: Vec<ModuleId> = self.path[start..]
            .iter()
            .map(|&idx| self.store.node(idx).id().clone())
            .collect();
        cycle.push(self.store.node(reentered).id().clone());
        TierGraphError::CyclicDependency { cycle }
    }

    fn abandon_path(&mut self) {
        for idx in std::mem::take(&mut self.path) {
            self.store.node_mut(idx).reset_if_in_progress();
        }
    }
}

/// Builds the graph for a set of application seeds in one call.
pub fn build_application_graph(
    source: &dyn ManifestSource,
    applications: &[ModuleId],
    options: BuildOptions,
) -> Result<GraphStore> {
    let mut builder = GraphBuilder::new(source, options);
    for app in applications {
        builder.add_application(app)?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::core::node::{ModuleId, NodeKind};
    use crate::core::store::GraphStore;
    use crate::error::TierGraphError;
    use crate::graph::builder::{
        build_application_graph, ApplicationTierPolicy, BuildOptions, GraphBuilder,
    };
    use crate::manifest::local::LocalSource;
    use crate::manifest::memory::StaticSource;

    fn tier(store: &GraphStore, id: &str) -> u32 {
        store
            .get(&ModuleId::new(id))
            .unwrap_or_else(|| panic!("{id} missing from store"))
            .tier()
    }

    fn longest_path() -> BuildOptions {
        BuildOptions {
            application_policy: ApplicationTierPolicy::LongestPath,
            ..BuildOptions::default()
        }
    }

    fn chain_source() -> StaticSource {
        StaticSource::new()
            .with_application("app/x", &["lib/a", "lib/b"])
            .with_module("lib/a", &[])
            .with_module("lib/b", &["lib/a"])
    }

    #[test]
    fn leaf_modules_are_tier_one() {
        let source = StaticSource::new().with_module("lib/a", &[]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        assert_eq!(builder.assign_tier(&ModuleId::new("lib/a")).expect("tier"), 1);
    }

    #[test]
    fn application_keeps_longest_path_tier_under_longest_path_policy() {
        let source = chain_source();
        let store = build_application_graph(&source, &[ModuleId::new("app/x")], longest_path())
            .expect("build");
        assert_eq!(tier(&store, "lib/a"), 1);
        assert_eq!(tier(&store, "lib/b"), 2);
        assert_eq!(tier(&store, "app/x"), 3);
    }

    #[test]
    fn application_sits_above_every_support_under_outermost_policy() {
        let source = StaticSource::new()
            .with_application("app/x", &["lib/a", "lib/b"])
            .with_application("app/y", &["lib/a"])
            .with_module("lib/a", &[])
            .with_module("lib/b", &["lib/a"]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        builder.add_application(&ModuleId::new("app/x")).expect("app/x");
        assert_eq!(builder.add_application(&ModuleId::new("app/y")).expect("app/y"), 2);
        let store = builder.finish();

        assert_eq!(tier(&store, "lib/b"), 2);
        assert_eq!(tier(&store, "app/x"), 3);
        assert_eq!(tier(&store, "app/y"), 3);
    }

    #[test]
    fn outermost_override_ignores_how_shallow_the_application_is() {
        let source = StaticSource::new()
            .with_application("app/x", &["lib/t1", "lib/t3"])
            .with_module("lib/t1", &[])
            .with_module("lib/t2", &["lib/t1"])
            .with_module("lib/t3", &["lib/t2"])
            .with_application("app/shallow", &["lib/t1"]);
        let store = build_application_graph(
            &source,
            &[ModuleId::new("app/x"), ModuleId::new("app/shallow")],
            BuildOptions::default(),
        )
        .expect("build");
        assert_eq!(tier(&store, "lib/t3"), 3);
        assert_eq!(tier(&store, "app/x"), 4);
        assert_eq!(tier(&store, "app/shallow"), 4);
    }

    #[test]
    fn two_node_cycle_is_reported_not_recursed() {
        let source = StaticSource::new()
            .with_module("lib/a", &["lib/b"])
            .with_module("lib/b", &["lib/a"]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        let err = builder
            .assign_tier(&ModuleId::new("lib/a"))
            .expect_err("cycle");
        match err {
            TierGraphError::CyclicDependency { cycle } => {
                let names: Vec<&str> = cycle.iter().map(ModuleId::as_str).collect();
                assert_eq!(names, vec!["lib/a", "lib/b", "lib/a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let source = StaticSource::new().with_module("lib/a", &["lib/a"]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        let err = builder
            .assign_tier(&ModuleId::new("lib/a"))
            .expect_err("cycle");
        assert!(matches!(err, TierGraphError::CyclicDependency { cycle } if cycle.len() == 2));
    }

    #[test]
    fn cycle_below_an_application_reports_only_the_loop() {
        let source = StaticSource::new()
            .with_application("app/x", &["lib/top"])
            .with_module("lib/top", &["lib/a"])
            .with_module("lib/a", &["lib/b"])
            .with_module("lib/b", &["lib/c"])
            .with_module("lib/c", &["lib/a"]);
        let err = build_application_graph(&source, &[ModuleId::new("app/x")], BuildOptions::default())
            .expect_err("cycle");
        match err {
            TierGraphError::CyclicDependency { cycle } => {
                let names: Vec<&str> = cycle.iter().map(ModuleId::as_str).collect();
                assert_eq!(names, vec!["lib/a", "lib/b", "lib/c", "lib/a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn builder_is_usable_after_an_aborted_traversal() {
        let source = StaticSource::new()
            .with_module("lib/a", &["lib/b"])
            .with_module("lib/b", &["lib/a"])
            .with_module("lib/ok", &["lib/leaf"])
            .with_module("lib/leaf", &[]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        assert!(builder.assign_tier(&ModuleId::new("lib/a")).is_err());
        assert_eq!(builder.assign_tier(&ModuleId::new("lib/ok")).expect("ok"), 2);
        assert!(matches!(
            builder.assign_tier(&ModuleId::new("lib/b")),
            Err(TierGraphError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn diamond_fetches_and_tiers_shared_dependency_once() {
        let source = StaticSource::new()
            .with_application("app/x", &["lib/a", "lib/b"])
            .with_module("lib/a", &["lib/common"])
            .with_module("lib/b", &["lib/common"])
            .with_module("lib/common", &[]);
        let store = build_application_graph(&source, &[ModuleId::new("app/x")], longest_path())
            .expect("build");

        assert_eq!(source.fetch_count(&ModuleId::new("lib/common")), 1);
        assert_eq!(source.total_fetches(), 4);
        assert_eq!(tier(&store, "lib/common"), 1);
        assert_eq!(tier(&store, "lib/a"), 2);
        assert_eq!(tier(&store, "lib/b"), 2);
        assert_eq!(tier(&store, "app/x"), 3);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn stacked_diamonds_stay_linear_in_fetches() {
        let mut source = StaticSource::new().with_module("lib/l0", &[]);
        let layers = 24;
        for layer in 1..=layers {
            let below = format!("lib/l{}", layer - 1);
            let left = format!("lib/left{layer}");
            let right = format!("lib/right{layer}");
            source = source
                .with_module(&left, &[below.as_str()])
                .with_module(&right, &[below.as_str()])
                .with_module(&format!("lib/l{layer}"), &[left.as_str(), right.as_str()]);
        }
        let top = format!("lib/l{layers}");
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        let tier = builder.assign_tier(&ModuleId::new(top)).expect("tier");

        assert_eq!(tier, 2 * layers + 1);
        assert_eq!(source.total_fetches(), 3 * layers as usize + 1);
    }

    #[test]
    fn tiers_do_not_depend_on_declaration_order() {
        let forward = StaticSource::new()
            .with_application("app/x", &["lib/a", "lib/b", "lib/c"])
            .with_module("lib/a", &[])
            .with_module("lib/b", &["lib/a"])
            .with_module("lib/c", &["lib/b", "lib/a"]);
        let reversed = StaticSource::new()
            .with_application("app/x", &["lib/c", "lib/b", "lib/a"])
            .with_module("lib/a", &[])
            .with_module("lib/b", &["lib/a"])
            .with_module("lib/c", &["lib/a", "lib/b"]);

        let seeds = [ModuleId::new("app/x")];
        let first = build_application_graph(&forward, &seeds, longest_path()).expect("first");
        let again = build_application_graph(&forward, &seeds, longest_path()).expect("again");
        let other = build_application_graph(&reversed, &seeds, longest_path()).expect("other");

        for id in ["lib/a", "lib/b", "lib/c", "app/x"] {
            assert_eq!(tier(&first, id), tier(&again, id), "{id}");
            assert_eq!(tier(&first, id), tier(&other, id), "{id}");
        }
        assert_eq!(tier(&first, "app/x"), 4);
    }

    #[test]
    fn missing_dependency_aborts_the_build() {
        let source = StaticSource::new()
            .with_application("app/x", &["lib/a"])
            .with_module("lib/a", &["lib/ghost"]);
        let err = build_application_graph(&source, &[ModuleId::new("app/x")], BuildOptions::default())
            .expect_err("missing");
        match err {
            TierGraphError::NotFound { module, .. } => assert_eq!(module.as_str(), "lib/ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unavailable_source_aborts_the_build() {
        let source = StaticSource::new()
            .with_module("lib/a", &["lib/b"])
            .with_module("lib/b", &[])
            .with_unavailable("lib/b");
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        let err = builder
            .assign_tier(&ModuleId::new("lib/a"))
            .expect_err("unavailable");
        assert!(matches!(err, TierGraphError::SourceUnavailable { module, .. } if module.as_str() == "lib/b"));
    }

    #[test]
    fn empty_application_is_rejected_unless_allowed() {
        let source = StaticSource::new().with_application("app/empty", &[]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        let err = builder
            .add_application(&ModuleId::new("app/empty"))
            .expect_err("empty");
        assert!(err.is_warning());
        assert!(builder.store().is_empty());

        let options = BuildOptions {
            allow_empty_applications: true,
            ..BuildOptions::default()
        };
        let store = build_application_graph(&source, &[ModuleId::new("app/empty")], options)
            .expect("tolerated");
        assert_eq!(tier(&store, "app/empty"), 1);
        assert_eq!(
            store.get(&ModuleId::new("app/empty")).map(|n| n.kind()),
            Some(NodeKind::Application)
        );
    }

    #[test]
    fn catalog_build_tiers_every_listed_module_once() {
        let source = StaticSource::new()
            .with_module("asyn/4-21", &[])
            .with_module("busy/1-7-1", &["asyn/4-21"])
            .with_module("busy/1-7-2", &["asyn/4-21"])
            .with_module("tcslib/1-0-23", &["busy/1-7-2", "slalib/1-8-0"])
            .with_module("slalib/1-8-0", &[]);

        for jobs in [1, 4] {
            let mut builder = GraphBuilder::new(&source, BuildOptions::default());
            let listed = builder.build_catalog(jobs).expect("catalog");
            let store = builder.finish();
            assert_eq!(listed, 5);
            assert_eq!(store.len(), 5);
            assert!(store.all().iter().all(|node| node.is_finalized()));
            assert_eq!(tier(&store, "asyn/4-21"), 1);
            assert_eq!(tier(&store, "busy/1-7-1"), 2);
            assert_eq!(tier(&store, "tcslib/1-0-23"), 3);
            let order: Vec<&str> = store.all().iter().map(|n| n.id().as_str()).collect();
            assert_eq!(order[0], "asyn/4-21");
        }
        assert_eq!(source.total_fetches(), 10);
    }

    #[test]
    fn catalog_build_skips_modules_already_discovered() {
        let source = StaticSource::new()
            .with_application("app/x", &["lib/a"])
            .with_module("lib/a", &["lib/b"])
            .with_module("lib/b", &[]);
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        builder.add_application(&ModuleId::new("app/x")).expect("app");
        builder.build_catalog(2).expect("catalog");
        let store = builder.finish();

        assert_eq!(source.fetch_count(&ModuleId::new("lib/a")), 1);
        assert_eq!(source.fetch_count(&ModuleId::new("lib/b")), 1);
        assert_eq!(tier(&store, "app/x"), 3);
    }

    #[test]
    fn catalog_build_lists_and_fetches_from_the_same_tree() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let root = std::env::temp_dir().join(format!(
            "tiergraph-catalog-tree-{}-{nanos}",
            std::process::id()
        ));
        let write = |base: &Path, id: &str, body: &str| {
            let configure = base.join(id).join("configure");
            fs::create_dir_all(&configure).expect("create configure dir");
            fs::write(configure.join("RELEASE"), body).expect("write RELEASE");
        };
        let support = root.join("support");
        let other = root.join("other");
        write(&support, "slalib/1-8-0", "");
        write(&other, "asyn/4-21", "");
        write(&other, "busy/1-7-1", "ASYN = $(P)/asyn/4-21\n");

        let source = LocalSource::new(&other, root.join("ioc"));
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        assert_eq!(builder.build_catalog(1).expect("catalog"), 2);
        let store = builder.finish();
        assert_eq!(tier(&store, "asyn/4-21"), 1);
        assert_eq!(tier(&store, "busy/1-7-1"), 2);
        assert!(store.get(&ModuleId::new("slalib/1-8-0")).is_none());

        fs::create_dir_all(other.join("stray")).expect("create empty family");
        let source = LocalSource::new(&other, root.join("ioc"));
        let mut builder = GraphBuilder::new(&source, BuildOptions::default());
        assert_eq!(builder.build_catalog(1).expect("empty family lists nothing"), 2);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(
            ApplicationTierPolicy::parse("Outermost").expect("outermost"),
            ApplicationTierPolicy::Outermost
        );
        assert_eq!(
            ApplicationTierPolicy::parse("longest-path").expect("longest"),
            ApplicationTierPolicy::LongestPath
        );
        assert!(ApplicationTierPolicy::parse("shortest").is_err());
    }
}
