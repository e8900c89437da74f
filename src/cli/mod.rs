use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::config::resolve::resolve_config_with_override;
use crate::config::Settings;
use crate::core::node::ModuleId;
use crate::core::store::GraphStore;
use crate::error::{Result, TierGraphError};
use crate::graph::builder::{ApplicationTierPolicy, BuildOptions, GraphBuilder};
use crate::graph::ops::check_tiers;
use crate::graph::viz::{self, OutputFormat};
use crate::manifest::{parse_source_kind, source_for, ManifestSource, SourceKind};
use crate::util::progress::{ProgressReporter, DEFAULT_INTERVAL};
use crate::util::{logging, output, parallel};

#[derive(Parser, Debug)]
#[command(name = "tiergraph")]
#[command(
    about = "Tiered dependency graphs for support modules and applications",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Manifest source: local or svn.
    #[arg(long, global = true)]
    pub source: Option<String>,
    #[arg(long, global = true)]
    pub support_root: Option<String>,
    #[arg(long, global = true)]
    pub application_root: Option<String>,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[arg(short, long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub no_color: bool,
    /// Show the discovery spinner for any source.
    #[arg(long, global = true)]
    pub progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and render the graph below one or more seeds.
    Graph(GraphArgs),
    /// Build and render the graph of every module in the catalog.
    All(AllArgs),
    /// Print the dependencies a module declares.
    Deps(DepsArgs),
    /// Build a graph and verify its tiers.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[arg(long = "app")]
    pub apps: Vec<String>,
    #[arg(long = "support")]
    pub supports: Vec<String>,
    #[arg(short = 'f', long)]
    pub format: Option<String>,
    #[arg(long)]
    pub policy: Option<String>,
    /// Accept applications that declare no dependencies.
    #[arg(long)]
    pub allow_empty: bool,
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args, Debug)]
pub struct AllArgs {
    /// Support tree to enumerate and fetch from instead of the configured
    /// support root (a directory, or a repository path for svn).
    #[arg(long)]
    pub catalog: Option<String>,
    /// Parallel manifest fetches; 0 uses every core.
    #[arg(short = 'j', long, env = "TIERGRAPH_JOBS", default_value_t = 1)]
    pub jobs: usize,
    #[arg(short = 'f', long)]
    pub format: Option<String>,
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args, Debug)]
pub struct DepsArgs {
    pub id: String,
    /// Read the manifest from the application root.
    #[arg(long)]
    pub app: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long = "app")]
    pub apps: Vec<String>,
    #[arg(long = "support")]
    pub supports: Vec<String>,
    /// Check the whole catalog.
    #[arg(long)]
    pub all: bool,
    #[arg(long)]
    pub policy: Option<String>,
    #[arg(long)]
    pub allow_empty: bool,
    #[arg(short = 'j', long, env = "TIERGRAPH_JOBS", default_value_t = 1)]
    pub jobs: usize,
}

pub fn run() {
    let cli = Cli::parse();
    if cli.global.no_color {
        output::set_color(false);
    }
    logging::init_logging(cli.global.verbose, !cli.global.no_color);

    if let Err(err) = dispatch(cli) {
        if err.is_warning() {
            output::warn(&format!("warning: {err}"));
            std::process::exit(2);
        }
        output::error(&err.to_string());
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let session = Session::load(&cli.global)?;
    match cli.command {
        Commands::Graph(args) => handle_graph(args, &session),
        Commands::All(args) => handle_all(args, &session),
        Commands::Deps(args) => handle_deps(args, &session),
        Commands::Check(args) => handle_check(args, &session),
    }
}

struct Session {
    settings: Settings,
    source: Box<dyn ManifestSource>,
    show_progress: bool,
    quiet: bool,
}

impl Session {
    fn load(global: &GlobalArgs) -> Result<Self> {
        let cwd = env::current_dir()?;
        let resolved = resolve_config_with_override(&cwd, global.config.clone())?;
        match resolved.path.as_deref() {
            Some(path) => debug!(config = %path.display(), "loaded config"),
            None => debug!("no config file found, using defaults"),
        }

        let mut settings = resolved.settings;
        if let Some(kind) = &global.source {
            settings.source.kind = kind.clone();
        }
        if let Some(root) = &global.support_root {
            settings.local.support_root = root.clone();
        }
        if let Some(root) = &global.application_root {
            settings.local.application_root = root.clone();
        }

        let kind = parse_source_kind(&settings.source.kind)?;
        let source = source_for(&settings)?;
        let show_progress = !global.quiet && (global.progress || kind == SourceKind::Svn);
        Ok(Self {
            settings,
            source,
            show_progress,
            quiet: global.quiet,
        })
    }

    /// The session's source, re-rooted at `catalog` when one is given.
    fn catalog_source(&self, catalog: Option<&str>) -> Result<Box<dyn ManifestSource>> {
        let Some(catalog) = catalog else {
            return Ok(source_for(&self.settings)?);
        };
        let mut settings = self.settings.clone();
        match parse_source_kind(&settings.source.kind)? {
            SourceKind::Local => settings.local.support_root = catalog.to_string(),
            SourceKind::Svn => settings.svn.support_path = catalog.to_string(),
        }
        debug!(catalog, "catalog overrides the support root");
        Ok(source_for(&settings)?)
    }

    fn build_options(&self, policy: Option<&str>, allow_empty: bool) -> Result<BuildOptions> {
        let mut options = BuildOptions::from_config(&self.settings.tiers)?;
        if let Some(policy) = policy {
            options.application_policy = ApplicationTierPolicy::parse(policy)?;
        }
        options.allow_empty_applications |= allow_empty;
        Ok(options)
    }

    fn output_format(&self, format: Option<&str>) -> Result<OutputFormat> {
        Ok(OutputFormat::parse(
            format.unwrap_or(self.settings.render.format.as_str()),
        )?)
    }

    /// Runs `work` with the discovery spinner up when progress is enabled.
    fn with_progress<T>(
        &self,
        counter: Arc<AtomicUsize>,
        work: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let reporter = self
            .show_progress
            .then(|| ProgressReporter::start(counter, DEFAULT_INTERVAL, true));
        let result = work();
        if let Some(reporter) = reporter {
            let total = reporter.finish();
            debug!(total, "progress reporter stopped");
        }
        result
    }

    fn emit(&self, rendered: &str, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                fs::write(path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                if !self.quiet {
                    output::step("wrote", &path.display().to_string());
                }
            }
            None => print!("{rendered}"),
        }
        Ok(())
    }
}

fn seed_ids(values: &[String]) -> Vec<ModuleId> {
    values.iter().map(|value| ModuleId::new(value.as_str())).collect()
}

fn build_seeded(
    session: &Session,
    apps: &[ModuleId],
    supports: &[ModuleId],
    options: BuildOptions,
) -> Result<GraphStore> {
    if apps.is_empty() && supports.is_empty() {
        return Err(TierGraphError::Other(anyhow::anyhow!(
            "no seeds given; pass at least one --app or --support"
        )));
    }
    let mut builder = GraphBuilder::new(session.source.as_ref(), options);
    let counter = builder.discovered_counter();
    session.with_progress(counter, || {
        for app in apps {
            builder.add_application(app)?;
        }
        for support in supports {
            builder.add_support(support)?;
        }
        Ok(())
    })?;
    Ok(builder.finish())
}

fn build_catalog(
    session: &Session,
    catalog: Option<&str>,
    jobs: usize,
    options: BuildOptions,
) -> Result<GraphStore> {
    let source = session.catalog_source(catalog)?;
    let jobs = if jobs == 0 {
        parallel::default_jobs()
    } else {
        jobs
    };
    let mut builder = GraphBuilder::new(source.as_ref(), options);
    let counter = builder.discovered_counter();
    let listed = session.with_progress(counter, || builder.build_catalog(jobs))?;
    if !session.quiet {
        output::info(&format!("tiered {listed} catalog modules"));
    }
    Ok(builder.finish())
}

fn handle_graph(args: GraphArgs, session: &Session) -> Result<()> {
    let options = session.build_options(args.policy.as_deref(), args.allow_empty)?;
    let format = session.output_format(args.format.as_deref())?;
    let apps = seed_ids(&args.apps);
    let supports = seed_ids(&args.supports);
    let store = build_seeded(session, &apps, &supports, options)?;

    let roots: Vec<ModuleId> = apps.into_iter().chain(supports).collect();
    let rendered = viz::render(
        &store,
        format,
        &roots,
        &session.settings.render,
        args.title.as_deref(),
    )?;
    session.emit(&rendered, args.output.as_deref())
}

fn handle_all(args: AllArgs, session: &Session) -> Result<()> {
    let options = session.build_options(None, false)?;
    let format = session.output_format(args.format.as_deref())?;
    let store = build_catalog(session, args.catalog.as_deref(), args.jobs, options)?;
    let rendered = viz::render(
        &store,
        format,
        &[],
        &session.settings.render,
        args.title.as_deref(),
    )?;
    session.emit(&rendered, args.output.as_deref())
}

fn handle_deps(args: DepsArgs, session: &Session) -> Result<()> {
    let id = ModuleId::new(args.id);
    let deps = if args.app {
        session.source.fetch_application_dependencies(&id)?
    } else {
        session.source.fetch_dependencies(&id)?
    };
    for dep in deps {
        println!("{dep}");
    }
    Ok(())
}

fn handle_check(args: CheckArgs, session: &Session) -> Result<()> {
    let options = session.build_options(args.policy.as_deref(), args.allow_empty)?;
    let store = if args.all {
        build_catalog(session, None, args.jobs, options)?
    } else {
        build_seeded(
            session,
            &seed_ids(&args.apps),
            &seed_ids(&args.supports),
            options,
        )?
    };

    let report = check_tiers(&store);
    for id in &report.leaf_violations {
        println!("leaf {id} is not tier 1");
    }
    for edge in &report.edge_violations {
        println!(
            "edge {} (tier {}) -> {} (tier {}) is not increasing",
            edge.from, edge.from_tier, edge.to, edge.to_tier
        );
    }
    for (from, dep) in &report.dangling {
        println!("{from} depends on {dep}, which is not in the graph");
    }
    for mismatch in &report.oracle_mismatches {
        println!(
            "{} has tier {}, longest path gives {}",
            mismatch.module, mismatch.tier, mismatch.expected
        );
    }

    if !report.is_clean() {
        return Err(TierGraphError::Other(anyhow::anyhow!(
            "{} tier violation(s) in {} modules",
            report.violation_count(),
            store.len()
        )));
    }
    println!("{} modules checked, tiers consistent", store.len());
    Ok(())
}
