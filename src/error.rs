use thiserror::Error;

use crate::config::ConfigError;
use crate::core::node::ModuleId;

#[derive(Debug, Error)]
pub enum TierGraphError {
    #[error("no manifest for {module} at {location}")]
    NotFound { module: ModuleId, location: String },
    #[error("manifest source unavailable for {module}: {reason}")]
    SourceUnavailable { module: ModuleId, reason: String },
    #[error("cannot list catalog at {location}: {reason}")]
    CatalogUnavailable { location: String, reason: String },
    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<ModuleId> },
    #[error("{module} declares no dependencies")]
    EmptyDependencySet { module: ModuleId },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TierGraphError {
    /// Warning-class conditions describe a legitimate but suspicious graph
    /// shape rather than a broken one.
    pub fn is_warning(&self) -> bool {
        matches!(self, TierGraphError::EmptyDependencySet { .. })
    }

    /// The module the failure is attributed to, when there is one.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            TierGraphError::NotFound { module, .. }
            | TierGraphError::SourceUnavailable { module, .. }
            | TierGraphError::EmptyDependencySet { module } => Some(module),
            TierGraphError::CyclicDependency { cycle } => cycle.first(),
            _ => None,
        }
    }
}

fn format_cycle(cycle: &[ModuleId]) -> String {
    cycle
        .iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, TierGraphError>;
