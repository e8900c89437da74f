pub mod resolve;
pub mod settings;

pub use settings::{
    LocalConfig, ManifestConfig, RenderConfig, Settings, SourceConfig, SvnConfig, TiersConfig,
};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
