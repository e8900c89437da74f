use std::env;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, Settings};

const CONFIG_FILE: &str = "tiergraph.toml";
const CONFIG_DIR: &str = ".tiergraph";

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// `None` when no file was found and built-in defaults are in use.
    pub path: Option<PathBuf>,
    pub settings: Settings,
}

pub fn resolve_config(start: impl AsRef<Path>) -> Result<ResolvedConfig, ConfigError> {
    resolve_config_with_override(start, None)
}

pub fn resolve_config_with_override(
    start: impl AsRef<Path>,
    config_path: Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let path = match config_path {
        Some(path) => Some(path),
        None => match env::var("TIERGRAPH_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => find_config_from(start.as_ref()),
        },
    };

    let mut settings = match path.as_deref() {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings, |key| env::var(key).ok());

    Ok(ResolvedConfig { path, settings })
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(kind) = lookup("TIERGRAPH_SOURCE") {
        settings.source.kind = kind;
    }
    if let Some(root) = lookup("TIERGRAPH_SUPPORT_ROOT") {
        settings.local.support_root = root;
    }
    if let Some(root) = lookup("TIERGRAPH_APPLICATION_ROOT") {
        settings.local.application_root = root;
    }
    if let Some(url) = lookup("TIERGRAPH_SVN_URL") {
        settings.svn.url = url;
    }
}

fn find_config_from(start: &Path) -> Option<PathBuf> {
    for ancestor in start.ancestors() {
        let direct = ancestor.join(CONFIG_FILE);
        if direct.is_file() {
            return Some(direct);
        }
        let nested = ancestor.join(CONFIG_DIR).join("config.toml");
        if nested.is_file() {
            return Some(nested);
        }
    }
    None
}
