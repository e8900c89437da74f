use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::node::ModuleId;
use crate::error::{Result, TierGraphError};
use crate::manifest::release::{parse_dependencies, ReleaseFormat};
use crate::manifest::traits::ManifestSource;

/// Reads manifests from an installed module tree,
/// `<root>/<family>/<version>/<manifest file>`.
#[derive(Debug, Clone)]
pub struct LocalSource {
    pub support_root: PathBuf,
    pub application_root: PathBuf,
    pub manifest_file: String,
    pub format: ReleaseFormat,
}

impl LocalSource {
    pub fn new(support_root: impl Into<PathBuf>, application_root: impl Into<PathBuf>) -> Self {
        Self {
            support_root: support_root.into(),
            application_root: application_root.into(),
            manifest_file: "configure/RELEASE".to_string(),
            format: ReleaseFormat::default(),
        }
    }

    pub fn with_manifest(mut self, manifest_file: impl Into<String>, format: ReleaseFormat) -> Self {
        self.manifest_file = manifest_file.into();
        self.format = format;
        self
    }

    fn read_manifest(&self, root: &Path, module: &ModuleId) -> Result<Vec<ModuleId>> {
        let module_dir = root.join(module.as_str());
        if !module_dir.is_dir() {
            return Err(TierGraphError::NotFound {
                module: module.clone(),
                location: module_dir.display().to_string(),
            });
        }
        let path = module_dir.join(&self.manifest_file);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(parse_dependencies(&content, &self.format)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(TierGraphError::NotFound {
                module: module.clone(),
                location: path.display().to_string(),
            }),
            Err(err) => Err(TierGraphError::SourceUnavailable {
                module: module.clone(),
                reason: format!("failed to read {}: {err}", path.display()),
            }),
        }
    }
}

impl ManifestSource for LocalSource {
    fn id(&self) -> &'static str {
        "local"
    }

    fn fetch_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.read_manifest(&self.support_root, module)
    }

    fn fetch_application_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.read_manifest(&self.application_root, module)
    }

    fn catalog_root(&self) -> String {
        self.support_root.display().to_string()
    }

    fn list_families(&self, catalog_root: &str) -> Result<Vec<String>> {
        list_dirs(Path::new(catalog_root))
    }

    fn list_versions(&self, catalog_root: &str, family: &str) -> Result<Vec<String>> {
        list_dirs(&Path::new(catalog_root).join(family))
    }
}

fn list_dirs(path: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(TierGraphError::CatalogUnavailable {
                location: path.display().to_string(),
                reason: "no such directory".to_string(),
            })
        }
        Err(err) => {
            return Err(TierGraphError::CatalogUnavailable {
                location: path.display().to_string(),
                reason: err.to_string(),
            })
        }
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}
