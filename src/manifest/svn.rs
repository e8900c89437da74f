use std::process::Command;

use crate::core::node::ModuleId;
use crate::error::{Result, TierGraphError};
use crate::manifest::release::{parse_dependencies, ReleaseFormat};
use crate::manifest::traits::ManifestSource;

const MISSING_PATH_MARKERS: &[&str] = &[
    "E160013",
    "W160013",
    "E200009",
    "path not found",
    "non-existent",
];

/// Reads manifests from the release area of a Subversion repository by
/// shelling out to the `svn` client.
#[derive(Debug, Clone)]
pub struct SvnSource {
    pub url: String,
    pub support_path: String,
    pub application_path: String,
    pub manifest_file: String,
    pub command: String,
    pub format: ReleaseFormat,
}

impl SvnSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            support_path: "release/support".to_string(),
            application_path: "release/ioc".to_string(),
            manifest_file: "configure/RELEASE".to_string(),
            command: "svn".to_string(),
            format: ReleaseFormat::default(),
        }
    }

    pub fn with_paths(
        mut self,
        support_path: impl Into<String>,
        application_path: impl Into<String>,
    ) -> Self {
        self.support_path = support_path.into();
        self.application_path = application_path.into();
        self
    }

    pub fn with_manifest(mut self, manifest_file: impl Into<String>, format: ReleaseFormat) -> Self {
        self.manifest_file = manifest_file.into();
        self.format = format;
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn join_url(&self, parts: &[&str]) -> String {
        let mut url = self.url.trim_end_matches('/').to_string();
        for part in parts {
            let part = part.trim_matches('/');
            if part.is_empty() {
                continue;
            }
            url.push('/');
            url.push_str(part);
        }
        url
    }

    fn run(&self, subcommand: &str, target: &str) -> std::result::Result<String, SvnFailure> {
        let output = Command::new(&self.command)
            .arg(subcommand)
            .arg("--non-interactive")
            .arg(target)
            .output()
            .map_err(|err| {
                SvnFailure::Failed(format!("failed to run {} {subcommand}: {err}", self.command))
            })?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if MISSING_PATH_MARKERS
            .iter()
            .any(|marker| stderr.contains(marker))
        {
            return Err(SvnFailure::Missing);
        }
        Err(SvnFailure::Failed(if stderr.is_empty() {
            format!("{} {subcommand} exited with {}", self.command, output.status)
        } else {
            stderr
        }))
    }

    fn cat_manifest(&self, base: &str, module: &ModuleId) -> Result<Vec<ModuleId>> {
        let target = self.join_url(&[base, module.as_str(), &self.manifest_file]);
        let content = self.run("cat", &target).map_err(|failure| match failure {
            SvnFailure::Missing => TierGraphError::NotFound {
                module: module.clone(),
                location: target.clone(),
            },
            SvnFailure::Failed(reason) => TierGraphError::SourceUnavailable {
                module: module.clone(),
                reason,
            },
        })?;
        Ok(parse_dependencies(&content, &self.format))
    }

    fn list(&self, target: &str) -> Result<Vec<String>> {
        let listing = self
            .run("ls", target)
            .map_err(|failure| TierGraphError::CatalogUnavailable {
                location: target.to_string(),
                reason: match failure {
                    SvnFailure::Missing => "path not found".to_string(),
                    SvnFailure::Failed(reason) => reason,
                },
            })?;
        let mut names: Vec<String> = listing
            .lines()
            .map(str::trim)
            .filter(|line| line.ends_with('/'))
            .map(|line| line.trim_end_matches('/').to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

enum SvnFailure {
    /// stderr carried one of [`MISSING_PATH_MARKERS`].
    Missing,
    Failed(String),
}

impl ManifestSource for SvnSource {
    fn id(&self) -> &'static str {
        "svn"
    }

    fn fetch_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.cat_manifest(&self.support_path, module)
    }

    fn fetch_application_dependencies(&self, module: &ModuleId) -> Result<Vec<ModuleId>> {
        self.cat_manifest(&self.application_path, module)
    }

    fn catalog_root(&self) -> String {
        self.join_url(&[&self.support_path])
    }

    fn list_families(&self, catalog_root: &str) -> Result<Vec<String>> {
        self.list(catalog_root)
    }

    fn list_versions(&self, catalog_root: &str, family: &str) -> Result<Vec<String>> {
        let target = format!("{}/{}", catalog_root.trim_end_matches('/'), family);
        self.list(&target)
    }
}
