use crate::config::{ConfigError, Settings};

pub mod local;
#[cfg(test)]
pub mod memory;
pub mod release;
pub mod svn;
pub mod traits;

pub use traits::ManifestSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Svn,
}

pub fn parse_source_kind(value: &str) -> Result<SourceKind, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "local" => Ok(SourceKind::Local),
        "svn" => Ok(SourceKind::Svn),
        other => Err(ConfigError::Invalid {
            field: "source.kind".to_string(),
            reason: format!("unknown manifest source '{other}'"),
        }),
    }
}

pub fn release_format(settings: &Settings) -> release::ReleaseFormat {
    release::ReleaseFormat {
        macro_types: settings.manifest.macro_types.clone(),
        marker: settings.manifest.marker.clone(),
    }
}

pub fn source_for(settings: &Settings) -> Result<Box<dyn ManifestSource>, ConfigError> {
    let format = release_format(settings);
    match parse_source_kind(&settings.source.kind)? {
        SourceKind::Local => Ok(Box::new(
            local::LocalSource::new(
                &settings.local.support_root,
                &settings.local.application_root,
            )
            .with_manifest(&settings.manifest.file, format),
        )),
        SourceKind::Svn => Ok(Box::new(
            svn::SvnSource::new(&settings.svn.url)
                .with_paths(&settings.svn.support_path, &settings.svn.application_path)
                .with_manifest(&settings.manifest.file, format)
                .with_command(&settings.svn.command),
        )),
    }
}
