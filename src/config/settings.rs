use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub svn: SvnConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_support_root")]
    pub support_root: String,
    #[serde(default = "default_application_root")]
    pub application_root: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            support_root: default_support_root(),
            application_root: default_application_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SvnConfig {
    #[serde(default = "default_svn_url")]
    pub url: String,
    #[serde(default = "default_svn_support_path")]
    pub support_path: String,
    #[serde(default = "default_svn_application_path")]
    pub application_path: String,
    #[serde(default = "default_svn_command")]
    pub command: String,
}

impl Default for SvnConfig {
    fn default() -> Self {
        Self {
            url: default_svn_url(),
            support_path: default_svn_support_path(),
            application_path: default_svn_application_path(),
            command: default_svn_command(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestConfig {
    #[serde(default = "default_manifest_file")]
    pub file: String,
    #[serde(default = "default_macro_types")]
    pub macro_types: Vec<String>,
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            file: default_manifest_file(),
            macro_types: default_macro_types(),
            marker: default_marker(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TiersConfig {
    #[serde(default = "default_application_policy")]
    pub application_policy: String,
    #[serde(default)]
    pub allow_empty_applications: bool,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            application_policy: default_application_policy(),
            allow_empty_applications: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_ranksep")]
    pub ranksep: String,
    #[serde(default = "default_shape")]
    pub shape: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_fontname")]
    pub fontname: String,
    #[serde(default = "default_fontsize")]
    pub fontsize: String,
    #[serde(default = "default_label_fontsize")]
    pub label_fontsize: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            ranksep: default_ranksep(),
            shape: default_shape(),
            style: default_style(),
            fontname: default_fontname(),
            fontsize: default_fontsize(),
            label_fontsize: default_label_fontsize(),
        }
    }
}

fn default_source_kind() -> String {
    "local".to_string()
}

fn default_support_root() -> String {
    "/gem_sw/prod/R3.14.12.8/support".to_string()
}

fn default_application_root() -> String {
    "/gem_sw/work/R3.14.12.8/ioc".to_string()
}

fn default_svn_url() -> String {
    "http://sbfsvn02/gemini-sw/gem".to_string()
}

fn default_svn_support_path() -> String {
    "release/support".to_string()
}

fn default_svn_application_path() -> String {
    "release/ioc".to_string()
}

fn default_svn_command() -> String {
    "svn".to_string()
}

fn default_manifest_file() -> String {
    "configure/RELEASE".to_string()
}

fn default_macro_types() -> Vec<String> {
    vec!["P".to_string(), "S".to_string()]
}

fn default_marker() -> String {
    "support".to_string()
}

fn default_application_policy() -> String {
    "outermost".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_ranksep() -> String {
    "1.0".to_string()
}

fn default_shape() -> String {
    "box".to_string()
}

fn default_style() -> String {
    "rounded, filled".to_string()
}

fn default_fontname() -> String {
    "consolas".to_string()
}

fn default_fontsize() -> String {
    "10".to_string()
}

fn default_label_fontsize() -> String {
    "12".to_string()
}
