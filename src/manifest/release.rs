//! Parser for `configure/RELEASE` style manifests.
//!
//! A manifest is a list of `NAME = value` macro definitions. Definitions whose
//! value starts with one of the configured type macros (`$(P)`, `$(S)`, ...)
//! point at another module release and become dependencies.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::core::node::ModuleId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseLine {
    Blank,
    Comment(String),
    Definition { name: String, value: String },
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ReleaseFormat {
    pub macro_types: Vec<String>,
    pub marker: String,
}

impl Default for ReleaseFormat {
    fn default() -> Self {
        Self {
            macro_types: vec!["P".to_string(), "S".to_string()],
            marker: "support".to_string(),
        }
    }
}

fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$").expect("valid definition regex")
    })
}

fn macro_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$[({]([A-Za-z0-9_]+)[)}]").expect("valid macro regex"))
}

fn type_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$[({]([A-Za-z0-9_]+)[)}](.*)$").expect("valid prefix regex"))
}

pub fn parse_release(content: &str) -> Vec<ReleaseLine> {
    content.lines().map(parse_line).collect()
}

fn parse_line(line: &str) -> ReleaseLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReleaseLine::Blank;
    }
    if let Some(comment) = trimmed.strip_prefix('#') {
        return ReleaseLine::Comment(comment.trim().to_string());
    }
    let code = match trimmed.split_once('#') {
        Some((code, _)) => code,
        None => trimmed,
    };
    match definition_re().captures(code) {
        Some(caps) => ReleaseLine::Definition {
            name: caps[1].to_string(),
            value: caps[2].to_string(),
        },
        None => ReleaseLine::Other(trimmed.to_string()),
    }
}

/// Substitutes `$(NAME)` and `${NAME}` from `macros`; unknown names stay.
pub fn expand_macros(value: &str, macros: &HashMap<String, String>) -> String {
    macro_re()
        .replace_all(value, |caps: &Captures| match macros.get(&caps[1]) {
            Some(expanded) => expanded.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

pub fn dependency_ids(lines: &[ReleaseLine], format: &ReleaseFormat) -> Vec<ModuleId> {
    let mut macros: HashMap<String, String> = HashMap::new();
    let mut deps: Vec<ModuleId> = Vec::new();

    for line in lines {
        let (name, value) = match line {
            ReleaseLine::Definition { name, value } => (name, value),
            _ => continue,
        };
        if let Some(rest) = typed_remainder(value, format) {
            let expanded = expand_macros(rest, &macros);
            let id = extract_module_path(&expanded, &format.marker);
            if !id.is_empty() {
                let id = ModuleId::new(id);
                if !deps.contains(&id) {
                    deps.push(id);
                }
            }
        }
        let expanded = expand_macros(value, &macros);
        macros.insert(name.clone(), expanded);
    }

    deps
}

pub fn parse_dependencies(content: &str, format: &ReleaseFormat) -> Vec<ModuleId> {
    dependency_ids(&parse_release(content), format)
}

fn typed_remainder<'a>(value: &'a str, format: &ReleaseFormat) -> Option<&'a str> {
    let caps = type_prefix_re().captures(value)?;
    let macro_type = caps.get(1)?.as_str();
    if !format.macro_types.iter().any(|t| t == macro_type) {
        return None;
    }
    caps.get(2).map(|rest| rest.as_str())
}

fn extract_module_path<'a>(path: &'a str, marker: &str) -> &'a str {
    let path = path.trim();
    let needle = format!("{marker}/");
    let mut search_end = path.len();
    while let Some(pos) = path[..search_end].rfind(&needle) {
        if pos == 0 || path[..pos].ends_with('/') {
            return path[pos + needle.len()..].trim_matches('/');
        }
        search_end = pos;
    }
    path.trim_matches('/')
}
