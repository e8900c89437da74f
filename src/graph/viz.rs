use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::config::{ConfigError, RenderConfig};
use crate::core::node::{DependencyNode, ModuleId};
use crate::core::store::GraphStore;
use crate::error::Result;
use crate::graph::ops::{direct_dependents, tier_bands};

const EDGE_STYLES: [&str; 4] = ["solid", "dashed", "dotted", "bold"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Tree,
    Dot,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> std::result::Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "tree" => Ok(OutputFormat::Tree),
            "dot" => Ok(OutputFormat::Dot),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::Invalid {
                field: "render.format".to_string(),
                reason: format!("unknown format '{other}'"),
            }),
        }
    }
}

pub fn render(
    store: &GraphStore,
    format: OutputFormat,
    roots: &[ModuleId],
    style: &RenderConfig,
    title: Option<&str>,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(store)),
        OutputFormat::Tree => Ok(render_tree(store, roots)),
        OutputFormat::Dot => Ok(render_dot(store, style, title)),
        OutputFormat::Json => render_json(store),
    }
}

/// One report block per node, applications first.
pub fn render_text(store: &GraphStore) -> String {
    let mut blocks: Vec<String> = store.applications().map(ToString::to_string).collect();
    blocks.extend(store.supports().map(ToString::to_string));
    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Indented dependency trees. Without explicit roots the applications are
/// used, or failing that every node nothing depends on. A subtree printed
/// once is marked `(seen)` afterwards instead of being repeated.
pub fn render_tree(store: &GraphStore, roots: &[ModuleId]) -> String {
    let roots = if roots.is_empty() {
        default_roots(store)
    } else {
        roots.to_vec()
    };

    let mut out = String::new();
    let mut seen = HashSet::new();
    for (idx, root) in roots.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&tree_label(store, root));
        out.push('\n');
        seen.insert(root.clone());
        render_tree_children(store, root, "", &mut seen, &mut out);
    }
    out
}

fn default_roots(store: &GraphStore) -> Vec<ModuleId> {
    let applications: Vec<ModuleId> = store.applications().map(|n| n.id().clone()).collect();
    if !applications.is_empty() {
        return applications;
    }
    let mut roots: Vec<ModuleId> = store
        .all()
        .iter()
        .filter(|node| direct_dependents(store, node.id()).is_empty())
        .map(|node| node.id().clone())
        .collect();
    roots.sort();
    roots
}

fn tree_label(store: &GraphStore, id: &ModuleId) -> String {
    match store.get(id) {
        Some(node) => format!("{} (tier {})", id, node.tier()),
        None => format!("{id} (missing)"),
    }
}

fn render_tree_children(
    store: &GraphStore,
    node: &ModuleId,
    prefix: &str,
    seen: &mut HashSet<ModuleId>,
    out: &mut String,
) {
    let children = store
        .get(node)
        .map(DependencyNode::dependencies)
        .unwrap_or(&[]);
    for (idx, child) in children.iter().enumerate() {
        let is_last = idx + 1 == children.len();
        out.push_str(prefix);
        out.push_str(if is_last { "`-- " } else { "|-- " });
        out.push_str(&tree_label(store, child));

        let has_children = store.get(child).is_some_and(|n| !n.is_leaf());
        if has_children && !seen.insert(child.clone()) {
            out.push_str(" (seen)\n");
            continue;
        }
        out.push('\n');

        let mut next_prefix = prefix.to_string();
        next_prefix.push_str(if is_last { "    " } else { "|   " });
        render_tree_children(store, child, &next_prefix, seen, out);
    }
}

/// Graphviz source with one rank band per tier and edges drawn from each
/// dependency to its dependent.
pub fn render_dot(store: &GraphStore, style: &RenderConfig, title: Option<&str>) -> String {
    let bands = tier_bands(store);
    let lowest = bands.keys().next().copied();
    let highest = bands.keys().next_back().copied();

    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", escape_dot(title.unwrap_or("tiergraph")));
    let _ = write!(out, "  graph [ranksep=\"{}\"", escape_dot(&style.ranksep));
    if let Some(title) = title {
        let _ = write!(
            out,
            ", label=\"{}\", fontname=\"{}\", fontsize=\"{}\"",
            escape_dot(title),
            escape_dot(&style.fontname),
            escape_dot(&style.label_fontsize)
        );
    }
    out.push_str("];\n");

    for (&tier, nodes) in &bands {
        let rank = if Some(tier) == lowest {
            "source"
        } else if Some(tier) == highest {
            "max"
        } else {
            "same"
        };
        let _ = writeln!(out, "  subgraph tier_{tier} {{");
        let _ = writeln!(out, "    rank={rank};");
        let _ = writeln!(
            out,
            "    node [shape=\"{}\", style=\"{}\", fontname=\"{}\", fontsize=\"{}\", color=\"{}\"];",
            escape_dot(&style.shape),
            escape_dot(&style.style),
            escape_dot(&style.fontname),
            escape_dot(&style.fontsize),
            band_color(tier)
        );
        for node in nodes {
            let _ = writeln!(out, "    \"{}\";", escape_dot(node.id().as_str()));
        }
        out.push_str("  }\n");
    }

    for node in store.all() {
        for dep in node.dependencies() {
            let dep_tier = store.get(dep).map(DependencyNode::tier).unwrap_or(0);
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [style={}];",
                escape_dot(dep.as_str()),
                escape_dot(node.id().as_str()),
                edge_style(dep_tier)
            );
        }
    }
    out.push_str("}\n");
    out
}

pub fn edge_style(tier: u32) -> &'static str {
    EDGE_STYLES[tier.saturating_sub(1) as usize % EDGE_STYLES.len()]
}

/// Pastel fill for a tier band; every channel lands in `0x96..=0xFF`.
pub fn band_color(tier: u32) -> String {
    let mut state = tier.wrapping_mul(0x9E37_79B9) ^ 0x85EB_CA6B;
    let mut channel = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        150 + state % 106
    };
    let (r, g, b) = (channel(), channel(), channel());
    format!("#{r:02X}{g:02X}{b:02X}")
}

fn escape_dot(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Serialize)]
struct JsonGraph<'a> {
    max_tier: u32,
    nodes: Vec<JsonNode<'a>>,
}

#[derive(Serialize)]
struct JsonNode<'a> {
    id: &'a str,
    kind: &'static str,
    tier: u32,
    dependencies: Vec<&'a str>,
}

/// Nodes sorted by tier, then id.
pub fn render_json(store: &GraphStore) -> Result<String> {
    let mut nodes: Vec<JsonNode<'_>> = store
        .all()
        .iter()
        .map(|node| JsonNode {
            id: node.id().as_str(),
            kind: node.kind().as_str(),
            tier: node.tier(),
            dependencies: node.dependencies().iter().map(ModuleId::as_str).collect(),
        })
        .collect();
    nodes.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.id.cmp(b.id)));
    let graph = JsonGraph {
        max_tier: nodes.last().map(|node| node.tier).unwrap_or(0),
        nodes,
    };
    let mut json = serde_json::to_string_pretty(&graph).map_err(anyhow::Error::from)?;
    json.push('\n');
    Ok(json)
}
