//! Builds the dependency graph from a repository index
//!
//! Import resolution is textual: a module `a.b` matches any other indexed
//! file whose path contains `a/b`, or contains the last component `b`. This
//! over- and under-matches; it is not a module resolver.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::{CycleLimits, TidemarkConfig};
use crate::core::{ImportKind, ImportRef, RepositoryIndex};
use crate::utils::analysis::graph::{DependencyGraph, EdgeKind, NodeKind, declaration_id};

/// Graph construction options
#[derive(Debug, Clone, Default)]
pub struct GraphOptions {
    pub cycles: CycleLimits,
    /// Also resolve `import a.b` statements, not only `from a.b import c`.
    pub include_direct_imports: bool,
}

impl GraphOptions {
    pub fn from_config(config: &TidemarkConfig) -> Self {
        Self {
            cycles: config.cycles,
            include_direct_imports: config.include_direct_imports,
        }
    }
}

/// Builds the graph with default options.
pub fn build_graph(index: &RepositoryIndex) -> DependencyGraph {
    build_graph_with(index, &GraphOptions::default())
}

pub fn build_graph_with(index: &RepositoryIndex, options: &GraphOptions) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for file in &index.files {
        graph.add_node(file.path.clone(), NodeKind::File, None);

        let declarations = file
            .classes
            .iter()
            .map(|c| (c.name.as_str(), NodeKind::Class))
            .chain(file.functions.iter().map(|f| (f.name.as_str(), NodeKind::Function)));

        for (name, kind) in declarations {
            let id = declaration_id(&file.path, name);
            if graph.add_node(id.clone(), kind, Some(file.path.clone())) {
                graph.add_edge(file.path.clone(), id, EdgeKind::Contains);
            }
        }
    }

    let mut seen: HashSet<(String, String)> = HashSet::new();
    for file in &index.files {
        for import in &file.imports {
            let Some(text) = match_text(import, options.include_direct_imports) else {
                continue;
            };

            for target in resolve_module(text, index) {
                if target == file.path {
                    continue;
                }
                if seen.insert((file.path.clone(), target.to_string())) {
                    graph.add_edge(file.path.clone(), target.to_string(), EdgeKind::Imports);
                }
            }
        }
    }

    debug!(
        "Resolved {} import edges across {} files",
        seen.len(),
        index.files.len()
    );

    graph.detect_cycles(&options.cycles);

    info!(
        "Built dependency graph: {} nodes, {} edges, {} cycles{}",
        graph.node_count(),
        graph.edge_count(),
        graph.cycles().len(),
        if graph.cycles_truncated() {
            " (truncated)"
        } else {
            ""
        }
    );
    if !graph.cyclic_components().is_empty() {
        info!(
            "{} cyclic components too large to enumerate",
            graph.cyclic_components().len()
        );
    }

    graph
}

/// The text an import is matched on, or `None` if it is not resolved.
///
/// `from . import x` has no module text, so the imported name stands in.
fn match_text(import: &ImportRef, include_direct: bool) -> Option<&str> {
    match import.kind {
        ImportKind::Direct if !include_direct => None,
        ImportKind::Direct => Some(import.module.as_str()).filter(|m| !m.is_empty()),
        ImportKind::From if !import.module.is_empty() => Some(import.module.as_str()),
        ImportKind::From => import.imported_name.as_deref().filter(|n| *n != "*"),
    }
}

/// Indexed file paths that `module` plausibly refers to.
pub fn resolve_module<'a>(module: &str, index: &'a RepositoryIndex) -> Vec<&'a str> {
    let as_path = module.replace('.', "/");
    let last = module.rsplit('.').next().unwrap_or(module);
    if last.is_empty() {
        return Vec::new();
    }

    index
        .file_paths()
        .filter(|path| path.contains(&as_path) || path.contains(last))
        .collect()
}
