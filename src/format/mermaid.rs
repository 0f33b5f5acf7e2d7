//! Mermaid diagram of the file-level import graph

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::utils::analysis::graph::DependencyGraph;

pub const MAX_DIAGRAM_NODES: usize = 200;

/// Generates a Mermaid flowchart: one node per file, grouped into
/// directory subgraphs, one arrow per `imports` edge. Edges on a reported
/// cycle or inside a large cyclic component are drawn in red.
pub fn generate_diagram(graph: &DependencyGraph) -> String {
    let files: Vec<&str> = graph.file_nodes().map(|n| n.id.as_str()).collect();

    if files.len() > MAX_DIAGRAM_NODES {
        return format!(
            "%% Graph too large to display ({} files). Limit is {}.",
            files.len(),
            MAX_DIAGRAM_NODES
        );
    }
    if files.is_empty() {
        return String::new();
    }

    let mut lines = vec!["graph TD;".to_string()];

    let path_to_id: HashMap<&str, String> = files
        .iter()
        .enumerate()
        .map(|(i, path)| (*path, format!("N{}", i)))
        .collect();

    #[derive(Default)]
    struct DirNode<'a> {
        files: Vec<&'a str>,
        subdirs: BTreeMap<&'a str, DirNode<'a>>,
    }

    let mut tree = DirNode::default();
    for path in &files {
        let components: Vec<&str> = path.split('/').collect();
        if let Some((_name, parents)) = components.split_last() {
            let mut current = &mut tree;
            for dir in parents {
                current = current.subdirs.entry(*dir).or_default();
            }
            current.files.push(*path);
        }
    }

    fn write_tree(
        node: &DirNode<'_>,
        prefix: &str,
        lines: &mut Vec<String>,
        path_to_id: &HashMap<&str, String>,
        indent: usize,
    ) {
        let spaces = " ".repeat(indent);

        for file in &node.files {
            if let Some(id) = path_to_id.get(file) {
                let name = file.rsplit('/').next().unwrap_or(*file).replace('"', "'");
                lines.push(format!("{}{}[\"{}\"]", spaces, id, name));
            }
        }

        for (dirname, subdir) in &node.subdirs {
            let full = if prefix.is_empty() {
                dirname.to_string()
            } else {
                format!("{}/{}", prefix, dirname)
            };
            let sub_id = format!("cluster_{}", full.replace(['/', '.', '-', ' '], "_"));
            lines.push(format!("{}subgraph {} [\"{}\"]", spaces, sub_id, dirname));
            write_tree(subdir, &full, lines, path_to_id, indent + 2);
            lines.push(format!("{}end", spaces));
        }
    }

    write_tree(&tree, "", &mut lines, &path_to_id, 4);

    let cyclic = cyclic_edges(graph);
    let mut highlighted = Vec::new();
    let mut edge_index = 0;
    for edge in graph.imports_edges() {
        let (Some(from), Some(to)) = (
            path_to_id.get(edge.source.as_str()),
            path_to_id.get(edge.target.as_str()),
        ) else {
            continue;
        };
        lines.push(format!("    {} --> {};", from, to));
        if cyclic.contains(&(edge.source.as_str(), edge.target.as_str())) {
            highlighted.push(edge_index.to_string());
        }
        edge_index += 1;
    }

    if !highlighted.is_empty() {
        lines.push(format!(
            "    linkStyle {} stroke:#d33,stroke-width:2px;",
            highlighted.join(",")
        ));
    }

    lines.join("\n")
}

/// Source/target pairs that close a cycle.
fn cyclic_edges(graph: &DependencyGraph) -> HashSet<(&str, &str)> {
    let mut edges = HashSet::new();
    for cycle in graph.cycles() {
        for (i, node) in cycle.iter().enumerate() {
            let next = &cycle[(i + 1) % cycle.len()];
            edges.insert((node.as_str(), next.as_str()));
        }
    }

    for component in graph.cyclic_components() {
        let members: HashSet<&str> = component.nodes.iter().map(String::as_str).collect();
        for edge in graph.imports_edges() {
            if members.contains(edge.source.as_str()) && members.contains(edge.target.as_str()) {
                edges.insert((edge.source.as_str(), edge.target.as_str()));
            }
        }
    }
    edges
}
