//! Dependency graph over files and their declarations
//!
//! Nodes are files (`app/models.py`) and declarations (`app/models.py::User`).
//! `contains` edges run from a file to its declarations; `imports` edges run
//! between files. The graph is an immutable value once built: re-indexing
//! produces a new graph rather than mutating this one.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::config::CycleLimits;
use crate::error::{Result, TidemarkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Class,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Owning file path for declaration nodes; `None` for files.
    pub owning_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Contains => write!(f, "contains"),
            EdgeKind::Imports => write!(f, "imports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

/// A strongly connected component too large to enumerate cycle by cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclicComponent {
    pub nodes: Vec<String>,
    pub size: usize,
}

/// Node id of a declaration inside a file.
pub fn declaration_id(file_path: &str, name: &str) -> String {
    format!("{}::{}", file_path, name)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    cycles: Vec<Vec<String>>,
    cyclic_components: Vec<CyclicComponent>,
    cycles_truncated: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. An existing node with the same id is kept as is and
    /// `false` is returned.
    pub fn add_node(&mut self, id: String, kind: NodeKind, owning_file: Option<String>) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(
            id.clone(),
            GraphNode {
                id,
                kind,
                owning_file,
            },
        );
        true
    }

    /// Appends an edge. Endpoints are not checked here; see [`Self::validate`].
    pub fn add_edge(&mut self, source: String, target: String, kind: EdgeKind) {
        self.edges.push(GraphEdge {
            source,
            target,
            kind,
        });
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn file_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(|n| n.kind == NodeKind::File)
    }

    /// Every simple cycle found, each starting at its smallest node id.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    pub fn cyclic_components(&self) -> &[CyclicComponent] {
        &self.cyclic_components
    }

    /// True when enumeration stopped at `max_cycles`.
    pub fn cycles_truncated(&self) -> bool {
        self.cycles_truncated
    }

    pub fn imports_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|e| e.kind == EdgeKind::Imports)
    }

    /// Files imported by `file`.
    pub fn imports_of<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.imports_edges()
            .filter(move |e| e.source == file)
            .map(|e| e.target.as_str())
    }

    /// Files importing `file`.
    pub fn importers_of<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.imports_edges()
            .filter(move |e| e.target == file)
            .map(|e| e.source.as_str())
    }

    /// Checks the structural invariants: every edge endpoint exists,
    /// `contains` runs from a file to a declaration of that file, `imports`
    /// connects two files, and every declaration has its `contains` edge.
    pub fn validate(&self) -> Result<()> {
        let mut contained: HashSet<(&str, &str)> = HashSet::new();

        for edge in &self.edges {
            let source = self.endpoint(edge, &edge.source)?;
            let target = self.endpoint(edge, &edge.target)?;

            match edge.kind {
                EdgeKind::Contains => {
                    if source.kind != NodeKind::File || target.kind == NodeKind::File {
                        return Err(TidemarkError::MalformedGraph(format!(
                            "contains edge {} -> {} must run from a file to a declaration",
                            edge.source, edge.target
                        )));
                    }
                    contained.insert((edge.source.as_str(), edge.target.as_str()));
                }
                EdgeKind::Imports => {
                    if source.kind != NodeKind::File || target.kind != NodeKind::File {
                        return Err(TidemarkError::MalformedGraph(format!(
                            "imports edge {} -> {} must connect two files",
                            edge.source, edge.target
                        )));
                    }
                }
            }
        }

        for node in self.nodes.values().filter(|n| n.kind != NodeKind::File) {
            let Some(owner) = node.owning_file.as_deref() else {
                return Err(TidemarkError::MalformedGraph(format!(
                    "declaration {} has no owning file",
                    node.id
                )));
            };
            if !contained.contains(&(owner, node.id.as_str())) {
                return Err(TidemarkError::MalformedGraph(format!(
                    "declaration {} is missing its contains edge from {}",
                    node.id, owner
                )));
            }
        }

        Ok(())
    }

    fn endpoint(&self, edge: &GraphEdge, id: &str) -> Result<&GraphNode> {
        self.nodes.get(id).ok_or_else(|| {
            TidemarkError::MalformedGraph(format!(
                "{} edge {} -> {} references missing node {}",
                edge.kind, edge.source, edge.target, id
            ))
        })
    }

    /// Recomputes the cycle report.
    ///
    /// Strongly connected components are found first. Components above
    /// `max_component_size` are reported whole; simple cycles in the rest are
    /// enumerated until `max_cycles` is reached.
    pub fn detect_cycles(&mut self, limits: &CycleLimits) {
        self.cycles.clear();
        self.cyclic_components.clear();
        self.cycles_truncated = false;

        let ids: Vec<&String> = self.nodes.keys().collect();
        let position: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(ids.len(), self.edges.len());
        for _ in &ids {
            graph.add_node(());
        }
        for edge in &self.edges {
            if let (Some(&s), Some(&t)) = (
                position.get(edge.source.as_str()),
                position.get(edge.target.as_str()),
            ) {
                graph.update_edge(NodeIndex::new(s), NodeIndex::new(t), ());
            }
        }

        let mut components: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .map(|component| {
                let mut members: Vec<usize> = component.iter().map(|n| n.index()).collect();
                members.sort_unstable();
                members
            })
            .collect();
        components.sort_by_key(|c| c[0]);

        let mut found: Vec<Vec<usize>> = Vec::new();
        for component in components {
            if component.len() == 1 {
                let node = NodeIndex::new(component[0]);
                if graph.find_edge(node, node).is_none() {
                    continue;
                }
            }

            if let Some(max_size) = limits.max_component_size
                && component.len() > max_size
            {
                self.cyclic_components.push(CyclicComponent {
                    size: component.len(),
                    nodes: component.iter().map(|&i| ids[i].clone()).collect(),
                });
                continue;
            }

            let remaining = limits.max_cycles.map(|max| max.saturating_sub(found.len()));
            if remaining == Some(0) {
                self.cycles_truncated = true;
                break;
            }

            let (cycles, truncated) = component_cycles(&graph, &component, remaining);
            found.extend(cycles);
            if truncated {
                self.cycles_truncated = true;
                break;
            }
        }

        self.cycles = found
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| ids[i].clone()).collect())
            .collect();
    }
}

/// Enumerates the simple cycles of one strongly connected component with
/// Johnson's algorithm. Returns global node positions.
fn component_cycles(
    graph: &DiGraph<(), ()>,
    component: &[usize],
    limit: Option<usize>,
) -> (Vec<Vec<usize>>, bool) {
    let local: HashMap<usize, usize> = component
        .iter()
        .enumerate()
        .map(|(i, &global)| (global, i))
        .collect();

    let adjacency: Vec<Vec<usize>> = component
        .iter()
        .map(|&global| {
            let mut next: Vec<usize> = graph
                .neighbors(NodeIndex::new(global))
                .filter_map(|n| local.get(&n.index()).copied())
                .collect();
            next.sort_unstable();
            next.dedup();
            next
        })
        .collect();

    let mut search = CircuitSearch {
        adjacency: &adjacency,
        start: 0,
        blocked: vec![false; component.len()],
        blocked_by: vec![HashSet::new(); component.len()],
        stack: Vec::new(),
        found: Vec::new(),
        limit,
    };

    for start in 0..component.len() {
        if search.is_full() {
            break;
        }
        search.start = start;
        search.blocked.iter_mut().for_each(|b| *b = false);
        search.blocked_by.iter_mut().for_each(|b| b.clear());
        search.circuit(start);
    }

    let truncated = search.is_full();
    let cycles = search
        .found
        .into_iter()
        .map(|cycle| cycle.into_iter().map(|i| component[i]).collect())
        .collect();
    (cycles, truncated)
}

struct CircuitSearch<'a> {
    adjacency: &'a [Vec<usize>],
    start: usize,
    blocked: Vec<bool>,
    blocked_by: Vec<HashSet<usize>>,
    stack: Vec<usize>,
    found: Vec<Vec<usize>>,
    limit: Option<usize>,
}

/// One node on the current path and the next neighbour to try.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    next: usize,
    closed: bool,
}

impl Frame {
    fn enter(node: usize) -> Self {
        Self {
            node,
            next: 0,
            closed: false,
        }
    }
}

impl CircuitSearch<'_> {
    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.found.len() >= limit)
    }

    /// Explores every path from `self.start`. Frames are kept on the heap so
    /// path length is not bounded by the thread stack.
    fn circuit(&mut self, root: usize) {
        let adjacency = self.adjacency;
        let mut frames = vec![Frame::enter(root)];
        self.stack.push(root);
        self.blocked[root] = true;

        while let Some(top) = frames.len().checked_sub(1) {
            let Frame { node, next, .. } = frames[top];

            if next < adjacency[node].len() && !self.is_full() {
                frames[top].next += 1;
                let w = adjacency[node][next];
                if w < self.start {
                    continue;
                }
                if w == self.start {
                    self.found.push(self.stack.clone());
                    frames[top].closed = true;
                } else if !self.blocked[w] {
                    self.stack.push(w);
                    self.blocked[w] = true;
                    frames.push(Frame::enter(w));
                }
                continue;
            }

            let closed = frames[top].closed;
            frames.pop();
            if closed {
                self.unblock(node);
                if let Some(parent) = frames.last_mut() {
                    parent.closed = true;
                }
            } else {
                for &w in &adjacency[node] {
                    if w >= self.start {
                        self.blocked_by[w].insert(node);
                    }
                }
            }
            self.stack.pop();
        }
    }

    fn unblock(&mut self, u: usize) {
        let mut pending = vec![u];
        while let Some(node) = pending.pop() {
            self.blocked[node] = false;
            pending.extend(
                self.blocked_by[node]
                    .drain()
                    .filter(|&w| self.blocked[w]),
            );
        }
    }
}
