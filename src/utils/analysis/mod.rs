//! Analysis over a repository index
//!
//! Contains the dependency graph, relevance ranking, impact analysis, and
//! external opinion parsing.

pub mod dependencies;
pub mod graph;
pub mod impact;
pub mod opinion;
pub mod query;

// Re-export commonly used items
pub use dependencies::{GraphOptions, build_graph, build_graph_with};
pub use graph::{CyclicComponent, DependencyGraph, EdgeKind, GraphEdge, GraphNode, NodeKind};
pub use impact::{ImpactAnalyzer, ImpactReport, OverlapEntry, RiskLevel, RiskPolicy, analyze};
pub use opinion::ExternalOpinion;
pub use query::{RankedFile, rank};
