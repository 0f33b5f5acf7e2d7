pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod fs;
pub mod runner;
pub mod utils;

// Re-export key items for convenience
pub use config::{CycleLimits, ExpansionMode, ImpactSettings, OutputFormat, TidemarkConfig};
pub use core::{
    IndexEvent, RepositoryIndex, Snapshot, SnapshotHandle, SourceFile, build_index,
    build_index_with_events,
};
pub use error::{Result, TidemarkError};
pub use runner::{Command, run};
pub use utils::analysis::{
    DependencyGraph, ExternalOpinion, ImpactAnalyzer, ImpactReport, RankedFile, RiskLevel,
    analyze, build_graph, rank,
};
pub use utils::ast::parse_source;
pub use utils::cache::{ContextCache, ContextKey};
