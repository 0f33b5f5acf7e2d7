//! Utility modules for tidemark
//!
//! - `analysis/` - dependency graph, ranking, impact analysis
//! - `ast` - Python declaration parser
//! - the rest: caching, preflight limits, summaries, ignore files, watch mode

pub mod analysis;
pub mod ast;
pub mod cache;
pub mod ignorefile;
pub mod preflight;
pub mod summary;
pub mod watch;
