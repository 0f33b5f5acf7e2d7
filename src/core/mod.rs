//! Core module for tidemark
//!
//! This module contains the data model, the index builder, and snapshots.

pub mod scanner;
pub mod snapshot;
mod types;

pub use scanner::{build_index, build_index_with_events};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use types::*;
