//! Index/graph pairs and atomic replacement on re-index

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use tracing::info;

use crate::config::TidemarkConfig;
use crate::core::scanner::build_index_with_events;
use crate::core::{IndexEvent, RepositoryIndex};
use crate::error::Result;
use crate::utils::analysis::dependencies::{GraphOptions, build_graph_with};
use crate::utils::analysis::graph::DependencyGraph;

/// An index and the graph built from it. Never mutated after construction.
#[derive(Debug)]
pub struct Snapshot {
    pub index: RepositoryIndex,
    pub graph: DependencyGraph,
    pub fingerprint: String,
}

impl Snapshot {
    pub fn build(config: &TidemarkConfig) -> Result<Self> {
        Self::build_with_events(config, None)
    }

    pub fn build_with_events(
        config: &TidemarkConfig,
        tx: Option<Sender<IndexEvent>>,
    ) -> Result<Self> {
        let index = build_index_with_events(config, tx)?;
        Ok(Self::from_index(index, &GraphOptions::from_config(config)))
    }

    pub fn from_index(index: RepositoryIndex, options: &GraphOptions) -> Self {
        let graph = build_graph_with(&index, options);
        let fingerprint = index.fingerprint();
        Self {
            index,
            graph,
            fingerprint,
        }
    }
}

/// Shared handle to the current snapshot.
///
/// Readers clone the `Arc` and keep using it for the whole analysis; a
/// re-index swaps in a complete new pair, so nobody observes a mix.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Swaps in `snapshot`, returning the one it replaced.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        info!(
            "Snapshot replaced: {} -> {}",
            previous.fingerprint, self.current.read().fingerprint
        );
        previous
    }

    /// Rebuilds from `config` and swaps the result in. On failure the
    /// current snapshot stays in place.
    pub fn rebuild(&self, config: &TidemarkConfig) -> Result<Arc<Snapshot>> {
        let snapshot = Snapshot::build(config)?;
        self.replace(snapshot);
        Ok(self.current())
    }
}
