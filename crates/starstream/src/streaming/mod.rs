//! Octant streaming: catalog loaders, the load queue and eviction.

mod budget;
mod cache;
mod loader;
mod memory;

use std::sync::Arc;

pub use budget::StreamingBudget;
pub use cache::{LoadCompletion, LoadOutcome, StreamingCache, StreamingStats};
pub use loader::{CatalogLoader, ObjectRecord, OctantRegion};
pub use memory::MemoryCatalog;

use crate::error::ConfigError;
use crate::octree::{OctreeConfig, OctreeIndex};

/// Octree index plus its streaming cache, attached to one scene node.
pub struct OctreeBranch {
  pub index: OctreeIndex,
  pub cache: StreamingCache,
}

impl OctreeBranch {
  pub fn new(
    config: OctreeConfig,
    budget: StreamingBudget,
    loader: Arc<dyn CatalogLoader>,
  ) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self {
      index: OctreeIndex::new(config),
      cache: StreamingCache::new(budget, loader)?,
    })
  }

  /// Load the configured preload depth synchronously. Completions are
  /// applied by the next update pass.
  pub fn preload(&mut self) -> usize {
    let depth = self.index.config().preload_depth;
    self.cache.preload(&mut self.index, depth)
  }
}
