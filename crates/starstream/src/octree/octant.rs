//! Octant - one node of the octree index.

use std::sync::Arc;

use super::status::{LoadStatus, OctantShared};
use super::{DAabb3, OctantKey};
use crate::scene::NodeId;

/// Octant state owned by the update thread.
///
/// The skeleton part (key, bounds, child mask) persists for the lifetime of
/// the index; only `objects` is dropped on eviction.
#[derive(Debug)]
pub struct Octant {
  pub key: OctantKey,
  pub bounds: DAabb3,
  /// Bit i set = child i exists in the catalog.
  pub child_mask: u8,
  /// Scene nodes materialised from this octant's records.
  pub objects: Vec<NodeId>,
  /// Object count reported by the skeleton before loading.
  pub catalog_count: usize,
  /// Octant-level fade multiplier from the last observation.
  pub opacity: f32,
  /// Apparent angle from the last time the octant was visited.
  pub apparent: f64,
  pub last_observed_ms: Option<u64>,
  pub consecutive_failures: u32,
  pub(crate) shared: Arc<OctantShared>,
}

impl Octant {
  pub fn new(key: OctantKey, bounds: DAabb3, child_mask: u8, catalog_count: usize) -> Self {
    Self {
      key,
      bounds,
      child_mask,
      objects: Vec::new(),
      catalog_count,
      opacity: 0.0,
      apparent: 0.0,
      last_observed_ms: None,
      consecutive_failures: 0,
      shared: Arc::new(OctantShared::default()),
    }
  }

  #[inline]
  pub fn status(&self) -> LoadStatus {
    self.shared.status()
  }

  #[inline]
  pub fn is_observed(&self) -> bool {
    self.shared.is_observed()
  }

  #[inline]
  pub fn is_loaded(&self) -> bool {
    self.status() == LoadStatus::Loaded
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.child_mask == 0
  }

  pub fn shared(&self) -> &Arc<OctantShared> {
    &self.shared
  }

  /// Milliseconds since the octant was last observed. None while observed.
  pub fn unobserved_for(&self, now_ms: u64) -> Option<u64> {
    if self.is_observed() {
      return None;
    }
    Some(now_ms.saturating_sub(self.last_observed_ms.unwrap_or(0)))
  }
}
