//! In-memory catalog partitioned into octants.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::debug;

use super::loader::{CatalogLoader, ObjectRecord, OctantRegion};
use crate::error::LoadError;
use crate::octree::{OctantKey, OctantSkeleton, OctreeConfig};

#[derive(Default)]
struct CatalogCell {
  records: Vec<ObjectRecord>,
  child_mask: u8,
}

/// Catalog held entirely in memory, laid out like an on-disk octree
/// catalog: larger objects sit in shallower octants.
pub struct MemoryCatalog {
  cells: HashMap<OctantKey, CatalogCell>,
  /// Octants whose loads fail until cleared.
  failing: Mutex<HashSet<OctantKey>>,
  loads: AtomicUsize,
  discarded: usize,
}

impl MemoryCatalog {
  /// Partition `records` over the octree described by `config`.
  ///
  /// Records are placed largest first into the shallowest octant holding
  /// fewer than `max_per_octant` records; octants at `max_depth` take any
  /// overflow. Records outside the root cube are discarded.
  pub fn build(config: &OctreeConfig, records: impl IntoIterator<Item = ObjectRecord>, max_per_octant: usize) -> Self {
    let mut records: Vec<ObjectRecord> = records.into_iter().collect();
    records.sort_by(|a, b| b.size.total_cmp(&a.size));

    let mut cells: HashMap<OctantKey, CatalogCell> = HashMap::new();
    let mut discarded = 0;
    for record in records {
      let point = record.position.to_dvec3();
      let placed = (0..=config.max_depth).find_map(|depth| {
        let key = config.key_at(point, depth)?;
        let full = cells.get(&key).is_some_and(|c| c.records.len() >= max_per_octant);
        (!full || depth == config.max_depth).then_some(key)
      });
      let Some(key) = placed else {
        discarded += 1;
        continue;
      };

      cells.entry(key).or_default().records.push(record);
      let mut child = key;
      while let Some(parent) = child.parent() {
        cells.entry(parent).or_default().child_mask |= 1 << child.octant_index();
        child = parent;
      }
    }

    debug!(octants = cells.len(), discarded, "memory catalog built");
    Self {
      cells,
      failing: Mutex::new(HashSet::new()),
      loads: AtomicUsize::new(0),
      discarded,
    }
  }

  /// Make loads of `key` fail until [`heal_octant`](Self::heal_octant).
  pub fn fail_octant(&self, key: OctantKey) {
    if let Ok(mut failing) = self.failing.lock() {
      failing.insert(key);
    }
  }

  pub fn heal_octant(&self, key: OctantKey) {
    if let Ok(mut failing) = self.failing.lock() {
      failing.remove(&key);
    }
  }

  /// Successful and failed `load_octant` calls so far.
  pub fn load_count(&self) -> usize {
    self.loads.load(Ordering::Relaxed)
  }

  pub fn records_in(&self, key: OctantKey) -> &[ObjectRecord] {
    self.cells.get(&key).map_or(&[], |c| c.records.as_slice())
  }

  pub fn octant_count(&self) -> usize {
    self.cells.len()
  }

  /// Records that fell outside the root cube.
  pub fn discarded(&self) -> usize {
    self.discarded
  }
}

impl OctantSkeleton for MemoryCatalog {
  fn child_mask(&self, key: OctantKey) -> u8 {
    self.cells.get(&key).map_or(0, |c| c.child_mask)
  }

  fn object_count(&self, key: OctantKey) -> usize {
    self.records_in(key).len()
  }
}

impl CatalogLoader for MemoryCatalog {
  fn load_octant(&self, region: &OctantRegion) -> Result<Vec<ObjectRecord>, LoadError> {
    self.loads.fetch_add(1, Ordering::Relaxed);
    let failing = self
      .failing
      .lock()
      .map(|f| f.contains(&region.key))
      .unwrap_or(false);
    if failing {
      return Err(LoadError::Catalog {
        key: region.key,
        message: "injected failure".into(),
      });
    }
    Ok(self.records_in(region.key).to_vec())
  }
}

#[cfg(test)]
mod tests {
  use glam::DVec3;

  use super::*;
  use crate::octree::DAabb3;
  use crate::precision::DdVec3;

  fn config() -> OctreeConfig {
    OctreeConfig {
      root_half_size: 8.0,
      max_depth: 2,
      ..Default::default()
    }
  }

  fn region(config: &OctreeConfig, key: OctantKey) -> OctantRegion {
    OctantRegion {
      key,
      bounds: config.key_bounds(&key),
    }
  }

  #[test]
  fn test_largest_objects_are_shallowest() {
    let config = config();
    let records = vec![
      ObjectRecord::star(DdVec3::new(1.0, 1.0, 1.0), 1.0),
      ObjectRecord::star(DdVec3::new(1.5, 1.5, 1.5), 10.0),
    ];
    let catalog = MemoryCatalog::build(&config, records, 1);

    assert_eq!(catalog.records_in(OctantKey::ROOT)[0].size, 10.0);
    let child = config.key_at(DVec3::splat(1.0), 1).unwrap();
    assert_eq!(catalog.records_in(child)[0].size, 1.0);
    assert_eq!(catalog.child_mask(OctantKey::ROOT), 1 << child.octant_index());
  }

  #[test]
  fn test_overflow_lands_at_max_depth() {
    let config = config();
    let records = (0..10).map(|i| ObjectRecord::star(DdVec3::new(1.0, 1.0, 1.0), i as f64));
    let catalog = MemoryCatalog::build(&config, records, 1);

    let deepest = config.key_at(DVec3::splat(1.0), 2).unwrap();
    assert_eq!(catalog.records_in(deepest).len(), 8);
    assert_eq!(catalog.child_mask(deepest), 0);
  }

  #[test]
  fn test_outside_root_discarded() {
    let catalog = MemoryCatalog::build(&config(), vec![ObjectRecord::star(DdVec3::new(100.0, 0.0, 0.0), 1.0)], 4);
    assert_eq!(catalog.discarded(), 1);
    assert_eq!(catalog.octant_count(), 0);
  }

  #[test]
  fn test_injected_failure() {
    let config = config();
    let catalog = MemoryCatalog::build(&config, vec![ObjectRecord::star(DdVec3::ZERO, 1.0)], 4);
    let root = region(&config, OctantKey::ROOT);

    catalog.fail_octant(OctantKey::ROOT);
    assert!(catalog.load_octant(&root).is_err());
    catalog.heal_octant(OctantKey::ROOT);
    assert_eq!(catalog.load_octant(&root).unwrap().len(), 1);
    assert_eq!(catalog.load_count(), 2);

    let unused = OctantRegion {
      key: OctantKey::new(0, 0, 0, 1),
      bounds: DAabb3::new(DVec3::ZERO, DVec3::ONE),
    };
    assert!(catalog.load_octant(&unused).unwrap().is_empty());
  }
}
