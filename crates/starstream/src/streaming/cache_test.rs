use std::time::Duration;

use glam::DVec3;
use slotmap::SlotMap;

use super::*;
use crate::octree::{DAabb3, OctantShared, OctantSkeleton, OctreeConfig, OctreeView};
use crate::precision::DdVec3;
use crate::scene::NodeId;

/// One star per octant at the octant center, full branching to `depth`.
struct EchoLoader {
  depth: u8,
  fail_depth: Option<u8>,
}

impl OctantSkeleton for EchoLoader {
  fn child_mask(&self, key: OctantKey) -> u8 {
    if key.depth < self.depth {
      0xFF
    } else {
      0
    }
  }
}

impl CatalogLoader for EchoLoader {
  fn load_octant(&self, region: &OctantRegion) -> Result<Vec<ObjectRecord>, LoadError> {
    if self.fail_depth == Some(region.key.depth) {
      return Err(LoadError::Catalog {
        key: region.key,
        message: "corrupt block".into(),
      });
    }
    Ok(vec![ObjectRecord::star(DdVec3::from_dvec3(region.bounds.center()), 1.0)])
  }
}

fn cache(budget: StreamingBudget, fail_depth: Option<u8>) -> StreamingCache {
  StreamingCache::new(budget, Arc::new(EchoLoader { depth: 1, fail_depth })).unwrap()
}

fn inline(loads_per_frame: usize) -> StreamingBudget {
  StreamingBudget {
    loads_per_frame,
    ..StreamingBudget::UNLIMITED_INLINE
  }
}

/// Request in the state `mark_observed` leaves it: Loading and observed.
fn request(x: u32, priority: f64) -> LoadRequest {
  let shared = Arc::new(OctantShared::default());
  shared.transition(LoadStatus::NotLoaded, LoadStatus::Loading);
  shared.set_observed(true);
  LoadRequest {
    key: OctantKey::new(x, 0, 0, 3),
    bounds: DAabb3::new(DVec3::ZERO, DVec3::ONE),
    priority,
    shared,
  }
}

fn loaded_keys(completions: &[LoadCompletion]) -> Vec<u32> {
  completions
    .iter()
    .filter(|c| matches!(c.outcome, LoadOutcome::Loaded(_)))
    .map(|c| c.key.x)
    .collect()
}

// =========================================================================
// Queue ordering
// =========================================================================

/// The largest apparent angle is dispatched first.
#[test]
fn test_highest_priority_first() {
  let mut cache = cache(inline(1), None);
  cache.enqueue_load(request(0, 0.1));
  cache.enqueue_load(request(1, 0.9));
  cache.enqueue_load(request(2, 0.5));

  let mut order = Vec::new();
  while cache.tick() > 0 {
    order.extend(loaded_keys(&cache.drain_completions()));
  }
  assert_eq!(order, vec![1, 2, 0]);
  assert!(cache.is_idle());
}

/// Equal priorities load in arrival order.
#[test]
fn test_equal_priority_is_fifo() {
  let mut cache = cache(inline(0), None);
  for x in 0..4 {
    cache.enqueue_load(request(x, 0.5));
  }
  assert_eq!(cache.tick(), 4);
  assert_eq!(loaded_keys(&cache.drain_completions()), vec![0, 1, 2, 3]);
}

/// A full queue drops its lowest-priority request and resets that octant.
#[test]
fn test_full_queue_drops_lowest() {
  let budget = StreamingBudget {
    queue_capacity: 2,
    ..inline(0)
  };
  let mut cache = cache(budget, None);
  let low = request(0, 0.1);
  let low_shared = Arc::clone(low.shared());

  assert!(cache.enqueue_load(low));
  assert!(cache.enqueue_load(request(1, 0.5)));
  assert!(cache.enqueue_load(request(2, 0.9)));
  assert_eq!(low_shared.status(), LoadStatus::NotLoaded);

  let lower = request(3, 0.05);
  let lower_shared = Arc::clone(lower.shared());
  assert!(!cache.enqueue_load(lower));
  assert_eq!(lower_shared.status(), LoadStatus::NotLoaded);

  assert_eq!(cache.stats().dropped, 2);
  assert_eq!(cache.queued_count(), 2);
}

// =========================================================================
// Completions
// =========================================================================

/// Inline mode delivers completions in the same frame, with records.
#[test]
fn test_inline_completion_same_frame() {
  let mut cache = cache(inline(0), None);
  cache.enqueue_load(request(0, 1.0));
  cache.tick();

  let completions = cache.drain_completions();
  assert_eq!(completions.len(), 1);
  match &completions[0].outcome {
    LoadOutcome::Loaded(records) => assert_eq!(records.len(), 1),
    other => panic!("expected Loaded, got {:?}", other),
  }
  assert_eq!(cache.stats().completed, 1);
  assert_eq!(cache.in_flight(), 0);
}

/// A request whose octant dropped out of view is cancelled, and its status
/// is left for the update thread to reset.
#[test]
fn test_unobserved_request_cancelled() {
  let mut cache = cache(inline(0), None);
  let req = request(0, 1.0);
  let shared = Arc::clone(req.shared());
  cache.enqueue_load(req);
  shared.set_observed(false);
  cache.tick();

  let completions = cache.drain_completions();
  assert!(matches!(completions[0].outcome, LoadOutcome::Cancelled));
  assert_eq!(shared.status(), LoadStatus::Loading);
  assert_eq!(cache.stats().cancelled, 1);
}

/// Repeated failures of one octant count as persistent at the threshold,
/// and a success clears them.
#[test]
fn test_persistent_failures() {
  let budget = StreamingBudget {
    failure_warn_threshold: 2,
    ..inline(0)
  };
  let mut cache = cache(budget, Some(3));
  for _ in 0..2 {
    cache.enqueue_load(request(7, 1.0));
    cache.tick();
    let completions = cache.drain_completions();
    assert!(matches!(completions[0].outcome, LoadOutcome::Failed(_)));
  }
  let stats = cache.stats();
  assert_eq!(stats.failed, 2);
  assert_eq!(stats.persistent_failures, 1);
}

/// Paused caches keep their queue; resume dispatches it.
#[test]
fn test_pause_and_resume() {
  let mut cache = cache(inline(0), None);
  cache.enqueue_load(request(0, 1.0));
  cache.pause();
  assert_eq!(cache.tick(), 0);
  assert_eq!(cache.queued_count(), 1);

  cache.resume();
  assert_eq!(cache.tick(), 1);
  assert!(!cache.is_paused());
}

#[test]
fn test_clear_queue_resets_status() {
  let mut cache = cache(inline(0), None);
  let req = request(0, 1.0);
  let shared = Arc::clone(req.shared());
  cache.enqueue_load(req);
  cache.enqueue_load(request(1, 1.0));

  assert_eq!(cache.clear_queue(), 2);
  assert_eq!(shared.status(), LoadStatus::NotLoaded);
  assert!(cache.is_idle());
}

/// Worker threads deliver every completion without blocking the caller.
#[test]
fn test_thread_pool_completes() {
  let budget = StreamingBudget {
    worker_threads: 2,
    ..inline(0)
  };
  let mut cache = cache(budget, None);
  for x in 0..16 {
    cache.enqueue_load(request(x, x as f64));
  }
  assert_eq!(cache.tick(), 16);

  let mut received = Vec::new();
  for _ in 0..500 {
    received.extend(cache.drain_completions());
    if received.len() == 16 {
      break;
    }
    std::thread::sleep(Duration::from_millis(10));
  }
  assert_eq!(received.len(), 16);
  assert!(cache.is_idle());
}

// =========================================================================
// Eviction planning and preload
// =========================================================================

fn octree_config() -> OctreeConfig {
  OctreeConfig {
    root_half_size: 8.0,
    max_depth: 1,
    threshold: [0.5, 0.6],
    eviction_grace_ms: 1_000,
    ..Default::default()
  }
}

/// Observe everything from the origin and load 10 objects per octant.
fn loaded_index(cache: &StreamingCache) -> OctreeIndex {
  let mut index = OctreeIndex::new(octree_config());
  let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
  let observation = index.mark_observed(&OctreeView::new(DVec3::ZERO, 1.0), 0, cache.loader());
  for request in &observation.load_requests {
    let objects = (0..10).map(|_| ids.insert(())).collect();
    index.apply_loaded(request.key, objects).unwrap();
  }
  index.rebuild_roulette();
  index
}

const FAR: DVec3 = DVec3::new(1.0e6, 0.0, 0.0);

/// Grace-expired candidates are planned up to the per-frame limit.
#[test]
fn test_grace_candidates_limited_per_frame() {
  let budget = StreamingBudget {
    evictions_per_frame: 3,
    ..inline(0)
  };
  let cache = cache(budget, None);
  let mut index = loaded_index(&cache);

  let late = index.mark_observed(&OctreeView::new(FAR, 1.0), 2_000, cache.loader());
  assert_eq!(late.eviction_candidates.len(), 8);
  assert_eq!(cache.plan_evictions(&index, &late.eviction_candidates).len(), 3);
}

/// Over the soft cap, unobserved octants are evicted down to the low-water
/// mark even before their grace period ends. The pinned root stays.
#[test]
fn test_memory_pressure_evicts_to_low_water() {
  let budget = StreamingBudget {
    max_resident_objects: 50,
    low_water_ratio: 0.5,
    ..inline(0)
  };
  let cache = cache(budget, None);
  let mut index = loaded_index(&cache);
  assert_eq!(index.resident_objects(), 90);

  let early = index.mark_observed(&OctreeView::new(FAR, 1.0), 10, cache.loader());
  assert!(early.eviction_candidates.is_empty());

  let plan = cache.plan_evictions(&index, &[]);
  assert_eq!(plan.len(), 7);
  assert!(!plan.contains(&OctantKey::ROOT));
}

/// Observed octants are never planned, even when listed as candidates.
#[test]
fn test_observed_never_planned() {
  let budget = StreamingBudget {
    max_resident_objects: 0,
    ..inline(0)
  };
  let cache = cache(budget, None);
  let index = loaded_index(&cache);

  let child = OctantKey::new(0, 0, 0, 1);
  assert!(index.get(&child).unwrap().is_observed());
  assert!(cache.plan_evictions(&index, &[child]).is_empty());
}

/// Preload loads every octant down to the depth without an observed check.
#[test]
fn test_preload() {
  let mut cache = cache(StreamingBudget::UNLIMITED_INLINE, None);
  let mut index = OctreeIndex::new(octree_config());

  assert_eq!(cache.preload(&mut index, 1), 9);
  let completions = cache.drain_completions();
  assert_eq!(loaded_keys(&completions).len(), 9);
  assert_eq!(index.get(&OctantKey::ROOT).unwrap().status(), LoadStatus::Loading);
}
