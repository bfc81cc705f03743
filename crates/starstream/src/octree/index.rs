//! OctreeIndex - per-frame observation, load requests and the roulette list.
//!
//! # Per-frame flow
//!
//! ```text
//!  mark_observed(view)
//!    │  descend from the root, pruning at apparent < th0
//!    ├─► observed octants        (shared flag set, opacity from th0..th1)
//!    ├─► load requests           (NotLoaded -> Loading, priority = apparent)
//!    ├─► eviction candidates     (Loaded, unobserved > grace period)
//!    └─► roulette list           (observed AND Loaded)
//!
//!  apply_loaded / mark_load_failed / evict   (driven by the streaming cache)
//!  rebuild_roulette                           (after completions are applied)
//! ```

use std::collections::{HashMap, HashSet};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::DVec3;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::octant::Octant;
use super::status::{LoadStatus, OctantShared};
use super::{DAabb3, OctantKey, OctreeConfig};
use crate::camera::CameraState;
use crate::fade::linear_map;
use crate::lod;
use crate::precision::DdVec3;
use crate::scene::NodeId;

/// Structure of the catalog: which octants exist and how full they are.
///
/// Consulted lazily the first time traversal reaches an octant.
pub trait OctantSkeleton {
  /// Bitmask of existing children (bit i = child i). 0 for leaves.
  fn child_mask(&self, key: OctantKey) -> u8;

  /// Number of objects stored in `key`, if known before loading.
  fn object_count(&self, _key: OctantKey) -> usize {
    0
  }
}

/// Camera as seen from the octree's frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctreeView {
  /// Camera position relative to the octree origin.
  pub camera: DVec3,
  /// Unit view direction.
  pub direction: DVec3,
  /// Half-angle of the view cone, radians.
  pub cone_half_angle: f64,
  pub fov_factor: f64,
  /// Focus object position relative to the octree origin.
  pub focus: Option<DVec3>,
}

impl OctreeView {
  pub fn new(camera: DVec3, fov_factor: f64) -> Self {
    Self {
      camera,
      direction: DVec3::NEG_Z,
      cone_half_angle: std::f64::consts::PI,
      fov_factor,
      focus: None,
    }
  }

  /// Express `camera` in the frame of an octree whose origin sits at the
  /// absolute position `origin`.
  pub fn from_camera(camera: &CameraState, origin: &DdVec3) -> Self {
    Self {
      camera: camera.position.to_camera_relative(origin),
      direction: camera.direction,
      // Full vertical FOV as half-angle leaves room for wide aspect ratios.
      cone_half_angle: camera.fov_degrees.to_radians(),
      fov_factor: camera.fov_factor,
      focus: None,
    }
  }

  pub fn with_focus(mut self, focus: DVec3) -> Self {
    self.focus = Some(focus);
    self
  }

  pub fn with_direction(mut self, direction: DVec3, cone_half_angle: f64) -> Self {
    self.direction = direction.normalize_or(self.direction);
    self.cone_half_angle = cone_half_angle;
    self
  }

  /// Whether a sphere at `to_center` (distance `dist`) touches the view cone.
  fn sphere_in_cone(&self, to_center: DVec3, dist: f64, radius: f64) -> bool {
    if dist <= radius {
      return true;
    }
    let cos = (to_center.dot(self.direction) / dist).clamp(-1.0, 1.0);
    let angle = cos.acos();
    let angular_radius = (radius / dist).asin();
    angle - angular_radius <= self.cone_half_angle
  }
}

/// A request to materialise one octant.
#[derive(Clone, Debug)]
pub struct LoadRequest {
  pub key: OctantKey,
  pub bounds: DAabb3,
  /// Apparent angle at request time; larger loads first.
  pub priority: f64,
  pub(crate) shared: Arc<OctantShared>,
}

impl LoadRequest {
  pub fn shared(&self) -> &Arc<OctantShared> {
    &self.shared
  }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouletteEntry {
  pub key: OctantKey,
  pub opacity: f32,
}

/// Result of one [`OctreeIndex::mark_observed`] pass.
#[derive(Debug, Default)]
pub struct Observation {
  /// Octants examined (observed or pruned).
  pub visited: usize,
  pub observed: usize,
  pub load_requests: Vec<LoadRequest>,
  /// Loaded octants unobserved for longer than the grace period, oldest
  /// first.
  pub eviction_candidates: Vec<OctantKey>,
  pub roulette_len: usize,
}

/// Octant counts per depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepthStats {
  pub depth: u8,
  pub octants: usize,
  pub observed: usize,
  pub loaded: usize,
  pub resident_objects: usize,
}

pub struct OctreeIndex {
  config: OctreeConfig,
  octants: HashMap<OctantKey, Octant>,
  /// Observed this frame with their fade opacity, in traversal order.
  observed: Vec<(OctantKey, f32)>,
  roulette: Vec<RouletteEntry>,
  resident_objects: usize,
}

impl OctreeIndex {
  pub fn new(config: OctreeConfig) -> Self {
    Self {
      config,
      octants: HashMap::new(),
      observed: Vec::new(),
      roulette: Vec::new(),
      resident_objects: 0,
    }
  }

  #[inline]
  pub fn config(&self) -> &OctreeConfig {
    &self.config
  }

  pub fn get(&self, key: &OctantKey) -> Option<&Octant> {
    self.octants.get(key)
  }

  /// Number of octants created so far.
  pub fn len(&self) -> usize {
    self.octants.len()
  }

  pub fn is_empty(&self) -> bool {
    self.octants.is_empty()
  }

  /// Observed, loaded octants from the last observation.
  pub fn roulette(&self) -> &[RouletteEntry] {
    &self.roulette
  }

  /// Objects resident across all loaded octants.
  pub fn resident_objects(&self) -> usize {
    self.resident_objects
  }

  pub fn loaded_octants(&self) -> impl Iterator<Item = &Octant> {
    self.octants.values().filter(|o| o.is_loaded())
  }

  fn ensure_octant<S: OctantSkeleton + ?Sized>(&mut self, key: OctantKey, skeleton: &S) -> &mut Octant {
    let config = &self.config;
    self.octants.entry(key).or_insert_with(|| {
      let mask = if key.depth < config.max_depth {
        skeleton.child_mask(key)
      } else {
        0
      };
      Octant::new(key, config.key_bounds(&key), mask, skeleton.object_count(key))
    })
  }

  /// Refresh the observed set for this frame.
  ///
  /// Descends from the root and prunes every octant whose apparent angle is
  /// below `th0` (inclusive boundary: equal counts as observed). An octant
  /// containing the focus position is always observed.
  #[tracing::instrument(skip_all, name = "octree::mark_observed")]
  pub fn mark_observed<S: OctantSkeleton + ?Sized>(
    &mut self,
    view: &OctreeView,
    now_ms: u64,
    skeleton: &S,
  ) -> Observation {
    let mut observation = Observation::default();
    let fov_factor = self.config.clamp_fov_factor(view.fov_factor);
    let [th0, th1] = self.config.threshold;
    let octant_fade = self.config.octant_fade && th1 > th0;
    let view_cone = self.config.view_cone_culling;
    let max_depth = self.config.max_depth;

    let previous: Vec<OctantKey> = self.observed.drain(..).map(|(k, _)| k).collect();
    let mut observed = Vec::with_capacity(previous.len());

    // Octant fade multiplies down the tree: a child is never more opaque
    // than its parent octant.
    let mut stack = vec![(OctantKey::ROOT, 1.0_f32)];
    while let Some((key, parent_opacity)) = stack.pop() {
      observation.visited += 1;
      let octant = self.ensure_octant(key, skeleton);

      let center = octant.bounds.center();
      let radius = octant.bounds.bounding_radius();
      let to_center = center - view.camera;
      let dist = to_center.length();
      let inside = octant.bounds.contains_point(view.camera);

      let solid = if inside {
        FRAC_PI_2
      } else {
        lod::solid_angle(radius, dist)
      };
      let apparent = lod::apparent(solid, fov_factor);
      octant.apparent = apparent;

      let holds_focus = view.focus.is_some_and(|f| octant.bounds.contains_point(f));
      let in_cone = !view_cone || inside || view.sphere_in_cone(to_center, dist, radius);
      if !(holds_focus || (apparent >= th0 && in_cone)) {
        continue;
      }

      octant.shared.set_observed(true);
      octant.last_observed_ms = Some(now_ms);
      let own = if octant_fade && !holds_focus {
        linear_map(apparent, th0, th1, 0.0, 1.0) as f32
      } else {
        1.0
      };
      octant.opacity = parent_opacity * own;
      let opacity = octant.opacity;
      observed.push((key, octant.opacity));
      observation.observed += 1;

      if octant.status() == LoadStatus::NotLoaded
        && octant.shared.transition(LoadStatus::NotLoaded, LoadStatus::Loading)
      {
        observation.load_requests.push(LoadRequest {
          key,
          bounds: octant.bounds,
          priority: apparent,
          shared: Arc::clone(&octant.shared),
        });
      }

      if key.depth < max_depth {
        let mask = octant.child_mask;
        // Reverse so children pop in octant order.
        let children: SmallVec<[OctantKey; 8]> = key.children_in_mask(mask).collect();
        stack.extend(children.into_iter().rev().map(|child| (child, opacity)));
      }
    }

    // Clear the flag on octants that dropped out this frame.
    let current: HashSet<OctantKey> = observed.iter().map(|(k, _)| *k).collect();
    for key in previous.iter().filter(|k| !current.contains(k)) {
      if let Some(octant) = self.octants.get(key) {
        octant.shared.set_observed(false);
      }
    }
    self.observed = observed;

    observation.eviction_candidates = self.eviction_candidates(now_ms);
    self.rebuild_roulette();
    observation.roulette_len = self.roulette.len();

    trace!(
      visited = observation.visited,
      observed = observation.observed,
      requests = observation.load_requests.len(),
      roulette = observation.roulette_len,
      "octree observation"
    );
    observation
  }

  /// Stop observing everything, e.g. while the owning node is hidden.
  ///
  /// Clears the shared flags (so queued and in-flight loads cancel) and the
  /// roulette list. Grace periods run from each octant's last observation.
  pub fn clear_observed(&mut self) {
    for (key, _) in self.observed.drain(..) {
      if let Some(octant) = self.octants.get(&key) {
        octant.shared.set_observed(false);
      }
    }
    self.roulette.clear();
  }

  /// Loaded, unobserved octants past the grace period, oldest first.
  /// Octants within the preload depth are pinned.
  pub fn eviction_candidates(&self, now_ms: u64) -> Vec<OctantKey> {
    let grace = self.config.eviction_grace_ms;
    let pinned = self.config.preload_depth;
    let mut expired: Vec<(u64, OctantKey)> = self
      .octants
      .values()
      .filter(|o| o.key.depth > pinned && o.is_loaded())
      .filter_map(|o| {
        let idle = o.unobserved_for(now_ms)?;
        (idle >= grace).then_some((o.last_observed_ms.unwrap_or(0), o.key))
      })
      .collect();
    expired.sort();
    expired.into_iter().map(|(_, k)| k).collect()
  }

  /// Recompute the roulette list from the current observed set.
  pub fn rebuild_roulette(&mut self) {
    self.roulette.clear();
    for (key, opacity) in &self.observed {
      if self.octants.get(key).is_some_and(Octant::is_loaded) {
        self.roulette.push(RouletteEntry {
          key: *key,
          opacity: *opacity,
        });
      }
    }
  }

  /// Promote a loading octant to `Loaded` with its materialised objects.
  ///
  /// Returns false (and keeps nothing) if the octant is unknown or not
  /// `Loading`; the caller owns the objects in that case.
  pub fn apply_loaded(&mut self, key: OctantKey, objects: Vec<NodeId>) -> Result<(), Vec<NodeId>> {
    let Some(octant) = self.octants.get_mut(&key) else {
      return Err(objects);
    };
    if !octant.shared.transition(LoadStatus::Loading, LoadStatus::Loaded) {
      return Err(objects);
    }
    debug!(?key, objects = objects.len(), "octant loaded");
    self.resident_objects += objects.len();
    octant.objects = objects;
    octant.consecutive_failures = 0;
    Ok(())
  }

  /// Record a failed load. The octant returns to `NotLoaded` and is retried
  /// on its next observation. Returns the consecutive failure count.
  pub fn mark_load_failed(&mut self, key: OctantKey) -> u32 {
    let Some(octant) = self.octants.get_mut(&key) else {
      return 0;
    };
    octant.shared.transition(LoadStatus::Loading, LoadStatus::NotLoaded);
    octant.consecutive_failures += 1;
    octant.consecutive_failures
  }

  /// Reset an octant whose load was cancelled or dropped before it ran.
  pub fn mark_load_cancelled(&mut self, key: OctantKey) {
    if let Some(octant) = self.octants.get(&key) {
      octant.shared.transition(LoadStatus::Loading, LoadStatus::NotLoaded);
    }
  }

  /// Drop a loaded octant's objects. Refuses observed octants.
  ///
  /// Returns the evicted object ids for the caller to remove from the scene.
  pub fn evict(&mut self, key: OctantKey) -> Option<Vec<NodeId>> {
    let octant = self.octants.get_mut(&key)?;
    if octant.is_observed() || !octant.is_loaded() {
      return None;
    }
    octant.shared.force_status(LoadStatus::NotLoaded);
    let objects = std::mem::take(&mut octant.objects);
    self.resident_objects = self.resident_objects.saturating_sub(objects.len());
    self.roulette.retain(|e| e.key != key);
    debug!(?key, objects = objects.len(), "octant evicted");
    Some(objects)
  }

  /// Create every octant down to `depth` and mark the `NotLoaded` ones as
  /// `Loading`. Used for startup preloading.
  pub fn collect_to_depth<S: OctantSkeleton + ?Sized>(&mut self, depth: u8, skeleton: &S) -> Vec<LoadRequest> {
    let depth = depth.min(self.config.max_depth);
    let mut requests = Vec::new();
    let mut stack = vec![OctantKey::ROOT];
    while let Some(key) = stack.pop() {
      let octant = self.ensure_octant(key, skeleton);
      if octant.shared.transition(LoadStatus::NotLoaded, LoadStatus::Loading) {
        requests.push(LoadRequest {
          key,
          bounds: octant.bounds,
          priority: f64::INFINITY,
          shared: Arc::clone(&octant.shared),
        });
      }
      if key.depth < depth {
        let mask = octant.child_mask;
        let children: SmallVec<[OctantKey; 8]> = key.children_in_mask(mask).collect();
        stack.extend(children);
      }
    }
    requests
  }

  /// Deepest created octant whose cube contains `point` (octree frame).
  pub fn best_octant(&self, point: DVec3) -> Option<OctantKey> {
    let root = self.octants.get(&OctantKey::ROOT)?;
    if !root.bounds.contains_point(point) {
      return None;
    }
    let mut best = OctantKey::ROOT;
    loop {
      let next = (0u8..8)
        .filter_map(|i| best.child(i))
        .filter_map(|k| self.octants.get(&k))
        .find(|o| o.bounds.contains_point(point));
      match next {
        Some(octant) => best = octant.key,
        None => return Some(best),
      }
    }
  }

  /// Counts per depth, from the root down to the deepest created level.
  pub fn stats_per_depth(&self) -> Vec<DepthStats> {
    let mut stats: Vec<DepthStats> = Vec::new();
    for octant in self.octants.values() {
      let depth = octant.key.depth as usize;
      if stats.len() <= depth {
        stats.extend((stats.len()..=depth).map(|d| DepthStats {
          depth: d as u8,
          ..Default::default()
        }));
      }
      let entry = &mut stats[depth];
      entry.octants += 1;
      if octant.is_observed() {
        entry.observed += 1;
      }
      if octant.is_loaded() {
        entry.loaded += 1;
        entry.resident_objects += octant.objects.len();
      }
    }
    stats
  }
}

#[cfg(test)]
#[path = "index_test.rs"]
mod index_test;
