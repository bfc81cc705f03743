//! OctreeConfig - root cube, observation thresholds and eviction policy.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::{DAabb3, OctantKey};
use crate::error::ConfigError;
use crate::units::KPC;

/// Configuration for one octree-backed catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
  /// Center of the root cube in the owning node's frame.
  pub root_center: DVec3,
  /// Half the edge length of the root cube.
  pub root_half_size: f64,
  /// Deepest level ever traversed (root = 0).
  pub max_depth: u8,
  /// Apparent-angle thresholds `[th0, th1]` in radians. An octant is observed
  /// at `apparent >= th0`; its fade completes at `th1`.
  pub threshold: [f64; 2],
  /// Fade octant contents in between the two thresholds.
  pub octant_fade: bool,
  /// Skip octants whose bounding sphere is outside the view cone.
  pub view_cone_culling: bool,
  /// How long a loaded octant may stay unobserved before it becomes an
  /// eviction candidate.
  pub eviction_grace_ms: u64,
  /// Octants at or above this depth are loaded at startup and never evicted.
  pub preload_depth: u8,
  /// Range the FOV factor is clamped to for octree observation.
  pub fov_factor_range: [f64; 2],
}

impl Default for OctreeConfig {
  fn default() -> Self {
    Self {
      root_center: DVec3::ZERO,
      root_half_size: 50.0 * KPC,
      max_depth: 12,
      threshold: [0.5, 0.65],
      octant_fade: true,
      view_cone_culling: false,
      eviction_grace_ms: 5_000,
      preload_depth: 0,
      fov_factor_range: [0.1, 2.0],
    }
  }
}

impl OctreeConfig {
  /// Bounds of the root cube.
  #[inline]
  pub fn root_bounds(&self) -> DAabb3 {
    DAabb3::from_center_half_extents(self.root_center, DVec3::splat(self.root_half_size))
  }

  /// Edge length of an octant at `depth`.
  #[inline]
  pub fn octant_size(&self, depth: u8) -> f64 {
    2.0 * self.root_half_size / (1u64 << depth) as f64
  }

  /// Bounds of `key`, computed from the root corner so errors do not
  /// accumulate with depth.
  pub fn key_bounds(&self, key: &OctantKey) -> DAabb3 {
    let size = self.octant_size(key.depth);
    let min = self.root_bounds().min + DVec3::new(key.x as f64, key.y as f64, key.z as f64) * size;
    DAabb3 {
      min,
      max: min + DVec3::splat(size),
    }
  }

  /// Key at `depth` (capped at `max_depth`) whose cube contains `point`.
  /// None outside the root cube.
  pub fn key_at(&self, point: DVec3, depth: u8) -> Option<OctantKey> {
    let root = self.root_bounds();
    if !root.contains_point(point) {
      return None;
    }
    let depth = depth.min(self.max_depth);
    let cells = (1u64 << depth) as f64;
    let rel = (point - root.min) / (2.0 * self.root_half_size) * cells;
    let clamp = |v: f64| (v.floor().max(0.0) as u64).min((1u64 << depth) - 1) as u32;
    Some(OctantKey::new(clamp(rel.x), clamp(rel.y), clamp(rel.z), depth))
  }

  #[inline]
  pub fn th0(&self) -> f64 {
    self.threshold[0]
  }

  #[inline]
  pub fn th1(&self) -> f64 {
    self.threshold[1]
  }

  /// FOV factor used for octree observation.
  #[inline]
  pub fn clamp_fov_factor(&self, fov_factor: f64) -> f64 {
    fov_factor.clamp(self.fov_factor_range[0], self.fov_factor_range[1])
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.root_half_size.is_finite() && self.root_half_size > 0.0) {
      return Err(ConfigError::Invalid(format!(
        "octree root_half_size must be positive, got {}",
        self.root_half_size
      )));
    }
    if self.max_depth > OctantKey::MAX_DEPTH {
      return Err(ConfigError::Invalid(format!(
        "octree max_depth {} exceeds {}",
        self.max_depth,
        OctantKey::MAX_DEPTH
      )));
    }
    let [th0, th1] = self.threshold;
    if !(th0 > 0.0 && th1 >= th0 && th1.is_finite()) {
      return Err(ConfigError::Invalid(format!(
        "octree thresholds must satisfy 0 < th0 <= th1, got [{}, {}]",
        th0, th1
      )));
    }
    let [lo, hi] = self.fov_factor_range;
    if !(lo > 0.0 && hi >= lo) {
      return Err(ConfigError::Invalid(format!(
        "octree fov_factor_range must satisfy 0 < min <= max, got [{}, {}]",
        lo, hi
      )));
    }
    if self.preload_depth > self.max_depth {
      return Err(ConfigError::Invalid(format!(
        "octree preload_depth {} exceeds max_depth {}",
        self.preload_depth, self.max_depth
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
