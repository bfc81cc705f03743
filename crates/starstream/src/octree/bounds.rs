//! Axis-aligned bounding cube with double precision.
//!
//! Octant bounds are expressed in the octree's own frame (the frame of the
//! node that owns the octree), never in camera-relative coordinates.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl DAabb3 {
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
    Self {
      min: center - half_extents,
      max: center + half_extents,
    }
  }

  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.x >= self.min.x
      && point.x <= self.max.x
      && point.y >= self.min.y
      && point.y <= self.max.y
      && point.z >= self.min.z
      && point.z <= self.max.z
  }

  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Radius of the bounding sphere (half the diagonal).
  #[inline]
  pub fn bounding_radius(&self) -> f64 {
    self.size().length() * 0.5
  }

  /// Bounds of child `octant` (same bit layout as
  /// [`OctantKey::child`](super::OctantKey::child)).
  pub fn child(&self, octant: u8) -> DAabb3 {
    let half = self.size() * 0.5;
    let offset = DVec3::new(
      (octant & 1) as f64,
      ((octant >> 1) & 1) as f64,
      ((octant >> 2) & 1) as f64,
    ) * half;
    let min = self.min + offset;
    DAabb3 {
      min,
      max: min + half,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_center_half_extents() {
    let aabb = DAabb3::from_center_half_extents(DVec3::ZERO, DVec3::splat(10.0));
    assert_eq!(aabb.min, DVec3::splat(-10.0));
    assert_eq!(aabb.max, DVec3::splat(10.0));
    assert_eq!(aabb.center(), DVec3::ZERO);
  }

  #[test]
  fn test_contains_point_inclusive() {
    let aabb = DAabb3::new(DVec3::ZERO, DVec3::splat(10.0));
    assert!(aabb.contains_point(DVec3::splat(5.0)));
    assert!(aabb.contains_point(DVec3::ZERO));
    assert!(aabb.contains_point(DVec3::splat(10.0)));
    assert!(!aabb.contains_point(DVec3::splat(-1.0)));
    assert!(!aabb.contains_point(DVec3::new(5.0, 5.0, 10.5)));
  }

  #[test]
  fn test_bounding_radius() {
    let aabb = DAabb3::new(DVec3::ZERO, DVec3::splat(2.0));
    assert!((aabb.bounding_radius() - 3.0_f64.sqrt()).abs() < 1e-12);
  }

  #[test]
  fn test_child_bounds_tile_parent() {
    let parent = DAabb3::new(DVec3::ZERO, DVec3::splat(8.0));
    let c0 = parent.child(0);
    assert_eq!(c0.min, DVec3::ZERO);
    assert_eq!(c0.max, DVec3::splat(4.0));

    let c5 = parent.child(5);
    assert_eq!(c5.min, DVec3::new(4.0, 0.0, 4.0));
    assert_eq!(c5.max, DVec3::new(8.0, 4.0, 8.0));

    let c7 = parent.child(7);
    assert_eq!(c7.max, parent.max);
  }
}
