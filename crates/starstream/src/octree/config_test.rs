use glam::DVec3;

use super::*;

fn unit_config() -> OctreeConfig {
  OctreeConfig {
    root_center: DVec3::ZERO,
    root_half_size: 8.0,
    max_depth: 4,
    ..Default::default()
  }
}

// =========================================================================
// Coordinate math
// =========================================================================

/// Octant size halves per level.
#[test]
fn test_octant_size() {
  let config = unit_config();
  assert_eq!(config.octant_size(0), 16.0);
  assert_eq!(config.octant_size(1), 8.0);
  assert_eq!(config.octant_size(4), 1.0);
}

/// Key bounds agree with successive child bounds.
#[test]
fn test_key_bounds_match_child_bounds() {
  let config = unit_config();
  let mut key = OctantKey::ROOT;
  let mut bounds = config.root_bounds();
  for octant in [3u8, 6, 1, 7] {
    key = key.child(octant).unwrap();
    bounds = bounds.child(octant);
    assert_eq!(config.key_bounds(&key), bounds, "mismatch at {:?}", key);
  }
}

/// key_at finds the containing octant and rejects outside points.
#[test]
fn test_key_at() {
  let config = unit_config();
  let key = config.key_at(DVec3::new(-7.5, 0.5, 7.9), 2).unwrap();
  assert_eq!(key, OctantKey::new(0, 2, 3, 2));
  assert!(config.key_bounds(&key).contains_point(DVec3::new(-7.5, 0.5, 7.9)));

  // The max corner belongs to the last cell.
  assert_eq!(config.key_at(DVec3::splat(8.0), 1), Some(OctantKey::new(1, 1, 1, 1)));
  assert_eq!(config.key_at(DVec3::splat(9.0), 1), None);

  // Depth is capped at max_depth.
  assert_eq!(config.key_at(DVec3::ZERO, 20).unwrap().depth, 4);
}

// =========================================================================
// Validation
// =========================================================================

#[test]
fn test_default_is_valid() {
  assert!(OctreeConfig::default().validate().is_ok());
}

#[test]
fn test_invalid_thresholds_rejected() {
  let config = OctreeConfig {
    threshold: [0.6, 0.5],
    ..Default::default()
  };
  assert!(config.validate().is_err());

  let config = OctreeConfig {
    threshold: [0.0, 0.5],
    ..Default::default()
  };
  assert!(config.validate().is_err());
}

#[test]
fn test_invalid_geometry_rejected() {
  let config = OctreeConfig {
    root_half_size: -1.0,
    ..Default::default()
  };
  assert!(config.validate().is_err());

  let config = OctreeConfig {
    max_depth: 40,
    ..Default::default()
  };
  assert!(config.validate().is_err());

  let config = OctreeConfig {
    max_depth: 2,
    preload_depth: 3,
    ..Default::default()
  };
  assert!(config.validate().is_err());
}

/// The observation FOV factor is clamped to the configured range.
#[test]
fn test_clamp_fov_factor() {
  let config = OctreeConfig::default();
  assert_eq!(config.clamp_fov_factor(0.01), 0.1);
  assert_eq!(config.clamp_fov_factor(1.0), 1.0);
  assert_eq!(config.clamp_fov_factor(10.0), 2.0);
}
