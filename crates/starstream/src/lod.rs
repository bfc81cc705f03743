//! Apparent angular size and the LOD threshold ladder.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scene::{NodeKind, SceneNode};

/// Discrete representation handed to the renderer. Ordered by detail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LodTag {
  /// Too small to render.
  #[default]
  Hidden,
  /// Screen-space point.
  Point,
  /// Screen-space quad (billboard).
  Quad,
  /// Full 3-D model.
  Model,
}

/// Angular-size thresholds in radians, compared against the apparent solid
/// angle. Must satisfy `none < quad < point`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodThresholds {
  pub threshold_none: f64,
  pub threshold_quad: f64,
  pub threshold_point: f64,
}

impl Default for LodThresholds {
  fn default() -> Self {
    Self {
      threshold_none: 1.0e-9,
      threshold_quad: 1.0e-5,
      // 0.3 degrees
      threshold_point: 5.235_987_755_982_988e-3,
    }
  }
}

impl LodThresholds {
  pub fn validate(&self) -> Result<(), ConfigError> {
    let ladder = [self.threshold_none, self.threshold_quad, self.threshold_point];
    if ladder.iter().any(|t| !t.is_finite() || *t < 0.0) {
      return Err(ConfigError::Invalid(format!(
        "lod thresholds must be finite and non-negative, got {:?}",
        ladder
      )));
    }
    if !(self.threshold_none < self.threshold_quad && self.threshold_quad < self.threshold_point) {
      return Err(ConfigError::Invalid(format!(
        "lod thresholds must increase (none < quad < point), got {:?}",
        ladder
      )));
    }
    Ok(())
  }

  /// Map an apparent solid angle onto the ladder.
  #[inline]
  pub fn classify(&self, apparent: f64) -> LodTag {
    if apparent.is_nan() || apparent < self.threshold_none {
      LodTag::Hidden
    } else if apparent < self.threshold_quad {
      LodTag::Point
    } else if apparent < self.threshold_point {
      LodTag::Quad
    } else {
      LodTag::Model
    }
  }
}

/// Angular size of a node this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolidAngles {
  pub solid_angle: f64,
  /// `solid_angle` adjusted for FOV zoom.
  pub apparent: f64,
}

/// `atan(size / distance)`. A zero distance gives a right angle.
#[inline]
pub fn solid_angle(size: f64, distance: f64) -> f64 {
  (size / distance).atan()
}

#[inline]
pub fn apparent(solid_angle: f64, fov_factor: f64) -> f64 {
  solid_angle / fov_factor
}

/// Point-sprite variant: linear in the reference radius, scaled by the
/// global brightness, no `atan`.
#[inline]
pub fn particle_solid_angle(radius: f64, distance: f64, brightness: f64, fov_factor: f64) -> SolidAngles {
  let solid_angle = radius / distance;
  SolidAngles {
    solid_angle,
    apparent: solid_angle * brightness / fov_factor,
  }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LodEvaluator {
  pub thresholds: LodThresholds,
  pub particle_brightness: f64,
}

impl LodEvaluator {
  pub fn new(thresholds: LodThresholds, particle_brightness: f64) -> Self {
    Self {
      thresholds,
      particle_brightness,
    }
  }

  /// Solid angles of `node` at its current `distance_to_camera`.
  pub fn evaluate(&self, node: &SceneNode, fov_factor: f64) -> SolidAngles {
    let distance = node.distance_to_camera;
    match node.kind {
      NodeKind::Particle { radius } => {
        particle_solid_angle(radius, distance, self.particle_brightness, fov_factor)
      }
      kind => {
        let sa = solid_angle(node.size * kind.solid_angle_size_factor(), distance);
        SolidAngles {
          solid_angle: sa,
          apparent: apparent(sa, fov_factor),
        }
      }
    }
  }

  #[inline]
  pub fn classify(&self, apparent: f64) -> LodTag {
    self.thresholds.classify(apparent)
  }
}

#[cfg(test)]
#[path = "lod_test.rs"]
mod lod_test;
