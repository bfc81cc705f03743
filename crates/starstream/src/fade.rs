//! Distance and visibility fading.
//!
//! A node's fade multiplier is the product of three factors:
//!
//! ```text
//! opacity = fade_in(d) * fade_out(d) * transition(now)
//!
//!   1 |      ______________
//!     |     /              \
//!     |    /                \
//!   0 |___/                  \______  d (x fov factor)
//!        near  far      near  far
//!        \ fade in /    \ fade out /
//! ```
//!
//! `d` is the node's distance to the camera scaled by the FOV factor, so
//! zooming in does not move the bands on screen.

use serde::{Deserialize, Serialize};

use crate::camera::CameraState;
use crate::precision::DdVec3;
use crate::scene::{NodeId, SceneNode};

/// Near/far distance pair over which opacity is linearly interpolated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FadeBand {
  pub near: f64,
  pub far: f64,
}

impl FadeBand {
  pub fn new(near: f64, far: f64) -> Self {
    Self { near, far }
  }
}

/// Per-node fade configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct FadeConfig {
  pub fade_in: Option<FadeBand>,
  pub fade_out: Option<FadeBand>,
  /// Output range of the fade-in band, `[at near, at far]`.
  pub map_in: [f64; 2],
  /// Output range of the fade-out band, `[at near, at far]`.
  pub map_out: [f64; 2],
  /// Use this node's camera distance instead of our own.
  pub position_override: Option<NodeId>,
  /// Measure the distance from this fixed absolute point instead of the node.
  pub fade_position: Option<DdVec3>,
}

impl Default for FadeConfig {
  fn default() -> Self {
    Self {
      fade_in: None,
      fade_out: None,
      map_in: [0.0, 1.0],
      map_out: [1.0, 0.0],
      position_override: None,
      fade_position: None,
    }
  }
}

impl FadeConfig {
  pub fn fade_in(near: f64, far: f64) -> Self {
    Self {
      fade_in: Some(FadeBand::new(near, far)),
      ..Default::default()
    }
  }

  pub fn fade_out(near: f64, far: f64) -> Self {
    Self {
      fade_out: Some(FadeBand::new(near, far)),
      ..Default::default()
    }
  }

  pub fn with_fade_out(mut self, near: f64, far: f64) -> Self {
    self.fade_out = Some(FadeBand::new(near, far));
    self
  }

  pub fn with_map_in(mut self, at_near: f64, at_far: f64) -> Self {
    self.map_in = [at_near, at_far];
    self
  }

  pub fn with_map_out(mut self, at_near: f64, at_far: f64) -> Self {
    self.map_out = [at_near, at_far];
    self
  }

  pub fn with_position_override(mut self, node: NodeId) -> Self {
    self.position_override = Some(node);
    self
  }

  pub fn with_fade_position(mut self, position: DdVec3) -> Self {
    self.fade_position = Some(position);
    self
  }

  /// Whether any distance band is configured.
  #[inline]
  pub fn is_active(&self) -> bool {
    self.fade_in.is_some() || self.fade_out.is_some()
  }

  /// Product of the band factors at `distance`, in `[0, 1]`.
  pub fn band_factor(&self, distance: f64) -> f64 {
    let mut factor = 1.0;
    if let Some(band) = self.fade_in {
      factor *= linear_map(distance, band.near, band.far, self.map_in[0], self.map_in[1]).clamp(0.0, 1.0);
    }
    if let Some(band) = self.fade_out {
      factor *= linear_map(distance, band.near, band.far, self.map_out[0], self.map_out[1]).clamp(0.0, 1.0);
    }
    factor
  }
}

/// Map `x` from `[x0, x1]` to `[y0, y1]`, clamped to the output range.
///
/// A degenerate input range acts as a step at `x0`.
pub fn linear_map(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
  if x.is_nan() {
    return y0;
  }
  if x1 == x0 {
    return if x < x0 { y0 } else { y1 };
  }
  let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
  y0 + (y1 - y0) * t
}

/// Opacity factor of a visibility toggle `elapsed` into its transition.
///
/// Outside the transition window the factor is exactly 0 or 1.
pub fn visibility_factor(visible: bool, last_change_ms: Option<u64>, now_ms: u64, duration_ms: u64) -> f32 {
  let settled = if visible { 1.0 } else { 0.0 };
  let Some(changed) = last_change_ms else {
    return settled;
  };
  let elapsed = now_ms.saturating_sub(changed);
  if duration_ms == 0 || elapsed >= duration_ms {
    return settled;
  }
  let t = (elapsed as f64 / duration_ms as f64) as f32;
  if visible {
    t
  } else {
    1.0 - t
  }
}

/// Computes per-node fade multipliers for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FadeController {
  pub fade_duration_ms: u64,
}

impl FadeController {
  pub fn new(fade_duration_ms: u64) -> Self {
    Self { fade_duration_ms }
  }

  /// Distance driving the node's fade bands.
  ///
  /// `override_distance` is the camera distance of the node named by
  /// [`FadeConfig::position_override`], resolved by the caller.
  pub fn current_distance(&self, node: &SceneNode, override_distance: Option<f64>, camera: &CameraState) -> f64 {
    if let Some(d) = override_distance {
      return d;
    }
    match node.fade.as_ref().and_then(|f| f.fade_position) {
      Some(p) => p.distance(&camera.position) * camera.fov_factor,
      None => node.cumulative_translation.length() * camera.fov_factor,
    }
  }

  /// Fade multiplier for `node` in `[0, 1]`.
  ///
  /// Expects `node.cumulative_translation` to be current. The visibility
  /// transition factor is always folded in, with or without fade bands.
  pub fn compute_opacity(
    &self,
    node: &SceneNode,
    override_distance: Option<f64>,
    camera: &CameraState,
    now_ms: u64,
  ) -> f32 {
    let mut opacity = 1.0_f64;
    if let Some(fade) = node.fade.as_ref().filter(|f| f.is_active()) {
      let distance = self.current_distance(node, override_distance, camera);
      opacity *= fade.band_factor(distance);
    }
    let transition = self.visibility_factor(node, now_ms);
    ((opacity as f32) * transition).clamp(0.0, 1.0)
  }

  #[inline]
  pub fn visibility_factor(&self, node: &SceneNode, now_ms: u64) -> f32 {
    visibility_factor(node.visible, node.last_visibility_change_ms, now_ms, self.fade_duration_ms)
  }
}

impl Default for FadeController {
  fn default() -> Self {
    Self::new(crate::config::SceneSettings::default().fade_duration_ms)
  }
}

#[cfg(test)]
#[path = "fade_test.rs"]
mod fade_test;
