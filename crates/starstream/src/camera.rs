//! Per-frame inputs read from the camera and time collaborators.
//!
//! Both are captured once at the start of a frame and passed by value, so the
//! update pass never observes a camera or clock changing under it.

use glam::DVec3;

use crate::precision::DdVec3;
use crate::scene::NodeId;

/// Field of view, in degrees, at which the FOV factor equals 1.
pub const REFERENCE_FOV_DEGREES: f64 = 40.0;

/// Camera snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraState {
  /// Absolute position in extended precision.
  pub position: DdVec3,
  /// Unit view direction.
  pub direction: DVec3,
  /// Vertical field of view in degrees.
  pub fov_degrees: f64,
  /// Zoom factor folded into distances and angles (`fov / 40°`).
  pub fov_factor: f64,
  /// Node the camera is focused on, if any. Octants containing it are
  /// always considered observed.
  pub focus: Option<NodeId>,
}

impl CameraState {
  pub fn new(position: DdVec3) -> Self {
    Self {
      position,
      direction: DVec3::NEG_Z,
      fov_degrees: REFERENCE_FOV_DEGREES,
      fov_factor: 1.0,
      focus: None,
    }
  }

  /// Set the view direction (normalized; zero vectors keep the old one).
  pub fn with_direction(mut self, direction: DVec3) -> Self {
    if let Some(dir) = direction.try_normalize() {
      self.direction = dir;
    }
    self
  }

  /// Set the field of view and derive the matching FOV factor.
  pub fn with_fov(mut self, fov_degrees: f64) -> Self {
    self.fov_degrees = fov_degrees;
    self.fov_factor = fov_degrees / REFERENCE_FOV_DEGREES;
    self
  }

  pub fn with_focus(mut self, focus: NodeId) -> Self {
    self.focus = Some(focus);
    self
  }

  /// Negated position: the root translation under the floating origin.
  #[inline]
  pub fn inverse_position(&self) -> DdVec3 {
    -self.position
  }

  #[inline]
  pub fn is_focus(&self, node: NodeId) -> bool {
    self.focus == Some(node)
  }
}

/// Simulation time snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeState {
  /// Current simulation instant, seconds since the catalog epoch.
  pub instant: f64,
  /// Simulation seconds elapsed since the previous frame.
  pub delta: f64,
}

impl TimeState {
  pub fn new(instant: f64, delta: f64) -> Self {
    Self { instant, delta }
  }

  /// Whether simulation time moved since the previous frame. Gates
  /// coordinate recomputation.
  #[inline]
  pub fn advanced(&self) -> bool {
    self.delta != 0.0
  }
}

/// Simple warpable simulation clock.
#[derive(Clone, Debug)]
pub struct SimulationClock {
  instant: f64,
  /// Simulation seconds per real second.
  pub warp: f64,
  paused: bool,
}

impl SimulationClock {
  pub fn new(instant: f64) -> Self {
    Self {
      instant,
      warp: 1.0,
      paused: false,
    }
  }

  pub fn pause(&mut self) {
    self.paused = true;
  }

  pub fn resume(&mut self) {
    self.paused = false;
  }

  /// Advance by `real_dt` seconds of wall-clock time.
  pub fn tick(&mut self, real_dt: f64) -> TimeState {
    let delta = if self.paused { 0.0 } else { real_dt * self.warp };
    self.instant += delta;
    TimeState::new(self.instant, delta)
  }

  pub fn now(&self) -> f64 {
    self.instant
  }
}
