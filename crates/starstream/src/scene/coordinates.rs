//! Time-dependent coordinate providers.
//!
//! The ephemeris math itself is external; these providers only cover the
//! shapes the update pass needs: fixed, linear (proper motion) and sampled.

use glam::DVec3;

use crate::error::CoordinateError;
use crate::precision::DdVec3;

/// Source of a node's position at a simulation instant.
pub trait CoordinateProvider: Send + Sync {
  /// Position at `time` in the parent's frame.
  ///
  /// Returns [`CoordinateError::OutOfRange`] when `time` is outside the
  /// provider's validity window.
  fn position_at(&self, time: f64) -> Result<DdVec3, CoordinateError>;
}

/// Constant position.
#[derive(Clone, Copy, Debug)]
pub struct FixedPosition(pub DdVec3);

impl CoordinateProvider for FixedPosition {
  fn position_at(&self, _time: f64) -> Result<DdVec3, CoordinateError> {
    Ok(self.0)
  }
}

/// Epoch position plus constant velocity (proper motion).
#[derive(Clone, Copy, Debug)]
pub struct LinearMotion {
  pub epoch_position: DdVec3,
  /// Internal units per simulation second.
  pub velocity: DVec3,
  pub epoch: f64,
  /// Optional validity window `[start, end]`.
  pub valid: Option<(f64, f64)>,
}

impl LinearMotion {
  pub fn new(epoch_position: DdVec3, velocity: DVec3, epoch: f64) -> Self {
    Self {
      epoch_position,
      velocity,
      epoch,
      valid: None,
    }
  }

  pub fn with_validity(mut self, start: f64, end: f64) -> Self {
    self.valid = Some((start, end));
    self
  }
}

impl CoordinateProvider for LinearMotion {
  fn position_at(&self, time: f64) -> Result<DdVec3, CoordinateError> {
    if let Some((start, end)) = self.valid {
      if time < start || time > end {
        return Err(CoordinateError::OutOfRange { time, start, end });
      }
    }
    let dt = time - self.epoch;
    Ok(self.epoch_position.add_dvec3(self.velocity * dt))
  }
}

/// Piecewise-linear interpolation between timestamped samples.
///
/// Valid only inside `[first sample, last sample]`.
#[derive(Clone, Debug)]
pub struct Keyframes {
  samples: Vec<(f64, DdVec3)>,
}

impl Keyframes {
  /// Build from samples in any order.
  pub fn new(mut samples: Vec<(f64, DdVec3)>) -> Self {
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    Self { samples }
  }

  pub fn range(&self) -> Option<(f64, f64)> {
    Some((self.samples.first()?.0, self.samples.last()?.0))
  }
}

impl CoordinateProvider for Keyframes {
  fn position_at(&self, time: f64) -> Result<DdVec3, CoordinateError> {
    let (start, end) = self.range().ok_or(CoordinateError::Empty)?;
    if time < start || time > end {
      return Err(CoordinateError::OutOfRange { time, start, end });
    }

    if self.samples.len() == 1 {
      return Ok(self.samples[0].1);
    }
    // First sample strictly after `time`; clamp so the last sample works.
    let upper = self
      .samples
      .partition_point(|(t, _)| *t <= time)
      .clamp(1, self.samples.len() - 1);
    let (t0, p0) = self.samples[upper - 1];
    let (t1, p1) = self.samples[upper];
    let span = t1 - t0;
    if span <= 0.0 {
      return Ok(p1);
    }
    let alpha = (time - t0) / span;
    Ok(p0.add(&p1.sub(&p0).scale(alpha)))
  }
}
