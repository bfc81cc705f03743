//! Extended-precision positions for scenes spanning meters to gigaparsecs.
//!
//! A plain `f64` carries ~16 significant digits. At gigaparsec distances
//! (~3e25 m) that leaves a resolution of several million kilometres, far too
//! coarse to place a planet next to a camera. Every absolute position is
//! therefore stored as a double-double: an unevaluated sum `hi + lo` where
//! `|lo| <= ulp(hi) / 2`, giving ~32 significant digits.
//!
//! # Floating origin
//!
//! ```text
//!   absolute (DdVec3)          camera (DdVec3)
//!   ┌──────────────┐           ┌──────────────┐
//!   │ hi: 3.1e25   │   minus   │ hi: 3.1e25   │
//!   │ lo: 1.2e9    │           │ lo: 0.7e9    │
//!   └──────┬───────┘           └──────┬───────┘
//!          └───────── hi - hi ────────┘  (exact, Sterbenz)
//!                         + (lo - lo)
//!                         ▼
//!                 camera-relative DVec3 ──► Vec3 for the GPU
//! ```
//!
//! Arithmetic never panics; NaN and infinities propagate and callers guard.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Error-free transformation: `a + b = s + e` exactly.
#[inline]
pub fn two_sum(a: f64, b: f64) -> (f64, f64) {
  let s = a + b;
  let bb = s - a;
  let e = (a - (s - bb)) + (b - bb);
  (s, e)
}

/// Fast variant of [`two_sum`], valid when `|a| >= |b|`.
#[inline]
pub fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
  let s = a + b;
  let e = b - (s - a);
  (s, e)
}

/// Error-free product: `a * b = p + e` exactly (uses fused multiply-add).
#[inline]
pub fn two_prod(a: f64, b: f64) -> (f64, f64) {
  let p = a * b;
  let e = a.mul_add(b, -p);
  (p, e)
}

/// Double-double scalar: `hi + lo` with `|lo| <= ulp(hi) / 2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dd {
  /// High-magnitude component.
  pub hi: f64,
  /// Precision-refinement component.
  pub lo: f64,
}

impl Dd {
  pub const ZERO: Self = Self { hi: 0.0, lo: 0.0 };
  pub const ONE: Self = Self { hi: 1.0, lo: 0.0 };

  /// Build from an unnormalised pair.
  #[inline]
  pub fn new(hi: f64, lo: f64) -> Self {
    let (hi, lo) = two_sum(hi, lo);
    Self { hi, lo }
  }

  #[inline]
  pub fn from_f64(value: f64) -> Self {
    Self { hi: value, lo: 0.0 }
  }

  /// Nearest `f64` to the represented value.
  #[inline]
  pub fn to_f64(self) -> f64 {
    self.hi + self.lo
  }

  #[inline]
  pub fn is_finite(self) -> bool {
    self.hi.is_finite() && self.lo.is_finite()
  }

  #[inline]
  pub fn abs(self) -> Self {
    if self.hi < 0.0 {
      -self
    } else {
      self
    }
  }

  /// Multiply by a plain `f64` without losing the refinement term.
  #[inline]
  pub fn mul_f64(self, rhs: f64) -> Self {
    let (p, e) = two_prod(self.hi, rhs);
    let e = e + self.lo * rhs;
    let (hi, lo) = quick_two_sum(p, e);
    Self { hi, lo }
  }

  /// Square root via one Newton step on the high part.
  pub fn sqrt(self) -> Self {
    if self.hi == 0.0 {
      return Self::ZERO;
    }
    let approx = self.hi.sqrt();
    if !approx.is_finite() {
      // Negative input (NaN) or infinity: propagate.
      return Self::from_f64(approx);
    }
    let (p, e) = two_prod(approx, approx);
    let residual = self - Dd { hi: p, lo: e };
    let correction = residual.hi / (2.0 * approx);
    let (hi, lo) = quick_two_sum(approx, correction);
    Self { hi, lo }
  }
}

impl From<f64> for Dd {
  fn from(value: f64) -> Self {
    Self::from_f64(value)
  }
}

impl Add for Dd {
  type Output = Dd;

  #[inline]
  fn add(self, rhs: Dd) -> Dd {
    let (s, e) = two_sum(self.hi, rhs.hi);
    let (t, f) = two_sum(self.lo, rhs.lo);
    let (s, e) = quick_two_sum(s, e + t);
    let (hi, lo) = quick_two_sum(s, e + f);
    Dd { hi, lo }
  }
}

impl Sub for Dd {
  type Output = Dd;

  #[inline]
  fn sub(self, rhs: Dd) -> Dd {
    self + (-rhs)
  }
}

impl Neg for Dd {
  type Output = Dd;

  #[inline]
  fn neg(self) -> Dd {
    Dd {
      hi: -self.hi,
      lo: -self.lo,
    }
  }
}

impl Mul for Dd {
  type Output = Dd;

  #[inline]
  fn mul(self, rhs: Dd) -> Dd {
    let (p, e) = two_prod(self.hi, rhs.hi);
    let e = e + (self.hi * rhs.lo + self.lo * rhs.hi);
    let (hi, lo) = quick_two_sum(p, e);
    Dd { hi, lo }
  }
}

impl Div for Dd {
  type Output = Dd;

  fn div(self, rhs: Dd) -> Dd {
    let q1 = self.hi / rhs.hi;
    let r = self - rhs.mul_f64(q1);
    let q2 = r.hi / rhs.hi;
    let r = r - rhs.mul_f64(q2);
    let q3 = r.hi / rhs.hi;
    let (hi, lo) = quick_two_sum(q1, q2);
    Dd { hi, lo } + Dd::from_f64(q3)
  }
}

/// Extended-precision three-component position.
///
/// Use for every absolute position in the scene. Convert to a plain vector
/// only once the value is camera-relative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DdVec3 {
  pub x: Dd,
  pub y: Dd,
  pub z: Dd,
}

impl DdVec3 {
  pub const ZERO: Self = Self {
    x: Dd::ZERO,
    y: Dd::ZERO,
    z: Dd::ZERO,
  };

  #[inline]
  pub fn new(x: f64, y: f64, z: f64) -> Self {
    Self {
      x: Dd::from_f64(x),
      y: Dd::from_f64(y),
      z: Dd::from_f64(z),
    }
  }

  #[inline]
  pub fn from_dvec3(v: DVec3) -> Self {
    Self::new(v.x, v.y, v.z)
  }

  #[inline]
  pub fn set(&mut self, other: &DdVec3) -> &mut Self {
    *self = *other;
    self
  }

  #[inline]
  pub fn add(&self, other: &DdVec3) -> DdVec3 {
    DdVec3 {
      x: self.x + other.x,
      y: self.y + other.y,
      z: self.z + other.z,
    }
  }

  #[inline]
  pub fn sub(&self, other: &DdVec3) -> DdVec3 {
    DdVec3 {
      x: self.x - other.x,
      y: self.y - other.y,
      z: self.z - other.z,
    }
  }

  /// Add a plain double-precision offset (velocities, local offsets).
  #[inline]
  pub fn add_dvec3(&self, offset: DVec3) -> DdVec3 {
    DdVec3 {
      x: self.x + Dd::from_f64(offset.x),
      y: self.y + Dd::from_f64(offset.y),
      z: self.z + Dd::from_f64(offset.z),
    }
  }

  #[inline]
  pub fn scale(&self, factor: f64) -> DdVec3 {
    DdVec3 {
      x: self.x.mul_f64(factor),
      y: self.y.mul_f64(factor),
      z: self.z.mul_f64(factor),
    }
  }

  /// Squared length, kept in extended precision.
  #[inline]
  pub fn length_squared_dd(&self) -> Dd {
    self.x * self.x + self.y * self.y + self.z * self.z
  }

  #[inline]
  pub fn length_dd(&self) -> Dd {
    self.length_squared_dd().sqrt()
  }

  #[inline]
  pub fn length(&self) -> f64 {
    self.length_dd().to_f64()
  }

  /// Unit vector in the same direction. Zero vectors yield NaN components.
  pub fn normalize(&self) -> DdVec3 {
    let len = self.length_dd();
    DdVec3 {
      x: self.x / len,
      y: self.y / len,
      z: self.z / len,
    }
  }

  #[inline]
  pub fn distance(&self, other: &DdVec3) -> f64 {
    self.sub(other).length()
  }

  /// Position relative to `camera`, collapsed to double precision.
  ///
  /// High components are subtracted first so nearby large-magnitude values
  /// cancel exactly, then the refinement terms are folded back in.
  #[inline]
  pub fn to_camera_relative(&self, camera: &DdVec3) -> DVec3 {
    DVec3::new(
      relative_component(self.x, camera.x),
      relative_component(self.y, camera.y),
      relative_component(self.z, camera.z),
    )
  }

  #[inline]
  pub fn to_dvec3(&self) -> DVec3 {
    DVec3::new(self.x.to_f64(), self.y.to_f64(), self.z.to_f64())
  }

  /// Single-precision view, only meaningful for camera-relative values.
  #[inline]
  pub fn to_vec3(&self) -> Vec3 {
    self.to_dvec3().as_vec3()
  }

  #[inline]
  pub fn is_finite(&self) -> bool {
    self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
  }
}

#[inline]
fn relative_component(p: Dd, c: Dd) -> f64 {
  let (s, e) = two_sum(p.hi, -c.hi);
  s + (e + (p.lo - c.lo))
}

impl From<DVec3> for DdVec3 {
  fn from(v: DVec3) -> Self {
    Self::from_dvec3(v)
  }
}

impl Add for DdVec3 {
  type Output = DdVec3;

  fn add(self, rhs: DdVec3) -> DdVec3 {
    DdVec3::add(&self, &rhs)
  }
}

impl Sub for DdVec3 {
  type Output = DdVec3;

  fn sub(self, rhs: DdVec3) -> DdVec3 {
    DdVec3::sub(&self, &rhs)
  }
}

impl Neg for DdVec3 {
  type Output = DdVec3;

  fn neg(self) -> DdVec3 {
    DdVec3 {
      x: -self.x,
      y: -self.y,
      z: -self.z,
    }
  }
}

impl Mul<f64> for DdVec3 {
  type Output = DdVec3;

  fn mul(self, rhs: f64) -> DdVec3 {
    self.scale(rhs)
  }
}

impl AddAssign for DdVec3 {
  fn add_assign(&mut self, rhs: DdVec3) {
    *self = DdVec3::add(self, &rhs);
  }
}

impl SubAssign for DdVec3 {
  fn sub_assign(&mut self, rhs: DdVec3) {
    *self = DdVec3::sub(self, &rhs);
  }
}

#[cfg(test)]
#[path = "precision_test.rs"]
mod precision_test;
