//! OctantKey - immutable value type addressing one octant.
//!
//! Octants are identified by their grid coordinates at their own depth.
//! Depth 0 = the root cube, each level halves the edge length.

/// Octant address. Coordinates are in `[0, 2^depth)` on each axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct OctantKey {
  /// Grid X position at this depth
  pub x: u32,
  /// Grid Y position at this depth
  pub y: u32,
  /// Grid Z position at this depth
  pub z: u32,
  /// Depth below the root (0 = root)
  pub depth: u8,
}

impl OctantKey {
  pub const ROOT: OctantKey = OctantKey {
    x: 0,
    y: 0,
    z: 0,
    depth: 0,
  };

  /// Deepest level addressable with `u32` coordinates.
  pub const MAX_DEPTH: u8 = 31;

  pub fn new(x: u32, y: u32, z: u32, depth: u8) -> Self {
    Self { x, y, z, depth }
  }

  /// Child octant (one level deeper).
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
  /// - bit 0: X offset (0 or 1)
  /// - bit 1: Y offset (0 or 1)
  /// - bit 2: Z offset (0 or 1)
  ///
  /// Returns None past [`MAX_DEPTH`](Self::MAX_DEPTH) or for octant > 7.
  pub fn child(&self, octant: u8) -> Option<Self> {
    if self.depth >= Self::MAX_DEPTH || octant > 7 {
      return None;
    }
    Some(Self {
      x: self.x * 2 + (octant & 1) as u32,
      y: self.y * 2 + ((octant >> 1) & 1) as u32,
      z: self.z * 2 + ((octant >> 2) & 1) as u32,
      depth: self.depth + 1,
    })
  }

  /// Parent octant. None for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.depth == 0 {
      return None;
    }
    Some(Self {
      x: self.x / 2,
      y: self.y / 2,
      z: self.z / 2,
      depth: self.depth - 1,
    })
  }

  /// Which child of its parent this octant is (inverse of [`child`](Self::child)).
  #[inline]
  pub fn octant_index(&self) -> u8 {
    ((self.x & 1) | ((self.y & 1) << 1) | ((self.z & 1) << 2)) as u8
  }

  /// Whether `other` lies in the subtree rooted here (inclusive).
  pub fn contains(&self, other: &OctantKey) -> bool {
    if other.depth < self.depth {
      return false;
    }
    let shift = (other.depth - self.depth) as u32;
    other.x >> shift == self.x && other.y >> shift == self.y && other.z >> shift == self.z
  }

  /// Children listed in a child mask (bit i = child i exists).
  pub fn children_in_mask(&self, mask: u8) -> impl Iterator<Item = OctantKey> + '_ {
    (0u8..8)
      .filter(move |i| mask & (1 << i) != 0)
      .filter_map(move |i| self.child(i))
  }
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
