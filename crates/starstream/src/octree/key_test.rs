use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::*;

fn hash_of(key: &OctantKey) -> u64 {
  let mut hasher = DefaultHasher::new();
  key.hash(&mut hasher);
  hasher.finish()
}

/// Equal keys hash equally (HashMap invariant).
#[test]
fn test_key_hash_consistency() {
  let a = OctantKey::new(10, 20, 30, 5);
  let b = OctantKey::new(10, 20, 30, 5);
  assert_eq!(a, b);
  assert_eq!(hash_of(&a), hash_of(&b));
  assert_ne!(a, OctantKey::new(10, 20, 30, 6));
}

/// All 8 children sit one level deeper at the expected coordinates.
#[test]
fn test_child_all_octants() {
  let parent = OctantKey::new(3, 4, 5, 3);
  for octant in 0u8..8 {
    let child = parent
      .child(octant)
      .unwrap_or_else(|| panic!("Octant {} should return a child", octant));

    assert_eq!(child.x, parent.x * 2 + (octant & 1) as u32);
    assert_eq!(child.y, parent.y * 2 + ((octant >> 1) & 1) as u32);
    assert_eq!(child.z, parent.z * 2 + ((octant >> 2) & 1) as u32);
    assert_eq!(child.depth, 4);
    assert_eq!(child.octant_index(), octant);
    assert_eq!(child.parent(), Some(parent));
  }
}

/// The root has no parent; the deepest level has no children.
#[test]
fn test_bounds_of_hierarchy() {
  assert_eq!(OctantKey::ROOT.parent(), None);
  let deepest = OctantKey::new(0, 0, 0, OctantKey::MAX_DEPTH);
  assert_eq!(deepest.child(0), None);
  assert_eq!(OctantKey::ROOT.child(8), None);
}

/// Subtree containment follows the coordinate prefix.
#[test]
fn test_contains() {
  let root = OctantKey::ROOT;
  let a = root.child(3).unwrap();
  let a_child = a.child(5).unwrap();
  let b = root.child(4).unwrap();

  assert!(root.contains(&a_child));
  assert!(a.contains(&a_child));
  assert!(a.contains(&a));
  assert!(!b.contains(&a_child));
  assert!(!a_child.contains(&a));
}

/// Only children whose bit is set are produced, in octant order.
#[test]
fn test_children_in_mask() {
  let root = OctantKey::ROOT;
  let children: Vec<_> = root.children_in_mask(0b1000_0101).collect();
  assert_eq!(
    children,
    vec![root.child(0).unwrap(), root.child(2).unwrap(), root.child(7).unwrap()]
  );
  assert_eq!(root.children_in_mask(0).count(), 0);
}
