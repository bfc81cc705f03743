//! SceneNode - one element of the scene graph.
//!
//! Nodes live in the [`SceneGraph`](super::SceneGraph) arena and refer to each
//! other only through [`NodeId`]s. A removed node leaves dangling ids behind;
//! every lookup tolerates them.

use std::ops::{BitOr, BitOrAssign};

use glam::{Mat4, Quat};
use serde::{Deserialize, Serialize};

use super::coordinates::CoordinateProvider;
use crate::fade::FadeConfig;
use crate::lod::LodTag;
use crate::precision::DdVec3;

slotmap::new_key_type! {
  /// Stable handle to a node in the scene arena.
  pub struct NodeId;
}

/// Category bitset used for toggling whole classes of objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentMask(pub u32);

impl ComponentMask {
  pub const NONE: Self = Self(0);
  pub const STARS: Self = Self(1 << 0);
  pub const PLANETS: Self = Self(1 << 1);
  pub const MOONS: Self = Self(1 << 2);
  pub const GALAXIES: Self = Self(1 << 3);
  pub const CLUSTERS: Self = Self(1 << 4);
  pub const ORBITS: Self = Self(1 << 5);
  pub const OTHERS: Self = Self(1 << 6);
  pub const ALL: Self = Self(u32::MAX);

  #[inline]
  pub fn contains(self, other: ComponentMask) -> bool {
    self.0 & other.0 == other.0
  }

  #[inline]
  pub fn intersects(self, other: ComponentMask) -> bool {
    self.0 & other.0 != 0
  }

  #[inline]
  pub fn insert(&mut self, other: ComponentMask) {
    self.0 |= other.0;
  }

  #[inline]
  pub fn remove(&mut self, other: ComponentMask) {
    self.0 &= !other.0;
  }
}

impl Default for ComponentMask {
  fn default() -> Self {
    Self::OTHERS
  }
}

impl BitOr for ComponentMask {
  type Output = ComponentMask;

  fn bitor(self, rhs: ComponentMask) -> ComponentMask {
    ComponentMask(self.0 | rhs.0)
  }
}

impl BitOrAssign for ComponentMask {
  fn bitor_assign(&mut self, rhs: ComponentMask) {
    self.0 |= rhs.0;
  }
}

/// Per-frame update strategy, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
  /// Pure grouping node (reference frames, catalogs). Never rendered.
  Group,
  /// Full 3-D model. `model_size` scales `size` for solid-angle purposes.
  Model { model_size: f64 },
  /// Screen-space billboard, typically the far-away stand-in of a model.
  Billboard,
  /// Point-like object (star, particle). Uses the reference-radius solid
  /// angle because sprites have no physical silhouette.
  Particle { radius: f64 },
  /// Catalog subtree whose children come from an octree roulette list.
  OctreeBranch,
}

impl NodeKind {
  /// Children are driven by an octree instead of the static list.
  #[inline]
  pub fn has_octree_children(&self) -> bool {
    matches!(self, NodeKind::OctreeBranch)
  }

  #[inline]
  pub fn is_particle(&self) -> bool {
    matches!(self, NodeKind::Particle { .. })
  }

  /// Whether the node itself produces a render item.
  #[inline]
  pub fn is_renderable(&self) -> bool {
    !matches!(self, NodeKind::Group | NodeKind::OctreeBranch)
  }

  /// Multiplier applied to `size` before computing the solid angle.
  #[inline]
  pub fn solid_angle_size_factor(&self) -> f64 {
    match self {
      NodeKind::Model { model_size } => *model_size,
      _ => 1.0,
    }
  }
}

/// Scene graph node.
pub struct SceneNode {
  /// Arena handle, assigned on insertion.
  pub id: NodeId,
  /// Names, first one is the display name. Lookups are case-insensitive.
  pub names: Vec<String>,
  pub kind: NodeKind,
  pub component_mask: ComponentMask,

  /// Position in the parent's frame. For children of the root this is the
  /// absolute position relative to the catalog origin.
  pub position: DdVec3,
  /// Radius in internal units.
  pub size: f64,
  pub orientation: Quat,
  /// Opacity after the last update pass, in `[0, 1]`.
  pub opacity: f32,

  /// Camera-relative position after the last traversal.
  pub cumulative_translation: DdVec3,
  /// GPU-facing transform built from the camera-relative translation, size
  /// and orientation.
  pub local_transform: Mat4,

  pub parent: Option<NodeId>,
  pub children: Vec<NodeId>,

  // Derived each frame, never meaningful across frames.
  pub distance_to_camera: f64,
  pub solid_angle: f64,
  pub apparent_solid_angle: f64,
  pub lod: LodTag,

  pub visible: bool,
  /// Frame clock (ms) of the last visibility toggle. `None` = never toggled.
  pub last_visibility_change_ms: Option<u64>,

  pub fade: Option<FadeConfig>,
  /// Alternative representation of the parent: receives `1 - parent
  /// opacity` so exactly one of the two is visible at a time.
  pub exclusive_with_parent: bool,
  /// Set when this node's opacity is zero; its subtree skips the expensive
  /// per-node work. Recomputed every frame.
  pub no_process: bool,

  pub coordinates: Option<Box<dyn CoordinateProvider>>,
  /// The provider has not been evaluated since it was set. Resolved on the
  /// next update even while simulation time is paused.
  pub coordinates_pending: bool,
  /// The coordinate provider could not resolve the current instant; the
  /// position is the last good one.
  pub time_overflow: bool,
}

impl SceneNode {
  pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
    Self {
      id: NodeId::default(),
      names: vec![name.into()],
      kind,
      component_mask: ComponentMask::default(),
      position: DdVec3::ZERO,
      size: 1.0,
      orientation: Quat::IDENTITY,
      opacity: 0.0,
      cumulative_translation: DdVec3::ZERO,
      local_transform: Mat4::IDENTITY,
      parent: None,
      children: Vec::new(),
      distance_to_camera: f64::INFINITY,
      solid_angle: 0.0,
      apparent_solid_angle: 0.0,
      lod: LodTag::Hidden,
      visible: true,
      last_visibility_change_ms: None,
      fade: None,
      exclusive_with_parent: false,
      no_process: false,
      coordinates: None,
      coordinates_pending: false,
      time_overflow: false,
    }
  }

  /// Grouping node. Groups belong to every component so toggling a
  /// category only affects the nodes tagged with it.
  pub fn group(name: impl Into<String>) -> Self {
    Self::new(name, NodeKind::Group).with_component(ComponentMask::ALL)
  }

  pub fn with_position(mut self, position: DdVec3) -> Self {
    self.position = position;
    self
  }

  pub fn with_size(mut self, size: f64) -> Self {
    self.size = size;
    self
  }

  pub fn with_orientation(mut self, orientation: Quat) -> Self {
    self.orientation = orientation;
    self
  }

  pub fn with_component(mut self, mask: ComponentMask) -> Self {
    self.component_mask = mask;
    self
  }

  pub fn with_fade(mut self, fade: FadeConfig) -> Self {
    self.fade = Some(fade);
    self
  }

  pub fn with_coordinates(mut self, provider: impl CoordinateProvider + 'static) -> Self {
    self.set_coordinates(provider);
    self
  }

  /// Replace the coordinate provider. The new one is resolved on the next
  /// update.
  pub fn set_coordinates(&mut self, provider: impl CoordinateProvider + 'static) {
    self.coordinates = Some(Box::new(provider));
    self.coordinates_pending = true;
  }

  pub fn with_alias(mut self, name: impl Into<String>) -> Self {
    self.names.push(name.into());
    self
  }

  pub fn exclusive_with_parent(mut self) -> Self {
    self.exclusive_with_parent = true;
    self
  }

  pub fn name(&self) -> &str {
    self.names.first().map(String::as_str).unwrap_or("")
  }

  /// Toggle visibility, starting a fade transition at `now_ms`.
  pub fn set_visible(&mut self, visible: bool, now_ms: u64) {
    if self.visible != visible {
      self.visible = visible;
      self.last_visibility_change_ms = Some(now_ms);
    }
  }

  #[inline]
  pub fn has_fade(&self) -> bool {
    self.fade.as_ref().is_some_and(FadeConfig::is_active)
  }
}

impl std::fmt::Debug for SceneNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SceneNode")
      .field("id", &self.id)
      .field("name", &self.name())
      .field("kind", &self.kind)
      .field("opacity", &self.opacity)
      .field("children", &self.children.len())
      .finish_non_exhaustive()
  }
}
