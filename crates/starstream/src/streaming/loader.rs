//! Catalog loader interface and the records it produces.

use glam::DVec3;

use crate::error::LoadError;
use crate::octree::{DAabb3, OctantKey, OctantSkeleton};
use crate::precision::DdVec3;
use crate::scene::{ComponentMask, LinearMotion, NodeKind, SceneNode};

/// Region descriptor handed to the loader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctantRegion {
  pub key: OctantKey,
  pub bounds: DAabb3,
}

/// One catalog object as delivered by a loader.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
  pub name: Option<String>,
  /// Position in the octree's frame.
  pub position: DdVec3,
  pub size: f64,
  pub kind: NodeKind,
  pub component: ComponentMask,
  /// Internal units per simulation second. Zero for static objects.
  pub velocity: DVec3,
  /// Simulation instant at which `position` holds.
  pub epoch: f64,
}

impl ObjectRecord {
  /// Point-like star record.
  pub fn star(position: DdVec3, radius: f64) -> Self {
    Self {
      name: None,
      position,
      size: radius,
      kind: NodeKind::Particle { radius },
      component: ComponentMask::STARS,
      velocity: DVec3::ZERO,
      epoch: 0.0,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_motion(mut self, velocity: DVec3, epoch: f64) -> Self {
    self.velocity = velocity;
    self.epoch = epoch;
    self
  }

  /// Build the scene node materialising this record. Moving records get a
  /// proper-motion coordinate provider. Unnamed records stay out of the
  /// name index.
  pub fn into_node(self) -> SceneNode {
    let mut node = SceneNode::new(self.name.unwrap_or_default(), self.kind)
      .with_position(self.position)
      .with_size(self.size)
      .with_component(self.component);
    node.names.retain(|n| !n.is_empty());
    if self.velocity != DVec3::ZERO {
      node = node.with_coordinates(LinearMotion::new(self.position, self.velocity, self.epoch));
    }
    node
  }
}

/// Source of octant payloads. Called from loader worker threads.
pub trait CatalogLoader: OctantSkeleton + Send + Sync {
  fn load_octant(&self, region: &OctantRegion) -> Result<Vec<ObjectRecord>, LoadError>;
}
