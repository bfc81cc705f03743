//! RenderSink - submission interface for the rendering backend.
//!
//! The update pass hands every visible node to a sink once per frame. The
//! backend owns what happens next; nothing here touches a GPU.

use glam::Mat4;

use crate::lod::LodTag;
use crate::scene::{NodeId, NodeKind};

/// One node ready to draw this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderItem {
  pub node: NodeId,
  /// Camera-relative local transform.
  pub transform: Mat4,
  pub opacity: f32,
  pub lod: LodTag,
  pub kind: NodeKind,
  /// Distance to the camera in internal units, for sorting.
  pub distance: f64,
}

/// Receives render items during the update pass.
///
/// Called on the update thread only, in traversal order.
pub trait RenderSink {
  fn submit(&mut self, item: RenderItem);
}

/// Render-group queues, one per LOD tag.
#[derive(Debug, Default)]
pub struct RenderQueue {
  points: Vec<RenderItem>,
  quads: Vec<RenderItem>,
  models: Vec<RenderItem>,
}

impl RenderQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Empty every group. Call before each frame.
  pub fn clear(&mut self) {
    self.points.clear();
    self.quads.clear();
    self.models.clear();
  }

  pub fn len(&self) -> usize {
    self.points.len() + self.quads.len() + self.models.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Items submitted with `tag`. Always empty for `Hidden`.
  pub fn group(&self, tag: LodTag) -> &[RenderItem] {
    match tag {
      LodTag::Hidden => &[],
      LodTag::Point => &self.points,
      LodTag::Quad => &self.quads,
      LodTag::Model => &self.models,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
    self.points.iter().chain(&self.quads).chain(&self.models)
  }

  /// Sort the model group back to front for blending.
  pub fn sort_models_back_to_front(&mut self) {
    self
      .models
      .sort_by(|a, b| b.distance.total_cmp(&a.distance));
  }
}

impl RenderSink for RenderQueue {
  fn submit(&mut self, item: RenderItem) {
    match item.lod {
      LodTag::Hidden => {}
      LodTag::Point => self.points.push(item),
      LodTag::Quad => self.quads.push(item),
      LodTag::Model => self.models.push(item),
    }
  }
}

/// Counts submissions and drops them. For headless runs and benchmarks.
#[derive(Debug, Default)]
pub struct NullRenderSink {
  pub submitted: usize,
}

impl RenderSink for NullRenderSink {
  fn submit(&mut self, _item: RenderItem) {
    self.submitted += 1;
  }
}
