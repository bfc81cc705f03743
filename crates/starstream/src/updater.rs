//! SceneGraphUpdater - the per-frame hierarchical update pass.
//!
//! # Per-frame flow
//!
//! ```text
//!  root (translation = -camera)
//!    │ depth-first, explicit stack
//!    ▼
//!  node: coordinates(t) → translation += position → opacity (parent × fade)
//!        → distance / solid angle / LOD → transform → submit
//!    │
//!    ├─ plain node:   push children
//!    └─ octree node:  observe → enqueue/tick → apply completions
//!                     → evict → roulette → push roulette objects
//!                     (hidden owner: drain completions, evict, hide)
//! ```
//!
//! Per-node failures (stale coordinates, degenerate transforms, failed
//! loads) are counted in the [`UpdateReport`] and never abort the pass.

use std::collections::HashSet;

use glam::{Mat4, Vec3};
use tracing::{debug, info_span, trace};
use web_time::Instant;

use crate::camera::{CameraState, TimeState};
use crate::config::{SceneSettings, StarstreamConfig};
use crate::error::TransformError;
use crate::fade::FadeController;
use crate::lod::{LodEvaluator, LodTag, LodThresholds};
use crate::metrics::UpdateMetrics;
use crate::octree::{OctantKey, OctreeView};
use crate::precision::DdVec3;
use crate::render::{RenderItem, RenderSink};
use crate::scene::{ComponentMask, NodeId, SceneGraph, SceneNode};
use crate::streaming::{LoadOutcome, OctreeBranch};

/// Inputs captured once at the start of a frame.
#[derive(Clone, Debug)]
pub struct FrameContext {
  pub camera: CameraState,
  pub time: TimeState,
  /// Categories currently switched on.
  pub enabled_components: ComponentMask,
  /// Monotonic frame clock driving visibility transitions and eviction.
  pub now_ms: u64,
}

impl FrameContext {
  pub fn new(camera: CameraState, time: TimeState, now_ms: u64) -> Self {
    Self {
      camera,
      time,
      enabled_components: ComponentMask::ALL,
      now_ms,
    }
  }

  pub fn with_components(mut self, enabled: ComponentMask) -> Self {
    self.enabled_components = enabled;
    self
  }
}

/// Counts from one update pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateReport {
  /// Nodes visited.
  pub processed: usize,
  /// Items handed to the render sink.
  pub submitted: usize,
  /// Nodes that took the zero-opacity shortcut.
  pub skipped: usize,
  /// Nodes whose coordinates could not resolve this instant.
  pub stale: usize,
  /// Nodes that kept last frame's transform.
  pub degenerate: usize,
  pub octants_observed: usize,
  pub roulette_size: usize,
  pub loads_requested: usize,
  pub loads_completed: usize,
  pub loads_failed: usize,
  pub loads_cancelled: usize,
  /// Octants whose objects were dropped.
  pub evictions: usize,
}

/// Pending traversal entry.
#[derive(Clone, Copy)]
struct Frame {
  id: NodeId,
  parent_translation: DdVec3,
  parent_opacity: f32,
  /// Opacity the parent received before its own fade was applied.
  parent_input: f32,
  /// Fade of the octant an object was streamed from; 1 elsewhere.
  octant_opacity: f32,
}

/// What a processed node hands down to its children.
#[derive(Clone, Copy)]
struct NodeState {
  translation: DdVec3,
  opacity: f32,
  input: f32,
}

pub struct SceneGraphUpdater {
  fade: FadeController,
  lod: LodEvaluator,
  metrics: UpdateMetrics,
}

impl Default for SceneGraphUpdater {
  fn default() -> Self {
    Self::new(SceneSettings::default(), LodThresholds::default())
  }
}

impl SceneGraphUpdater {
  pub fn new(settings: SceneSettings, thresholds: LodThresholds) -> Self {
    Self {
      fade: FadeController::new(settings.fade_duration_ms),
      lod: LodEvaluator::new(thresholds, settings.particle_brightness),
      metrics: UpdateMetrics::new(),
    }
  }

  pub fn from_config(config: &StarstreamConfig) -> Self {
    Self::new(config.scene, config.lod)
  }

  pub fn fade(&self) -> &FadeController {
    &self.fade
  }

  pub fn lod(&self) -> &LodEvaluator {
    &self.lod
  }

  pub fn metrics(&self) -> &UpdateMetrics {
    &self.metrics
  }

  pub fn metrics_mut(&mut self) -> &mut UpdateMetrics {
    &mut self.metrics
  }

  /// Run one full update pass and submit every visible node to `sink`.
  ///
  /// The graph is fully updated when this returns; the sink sees items in
  /// traversal order.
  #[tracing::instrument(skip_all, name = "updater::update")]
  pub fn update(&mut self, graph: &mut SceneGraph, ctx: &FrameContext, sink: &mut dyn RenderSink) -> UpdateReport {
    let start = Instant::now();
    self.metrics.begin_frame();
    let mut report = UpdateReport::default();
    let refresh_coordinates = ctx.time.advanced();

    // Branches live in a side table; take it so nodes and branches can be
    // borrowed independently during the pass.
    let mut octrees = std::mem::take(&mut graph.octrees);

    let mut stack = vec![Frame {
      id: graph.root(),
      parent_translation: ctx.camera.inverse_position(),
      parent_opacity: 1.0,
      parent_input: 1.0,
      octant_opacity: 1.0,
    }];

    while let Some(frame) = stack.pop() {
      let Some(state) = self.update_node(graph, &frame, ctx, refresh_coordinates, &mut report, sink) else {
        continue;
      };

      let Some(node) = graph.nodes.get(frame.id) else {
        continue;
      };
      if !node.kind.has_octree_children() {
        stack.extend(node.children.iter().rev().map(|&child| Frame {
          id: child,
          parent_translation: state.translation,
          parent_opacity: state.opacity,
          parent_input: state.input,
          octant_opacity: 1.0,
        }));
        continue;
      }

      match octrees.get_mut(&frame.id) {
        Some(branch) if state.opacity > 0.0 => {
          self.update_octree(graph, frame.id, branch, &state, ctx, &mut report, &mut stack)
        }
        Some(branch) => self.suspend_octree(graph, frame.id, branch, ctx, &mut report),
        None => debug!(node = ?frame.id, "octree node has no branch attached"),
      }
    }

    // Drop branches whose owner was removed during the pass.
    octrees.retain(|id, _| graph.nodes.contains_key(*id));
    graph.octrees = octrees;

    let elapsed_us = start.elapsed().as_micros() as u64;
    self.metrics.record_update_timing(elapsed_us);
    self.metrics.record_roulette(report.roulette_size);
    self.metrics.record_evictions(report.evictions);
    trace!(
      processed = report.processed,
      submitted = report.submitted,
      skipped = report.skipped,
      elapsed_us,
      "update pass"
    );
    report
  }

  /// Update one node. Returns None if it no longer exists.
  fn update_node(
    &mut self,
    graph: &mut SceneGraph,
    frame: &Frame,
    ctx: &FrameContext,
    refresh_coordinates: bool,
    report: &mut UpdateReport,
    sink: &mut dyn RenderSink,
  ) -> Option<NodeState> {
    let override_distance = graph
      .nodes
      .get(frame.id)?
      .fade
      .as_ref()
      .and_then(|f| f.position_override)
      .and_then(|other| graph.nodes.get(other))
      .map(|other| other.distance_to_camera);

    let node = graph.nodes.get_mut(frame.id)?;
    report.processed += 1;

    if refresh_coordinates || node.coordinates_pending {
      refresh_position(node, ctx.time.instant);
    }
    if node.time_overflow {
      report.stale += 1;
    }

    node.cumulative_translation = frame.parent_translation + node.position;
    node.distance_to_camera = node.cumulative_translation.length();

    let inherited = if node.exclusive_with_parent {
      (frame.parent_input - frame.parent_opacity).max(0.0)
    } else {
      frame.parent_opacity
    };
    let input = inherited * frame.octant_opacity;
    let enabled = ctx.enabled_components.intersects(node.component_mask);

    let opacity = if input > 0.0 && enabled {
      input * self.fade.compute_opacity(node, override_distance, &ctx.camera, ctx.now_ms)
    } else {
      0.0
    };

    node.opacity = opacity;
    node.no_process = opacity <= 0.0;
    let state = NodeState {
      translation: node.cumulative_translation,
      opacity,
      input,
    };
    if node.no_process {
      node.lod = LodTag::Hidden;
      report.skipped += 1;
      return Some(state);
    }

    let angles = self.lod.evaluate(node, ctx.camera.fov_factor);
    node.solid_angle = angles.solid_angle;
    node.apparent_solid_angle = angles.apparent;
    node.lod = self.lod.classify(angles.apparent);

    if !node.kind.is_renderable() {
      return Some(state);
    }

    match local_transform(node) {
      Ok(transform) => node.local_transform = transform,
      Err(err) => {
        report.degenerate += 1;
        debug!(node = %node.name(), error = %err, "degenerate transform, keeping previous");
      }
    }

    if !node.time_overflow && node.lod != LodTag::Hidden {
      sink.submit(RenderItem {
        node: frame.id,
        transform: node.local_transform,
        opacity,
        lod: node.lod,
        kind: node.kind,
        distance: node.distance_to_camera,
      });
      report.submitted += 1;
      self.metrics.record_submission(node.lod);
    }
    Some(state)
  }

  /// Observation, streaming and roulette traversal for an octree-backed
  /// node. Its graph children are the streamed objects; only those in the
  /// roulette list are traversed.
  #[allow(clippy::too_many_arguments)]
  fn update_octree(
    &mut self,
    graph: &mut SceneGraph,
    owner: NodeId,
    branch: &mut OctreeBranch,
    state: &NodeState,
    ctx: &FrameContext,
    report: &mut UpdateReport,
    stack: &mut Vec<Frame>,
  ) {
    let _span = info_span!("updater::octree", node = ?owner).entered();

    let origin = ctx.camera.position + state.translation;
    let mut view = OctreeView::from_camera(&ctx.camera, &origin);
    if let Some(focus) = ctx.camera.focus {
      if let Ok(position) = graph.absolute_position(focus) {
        view = view.with_focus(position.to_camera_relative(&origin));
      }
    }

    let previous: Vec<OctantKey> = branch.index.roulette().iter().map(|e| e.key).collect();
    let observation = branch.index.mark_observed(&view, ctx.now_ms, branch.cache.loader());
    report.octants_observed += observation.observed;

    for request in observation.load_requests {
      report.loads_requested += 1;
      branch.cache.enqueue_load(request);
    }
    branch.cache.tick();
    self.apply_completions(graph, owner, branch, ctx.time.instant, report);

    evict_octants(graph, branch, &observation.eviction_candidates, report);

    branch.index.rebuild_roulette();
    let roulette = branch.index.roulette();
    report.roulette_size += roulette.len();

    // Objects of octants that left the roulette must not keep last
    // frame's opacity.
    let current: HashSet<OctantKey> = roulette.iter().map(|e| e.key).collect();
    let departed: Vec<OctantKey> = previous.into_iter().filter(|k| !current.contains(k)).collect();
    hide_octants(graph, branch, &departed);
    let roulette = branch.index.roulette();

    for entry in roulette.iter().rev() {
      let Some(octant) = branch.index.get(&entry.key) else {
        continue;
      };
      stack.extend(octant.objects.iter().rev().map(|&id| Frame {
        id,
        parent_translation: state.translation,
        parent_opacity: state.opacity,
        parent_input: state.input,
        octant_opacity: entry.opacity,
      }));
    }
  }

  /// An octree whose owner is hidden stops observing and dispatching.
  /// Outstanding completions are still settled and grace-period evictions
  /// still run, so nothing stays visible or pinned while it is off.
  fn suspend_octree(
    &mut self,
    graph: &mut SceneGraph,
    owner: NodeId,
    branch: &mut OctreeBranch,
    ctx: &FrameContext,
    report: &mut UpdateReport,
  ) {
    let previous: Vec<OctantKey> = branch.index.roulette().iter().map(|e| e.key).collect();
    if !previous.is_empty() {
      trace!(node = ?owner, octants = previous.len(), "octree owner hidden");
    }
    branch.index.clear_observed();
    self.apply_completions(graph, owner, branch, ctx.time.instant, report);
    let candidates = branch.index.eviction_candidates(ctx.now_ms);
    evict_octants(graph, branch, &candidates, report);
    hide_octants(graph, branch, &previous);
  }

  /// Materialise loaded records under `owner` and settle failed or
  /// cancelled loads.
  fn apply_completions(
    &mut self,
    graph: &mut SceneGraph,
    owner: NodeId,
    branch: &mut OctreeBranch,
    instant: f64,
    report: &mut UpdateReport,
  ) {
    for completion in branch.cache.drain_completions() {
      let key = completion.key;
      match completion.outcome {
        LoadOutcome::Loaded(records) => {
          self.metrics.record_load(completion.load_time_us);
          let mut objects = Vec::with_capacity(records.len());
          for record in records {
            let mut node = record.into_node();
            refresh_position(&mut node, instant);
            match graph.add_child(owner, node) {
              Ok(id) => objects.push(id),
              Err(err) => debug!(?key, error = %err, "octant owner vanished"),
            }
          }
          match branch.index.apply_loaded(key, objects) {
            Ok(()) => report.loads_completed += 1,
            Err(orphans) => {
              debug!(?key, objects = orphans.len(), "stale load result discarded");
              graph.remove_batch(&orphans);
            }
          }
        }
        LoadOutcome::Failed(_) => {
          branch.index.mark_load_failed(key);
          report.loads_failed += 1;
        }
        LoadOutcome::Cancelled => {
          branch.index.mark_load_cancelled(key);
          report.loads_cancelled += 1;
        }
      }
    }
  }
}

/// Resolve time-dependent coordinates. On failure the last good position
/// stays and the node is flagged stale.
fn refresh_position(node: &mut SceneNode, instant: f64) {
  let Some(resolved) = node.coordinates.as_ref().map(|c| c.position_at(instant)) else {
    return;
  };
  match resolved {
    Ok(position) => {
      node.position = position;
      node.time_overflow = false;
    }
    Err(err) => {
      if !node.time_overflow {
        debug!(node = %node.name(), error = %err, "coordinates unavailable, keeping last position");
      }
      node.time_overflow = true;
    }
  }
}

fn hide(node: &mut SceneNode) {
  node.opacity = 0.0;
  node.no_process = true;
  node.lod = LodTag::Hidden;
}

fn hide_octants(graph: &mut SceneGraph, branch: &OctreeBranch, keys: &[OctantKey]) {
  for key in keys {
    let Some(octant) = branch.index.get(key) else {
      continue;
    };
    for &id in &octant.objects {
      if let Some(node) = graph.nodes.get_mut(id) {
        hide(node);
      }
    }
  }
}

fn evict_octants(graph: &mut SceneGraph, branch: &mut OctreeBranch, candidates: &[OctantKey], report: &mut UpdateReport) {
  for key in branch.cache.plan_evictions(&branch.index, candidates) {
    let Some(objects) = branch.index.evict(key) else {
      continue;
    };
    report.evictions += 1;
    graph.remove_batch(&objects);
  }
}

/// Camera-relative model matrix from size, orientation and translation.
///
/// Invertibility is judged per factor: the uniform scale must be positive
/// in `f32` and the orientation a non-zero quaternion. The determinant is
/// `size³` and overflows `f32` for bodies beyond a few tens of AU.
fn local_transform(node: &SceneNode) -> Result<Mat4, TransformError> {
  let scale = node.size as f32;
  if !(scale.is_finite() && scale > 0.0) {
    return Err(TransformError::Singular(node.size));
  }
  let orientation = node.orientation;
  if !orientation.is_finite() || orientation.length_squared() < f32::EPSILON {
    return Err(TransformError::DegenerateRotation);
  }
  let transform = Mat4::from_scale_rotation_translation(
    Vec3::splat(scale),
    orientation.normalize(),
    node.cumulative_translation.to_vec3(),
  );
  if !transform.is_finite() {
    return Err(TransformError::NonFinite);
  }
  Ok(transform)
}

#[cfg(test)]
#[path = "updater_test.rs"]
mod updater_test;
