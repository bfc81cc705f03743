//! starstream - hierarchical scene update for multi-scale astronomical scenes
//!
//! Keeps objects from meters to gigaparsecs in one scene graph and updates it
//! once per frame: extended-precision camera-relative translation, opacity
//! fading, level of detail, and octree-driven streaming of large star
//! catalogs. Rendering, windowing and file formats stay outside; the crate
//! talks to them through [`render::RenderSink`] and
//! [`streaming::CatalogLoader`].
//!
//! # Features
//!
//! - **Double-double positions**: [`DdVec3`] carries ~32 significant digits
//!   and is reduced to `f32` only after camera-relative subtraction
//! - **Fade bands and visibility transitions**: distance-driven fade in/out
//!   plus timed show/hide ramps
//! - **Solid-angle LOD**: Hidden / Point / Quad / Model ladder
//! - **Octree streaming**: observed-octant traversal, prioritised background
//!   loading on rayon, grace-period and memory-pressure eviction
//!
//! # Example
//!
//! ```ignore
//! use starstream::{CameraState, DdVec3, FrameContext, RenderQueue, SceneGraph,
//!   SceneGraphUpdater, SceneNode, NodeKind, TimeState};
//!
//! let mut graph = SceneGraph::new();
//! graph.add_root(SceneNode::new("Sun", NodeKind::Model { model_size: 1.0 }));
//!
//! let mut updater = SceneGraphUpdater::default();
//! let mut queue = RenderQueue::new();
//! let ctx = FrameContext::new(CameraState::new(DdVec3::new(0.0, 0.0, 1.0e10)), TimeState::default(), 0);
//! let report = updater.update(&mut graph, &ctx, &mut queue);
//! ```

pub mod camera;
pub mod config;
pub mod error;
pub mod fade;
pub mod lod;
pub mod metrics;
pub mod octree;
pub mod precision;
pub mod render;
pub mod scene;
pub mod streaming;
pub mod units;
pub mod updater;

// Re-export commonly used items
pub use camera::{CameraState, SimulationClock, TimeState, REFERENCE_FOV_DEGREES};
pub use config::{SceneSettings, StarstreamConfig};
pub use error::{ConfigError, CoordinateError, LoadError, SceneError, TransformError};
pub use fade::{FadeBand, FadeConfig, FadeController};
pub use lod::{LodEvaluator, LodTag, LodThresholds};
pub use metrics::UpdateMetrics;
pub use octree::{LoadStatus, OctantKey, OctreeConfig, OctreeIndex, OctreeView};
pub use precision::{Dd, DdVec3};
pub use render::{NullRenderSink, RenderItem, RenderQueue, RenderSink};
pub use scene::{
  ComponentMask, CoordinateProvider, FixedPosition, Keyframes, LinearMotion, NodeId, NodeKind, SceneGraph, SceneNode,
};
pub use streaming::{
  CatalogLoader, MemoryCatalog, ObjectRecord, OctantRegion, OctreeBranch, StreamingBudget, StreamingCache,
};
pub use updater::{FrameContext, SceneGraphUpdater, UpdateReport};
