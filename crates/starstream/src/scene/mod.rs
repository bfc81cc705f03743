//! Scene graph: nodes, the arena that owns them, and coordinate providers.
//!
//! # Module Structure
//!
//! - [`node`]: `SceneNode`, `NodeKind`, `ComponentMask`
//! - [`graph`]: `SceneGraph` - slotmap arena with a single root
//! - [`coordinates`]: `CoordinateProvider` and the built-in providers

pub mod coordinates;
pub mod graph;
pub mod node;

pub use coordinates::{CoordinateProvider, FixedPosition, Keyframes, LinearMotion};
pub use graph::{SceneGraph, ROOT_NAME};
pub use node::{ComponentMask, NodeId, NodeKind, SceneNode};
