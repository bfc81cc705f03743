//! Error types.
//!
//! Only [`ConfigError`] and [`SceneError`] surface to callers as hard
//! failures. The per-frame kinds ([`CoordinateError`], [`LoadError`],
//! [`TransformError`]) are recovered inside the update pass and counted in
//! the frame report.

use std::path::PathBuf;

use thiserror::Error;

use crate::octree::OctantKey;
use crate::scene::NodeId;

/// Scene graph lookups and structural edits.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
  #[error("node {0:?} does not exist")]
  NodeNotFound(NodeId),
  #[error("no node named '{0}'")]
  NameNotFound(String),
  #[error("the root node cannot be removed")]
  RootRemoval,
  #[error("node {0:?} already owns an octree branch")]
  OctreeAlreadyAttached(NodeId),
  #[error("node {0:?} is not an octree branch node")]
  NotOctreeBranch(NodeId),
}

/// A time-dependent coordinate provider cannot resolve the instant.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinateError {
  #[error("time {time} outside valid range [{start}, {end}]")]
  OutOfRange { time: f64, start: f64, end: f64 },
  #[error("provider has no samples")]
  Empty,
}

/// The catalog loader failed to materialise an octant.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("octant {key:?}: {message}")]
  Catalog { key: OctantKey, message: String },
  #[error("octant {key:?}: i/o failure")]
  Io {
    key: OctantKey,
    #[source]
    source: std::io::Error,
  },
}

/// A local transform could not be built for this frame.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum TransformError {
  #[error("transform is not finite")]
  NonFinite,
  #[error("scale {0} cannot be inverted")]
  Singular(f64),
  #[error("orientation is not a usable rotation")]
  DegenerateRotation,
}

/// Configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config TOML")]
  Parse(#[from] toml::de::Error),
  #[error("invalid config: {0}")]
  Invalid(String),
  #[error("failed to build loader thread pool")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
