//! Octree spatial index over star/particle catalogs.
//!
//! Octants are created lazily as traversal reaches them: the catalog only
//! has to describe its structure through [`OctantSkeleton`]. Object payloads
//! are loaded and evicted by the [`streaming`](crate::streaming) cache while
//! the skeleton persists.
//!
//! # Depth Convention
//!
//! Depth 0 = the root cube, deeper = smaller octants.
//!
//! ```text
//! Octant Size = 2 * root_half_size / 2^depth
//! ```
//!
//! # Module Structure
//!
//! - [`key`]: `OctantKey` - immutable octant address
//! - [`bounds`]: `DAabb3` - double-precision bounds
//! - [`config`]: `OctreeConfig` - root cube, thresholds, eviction policy
//! - [`status`]: `LoadStatus` and the lock-free flags shared with workers
//! - [`octant`]: `Octant` - per-octant state
//! - [`index`]: `OctreeIndex` - observation, roulette list, load/evict

pub mod bounds;
pub mod config;
pub mod index;
pub mod key;
pub mod octant;
pub mod status;

pub use bounds::DAabb3;
pub use config::OctreeConfig;
pub use index::{
  DepthStats, LoadRequest, Observation, OctantSkeleton, OctreeIndex, OctreeView, RouletteEntry,
};
pub use key::OctantKey;
pub use octant::Octant;
pub use status::{LoadStatus, OctantShared};
