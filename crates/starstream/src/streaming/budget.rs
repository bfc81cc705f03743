//! Per-frame and memory limits for the streaming cache.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Streaming limits. A value of 0 for the per-frame counts means unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingBudget {
  /// Loads dispatched to workers per frame.
  pub loads_per_frame: usize,
  /// Octants evicted per frame.
  pub evictions_per_frame: usize,
  /// Soft cap on resident catalog objects.
  pub max_resident_objects: usize,
  /// Eviction under memory pressure stops at this fraction of the cap.
  pub low_water_ratio: f64,
  /// Pending loads kept; the lowest priority is dropped beyond this.
  pub queue_capacity: usize,
  /// Loader threads. 0 runs loads inline on the update thread.
  pub worker_threads: usize,
  /// Consecutive failures of one octant before it is reported at `warn`.
  pub failure_warn_threshold: u32,
}

impl StreamingBudget {
  pub const DEFAULT: Self = Self {
    loads_per_frame: 8,
    evictions_per_frame: 16,
    max_resident_objects: 2_000_000,
    low_water_ratio: 0.85,
    queue_capacity: 100,
    worker_threads: 2,
    failure_warn_threshold: 3,
  };

  /// Unlimited, inline budget for tests and tools.
  pub const UNLIMITED_INLINE: Self = Self {
    loads_per_frame: 0,
    evictions_per_frame: 0,
    max_resident_objects: usize::MAX,
    low_water_ratio: 0.85,
    queue_capacity: usize::MAX,
    worker_threads: 0,
    failure_warn_threshold: 3,
  };

  #[inline]
  pub fn can_load(&self, performed: usize) -> bool {
    self.loads_per_frame == 0 || performed < self.loads_per_frame
  }

  #[inline]
  pub fn can_evict(&self, performed: usize) -> bool {
    self.evictions_per_frame == 0 || performed < self.evictions_per_frame
  }

  /// Resident count eviction aims for once the soft cap is exceeded.
  #[inline]
  pub fn low_water_mark(&self) -> usize {
    (self.max_resident_objects as f64 * self.low_water_ratio) as usize
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.low_water_ratio > 0.0 && self.low_water_ratio <= 1.0) {
      return Err(ConfigError::Invalid(format!(
        "streaming low_water_ratio must be in (0, 1], got {}",
        self.low_water_ratio
      )));
    }
    if self.queue_capacity == 0 {
      return Err(ConfigError::Invalid("streaming queue_capacity must be at least 1".into()));
    }
    Ok(())
  }
}

impl Default for StreamingBudget {
  fn default() -> Self {
    Self::DEFAULT
  }
}
