//! Update-pass statistics.
//!
//! Feature-gated and toggled per instance, so a disabled collector costs a
//! branch per record call.

use std::collections::VecDeque;

use crate::lod::LodTag;

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.capacity == 0 {
      return;
    }
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Oldest to newest.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = *self.buffer.iter().min()?;
    let max = *self.buffer.iter().max()?;
    Some((min, max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(128) // ~2 seconds at 60fps
  }
}

/// Statistics gathered by the updater.
#[derive(Debug, Clone)]
pub struct UpdateMetrics {
  enabled: bool,

  /// Submissions per LOD tag in the last frame (index = tag as usize).
  pub submitted_per_lod: [u32; 4],
  /// Update pass durations in microseconds.
  pub update_timings: RollingWindow<u64>,
  /// Catalog loader durations in microseconds.
  pub load_timings: RollingWindow<u64>,
  /// Roulette list length per frame, summed over octree branches.
  pub roulette_sizes: RollingWindow<u64>,

  pub last_update_us: u64,
  pub frames: u64,
  /// Cumulative; never reset.
  pub total_loads: u64,
  pub total_evictions: u64,
}

impl Default for UpdateMetrics {
  fn default() -> Self {
    Self {
      enabled: cfg!(feature = "metrics"),
      submitted_per_lod: [0; 4],
      update_timings: RollingWindow::default(),
      load_timings: RollingWindow::default(),
      roulette_sizes: RollingWindow::default(),
      last_update_us: 0,
      frames: 0,
      total_loads: 0,
      total_evictions: 0,
    }
  }
}

impl UpdateMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Compile-time feature and runtime toggle both on.
  #[inline]
  pub fn is_enabled(&self) -> bool {
    cfg!(feature = "metrics") && self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  /// Reset per-frame counters. Call at the start of a frame.
  pub fn begin_frame(&mut self) {
    self.submitted_per_lod = [0; 4];
  }

  pub fn record_submission(&mut self, lod: LodTag) {
    if self.is_enabled() {
      self.submitted_per_lod[lod as usize] += 1;
    }
  }

  pub fn record_update_timing(&mut self, timing_us: u64) {
    if self.is_enabled() {
      self.update_timings.push(timing_us);
      self.last_update_us = timing_us;
      self.frames += 1;
    }
  }

  pub fn record_load(&mut self, timing_us: u64) {
    if self.is_enabled() {
      self.load_timings.push(timing_us);
      self.total_loads += 1;
    }
  }

  pub fn record_roulette(&mut self, size: usize) {
    if self.is_enabled() {
      self.roulette_sizes.push(size as u64);
    }
  }

  pub fn record_evictions(&mut self, count: usize) {
    if self.is_enabled() {
      self.total_evictions += count as u64;
    }
  }

  /// Clear windows and per-frame counters. Cumulative totals survive.
  pub fn reset(&mut self) {
    self.submitted_per_lod = [0; 4];
    self.update_timings.clear();
    self.load_timings.clear();
    self.roulette_sizes.clear();
    self.last_update_us = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window_evicts_oldest() {
    let mut window = RollingWindow::new(3);
    for v in 1..=5u64 {
      window.push(v);
    }
    assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    assert_eq!(window.average(), 4.0);
    assert_eq!(window.min_max(), Some((3, 5)));
  }

  #[test]
  fn test_empty_window() {
    let window: RollingWindow<u64> = RollingWindow::default();
    assert_eq!(window.average(), 0.0);
    assert_eq!(window.min_max(), None);
  }

  #[test]
  fn test_disabled_records_nothing() {
    let mut metrics = UpdateMetrics::new();
    metrics.set_enabled(false);
    metrics.record_update_timing(100);
    metrics.record_load(50);
    assert!(metrics.update_timings.is_empty());
    assert_eq!(metrics.total_loads, 0);
  }

  #[cfg(feature = "metrics")]
  #[test]
  fn test_reset_keeps_totals() {
    let mut metrics = UpdateMetrics::new();
    metrics.record_load(10);
    metrics.record_load(30);
    metrics.record_submission(LodTag::Quad);
    assert_eq!(metrics.submitted_per_lod[LodTag::Quad as usize], 1);
    assert_eq!(metrics.load_timings.average(), 20.0);

    metrics.reset();
    assert!(metrics.load_timings.is_empty());
    assert_eq!(metrics.total_loads, 2);
  }
}
