//! Per-octant state shared between the update thread and loader workers.
//!
//! ```text
//!              enqueue (update)          apply (update)
//!  NotLoaded ───────────────────► Loading ──────────────► Loaded
//!      ▲                            │                       │
//!      └─ cancel / fail / drop ─────┘                       │
//!      └──────────────────── evict (update) ────────────────┘
//! ```
//!
//! Workers read `observed` and report through completions; every status
//! transition happens on the update thread. An octant therefore stays
//! `Loading` until its completion is drained, which is what keeps a second
//! request for it out of the queue.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadStatus {
  NotLoaded = 0,
  Loading = 1,
  Loaded = 2,
}

impl LoadStatus {
  #[inline]
  fn from_u8(value: u8) -> Self {
    match value {
      1 => LoadStatus::Loading,
      2 => LoadStatus::Loaded,
      _ => LoadStatus::NotLoaded,
    }
  }
}

/// Lock-free status and observation flags.
#[derive(Debug)]
pub struct OctantShared {
  status: AtomicU8,
  observed: AtomicBool,
}

impl Default for OctantShared {
  fn default() -> Self {
    Self {
      status: AtomicU8::new(LoadStatus::NotLoaded as u8),
      observed: AtomicBool::new(false),
    }
  }
}

impl OctantShared {
  #[inline]
  pub fn status(&self) -> LoadStatus {
    LoadStatus::from_u8(self.status.load(Ordering::Acquire))
  }

  /// Compare-and-swap `from -> to`. Returns false if the status was not
  /// `from`.
  #[inline]
  pub fn transition(&self, from: LoadStatus, to: LoadStatus) -> bool {
    self
      .status
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  #[inline]
  pub(crate) fn force_status(&self, status: LoadStatus) {
    self.status.store(status as u8, Ordering::Release);
  }

  #[inline]
  pub fn is_observed(&self) -> bool {
    self.observed.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn set_observed(&self, observed: bool) {
    self.observed.store(observed, Ordering::Release);
  }
}
