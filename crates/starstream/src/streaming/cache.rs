//! StreamingCache - prioritised octant loading and eviction planning.
//!
//! Follows the stage pattern: Enqueue → Tick → Drain.
//!
//! ```text
//!  enqueue_load(request)        priority heap, bounded by queue_capacity
//!  tick()                       dispatch up to loads_per_frame to workers
//!  drain_completions()          Loaded / Failed / Cancelled, non-blocking
//!  plan_evictions(index, ..)    grace-expired first, then LRU under pressure
//! ```
//!
//! Workers never touch octant status. They check the shared `observed`
//! flag before loading (cancelling if the octant dropped out of view) and
//! report through a channel; the update thread applies every transition.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};
use web_time::Instant;

use super::budget::StreamingBudget;
use super::loader::{CatalogLoader, ObjectRecord, OctantRegion};
use crate::error::{ConfigError, LoadError};
use crate::octree::{LoadRequest, LoadStatus, OctantKey, OctreeIndex};

/// What a worker produced for one request.
#[derive(Debug)]
pub enum LoadOutcome {
  Loaded(Vec<ObjectRecord>),
  Failed(LoadError),
  /// The octant was no longer observed when the worker picked it up.
  Cancelled,
}

#[derive(Debug)]
pub struct LoadCompletion {
  pub key: OctantKey,
  pub outcome: LoadOutcome,
  /// Time spent inside the loader in microseconds.
  pub load_time_us: u64,
}

/// Cumulative counters plus the current queue depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
  pub queued: usize,
  pub in_flight: usize,
  pub dispatched: u64,
  pub completed: u64,
  pub failed: u64,
  pub cancelled: u64,
  /// Requests discarded because the queue was full.
  pub dropped: u64,
  /// Octants whose consecutive failures reached the warn threshold.
  pub persistent_failures: usize,
}

struct QueuedLoad {
  request: LoadRequest,
  seq: u64,
}

impl Ord for QueuedLoad {
  /// Higher priority first, then older requests.
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .request
      .priority
      .total_cmp(&other.request.priority)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

impl PartialOrd for QueuedLoad {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for QueuedLoad {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for QueuedLoad {}

enum Executor {
  /// Loads run synchronously inside `tick`.
  Inline,
  Pool(rayon::ThreadPool),
}

/// Run one load. Called on a worker, or inline.
fn run_load(loader: &dyn CatalogLoader, request: &LoadRequest, check_observed: bool) -> LoadCompletion {
  if check_observed && !request.shared().is_observed() {
    return LoadCompletion {
      key: request.key,
      outcome: LoadOutcome::Cancelled,
      load_time_us: 0,
    };
  }

  let start = Instant::now();
  let region = OctantRegion {
    key: request.key,
    bounds: request.bounds,
  };
  let outcome = match loader.load_octant(&region) {
    Ok(records) => LoadOutcome::Loaded(records),
    Err(err) => LoadOutcome::Failed(err),
  };
  LoadCompletion {
    key: request.key,
    outcome,
    load_time_us: start.elapsed().as_micros() as u64,
  }
}

pub struct StreamingCache {
  budget: StreamingBudget,
  loader: Arc<dyn CatalogLoader>,
  executor: Executor,
  queue: BinaryHeap<QueuedLoad>,
  next_seq: u64,
  sender: Sender<LoadCompletion>,
  receiver: Receiver<LoadCompletion>,
  in_flight: usize,
  paused: bool,
  stats: StreamingStats,
  /// Consecutive failures per octant, cleared on success.
  failures: HashMap<OctantKey, u32>,
}

impl StreamingCache {
  /// Create a cache. `worker_threads == 0` runs every load inline.
  pub fn new(budget: StreamingBudget, loader: Arc<dyn CatalogLoader>) -> Result<Self, ConfigError> {
    budget.validate()?;
    let executor = if budget.worker_threads == 0 {
      Executor::Inline
    } else {
      let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(budget.worker_threads)
        .thread_name(|i| format!("starstream-loader-{i}"))
        .build()?;
      Executor::Pool(pool)
    };
    let (sender, receiver) = crossbeam_channel::unbounded();

    Ok(Self {
      budget,
      loader,
      executor,
      queue: BinaryHeap::new(),
      next_seq: 0,
      sender,
      receiver,
      in_flight: 0,
      paused: false,
      stats: StreamingStats::default(),
      failures: HashMap::new(),
    })
  }

  #[inline]
  pub fn budget(&self) -> &StreamingBudget {
    &self.budget
  }

  pub fn loader(&self) -> &dyn CatalogLoader {
    self.loader.as_ref()
  }

  /// Queue a load. When the queue is full the lowest-priority request
  /// (possibly this one) is dropped and its octant reset to `NotLoaded`.
  ///
  /// Returns false if `request` itself was dropped.
  pub fn enqueue_load(&mut self, request: LoadRequest) -> bool {
    let incoming = QueuedLoad {
      request,
      seq: self.next_seq,
    };
    self.next_seq += 1;

    if self.queue.len() < self.budget.queue_capacity {
      self.queue.push(incoming);
      return true;
    }

    self.stats.dropped += 1;
    let mut pending = std::mem::take(&mut self.queue).into_vec();
    let lowest = pending
      .iter()
      .enumerate()
      .min_by(|(_, a), (_, b)| a.cmp(b))
      .map(|(i, _)| i);

    let accepted = match lowest {
      Some(i) if pending[i] < incoming => {
        let dropped = pending.swap_remove(i);
        reset_dropped(&dropped.request);
        pending.push(incoming);
        true
      }
      _ => {
        reset_dropped(&incoming.request);
        false
      }
    };
    self.queue = BinaryHeap::from(pending);
    accepted
  }

  /// Dispatch queued loads up to the per-frame budget. Returns the number
  /// dispatched.
  #[tracing::instrument(skip_all, name = "streaming::tick")]
  pub fn tick(&mut self) -> usize {
    if self.paused {
      return 0;
    }

    let mut dispatched = 0;
    while self.budget.can_load(dispatched) {
      let Some(queued) = self.queue.pop() else {
        break;
      };
      self.dispatch(queued.request);
      dispatched += 1;
    }

    if dispatched > 0 {
      debug!(dispatched, queued = self.queue.len(), in_flight = self.in_flight, "loads dispatched");
    }
    dispatched
  }

  fn dispatch(&mut self, request: LoadRequest) {
    self.in_flight += 1;
    self.stats.dispatched += 1;
    let loader = Arc::clone(&self.loader);
    let sender = self.sender.clone();
    let job = move || {
      let completion = run_load(loader.as_ref(), &request, true);
      // Receiver gone means the cache was dropped; nothing to report to.
      let _ = sender.send(completion);
    };
    match &self.executor {
      Executor::Inline => job(),
      Executor::Pool(pool) => pool.spawn(job),
    }
  }

  /// Take every completion that has arrived. Never blocks.
  pub fn drain_completions(&mut self) -> Vec<LoadCompletion> {
    let completions: Vec<LoadCompletion> = self.receiver.try_iter().collect();
    self.in_flight = self.in_flight.saturating_sub(completions.len());

    for completion in &completions {
      match &completion.outcome {
        LoadOutcome::Loaded(_) => {
          self.stats.completed += 1;
          self.failures.remove(&completion.key);
        }
        LoadOutcome::Failed(err) => {
          self.stats.failed += 1;
          let count = self.failures.entry(completion.key).or_insert(0);
          *count += 1;
          if *count == self.budget.failure_warn_threshold {
            warn!(key = ?completion.key, failures = *count, error = %err, "octant keeps failing to load");
          } else {
            debug!(key = ?completion.key, failures = *count, error = %err, "octant load failed");
          }
        }
        LoadOutcome::Cancelled => self.stats.cancelled += 1,
      }
    }
    completions
  }

  /// Choose octants to evict this frame.
  ///
  /// Grace-expired `candidates` come first. If the resident count is still
  /// above the soft cap, the least recently observed loaded octants follow
  /// until it falls to the low-water mark. Observed and pinned octants are
  /// never chosen.
  pub fn plan_evictions(&self, index: &OctreeIndex, candidates: &[OctantKey]) -> Vec<OctantKey> {
    let pinned = index.config().preload_depth;
    let evictable = |key: &OctantKey| {
      key.depth > pinned
        && index
          .get(key)
          .is_some_and(|o| o.is_loaded() && !o.is_observed())
    };

    let mut plan = Vec::new();
    let mut chosen = HashSet::new();
    let mut resident = index.resident_objects();

    for key in candidates.iter().filter(|k| evictable(k)) {
      if !self.budget.can_evict(plan.len()) {
        return plan;
      }
      if chosen.insert(*key) {
        resident = resident.saturating_sub(index.get(key).map_or(0, |o| o.objects.len()));
        plan.push(*key);
      }
    }

    if resident <= self.budget.max_resident_objects {
      return plan;
    }

    let mut lru: Vec<(u64, OctantKey, usize)> = index
      .loaded_octants()
      .filter(|o| evictable(&o.key) && !chosen.contains(&o.key))
      .map(|o| (o.last_observed_ms.unwrap_or(0), o.key, o.objects.len()))
      .collect();
    lru.sort();

    let low_water = self.budget.low_water_mark();
    for (_, key, objects) in lru {
      if resident <= low_water || !self.budget.can_evict(plan.len()) {
        break;
      }
      resident = resident.saturating_sub(objects);
      plan.push(key);
    }
    debug!(planned = plan.len(), resident, "memory pressure eviction");
    plan
  }

  /// Synchronously load every octant down to `depth`. Results arrive via
  /// [`drain_completions`](Self::drain_completions). Returns the number
  /// loaded.
  #[tracing::instrument(skip_all, name = "streaming::preload")]
  pub fn preload(&mut self, index: &mut OctreeIndex, depth: u8) -> usize {
    let requests = index.collect_to_depth(depth, self.loader.as_ref());
    for request in &requests {
      let completion = run_load(self.loader.as_ref(), request, false);
      self.in_flight += 1;
      self.stats.dispatched += 1;
      let _ = self.sender.send(completion);
    }
    debug!(depth, octants = requests.len(), "preload finished");
    requests.len()
  }

  /// Stop dispatching. Queued loads stay queued; in-flight loads finish.
  pub fn pause(&mut self) {
    self.paused = true;
  }

  pub fn resume(&mut self) {
    self.paused = false;
  }

  pub fn is_paused(&self) -> bool {
    self.paused
  }

  /// Drop every queued request. Returns how many were dropped.
  pub fn clear_queue(&mut self) -> usize {
    let pending = std::mem::take(&mut self.queue);
    let count = pending.len();
    for queued in pending {
      reset_dropped(&queued.request);
    }
    count
  }

  pub fn stats(&self) -> StreamingStats {
    StreamingStats {
      queued: self.queue.len(),
      in_flight: self.in_flight,
      persistent_failures: self
        .failures
        .values()
        .filter(|c| **c >= self.budget.failure_warn_threshold)
        .count(),
      ..self.stats
    }
  }

  pub fn queued_count(&self) -> usize {
    self.queue.len()
  }

  /// Loads dispatched but not yet drained.
  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  /// True when no work remains.
  pub fn is_idle(&self) -> bool {
    self.queue.is_empty() && self.in_flight == 0
  }
}

/// Return a request that will never run to `NotLoaded` so the octant is
/// requested again on its next observation.
fn reset_dropped(request: &LoadRequest) {
  request.shared().transition(LoadStatus::Loading, LoadStatus::NotLoaded);
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
