//! Headless fly-through of a procedural galaxy.
//!
//! Builds a small solar system plus a streamed star catalog, then moves the
//! camera logarithmically from 1 AU out to the edge of the catalog and back,
//! logging one line per sampled frame.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use starstream::octree::{DAabb3, OctantSkeleton};
use starstream::units::{AU, KPC, PC};
use starstream::{
  CameraState, CatalogLoader, ComponentMask, DdVec3, FadeConfig, FrameContext, LoadError, NodeKind, ObjectRecord,
  OctantKey, OctantRegion, OctreeBranch, RenderQueue, SceneGraph, SceneGraphUpdater, SceneNode, SimulationClock,
  StarstreamConfig,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "starstream_demo")]
#[command(about = "Flies a camera through a procedural star catalog")]
struct Args {
  /// Path to a configuration TOML file (defaults apply when omitted).
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Number of frames to simulate.
  #[arg(short, long, default_value_t = 600)]
  frames: u64,

  /// Stars generated per catalog octant.
  #[arg(short, long, default_value_t = 500)]
  stars: usize,

  /// Log every n-th frame.
  #[arg(long, default_value_t = 30)]
  log_every: u64,

  /// RNG seed for the catalog.
  #[arg(long, default_value_t = 7)]
  seed: u64,
}

/// Catalog that invents its stars on demand, reproducibly per octant.
struct ProceduralCatalog {
  max_depth: u8,
  stars_per_octant: usize,
  seed: u64,
}

impl ProceduralCatalog {
  fn octant_seed(&self, key: OctantKey) -> u64 {
    let mut h = self.seed ^ 0x9E37_79B9_7F4A_7C15;
    for v in [key.x as u64, key.y as u64, key.z as u64, key.depth as u64] {
      h = (h ^ v).wrapping_mul(0x1000_0000_01B3);
    }
    h
  }
}

impl OctantSkeleton for ProceduralCatalog {
  fn child_mask(&self, key: OctantKey) -> u8 {
    if key.depth < self.max_depth {
      0xFF
    } else {
      0
    }
  }

  fn object_count(&self, _key: OctantKey) -> usize {
    self.stars_per_octant
  }
}

impl CatalogLoader for ProceduralCatalog {
  fn load_octant(&self, region: &OctantRegion) -> Result<Vec<ObjectRecord>, LoadError> {
    let mut rng = StdRng::seed_from_u64(self.octant_seed(region.key));
    let DAabb3 { min, max } = region.bounds;
    // Shallow octants hold the rarer bright giants.
    let radius_scale = 1.0 + (self.max_depth - region.key.depth.min(self.max_depth)) as f64 * 20.0;

    let stars = (0..self.stars_per_octant)
      .map(|_| {
        let t = DVec3::new(rng.random(), rng.random(), rng.random());
        let position = min + (max - min) * t;
        let radius = 7.0e8 * radius_scale * rng.random_range(0.1..10.0);
        ObjectRecord::star(DdVec3::from_dvec3(position), radius)
      })
      .collect();
    Ok(stars)
  }
}

/// Sun with a few planets, each with an exclusive billboard stand-in.
fn build_solar_system(graph: &mut SceneGraph) -> Result<()> {
  let sun = graph.add_root(
    SceneNode::new("Sun", NodeKind::Model { model_size: 1.0 })
      .with_size(6.96e8)
      .with_component(ComponentMask::STARS)
      .with_fade(FadeConfig::fade_out(5.0 * PC, 50.0 * PC)),
  );
  for (name, distance_au, radius) in [("Mercury", 0.39, 2.44e6), ("Earth", 1.0, 6.37e6), ("Jupiter", 5.2, 6.99e7)] {
    let planet = graph.add_child(
      sun,
      SceneNode::new(name, NodeKind::Model { model_size: 1.0 })
        .with_position(DdVec3::new(distance_au * AU, 0.0, 0.0))
        .with_size(radius)
        .with_component(ComponentMask::PLANETS)
        .with_fade(FadeConfig::fade_out(0.5 * AU, 200.0 * AU)),
    )?;
    graph.add_child(
      planet,
      SceneNode::new(format!("{name} billboard"), NodeKind::Billboard)
        .with_size(radius)
        .with_component(ComponentMask::PLANETS)
        .exclusive_with_parent(),
    )?;
  }
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let config = match &args.config {
    Some(path) => {
      StarstreamConfig::load(path).with_context(|| format!("Failed to load config: {}", path.display()))?
    }
    None => StarstreamConfig::default(),
  };

  let mut graph = SceneGraph::new();
  build_solar_system(&mut graph)?;

  let catalog = Arc::new(ProceduralCatalog {
    max_depth: config.octree.max_depth,
    stars_per_octant: args.stars,
    seed: args.seed,
  });
  let owner = graph.add_root(SceneNode::new("Milky Way", NodeKind::OctreeBranch).with_component(ComponentMask::STARS));
  let mut branch = OctreeBranch::new(config.octree.clone(), config.streaming, catalog)
    .context("Failed to create octree branch")?;
  let preloaded = branch.preload();
  graph.attach_octree(owner, branch)?;
  info!(preloaded, "catalog attached");

  let mut updater = SceneGraphUpdater::from_config(&config);
  let mut clock = SimulationClock::new(0.0);
  let mut queue = RenderQueue::new();
  let frame_dt = Duration::from_millis(16);

  let near = AU.ln();
  let far = (config.octree.root_half_size.min(10.0 * KPC)).ln();
  for frame in 0..args.frames {
    // Out and back along a log-distance ramp.
    let phase = frame as f64 / args.frames.max(1) as f64;
    let ramp = 1.0 - (2.0 * phase - 1.0).abs();
    let distance = (near + (far - near) * ramp).exp();
    let camera = CameraState::new(DdVec3::new(0.0, 0.3 * distance, distance)).with_direction(DVec3::new(0.0, -0.3, -1.0));

    let time = clock.tick(frame_dt.as_secs_f64());
    let ctx = FrameContext::new(camera, time, frame * frame_dt.as_millis() as u64);

    queue.clear();
    let report = updater.update(&mut graph, &ctx, &mut queue);
    if report.loads_failed > 0 {
      warn!(failed = report.loads_failed, "catalog loads failed this frame");
    }
    if frame % args.log_every.max(1) == 0 {
      info!(
        frame,
        distance_pc = distance / PC,
        nodes = graph.len(),
        submitted = report.submitted,
        roulette = report.roulette_size,
        loads = report.loads_completed,
        evictions = report.evictions,
        "frame"
      );
    }
  }

  let metrics = updater.metrics();
  info!(
    frames = metrics.frames,
    avg_update_us = metrics.update_timings.average(),
    avg_load_us = metrics.load_timings.average(),
    total_loads = metrics.total_loads,
    total_evictions = metrics.total_evictions,
    "done"
  );
  Ok(())
}
