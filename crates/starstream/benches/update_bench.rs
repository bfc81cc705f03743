//! Benchmarks for the per-frame update pass.
//!
//! Two workloads: a static hierarchy of fading models, and a streamed star
//! catalog where every octant is already resident.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::DVec3;
use starstream::{
  CameraState, DdVec3, FadeConfig, FrameContext, MemoryCatalog, NodeKind, NullRenderSink, ObjectRecord, OctreeBranch,
  OctreeConfig, SceneGraph, SceneGraphUpdater, SceneNode, StreamingBudget, TimeState,
};

const AU: f64 = starstream::units::AU;
const PC: f64 = starstream::units::PC;

// ============================================================================
// Static hierarchy
// ============================================================================

/// Systems of one star with `planets` faded planets each.
fn planetary_graph(systems: usize, planets: usize) -> SceneGraph {
  let mut graph = SceneGraph::new();
  for s in 0..systems {
    let star = graph.add_root(
      SceneNode::new(format!("star-{s}"), NodeKind::Model { model_size: 1.0 })
        .with_position(DdVec3::new(s as f64 * PC, 0.0, 0.0))
        .with_size(7.0e8),
    );
    for p in 0..planets {
      let planet = SceneNode::new(format!("planet-{s}-{p}"), NodeKind::Model { model_size: 1.0 })
        .with_position(DdVec3::new((p + 1) as f64 * AU, 0.0, 0.0))
        .with_size(6.0e6)
        .with_fade(FadeConfig::fade_out(0.5 * PC, 2.0 * PC));
      let planet = graph.add_child(star, planet).unwrap_or(star);
      let _ = graph.add_child(
        planet,
        SceneNode::new(format!("billboard-{s}-{p}"), NodeKind::Billboard).exclusive_with_parent(),
      );
    }
  }
  graph
}

fn bench_static_hierarchy(c: &mut Criterion) {
  let mut group = c.benchmark_group("update_static");
  for systems in [10usize, 100, 1000] {
    let mut graph = planetary_graph(systems, 8);
    let mut updater = SceneGraphUpdater::default();
    let ctx = FrameContext::new(CameraState::new(DdVec3::new(0.0, 0.0, AU)), TimeState::default(), 0);
    group.throughput(Throughput::Elements(graph.len() as u64));

    group.bench_with_input(BenchmarkId::from_parameter(systems), &systems, |b, _| {
      b.iter(|| {
        let mut sink = NullRenderSink::default();
        black_box(updater.update(&mut graph, &ctx, &mut sink))
      })
    });
  }
  group.finish();
}

// ============================================================================
// Streamed catalog
// ============================================================================

fn star_catalog(config: &OctreeConfig, count: usize) -> MemoryCatalog {
  // Deterministic lattice with a little jitter per index.
  let side = (count as f64).cbrt().ceil() as usize;
  let spacing = 2.0 * config.root_half_size / side as f64;
  let records = (0..count).map(|i| {
    let (x, y, z) = (i % side, (i / side) % side, i / (side * side));
    let jitter = (i as f64 * 0.618_033_988_75).fract() * 0.5 * spacing;
    let p = DVec3::new(x as f64, y as f64, z as f64) * spacing - DVec3::splat(config.root_half_size) + jitter;
    ObjectRecord::star(DdVec3::from_dvec3(p), 7.0e8 * (1.0 + (i % 7) as f64))
  });
  MemoryCatalog::build(config, records, 256)
}

fn bench_streamed_catalog(c: &mut Criterion) {
  let mut group = c.benchmark_group("update_streamed");
  group.sample_size(20);
  for count in [10_000usize, 100_000] {
    let config = OctreeConfig {
      root_half_size: 500.0 * PC,
      max_depth: 6,
      ..Default::default()
    };
    let catalog = Arc::new(star_catalog(&config, count));
    let mut graph = SceneGraph::new();
    let owner = graph.add_root(SceneNode::new("Catalog", NodeKind::OctreeBranch));
    let branch = match OctreeBranch::new(config, StreamingBudget::UNLIMITED_INLINE, catalog) {
      Ok(branch) => branch,
      Err(err) => panic!("bench config rejected: {err}"),
    };
    let _ = graph.attach_octree(owner, branch);

    let mut updater = SceneGraphUpdater::default();
    let ctx = FrameContext::new(CameraState::new(DdVec3::ZERO), TimeState::default(), 0);
    // Warm-up frame loads everything observed.
    updater.update(&mut graph, &ctx, &mut NullRenderSink::default());
    group.throughput(Throughput::Elements(graph.len() as u64));

    group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
      b.iter(|| {
        let mut sink = NullRenderSink::default();
        black_box(updater.update(&mut graph, &ctx, &mut sink))
      })
    });
  }
  group.finish();
}

criterion_group!(benches, bench_static_hierarchy, bench_streamed_catalog);
criterion_main!(benches);
