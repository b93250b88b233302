//! Keel Runtime
//!
//! Boots the storage engine from settings and drives a short scripted
//! workload: scenes streaming meshes in and out of a partitioned vertex
//! array while a staging heap churns upload blocks.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use keel_core::{define_stored, Allocation, PartitionedArray, StorageRegistry};
use keel_metrics::PhaseTimer;
use keel_services::{init_services, register_array, Settings};
use tracing_subscriber::EnvFilter;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    pos: [f32; 3],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Bone {
    parent: u32,
    rest: [f32; 4],
}

define_stored!(Vertex, 1, "Vertex");
define_stored!(Bone, 2, "Bone");

const SCENES: [&str; 3] = ["level", "props", "characters"];
const FRAMES: usize = 8;
const STAGING_BLOCK: usize = 256;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Keel v{}", keel_core::VERSION);

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(&path).with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };

    tracing::info!("Initializing services...");
    let mut registry = init_services(&settings)?;
    register_array::<Vertex>(&mut registry, &settings)?;
    register_array::<Bone>(&mut registry, &settings)?;
    anyhow::ensure!(registry.has_heap("staging"), "settings must define a 'staging' heap");

    let mut timer = PhaseTimer::new(60);
    for frame in 0..FRAMES {
        timer.begin();
        run_frame(&mut registry, frame)?;
        timer.end();
    }

    report(&registry)?;
    tracing::info!(
        avg_ms = timer.average_ms(),
        peak_ms = timer.peak_ms(),
        "frame timing"
    );
    Ok(())
}

/// One frame: stream a scene in, retire another, stage uploads through the heap.
fn run_frame(registry: &mut StorageRegistry, frame: usize) -> Result<()> {
    let scene = SCENES[frame % SCENES.len()];
    let vertices = registry.array_mut::<Vertex>()?;
    stream_in(vertices, scene, frame)?;

    // Retire the oldest vertex of the scene streamed two frames ago.
    let stale = SCENES[(frame + 1) % SCENES.len()];
    if vertices.partition(stale).map_or(false, |p| !p.is_empty()) {
        let removed = vertices.remove_relative(stale, 0)?;
        tracing::debug!(scene = stale, ?removed, "retired vertex");
    }

    let bones = registry.array_mut::<Bone>()?;
    bones.add(scene, Bone { parent: frame as u32, rest: [0.0, 0.0, 0.0, 1.0] })?;

    let staging = registry.heap_mut("staging")?;
    let blocks: Vec<Allocation> = (0..4)
        .map(|i| staging.allocate(STAGING_BLOCK * (i + 1), 16))
        .collect::<Result<_, _>>()?;
    for block in &blocks {
        staging.bytes_mut(block)?.fill(frame as u8);
    }
    for block in blocks {
        staging.deallocate(block)?;
    }
    anyhow::ensure!(staging.is_coalesced(), "staging heap left fragmented after frame {frame}");
    staging.reset_frame();
    Ok(())
}

fn stream_in(vertices: &mut PartitionedArray<Vertex>, scene: &str, frame: usize) -> Result<()> {
    for i in 0..3 {
        let t = (frame * 3 + i) as f32;
        vertices.add(
            scene,
            Vertex {
                pos: [t, t * 0.5, 0.0],
                uv: [i as f32 / 2.0, 0.0],
            },
        )?;
    }
    Ok(())
}

fn report(registry: &StorageRegistry) -> Result<()> {
    for (name, heap) in registry.heaps() {
        let tracker = heap.tracker();
        tracing::info!(
            heap = name,
            id = %heap.id(),
            size = heap.size(),
            free = heap.free_bytes(),
            peak = tracker.peak(),
            total_allocations = tracker.total_allocations(),
            "heap stats"
        );
        for (counter, value) in heap.counters().iter() {
            tracing::info!(heap = name, counter, value, "heap counter");
        }
    }

    let vertices = registry.array::<Vertex>()?;
    for partition in vertices.descriptors() {
        tracing::info!(
            partition = partition.name(),
            start = partition.start(),
            len = partition.len(),
            base_bytes = vertices.partition_base_bytes(partition.name())?,
            "vertex partition"
        );
    }
    anyhow::ensure!(vertices.is_contiguous(), "vertex partitions lost contiguity");

    for (key, name) in registry.array_keys() {
        tracing::info!(key, stored = name, "registered array");
    }
    Ok(())
}
