//! Volume generator binary - pre-pages noise terrain chunks to disk.
//!
//! Usage: cargo run --release --bin generate_volume -- [OPTIONS]
//!
//! Options:
//!   --output <DIR>       Chunk directory (default: "volumes/terrain")
//!   --size <VOXELS>      Terrain width and depth in voxels (default: 512)
//!   --seed <SEED>        Noise seed (default: 12345)
//!   --scale <SCALE>      Horizontal noise scale (default: 100.0)
//!   --height <H>         Maximum terrain height in voxels (default: 64.0)
//!   --chunk-size <N>     Chunk side length, a power of two (default: 32)
//!   --jobs <N>           Parallel chunk builds (default: 4)
//!
//! The output directory can be handed to `FilePager::new` to page the terrain
//! back in. A `manifest.json` lists the parameters and written chunks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde_json::json;

use voxpage::core::types::IVec3;
use voxpage::math::Region;
use voxpage::paged::file_pager::chunk_path;
use voxpage::paged::{Chunk, ChunkCoord, FilePager, NoiseParams, NoisePager, Pager};

fn main() {
    voxpage::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let output = parse_str_arg(&args, "--output").unwrap_or_else(|| "volumes/terrain".to_string());
    let size = parse_u32_arg(&args, "--size").unwrap_or(512) as i32;
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let scale = parse_f32_arg(&args, "--scale").unwrap_or(100.0);
    let height_scale = parse_f32_arg(&args, "--height").unwrap_or(64.0);
    let chunk_size = parse_u32_arg(&args, "--chunk-size").unwrap_or(32);
    let jobs = parse_usize_arg(&args, "--jobs").unwrap_or(4);

    if !chunk_size.is_power_of_two() {
        log::error!("--chunk-size must be a power of two, got {chunk_size}");
        std::process::exit(1);
    }
    let side_power = chunk_size.trailing_zeros();

    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
        log::warn!("Could not configure thread pool: {e}");
    }

    let output_dir = PathBuf::from(output);
    if let Err(e) = FilePager::new(&output_dir) {
        log::error!("Failed to create {}: {e}", output_dir.display());
        std::process::exit(1);
    }

    let params = NoiseParams {
        seed,
        scale,
        height_scale,
        ..Default::default()
    };

    println!("=== Voxpage Volume Generator ===");
    println!("Size:   {size} x {size} voxels");
    println!("Seed:   {seed}");
    println!("Scale:  {scale}, Height: {height_scale}");
    println!("Chunks: {chunk_size}^3");
    println!("Jobs:   {jobs} parallel");
    println!("Output: {}", output_dir.display());
    println!();

    let top = height_scale.ceil() as i32;
    let region = Region::new(IVec3::ZERO, IVec3::new(size - 1, top, size - 1));
    let first = ChunkCoord::from_world(region.mins(), side_power).as_ivec3();
    let last = ChunkCoord::from_world(region.maxs(), side_power).as_ivec3();
    let coords: Vec<ChunkCoord> = Region::new(first, last)
        .positions()
        .map(|p| ChunkCoord::new(p.x, p.y, p.z))
        .collect();
    let total = coords.len();

    let start = Instant::now();
    let generated = AtomicUsize::new(0);
    let total_bytes = AtomicUsize::new(0);

    let written: Vec<ChunkCoord> = coords
        .par_iter()
        .map_init(
            || (NoisePager::new(params.clone()), FilePager::new(&output_dir).ok()),
            |(noise, files), &coord| {
                let done = generated.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 500 == 0 || done == total {
                    let rate = done as f64 / start.elapsed().as_secs_f64();
                    eprintln!("  [{done}/{total}] {rate:.0} chunks/sec");
                }

                let mut chunk = Chunk::try_new(coord, side_power)?;
                let chunk_region = chunk.region();
                noise.page_in(&chunk_region, &mut chunk);
                if chunk.is_only_air() {
                    return None;
                }

                let files = files.as_mut()?;
                if let Err(e) = files.save_chunk(&chunk) {
                    log::error!("Failed to write chunk {coord}: {e}");
                    return None;
                }
                if let Ok(meta) = std::fs::metadata(chunk_path(files.base_dir(), coord)) {
                    total_bytes.fetch_add(meta.len() as usize, Ordering::Relaxed);
                }
                Some(coord)
            },
        )
        .flatten()
        .collect();

    let manifest = json!({
        "seed": seed,
        "size": size,
        "scale": scale,
        "height_scale": height_scale,
        "chunk_side_length": chunk_size,
        "chunks": written.iter().map(|c| [c.x, c.y, c.z]).collect::<Vec<_>>(),
    });
    let manifest_path = output_dir.join("manifest.json");
    match serde_json::to_string_pretty(&manifest) {
        Ok(text) => {
            if let Err(e) = std::fs::write(&manifest_path, text) {
                log::error!("Failed to write {}: {e}", manifest_path.display());
            }
        }
        Err(e) => log::error!("Failed to encode manifest: {e}"),
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!();
    println!("Done in {elapsed:.1}s");
    println!(
        "Chunks: {} written, {} empty",
        written.len(),
        total - written.len()
    );
    println!("Disk:   {:.2} MB", total_bytes.load(Ordering::Relaxed) as f64 / (1024.0 * 1024.0));
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
