//! Voxpage - headless volume meshing demo
//!
//! Usage: cargo run --release -- [OPTIONS]
//!
//! Options:
//!   --config <FILE>   Engine config JSON (default: built-in defaults)
//!   --volume <NAME>   Load a volume through the volume cache instead of generating terrain
//!   --size <VOXELS>   Generated terrain width and depth (default: 128)
//!   --seed <SEED>     Terrain noise seed (default: 12345)
//!   --frames <N>      Maximum frames to run (default: 1000)

use std::sync::Arc;
use std::time::Instant;

use voxpage::cache::VolumeCache;
use voxpage::core::types::{IVec3, Mat4, Vec3};
use voxpage::core::{logging, EngineConfig, Error, Result};
use voxpage::math::Region;
use voxpage::paged::{NoiseParams, NoisePager, PagedVolume};
use voxpage::render::{HostGpu, RawVolumeRenderer, RenderView};
use voxpage::voxel::{Palette, RawVolume};

fn main() {
    logging::init();
    log::info!("Voxpage starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = match parse_str_arg(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let frames = parse_usize_arg(&args, "--frames").unwrap_or(1000);
    let palette = Arc::new(Palette::default());

    let volume = match parse_str_arg(&args, "--volume") {
        Some(name) => load_volume(&name, &palette)?,
        None => {
            let size = parse_i32_arg(&args, "--size").unwrap_or(128);
            let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
            generate_terrain(&config, size, seed)?
        }
    };
    log::info!(
        "Volume {}: {} solid voxels",
        volume.region(),
        volume.solid_count()
    );

    let region = *volume.region();
    let mut renderer = RawVolumeRenderer::new(&config.renderer, HostGpu::new())?;
    renderer.set_volume(0, Some(volume), palette, true)?;

    let bounds_center = (region.mins() + region.maxs()).as_vec3() * 0.5;
    let eye = bounds_center + Vec3::new(0.0, region.height() as f32, region.depth() as f32 * 1.5);
    let view = RenderView::new(
        Mat4::look_at_rh(eye, bounds_center, Vec3::Y),
        Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 4096.0),
        eye,
    );

    let start = Instant::now();
    let mut frame = 0;
    while frame < frames {
        frame += 1;
        let stats = renderer.update();
        let draws = renderer.render(&view);
        renderer.gpu_mut().take_draw_calls();
        log::debug!(
            "Frame {frame}: scheduled {}, applied {}, uploaded {}, draws {draws}",
            stats.scheduled,
            stats.applied,
            stats.uploaded
        );

        let scheduler = renderer.state().scheduler();
        if renderer.state().pending_extractions() == 0
            && scheduler.pending_count() == 0
            && scheduler.result_count() == 0
        {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    log::info!(
        "Meshed in {} frames ({:.1} ms): {} mesh tiles, {} buffers, {:.2} MB GPU memory",
        frame,
        start.elapsed().as_secs_f64() * 1000.0,
        renderer.state().tile_count(0),
        renderer.gpu().buffer_count(),
        renderer.gpu().memory_usage() as f64 / (1024.0 * 1024.0)
    );

    renderer.shutdown();
    Ok(())
}

fn load_volume(name: &str, palette: &Palette) -> Result<RawVolume> {
    let cache = VolumeCache::with_filesystem();
    let volume = cache.load_volume(name, palette);
    cache.shutdown();
    let volume = volume.ok_or_else(|| {
        let extensions: Vec<&str> = cache.formats().extensions().collect();
        Error::UnsupportedFormat(format!("could not load {name} (tried {})", extensions.join(", ")))
    })?;
    Ok(Arc::unwrap_or_clone(volume))
}

fn generate_terrain(config: &EngineConfig, size: i32, seed: u32) -> Result<RawVolume> {
    let params = NoiseParams {
        seed,
        ..Default::default()
    };
    let height = params.height_scale as i32;
    let mut paged = PagedVolume::new(&config.paged_volume, Box::new(NoisePager::new(params)))?;

    let start = Instant::now();
    let region = Region::new(IVec3::ZERO, IVec3::new(size - 1, height, size - 1));
    let volume = paged.copy_region(&region);
    log::info!(
        "Generated {region} in {:.1} ms ({} chunks resident, {:.2} MB)",
        start.elapsed().as_secs_f64() * 1000.0,
        paged.resident_chunk_count(),
        paged.calculate_size_in_bytes() as f64 / (1024.0 * 1024.0)
    );
    Ok(volume)
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_i32_arg(args: &[String], flag: &str) -> Option<i32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
