//! Headless fly-through - streams the landscape along a flight path and
//! reports what each frame generated and drew.
//!
//! Usage: cargo run --release --bin fly_through -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>    Landscape config JSON (default: built-in nested stack)
//!   --save-config <P>  Write the effective config to P and continue
//!   --frames <N>       Frames to simulate (default: 600)
//!   --speed <M/S>      Observer speed in meters per second (default: 8.0)
//!   --height <M>       Flight altitude (default: 4.0)
//!   --seed <SEED>      Terrain seed (default: 12345)
//!   --threads <N>      Background generation threads, overrides the config
//!   --debug-colors     Tint chunks per detail level

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use glam::Vec3;

use voxscape::core::logging;
use voxscape::render::{NullBackend, RenderStats};
use voxscape::streaming::{FrameUpdate, LandscapeConfig, LandscapeStreamer};
use voxscape::terrain::{NoiseTerrain, TerrainParams};

const FRAME_TIME: f32 = 1.0 / 60.0;

fn main() -> voxscape::core::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let frames = parse_arg(&args, "--frames").unwrap_or(600u32);
    let speed = parse_arg(&args, "--speed").unwrap_or(8.0f32);
    let height = parse_arg(&args, "--height").unwrap_or(4.0f32);
    let seed = parse_arg(&args, "--seed").unwrap_or(12345u32);

    let mut config = match parse_arg::<PathBuf>(&args, "--config") {
        Some(path) => LandscapeConfig::load_sync(&path)?,
        None => LandscapeConfig::default(),
    };
    if let Some(threads) = parse_arg(&args, "--threads") {
        config.generation_threads = threads;
    }
    if args.iter().any(|a| a == "--debug-colors") {
        config = config.with_debug_colors(true);
    }
    if let Some(path) = parse_arg::<PathBuf>(&args, "--save-config") {
        config.save_sync(&path)?;
        log::info!("Wrote config to {}", path.display());
    }

    let terrain = NoiseTerrain::new(TerrainParams { seed, ..Default::default() });
    let start_position = Vec3::new(0.0, height, 0.0);
    let mut streamer = LandscapeStreamer::new(config, std::sync::Arc::new(terrain), start_position)?;
    let mut backend = NullBackend;

    let mut totals = FrameUpdate::default();
    let mut last_render = RenderStats::default();
    let start = Instant::now();

    for frame in 0..frames {
        let t = frame as f32 * FRAME_TIME;
        // Gentle curve so every axis of the window shifts
        let observer = Vec3::new(t * speed, height + (t * 0.5).sin() * 2.0, (t * 0.3).sin() * speed * 4.0);

        let update = streamer.update(observer);
        last_render = streamer.render(&mut backend);

        totals.shifted_levels += update.shifted_levels;
        totals.generated += update.generated;
        totals.released += update.released;
        totals.aborted += update.aborted;

        if frame % 60 == 0 {
            log::info!(
                "frame {:5} at ({:7.1}, {:5.1}, {:7.1}): {} generated, {} pending, {} drawn, {} triangles",
                frame,
                observer.x,
                observer.y,
                observer.z,
                update.generated,
                update.pending,
                last_render.drawn,
                last_render.triangles
            );
        }
    }

    let elapsed = start.elapsed();
    let pool = streamer.pool_stats();
    println!();
    println!("=== Fly-through complete ===");
    println!("Frames:    {} in {:.2}s ({:.1} fps)", frames, elapsed.as_secs_f64(), frames as f64 / elapsed.as_secs_f64().max(1e-9));
    println!("Shifts:    {}", totals.shifted_levels);
    println!("Generated: {} chunks ({} aborted)", totals.generated, totals.aborted);
    println!("Released:  {} chunks", totals.released);
    println!("Pool:      {} created, {} recycled, {} disposed", pool.created, pool.recycled, pool.disposed);
    println!(
        "Last frame: {} drawn, {} air, {} buried, {} pending",
        last_render.drawn, last_render.skipped_air, last_render.skipped_buried, last_render.pending
    );
    for level in streamer.levels() {
        let stats = level.stats();
        println!(
            "  level {} ({}m): {} occupied, {} ready",
            level.lod(),
            level.chunk_size_meters(),
            stats.occupied,
            stats.ready
        );
    }

    streamer.dispose();
    Ok(())
}

fn parse_arg<T: FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}
