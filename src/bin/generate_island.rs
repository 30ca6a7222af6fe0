//! Island generator binary - generates a grid of chunks and writes previews.
//!
//! Usage: cargo run --release --bin generate_island -- [OPTIONS]
//!
//! Options:
//!   --seed <SEED>      Noise seed (default: from config, 0)
//!   --scale <SCALE>    Noise scale (default: from config, 50.0)
//!   --octaves <N>      Noise octaves (default: from config, 4)
//!   --chunks <N>       Chunks per side of the generated grid (default: 3)
//!   --lod <LOD>        Mesh level of detail (default: 0)
//!   --config <PATH>    JSON terrain settings
//!   --out <DIR>        Output directory (default: "island")
//!   --global           Use global normalization (seamless chunks)
//!
//! Output structure:
//!   <out>/
//!     summary.json       # Settings + per-chunk statistics
//!     height.png         # Centre chunk height map
//!     color.png          # Centre chunk colour map
//!     splatmap.png       # Centre chunk splatmap
//!     falloff.png        # Falloff mask (when enabled)

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glam::Vec2;
use serde_json::json;

use landmass::core::Result;
use landmass::export::{self, SplatThresholds};
use landmass::generation::{GenerationScheduler, TerrainSettings};
use landmass::mesh::MeshData;
use landmass::terrain::{ChunkKey, MapData, NormalizeMode};
use landmass::vegetation::VegetationStore;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(600);

struct ChunkResult {
    map: MapData,
    mesh: Option<MeshData>,
}

fn main() {
    landmass::core::logging::init();

    if let Err(e) = run() {
        log::error!("Generation failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut settings = match parse_str_arg(&args, "--config") {
        Some(path) => TerrainSettings::load(path)?,
        None => TerrainSettings::default(),
    };
    if let Some(seed) = parse_i32_arg(&args, "--seed") {
        settings.terrain.noise.seed = seed;
    }
    if let Some(scale) = parse_f32_arg(&args, "--scale") {
        settings.terrain.noise.scale = scale;
    }
    if let Some(octaves) = parse_u32_arg(&args, "--octaves") {
        settings.terrain.noise.octaves = octaves;
    }
    if args.iter().any(|a| a == "--global") {
        settings.terrain.noise.normalize_mode = NormalizeMode::Global;
    }
    let chunks = parse_u32_arg(&args, "--chunks").unwrap_or(3).max(1) as i32;
    let lod = parse_u32_arg(&args, "--lod").unwrap_or(0);
    let output_dir = PathBuf::from(parse_str_arg(&args, "--out").unwrap_or_else(|| "island".to_string()));

    let scheduler = GenerationScheduler::new(settings)?;
    let settings = scheduler.settings().clone();
    let chunk_size = settings.terrain.chunk_size;
    let stride = (chunk_size - 1) as f32;

    println!("=== Landmass Island Generator ===");
    println!("Seed:    {}", settings.terrain.noise.seed);
    println!("Scale:   {}, Octaves: {}", settings.terrain.noise.scale, settings.terrain.noise.octaves);
    println!("Mode:    {:?}", settings.terrain.noise.normalize_mode);
    println!("Chunks:  {} x {} of {} samples", chunks, chunks, chunk_size);
    println!("LOD:     {}", lod);
    println!("Output:  {}", output_dir.display());
    println!();

    std::fs::create_dir_all(&output_dir)?;

    // Each map completion chains a mesh request for the same chunk.
    let results: Arc<Mutex<Vec<ChunkResult>>> = Arc::new(Mutex::new(Vec::new()));
    let half = chunks / 2;
    let start = Instant::now();
    for cy in -half..chunks - half {
        for cx in -half..chunks - half {
            let center = Vec2::new(cx as f32 * stride, cy as f32 * stride);
            let results = Arc::clone(&results);
            let handle = scheduler.clone();
            scheduler.request_map_data(center, move |map| {
                let index = {
                    let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
                    results.push(ChunkResult { map: map.clone(), mesh: None });
                    results.len() - 1
                };
                handle.request_mesh_data(map, lod, move |mesh| {
                    let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
                    results[index].mesh = Some(mesh);
                });
            });
        }
    }

    let mut vegetation = VegetationStore::new();
    let report = scheduler.drain_until_idle(&mut vegetation, DRAIN_TIMEOUT)?;
    let elapsed = start.elapsed();

    println!(
        "Generated {} maps, {} meshes, {} vegetation sets in {:.2}s ({} failures)",
        report.map_data,
        report.mesh_data,
        report.vegetation_chunks,
        elapsed.as_secs_f64(),
        report.failures.len()
    );

    let results = std::mem::take(&mut *results.lock().unwrap_or_else(|e| e.into_inner()));

    if let Some(centre) = results.iter().find(|r| r.map.key() == ChunkKey::new(0, 0)) {
        let heights = centre.map.heights();
        export::save_height_map(output_dir.join("height.png"), heights)?;
        export::save_color_map(output_dir.join("color.png"), centre.map.colors())?;
        export::save_splatmap(output_dir.join("splatmap.png"), heights, SplatThresholds::default())?;
    }
    if let Some(mask) = scheduler.sampler().falloff() {
        export::save_falloff_map(output_dir.join("falloff.png"), mask)?;
    }

    let mut chunk_entries: Vec<_> = results
        .iter()
        .map(|r| {
            let key = r.map.key();
            let (min_height, max_height) = r.map.heights().min_max().unwrap_or((0.0, 0.0));
            let placements = vegetation.get(key).map_or(0, |v| v.placements.len());
            json!({
                "x": key.x,
                "y": key.y,
                "min_height": min_height,
                "max_height": max_height,
                "vertices": r.mesh.as_ref().map(|m| m.vertex_count()),
                "triangles": r.mesh.as_ref().map(|m| m.triangle_count()),
                "placements": placements,
            })
        })
        .collect();
    chunk_entries.sort_by_key(|c| (c["y"].as_i64(), c["x"].as_i64()));

    let summary = json!({
        "settings": settings,
        "level_of_detail": lod,
        "elapsed_secs": elapsed.as_secs_f64(),
        "total_placements": vegetation.total_placements(),
        "failures": report.failures.iter().map(|f| json!({
            "id": f.id.0,
            "kind": format!("{:?}", f.kind),
            "message": f.message,
        })).collect::<Vec<_>>(),
        "chunks": chunk_entries,
    });
    let summary_path = output_dir.join("summary.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;

    println!();
    println!("=== Generation Complete ===");
    println!("Placements: {}", vegetation.total_placements());
    println!("Summary:    {}", summary_path.display());
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
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
