use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, anyhow};
use archterrain::rendering::renderer::HeadlessRenderer;
use archterrain::settings::{CliArgs, Division, OperationMode, TerrainSettings};
use archterrain::terrain::falloff::Falloff;
use archterrain::terrain::manager::{TaskState, TerrainManager};
use archterrain::terrain::world::{geometry_pack_path, segment_pack_path};
use archterrain_files::atomic::reader::AtomicReader;
use archterrain_files::magpack::reader::MagPackReader;
use archterrain_files::segment::reader::SegmentReader;
use clap::Parser;
use glam::Vec3;
use log::{info, trace, warn};

fn main() -> Result<(), Error> {
    env_logger::init();

    let args = CliArgs::parse();
    trace!("Starting with args: {:?}", args);
    let settings = TerrainSettings::from(&args);

    match &args.operation_mode {
        OperationMode::Stream {
            position,
            raise,
            radius,
            falloff,
            commit,
        } => {
            let edit = raise.map(|delta| HeightEdit {
                delta,
                radius: *radius,
                falloff: *falloff,
            });
            stream(&settings, position.into(), edit, *commit)
        }
        OperationMode::Inspect { division, geometry } => inspect(&settings, *division, *geometry),
    }
}

struct HeightEdit {
    delta: f32,
    radius: f32,
    falloff: Falloff,
}

fn stream(settings: &TerrainSettings, position: Vec3, edit: Option<HeightEdit>, commit: bool) -> Result<(), Error> {
    let renderer = Arc::new(HeadlessRenderer::new());
    let mut manager = TerrainManager::new(settings, renderer.clone())?;

    manager.sync(position, true);
    manager.flush_tasks();
    if manager.state() != TaskState::Idle {
        warn!("Terrain did not settle, stopped in {:?}", manager.state());
    }

    manager.render();
    let draw_calls = renderer.take_draw_calls();
    let draw_buffer = manager.draw_buffer();
    println!(
        "{} sectors visible, {} loaded: {} vertices, {} triangles in {} draw calls",
        manager.visible_sectors().len(),
        draw_buffer.sectors.len(),
        draw_buffer.vertices.len(),
        draw_buffer.indices.len() / 3,
        draw_calls.len()
    );
    println!("Segment under the viewer: {:?}", manager.get_segment(position));

    if let Some(edit) = edit {
        let moved = manager.adjust_height(position, edit.radius, edit.delta, edit.falloff);
        println!("Moved {} vertices by up to {}", moved, edit.delta);
    }

    if commit {
        let count = manager.mark_loaded_sectors_changed();
        info!("Rewriting {} sectors", count);
        manager.commit_changes();
        manager.update(Duration::ZERO);
        manager.flush_tasks();
    }

    manager.shutdown();
    Ok(())
}

fn inspect(settings: &TerrainSettings, division: Division, geometry: bool) -> Result<(), Error> {
    let path = match geometry {
        true => geometry_pack_path(&settings.client_dir, division.x, division.z),
        false => segment_pack_path(&settings.client_dir, division.x, division.z),
    };
    let pack = MagPackReader::open(&path, true)?.ok_or_else(|| anyhow!("{} does not exist", path.display()))?;
    println!("{}", path.display());

    for (entry_index, entry) in pack.entries.iter().enumerate() {
        if entry.data.is_empty() {
            continue;
        }
        let (x, z) = (entry_index % 16, entry_index / 16);
        let summary = match geometry {
            true => summarize_geometry(&entry.data),
            false => summarize_segments(&entry.data),
        };
        match summary {
            Ok(summary) => println!("{:>3} ({:>2}, {:>2}) {:<24} {}", entry_index, x, z, entry.name, summary),
            Err(e) => println!("{:>3} ({:>2}, {:>2}) {:<24} broken: {}", entry_index, x, z, entry.name, e),
        }
    }
    Ok(())
}

fn summarize_segments(data: &[u8]) -> Result<String, Error> {
    let info = SegmentReader::parse_asset(&mut Cursor::new(data))?;
    let regions = info
        .segments
        .iter()
        .flatten()
        .map(|segment| segment.region_id)
        .collect::<std::collections::BTreeSet<_>>();
    Ok(format!("regions {:?}, {} line blocks", regions, info.line_blocks.len()))
}

fn summarize_geometry(data: &[u8]) -> Result<String, Error> {
    let (exists, atomic) = data
        .split_first_chunk::<4>()
        .ok_or_else(|| anyhow!("Stream ended unexpectedly"))?;
    if i32::from_le_bytes(*exists) == 0 {
        return Ok("empty".to_string());
    }
    let asset = AtomicReader::parse_asset(&mut Cursor::new(atomic))?;
    Ok(format!(
        "{} vertices, {} triangles, {} materials",
        asset.geometry.vertex_count(),
        asset.geometry.triangles.len(),
        asset.geometry.materials.len()
    ))
}
