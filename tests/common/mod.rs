#![allow(dead_code)]

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::Error;
use archterrain::rendering::common::types::{Geometry, Material, MeshTriangle, MeshVertex};
use archterrain::rendering::importer::atomic_importer::AtomicImporter;
use archterrain::rendering::renderer::HeadlessRenderer;
use archterrain::settings::TerrainSettings;
use archterrain::terrain::manager::TerrainManager;
use archterrain::terrain::world::{SectorIndex, STEP_SIZE, geometry_pack_path, segment_pack_path};
use archterrain_files::atomic::writer::AtomicWriter;
use archterrain_files::magpack::types::{MagPack, PackEntry};
use archterrain_files::magpack::writer::MagPackWriter;
use archterrain_files::segment::types::SegmentInfo;
use archterrain_files::segment::writer::SegmentWriter;
use glam::{Vec3, Vec3Swizzles};
use tempfile::TempDir;

/// The four sectors meeting at the world origin, spread over four divisions.
pub fn around_origin() -> Vec<SectorIndex> {
    vec![
        SectorIndex::new(399, 399),
        SectorIndex::new(400, 399),
        SectorIndex::new(399, 400),
        SectorIndex::new(400, 400),
    ]
}

/// The world position of the center of a sector, at height 0.
pub fn sector_center(index: SectorIndex) -> Vec3 {
    let center = (index.extent_start() + index.extent_end()) / 2.0;
    Vec3::new(center.x, 0.0, center.y)
}

/// A flat 16x16 step grid covering the sector, two triangles per cell.
pub fn flat_sector_geometry(index: SectorIndex, texture: &str) -> Geometry {
    let start = index.extent_start();
    let mut geometry = Geometry {
        materials: vec![Material::with_texture(texture)],
        texcoord_set_count: 1,
        ..Default::default()
    };

    for x in 0..=16u16 {
        for z in 0..=16u16 {
            let position = Vec3::new(start.x + x as f32 * STEP_SIZE, 0.0, start.y + z as f32 * STEP_SIZE);
            let mut vertex = MeshVertex::new(position, Vec3::Y);
            vertex.texcoord[0] = [x as f32 / 16.0, z as f32 / 16.0];
            geometry.vertices.push(vertex);
        }
    }

    let at = |x: u16, z: u16| x * 17 + z;
    for x in 0..16u16 {
        for z in 0..16u16 {
            geometry.triangles.push(MeshTriangle {
                indices: [at(x, z), at(x, z + 1), at(x + 1, z)],
                material_index: 0,
            });
            geometry.triangles.push(MeshTriangle {
                indices: [at(x + 1, z), at(x, z + 1), at(x + 1, z + 1)],
                material_index: 0,
            });
        }
    }

    geometry.calculate_bounding_sphere();
    geometry.rebuild_splits();
    geometry
}

pub fn geometry_entry(geometry: Option<&Geometry>) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    match geometry {
        Some(geometry) => {
            data.extend_from_slice(&1i32.to_le_bytes());
            AtomicWriter::write_asset(&AtomicImporter::export_geometry(geometry), &mut data)?;
        }
        None => data.extend_from_slice(&0i32.to_le_bytes()),
    }
    Ok(data)
}

fn write_pack(path: &Path, entries: Vec<(usize, Vec<u8>)>) -> Result<(), Error> {
    let mut pack = MagPack::default();
    for (entry, data) in entries {
        pack.entries[entry] = PackEntry::from_plain(format!("{}", entry), data);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = BufWriter::new(File::create(path)?);
    MagPackWriter::write_asset(&pack, &mut wtr)?;
    Ok(())
}

/// Writes geometry and segment packs holding flat terrain for every given sector.
pub fn write_world(client_dir: &Path, sectors: &[SectorIndex]) -> Result<(), Error> {
    let mut divisions = sectors.iter().map(|s| s.division()).collect::<Vec<_>>();
    divisions.sort();
    divisions.dedup();

    for (division_x, division_z) in divisions {
        let members = sectors.iter().filter(|s| s.division() == (division_x, division_z));
        let mut geometry = Vec::new();
        let mut segments = Vec::new();
        for &index in members {
            let flat = flat_sector_geometry(index, "grass");
            geometry.push((index.division_entry(), geometry_entry(Some(&flat))?));

            let mut info = SegmentInfo::default();
            info.segments[0][0].region_id = 1;
            segments.push((index.division_entry(), SegmentWriter::to_bytes(&info)?));
        }
        write_pack(&geometry_pack_path(client_dir, division_x, division_z), geometry)?;
        write_pack(&segment_pack_path(client_dir, division_x, division_z), segments)?;
    }
    Ok(())
}

pub fn write_geometry_pack(client_dir: &Path, division: (u32, u32), entries: Vec<(usize, Vec<u8>)>) -> Result<(), Error> {
    write_pack(&geometry_pack_path(client_dir, division.0, division.1), entries)
}

pub struct World {
    pub dir: TempDir,
    pub renderer: Arc<HeadlessRenderer>,
    pub manager: TerrainManager,
}

/// A manager over a temporary client directory containing `sectors`, synced at `pos` and fully loaded.
pub fn loaded_world(sectors: &[SectorIndex], pos: Vec3, view_distance: f32) -> Result<World, Error> {
    let dir = tempfile::tempdir()?;
    write_world(dir.path(), sectors)?;

    let settings = TerrainSettings {
        client_dir: dir.path().to_path_buf(),
        view_distance,
        worker_threads: 2,
    };
    let renderer = Arc::new(HeadlessRenderer::new());
    let mut manager = TerrainManager::new(&settings, renderer.clone())?;
    manager.sync(pos, true);
    manager.flush_tasks();

    Ok(World { dir, renderer, manager })
}

/// The vertex of a sector's loaded geometry sitting at `pos` on the XZ plane.
pub fn vertex_at(manager: &TerrainManager, index: SectorIndex, pos: Vec3) -> Option<MeshVertex> {
    let geometry = manager.get_sector(index.x, index.z)?.loaded_geometry()?;
    geometry
        .vertices
        .iter()
        .find(|v| v.position().xz() == pos.xz())
        .copied()
}
