mod common;

use std::io::Cursor;

use archterrain::rendering::importer::atomic_importer::AtomicImporter;
use archterrain::terrain::falloff::Falloff;
use archterrain::terrain::sector::SectorFlags;
use archterrain::terrain::world::{SectorIndex, geometry_save_path, segment_save_path};
use archterrain_files::atomic::reader::AtomicReader;
use archterrain_files::segment::reader::SegmentReader;
use common::{around_origin, loaded_world};
use glam::Vec3;

#[test]
pub fn commit_writes_dirty_sectors() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let client_dir = world.dir.path().to_path_buf();
    let manager = &mut world.manager;

    manager.adjust_height(Vec3::ZERO, 400.0, 50.0, Falloff::Constant);
    manager.set_region_id(Vec3::new(1.0, 0.0, 1.0), 1, 7);

    manager.commit_changes();
    assert!(manager.is_committing());
    manager.flush_tasks();
    assert!(!manager.is_committing());

    for index in around_origin() {
        assert!(!manager.get_sector(index.x, index.z).unwrap().has_changes());
        assert!(geometry_save_path(&client_dir, index).exists());
    }
    assert!(!segment_save_path(&client_dir, SectorIndex::new(399, 399)).exists());

    let saved = std::fs::read(geometry_save_path(&client_dir, SectorIndex::new(400, 400)))?;
    let (exists, atomic) = saved.split_first_chunk::<4>().unwrap();
    assert_eq!(i32::from_le_bytes(*exists), 1);
    let geometry = AtomicImporter::create_geometry(&AtomicReader::parse_asset(&mut Cursor::new(atomic))?)?;
    let origin = geometry
        .vertices
        .iter()
        .find(|v| v.position[0] == 0.0 && v.position[2] == 0.0)
        .unwrap();
    assert_eq!(origin.position[1], 50.0);

    let saved = std::fs::read(segment_save_path(&client_dir, SectorIndex::new(400, 400)))?;
    let info = SegmentReader::parse_asset(&mut Cursor::new(saved))?;
    assert_eq!(info.segments[0][0].region_id, 7);

    manager.shutdown();
    assert_eq!(world.renderer.buffer_count(), 0);
    assert_eq!(world.renderer.live_texture_count(), 0);
    Ok(())
}

#[test]
pub fn only_one_commit_at_a_time() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let client_dir = world.dir.path().to_path_buf();
    let manager = &mut world.manager;
    let late = SectorIndex::new(399, 399);

    manager.set_region_id(Vec3::new(1.0, 0.0, 1.0), 1, 7);
    manager.commit_changes();
    assert!(manager.is_committing());

    manager.set_region_id(Vec3::new(-1.0, 0.0, -1.0), 1, 8);
    manager.commit_changes();
    manager.flush_tasks();

    assert!(!manager.get_sector(400, 400).unwrap().has_changes());
    assert!(manager.get_sector(late.x, late.z).unwrap().has_changes());
    assert!(!segment_save_path(&client_dir, late).exists());

    manager.commit_changes();
    manager.flush_tasks();
    assert!(!manager.get_sector(late.x, late.z).unwrap().has_changes());
    assert!(segment_save_path(&client_dir, late).exists());
    Ok(())
}

#[test]
pub fn edits_during_a_commit_stay_dirty() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let client_dir = world.dir.path().to_path_buf();
    let manager = &mut world.manager;
    let origin = SectorIndex::new(400, 400);

    manager.adjust_height(Vec3::ZERO, 400.0, 50.0, Falloff::Constant);
    manager.set_region_id(Vec3::new(1.0, 0.0, 1.0), 1, 7);
    manager.commit_changes();
    assert_eq!(manager.adjust_height(Vec3::ZERO, 400.0, 50.0, Falloff::Constant), 1);
    assert_eq!(manager.set_region_id(Vec3::new(1.0, 0.0, 1.0), 1, 9), 1);
    manager.flush_tasks();
    assert!(!manager.is_committing());

    let sector = manager.get_sector(origin.x, origin.z).unwrap();
    assert!(sector.flags.contains(SectorFlags::HAS_DETAIL_CHANGES));
    assert!(sector.flags.contains(SectorFlags::HAS_SEGMENT_CHANGES));
    let saved = std::fs::read(segment_save_path(&client_dir, origin))?;
    assert_eq!(SegmentReader::parse_asset(&mut Cursor::new(saved))?.segments[0][0].region_id, 7);

    manager.commit_changes();
    manager.flush_tasks();
    assert!(!manager.get_sector(origin.x, origin.z).unwrap().has_changes());

    let saved = std::fs::read(geometry_save_path(&client_dir, origin))?;
    let (_, atomic) = saved.split_first_chunk::<4>().unwrap();
    let geometry = AtomicImporter::create_geometry(&AtomicReader::parse_asset(&mut Cursor::new(atomic))?)?;
    let origin_vertex = geometry
        .vertices
        .iter()
        .find(|v| v.position[0] == 0.0 && v.position[2] == 0.0)
        .unwrap();
    assert_eq!(origin_vertex.position[1], 100.0);
    let saved = std::fs::read(segment_save_path(&client_dir, origin))?;
    assert_eq!(SegmentReader::parse_asset(&mut Cursor::new(saved))?.segments[0][0].region_id, 9);
    Ok(())
}

#[test]
pub fn nothing_to_commit() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    world.manager.commit_changes();
    assert!(!world.manager.is_committing());
    assert!(!world.dir.path().join("world").join("C400,400.amf").exists());
    Ok(())
}
