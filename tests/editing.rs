mod common;

use std::time::Duration;

use archterrain::rendering::common::types::Material;
use archterrain::terrain::falloff::Falloff;
use archterrain::terrain::manager::TaskState;
use archterrain::terrain::sector::SectorFlags;
use archterrain::terrain::world::SectorIndex;
use archterrain_files::segment::types::{GeometryBlock, TileType};
use common::{around_origin, loaded_world, vertex_at};
use glam::Vec3;

#[test]
pub fn height_adjust_keeps_seams_closed() -> Result<(), anyhow::Error> {
    let sectors = around_origin();
    let mut world = loaded_world(&sectors, Vec3::ZERO, 100.0)?;
    let manager = &mut world.manager;
    assert_eq!(manager.draw_buffer().sectors.len(), 4);

    let moved = manager.adjust_height(Vec3::ZERO, 400.0, 50.0, Falloff::Constant);
    assert_eq!(moved, 1);

    let seam = sectors
        .iter()
        .map(|&index| vertex_at(manager, index, Vec3::ZERO).unwrap())
        .collect::<Vec<_>>();
    for vertex in &seam {
        assert_eq!(vertex.position[1], 50.0);
        assert_eq!(vertex.normal, seam[0].normal);
        assert!((vertex.normal().length() - 1.0).abs() < 1e-5);
    }
    let neighbour = vertex_at(manager, SectorIndex::new(400, 400), Vec3::new(400.0, 0.0, 0.0)).unwrap();
    assert_eq!(neighbour.position[1], 0.0);
    assert_ne!(neighbour.normal, [0.0, 1.0, 0.0]);

    for &index in &sectors {
        let sector = manager.get_sector(index.x, index.z).unwrap();
        assert!(sector.flags.contains(SectorFlags::HAS_DETAIL_CHANGES));
        assert!(!sector.flags.contains(SectorFlags::HAS_SEGMENT_CHANGES));
    }

    let draw_buffer = manager.draw_buffer();
    let raised = draw_buffer
        .vertices
        .iter()
        .filter(|v| v.position == [0.0, 50.0, 0.0])
        .count();
    assert_eq!(raised, 4);
    assert_eq!(manager.state(), TaskState::Idle);
    Ok(())
}

#[test]
pub fn edits_without_effect_keep_flags_clean() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let manager = &mut world.manager;
    let mut segments = manager.subscribe_segments();
    segments.mark_unchanged();

    assert_eq!(manager.adjust_height(Vec3::ZERO, 400.0, 0.0, Falloff::Linear), 0);
    assert_eq!(manager.adjust_height(Vec3::new(1_000_000.0, 0.0, 0.0), 400.0, 50.0, Falloff::Constant), 0);
    assert_eq!(manager.level(Vec3::ZERO, 1000.0, 100.0, Falloff::Constant), 0);
    assert_eq!(manager.set_region_id(Vec3::new(1.0, 0.0, 1.0), 1, 1), 0);
    assert_eq!(manager.set_region_id(Vec3::ZERO, 0, 5), 0);

    for index in around_origin() {
        assert!(!manager.get_sector(index.x, index.z).unwrap().has_changes());
    }
    assert!(!segments.has_changed()?);

    assert_eq!(manager.set_region_id(Vec3::new(1.0, 0.0, 1.0), 1, 7), 1);
    assert!(segments.has_changed()?);
    assert_eq!(segments.borrow_and_update().sectors.len(), 4);
    for index in around_origin() {
        let sector = manager.get_sector(index.x, index.z).unwrap();
        let expected = index == SectorIndex::new(400, 400);
        assert_eq!(sector.flags.contains(SectorFlags::HAS_SEGMENT_CHANGES), expected);
        assert!(!sector.flags.contains(SectorFlags::HAS_DETAIL_CHANGES));
    }
    assert_eq!(manager.get_segment(Vec3::new(1.0, 0.0, 1.0)).region_id, 7);
    Ok(())
}

#[test]
pub fn tile_info_painting_spans_sectors() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let manager = &mut world.manager;

    let changed = manager.set_tile_info(Vec3::new(1.0, 0.0, 1.0), 2, Some(TileType::Sand), GeometryBlock::GROUND);
    assert_eq!(changed, 9);
    for index in around_origin() {
        assert!(manager
            .get_sector(index.x, index.z)
            .unwrap()
            .flags
            .contains(SectorFlags::HAS_SEGMENT_CHANGES));
    }

    let segment = manager.get_segment(Vec3::new(-1.0, 0.0, -1.0));
    assert_eq!(segment.tile.tile_type(), Some(TileType::Sand));
    assert_eq!(segment.tile.geometry_block(), GeometryBlock::GROUND);

    let changed = manager.set_tile_info(Vec3::new(1.0, 0.0, 1.0), 1, None, GeometryBlock::SKY);
    assert_eq!(changed, 1);
    let segment = manager.get_segment(Vec3::new(1.0, 0.0, 1.0));
    assert_eq!(segment.tile.tile_type(), Some(TileType::Sand));
    assert_eq!(segment.tile.geometry_block(), GeometryBlock::SKY);
    Ok(())
}

#[test]
pub fn level_moves_towards_the_mean() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let manager = &mut world.manager;
    let origin = SectorIndex::new(400, 400);

    manager.adjust_height(Vec3::ZERO, 400.0, 400.0, Falloff::Constant);
    assert!(manager.level(Vec3::ZERO, 1000.0, 1000.0, Falloff::Constant) > 0);

    let peak = vertex_at(manager, origin, Vec3::ZERO).unwrap().position[1];
    let side = vertex_at(manager, origin, Vec3::new(400.0, 0.0, 0.0)).unwrap().position[1];
    assert_eq!(peak, side);
    assert!(peak > 0.0 && peak < 400.0);
    Ok(())
}

#[test]
pub fn set_triangle_swaps_the_material() -> Result<(), anyhow::Error> {
    let mut world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let manager = &mut world.manager;
    let probe = Vec3::new(100.0, 0.0, 50.0);

    let (vertices, material) = manager.get_triangle(probe).unwrap();
    assert_eq!(material, Material::with_texture("GRASS"));

    let replaced = manager.set_triangle(&[vertices], &[Material::with_texture("rock")]);
    assert_eq!(replaced, 1);
    let sector = manager.get_sector(400, 400).unwrap();
    assert!(sector.flags.contains(SectorFlags::HAS_DETAIL_CHANGES));
    assert_eq!(sector.loaded_geometry().unwrap().splits.len(), 2);
    assert!(!manager.get_sector(399, 400).unwrap().has_changes());

    manager.update(Duration::from_millis(20));
    assert_eq!(manager.state(), TaskState::Idle);
    assert_eq!(manager.draw_buffer().batches.len(), 1);

    manager.update(Duration::from_millis(30));
    manager.flush_tasks();
    assert_eq!(manager.state(), TaskState::Idle);
    assert_eq!(manager.draw_buffer().batches.len(), 2);
    assert_eq!(world.renderer.live_texture_count(), 2);

    let (_, material) = manager.get_triangle(probe).unwrap();
    assert_eq!(material, Material::with_texture("rock"));
    Ok(())
}

#[test]
pub fn queries_hit_the_ground() -> Result<(), anyhow::Error> {
    let world = loaded_world(&around_origin(), Vec3::ZERO, 100.0)?;
    let manager = &world.manager;

    let hit = manager
        .raycast(Vec3::new(100.0, 1000.0, 50.0), Vec3::new(0.0, -1.0, 0.0))
        .unwrap();
    assert!((hit - Vec3::new(100.0, 0.0, 50.0)).length() < 0.01);
    assert!(manager
        .raycast(Vec3::new(100.0, 1000.0, 50.0), Vec3::Y)
        .is_none());

    let (vertices, materials) = manager.get_quad(Vec3::ZERO, 400.0).unwrap();
    assert!(vertices
        .iter()
        .all(|v| (0.0..=400.0).contains(&v.position[0]) && (0.0..=400.0).contains(&v.position[2])));
    assert_eq!(materials[0], materials[1]);

    let (vertices, _) = manager.get_quad(Vec3::ZERO, 800.0).unwrap();
    for triangle in vertices.chunks(3) {
        let centroid = triangle.iter().map(|v| v.position()).sum::<Vec3>() / 3.0;
        assert!((0.0..=800.0).contains(&centroid.x) && (0.0..=800.0).contains(&centroid.z));
    }
    assert!(manager.get_quad(Vec3::new(10.0, 0.0, 10.0), 100.0).is_none());
    assert!(manager.get_triangle(Vec3::new(1_000_000.0, 0.0, 0.0)).is_none());
    Ok(())
}
