use std::sync::Arc;

use archterrain_files::segment::types::{Segment, SegmentInfo};
use bitflags::bitflags;
use glam::{Vec2, Vec3};

use crate::rendering::common::types::Geometry;
use crate::terrain::world::{SECTOR_COUNT_X, SECTOR_COUNT_Z, SECTOR_DEPTH, STEP_SIZE, SectorIndex};

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct SectorFlags: u32 {
        const DETAIL_LOADED = 0x01;
        const SEGMENT_LOADED = 0x02;
        const HAS_DETAIL_CHANGES = 0x04;
        const HAS_SEGMENT_CHANGES = 0x08;

        const HAS_CHANGES = Self::HAS_DETAIL_CHANGES.bits() | Self::HAS_SEGMENT_CHANGES.bits();
    }
}

/// One tile of the world. Geometry and segment info are shared with in-flight tasks through the `Arc`s, edits
/// go through [`Arc::make_mut`] so a task's snapshot never changes underneath it.
#[derive(Debug, Clone)]
pub struct Sector {
    pub index: SectorIndex,
    pub flags: SectorFlags,
    pub geometry: Option<Arc<Geometry>>,
    pub segment_info: Option<Arc<SegmentInfo>>,
}

impl Sector {
    pub fn new(index: SectorIndex) -> Self {
        Sector {
            index,
            flags: SectorFlags::empty(),
            geometry: None,
            segment_info: None,
        }
    }

    pub fn extent_start(&self) -> Vec2 {
        self.index.extent_start()
    }

    pub fn extent_end(&self) -> Vec2 {
        self.index.extent_end()
    }

    pub fn has_changes(&self) -> bool {
        self.flags.intersects(SectorFlags::HAS_CHANGES)
    }

    pub fn is_detail_loaded(&self) -> bool {
        self.flags.contains(SectorFlags::DETAIL_LOADED)
    }

    /// Geometry of a detail loaded sector.
    pub fn loaded_geometry(&self) -> Option<&Arc<Geometry>> {
        self.geometry.as_ref().filter(|_| self.is_detail_loaded())
    }

    /// Which of the 16x16 segments `pos` falls into, `None` outside of this sector.
    pub fn segment_coordinates(&self, pos: Vec3) -> Option<(usize, usize)> {
        let start = self.extent_start();
        let x = ((pos.x - start.x) / STEP_SIZE).floor();
        let z = ((pos.z - start.y) / STEP_SIZE).floor();
        let depth = SECTOR_DEPTH as f32;
        if !(0.0..depth).contains(&x) || !(0.0..depth).contains(&z) {
            return None;
        }
        Some((x as usize, z as usize))
    }

    pub fn segment_at(&self, pos: Vec3) -> Option<&Segment> {
        let (x, z) = self.segment_coordinates(pos)?;
        self.segment_info.as_ref()?.segment(x, z)
    }
}

/// Dense storage of every sector in the world, created empty up front.
pub struct SectorGrid {
    sectors: Vec<Sector>,
}

impl Default for SectorGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorGrid {
    pub fn new() -> Self {
        let sectors = (0..SECTOR_COUNT_X)
            .flat_map(|x| (0..SECTOR_COUNT_Z).map(move |z| Sector::new(SectorIndex { x, z })))
            .collect();
        SectorGrid { sectors }
    }

    fn offset(index: SectorIndex) -> Option<usize> {
        (index.x < SECTOR_COUNT_X && index.z < SECTOR_COUNT_Z)
            .then(|| (index.x * SECTOR_COUNT_Z + index.z) as usize)
    }

    pub fn get(&self, index: SectorIndex) -> Option<&Sector> {
        self.sectors.get(Self::offset(index)?)
    }

    pub fn get_mut(&mut self, index: SectorIndex) -> Option<&mut Sector> {
        self.sectors.get_mut(Self::offset(index)?)
    }

    pub fn get_at(&self, pos: Vec3) -> Option<&Sector> {
        self.get(SectorIndex::from_position(pos)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Sector> {
        self.sectors.iter_mut()
    }
}
