use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use itertools::Itertools;

/// Sector count along the X axis.
pub const SECTOR_COUNT_X: u32 = 800;
/// Sector count along the Z axis.
pub const SECTOR_COUNT_Z: u32 = 800;
pub const SECTOR_WIDTH: f32 = 6400.0;
pub const SECTOR_HEIGHT: f32 = 6400.0;
/// Segments per sector along each axis.
pub const SECTOR_DEPTH: u32 = 16;
pub const STEP_SIZE: f32 = 400.0;
/// Sectors per division along each axis.
pub const DIVISION_DEPTH: u32 = 16;

pub const WORLD_START_X: f32 = -((SECTOR_COUNT_X / 2) as f32) * SECTOR_WIDTH;
pub const WORLD_START_Z: f32 = -((SECTOR_COUNT_Z / 2) as f32) * SECTOR_HEIGHT;
pub const WORLD_END_X: f32 = ((SECTOR_COUNT_X / 2) as f32) * SECTOR_WIDTH;
pub const WORLD_END_Z: f32 = ((SECTOR_COUNT_Z / 2) as f32) * SECTOR_HEIGHT;

pub const MIN_HEIGHT: f32 = -20000.0;
pub const MAX_HEIGHT: f32 = 100000.0;

pub const DEFAULT_VIEW_DISTANCE: f32 = 4.0 * SECTOR_WIDTH;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SectorIndex {
    pub x: u32,
    pub z: u32,
}

impl SectorIndex {
    pub fn new(x: u32, z: u32) -> Self {
        SectorIndex { x, z }
    }

    /// The sector containing `pos`, `None` outside of the world. Y is ignored.
    pub fn from_position(pos: Vec3) -> Option<SectorIndex> {
        if pos.x < WORLD_START_X || pos.x >= WORLD_END_X || pos.z < WORLD_START_Z || pos.z >= WORLD_END_Z {
            return None;
        }
        let x = ((pos.x - WORLD_START_X) / SECTOR_WIDTH) as u32;
        let z = ((pos.z - WORLD_START_Z) / SECTOR_HEIGHT) as u32;
        // f32 rounding right below the world end
        Some(SectorIndex {
            x: x.min(SECTOR_COUNT_X - 1),
            z: z.min(SECTOR_COUNT_Z - 1),
        })
    }

    pub fn division(&self) -> (u32, u32) {
        (self.x / DIVISION_DEPTH, self.z / DIVISION_DEPTH)
    }

    /// Position of this sector's entry within its division's packs.
    pub fn division_entry(&self) -> usize {
        ((self.z % DIVISION_DEPTH) * DIVISION_DEPTH + (self.x % DIVISION_DEPTH)) as usize
    }

    pub fn extent_start(&self) -> Vec2 {
        Vec2::new(
            WORLD_START_X + self.x as f32 * SECTOR_WIDTH,
            WORLD_START_Z + self.z as f32 * SECTOR_HEIGHT,
        )
    }

    pub fn extent_end(&self) -> Vec2 {
        Vec2::new(
            WORLD_START_X + (self.x + 1) as f32 * SECTOR_WIDTH,
            WORLD_START_Z + (self.z + 1) as f32 * SECTOR_HEIGHT,
        )
    }

    /// Bird's eye distance between `pos` and the closest point of this sector, zero inside of it.
    pub fn distance(&self, pos: Vec3) -> f32 {
        let min = self.extent_start();
        let max = self.extent_end();
        let dx = (min.x - pos.x).max(pos.x - max.x).max(0.0);
        let dz = (min.y - pos.z).max(pos.z - max.y).max(0.0);
        (dx * dx + dz * dz).sqrt()
    }

    /// Division first, so sectors sharing pack files end up next to each other.
    pub fn load_order(&self, other: &SectorIndex) -> Ordering {
        let (dx, dz) = self.division();
        let (other_dx, other_dz) = other.division();
        (dz, dx, self.z, self.x).cmp(&(other_dz, other_dx, other.z, other.x))
    }
}

impl Display for SectorIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

pub fn segment_pack_path(client_dir: &Path, division_x: u32, division_z: u32) -> PathBuf {
    client_dir
        .join("world")
        .join(format!("a00{:02}{:02}x.ma1", division_x, division_z))
}

pub fn geometry_pack_path(client_dir: &Path, division_x: u32, division_z: u32) -> PathBuf {
    client_dir
        .join("world")
        .join(format!("b00{:02}{:02}x.ma2", division_x, division_z))
}

pub fn segment_save_path(client_dir: &Path, index: SectorIndex) -> PathBuf {
    client_dir
        .join("world")
        .join(format!("C{:03},{:03}.amf", index.x, index.z))
}

pub fn geometry_save_path(client_dir: &Path, index: SectorIndex) -> PathBuf {
    client_dir
        .join("world")
        .join(format!("D{:03},{:03}.dff", index.x, index.z))
}

fn index_range(center: f32, view_distance: f32, world_start: f32, width: f32, count: u32) -> Option<(u32, u32)> {
    let first = ((center - view_distance - world_start) / width).floor() as i64;
    let last = ((center + view_distance - world_start) / width).floor() as i64;
    if last < 0 || first >= count as i64 {
        return None;
    }
    Some((first.max(0) as u32, last.min(count as i64 - 1) as u32))
}

/// Every sector within `view_distance` of `pos`, each exactly once, in load order.
pub fn compute_visible(pos: Vec3, view_distance: f32) -> Vec<SectorIndex> {
    if view_distance < 0.0 {
        return Vec::new();
    }
    let Some((first_x, last_x)) = index_range(pos.x, view_distance, WORLD_START_X, SECTOR_WIDTH, SECTOR_COUNT_X)
    else {
        return Vec::new();
    };
    let Some((first_z, last_z)) = index_range(pos.z, view_distance, WORLD_START_Z, SECTOR_HEIGHT, SECTOR_COUNT_Z)
    else {
        return Vec::new();
    };

    (first_x..=last_x)
        .cartesian_product(first_z..=last_z)
        .map(|(x, z)| SectorIndex { x, z })
        .filter(|index| index.distance(pos) <= view_distance)
        .sorted_by(SectorIndex::load_order)
        .collect()
}

/// Snaps a world coordinate to the closest vertex column of the global step grid.
pub fn snap_to_step_x(x: f32) -> u32 {
    (((x - WORLD_START_X) + STEP_SIZE / 2.0) / STEP_SIZE).max(0.0) as u32
}

pub fn snap_to_step_z(z: f32) -> u32 {
    (((z - WORLD_START_Z) + STEP_SIZE / 2.0) / STEP_SIZE).max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn position_to_index() {
        assert_eq!(SectorIndex::from_position(Vec3::ZERO), Some(SectorIndex::new(400, 400)));
        assert_eq!(
            SectorIndex::from_position(Vec3::new(WORLD_START_X, 0.0, WORLD_START_Z)),
            Some(SectorIndex::new(0, 0))
        );
        assert_eq!(SectorIndex::from_position(Vec3::new(WORLD_END_X, 0.0, 0.0)), None);
        assert_eq!(SectorIndex::from_position(Vec3::new(0.0, 0.0, WORLD_START_Z - 1.0)), None);
        assert_eq!(
            SectorIndex::from_position(Vec3::new(-1.0, 0.0, 6400.0)),
            Some(SectorIndex::new(399, 401))
        );
    }

    #[test]
    pub fn division_and_entry() {
        let index = SectorIndex::new(3, 4);
        assert_eq!(index.division(), (0, 0));
        assert_eq!(index.division_entry(), 67);

        let index = SectorIndex::new(401, 399);
        assert_eq!(index.division(), (25, 24));
        assert_eq!(index.division_entry(), 15 * 16 + 1);
    }

    #[test]
    pub fn file_names() {
        let root = Path::new("client");
        assert_eq!(segment_pack_path(root, 3, 12), root.join("world").join("a000312x.ma1"));
        assert_eq!(geometry_pack_path(root, 25, 0), root.join("world").join("b002500x.ma2"));
        assert_eq!(
            segment_save_path(root, SectorIndex::new(3, 45)),
            root.join("world").join("C003,045.amf")
        );
        assert_eq!(
            geometry_save_path(root, SectorIndex::new(400, 7)),
            root.join("world").join("D400,007.dff")
        );
    }

    #[test]
    pub fn distance_is_zero_inside() {
        let index = SectorIndex::new(400, 400);
        assert_eq!(index.distance(Vec3::new(100.0, 5000.0, 100.0)), 0.0);
        assert_eq!(index.distance(Vec3::new(-300.0, 0.0, 100.0)), 300.0);
        assert_eq!(index.distance(Vec3::new(-300.0, 0.0, -400.0)), 500.0);
    }

    #[test]
    pub fn visible_around_origin() {
        let visible = compute_visible(Vec3::new(100.0, 0.0, 100.0), SECTOR_WIDTH);
        // the far corner (401, 401) is 6300 away on both axes
        assert_eq!(visible.len(), 8);
        assert!(visible.contains(&SectorIndex::new(399, 399)));
        assert!(visible.contains(&SectorIndex::new(401, 399)));
        assert!(!visible.contains(&SectorIndex::new(401, 401)));
        assert!(visible.iter().all(|i| i.distance(Vec3::new(100.0, 0.0, 100.0)) <= SECTOR_WIDTH));
    }

    #[test]
    pub fn visible_is_clamped_to_world() {
        let visible = compute_visible(Vec3::new(WORLD_START_X + 10.0, 0.0, WORLD_START_Z + 10.0), SECTOR_WIDTH);
        assert_eq!(
            visible,
            vec![SectorIndex::new(0, 0), SectorIndex::new(1, 0), SectorIndex::new(0, 1)]
        );
        assert!(compute_visible(Vec3::new(WORLD_END_X + 2.0 * SECTOR_WIDTH, 0.0, 0.0), SECTOR_WIDTH).is_empty());
    }

    #[test]
    pub fn visible_sorted_by_division() {
        // straddles the division border between x = 15 and x = 16
        let pos = Vec3::new(WORLD_START_X + 16.0 * SECTOR_WIDTH, 0.0, WORLD_START_Z + 100.0);
        let visible = compute_visible(pos, 100.0);
        assert_eq!(visible, vec![SectorIndex::new(15, 0), SectorIndex::new(16, 0)]);
    }

    #[test]
    pub fn snapping() {
        assert_eq!(snap_to_step_x(WORLD_START_X), 0);
        assert_eq!(snap_to_step_x(WORLD_START_X + 199.0), 0);
        assert_eq!(snap_to_step_x(WORLD_START_X + 201.0), 1);
        assert_eq!(snap_to_step_z(0.0), 6400);
    }
}
