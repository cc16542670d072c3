use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use archterrain_files::segment::types::{GeometryBlock, Segment, TileType};
use glam::{Vec2, Vec3};
use log::{debug, trace, warn};

use crate::rendering::common::types::{Material, MeshVertex};
use crate::terrain::falloff::Falloff;
use crate::terrain::manager::{DRAW_BUFFER_UPDATE_DELAY, TaskState, TerrainManager};
use crate::terrain::sector::SectorFlags;
use crate::terrain::world::{
    MAX_HEIGHT, MIN_HEIGHT, STEP_SIZE, SectorIndex, snap_to_step_x, snap_to_step_z,
};
use crate::util::xz;

/// Neighbouring triangles within this distance outside the brush are considered for normal recalculation.
const NORMAL_RING: f32 = 3.0 * STEP_SIZE;

/// Exact position identity, the way vertices on both sides of a seam are matched. `-0.0` and `0.0` are the same.
type PositionKey = [u32; 3];

fn position_key(position: [f32; 3]) -> PositionKey {
    position.map(|c| (c + 0.0).to_bits())
}

fn grid_key(position: [f32; 3]) -> (u32, u32) {
    (snap_to_step_x(position[0]), snap_to_step_z(position[2]))
}

fn rect_distance(index: SectorIndex, point: Vec2) -> f32 {
    let clamped = point.clamp(index.extent_start(), index.extent_end());
    clamped.distance(point)
}

impl TerrainManager {
    fn ensure_idle(&self, operation: &str) -> bool {
        if self.state != TaskState::Idle {
            debug!("Ignoring {} while {:?}", operation, self.state);
            return false;
        }
        true
    }

    /// Sectors of the live draw buffer that come within `radius` of `center`.
    fn sectors_in_range(&self, center: Vec2, radius: f32) -> Vec<SectorIndex> {
        self.draw_buffer
            .sectors
            .iter()
            .copied()
            .filter(|&index| rect_distance(index, center) < radius)
            .collect()
    }

    /// Raises every vertex within `radius` of `center` by `falloff(delta)`. Returns how many vertices moved.
    pub fn adjust_height(&mut self, center: Vec3, radius: f32, delta: f32, falloff: Falloff) -> usize {
        if !self.ensure_idle("height adjustment") || radius <= 0.0 {
            return 0;
        }
        self.edit_heights(center, radius, |y, t| y + falloff.apply(delta, t))
    }

    /// Moves every vertex within `radius` towards the mean height under the brush, by at most `falloff(rate)`.
    /// Returns how many vertices moved.
    pub fn level(&mut self, center: Vec3, radius: f32, rate: f32, falloff: Falloff) -> usize {
        if !self.ensure_idle("leveling") || radius <= 0.0 {
            return 0;
        }

        let center_xz = xz(center);
        let (sum, count) = self
            .sectors_in_range(center_xz, radius)
            .into_iter()
            .filter_map(|index| self.grid.get(index)?.loaded_geometry())
            .flat_map(|geometry| geometry.vertices.iter())
            .filter(|vertex| xz(vertex.position()).distance(center_xz) < radius)
            .fold((0.0f64, 0usize), |(sum, count), vertex| (sum + vertex.position[1] as f64, count + 1));
        if count == 0 {
            return 0;
        }
        let mean = (sum / count as f64) as f32;
        trace!("Leveling {} vertices towards {}", count, mean);

        self.edit_heights(center, radius, |y, t| {
            let step = falloff.apply(rate, t).abs();
            if (mean - y).abs() <= step {
                mean
            } else {
                y + step.copysign(mean - y)
            }
        })
    }

    /// Applies `height(y, t)` to every vertex strictly within `radius`, `t` being 1 at the center and 0 at the edge.
    fn edit_heights(&mut self, center: Vec3, radius: f32, mut height: impl FnMut(f32, f32) -> f32) -> usize {
        let center_xz = xz(center);
        let mut moved = HashSet::<PositionKey>::new();
        let mut touched_sectors = Vec::new();

        for index in self.sectors_in_range(center_xz, radius) {
            let Some(sector) = self.grid.get_mut(index) else {
                continue;
            };
            let Some(geometry) = sector.loaded_geometry() else {
                continue;
            };

            let edits = geometry
                .vertices
                .iter()
                .enumerate()
                .filter_map(|(i, vertex)| {
                    let distance = xz(vertex.position()).distance(center_xz);
                    if distance >= radius {
                        return None;
                    }
                    let y = vertex.position[1];
                    let new_y = height(y, 1.0 - distance / radius).clamp(MIN_HEIGHT, MAX_HEIGHT);
                    (new_y != y).then_some((i, new_y))
                })
                .collect::<Vec<_>>();
            if edits.is_empty() {
                continue;
            }

            let Some(geometry) = sector.geometry.as_mut().map(Arc::make_mut) else {
                continue;
            };
            for (i, new_y) in edits {
                let vertex = &mut geometry.vertices[i];
                vertex.position[1] = new_y;
                moved.insert(position_key(vertex.position));
            }
            geometry.calculate_bounding_sphere();
            sector.flags |= SectorFlags::HAS_DETAIL_CHANGES;
            touched_sectors.push(index);
        }

        if moved.is_empty() {
            return 0;
        }

        let count = moved.len();
        let normal_sectors = self.recalculate_normals(center_xz, radius + NORMAL_RING, &moved);
        for index in normal_sectors {
            if !touched_sectors.contains(&index) {
                touched_sectors.push(index);
            }
        }
        self.patch_draw_buffer(&touched_sectors);
        count
    }

    /// Recomputes the normals of moved vertices and of their neighbours, averaging the face normals of all
    /// triangles around a position across sector borders. Returns the sectors whose normals changed, which are
    /// marked dirty.
    fn recalculate_normals(&mut self, center: Vec2, ring: f32, moved: &HashSet<PositionKey>) -> Vec<SectorIndex> {
        let ring_sectors = self.sectors_in_range(center, ring);
        let mut face_normals = HashMap::<PositionKey, Vec3>::new();
        let mut affected = HashSet::<PositionKey>::new();

        for &index in &ring_sectors {
            let Some(geometry) = self.grid.get(index).and_then(|s| s.loaded_geometry()) else {
                continue;
            };
            for triangle in &geometry.triangles {
                let keys = triangle
                    .indices
                    .map(|i| position_key(geometry.vertices[i as usize].position));
                let in_ring = triangle
                    .indices
                    .iter()
                    .any(|&i| xz(geometry.vertices[i as usize].position()).distance(center) < ring);
                if !in_ring {
                    continue;
                }

                let normal = geometry.surface_normal(triangle);
                for key in keys {
                    *face_normals.entry(key).or_default() += normal;
                }
                if keys.iter().any(|key| moved.contains(key)) {
                    affected.extend(keys);
                }
            }
        }

        let mut changed = Vec::new();
        for index in ring_sectors {
            let Some(sector) = self.grid.get_mut(index) else {
                continue;
            };
            let Some(geometry) = sector.loaded_geometry() else {
                continue;
            };

            let updates = geometry
                .vertices
                .iter()
                .enumerate()
                .filter_map(|(i, vertex)| {
                    let key = position_key(vertex.position);
                    if !affected.contains(&key) {
                        return None;
                    }
                    let normal = face_normals.get(&key)?.normalize_or_zero().to_array();
                    (normal != vertex.normal).then_some((i, normal))
                })
                .collect::<Vec<_>>();
            if updates.is_empty() {
                continue;
            }

            let Some(geometry) = sector.geometry.as_mut().map(Arc::make_mut) else {
                continue;
            };
            for (i, normal) in updates {
                geometry.vertices[i].normal = normal;
            }
            sector.flags |= SectorFlags::HAS_DETAIL_CHANGES;
            changed.push(index);
        }
        changed
    }

    /// Copies the edited vertices into the live draw buffer. Falls back to a rebuild when a sector can't be patched.
    fn patch_draw_buffer(&mut self, sectors: &[SectorIndex]) {
        let renderer = self.context.renderer.clone();
        for &index in sectors {
            let Some(geometry) = self.grid.get(index).and_then(|s| s.loaded_geometry()) else {
                continue;
            };
            let patched = self
                .draw_buffer
                .patch_vertices(index, &geometry.vertices, renderer.as_ref());
            if let Err(e) = patched {
                warn!("Rebuilding the draw buffer, patching sector {} failed: {:?}", index, e);
                self.schedule_draw_buffer_update();
            }
        }
    }

    pub(super) fn schedule_draw_buffer_update(&mut self) {
        if self.update_draw_buffer_in.is_none() {
            self.update_draw_buffer_in = Some(DRAW_BUFFER_UPDATE_DELAY);
        }
    }

    /// Replaces existing triangles with the given ones, matched by the grid cells of their corners. Each triangle
    /// also gets the material at the same position. Returns how many triangles were replaced.
    pub fn set_triangle(&mut self, triangles: &[[MeshVertex; 3]], materials: &[Material]) -> usize {
        if !self.ensure_idle("setting triangles") {
            return 0;
        }

        let mut replaced = 0;
        let mut touched_sectors = Vec::<SectorIndex>::new();
        for (input, material) in triangles.iter().zip(materials) {
            let centroid = input.iter().map(MeshVertex::position).sum::<Vec3>() / 3.0;
            let Some(index) = SectorIndex::from_position(centroid) else {
                continue;
            };
            if !self.draw_buffer.contains(index) {
                continue;
            }
            let Some(sector) = self.grid.get_mut(index) else {
                continue;
            };
            let Some(geometry) = sector.loaded_geometry() else {
                continue;
            };

            let input_keys = input.each_ref().map(|v| grid_key(v.position));
            let matched = geometry.triangles.iter().enumerate().find_map(|(t, triangle)| {
                let mut mapping = [0usize; 3];
                for (slot, key) in mapping.iter_mut().zip(&input_keys) {
                    *slot = triangle
                        .indices
                        .iter()
                        .map(|&i| i as usize)
                        .find(|&i| grid_key(geometry.vertices[i].position) == *key)?;
                }
                Some((t, mapping))
            });
            let Some((triangle, mapping)) = matched else {
                trace!("No triangle of sector {} matches {:?}", index, input_keys);
                continue;
            };

            let Some(geometry) = sector.geometry.as_mut().map(Arc::make_mut) else {
                continue;
            };
            for (vertex, &i) in input.iter().zip(&mapping) {
                let mut vertex = *vertex;
                vertex.position[1] = vertex.position[1].clamp(MIN_HEIGHT, MAX_HEIGHT);
                geometry.vertices[i] = vertex;
            }
            geometry.set_material(triangle, material);
            sector.flags |= SectorFlags::HAS_DETAIL_CHANGES;
            if !touched_sectors.contains(&index) {
                touched_sectors.push(index);
            }
            replaced += 1;
        }

        for &index in &touched_sectors {
            if let Some(geometry) = self
                .grid
                .get_mut(index)
                .and_then(|sector| sector.geometry.as_mut())
                .map(Arc::make_mut)
            {
                geometry.rebuild_splits();
                geometry.calculate_bounding_sphere();
            }
        }
        if replaced > 0 {
            self.schedule_draw_buffer_update();
        }
        replaced
    }

    /// Sets the region of every segment within `size` steps of `pos`. Returns how many segments changed.
    pub fn set_region_id(&mut self, pos: Vec3, size: u32, region_id: u16) -> usize {
        self.paint_segments(pos, size, |segment| segment.region_id = region_id)
    }

    /// Sets the tile type, unless `tile_type` is `None`, and the blocking flags of every segment within `size`
    /// steps of `pos`. Returns how many segments changed.
    pub fn set_tile_info(
        &mut self,
        pos: Vec3,
        size: u32,
        tile_type: Option<TileType>,
        geometry_block: GeometryBlock,
    ) -> usize {
        self.paint_segments(pos, size, |segment| {
            if let Some(tile_type) = tile_type {
                segment.tile.tile_type = u8::from(tile_type);
            }
            segment.tile.geometry_block = geometry_block.bits();
        })
    }

    fn paint_segments(&mut self, pos: Vec3, size: u32, mut paint: impl FnMut(&mut Segment)) -> usize {
        if !self.ensure_idle("segment painting") || size == 0 {
            return 0;
        }

        let reach = (size - 1) as i32;
        let mut changed = 0;
        for dx in -reach..=reach {
            for dz in -reach..=reach {
                let cell = pos + Vec3::new(dx as f32 * STEP_SIZE, 0.0, dz as f32 * STEP_SIZE);
                let Some(index) = SectorIndex::from_position(cell) else {
                    continue;
                };
                let Some(sector) = self.grid.get_mut(index) else {
                    continue;
                };
                let Some((x, z)) = sector.segment_coordinates(cell) else {
                    continue;
                };
                let Some(current) = sector.segment_at(cell).copied() else {
                    continue;
                };

                let mut painted = current;
                paint(&mut painted);
                if painted == current {
                    continue;
                }
                if let Some(segment) = sector
                    .segment_info
                    .as_mut()
                    .map(Arc::make_mut)
                    .and_then(|info| info.segment_mut(x, z))
                {
                    *segment = painted;
                    sector.flags |= SectorFlags::HAS_SEGMENT_CHANGES;
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            self.notify_segment_modification();
        }
        changed
    }
}
