use glam::{Vec2, Vec3};

use crate::rendering::common::types::{Material, MeshVertex};
use crate::terrain::manager::TerrainManager;
use crate::terrain::world::SectorIndex;
use crate::util::{point_in_triangle_2d, ray_triangle, xz};

impl TerrainManager {
    /// The closest point where the ray hits visible, loaded terrain.
    pub fn raycast(&self, origin: Vec3, dir: Vec3) -> Option<Vec3> {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }

        let mut closest: Option<f32> = None;
        for &index in &self.visible_sectors {
            let Some(geometry) = self.grid.get(index).and_then(|s| s.loaded_geometry()) else {
                continue;
            };
            let Some(entry) = geometry.bounding_sphere.raycast(origin, dir) else {
                continue;
            };
            if closest.is_some_and(|c| c < entry) {
                continue;
            }

            for triangle in &geometry.triangles {
                let [v0, v1, v2] = geometry.triangle_positions(triangle);
                if let Some(distance) = ray_triangle(origin, dir, v0, v1, v2)
                    && closest.is_none_or(|c| distance < c)
                {
                    closest = Some(distance);
                }
            }
        }
        closest.map(|distance| origin + dir * distance)
    }

    /// The triangle under `pos`, looking at the XZ plane only.
    pub fn get_triangle(&self, pos: Vec3) -> Option<([MeshVertex; 3], Material)> {
        let geometry = self.grid.get_at(pos)?.loaded_geometry()?;
        let point = xz(pos);
        geometry.split_triangles().find_map(|(indices, material)| {
            let vertices = indices.map(|i| geometry.vertices[i as usize]);
            let [a, b, c] = vertices.map(|v| xz(v.position()));
            point_in_triangle_2d(a, b, c, point).then(|| (vertices, material.clone()))
        })
    }

    /// The two triangles of the grid cell starting at `start`, found by their centroids lying within the cell.
    /// A square spanning more than one cell yields the first two triangles in split order.
    pub fn get_quad(&self, start: Vec3, dimension: f32) -> Option<([MeshVertex; 6], [Material; 2])> {
        let geometry = self
            .grid
            .get(SectorIndex::from_position(start + Vec3::new(dimension, 0.0, dimension) / 2.0)?)?
            .loaded_geometry()?;
        let min = xz(start);
        let max = min + Vec2::splat(dimension);

        let mut found = geometry.split_triangles().filter_map(|(indices, material)| {
            let vertices = indices.map(|i| geometry.vertices[i as usize]);
            let centroid = vertices.iter().map(|v| xz(v.position())).sum::<Vec2>() / 3.0;
            let inside = centroid.cmpge(min).all() && centroid.cmple(max).all();
            inside.then_some((vertices, material))
        });

        let (first, first_material) = found.next()?;
        let (second, second_material) = found.next()?;

        let [a, b, c] = first;
        let [d, e, f] = second;
        Some(([a, b, c, d, e, f], [first_material.clone(), second_material.clone()]))
    }
}
