use glam::Vec3;

use crate::rendering::common::types::{BoundingSphere, Geometry, Material, MeshSplit, MeshTriangle};

impl BoundingSphere {
    /// Center of the bounding box, radius to the farthest point. Zero-sized without points.
    pub fn from_points<I: IntoIterator<Item = Vec3> + Clone>(points: I) -> BoundingSphere {
        let mut iter = points.clone().into_iter();
        let Some(first) = iter.next() else {
            return BoundingSphere::default();
        };
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        let center = (min + max) * 0.5;
        let radius = points
            .into_iter()
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        BoundingSphere { center, radius }
    }

    /// Distance along `dir` (normalized) to where the ray enters the sphere, zero when starting inside.
    pub fn raycast(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let to_center = self.center - origin;
        let projection = to_center.dot(dir);
        let distance_squared = to_center.length_squared() - projection * projection;
        let radius_squared = self.radius * self.radius;
        if distance_squared > radius_squared {
            return None;
        }
        let half_chord = (radius_squared - distance_squared).sqrt();
        let far = projection + half_chord;
        if far < 0.0 {
            return None;
        }
        Some((projection - half_chord).max(0.0))
    }
}

impl Geometry {
    pub fn triangle_positions(&self, triangle: &MeshTriangle) -> [Vec3; 3] {
        triangle.indices.map(|i| self.vertices[i as usize].position())
    }

    /// Unnormalized face normal, its length is twice the triangle area.
    pub fn surface_normal(&self, triangle: &MeshTriangle) -> Vec3 {
        let [v0, v1, v2] = self.triangle_positions(triangle);
        (v1 - v0).cross(v2 - v0)
    }

    pub fn calculate_bounding_sphere(&mut self) {
        self.bounding_sphere = BoundingSphere::from_points(self.vertices.iter().map(|v| v.position()));
    }

    /// Smooth normals from the area weighted face normals.
    pub fn calculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for triangle in &self.triangles {
            let normal = self.surface_normal(triangle);
            for index in triangle.indices {
                normals[index as usize] += normal;
            }
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(normals) {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }

    /// Groups the triangles into one split per material, in order of first use. Materials no triangle refers to
    /// are dropped and the triangles' material indices are renumbered accordingly.
    ///
    /// # Panics
    /// When a triangle refers to a material that does not exist.
    pub fn rebuild_splits(&mut self) {
        let mut used = Vec::<u32>::new();
        let mut remap = vec![u32::MAX; self.materials.len()];
        let mut index_counts = Vec::<u32>::new();
        for triangle in &self.triangles {
            let slot = &mut remap[triangle.material_index as usize];
            if *slot == u32::MAX {
                *slot = used.len() as u32;
                used.push(triangle.material_index);
                index_counts.push(0);
            }
            index_counts[*slot as usize] += 3;
        }

        let mut offset = 0;
        self.splits = index_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let split = MeshSplit {
                    index_offset: offset,
                    index_count: 0,
                    material_index: i as u32,
                };
                offset += count;
                split
            })
            .collect();

        self.indices = vec![0; offset as usize];
        for triangle in &mut self.triangles {
            triangle.material_index = remap[triangle.material_index as usize];
            let split = &mut self.splits[triangle.material_index as usize];
            for index in triangle.indices {
                self.indices[(split.index_offset + split.index_count) as usize] = index;
                split.index_count += 1;
            }
        }

        let mut old = std::mem::take(&mut self.materials);
        self.materials = used
            .into_iter()
            .map(|i| std::mem::take(&mut old[i as usize]))
            .collect();
    }

    /// Assigns `material` to a triangle, reusing an equal material slot if there is one.
    /// Returns false if the triangle already had that material. Splits need a rebuild afterwards.
    pub fn set_material(&mut self, triangle: usize, material: &Material) -> bool {
        let current = self.triangles[triangle].material_index as usize;
        if self.materials.get(current) == Some(material) {
            return false;
        }

        let index = match self.materials.iter().position(|m| m == material) {
            Some(index) => index,
            None => {
                self.materials.push(material.clone());
                self.materials.len() - 1
            }
        };
        self.triangles[triangle].material_index = index as u32;
        true
    }

    /// Iterates the triangles of every split, yielding the split's material alongside.
    pub fn split_triangles(&self) -> impl Iterator<Item = ([u16; 3], &Material)> + '_ {
        self.splits.iter().flat_map(move |split| {
            let start = split.index_offset as usize;
            let end = start + split.index_count as usize;
            let material = &self.materials[split.material_index as usize];
            self.indices[start..end]
                .chunks_exact(3)
                .map(move |tri| ([tri[0], tri[1], tri[2]], material))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::common::types::MeshVertex;

    fn strip(materials: &[u32]) -> Geometry {
        let mut geometry = Geometry {
            materials: vec![
                Material::with_texture("a"),
                Material::with_texture("b"),
                Material::with_texture("c"),
            ],
            ..Default::default()
        };
        for (i, &material_index) in materials.iter().enumerate() {
            let base = geometry.vertices.len() as u16;
            let x = i as f32 * 400.0;
            geometry.vertices.push(MeshVertex::new(Vec3::new(x, 0.0, 0.0), Vec3::Y));
            geometry.vertices.push(MeshVertex::new(Vec3::new(x, 0.0, 400.0), Vec3::Y));
            geometry.vertices.push(MeshVertex::new(Vec3::new(x + 400.0, 0.0, 0.0), Vec3::Y));
            geometry.triangles.push(MeshTriangle {
                indices: [base, base + 1, base + 2],
                material_index,
            });
        }
        geometry
    }

    #[test]
    pub fn rebuild_splits_groups_by_first_use() {
        let mut geometry = strip(&[2, 0, 2, 0, 2]);
        geometry.rebuild_splits();

        assert_eq!(geometry.materials.len(), 2);
        assert_eq!(geometry.materials[0].texture_names[0], "c");
        assert_eq!(geometry.materials[1].texture_names[0], "a");
        assert_eq!(geometry.splits.len(), 2);
        assert_eq!(geometry.splits[0].index_count, 9);
        assert_eq!(geometry.splits[1].index_offset, 9);
        assert_eq!(geometry.splits[1].index_count, 6);
        assert_eq!(&geometry.indices[..3], &[0, 1, 2]);
        assert_eq!(&geometry.indices[9..12], &[3, 4, 5]);
        assert!(geometry.triangles.iter().all(|t| t.material_index < 2));

        for split in &geometry.splits {
            let range = split.index_offset as usize..(split.index_offset + split.index_count) as usize;
            for tri in geometry.indices[range].chunks_exact(3) {
                let owner = geometry
                    .triangles
                    .iter()
                    .find(|t| t.indices[0] == tri[0])
                    .unwrap();
                assert_eq!(owner.material_index, split.material_index);
            }
        }
    }

    #[test]
    pub fn set_material_reuses_slots() {
        let mut geometry = strip(&[0, 1]);
        assert!(!geometry.set_material(0, &Material::with_texture("A")));
        assert!(geometry.set_material(0, &Material::with_texture("B")));
        assert_eq!(geometry.triangles[0].material_index, 1);
        assert_eq!(geometry.materials.len(), 3);

        assert!(geometry.set_material(1, &Material::with_texture("new")));
        assert_eq!(geometry.materials.len(), 4);
        assert_eq!(geometry.triangles[1].material_index, 3);

        geometry.rebuild_splits();
        assert_eq!(geometry.materials.len(), 2);
        assert_eq!(geometry.split_triangles().count(), 2);
    }

    #[test]
    pub fn bounding_sphere_covers_points() {
        let mut geometry = strip(&[0, 0]);
        geometry.calculate_bounding_sphere();
        let sphere = geometry.bounding_sphere;
        assert_eq!(sphere.center, Vec3::new(400.0, 0.0, 200.0));
        assert!(geometry
            .vertices
            .iter()
            .all(|v| v.position().distance(sphere.center) <= sphere.radius + 1e-3));
        assert_eq!(BoundingSphere::from_points(std::iter::empty::<Vec3>()).radius, 0.0);
    }

    #[test]
    pub fn surface_normal_faces_up() {
        let geometry = strip(&[0]);
        let normal = geometry.surface_normal(&geometry.triangles[0]);
        assert!(normal.normalize().abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    pub fn sphere_raycast() {
        let sphere = BoundingSphere {
            center: Vec3::new(0.0, 0.0, 10.0),
            radius: 2.0,
        };
        assert_eq!(sphere.raycast(Vec3::ZERO, Vec3::Z), Some(8.0));
        assert_eq!(sphere.raycast(Vec3::ZERO, -Vec3::Z), None);
        assert_eq!(sphere.raycast(Vec3::ZERO, Vec3::X), None);
        assert_eq!(sphere.raycast(Vec3::new(0.0, 0.0, 10.0), Vec3::X), Some(0.0));
    }
}
