use log::warn;

use crate::rendering::common::types::{Geometry, Material, MeshVertex};

/// Indices of every split sharing `material`, already offset into the merged vertex buffer.
#[derive(Debug, Clone, Default)]
pub struct MergedBatch {
    pub material: Material,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct MergedMesh {
    pub vertices: Vec<MeshVertex>,
    /// First vertex of every input geometry, in input order.
    pub vertex_offsets: Vec<u32>,
    pub batches: Vec<MergedBatch>,
}

impl MergedMesh {
    /// The batches' indices back to back, with each batch's `(first_index, index_count)`.
    pub fn flatten_indices(&self) -> (Vec<u32>, Vec<(u32, u32)>) {
        let mut indices = Vec::with_capacity(self.batches.iter().map(|b| b.indices.len()).sum());
        let ranges = self
            .batches
            .iter()
            .map(|batch| {
                let first = indices.len() as u32;
                indices.extend_from_slice(&batch.indices);
                (first, batch.indices.len() as u32)
            })
            .collect();
        (indices, ranges)
    }
}

pub enum MeshMerger {}

impl MeshMerger {
    /// Merge multiple geometries by combining the vertex buffers and counting up the index buffers.
    /// Splits whose materials are equal end up in the same batch, so the result needs one draw call per
    /// distinct material. Batches are ordered by the first geometry/split that uses them.
    pub fn merge_geometries<'a, I>(input_geometries: I) -> MergedMesh
    where
        I: IntoIterator<Item = &'a Geometry>,
    {
        let mut merged_mesh = MergedMesh::default();

        for geometry in input_geometries {
            let current_index = merged_mesh.vertices.len() as u32;
            merged_mesh.vertex_offsets.push(current_index);
            merged_mesh.vertices.extend_from_slice(&geometry.vertices);

            for split in &geometry.splits {
                let Some(material) = geometry.materials.get(split.material_index as usize) else {
                    warn!("Split refers to missing material {}", split.material_index);
                    continue;
                };
                let start = split.index_offset as usize;
                let Some(indices) = geometry.indices.get(start..start + split.index_count as usize) else {
                    warn!("Split {:?} exceeds the index buffer", split);
                    continue;
                };

                let batch = match merged_mesh.batches.iter().position(|b| &b.material == material) {
                    Some(position) => &mut merged_mesh.batches[position],
                    None => {
                        merged_mesh.batches.push(MergedBatch {
                            material: material.clone(),
                            indices: Vec::new(),
                        });
                        let last = merged_mesh.batches.len() - 1;
                        &mut merged_mesh.batches[last]
                    }
                };
                batch
                    .indices
                    .extend(indices.iter().map(|&index| index as u32 + current_index));
            }
        }

        if merged_mesh.vertex_offsets.is_empty() {
            warn!("Merging 0 geometries");
        }

        merged_mesh
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::rendering::common::types::MeshTriangle;

    fn quad(x: f32, materials: [&str; 2]) -> Geometry {
        let mut geometry = Geometry {
            materials: materials.iter().map(|&name| Material::with_texture(name)).collect(),
            ..Default::default()
        };
        for (dx, dz) in [(0.0, 0.0), (0.0, 400.0), (400.0, 0.0), (400.0, 400.0)] {
            geometry
                .vertices
                .push(MeshVertex::new(Vec3::new(x + dx, 0.0, dz), Vec3::Y));
        }
        geometry.triangles = vec![
            MeshTriangle {
                indices: [0, 1, 2],
                material_index: 0,
            },
            MeshTriangle {
                indices: [2, 1, 3],
                material_index: 1,
            },
        ];
        geometry.rebuild_splits();
        geometry
    }

    #[test]
    pub fn merge_shares_batches_between_geometries() {
        let first = quad(0.0, ["grass", "rock"]);
        let second = quad(400.0, ["ROCK", "sand"]);

        let merged = MeshMerger::merge_geometries([&first, &second]);
        assert_eq!(merged.vertices.len(), 8);
        assert_eq!(merged.vertex_offsets, vec![0, 4]);
        assert_eq!(merged.batches.len(), 3);
        assert_eq!(merged.batches[0].indices, vec![0, 1, 2]);
        assert_eq!(merged.batches[1].indices, vec![2, 1, 3, 4, 5, 6]);
        assert_eq!(merged.batches[2].indices, vec![6, 5, 7]);

        let (indices, ranges) = merged.flatten_indices();
        assert_eq!(indices.len(), 12);
        assert_eq!(ranges, vec![(0, 3), (3, 6), (9, 3)]);
        assert!(indices.iter().all(|&i| (i as usize) < merged.vertices.len()));
    }

    #[test]
    pub fn merge_nothing() {
        let merged = MeshMerger::merge_geometries(std::iter::empty::<&Geometry>());
        assert!(merged.vertices.is_empty());
        assert!(merged.batches.is_empty());
    }
}
