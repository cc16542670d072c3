use anyhow::{Error, bail};
use archterrain_files::atomic::types::{
    AtomicAsset, BoundingSphereRecord, GeometryRecord, MaterialRecord, RawTriangle, TextureRecord,
};
use archterrain_files::common::types::{C2Vector, C3Vector};
use glam::Vec3;

use crate::rendering::common::types::{
    BoundingSphere, Geometry, MATERIAL_TEXTURE_SLOTS, MAX_TEXCOORD_SETS, Material, MeshTriangle, MeshVertex,
};

/// Converts between the atomic records of `archterrain-files` and the [`Geometry`] the terrain works on.
pub struct AtomicImporter {}

impl AtomicImporter {
    pub fn create_geometry(asset: &AtomicAsset) -> Result<Geometry, Error> {
        let record = &asset.geometry;
        if record.texcoord_sets.len() > MAX_TEXCOORD_SETS {
            bail!("Geometry has {} texture coordinate sets", record.texcoord_sets.len());
        }
        if record.vertex_count() > u16::MAX as usize + 1 {
            bail!("Geometry has {} vertices, more than 16 bit indices address", record.vertex_count());
        }

        let mut vertices = record
            .positions
            .iter()
            .map(|&position| MeshVertex {
                position: position.into(),
                ..Default::default()
            })
            .collect::<Vec<_>>();

        for (set, texcoords) in record.texcoord_sets.iter().enumerate() {
            for (vertex, &uv) in vertices.iter_mut().zip(texcoords) {
                vertex.texcoord[set] = uv.into();
            }
        }

        let materials = record.materials.iter().map(Self::create_material).collect::<Vec<_>>();
        let triangles = record
            .triangles
            .iter()
            .map(|triangle| MeshTriangle {
                indices: triangle.indices(),
                material_index: triangle.material_id as u32,
            })
            .collect::<Vec<_>>();

        if let Some(bad) = triangles.iter().find(|t| {
            t.material_index as usize >= materials.len() || t.indices.iter().any(|&i| i as usize >= vertices.len())
        }) {
            bail!("Triangle {:?} is out of range", bad);
        }

        let mut geometry = Geometry {
            vertices,
            texcoord_set_count: record.texcoord_sets.len(),
            triangles,
            materials,
            bounding_sphere: BoundingSphere {
                center: Vec3::from_array(record.bounding_sphere.center.into()),
                radius: record.bounding_sphere.radius,
            },
            ..Default::default()
        };

        if record.normals.len() == geometry.vertices.len() {
            for (vertex, &normal) in geometry.vertices.iter_mut().zip(&record.normals) {
                vertex.normal = normal.into();
            }
        } else {
            geometry.calculate_normals();
        }
        if geometry.bounding_sphere.radius <= 0.0 {
            geometry.calculate_bounding_sphere();
        }

        geometry.rebuild_splits();
        Ok(geometry)
    }

    fn create_material(record: &MaterialRecord) -> Material {
        let mut material = Material {
            color: record.color,
            ..Default::default()
        };
        for texture in &record.textures {
            if let Some(slot) = material.texture_names.get_mut(texture.slot as usize) {
                *slot = texture.name.clone();
            }
        }
        material
    }

    pub fn export_geometry(geometry: &Geometry) -> AtomicAsset {
        let record = GeometryRecord {
            texcoord_sets: (0..geometry.texcoord_set_count.min(MAX_TEXCOORD_SETS))
                .map(|set| {
                    geometry
                        .vertices
                        .iter()
                        .map(|v| C2Vector::from(v.texcoord[set]))
                        .collect()
                })
                .collect(),
            triangles: geometry
                .triangles
                .iter()
                .map(|t| RawTriangle::new(t.indices, t.material_index as u16))
                .collect(),
            bounding_sphere: BoundingSphereRecord {
                center: C3Vector::from(geometry.bounding_sphere.center.to_array()),
                radius: geometry.bounding_sphere.radius,
            },
            positions: geometry.vertices.iter().map(|v| C3Vector::from(v.position)).collect(),
            normals: geometry.vertices.iter().map(|v| C3Vector::from(v.normal)).collect(),
            materials: geometry.materials.iter().map(Self::export_material).collect(),
        };

        AtomicAsset {
            header: Default::default(),
            geometry: record,
        }
    }

    fn export_material(material: &Material) -> MaterialRecord {
        MaterialRecord {
            color: material.color,
            textures: (0..MATERIAL_TEXTURE_SLOTS)
                .filter(|&slot| !material.texture_names[slot].is_empty())
                .map(|slot| TextureRecord {
                    slot: slot as u32,
                    filter: 2,
                    name: material.texture_names[slot].clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn export_then_import() -> Result<(), anyhow::Error> {
        let mut geometry = Geometry {
            texcoord_set_count: 2,
            materials: vec![Material::with_texture("grass"), Material::with_texture("rock")],
            ..Default::default()
        };
        for (i, position) in [Vec3::ZERO, Vec3::X * 400.0, Vec3::Z * 400.0, Vec3::new(400.0, 5.0, 400.0)]
            .into_iter()
            .enumerate()
        {
            let mut vertex = MeshVertex::new(position, Vec3::Y);
            vertex.texcoord[0] = [i as f32, 0.0];
            vertex.texcoord[1] = [0.0, i as f32];
            geometry.vertices.push(vertex);
        }
        geometry.triangles = vec![
            MeshTriangle {
                indices: [0, 2, 1],
                material_index: 1,
            },
            MeshTriangle {
                indices: [1, 2, 3],
                material_index: 0,
            },
        ];
        geometry.calculate_bounding_sphere();
        geometry.rebuild_splits();

        let imported = AtomicImporter::create_geometry(&AtomicImporter::export_geometry(&geometry))?;
        assert_eq!(imported.vertices, geometry.vertices);
        assert_eq!(imported.triangles, geometry.triangles);
        assert_eq!(imported.splits, geometry.splits);
        assert_eq!(imported.materials, geometry.materials);
        assert_eq!(imported.bounding_sphere, geometry.bounding_sphere);
        Ok(())
    }

    #[test]
    pub fn missing_normals_are_calculated() -> Result<(), anyhow::Error> {
        let mut asset = AtomicAsset::default();
        asset.geometry.positions = vec![
            C3Vector::from([0.0, 0.0, 0.0]),
            C3Vector::from([0.0, 0.0, 400.0]),
            C3Vector::from([400.0, 0.0, 0.0]),
        ];
        asset.geometry.triangles = vec![RawTriangle::new([0, 1, 2], 0)];
        asset.geometry.materials = vec![MaterialRecord::default()];

        let geometry = AtomicImporter::create_geometry(&asset)?;
        assert!(geometry.vertices.iter().all(|v| v.normal() == Vec3::Y));
        assert!(geometry.bounding_sphere.radius > 0.0);
        assert_eq!(geometry.splits.len(), 1);
        Ok(())
    }
}
