use std::fmt::{Debug, Formatter};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

pub const MAX_TEXCOORD_SETS: usize = 8;
pub const MATERIAL_TEXTURE_SLOTS: usize = 6;

/// The exact layout uploaded into vertex buffers.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [[f32; 2]; MAX_TEXCOORD_SETS],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        MeshVertex {
            position: position.to_array(),
            normal: normal.to_array(),
            texcoord: Default::default(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    /// Exact comparison, which is how vertices on both sides of a sector seam are matched.
    pub fn eq_pos(&self, other: &MeshVertex) -> bool {
        self.position == other.position
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MeshTriangle {
    pub indices: [u16; 3],
    pub material_index: u32,
}

/// A contiguous range of `Geometry::indices` sharing one material.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MeshSplit {
    pub index_offset: u32,
    pub index_count: u32,
    pub material_index: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub color: u32,
    /// Empty names are unused slots.
    pub texture_names: [String; MATERIAL_TEXTURE_SLOTS],
}

impl Material {
    pub fn with_texture(name: impl Into<String>) -> Self {
        let mut material = Material {
            color: 0xFFFF_FFFF,
            ..Default::default()
        };
        material.texture_names[0] = name.into();
        material
    }
}

/// Two materials are the same when all texture names match, ignoring case.
impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.texture_names
            .iter()
            .zip(&other.texture_names)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Material {}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<MeshVertex>,
    /// How many of the `MeshVertex::texcoord` sets carry data.
    pub texcoord_set_count: usize,
    pub triangles: Vec<MeshTriangle>,
    /// Triangle indices grouped by split, see [`Geometry::rebuild_splits`].
    pub indices: Vec<u16>,
    pub splits: Vec<MeshSplit>,
    pub materials: Vec<Material>,
    pub bounding_sphere: BoundingSphere,
}

impl Debug for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{ vertices: [{}], ", self.vertices.len())?;
        write!(f, "triangles: [{}], ", self.triangles.len())?;
        write!(f, "splits: [{}], ", self.splits.len())?;
        write!(f, "materials: {:?}, ", self.materials)?;
        write!(f, "bounding_sphere: {:?} }}", self.bounding_sphere)
    }
}
