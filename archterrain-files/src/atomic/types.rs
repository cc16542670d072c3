use archterrain_files_derive_parseable::{Parse, Writeable};
use bitflags::bitflags;

use crate::common::types::{C2Vector, C3Vector};

pub const CHUNK_STRUCT: u32 = 0x01;
pub const CHUNK_STRING: u32 = 0x02;
pub const CHUNK_EXTENSION: u32 = 0x03;
pub const CHUNK_TEXTURE: u32 = 0x06;
pub const CHUNK_MATERIAL: u32 = 0x07;
pub const CHUNK_MATLIST: u32 = 0x08;
pub const CHUNK_GEOMETRY: u32 = 0x0F;
pub const CHUNK_ATOMIC: u32 = 0x14;

pub const CHUNK_LIBRARY_VERSION: u32 = 0x1803_FFFF;

pub const MAX_TEXCOORD_SETS: usize = 8;
pub const MAX_TEXTURE_SLOTS: usize = 6;

bitflags! {
    /// Low bits of the geometry format word. Bits 16..24 hold the texture coordinate set count.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct GeometryFormat: u32 {
        const POSITIONS = 0x02;
        const TEXTURED = 0x04;
        const NORMALS = 0x10;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Writeable)]
pub struct AtomicHeader {
    pub frame_index: i32,
    pub geometry_index: i32,
    pub flags: u32,
    pub render_type: u32,
    pub blend_mode: u32,
    pub id: i32,
}

impl Default for AtomicHeader {
    fn default() -> Self {
        AtomicHeader {
            frame_index: 0,
            geometry_index: 0,
            flags: 5,
            render_type: 1,
            blend_mode: 0,
            id: -1,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Writeable)]
pub(crate) struct GeometryHeader {
    pub format: u32,
    pub triangle_count: u32,
    pub vertex_count: u32,
    pub morph_target_count: u32,
}

/// Vertex order on disk is `1, 0, material, 2`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Parse, Writeable)]
pub struct RawTriangle {
    pub vertex_1: u16,
    pub vertex_0: u16,
    pub material_id: u16,
    pub vertex_2: u16,
}

impl RawTriangle {
    pub fn new(indices: [u16; 3], material_id: u16) -> Self {
        RawTriangle {
            vertex_0: indices[0],
            vertex_1: indices[1],
            vertex_2: indices[2],
            material_id,
        }
    }

    pub fn indices(&self) -> [u16; 3] {
        [self.vertex_0, self.vertex_1, self.vertex_2]
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse, Writeable)]
pub struct BoundingSphereRecord {
    pub center: C3Vector,
    pub radius: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Writeable)]
pub(crate) struct MaterialHeader {
    pub flags: u32,
    pub color: u32,
    pub unused: u32,
    pub texture_count: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Writeable)]
pub(crate) struct TextureHeader {
    pub slot: u32,
    pub filter: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureRecord {
    pub slot: u32,
    pub filter: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialRecord {
    pub color: u32,
    pub textures: Vec<TextureRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryRecord {
    pub texcoord_sets: Vec<Vec<C2Vector>>,
    pub triangles: Vec<RawTriangle>,
    pub bounding_sphere: BoundingSphereRecord,
    pub positions: Vec<C3Vector>,
    pub normals: Vec<C3Vector>,
    pub materials: Vec<MaterialRecord>,
}

impl GeometryRecord {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicAsset {
    pub header: AtomicHeader,
    pub geometry: GeometryRecord,
}
