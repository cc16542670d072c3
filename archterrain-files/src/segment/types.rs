use archterrain_files_derive_parseable::{Parse, Writeable};
use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::types::C3Vector;

pub const SEGMENT_VERSION_1: u32 = 0x1000;
pub const SEGMENT_VERSION_2: u32 = 0x1001;
pub const SEGMENT_VERSION_3: u32 = 0x1002;
pub const SEGMENT_VERSION_4: u32 = 0x1003;
pub const SEGMENT_LATEST_VERSION: u32 = SEGMENT_VERSION_4;

/// Segments per sector edge.
pub const SEGMENT_DEPTH: usize = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TileType {
    Soil = 0,
    Swamp,
    Grass,
    Sand,
    Leaf,
    Snow,
    Water,
    Stone,
    Wood,
    Metal,
    Bone,
    Mud,
    SoilGrass,
    SolidSoil,
    Spore,
    Moss,
    Granite,
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct GeometryBlock: u8 {
        const GROUND = 0x1;
        const SKY = 0x2;
    }
}

/// Two bytes on disk:
/// `byte0 = is_edge_turn:1 | tile_type:7`, `byte1 = geometry_block:4 | has_no_layer:1 | reserved:3` (LSB first).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TileInfo {
    pub is_edge_turn: bool,
    pub tile_type: u8,
    pub geometry_block: u8,
    pub has_no_layer: bool,
    pub reserved: u8,
}

impl TileInfo {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        TileInfo {
            is_edge_turn: bytes[0] & 0x1 != 0,
            tile_type: bytes[0] >> 1,
            geometry_block: bytes[1] & 0xF,
            has_no_layer: bytes[1] & 0x10 != 0,
            reserved: bytes[1] >> 5,
        }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        [
            (self.is_edge_turn as u8) | (self.tile_type & 0x7F) << 1,
            (self.geometry_block & 0xF) | (self.has_no_layer as u8) << 4 | (self.reserved & 0x7) << 5,
        ]
    }

    /// `None` for values outside the known tile types.
    pub fn tile_type(&self) -> Option<TileType> {
        TileType::try_from(self.tile_type).ok()
    }

    pub fn geometry_block(&self) -> GeometryBlock {
        GeometryBlock::from_bits_retain(self.geometry_block)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub tile: TileInfo,
    pub region_id: u16,
}

/// Road and path overlay.
#[derive(Debug, Copy, Clone, Default, PartialEq, Parse, Writeable)]
pub struct LineBlock {
    pub start: C3Vector,
    pub end: C3Vector,
    pub serial_number: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub flags: u32,
    /// Indexed `[x][z]`.
    pub segments: [[Segment; SEGMENT_DEPTH]; SEGMENT_DEPTH],
    pub line_blocks: Vec<LineBlock>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        SegmentInfo {
            flags: 0,
            segments: [[Segment::default(); SEGMENT_DEPTH]; SEGMENT_DEPTH],
            line_blocks: Vec::new(),
        }
    }
}

impl SegmentInfo {
    pub fn segment(&self, x: usize, z: usize) -> Option<&Segment> {
        self.segments.get(x)?.get(z)
    }

    pub fn segment_mut(&mut self, x: usize, z: usize) -> Option<&mut Segment> {
        self.segments.get_mut(x)?.get_mut(z)
    }
}
