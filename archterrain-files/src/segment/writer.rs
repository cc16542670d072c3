use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;
use crate::common::writer::Writeable;
use crate::segment::types::{SEGMENT_DEPTH, SEGMENT_LATEST_VERSION, SegmentInfo};

pub struct SegmentWriter {}

impl SegmentWriter {
    /// Always writes the latest version.
    pub fn write_asset<W: Write>(info: &SegmentInfo, wtr: &mut W) -> Result<(), ParserError> {
        wtr.write_u32::<LittleEndian>(SEGMENT_LATEST_VERSION)?;
        wtr.write_u32::<LittleEndian>(info.flags)?;
        wtr.write_u32::<LittleEndian>(SEGMENT_DEPTH as u32)?;
        for z in 0..SEGMENT_DEPTH {
            for x in 0..SEGMENT_DEPTH {
                let segment = &info.segments[x][z];
                wtr.write_all(&segment.tile.to_bytes())?;
                wtr.write_u16::<LittleEndian>(segment.region_id)?;
            }
        }
        wtr.write_u32::<LittleEndian>(info.line_blocks.len() as u32)?;
        info.line_blocks.as_slice().write(wtr)?;
        Ok(())
    }

    pub fn to_bytes(info: &SegmentInfo) -> Result<Vec<u8>, ParserError> {
        let mut buf = Vec::with_capacity(16 + SEGMENT_DEPTH * SEGMENT_DEPTH * 4);
        Self::write_asset(info, &mut buf)?;
        Ok(buf)
    }
}
