use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::reader::{Parseable, read_array};
use crate::segment::types::{
    LineBlock, SEGMENT_DEPTH, SEGMENT_VERSION_1, SEGMENT_VERSION_2, SEGMENT_VERSION_3, SEGMENT_VERSION_4, Segment,
    SegmentInfo, TileInfo,
};

pub struct SegmentReader {}

impl SegmentReader {
    pub fn parse_asset<R: Read>(rdr: &mut R) -> Result<SegmentInfo, ParserError> {
        let version = rdr.read_u32::<LittleEndian>()?;
        let mut info = SegmentInfo::default();

        match version {
            SEGMENT_VERSION_1 | SEGMENT_VERSION_2 => {
                if version == SEGMENT_VERSION_2 {
                    info.flags = rdr.read_u32::<LittleEndian>()?;
                }
                read_depth(rdr)?;
                for z in 0..SEGMENT_DEPTH {
                    for x in 0..SEGMENT_DEPTH {
                        let mut record = [0u8; 6];
                        rdr.read_exact(&mut record)?;
                        // the first two bytes were never used
                        info.segments[x][z] = Segment {
                            tile: TileInfo::from_bytes([record[2], record[3]]),
                            region_id: u16::from_le_bytes([record[4], record[5]]) & 0x00FF,
                        };
                    }
                }
            }
            SEGMENT_VERSION_3 | SEGMENT_VERSION_4 => {
                info.flags = rdr.read_u32::<LittleEndian>()?;
                read_depth(rdr)?;
                // stored z-major
                for z in 0..SEGMENT_DEPTH {
                    for x in 0..SEGMENT_DEPTH {
                        info.segments[x][z] = read_segment(rdr)?;
                    }
                }

                // the line block array is optional, older writers ended the file here
                let count = match rdr.read_u32::<LittleEndian>() {
                    Ok(count) => count as usize,
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => 0,
                    Err(e) => return Err(e.into()),
                };
                info.line_blocks = read_array::<LineBlock, _>(rdr, count)?;

                if version == SEGMENT_VERSION_3 {
                    for segment in info.segments.iter_mut().flatten() {
                        segment.tile.has_no_layer = false;
                        segment.tile.reserved = 0;
                    }
                }
            }
            version => return Err(ParserError::UnknownVersion { version }),
        }

        Ok(info)
    }
}

fn read_depth<R: Read>(rdr: &mut R) -> Result<(), ParserError> {
    let depth = u32::parse(rdr)?;
    if depth as usize != SEGMENT_DEPTH {
        return Err(ParserError::FormatError {
            reason: "Invalid compact segment depth",
        });
    }
    Ok(())
}

fn read_segment<R: Read>(rdr: &mut R) -> Result<Segment, ParserError> {
    let mut tile = [0u8; 2];
    rdr.read_exact(&mut tile)?;
    Ok(Segment {
        tile: TileInfo::from_bytes(tile),
        region_id: rdr.read_u16::<LittleEndian>()?,
    })
}
