use std::io::{Read, Write};

use archterrain_files_derive_parseable::{Parse, Writeable};

use crate::ParserError;
use crate::common::reader::Parseable;
use crate::common::writer::Writeable;

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse, Writeable)]
pub struct C3Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Parse, Writeable)]
pub struct C2Vector {
    pub x: f32,
    pub y: f32,
}

impl From<[f32; 3]> for C3Vector {
    fn from(value: [f32; 3]) -> Self {
        C3Vector {
            x: value[0],
            y: value[1],
            z: value[2],
        }
    }
}

impl From<C3Vector> for [f32; 3] {
    fn from(value: C3Vector) -> Self {
        [value.x, value.y, value.z]
    }
}

impl From<[f32; 2]> for C2Vector {
    fn from(value: [f32; 2]) -> Self {
        C2Vector { x: value[0], y: value[1] }
    }
}

impl From<C2Vector> for [f32; 2] {
    fn from(value: C2Vector) -> Self {
        [value.x, value.y]
    }
}

/// Header of one node in a chunk tree: `{id, size, version}`, `size` excluding the header itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Parse, Writeable)]
pub struct ChunkHeader {
    pub id: u32,
    pub size: u32,
    pub version: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = 12;

    pub fn read_next_chunk<R: Read>(rdr: &mut R) -> Result<ChunkHeader, ParserError> {
        ChunkHeader::parse(rdr)
    }

    /// Skips forward until a chunk with `id` is found and returns its header, leaving `rdr` at its body.
    /// Chunks of other types are skipped entirely, including their children.
    pub fn find_chunk<R: Read>(rdr: &mut R, id: u32) -> Result<ChunkHeader, ParserError> {
        loop {
            let header = ChunkHeader::read_next_chunk(rdr)?;
            if header.id == id {
                return Ok(header);
            }
            std::io::copy(&mut rdr.by_ref().take(header.size as u64), &mut std::io::sink())?;
        }
    }
}

/// Serializes a chunk whose size is only known once its body has been written.
pub(crate) fn write_chunk<W, F>(wtr: &mut W, id: u32, version: u32, body: F) -> Result<(), ParserError>
where
    W: Write,
    F: FnOnce(&mut Vec<u8>) -> Result<(), ParserError>,
{
    let mut buf = Vec::new();
    body(&mut buf)?;
    let header = ChunkHeader {
        id,
        size: u32::try_from(buf.len()).map_err(|_| ParserError::FormatError {
            reason: "Chunk body exceeds 4 GiB",
        })?,
        version,
    };
    header.write(wtr)?;
    wtr.write_all(&buf)?;
    Ok(())
}
