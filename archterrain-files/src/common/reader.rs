use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;

pub(crate) trait Parseable<T> {
    fn parse<R: Read>(rdr: &mut R) -> Result<T, ParserError>;
}

impl Parseable<u8> for u8 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u8, ParserError> {
        Ok(rdr.read_u8()?)
    }
}

impl Parseable<u16> for u16 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u16, ParserError> {
        Ok(rdr.read_u16::<LittleEndian>()?)
    }
}

impl Parseable<i32> for i32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<i32, ParserError> {
        Ok(rdr.read_i32::<LittleEndian>()?)
    }
}

impl Parseable<u32> for u32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<u32, ParserError> {
        Ok(rdr.read_u32::<LittleEndian>()?)
    }
}

impl Parseable<f32> for f32 {
    fn parse<R: Read>(rdr: &mut R) -> Result<f32, ParserError> {
        Ok(rdr.read_f32::<LittleEndian>()?)
    }
}

/// Reads `count` consecutive records. The count always comes from a header, so a short read is an error.
pub(crate) fn read_array<T: Parseable<T>, R: Read>(rdr: &mut R, count: usize) -> Result<Vec<T>, ParserError> {
    let mut list = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        list.push(T::parse(rdr)?);
    }
    Ok(list)
}

/// Reads a fixed-size, NUL-padded string field and returns everything before the first NUL.
pub(crate) fn read_padded_string<R: Read>(rdr: &mut R, len: usize) -> Result<Vec<u8>, ParserError> {
    let mut buf = vec![0u8; len];
    rdr.read_exact(&mut buf)?;
    if let Some(nul) = buf.iter().position(|&c| c == 0) {
        buf.truncate(nul);
    }
    Ok(buf)
}
