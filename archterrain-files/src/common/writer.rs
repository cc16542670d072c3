use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;

pub(crate) trait Writeable {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError>;
}

impl Writeable for u8 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u8(*self)?)
    }
}

impl Writeable for u16 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u16::<LittleEndian>(*self)?)
    }
}

impl Writeable for i32 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_i32::<LittleEndian>(*self)?)
    }
}

impl Writeable for u32 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_u32::<LittleEndian>(*self)?)
    }
}

impl Writeable for f32 {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        Ok(wtr.write_f32::<LittleEndian>(*self)?)
    }
}

impl<T: Writeable> Writeable for [T] {
    fn write<W: Write>(&self, wtr: &mut W) -> Result<(), ParserError> {
        for element in self {
            element.write(wtr)?;
        }
        Ok(())
    }
}

/// Writes `value` into a fixed-size field, NUL-padding the remainder.
pub(crate) fn write_padded_string<W: Write>(wtr: &mut W, value: &[u8], len: usize) -> Result<(), ParserError> {
    if value.len() >= len {
        return Err(ParserError::FormatError {
            reason: "String does not fit its fixed-size field",
        });
    }
    wtr.write_all(value)?;
    wtr.write_all(&vec![0u8; len - value.len()])?;
    Ok(())
}
