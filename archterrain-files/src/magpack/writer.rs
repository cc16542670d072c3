use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::ParserError;
use crate::common::writer::write_padded_string;
use crate::magpack::aplib;
use crate::magpack::types::{
    MAGPACK_ENTRY_COUNT, MAGPACK_HEADER_SIZE, MAGPACK_MAGIC, MAGPACK_MAX_NAME_LEN, MAGPACK_SIZE_KEY, MagPack,
};

/// Extension appended to every path handed to [`MagPackWriter::pack`].
pub const MAGPACK_OUTPUT_SUFFIX: &str = ".npack";

pub struct MagPackWriter {}

impl MagPackWriter {
    /// Writes `pack` to `path` + `.npack` and returns the path actually written.
    pub fn pack(pack: &MagPack, path: &Path) -> Result<PathBuf, ParserError> {
        let mut target = path.as_os_str().to_owned();
        target.push(MAGPACK_OUTPUT_SUFFIX);
        let target = PathBuf::from(target);

        let mut wtr = BufWriter::new(File::create(&target)?);
        Self::write_asset(pack, &mut wtr)?;
        wtr.flush()?;
        Ok(target)
    }

    /// Entries that are not compressed yet are compressed on the fly.
    pub fn write_asset<W: Write>(pack: &MagPack, wtr: &mut W) -> Result<(), ParserError> {
        if pack.entries.len() != MAGPACK_ENTRY_COUNT {
            return Err(ParserError::FormatError {
                reason: "A pack has exactly 256 entries",
            });
        }

        let payloads = pack
            .entries
            .iter()
            .map(|entry| match entry.is_compressed {
                true => std::borrow::Cow::Borrowed(entry.data.as_slice()),
                false => std::borrow::Cow::Owned(aplib::pack(&entry.data)),
            })
            .collect::<Vec<_>>();

        write_padded_string(wtr, MAGPACK_MAGIC, MAGPACK_HEADER_SIZE)?;
        for (entry, payload) in pack.entries.iter().zip(&payloads) {
            if entry.name.len() >= MAGPACK_MAX_NAME_LEN {
                return Err(ParserError::FormatError {
                    reason: "Pack entry name is too long",
                });
            }
            wtr.write_u8(entry.name.len() as u8)?;
            wtr.write_all(entry.name.as_bytes())?;
            wtr.write_u32::<LittleEndian>(size_field(payload.len())?)?;
        }

        wtr.write_u8(0)?;

        for (entry, payload) in pack.entries.iter().zip(&payloads) {
            let plain_size = match entry.is_compressed {
                true => entry.decompressed_size,
                false => entry.data.len(),
            };
            wtr.write_u32::<LittleEndian>(size_field(plain_size)?)?;
            wtr.write_all(payload)?;
        }
        Ok(())
    }
}

fn size_field(size: usize) -> Result<u32, ParserError> {
    u32::try_from(size)
        .map(|size| size ^ MAGPACK_SIZE_KEY)
        .map_err(|_| ParserError::FormatError {
            reason: "Pack entry exceeds 4 GiB",
        })
}
