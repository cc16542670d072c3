use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::ParserError;
use crate::common::reader::read_padded_string;
use crate::magpack::types::{
    MAGPACK_ENTRY_COUNT, MAGPACK_HEADER_SIZE, MAGPACK_MAGIC, MAGPACK_MAX_NAME_LEN, MAGPACK_SIZE_KEY, MagPack,
    PackEntry,
};

pub struct MagPackReader {}

impl MagPackReader {
    /// Opens the pack at `path`. A missing file is not an error, it just means there is no pack: `Ok(None)`.
    pub fn open(path: &Path, decompress: bool) -> Result<Option<MagPack>, ParserError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::parse_asset(&mut BufReader::new(file), decompress).map(Some)
    }

    /// With `decompress == false` the entries keep their aPLib payload, see [`PackEntry::decompress_into`].
    pub fn parse_asset<R: Read>(rdr: &mut R, decompress: bool) -> Result<MagPack, ParserError> {
        let magic = read_padded_string(rdr, MAGPACK_HEADER_SIZE)?;
        if magic != MAGPACK_MAGIC {
            let mut first = [0u8; 4];
            let n = magic.len().min(4);
            first[..n].copy_from_slice(&magic[..n]);
            return Err(ParserError::InvalidMagicValue {
                magic: u32::from_be_bytes(first),
            });
        }

        let mut entries = Vec::with_capacity(MAGPACK_ENTRY_COUNT);
        let mut packed_sizes = [0usize; MAGPACK_ENTRY_COUNT];
        for packed_size in packed_sizes.iter_mut() {
            let name_len = rdr.read_u8()? as usize;
            if name_len >= MAGPACK_MAX_NAME_LEN {
                return Err(ParserError::FormatError {
                    reason: "Pack entry name is too long",
                });
            }
            let mut name = vec![0u8; name_len];
            rdr.read_exact(&mut name)?;
            *packed_size = (rdr.read_u32::<LittleEndian>()? ^ MAGPACK_SIZE_KEY) as usize;
            entries.push(PackEntry {
                name: String::from_utf8(name)?,
                ..Default::default()
            });
        }

        // filler
        rdr.read_u8()?;

        for (entry, packed_size) in entries.iter_mut().zip(packed_sizes) {
            entry.decompressed_size = (rdr.read_u32::<LittleEndian>()? ^ MAGPACK_SIZE_KEY) as usize;
            let mut data = vec![0u8; packed_size];
            rdr.read_exact(&mut data)?;
            entry.data = data;
            entry.is_compressed = true;
            if decompress {
                entry.decompress()?;
            }
        }

        Ok(MagPack { entries })
    }
}
