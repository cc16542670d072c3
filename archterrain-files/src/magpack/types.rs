use crate::ParserError;
use crate::magpack::aplib;

/// The header is this string, NUL-padded to [`MAGPACK_HEADER_SIZE`] bytes.
pub const MAGPACK_MAGIC: &[u8] = b"MagPack Ver 0.1a";
pub const MAGPACK_HEADER_SIZE: usize = 50;
pub const MAGPACK_ENTRY_COUNT: usize = 256;
/// Both size fields are stored XOR'ed with this key.
pub const MAGPACK_SIZE_KEY: u32 = 0x6969;
/// Exclusive upper bound for the length of an entry name.
pub const MAGPACK_MAX_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackEntry {
    pub name: String,
    /// Either the aPLib stream or the plain bytes, depending on `is_compressed`.
    pub data: Vec<u8>,
    pub decompressed_size: usize,
    pub is_compressed: bool,
}

impl PackEntry {
    pub fn from_plain(name: impl Into<String>, data: Vec<u8>) -> Self {
        PackEntry {
            name: name.into(),
            decompressed_size: data.len(),
            data,
            is_compressed: false,
        }
    }

    /// Writes the plain contents into `scratch`, reusing its allocation.
    pub fn decompress_into(&self, scratch: &mut Vec<u8>) -> Result<(), ParserError> {
        if self.is_compressed {
            aplib::depack_into(&self.data, scratch, self.decompressed_size)
        } else {
            scratch.clear();
            scratch.extend_from_slice(&self.data);
            Ok(())
        }
    }

    /// Replaces the compressed payload with its plain contents.
    pub fn decompress(&mut self) -> Result<(), ParserError> {
        if self.is_compressed {
            self.data = aplib::depack(&self.data, self.decompressed_size)?;
            self.is_compressed = false;
        }
        Ok(())
    }

    pub fn compress(&mut self) {
        if !self.is_compressed {
            self.data = aplib::pack(&self.data);
            self.is_compressed = true;
        }
    }
}

/// A MagPack archive: always exactly [`MAGPACK_ENTRY_COUNT`] entries, most of them possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagPack {
    pub entries: Vec<PackEntry>,
}

impl Default for MagPack {
    fn default() -> Self {
        MagPack {
            entries: vec![PackEntry::default(); MAGPACK_ENTRY_COUNT],
        }
    }
}

impl MagPack {
    pub fn entry(&self, index: usize) -> Option<&PackEntry> {
        self.entries.get(index)
    }
}
