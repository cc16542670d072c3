use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Error, anyhow};
use archterrain_files::atomic::reader::AtomicReader;
use archterrain_files::magpack::reader::MagPackReader;
use archterrain_files::magpack::types::PackEntry;
use archterrain_files::segment::reader::SegmentReader;
use archterrain_files::segment::types::SegmentInfo;
use log::{error, trace};

use crate::rendering::common::types::Geometry;
use crate::rendering::importer::atomic_importer::AtomicImporter;
use crate::terrain::world::{SectorIndex, geometry_pack_path, segment_pack_path};

/// Work for one sector. The scratch buffer comes from the manager's pool and goes back there with the result.
#[derive(Debug)]
pub struct LoadRequest {
    pub index: SectorIndex,
    pub scratch: Vec<u8>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub index: SectorIndex,
    pub segment_info: Option<SegmentInfo>,
    pub geometry: Option<Geometry>,
    pub scratch: Vec<u8>,
}

/// Runs on a worker. Missing data and decode failures both leave the respective part empty, the latter is logged.
pub fn load_sector(client_dir: &Path, request: LoadRequest) -> LoadResult {
    let LoadRequest { index, mut scratch } = request;

    let segment_info = load_segment_info(client_dir, index, &mut scratch).unwrap_or_else(|e| {
        error!("Failed to load the segments of sector {}: {:?}", index, e);
        None
    });
    let geometry = load_geometry(client_dir, index, &mut scratch).unwrap_or_else(|e| {
        error!("Failed to load the geometry of sector {}: {:?}", index, e);
        None
    });

    LoadResult {
        index,
        segment_info,
        geometry,
        scratch,
    }
}

/// Decompresses the sector's entry of the pack at `path` into `scratch`. `false` when there is no such pack or entry.
fn unpack_entry(path: &Path, index: SectorIndex, scratch: &mut Vec<u8>) -> Result<bool, Error> {
    let Some(pack) = MagPackReader::open(path, false).with_context(|| format!("Reading {}", path.display()))? else {
        trace!("No pack {}, sector {} may be empty", path.display(), index);
        return Ok(false);
    };

    let entry = pack.entry(index.division_entry()).filter(|e| !is_empty(e));
    let Some(entry) = entry else {
        trace!("Pack {} has no entry for sector {}", path.display(), index);
        return Ok(false);
    };

    entry
        .decompress_into(scratch)
        .with_context(|| format!("Decompressing entry {} of {}", index.division_entry(), path.display()))?;
    Ok(true)
}

fn is_empty(entry: &PackEntry) -> bool {
    entry.data.is_empty() && entry.decompressed_size == 0
}

pub fn load_segment_info(
    client_dir: &Path,
    index: SectorIndex,
    scratch: &mut Vec<u8>,
) -> Result<Option<SegmentInfo>, Error> {
    let (division_x, division_z) = index.division();
    if !unpack_entry(&segment_pack_path(client_dir, division_x, division_z), index, scratch)? {
        return Ok(None);
    }

    let info = SegmentReader::parse_asset(&mut Cursor::new(scratch.as_slice()))?;
    Ok(Some(info))
}

pub fn load_geometry(client_dir: &Path, index: SectorIndex, scratch: &mut Vec<u8>) -> Result<Option<Geometry>, Error> {
    let (division_x, division_z) = index.division();
    if !unpack_entry(&geometry_pack_path(client_dir, division_x, division_z), index, scratch)? {
        return Ok(None);
    }

    let (exists, atomic) = scratch
        .split_first_chunk::<4>()
        .ok_or_else(|| anyhow!("Stream ended unexpectedly"))?;
    if i32::from_le_bytes(*exists) == 0 {
        trace!("Sector {} has no detail geometry", index);
        return Ok(None);
    }

    let asset = AtomicReader::parse_asset(&mut Cursor::new(atomic))?;
    Ok(Some(AtomicImporter::create_geometry(&asset)?))
}
