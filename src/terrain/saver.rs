use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Error};
use archterrain_files::atomic::writer::AtomicWriter;
use archterrain_files::segment::types::SegmentInfo;
use archterrain_files::segment::writer::SegmentWriter;

use crate::rendering::common::types::Geometry;
use crate::rendering::importer::atomic_importer::AtomicImporter;
use crate::terrain::world::{SectorIndex, geometry_save_path, segment_save_path};

/// Snapshot of the dirty parts of one sector. `None` parts are not written.
#[derive(Debug)]
pub struct SaveRequest {
    pub index: SectorIndex,
    pub geometry: Option<Arc<Geometry>>,
    pub segment_info: Option<Arc<SegmentInfo>>,
}

/// The snapshot that was written, next to the outcome of writing it.
#[derive(Debug)]
pub struct Saved<T> {
    pub snapshot: Arc<T>,
    pub result: Result<PathBuf, Error>,
}

impl<T> Saved<T> {
    /// Whether `current` is still the exact data that was written.
    pub fn is_current(&self, current: Option<&Arc<T>>) -> bool {
        current.is_some_and(|current| Arc::ptr_eq(current, &self.snapshot))
    }
}

/// Each write succeeds or fails on its own, `None` when it was not requested.
#[derive(Debug)]
pub struct SaveResult {
    pub index: SectorIndex,
    pub geometry: Option<Saved<Geometry>>,
    pub segment_info: Option<Saved<SegmentInfo>>,
}

pub fn save_sector(client_dir: &Path, request: SaveRequest) -> SaveResult {
    let index = request.index;
    SaveResult {
        index,
        geometry: request.geometry.map(|snapshot| Saved {
            result: save_geometry(client_dir, index, &snapshot),
            snapshot,
        }),
        segment_info: request.segment_info.map(|snapshot| Saved {
            result: save_segment_info(client_dir, index, &snapshot),
            snapshot,
        }),
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("Writing {}", path.display()))
}

/// Writes the `exists` marker followed by the atomic, the same layout a geometry pack entry has.
pub fn save_geometry(client_dir: &Path, index: SectorIndex, geometry: &Geometry) -> Result<PathBuf, Error> {
    let mut buffer = Vec::with_capacity(1 << 20);
    buffer.extend_from_slice(&1i32.to_le_bytes());
    AtomicWriter::write_asset(&AtomicImporter::export_geometry(geometry), &mut buffer)?;

    let path = geometry_save_path(client_dir, index);
    write_file(&path, &buffer)?;
    Ok(path)
}

pub fn save_segment_info(client_dir: &Path, index: SectorIndex, info: &SegmentInfo) -> Result<PathBuf, Error> {
    let path = segment_save_path(client_dir, index);
    write_file(&path, &SegmentWriter::to_bytes(info)?)?;
    Ok(path)
}
