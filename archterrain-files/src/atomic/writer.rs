use std::io::Write;

use crate::ParserError;
use crate::atomic::types::{
    AtomicAsset, CHUNK_ATOMIC, CHUNK_EXTENSION, CHUNK_GEOMETRY, CHUNK_LIBRARY_VERSION, CHUNK_MATERIAL, CHUNK_MATLIST,
    CHUNK_STRING, CHUNK_STRUCT, CHUNK_TEXTURE, GeometryFormat, GeometryHeader, GeometryRecord, MAX_TEXCOORD_SETS,
    MaterialHeader, MaterialRecord, TextureHeader,
};
use crate::common::types::write_chunk;
use crate::common::writer::Writeable;

pub struct AtomicWriter {}

impl AtomicWriter {
    pub fn write_asset<W: Write>(asset: &AtomicAsset, wtr: &mut W) -> Result<(), ParserError> {
        write_chunk(wtr, CHUNK_ATOMIC, CHUNK_LIBRARY_VERSION, |buf| {
            write_chunk(buf, CHUNK_STRUCT, CHUNK_LIBRARY_VERSION, |buf| asset.header.write(buf))?;
            write_geometry(buf, &asset.geometry)?;
            write_chunk(buf, CHUNK_EXTENSION, CHUNK_LIBRARY_VERSION, |_| Ok(()))
        })
    }
}

fn write_geometry(wtr: &mut Vec<u8>, geometry: &GeometryRecord) -> Result<(), ParserError> {
    let vertex_count = geometry.vertex_count();
    if geometry.texcoord_sets.len() > MAX_TEXCOORD_SETS
        || geometry.texcoord_sets.iter().any(|set| set.len() != vertex_count)
        || (!geometry.normals.is_empty() && geometry.normals.len() != vertex_count)
    {
        return Err(ParserError::FormatError {
            reason: "Vertex attribute arrays differ in length",
        });
    }

    let mut format = GeometryFormat::POSITIONS;
    if !geometry.normals.is_empty() {
        format |= GeometryFormat::NORMALS;
    }
    if !geometry.texcoord_sets.is_empty() {
        format |= GeometryFormat::TEXTURED;
    }
    let header = GeometryHeader {
        format: format.bits() | (geometry.texcoord_sets.len() as u32) << 16,
        triangle_count: geometry.triangles.len() as u32,
        vertex_count: vertex_count as u32,
        morph_target_count: 1,
    };

    write_chunk(wtr, CHUNK_GEOMETRY, CHUNK_LIBRARY_VERSION, |buf| {
        write_chunk(buf, CHUNK_STRUCT, CHUNK_LIBRARY_VERSION, |buf| {
            header.write(buf)?;
            for set in &geometry.texcoord_sets {
                set.as_slice().write(buf)?;
            }
            geometry.triangles.as_slice().write(buf)?;
            geometry.bounding_sphere.write(buf)?;
            geometry.positions.as_slice().write(buf)?;
            geometry.normals.as_slice().write(buf)
        })?;
        write_material_list(buf, &geometry.materials)?;
        write_chunk(buf, CHUNK_EXTENSION, CHUNK_LIBRARY_VERSION, |_| Ok(()))
    })
}

fn write_material_list(wtr: &mut Vec<u8>, materials: &[MaterialRecord]) -> Result<(), ParserError> {
    write_chunk(wtr, CHUNK_MATLIST, CHUNK_LIBRARY_VERSION, |buf| {
        write_chunk(buf, CHUNK_STRUCT, CHUNK_LIBRARY_VERSION, |buf| {
            (materials.len() as u32).write(buf)?;
            for _ in materials {
                (-1i32).write(buf)?;
            }
            Ok(())
        })?;
        for material in materials {
            write_material(buf, material)?;
        }
        Ok(())
    })
}

fn write_material(wtr: &mut Vec<u8>, material: &MaterialRecord) -> Result<(), ParserError> {
    write_chunk(wtr, CHUNK_MATERIAL, CHUNK_LIBRARY_VERSION, |buf| {
        let header = MaterialHeader {
            flags: 0,
            color: material.color,
            unused: 0,
            texture_count: material.textures.len() as u32,
        };
        write_chunk(buf, CHUNK_STRUCT, CHUNK_LIBRARY_VERSION, |buf| header.write(buf))?;
        for texture in &material.textures {
            write_chunk(buf, CHUNK_TEXTURE, CHUNK_LIBRARY_VERSION, |buf| {
                let header = TextureHeader {
                    slot: texture.slot,
                    filter: texture.filter,
                };
                write_chunk(buf, CHUNK_STRUCT, CHUNK_LIBRARY_VERSION, |buf| header.write(buf))?;
                write_chunk(buf, CHUNK_STRING, CHUNK_LIBRARY_VERSION, |buf| {
                    // NUL-terminated, padded to four bytes
                    buf.write_all(texture.name.as_bytes())?;
                    let padded = (texture.name.len() + 4) & !3;
                    buf.resize(buf.len() + padded - texture.name.len(), 0);
                    Ok(())
                })
            })?;
        }
        write_chunk(buf, CHUNK_EXTENSION, CHUNK_LIBRARY_VERSION, |_| Ok(()))
    })
}
