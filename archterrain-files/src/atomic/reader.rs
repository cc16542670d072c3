use std::io::{Cursor, Read};

use crate::ParserError;
use crate::atomic::types::{
    AtomicAsset, AtomicHeader, BoundingSphereRecord, CHUNK_ATOMIC, CHUNK_GEOMETRY, CHUNK_MATERIAL, CHUNK_MATLIST,
    CHUNK_STRING, CHUNK_STRUCT, CHUNK_TEXTURE, GeometryFormat, GeometryHeader, GeometryRecord, MAX_TEXCOORD_SETS,
    MAX_TEXTURE_SLOTS, MaterialHeader, MaterialRecord, RawTriangle, TextureHeader, TextureRecord,
};
use crate::common::reader::{Parseable, read_array};
use crate::common::types::{C2Vector, C3Vector, ChunkHeader};

pub struct AtomicReader {}

impl AtomicReader {
    /// Skips ahead to the first atomic chunk in `rdr` and parses it.
    pub fn parse_asset<R: Read>(rdr: &mut R) -> Result<AtomicAsset, ParserError> {
        let atomic = read_chunk_body(rdr, CHUNK_ATOMIC)?;
        let mut rdr = Cursor::new(atomic.as_slice());

        let header = read_chunk_body(&mut rdr, CHUNK_STRUCT)?;
        let header = AtomicHeader::parse(&mut Cursor::new(header))?;
        let geometry = read_chunk_body(&mut rdr, CHUNK_GEOMETRY)?;
        let geometry = parse_geometry(&mut Cursor::new(geometry))?;

        Ok(AtomicAsset { header, geometry })
    }
}

fn read_chunk_body<R: Read>(rdr: &mut R, id: u32) -> Result<Vec<u8>, ParserError> {
    let header = ChunkHeader::find_chunk(rdr, id)?;
    let mut body = vec![0u8; header.size as usize];
    rdr.read_exact(&mut body)?;
    Ok(body)
}

fn parse_geometry<R: Read>(rdr: &mut R) -> Result<GeometryRecord, ParserError> {
    let mut body = Cursor::new(read_chunk_body(rdr, CHUNK_STRUCT)?);
    let header = GeometryHeader::parse(&mut body)?;
    let format = GeometryFormat::from_bits_retain(header.format);
    let vertex_count = header.vertex_count as usize;

    let texcoord_set_count = ((header.format >> 16) & 0xFF) as usize;
    if texcoord_set_count > MAX_TEXCOORD_SETS {
        return Err(ParserError::FormatError {
            reason: "Too many texture coordinate sets",
        });
    }
    let texcoord_sets = (0..texcoord_set_count)
        .map(|_| read_array::<C2Vector, _>(&mut body, vertex_count))
        .collect::<Result<Vec<_>, _>>()?;
    let triangles = read_array::<RawTriangle, _>(&mut body, header.triangle_count as usize)?;
    let bounding_sphere = BoundingSphereRecord::parse(&mut body)?;
    let positions = match format.contains(GeometryFormat::POSITIONS) {
        true => read_array::<C3Vector, _>(&mut body, vertex_count)?,
        false => vec![C3Vector::default(); vertex_count],
    };
    let normals = match format.contains(GeometryFormat::NORMALS) {
        true => read_array::<C3Vector, _>(&mut body, vertex_count)?,
        false => Vec::new(),
    };

    let materials = parse_material_list(rdr)?;

    for triangle in &triangles {
        if triangle.indices().iter().any(|&i| i as usize >= vertex_count) {
            return Err(ParserError::FormatError {
                reason: "Triangle references a missing vertex",
            });
        }
        if triangle.material_id as usize >= materials.len() {
            return Err(ParserError::FormatError {
                reason: "Triangle references a missing material",
            });
        }
    }

    Ok(GeometryRecord {
        texcoord_sets,
        triangles,
        bounding_sphere,
        positions,
        normals,
        materials,
    })
}

fn parse_material_list<R: Read>(rdr: &mut R) -> Result<Vec<MaterialRecord>, ParserError> {
    let mut rdr = Cursor::new(read_chunk_body(rdr, CHUNK_MATLIST)?);
    let mut body = Cursor::new(read_chunk_body(&mut rdr, CHUNK_STRUCT)?);
    let count = u32::parse(&mut body)? as usize;
    // instance indices, always -1 as every material is stored inline
    read_array::<i32, _>(&mut body, count)?;

    (0..count).map(|_| parse_material(&mut rdr)).collect()
}

fn parse_material<R: Read>(rdr: &mut R) -> Result<MaterialRecord, ParserError> {
    let mut rdr = Cursor::new(read_chunk_body(rdr, CHUNK_MATERIAL)?);
    let header = MaterialHeader::parse(&mut Cursor::new(read_chunk_body(&mut rdr, CHUNK_STRUCT)?))?;
    if header.texture_count as usize > MAX_TEXTURE_SLOTS {
        return Err(ParserError::FormatError {
            reason: "Too many textures in material",
        });
    }

    let mut textures = Vec::with_capacity(header.texture_count as usize);
    for _ in 0..header.texture_count {
        let mut texture = Cursor::new(read_chunk_body(&mut rdr, CHUNK_TEXTURE)?);
        let header = TextureHeader::parse(&mut Cursor::new(read_chunk_body(&mut texture, CHUNK_STRUCT)?))?;
        if header.slot as usize >= MAX_TEXTURE_SLOTS {
            return Err(ParserError::FormatError {
                reason: "Texture slot out of range",
            });
        }
        let mut name = read_chunk_body(&mut texture, CHUNK_STRING)?;
        if let Some(nul) = name.iter().position(|&c| c == 0) {
            name.truncate(nul);
        }
        textures.push(TextureRecord {
            slot: header.slot,
            filter: header.filter,
            name: String::from_utf8(name)?,
        });
    }

    Ok(MaterialRecord {
        color: header.color,
        textures,
    })
}
