use std::ops::Range;
use std::sync::Arc;

use anyhow::{Error, anyhow};
use log::{error, trace};

use crate::rendering::common::mesh_merger::MeshMerger;
use crate::rendering::common::types::{Geometry, Material, MeshVertex};
use crate::rendering::renderer::{BufferHandle, MaterialTextures, Renderer};
use crate::terrain::world::SectorIndex;

#[derive(Debug, Clone)]
pub struct DrawBatch {
    pub first_index: u32,
    pub index_count: u32,
    pub material: Material,
    pub textures: MaterialTextures,
}

/// Every visible, loaded sector merged into one vertex and one index buffer, with one batch per material.
/// `sectors` and `vertex_offsets` run in parallel.
#[derive(Debug, Default)]
pub struct DrawBuffer {
    pub sectors: Vec<SectorIndex>,
    pub vertex_offsets: Vec<u32>,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub batches: Vec<DrawBatch>,
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
}

impl DrawBuffer {
    /// Runs on a worker. A failed buffer allocation is logged and leaves the buffer without GPU handles, it then
    /// simply is not drawn.
    pub fn build(sectors: Vec<(SectorIndex, Arc<Geometry>)>, renderer: &dyn Renderer) -> DrawBuffer {
        let merged = MeshMerger::merge_geometries(sectors.iter().map(|(_, geometry)| geometry.as_ref()));
        let (indices, ranges) = merged.flatten_indices();

        let batches = merged
            .batches
            .into_iter()
            .zip(ranges)
            .map(|(batch, (first_index, index_count))| DrawBatch {
                first_index,
                index_count,
                textures: batch
                    .material
                    .texture_names
                    .each_ref()
                    .map(|name| renderer.acquire_texture(name)),
                material: batch.material,
            })
            .collect();

        let mut draw_buffer = DrawBuffer {
            sectors: sectors.into_iter().map(|(index, _)| index).collect(),
            vertex_offsets: merged.vertex_offsets,
            vertices: merged.vertices,
            indices,
            batches,
            vertex_buffer: None,
            index_buffer: None,
        };

        if draw_buffer.indices.is_empty() {
            trace!("Draw buffer of {} sectors has nothing to draw", draw_buffer.sectors.len());
            return draw_buffer;
        }

        match draw_buffer.create_gpu_buffers(renderer) {
            Ok((vertex_buffer, index_buffer)) => {
                draw_buffer.vertex_buffer = Some(vertex_buffer);
                draw_buffer.index_buffer = Some(index_buffer);
            }
            Err(e) => error!("Failed to create the terrain buffers: {:?}", e),
        }
        draw_buffer
    }

    fn create_gpu_buffers(&self, renderer: &dyn Renderer) -> Result<(BufferHandle, BufferHandle), Error> {
        let vertex_buffer = renderer.create_vertex_buffer(bytemuck::cast_slice(&self.vertices))?;
        match renderer.create_index_buffer(bytemuck::cast_slice(&self.indices)) {
            Ok(index_buffer) => Ok((vertex_buffer, index_buffer)),
            Err(e) => {
                renderer.destroy_buffer(vertex_buffer);
                Err(e)
            }
        }
    }

    pub fn contains(&self, index: SectorIndex) -> bool {
        self.sectors.contains(&index)
    }

    /// The vertices `index` contributed.
    pub fn vertex_range(&self, index: SectorIndex) -> Option<Range<usize>> {
        let position = self.sectors.iter().position(|&s| s == index)?;
        let start = self.vertex_offsets[position] as usize;
        let end = self
            .vertex_offsets
            .get(position + 1)
            .map_or(self.vertices.len(), |&offset| offset as usize);
        Some(start..end)
    }

    /// Copies the edited vertices of a sector over its range, on the CPU side and on the GPU.
    /// Fails when the sector's vertex count changed since the buffer was built.
    pub fn patch_vertices(
        &mut self,
        index: SectorIndex,
        vertices: &[MeshVertex],
        renderer: &dyn Renderer,
    ) -> Result<(), Error> {
        let range = self
            .vertex_range(index)
            .ok_or_else(|| anyhow!("Sector {} is not part of the draw buffer", index))?;
        if range.len() != vertices.len() {
            return Err(anyhow!(
                "Sector {} has {} vertices, the draw buffer holds {}",
                index,
                vertices.len(),
                range.len()
            ));
        }

        self.vertices[range.clone()].copy_from_slice(vertices);
        if let Some(vertex_buffer) = self.vertex_buffer {
            let offset = range.start * size_of::<MeshVertex>();
            renderer.update_vertex_buffer(vertex_buffer, offset, bytemuck::cast_slice(vertices))?;
        }
        Ok(())
    }

    /// One draw call per batch.
    pub fn render(&self, renderer: &dyn Renderer) {
        let (Some(vertex_buffer), Some(index_buffer)) = (self.vertex_buffer, self.index_buffer) else {
            return;
        };
        for batch in &self.batches {
            renderer.bind_material(&batch.textures);
            renderer.draw_indexed(vertex_buffer, index_buffer, batch.first_index, batch.index_count);
        }
    }

    /// Gives the GPU buffers and textures back and empties the buffer.
    pub fn release(&mut self, renderer: &dyn Renderer) {
        for batch in self.batches.drain(..) {
            for texture in batch.textures.into_iter().flatten() {
                renderer.release_texture(texture);
            }
        }
        if let Some(vertex_buffer) = self.vertex_buffer.take() {
            renderer.destroy_buffer(vertex_buffer);
        }
        if let Some(index_buffer) = self.index_buffer.take() {
            renderer.destroy_buffer(index_buffer);
        }
        self.sectors.clear();
        self.vertex_offsets.clear();
        self.vertices.clear();
        self.indices.clear();
    }
}
