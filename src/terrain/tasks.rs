use std::path::PathBuf;
use std::sync::Arc;

use crate::rendering::common::types::Geometry;
use crate::rendering::renderer::Renderer;
use crate::terrain::draw_buffer::DrawBuffer;
use crate::terrain::loader::{LoadRequest, LoadResult, load_sector};
use crate::terrain::saver::{SaveRequest, SaveResult, save_sector};
use crate::terrain::world::SectorIndex;

/// What the workers get to see. Everything else stays with the manager.
pub struct TaskContext {
    pub client_dir: PathBuf,
    pub renderer: Arc<dyn Renderer>,
}

/// Work handed to the task pool.
pub enum Operation {
    LoadSector(LoadRequest),
    SaveSector(SaveRequest),
    BuildDrawBuffer(Vec<(SectorIndex, Arc<Geometry>)>),
}

/// The result of an [`Operation`], applied on the thread owning the sectors.
pub enum Completion {
    SectorLoaded(LoadResult),
    SectorSaved(SaveResult),
    DrawBufferBuilt(DrawBuffer),
}

impl Operation {
    pub fn execute(self, context: &TaskContext) -> Completion {
        match self {
            Operation::LoadSector(request) => Completion::SectorLoaded(load_sector(&context.client_dir, request)),
            Operation::SaveSector(request) => Completion::SectorSaved(save_sector(&context.client_dir, request)),
            Operation::BuildDrawBuffer(sectors) => {
                Completion::DrawBufferBuilt(DrawBuffer::build(sectors, context.renderer.as_ref()))
            }
        }
    }
}
