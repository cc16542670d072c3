use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Error, anyhow, bail};
use log::trace;

use crate::rendering::common::types::MATERIAL_TEXTURE_SLOTS;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

pub type MaterialTextures = [Option<TextureHandle>; MATERIAL_TEXTURE_SLOTS];

/// The GPU capability the terrain draws with. Buffers are plain bytes, their layout is
/// [`crate::rendering::common::types::MeshVertex`] for vertices and `u32` for indices.
///
/// Implementations are shared with the worker threads that build draw buffers.
pub trait Renderer: Send + Sync {
    fn create_vertex_buffer(&self, data: &[u8]) -> Result<BufferHandle, Error>;
    fn create_index_buffer(&self, data: &[u8]) -> Result<BufferHandle, Error>;
    /// Overwrites `data.len()` bytes starting at the byte `offset`.
    fn update_vertex_buffer(&self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<(), Error>;
    fn destroy_buffer(&self, handle: BufferHandle);

    /// Reference counted, every successful acquire needs a matching release.
    fn acquire_texture(&self, name: &str) -> Option<TextureHandle>;
    fn release_texture(&self, handle: TextureHandle);

    fn bind_material(&self, textures: &MaterialTextures);
    fn draw_indexed(&self, vertex_buffer: BufferHandle, index_buffer: BufferHandle, first_index: u32, index_count: u32);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub first_index: u32,
    pub index_count: u32,
    pub textures: MaterialTextures,
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u32,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<String, (TextureHandle, u32)>,
    bound_material: MaterialTextures,
    draw_calls: Vec<DrawCall>,
    fail_allocations: bool,
}

/// A [`Renderer`] without a GPU: buffers live in memory and draw calls are recorded for inspection.
#[derive(Default)]
pub struct HeadlessRenderer {
    state: Mutex<HeadlessState>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut HeadlessState) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    fn create_buffer(&self, data: &[u8]) -> Result<BufferHandle, Error> {
        self.with_state(|state| {
            if state.fail_allocations {
                bail!("Out of device memory allocating {} bytes", data.len());
            }
            state.next_handle += 1;
            let handle = BufferHandle(state.next_handle);
            state.buffers.insert(handle, data.to_vec());
            Ok(handle)
        })
    }

    /// Makes every following buffer allocation fail.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.with_state(|state| state.fail_allocations = fail);
    }

    pub fn buffer_count(&self) -> usize {
        self.with_state(|state| state.buffers.len())
    }

    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<Vec<u8>> {
        self.with_state(|state| state.buffers.get(&handle).cloned())
    }

    pub fn live_texture_count(&self) -> usize {
        self.with_state(|state| state.textures.len())
    }

    /// Returns the draw calls recorded since the last call.
    pub fn take_draw_calls(&self) -> Vec<DrawCall> {
        self.with_state(|state| std::mem::take(&mut state.draw_calls))
    }
}

impl Renderer for HeadlessRenderer {
    fn create_vertex_buffer(&self, data: &[u8]) -> Result<BufferHandle, Error> {
        self.create_buffer(data)
    }

    fn create_index_buffer(&self, data: &[u8]) -> Result<BufferHandle, Error> {
        self.create_buffer(data)
    }

    fn update_vertex_buffer(&self, handle: BufferHandle, offset: usize, data: &[u8]) -> Result<(), Error> {
        self.with_state(|state| {
            let buffer = state
                .buffers
                .get_mut(&handle)
                .ok_or_else(|| anyhow!("Unknown buffer {:?}", handle))?;
            let target = buffer
                .get_mut(offset..offset + data.len())
                .ok_or_else(|| anyhow!("Update of {} bytes at {} overflows {:?}", data.len(), offset, handle))?;
            target.copy_from_slice(data);
            Ok(())
        })
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        self.with_state(|state| {
            if state.buffers.remove(&handle).is_none() {
                trace!("Destroying unknown buffer {:?}", handle);
            }
        });
    }

    fn acquire_texture(&self, name: &str) -> Option<TextureHandle> {
        if name.is_empty() {
            return None;
        }
        self.with_state(|state| {
            let key = name.to_ascii_lowercase();
            if let Some((handle, count)) = state.textures.get_mut(&key) {
                *count += 1;
                return Some(*handle);
            }
            state.next_handle += 1;
            let handle = TextureHandle(state.next_handle);
            state.textures.insert(key, (handle, 1));
            Some(handle)
        })
    }

    fn release_texture(&self, handle: TextureHandle) {
        self.with_state(|state| {
            state.textures.retain(|_, (texture, count)| {
                if *texture == handle {
                    *count -= 1;
                }
                *count > 0
            });
        });
    }

    fn bind_material(&self, textures: &MaterialTextures) {
        self.with_state(|state| state.bound_material = *textures);
    }

    fn draw_indexed(&self, vertex_buffer: BufferHandle, index_buffer: BufferHandle, first_index: u32, index_count: u32) {
        self.with_state(|state| {
            let textures = state.bound_material;
            state.draw_calls.push(DrawCall {
                vertex_buffer,
                index_buffer,
                first_index,
                index_count,
                textures,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn textures_are_reference_counted() {
        let renderer = HeadlessRenderer::new();
        let a = renderer.acquire_texture("Grass01");
        let b = renderer.acquire_texture("grass01");
        assert_eq!(a, b);
        assert_eq!(renderer.acquire_texture(""), None);

        renderer.release_texture(a.unwrap());
        assert_eq!(renderer.live_texture_count(), 1);
        renderer.release_texture(b.unwrap());
        assert_eq!(renderer.live_texture_count(), 0);
    }

    #[test]
    pub fn buffer_updates_are_bounds_checked() -> Result<(), anyhow::Error> {
        let renderer = HeadlessRenderer::new();
        let handle = renderer.create_vertex_buffer(&[0u8; 8])?;
        renderer.update_vertex_buffer(handle, 4, &[1, 2, 3, 4])?;
        assert_eq!(renderer.buffer_contents(handle), Some(vec![0, 0, 0, 0, 1, 2, 3, 4]));
        assert!(renderer.update_vertex_buffer(handle, 6, &[1, 2, 3]).is_err());

        renderer.destroy_buffer(handle);
        assert_eq!(renderer.buffer_count(), 0);
        Ok(())
    }

    #[test]
    pub fn failing_allocations() {
        let renderer = HeadlessRenderer::new();
        renderer.set_fail_allocations(true);
        assert!(renderer.create_index_buffer(&[0u8; 4]).is_err());
        renderer.set_fail_allocations(false);
        assert!(renderer.create_index_buffer(&[0u8; 4]).is_ok());
    }
}
