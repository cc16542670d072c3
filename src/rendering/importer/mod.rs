/// This module handles converting the types from archterrain-files into an intermediate representation,
/// that can be edited, merged into draw buffers and written back. The abstraction keeps the terrain
/// independent of both the chunk layout on disk and the render backend.
pub mod atomic_importer;
