pub mod draw_buffer;
mod editing;
pub mod falloff;
pub mod loader;
pub mod manager;
mod queries;
pub mod saver;
pub mod sector;
pub mod tasks;
pub mod world;
