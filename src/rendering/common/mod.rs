/// Mesh operations on the intermediate representation: normals, bounding spheres, material splits.
pub mod geometry;
pub mod mesh_merger;
/// basic types (e.g. mesh) to abstract away from both the asset format and the render backend.
pub mod types;
