//! Resource management
//!
//! Procedural meshes and Blinn-Phong materials.

mod material;
mod mesh;

pub use material::*;
pub use mesh::*;
