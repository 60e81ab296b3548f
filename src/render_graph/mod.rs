//! Render Graph System
//!
//! Passes declare the textures they read and write; the graph validates those
//! declarations, orders the passes and the executor runs them every frame,
//! skipping passes that are disabled for the current state.

pub mod executor;
pub mod graph;
pub mod pass;
pub mod resource;

pub use executor::*;
pub use graph::*;
pub use pass::*;
pub use resource::*;
