//! Backend abstraction layer
//!
//! Passes record GPU work through the object-safe [`GraphicsBackend`] trait.
//! [`wgpu_backend::WgpuBackend`] drives the real window; [`dummy::DummyBackend`]
//! records commands for tests.

pub mod dummy;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;
