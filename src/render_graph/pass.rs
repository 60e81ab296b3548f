//! Render pass definitions for the render graph

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::resource::*;
use crate::state::ShadowMode;
use crate::timing::FrameTiming;
use std::collections::{HashMap, HashSet};

/// Unique identifier for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassId(pub(crate) u32);

/// Context for declaring which resources a pass touches
pub struct PassSetupContext<'a> {
    pub(crate) inputs: &'a mut Vec<ResourceAccess>,
    pub(crate) outputs: &'a mut Vec<ResourceAccess>,
}

impl<'a> PassSetupContext<'a> {
    /// Declare that this pass reads from a resource
    pub fn read(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.inputs.push(ResourceAccess {
            resource,
            usage,
            optional: false,
        });
    }

    /// Declare a read that is allowed to find nothing written this frame
    pub fn read_optional(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.inputs.push(ResourceAccess {
            resource,
            usage,
            optional: true,
        });
    }

    /// Declare that this pass writes to a resource
    pub fn write(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.outputs.push(ResourceAccess {
            resource,
            usage,
            optional: false,
        });
    }
}

/// Per-frame values every pass may consult
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    pub shadow_mode: ShadowMode,
    pub ssr_active: bool,
    pub scatter_enabled: bool,
    pub timing: FrameTiming,
}

/// One mesh draw prepared by the renderer for scene passes
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub object_bind_group: BindGroupHandle,
}

/// Bindings owned by the renderer and shared by every pass
#[derive(Debug, Clone, Copy)]
pub struct SharedBindings {
    /// Layout of group 0: the frame uniform
    pub frame_layout: BindGroupLayoutHandle,
    pub frame_bind_group: BindGroupHandle,
    /// Layout of the per-object uniform used by scene passes
    pub object_layout: BindGroupLayoutHandle,
}

/// Context for creating pipelines and bind groups once the graph's textures exist
pub struct PassPrepareContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub shared: &'a SharedBindings,
    pub surface_format: TextureFormat,
    pub(crate) resource_textures: &'a HashMap<ResourceId, TextureViewHandle>,
    pub(crate) resource_names: &'a HashMap<ResourceId, String>,
}

impl<'a> PassPrepareContext<'a> {
    /// Get a texture view handle for a resource
    pub fn get_texture(&self, resource: ResourceId) -> Option<TextureViewHandle> {
        self.resource_textures.get(&resource).copied()
    }

    /// Like [`get_texture`](Self::get_texture) but missing views are an error
    pub fn texture(&self, resource: ResourceId) -> BackendResult<TextureViewHandle> {
        self.get_texture(resource).ok_or_else(|| {
            let name = self
                .resource_names
                .get(&resource)
                .cloned()
                .unwrap_or_else(|| format!("{:?}", resource));
            BackendError::MissingResource(name)
        })
    }
}

/// Context for executing a render pass
pub struct PassExecuteContext<'a> {
    pub backend: &'a mut dyn GraphicsBackend,
    pub frame: &'a FrameParams,
    pub draws: &'a [DrawItem],
    pub shared: &'a SharedBindings,
    pub width: u32,
    pub height: u32,
    pub(crate) resource_textures: &'a HashMap<ResourceId, TextureViewHandle>,
    pub(crate) produced: &'a HashSet<ResourceId>,
}

impl<'a> PassExecuteContext<'a> {
    /// Get a texture view handle for a resource
    pub fn get_texture(&self, resource: ResourceId) -> Option<TextureViewHandle> {
        self.resource_textures.get(&resource).copied()
    }

    /// Whether an earlier pass wrote `resource` during this frame
    pub fn was_produced(&self, resource: ResourceId) -> bool {
        self.produced.contains(&resource)
    }
}

/// Trait for render passes
pub trait RenderPass {
    /// Get the pass name for debugging
    fn name(&self) -> &str;

    /// Setup phase - declare resources and dependencies
    fn setup(&mut self, ctx: &mut PassSetupContext);

    /// Create GPU objects once the graph's resources are allocated
    fn prepare(&mut self, _ctx: &mut PassPrepareContext) -> BackendResult<()> {
        Ok(())
    }

    /// Whether the pass runs this frame; disabled passes record nothing
    fn is_enabled(&self, _frame: &FrameParams) -> bool {
        true
    }

    /// Execute phase - record commands
    fn execute(&self, ctx: &mut PassExecuteContext);

    /// Drop GPU objects created in `prepare`
    fn release(&mut self, _backend: &mut dyn GraphicsBackend) {}
}

/// Metadata about a pass in the graph
#[derive(Debug)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
}

impl PassNode {
    /// Reads that must have a writer earlier in the frame
    pub fn required_inputs(&self) -> impl Iterator<Item = &ResourceAccess> {
        self.inputs.iter().filter(|a| !a.optional)
    }
}
