//! Recording backend for tests and headless runs.
//!
//! This backend doesn't perform any GPU work. It hands out handles, keeps
//! track of live resources and records every command it receives so tests
//! can assert on what a frame actually submitted.

use std::collections::{HashMap, HashSet};

use crate::backend::traits::*;
use crate::backend::types::*;

/// A command observed by the [`DummyBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginFrame,
    EndFrame,
    WriteBuffer { buffer: BufferHandle, data: Vec<u8> },
    WriteTexture { texture: TextureHandle, data: Vec<u8> },
    BeginRenderPass { label: Option<String>, color_attachments: Vec<LoadOp>, has_depth: bool },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    SetVertexBuffer { slot: u32, buffer: BufferHandle },
    SetIndexBuffer { buffer: BufferHandle },
    SetViewport { width: f32, height: f32 },
    Draw { vertices: std::ops::Range<u32>, instances: std::ops::Range<u32> },
    DrawIndexed { indices: std::ops::Range<u32>, base_vertex: i32 },
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    width: u32,
    height: u32,
    format: TextureFormat,
    next_id: u64,
    swapchain_view: Option<TextureViewHandle>,
    buffer_labels: HashMap<BufferHandle, Option<String>>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    views: HashMap<TextureViewHandle, TextureHandle>,
    pipeline_labels: HashMap<RenderPipelineHandle, Option<String>>,
    bind_groups: HashSet<BindGroupHandle>,
    commands: Vec<RecordedCommand>,
    lost_frames: u32,
    timed_out_frames: u32,
    surface_configurations: u32,
}

impl DummyBackend {
    /// Create a new dummy backend with a surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format: TextureFormat::Bgra8UnormSrgb,
            next_id: 1,
            swapchain_view: None,
            buffer_labels: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            pipeline_labels: HashMap::new(),
            bind_groups: HashSet::new(),
            commands: Vec::new(),
            lost_frames: 0,
            timed_out_frames: 0,
            surface_configurations: 0,
        }
    }

    /// Make the next `count` calls to `begin_frame` report a lost surface.
    pub fn lose_surface(&mut self, count: u32) {
        self.lost_frames = count;
    }

    /// Make the next `count` calls to `begin_frame` time out.
    pub fn time_out_surface(&mut self, count: u32) {
        self.timed_out_frames = count;
    }

    /// Number of times the surface was reconfigured through `resize`.
    pub fn surface_configurations(&self) -> u32 {
        self.surface_configurations
    }

    /// Every command recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Label given to a buffer at creation.
    pub fn buffer_label(&self, buffer: BufferHandle) -> Option<&str> {
        self.buffer_labels.get(&buffer).and_then(|l| l.as_deref())
    }

    /// Label given to a render pipeline at creation.
    pub fn pipeline_label(&self, pipeline: RenderPipelineHandle) -> Option<&str> {
        self.pipeline_labels.get(&pipeline).and_then(|l| l.as_deref())
    }

    /// Payloads written to every texture created with `label`, in submission order.
    pub fn texture_writes(&self, label: &str) -> Vec<&[u8]> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::WriteTexture { texture, data }
                    if self.textures.get(texture).and_then(|d| d.label.as_deref()) == Some(label) =>
                {
                    Some(data.as_slice())
                }
                _ => None,
            })
            .collect()
    }

    /// Payloads written to every buffer created with `label`, in submission order.
    pub fn buffer_writes(&self, label: &str) -> Vec<&[u8]> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::WriteBuffer { buffer, data }
                    if self.buffer_label(*buffer) == Some(label) =>
                {
                    Some(data.as_slice())
                }
                _ => None,
            })
            .collect()
    }

    /// Labels of the render passes recorded so far, in order.
    pub fn render_pass_labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::BeginRenderPass { label, .. } => label.as_deref(),
                _ => None,
            })
            .collect()
    }

    /// Commands recorded between the begin and end of the pass labelled `label`.
    pub fn pass_commands(&self, label: &str) -> Vec<&RecordedCommand> {
        let mut inside = false;
        let mut result = Vec::new();
        for cmd in &self.commands {
            match cmd {
                RecordedCommand::BeginRenderPass { label: Some(l), .. } if l == label => {
                    inside = true;
                }
                RecordedCommand::EndRenderPass if inside => inside = false,
                _ if inside => result.push(cmd),
                _ => {}
            }
        }
        result
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_bind_group_count(&self) -> usize {
        self.bind_groups.len()
    }

    /// Descriptor of a live texture.
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture)
    }

    /// Descriptor of the texture a live view was created from.
    pub fn view_descriptor(&self, view: TextureViewHandle) -> Option<&TextureDescriptor> {
        self.views.get(&view).and_then(|t| self.textures.get(t))
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GraphicsBackend for DummyBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            log::trace!("DummyBackend: resizing surface to {}x{}", width, height);
            self.surface_configurations += 1;
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if self.lost_frames > 0 {
            self.lost_frames -= 1;
            return Err(BackendError::SurfaceLost);
        }
        if self.timed_out_frames > 0 {
            self.timed_out_frames -= 1;
            return Err(BackendError::SurfaceTimeout);
        }
        let view = TextureViewHandle(self.next_handle());
        self.swapchain_view = Some(view);
        self.commands.push(RecordedCommand::BeginFrame);
        Ok(FrameContext {
            swapchain_view: view,
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.swapchain_view = None;
        self.commands.push(RecordedCommand::EndFrame);
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let handle = BufferHandle(self.next_handle());
        self.buffer_labels.insert(handle, desc.label.clone());
        Ok(handle)
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        _data: &[u8],
    ) -> BackendResult<BufferHandle> {
        self.create_buffer(desc)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, _offset: u64, data: &[u8]) {
        self.commands.push(RecordedCommand::WriteBuffer {
            buffer,
            data: data.to_vec(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{} {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has an empty extent",
                desc.label
            )));
        }
        let handle = TextureHandle(self.next_handle());
        self.textures.insert(handle, desc.clone());
        Ok(handle)
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let handle = TextureViewHandle(self.next_handle());
        self.views.insert(handle, texture);
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        log::trace!(
            "DummyBackend: writing {} bytes to texture {:?} ({}x{})",
            data.len(),
            texture,
            width,
            height
        );
        self.commands.push(RecordedCommand::WriteTexture {
            texture,
            data: data.to_vec(),
        });
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        Ok(SamplerHandle(self.next_handle()))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.next_handle()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        for (binding, entry) in entries {
            if let BindGroupEntry::Texture(view) = entry {
                if !self.views.contains_key(view) {
                    return Err(BackendError::BindGroupCreationFailed(format!(
                        "Texture view for binding {} not found",
                        binding
                    )));
                }
            }
        }
        let handle = BindGroupHandle(self.next_handle());
        self.bind_groups.insert(handle);
        Ok(handle)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        log::trace!("DummyBackend: creating render pipeline {:?}", desc.label);
        let handle = RenderPipelineHandle(self.next_handle());
        self.pipeline_labels.insert(handle, desc.label.clone());
        Ok(handle)
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: desc.label.clone(),
            color_attachments: desc
                .color_attachments
                .iter()
                .map(|a| a.load_op.clone())
                .collect(),
            has_depth: desc.depth_stencil_attachment.is_some(),
        });
    }

    fn end_render_pass(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, _format: IndexFormat) {
        self.commands.push(RecordedCommand::SetIndexBuffer { buffer });
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.commands
            .push(RecordedCommand::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        _instances: std::ops::Range<u32>,
    ) {
        self.commands
            .push(RecordedCommand::DrawIndexed { indices, base_vertex });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffer_labels.remove(&buffer);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.views.retain(|_, owner| *owner != texture);
        self.textures.remove(&texture);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group);
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.pipeline_labels.remove(&pipeline);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        log::trace!("DummyBackend: destroying sampler {:?}", sampler);
    }

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle) {
        log::trace!("DummyBackend: destroying bind group layout {:?}", layout);
    }
}
