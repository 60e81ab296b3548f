//! wgpu backend implementation
//!
//! Objects live in per-kind [`pool::Pool`]s keyed by handle id. Render pass
//! commands are recorded between `begin_render_pass` and `end_render_pass`
//! and replayed onto a real `wgpu::RenderPass` at the end, since the pass
//! borrows the encoder and every object it binds.

mod convert;
mod pool;

use std::ops::Range;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::traits::*;
use crate::backend::types::*;
use pool::Pool;

#[derive(Clone)]
enum PassCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup(u32, BindGroupHandle),
    SetVertexBuffer(u32, BufferHandle, u64),
    SetIndexBuffer(BufferHandle, u64, IndexFormat),
    SetViewport([f32; 6]),
    Draw(Range<u32>, Range<u32>),
    DrawIndexed(Range<u32>, i32, Range<u32>),
}

struct RecordingPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<PassCommand>,
}

/// Texture view plus the texture it was created from
struct OwnedView {
    view: wgpu::TextureView,
    texture: u64,
}

/// Scale a requested surface size down to the device limit, keeping the aspect ratio
fn clamp_surface_size(max_size: u32, width: u32, height: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width.max(1), height.max(1));
    }
    let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

/// Backends to try first; `WGPU_BACKEND` overrides, Windows prefers Vulkan
fn preferred_backends() -> wgpu::Backends {
    if std::env::var("WGPU_BACKEND").is_ok() {
        return wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all());
    }
    if cfg!(target_os = "windows") {
        wgpu::Backends::VULKAN
    } else {
        wgpu::Backends::all()
    }
}

async fn request_adapter(
    backends: wgpu::Backends,
    window: Arc<Window>,
) -> BackendResult<Option<(wgpu::Surface<'static>, wgpu::Adapter)>> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });
    let surface = instance
        .create_surface(window)
        .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await;
    Ok(adapter.map(|adapter| (surface, adapter)))
}

/// Presentable surface format, preferring sRGB encoding
fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Option<(wgpu::TextureFormat, TextureFormat)> {
    let supported = || {
        formats
            .iter()
            .filter_map(|&native| TextureFormat::try_from(native).ok().map(|ours| (native, ours)))
    };
    supported()
        .find(|(_, ours)| ours.is_srgb())
        .or_else(|| supported().next())
}

/// wgpu backend implementation
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    swapchain_format: TextureFormat,

    /// Acquired in `begin_frame`, presented in `end_frame`
    frame: Option<(wgpu::SurfaceTexture, TextureViewHandle)>,
    encoder: Option<wgpu::CommandEncoder>,
    recording: Option<RecordingPass>,

    buffers: Pool<wgpu::Buffer>,
    textures: Pool<wgpu::Texture>,
    views: Pool<OwnedView>,
    samplers: Pool<wgpu::Sampler>,
    layouts: Pool<wgpu::BindGroupLayout>,
    bind_groups: Pool<wgpu::BindGroup>,
    pipelines: Pool<wgpu::RenderPipeline>,
}

impl WgpuBackend {
    /// Create the backend for a window, blocking on adapter and device requests
    pub fn new(window: Arc<Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<Window>, vsync: bool) -> BackendResult<Self> {
        let backends = preferred_backends();
        let found = match request_adapter(backends, window.clone()).await? {
            Some(found) => Some(found),
            None if backends != wgpu::Backends::all() => {
                log::warn!("Preferred backend not available, falling back to all backends");
                request_adapter(wgpu::Backends::all(), window.clone()).await?
            }
            None => None,
        };
        let (surface, adapter) = found.ok_or_else(|| {
            BackendError::InitializationFailed("No suitable adapter found".into())
        })?;

        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?} backend)", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Midsummer Night Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let (native_format, swapchain_format) = pick_surface_format(&caps.formats).ok_or_else(|| {
            BackendError::SurfaceCreationFailed(format!(
                "None of the surface formats {:?} can be presented",
                caps.formats
            ))
        })?;
        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let size = window.inner_size();
        let (width, height) =
            clamp_surface_size(device.limits().max_texture_dimension_2d, size.width, size.height);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: native_format,
            width,
            height,
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        log::info!(
            "Surface configured: {}x{} {:?} ({:?})",
            width,
            height,
            native_format,
            present_mode
        );

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            swapchain_format,
            frame: None,
            encoder: None,
            recording: None,
            buffers: Pool::new(),
            textures: Pool::new(),
            views: Pool::new(),
            samplers: Pool::new(),
            layouts: Pool::new(),
            bind_groups: Pool::new(),
            pipelines: Pool::new(),
        })
    }

    fn record(&mut self, command: PassCommand) {
        match self.recording.as_mut() {
            Some(pass) => pass.commands.push(command),
            None => log::warn!("Render command issued outside a render pass"),
        }
    }

    /// Resolve a view handle; the current swapchain handle maps to `swapchain`
    fn view<'a>(
        &'a self,
        handle: TextureViewHandle,
        swapchain: Option<&'a wgpu::TextureView>,
    ) -> Option<&'a wgpu::TextureView> {
        match &self.frame {
            Some((_, current)) if *current == handle => swapchain,
            _ => self.views.get(handle.0).map(|owned| &owned.view),
        }
    }

    fn replay<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, commands: &[PassCommand]) {
        for command in commands {
            match command {
                PassCommand::SetPipeline(handle) => {
                    if let Some(pipeline) = self.pipelines.get(handle.0) {
                        pass.set_pipeline(pipeline);
                    }
                }
                PassCommand::SetBindGroup(index, handle) => {
                    if let Some(bind_group) = self.bind_groups.get(handle.0) {
                        pass.set_bind_group(*index, bind_group, &[]);
                    }
                }
                PassCommand::SetVertexBuffer(slot, handle, offset) => {
                    if let Some(buffer) = self.buffers.get(handle.0) {
                        pass.set_vertex_buffer(*slot, buffer.slice(*offset..));
                    }
                }
                PassCommand::SetIndexBuffer(handle, offset, format) => {
                    if let Some(buffer) = self.buffers.get(handle.0) {
                        pass.set_index_buffer(buffer.slice(*offset..), (*format).into());
                    }
                }
                PassCommand::SetViewport([x, y, w, h, min_depth, max_depth]) => {
                    pass.set_viewport(*x, *y, *w, *h, *min_depth, *max_depth);
                }
                PassCommand::Draw(vertices, instances) => {
                    pass.draw(vertices.clone(), instances.clone());
                }
                PassCommand::DrawIndexed(indices, base_vertex, instances) => {
                    pass.draw_indexed(indices.clone(), *base_vertex, instances.clone());
                }
            }
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (width, height) =
            clamp_surface_size(self.device.limits().max_texture_dimension_2d, width, height);
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let output = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
            wgpu::SurfaceError::Outdated => BackendError::SurfaceOutdated,
            wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
            wgpu::SurfaceError::Timeout => BackendError::SurfaceTimeout,
            #[allow(unreachable_patterns)]
            other => BackendError::AcquireImageFailed(other.to_string()),
        })?;

        // Shares the id space of texture views but is never stored in the pool
        let swapchain_view = TextureViewHandle(self.views.reserve());
        self.frame = Some((output, swapchain_view));
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                }),
        );

        Ok(FrameContext {
            swapchain_view,
            width: self.surface_config.width,
            height: self.surface_config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        if let Some((texture, _)) = self.frame.take() {
            texture.present();
        }
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.swapchain_format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: desc.usage.into(),
            mapped_at_creation: false,
        });
        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: data,
            usage: desc.usage.into(),
        });
        Ok(BufferHandle(self.buffers.insert(buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buffer) = self.buffers.get(buffer.0) {
            self.queue.write_buffer(buffer, offset, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let max_size = self.device.limits().max_texture_dimension_2d;
        let in_range = |side: u32| (1..=max_size).contains(&side);
        if !in_range(desc.width) || !in_range(desc.height) {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}x{} is outside the supported range 1..={}",
                desc.width, desc.height, max_size
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.into(),
            usage: desc.usage.into(),
            view_formats: &[],
        });
        Ok(TextureHandle(self.textures.insert(texture)))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        let view = self
            .textures
            .get(texture.0)
            .ok_or_else(|| BackendError::TextureCreationFailed("Texture not found".into()))?
            .create_view(&wgpu::TextureViewDescriptor::default());
        Ok(TextureViewHandle(self.views.insert(OwnedView {
            view,
            texture: texture.0,
        })))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        let Some(texture) = self.textures.get(texture.0) else {
            return;
        };
        let bytes_per_pixel = texture.format().block_copy_size(None).unwrap_or(4);
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        self.queue.write_texture(
            texture.as_image_copy(),
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_pixel),
                rows_per_image: Some(height),
            },
            extent,
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let address_mode = desc.address_mode.into();
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: desc.mag_filter.into(),
            min_filter: desc.min_filter.into(),
            compare: desc.compare.map(Into::into),
            ..Default::default()
        });
        Ok(SamplerHandle(self.samplers.insert(sampler)))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = entries.iter().map(Into::into).collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            });
        Ok(BindGroupLayoutHandle(self.layouts.insert(layout)))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout = self
            .layouts
            .get(layout.0)
            .ok_or_else(|| BackendError::BindGroupCreationFailed("Layout not found".into()))?;

        let entries = entries
            .iter()
            .map(|(binding, entry)| {
                let resource = match entry {
                    BindGroupEntry::Buffer(h) => {
                        self.buffers.get(h.0).map(|b| b.as_entire_binding())
                    }
                    BindGroupEntry::Texture(h) => self
                        .views
                        .get(h.0)
                        .map(|owned| wgpu::BindingResource::TextureView(&owned.view)),
                    BindGroupEntry::Sampler(h) => {
                        self.samplers.get(h.0).map(wgpu::BindingResource::Sampler)
                    }
                };
                resource
                    .map(|resource| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource,
                    })
                    .ok_or_else(|| {
                        BackendError::BindGroupCreationFailed(format!(
                            "Resource for binding {} not found",
                            binding
                        ))
                    })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &entries,
        });
        Ok(BindGroupHandle(self.bind_groups.insert(bind_group)))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.vertex_shader.as_str().into()),
            });

        let layouts = desc
            .bind_group_layouts
            .iter()
            .map(|handle| {
                self.layouts.get(handle.0).ok_or_else(|| {
                    BackendError::PipelineCreationFailed("Bind group layout not found".into())
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: a.format.into(),
                        offset: a.offset,
                        shader_location: a.location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_layouts
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| Some(wgpu::TextureFormat::from(target.format).into()))
            .collect();

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: desc.fragment_shader.as_ref().map(|_| wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: convert::primitive_state(desc.front_face, desc.cull_mode),
                depth_stencil: desc.depth_stencil.as_ref().map(|ds| wgpu::DepthStencilState {
                    format: ds.format.into(),
                    depth_write_enabled: ds.depth_write_enabled,
                    depth_compare: ds.depth_compare.into(),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
        Ok(RenderPipelineHandle(self.pipelines.insert(pipeline)))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.recording = Some(RecordingPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let (Some(recorded), Some(mut encoder)) = (self.recording.take(), self.encoder.take())
        else {
            return;
        };

        let swapchain = self
            .frame
            .as_ref()
            .map(|(texture, _)| texture.texture.create_view(&Default::default()));

        {
            let desc = &recorded.descriptor;
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = desc
                .color_attachments
                .iter()
                .filter_map(|attachment| {
                    let view = self.view(attachment.view, swapchain.as_ref())?;
                    Some(Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: convert::color_ops(&attachment.load_op),
                    }))
                })
                .collect();
            let depth_stencil_attachment =
                desc.depth_stencil_attachment.as_ref().and_then(|attachment| {
                    Some(wgpu::RenderPassDepthStencilAttachment {
                        view: self.view(attachment.view, swapchain.as_ref())?,
                        depth_ops: Some(convert::depth_ops(attachment)),
                        stencil_ops: None,
                    })
                });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: desc.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.replay(&mut pass, &recorded.commands);
        }

        self.encoder = Some(encoder);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(PassCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(PassCommand::SetBindGroup(index, bind_group));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        self.record(PassCommand::SetVertexBuffer(slot, buffer, offset));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        self.record(PassCommand::SetIndexBuffer(buffer, offset, format));
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        self.record(PassCommand::SetViewport([x, y, width, height, min_depth, max_depth]));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(PassCommand::Draw(vertices, instances));
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record(PassCommand::DrawIndexed(indices, base_vertex, instances));
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.views.retain(|owned| owned.texture != texture.0);
        if let Some(texture) = self.textures.remove(texture.0) {
            texture.destroy();
        }
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(bind_group.0);
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.pipelines.remove(pipeline.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.remove(sampler.0);
    }

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle) {
        self.layouts.remove(layout.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_surface_size_keeps_aspect() {
        assert_eq!(clamp_surface_size(8192, 1920, 1080), (1920, 1080));
        assert_eq!(clamp_surface_size(1000, 4000, 2000), (1000, 500));
        assert_eq!(clamp_surface_size(1000, 0, 0), (1, 1));
    }

    #[test]
    fn test_surface_format_prefers_srgb() {
        let formats = [
            wgpu::TextureFormat::Rgb10a2Unorm,
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ];
        assert_eq!(
            pick_surface_format(&formats),
            Some((wgpu::TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8UnormSrgb))
        );
        assert_eq!(
            pick_surface_format(&formats[..2]),
            Some((wgpu::TextureFormat::Bgra8Unorm, TextureFormat::Bgra8Unorm))
        );
        assert_eq!(pick_surface_format(&formats[..1]), None);
    }
}
