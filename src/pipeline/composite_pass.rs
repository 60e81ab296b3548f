//! Final composite
//!
//! Blends the optional reflection and scattering buffers over the scene
//! colour, tonemaps and writes the swapchain. A buffer is used only when its
//! producer ran this frame; presence is passed to the shader as flags.

use bytemuck::{Pod, Zeroable};
use glam::{UVec4, Vec4};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

pub const COMPOSITE_SHADER: &str = r#"
struct CompositeParams {
    flags: vec4<u32>,
    tone: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: CompositeParams;
@group(0) @binding(1) var scene_color: texture_2d<f32>;
@group(0) @binding(2) var reflection: texture_2d<f32>;
@group(0) @binding(3) var scatter: texture_2d<f32>;

struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(in.position.xy);
    var color = textureLoad(scene_color, texel, 0).rgb;

    if (params.flags.x != 0u) {
        let r = textureLoad(reflection, texel, 0);
        color = color * (1.0 - r.a) + r.rgb;
    }
    if (params.flags.y != 0u) {
        color += textureLoad(scatter, texel, 0).rgb;
    }

    let mapped = vec3<f32>(1.0) - exp(-color * params.tone.x);
    return vec4<f32>(pow(mapped, vec3<f32>(1.0 / params.tone.y)), 1.0);
}
"#;

/// Uniform block of the composite shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompositeParams {
    /// x = reflection present, y = scatter present
    pub flags: UVec4,
    /// x = exposure, y = gamma
    pub tone: Vec4,
}

impl CompositeParams {
    pub fn new(reflection: bool, scatter: bool, exposure: f32, gamma: f32) -> Self {
        Self {
            flags: UVec4::new(reflection as u32, scatter as u32, 0, 0),
            tone: Vec4::new(exposure, gamma, 0.0, 0.0),
        }
    }

    pub fn reflection_present(&self) -> bool {
        self.flags.x != 0
    }

    pub fn scatter_present(&self) -> bool {
        self.flags.y != 0
    }
}

/// Gamma to apply in the shader; sRGB targets encode on write
pub fn output_gamma(format: TextureFormat) -> f32 {
    if format.is_srgb() {
        1.0
    } else {
        2.2
    }
}

/// Writes the presented image
pub struct CompositePass {
    scene_color: ResourceId,
    reflection: Option<ResourceId>,
    scatter: Option<ResourceId>,
    output: ResourceId,
    exposure: f32,
    gamma: f32,
    pipeline: Option<RenderPipelineHandle>,
    bind_group: Option<BindGroupHandle>,
    layout: Option<BindGroupLayoutHandle>,
    params_buffer: Option<BufferHandle>,
    fallback: Option<TextureHandle>,
}

impl CompositePass {
    /// `reflection` and `scatter` are `None` when their passes are not in the graph
    pub fn new(
        scene_color: ResourceId,
        reflection: Option<ResourceId>,
        scatter: Option<ResourceId>,
        output: ResourceId,
        exposure: f32,
    ) -> Self {
        Self {
            scene_color,
            reflection,
            scatter,
            output,
            exposure,
            gamma: 2.2,
            pipeline: None,
            bind_group: None,
            layout: None,
            params_buffer: None,
            fallback: None,
        }
    }

    /// Parameters for a frame in which `produced` tells which buffers were written
    pub fn params(&self, produced: impl Fn(ResourceId) -> bool) -> CompositeParams {
        CompositeParams::new(
            self.reflection.is_some_and(&produced),
            self.scatter.is_some_and(&produced),
            self.exposure,
            self.gamma,
        )
    }

    /// 1x1 texture bound in place of buffers absent from the graph
    fn fallback_view(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<TextureViewHandle> {
        let texture = match self.fallback {
            Some(texture) => texture,
            None => {
                let texture = backend.create_texture(&TextureDescriptor {
                    label: Some("Composite Fallback".into()),
                    width: 1,
                    height: 1,
                    format: TextureFormat::Rgba16Float,
                    usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
                })?;
                // Absent inputs read as transparent black
                backend.write_texture(texture, &[0; 8], 1, 1);
                self.fallback = Some(texture);
                texture
            }
        };
        backend.create_texture_view(texture)
    }
}

impl RenderPass for CompositePass {
    fn name(&self) -> &str {
        "Composite Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.scene_color, ResourceUsage::TextureRead);
        if let Some(reflection) = self.reflection {
            ctx.read_optional(reflection, ResourceUsage::TextureRead);
        }
        if let Some(scatter) = self.scatter {
            ctx.read_optional(scatter, ResourceUsage::TextureRead);
        }
        ctx.write(self.output, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        self.gamma = output_gamma(ctx.surface_format);

        let color = ctx.texture(self.scene_color)?;
        let reflection = match self.reflection {
            Some(id) => ctx.texture(id)?,
            None => self.fallback_view(&mut *ctx.backend)?,
        };
        let scatter = match self.scatter {
            Some(id) => ctx.texture(id)?,
            None => self.fallback_view(&mut *ctx.backend)?,
        };

        let params_buffer = ctx
            .backend
            .create_buffer(&BufferDescriptor::uniform::<CompositeParams>("Composite Params"))?;

        let float = TextureSampleType::Float { filterable: false };
        let layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::uniform(0, ShaderStageFlags::FRAGMENT),
            BindGroupLayoutEntry::texture(1, float),
            BindGroupLayoutEntry::texture(2, float),
            BindGroupLayoutEntry::texture(3, float),
        ])?;
        let bind_group = ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Buffer(params_buffer)),
                (1, BindGroupEntry::Texture(color)),
                (2, BindGroupEntry::Texture(reflection)),
                (3, BindGroupEntry::Texture(scatter)),
            ],
        )?;

        let pipeline = ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Composite Pipeline".into()),
            vertex_shader: COMPOSITE_SHADER.into(),
            fragment_shader: Some(COMPOSITE_SHADER.into()),
            vertex_layouts: vec![],
            bind_group_layouts: vec![layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState {
                format: ctx.surface_format,
            }],
        })?;

        self.pipeline = Some(pipeline);
        self.bind_group = Some(bind_group);
        self.layout = Some(layout);
        self.params_buffer = Some(params_buffer);
        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(pipeline), Some(bind_group), Some(params_buffer)) =
            (self.pipeline, self.bind_group, self.params_buffer)
        else {
            return;
        };
        let Some(output) = ctx.get_texture(self.output) else {
            return;
        };

        let params = self.params(|id| ctx.was_produced(id));
        ctx.backend
            .write_buffer(params_buffer, 0, bytemuck::bytes_of(&params));

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Composite Pass".into()),
            color_attachments: vec![ColorAttachment::clear(output, [0.0, 0.0, 0.0, 1.0])],
            depth_stencil_attachment: None,
        });

        ctx.backend
            .set_viewport(0.0, 0.0, ctx.width as f32, ctx.height as f32, 0.0, 1.0);
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, bind_group);
        ctx.backend.draw(0..3, 0..1);

        ctx.backend.end_render_pass();
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(pipeline) = self.pipeline.take() {
            backend.destroy_render_pipeline(pipeline);
        }
        if let Some(bind_group) = self.bind_group.take() {
            backend.destroy_bind_group(bind_group);
        }
        if let Some(layout) = self.layout.take() {
            backend.destroy_bind_group_layout(layout);
        }
        if let Some(buffer) = self.params_buffer.take() {
            backend.destroy_buffer(buffer);
        }
        if let Some(texture) = self.fallback.take() {
            backend.destroy_texture(texture);
        }
    }
}
