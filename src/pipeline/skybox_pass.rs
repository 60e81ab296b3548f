//! Skybox pass
//!
//! Procedural night sky drawn at the far plane behind the lit geometry. The
//! pass only depends on the camera rotation, so it never shows parallax.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::with_frame_bindings;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

pub const SKYBOX_SHADER: &str = r#"
struct SkyOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> SkyOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    let ndc = uv * 2.0 - 1.0;
    var out: SkyOutput;
    // Depth 1.0 so only pixels no geometry covered pass LessEqual
    out.position = vec4<f32>(ndc, 1.0, 1.0);
    out.ndc = ndc;
    return out;
}

fn star_hash(p: vec3<f32>) -> f32 {
    let q = fract(p * 0.3183099 + vec3<f32>(0.11, 0.17, 0.13));
    let r = q * 17.0;
    return fract(r.x * r.y * r.z * (r.x + r.y + r.z));
}

@fragment
fn fs_main(in: SkyOutput) -> @location(0) vec4<f32> {
    let far_point = frame.inv_sky_view_projection * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = normalize(far_point.xyz / far_point.w);

    let horizon = vec3<f32>(0.045, 0.06, 0.1);
    let zenith = vec3<f32>(0.004, 0.008, 0.025);
    var sky = mix(horizon, zenith, smoothstep(-0.05, 0.6, dir.y));

    let to_moon = -frame.light_direction.xyz;
    let moon_cos = max(dot(dir, to_moon), 0.0);
    let glow = pow(moon_cos, 48.0) * 0.25 + pow(moon_cos, 512.0) * 0.6;
    let disc = smoothstep(0.9994, 0.9997, moon_cos) * 2.5;
    sky += frame.light_color.rgb * (glow + disc);

    let cell = floor(dir * 320.0);
    let twinkle = 0.75 + 0.25 * sin(frame.time.y * 3.0 + star_hash(cell + 7.0) * 40.0);
    let star = step(0.9975, star_hash(cell)) * smoothstep(0.0, 0.25, dir.y) * twinkle;
    sky += vec3<f32>(star * 0.9);

    return vec4<f32>(sky, 1.0);
}
"#;

/// Night sky over the cleared background of the scene colour target
pub struct SkyboxPass {
    scene_color: ResourceId,
    scene_depth: ResourceId,
    pipeline: Option<RenderPipelineHandle>,
}

impl SkyboxPass {
    pub fn new(scene_color: ResourceId, scene_depth: ResourceId) -> Self {
        Self {
            scene_color,
            scene_depth,
            pipeline: None,
        }
    }
}

impl RenderPass for SkyboxPass {
    fn name(&self) -> &str {
        "Skybox Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.scene_depth, ResourceUsage::DepthStencilRead);
        ctx.write(self.scene_color, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let shader = with_frame_bindings(SKYBOX_SHADER);
        let pipeline = ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Skybox Pipeline".into()),
            vertex_shader: shader.clone(),
            fragment_shader: Some(shader),
            vertex_layouts: vec![],
            bind_group_layouts: vec![ctx.shared.frame_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
            }),
            color_targets: vec![ColorTargetState {
                format: TextureFormat::Rgba16Float,
            }],
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let Some(pipeline) = self.pipeline else {
            return;
        };
        let (Some(color), Some(depth)) = (
            ctx.get_texture(self.scene_color),
            ctx.get_texture(self.scene_depth),
        ) else {
            return;
        };

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Skybox Pass".into()),
            color_attachments: vec![ColorAttachment::load(color)],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth,
                depth_load_op: LoadOp::Load,
                depth_clear_value: 1.0,
            }),
        });

        ctx.backend
            .set_viewport(0.0, 0.0, ctx.width as f32, ctx.height as f32, 0.0, 1.0);
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, ctx.shared.frame_bind_group);
        ctx.backend.draw(0..3, 0..1);

        ctx.backend.end_render_pass();
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(pipeline) = self.pipeline.take() {
            backend.destroy_render_pipeline(pipeline);
        }
    }
}
