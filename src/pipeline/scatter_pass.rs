//! Volumetric light scattering
//!
//! Ray-marches from the camera to the visible surface and accumulates
//! in-scattered moonlight wherever the shadow map says the light reaches.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::fullscreen_shader;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Henyey-Greenstein asymmetry; positive favours forward scattering
pub const SCATTER_ANISOTROPY: f32 = 0.6;

pub const SCATTER_SHADER: &str = r#"
@group(1) @binding(0) var scene_depth: texture_depth_2d;
@group(1) @binding(1) var shadow_map: texture_depth_2d;
@group(1) @binding(2) var shadow_sampler: sampler_comparison;

const PI: f32 = 3.14159265;
const GOLDEN_RATIO: f32 = 1.61803399;
const MAX_DISTANCE: f32 = 40.0;
const DENSITY: f32 = 0.035;
const SHADOW_BIAS: f32 = 0.002;

fn world_position(uv: vec2<f32>, depth: f32) -> vec3<f32> {
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let view = frame.inv_projection * ndc;
    let world = frame.inv_view * vec4<f32>(view.xyz / view.w, 1.0);
    return world.xyz;
}

fn interleaved_gradient_noise(pixel: vec2<f32>) -> f32 {
    return fract(52.9829189 * fract(dot(pixel, vec2<f32>(0.06711056, 0.00583715))));
}

fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let g2 = g * g;
    return (1.0 - g2) / (4.0 * PI * pow(1.0 + g2 - 2.0 * g * cos_theta, 1.5));
}

// Points outside the light frustum receive no light
fn light_visibility(p: vec3<f32>) -> f32 {
    let coords = clip_to_uv_depth(frame.light_view_projection * vec4<f32>(p, 1.0));
    if (any(coords.xy < vec2<f32>(0.0)) || any(coords.xy > vec2<f32>(1.0)) || coords.z < 0.0 || coords.z > 1.0) {
        return 0.0;
    }
    return textureSampleCompareLevel(shadow_map, shadow_sampler, coords.xy, coords.z - SHADOW_BIAS);
}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(in.position.xy);
    let depth = textureLoad(scene_depth, texel, 0);
    let uv = (vec2<f32>(texel) + 0.5) / vec2<f32>(textureDimensions(scene_depth));

    let eye = frame.camera_position.xyz;
    let surface = world_position(uv, depth);
    let dir = normalize(surface - eye);
    var ray_length = min(distance(surface, eye), MAX_DISTANCE);
    if (depth >= 1.0) {
        ray_length = MAX_DISTANCE;
    }

    let steps = max(frame.settings.w, 1u);
    let step_len = ray_length / f32(steps);
    let jitter = fract(interleaved_gradient_noise(in.position.xy) + frame.time.y * GOLDEN_RATIO);
    let phase = henyey_greenstein(dot(dir, -frame.light_direction.xyz), G);

    var inscatter = 0.0;
    for (var i = 0u; i < steps; i++) {
        let p = eye + dir * ((f32(i) + jitter) * step_len);
        inscatter += light_visibility(p) * light_attenuation(distance(p, frame.light_position.xyz));
    }

    let radiance = frame.light_color.rgb * frame.light_color.w * phase * DENSITY * inscatter * step_len;
    return vec4<f32>(radiance, 1.0);
}
"#;

/// In-scattered radiance along each view ray
pub struct ScatterPass {
    scene_depth: ResourceId,
    shadow_map: ResourceId,
    scatter: ResourceId,
    pipeline: Option<RenderPipelineHandle>,
    bind_group: Option<BindGroupHandle>,
    layout: Option<BindGroupLayoutHandle>,
    sampler: Option<SamplerHandle>,
}

impl ScatterPass {
    pub fn new(scene_depth: ResourceId, shadow_map: ResourceId, scatter: ResourceId) -> Self {
        Self {
            scene_depth,
            shadow_map,
            scatter,
            pipeline: None,
            bind_group: None,
            layout: None,
            sampler: None,
        }
    }
}

impl RenderPass for ScatterPass {
    fn name(&self) -> &str {
        "Scatter Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.scene_depth, ResourceUsage::TextureRead);
        ctx.read(self.shadow_map, ResourceUsage::TextureRead);
        ctx.write(self.scatter, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let depth = ctx.texture(self.scene_depth)?;
        let shadow = ctx.texture(self.shadow_map)?;

        let layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Depth),
            BindGroupLayoutEntry::texture(1, TextureSampleType::Depth),
            BindGroupLayoutEntry::sampler(2, true),
        ])?;
        let sampler = ctx.backend.create_sampler(&SamplerDescriptor::comparison(
            "Scatter Shadow Sampler",
            CompareFunction::LessEqual,
        ))?;
        let bind_group = ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(depth)),
                (1, BindGroupEntry::Texture(shadow)),
                (2, BindGroupEntry::Sampler(sampler)),
            ],
        )?;

        let shader = fullscreen_shader(&format!(
            "const G: f32 = {:.3};\n{}",
            SCATTER_ANISOTROPY, SCATTER_SHADER
        ));
        let pipeline = ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Scatter Pipeline".into()),
            vertex_shader: shader.clone(),
            fragment_shader: Some(shader),
            vertex_layouts: vec![],
            bind_group_layouts: vec![ctx.shared.frame_layout, layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState {
                format: TextureFormat::Rgba16Float,
            }],
        })?;

        self.pipeline = Some(pipeline);
        self.bind_group = Some(bind_group);
        self.layout = Some(layout);
        self.sampler = Some(sampler);
        Ok(())
    }

    fn is_enabled(&self, frame: &FrameParams) -> bool {
        frame.scatter_enabled
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(pipeline), Some(bind_group)) = (self.pipeline, self.bind_group) else {
            return;
        };
        let Some(target) = ctx.get_texture(self.scatter) else {
            return;
        };

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Scatter Pass".into()),
            color_attachments: vec![ColorAttachment::clear(target, [0.0; 4])],
            depth_stencil_attachment: None,
        });

        ctx.backend
            .set_viewport(0.0, 0.0, ctx.width as f32, ctx.height as f32, 0.0, 1.0);
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, ctx.shared.frame_bind_group);
        ctx.backend.set_bind_group(1, bind_group);
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
        if let Some(sampler) = self.sampler.take() {
            backend.destroy_sampler(sampler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// CPU mirror of the shader's phase function
    fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
        let g2 = g * g;
        (1.0 - g2) / (4.0 * std::f32::consts::PI * (1.0 + g2 - 2.0 * g * cos_theta).powf(1.5))
    }

    #[test]
    fn test_phase_favours_looking_towards_the_light() {
        let towards = henyey_greenstein(1.0, SCATTER_ANISOTROPY);
        let sideways = henyey_greenstein(0.0, SCATTER_ANISOTROPY);
        let away = henyey_greenstein(-1.0, SCATTER_ANISOTROPY);
        assert!(towards > sideways && sideways > away);
    }

    #[test]
    fn test_isotropic_phase_is_constant() {
        let expected = 1.0 / (4.0 * std::f32::consts::PI);
        assert!((henyey_greenstein(0.3, 0.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_shader_declares_phase_and_noise() {
        assert!(SCATTER_SHADER.contains("fn henyey_greenstein"));
        assert!(SCATTER_SHADER.contains("fn interleaved_gradient_noise"));
    }
}
