//! Screen-space reflections
//!
//! Marches the view-space reflection ray against the scene depth buffer. Runs
//! only while SSR is effectively active. A miss writes zero weight.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::fullscreen_shader;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

pub const SSR_SHADER: &str = r#"
@group(1) @binding(0) var scene_color: texture_2d<f32>;
@group(1) @binding(1) var scene_normal: texture_2d<f32>;
@group(1) @binding(2) var scene_depth: texture_depth_2d;

const MAX_DISTANCE: f32 = 12.0;
const THICKNESS: f32 = 0.15;
const REFINE_STEPS: i32 = 6;
const EDGE_FADE: f32 = 0.1;

fn depth_size() -> vec2<f32> {
    return vec2<f32>(textureDimensions(scene_depth));
}

fn to_texel(uv: vec2<f32>) -> vec2<i32> {
    let size = vec2<i32>(textureDimensions(scene_depth));
    return clamp(vec2<i32>(uv * vec2<f32>(size)), vec2<i32>(0), size - vec2<i32>(1));
}

fn view_position(uv: vec2<f32>, depth: f32) -> vec3<f32> {
    let ndc = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let view = frame.inv_projection * ndc;
    return view.xyz / view.w;
}

// View-space depth of the scene surface under a screen position
fn scene_view_z(uv: vec2<f32>) -> f32 {
    let depth = textureLoad(scene_depth, to_texel(uv), 0);
    return view_position(uv, depth).z;
}

fn project(view_pos: vec3<f32>) -> vec3<f32> {
    return clip_to_uv_depth(frame.projection * vec4<f32>(view_pos, 1.0));
}

fn on_screen(uv: vec2<f32>) -> bool {
    return all(uv >= vec2<f32>(0.0)) && all(uv <= vec2<f32>(1.0));
}

@fragment
fn fs_main(in: FullscreenOutput) -> @location(0) vec4<f32> {
    let texel = vec2<i32>(in.position.xy);
    let normal_sample = textureLoad(scene_normal, texel, 0);
    let reflectivity = normal_sample.w;
    let depth = textureLoad(scene_depth, texel, 0);
    if (reflectivity <= 0.0 || depth >= 1.0) {
        return vec4<f32>(0.0);
    }

    let uv = (vec2<f32>(texel) + 0.5) / depth_size();
    let origin = view_position(uv, depth);
    let n = normalize(normal_sample.xyz);
    let ray = normalize(reflect(normalize(origin), n));

    let steps = max(frame.settings.z, 1u);
    let step_len = MAX_DISTANCE / f32(steps);
    var previous = 0.0;
    var t = step_len;
    var hit = false;
    for (var i = 0u; i < steps; i++) {
        let p = origin + ray * t;
        let screen = project(p);
        if (!on_screen(screen.xy) || p.z > -0.1) {
            break;
        }
        let behind = scene_view_z(screen.xy) - p.z;
        if (behind > 0.0 && behind < THICKNESS) {
            // Binary search between the last miss and the first hit
            var lo = previous;
            var hi = t;
            for (var j = 0; j < REFINE_STEPS; j++) {
                let mid = (lo + hi) * 0.5;
                let pm = origin + ray * mid;
                if (scene_view_z(project(pm).xy) - pm.z > 0.0) {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            t = hi;
            hit = true;
            break;
        }
        previous = t;
        t += step_len;
    }

    if (!hit) {
        return vec4<f32>(0.0);
    }

    let hit_uv = project(origin + ray * t).xy;
    let edge = min(min(hit_uv.x, 1.0 - hit_uv.x), min(hit_uv.y, 1.0 - hit_uv.y));
    let edge_fade = clamp(edge / EDGE_FADE, 0.0, 1.0);
    let distance_fade = 1.0 - clamp(t / MAX_DISTANCE, 0.0, 1.0);
    let weight = reflectivity * edge_fade * distance_fade;
    let color = textureLoad(scene_color, to_texel(hit_uv), 0).rgb;
    return vec4<f32>(color * weight, weight);
}
"#;

/// Reflection colour and weight from the geometry buffers
pub struct SsrPass {
    scene_color: ResourceId,
    scene_normal: ResourceId,
    scene_depth: ResourceId,
    reflection: ResourceId,
    pipeline: Option<RenderPipelineHandle>,
    bind_group: Option<BindGroupHandle>,
    layout: Option<BindGroupLayoutHandle>,
}

impl SsrPass {
    pub fn new(
        scene_color: ResourceId,
        scene_normal: ResourceId,
        scene_depth: ResourceId,
        reflection: ResourceId,
    ) -> Self {
        Self {
            scene_color,
            scene_normal,
            scene_depth,
            reflection,
            pipeline: None,
            bind_group: None,
            layout: None,
        }
    }
}

impl RenderPass for SsrPass {
    fn name(&self) -> &str {
        "SSR Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.scene_color, ResourceUsage::TextureRead);
        ctx.read(self.scene_normal, ResourceUsage::TextureRead);
        ctx.read(self.scene_depth, ResourceUsage::TextureRead);
        ctx.write(self.reflection, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let color = ctx.texture(self.scene_color)?;
        let normal = ctx.texture(self.scene_normal)?;
        let depth = ctx.texture(self.scene_depth)?;

        let layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Float { filterable: false }),
            BindGroupLayoutEntry::texture(1, TextureSampleType::Float { filterable: false }),
            BindGroupLayoutEntry::texture(2, TextureSampleType::Depth),
        ])?;
        let bind_group = ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(color)),
                (1, BindGroupEntry::Texture(normal)),
                (2, BindGroupEntry::Texture(depth)),
            ],
        )?;

        let shader = fullscreen_shader(SSR_SHADER);
        let pipeline = ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("SSR Pipeline".into()),
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
        Ok(())
    }

    fn is_enabled(&self, frame: &FrameParams) -> bool {
        frame.ssr_active
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(pipeline), Some(bind_group)) = (self.pipeline, self.bind_group) else {
            return;
        };
        let Some(target) = ctx.get_texture(self.reflection) else {
            return;
        };

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("SSR Pass".into()),
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
    }
}
