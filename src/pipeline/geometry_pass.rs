//! Scene geometry pass
//!
//! Shades every drawable with Blinn-Phong lighting from the scene light and
//! writes three targets:
//! - HDR colour
//! - view-space normal with reflectivity in alpha
//! - depth
//!
//! The shadow factor is computed with the technique selected in the frame
//! uniform (hard, PCF or PCSS).

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::with_frame_bindings;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Background colour written where no geometry lands
pub const CLEAR_COLOR: [f32; 4] = [0.05, 0.05, 0.05, 1.0];

pub const GEOMETRY_SHADER: &str = r#"
@group(1) @binding(0) var<uniform> object: ObjectUniform;
@group(2) @binding(0) var shadow_map: texture_depth_2d;
@group(2) @binding(1) var shadow_sampler: sampler_comparison;

const SHADOW_HARD: u32 = 0u;
const SHADOW_PCF: u32 = 1u;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) light_clip: vec4<f32>,
}

struct GeometryOutput {
    @location(0) color: vec4<f32>,
    @location(1) normal: vec4<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = object.model * vec4<f32>(in.position, 1.0);
    out.world_position = world.xyz;
    out.world_normal = normalize((object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz);
    out.clip_position = frame.view_projection * world;
    out.light_clip = frame.light_view_projection * world;
    return out;
}

fn half_kernel() -> i32 {
    return i32(max(frame.settings.y, 1u) / 2u);
}

fn shadow_hard(coords: vec3<f32>, bias: f32) -> f32 {
    return textureSampleCompareLevel(shadow_map, shadow_sampler, coords.xy, coords.z - bias);
}

// Average of an N x N grid of comparisons spaced `spread` texels apart
fn shadow_pcf(coords: vec3<f32>, bias: f32, spread: f32) -> f32 {
    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    let h = half_kernel();
    var lit = 0.0;
    var taps = 0.0;
    for (var y = -h; y <= h; y++) {
        for (var x = -h; x <= h; x++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel * spread;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, coords.xy + offset, coords.z - bias);
            taps += 1.0;
        }
    }
    return lit / taps;
}

// Map depth in [0, 1] back to distance from the light
fn light_distance(depth: f32) -> f32 {
    return frame.light_params.x + depth * (frame.light_params.y - frame.light_params.x);
}

fn shadow_pcss(coords: vec3<f32>, bias: f32) -> f32 {
    let dims = vec2<i32>(textureDimensions(shadow_map));
    let texels_per_unit = f32(dims.x) / (2.0 * frame.light_params.z);
    let light_size = frame.light_position.w * texels_per_unit;
    let h = half_kernel();

    // Blocker search over a region sized by the emitter
    let center = coords.xy * vec2<f32>(dims);
    let search_step = max(light_size * 0.5, 1.0) / f32(max(h, 1));
    var blocker_sum = 0.0;
    var blockers = 0.0;
    for (var y = -h; y <= h; y++) {
        for (var x = -h; x <= h; x++) {
            let offset = vec2<f32>(f32(x), f32(y)) * search_step;
            let texel = clamp(vec2<i32>(center + offset), vec2<i32>(0), dims - vec2<i32>(1));
            let depth = textureLoad(shadow_map, texel, 0);
            if (depth < coords.z - bias) {
                blocker_sum += depth;
                blockers += 1.0;
            }
        }
    }
    if (blockers < 1.0) {
        return 1.0;
    }

    let receiver = light_distance(coords.z);
    let blocker = max(light_distance(blocker_sum / blockers), 1e-3);
    let penumbra = (receiver - blocker) / blocker * light_size;
    let spread = clamp(penumbra / f32(max(h, 1)), 1.0, 16.0);
    return shadow_pcf(coords, bias, spread);
}

fn shadow_factor(light_clip: vec4<f32>, n_dot_l: f32) -> f32 {
    let coords = clip_to_uv_depth(light_clip);
    if (any(coords.xy < vec2<f32>(0.0)) || any(coords.xy > vec2<f32>(1.0)) || coords.z > 1.0) {
        return 1.0;
    }
    let bias = max(0.0025 * (1.0 - n_dot_l), 0.0005);
    let mode = frame.settings.x;
    if (mode == SHADOW_HARD) {
        return shadow_hard(coords, bias);
    } else if (mode == SHADOW_PCF) {
        return shadow_pcf(coords, bias, 1.0);
    }
    return shadow_pcss(coords, bias);
}

@fragment
fn fs_main(in: VertexOutput) -> GeometryOutput {
    let n = normalize(in.world_normal);
    let to_light = frame.light_position.xyz - in.world_position;
    let light_dist = length(to_light);
    let l = to_light / light_dist;
    let v = normalize(frame.camera_position.xyz - in.world_position);
    let h = normalize(l + v);

    let base = object.base_color.rgb;
    let n_dot_l = max(dot(n, l), 0.0);
    let diffuse = n_dot_l * base;
    let specular = select(0.0, pow(max(dot(n, h), 0.0), object.material.y) * object.material.x, n_dot_l > 0.0);

    let radiance = frame.light_color.rgb * frame.light_color.w * light_attenuation(light_dist);
    let shadow = shadow_factor(in.light_clip, n_dot_l);
    let color = frame.ambient.rgb * base + shadow * radiance * (diffuse + vec3<f32>(specular));

    var out: GeometryOutput;
    out.color = vec4<f32>(color, 1.0);
    out.normal = vec4<f32>(normalize((frame.view * vec4<f32>(n, 0.0)).xyz), object.material.z);
    return out;
}
"#;

/// Lit scene geometry into the G-buffer targets
pub struct GeometryPass {
    shadow_map: ResourceId,
    scene_color: ResourceId,
    scene_normal: ResourceId,
    scene_depth: ResourceId,
    pipeline: Option<RenderPipelineHandle>,
    shadow_bind_group: Option<BindGroupHandle>,
    shadow_layout: Option<BindGroupLayoutHandle>,
    shadow_sampler: Option<SamplerHandle>,
}

impl GeometryPass {
    pub fn new(
        shadow_map: ResourceId,
        scene_color: ResourceId,
        scene_normal: ResourceId,
        scene_depth: ResourceId,
    ) -> Self {
        Self {
            shadow_map,
            scene_color,
            scene_normal,
            scene_depth,
            pipeline: None,
            shadow_bind_group: None,
            shadow_layout: None,
            shadow_sampler: None,
        }
    }
}

impl RenderPass for GeometryPass {
    fn name(&self) -> &str {
        "Geometry Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.shadow_map, ResourceUsage::TextureRead);
        ctx.write(self.scene_color, ResourceUsage::RenderTarget);
        ctx.write(self.scene_normal, ResourceUsage::RenderTarget);
        ctx.write(self.scene_depth, ResourceUsage::DepthStencilWrite);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let shadow_view = ctx.texture(self.shadow_map)?;

        let shadow_layout = ctx.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry::texture(0, TextureSampleType::Depth),
            BindGroupLayoutEntry::sampler(1, true),
        ])?;
        let sampler = ctx.backend.create_sampler(&SamplerDescriptor::comparison(
            "Shadow Sampler",
            CompareFunction::LessEqual,
        ))?;
        let shadow_bind_group = ctx.backend.create_bind_group(
            shadow_layout,
            &[
                (0, BindGroupEntry::Texture(shadow_view)),
                (1, BindGroupEntry::Sampler(sampler)),
            ],
        )?;

        let shader = with_frame_bindings(GEOMETRY_SHADER);
        let pipeline = ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Geometry Pipeline".into()),
            vertex_shader: shader.clone(),
            fragment_shader: Some(shader),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![ctx.shared.frame_layout, ctx.shared.object_layout, shadow_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: vec![
                ColorTargetState {
                    format: TextureFormat::Rgba16Float,
                },
                ColorTargetState {
                    format: TextureFormat::Rgba16Float,
                },
            ],
        })?;

        self.pipeline = Some(pipeline);
        self.shadow_bind_group = Some(shadow_bind_group);
        self.shadow_layout = Some(shadow_layout);
        self.shadow_sampler = Some(sampler);
        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(pipeline), Some(shadow_bind_group)) = (self.pipeline, self.shadow_bind_group) else {
            return;
        };
        let (Some(color), Some(normal), Some(depth)) = (
            ctx.get_texture(self.scene_color),
            ctx.get_texture(self.scene_normal),
            ctx.get_texture(self.scene_depth),
        ) else {
            return;
        };

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Geometry Pass".into()),
            color_attachments: vec![
                ColorAttachment::clear(color, CLEAR_COLOR),
                ColorAttachment::clear(normal, [0.0; 4]),
            ],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_clear_value: 1.0,
            }),
        });

        ctx.backend
            .set_viewport(0.0, 0.0, ctx.width as f32, ctx.height as f32, 0.0, 1.0);
        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, ctx.shared.frame_bind_group);
        ctx.backend.set_bind_group(2, shadow_bind_group);
        for draw in ctx.draws {
            ctx.backend.set_bind_group(1, draw.object_bind_group);
            ctx.backend.set_vertex_buffer(0, draw.vertex_buffer, 0);
            ctx.backend
                .set_index_buffer(draw.index_buffer, 0, IndexFormat::Uint32);
            ctx.backend.draw_indexed(0..draw.index_count, 0, 0..1);
        }

        ctx.backend.end_render_pass();
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(pipeline) = self.pipeline.take() {
            backend.destroy_render_pipeline(pipeline);
        }
        if let Some(bind_group) = self.shadow_bind_group.take() {
            backend.destroy_bind_group(bind_group);
        }
        if let Some(layout) = self.shadow_layout.take() {
            backend.destroy_bind_group_layout(layout);
        }
        if let Some(sampler) = self.shadow_sampler.take() {
            backend.destroy_sampler(sampler);
        }
    }
}
