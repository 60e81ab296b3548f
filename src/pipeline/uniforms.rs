//! Uniform blocks shared by the frame passes
//!
//! Every pass binds [`FrameUniform`] at group 0. Shaders get the matching WGSL
//! declarations by prepending [`FRAME_BINDINGS_WGSL`]; fullscreen passes also
//! prepend [`FULLSCREEN_WGSL`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec3, Vec4};

use crate::render_graph::FrameParams;
use crate::resources::Material;
use crate::scene::{CameraView, LightDescriptor, Transform};
use crate::RendererConfig;

/// Per-frame camera, light and toggle data
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniform {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inv_view: Mat4,
    pub inv_projection: Mat4,
    /// Inverse of projection times the rotation-only view
    pub inv_sky_view_projection: Mat4,
    pub light_view_projection: Mat4,
    pub camera_position: Vec4,
    /// xyz = position, w = emitter size
    pub light_position: Vec4,
    /// xyz = direction the light travels
    pub light_direction: Vec4,
    /// xyz = color, w = intensity
    pub light_color: Vec4,
    /// x = near, y = far, z = frustum half extent
    pub light_params: Vec4,
    pub ambient: Vec4,
    /// x = shadow mode, y = PCF kernel, z = SSR steps, w = scatter steps
    pub settings: UVec4,
    /// x = delta time, y = elapsed time, zw = target size
    pub time: Vec4,
}

impl FrameUniform {
    pub fn new(
        camera: &CameraView,
        light: &LightDescriptor,
        ambient: Vec3,
        frame: &FrameParams,
        config: &RendererConfig,
        size: (u32, u32),
    ) -> Self {
        let sky_view_projection = camera.projection * camera.rotation_only();
        Self {
            view: camera.view,
            projection: camera.projection,
            view_projection: camera.projection * camera.view,
            inv_view: camera.view.inverse(),
            inv_projection: camera.projection.inverse(),
            inv_sky_view_projection: sky_view_projection.inverse(),
            light_view_projection: light.view_projection(),
            camera_position: camera.position.extend(1.0),
            light_position: light.position.extend(light.size),
            light_direction: light.direction().extend(0.0),
            light_color: light.color.extend(light.intensity),
            light_params: Vec4::new(light.near, light.far, light.extent, 0.0),
            ambient: ambient.extend(0.0),
            settings: UVec4::new(
                frame.shadow_mode.as_u32(),
                config.shadow_kernel,
                config.ssr_steps,
                config.scatter_steps,
            ),
            time: Vec4::new(
                frame.timing.delta_time,
                frame.timing.elapsed_time as f32,
                size.0 as f32,
                size.1 as f32,
            ),
        }
    }
}

/// Per-object transform and material
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
    pub base_color: Vec4,
    /// x = specular, y = shininess, z = reflectivity
    pub material: Vec4,
}

impl ObjectUniform {
    pub fn new(transform: &Transform, material: &Material) -> Self {
        Self {
            model: transform.matrix(),
            normal_matrix: transform.normal_matrix(),
            base_color: material.base_color.extend(1.0),
            material: Vec4::new(
                material.specular,
                material.shininess,
                material.reflectivity,
                0.0,
            ),
        }
    }
}

pub const FRAME_BINDINGS_WGSL: &str = r#"
struct FrameUniform {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_projection: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_projection: mat4x4<f32>,
    inv_sky_view_projection: mat4x4<f32>,
    light_view_projection: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_direction: vec4<f32>,
    light_color: vec4<f32>,
    light_params: vec4<f32>,
    ambient: vec4<f32>,
    settings: vec4<u32>,
    time: vec4<f32>,
}

struct ObjectUniform {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    base_color: vec4<f32>,
    material: vec4<f32>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniform;

// Same falloff in the geometry and scattering passes
fn light_attenuation(d: f32) -> f32 {
    return 1.0 / (1.0 + 0.007 * d + 0.0002 * d * d);
}

// Clip-space position to texture coordinates and depth
fn clip_to_uv_depth(clip: vec4<f32>) -> vec3<f32> {
    let ndc = clip.xyz / clip.w;
    return vec3<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z);
}
"#;

pub const FULLSCREEN_WGSL: &str = r#"
struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: FullscreenOutput;
    out.position = vec4<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

/// Frame bindings followed by the pass body
pub fn with_frame_bindings(body: &str) -> String {
    format!("{FRAME_BINDINGS_WGSL}\n{body}")
}

/// Frame bindings, the fullscreen triangle and the pass body
pub fn fullscreen_shader(body: &str) -> String {
    format!("{FRAME_BINDINGS_WGSL}\n{FULLSCREEN_WGSL}\n{body}")
}
