//! Night scene rendering pipeline
//!
//! One frame is a fixed graph of passes:
//! 1. Shadow pass - scene depth from the moon into the shadow map
//! 2. Geometry pass - lit colour, view normal and depth, sampling the shadow map
//! 3. Skybox pass - procedural sky behind the geometry
//! 4. SSR pass - reflections from the geometry buffers (while SSR is active)
//! 5. Scatter pass - in-scattered moonlight (while scattering is enabled)
//! 6. Composite pass - blend, tonemap and present

pub mod composite_pass;
pub mod geometry_pass;
pub mod scatter_pass;
pub mod shadow_pass;
pub mod skybox_pass;
pub mod ssr_pass;
pub mod uniforms;

pub use composite_pass::{CompositeParams, CompositePass};
pub use geometry_pass::GeometryPass;
pub use scatter_pass::ScatterPass;
pub use shadow_pass::ShadowPass;
pub use skybox_pass::SkyboxPass;
pub use ssr_pass::SsrPass;
pub use uniforms::{FrameUniform, ObjectUniform};

use crate::backend::types::{TextureFormat, TextureUsage};
use crate::render_graph::{GraphError, RenderGraph, ResourceId, TextureSize};
use crate::RendererConfig;

/// Resources created for the frame graph
#[derive(Debug, Clone, Copy)]
pub struct FrameResources {
    pub swapchain: ResourceId,
    pub shadow_map: ResourceId,
    pub scene_color: ResourceId,
    pub scene_normal: ResourceId,
    pub scene_depth: ResourceId,
    /// `None` when the SSR pass is not part of the graph
    pub reflection: Option<ResourceId>,
    /// `None` when the scatter pass is not part of the graph
    pub scatter: Option<ResourceId>,
}

/// Build and validate the frame graph for a `width` x `height` surface
pub fn build_frame_graph(
    width: u32,
    height: u32,
    config: &RendererConfig,
) -> Result<(RenderGraph, FrameResources), GraphError> {
    let mut graph = RenderGraph::new(width, height);
    let target = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;

    let swapchain = graph.register_external("swapchain");
    let shadow_map = graph.create_texture(
        "shadow_map",
        TextureSize::square(config.shadow_map_size),
        TextureFormat::Depth32Float,
        target,
    );
    let scene_color = graph.create_texture(
        "scene_color",
        TextureSize::default(),
        TextureFormat::Rgba16Float,
        target,
    );
    let scene_normal = graph.create_texture(
        "scene_normal",
        TextureSize::default(),
        TextureFormat::Rgba16Float,
        target,
    );
    let scene_depth = graph.create_texture(
        "scene_depth",
        TextureSize::default(),
        TextureFormat::Depth32Float,
        target,
    );

    graph.add_pass(ShadowPass::new(shadow_map));
    graph.add_pass(GeometryPass::new(
        shadow_map,
        scene_color,
        scene_normal,
        scene_depth,
    ));
    graph.add_pass(SkyboxPass::new(scene_color, scene_depth));

    let reflection = config.include_ssr_pass.then(|| {
        let reflection = graph.create_texture(
            "reflection",
            TextureSize::default(),
            TextureFormat::Rgba16Float,
            target,
        );
        graph.add_pass(SsrPass::new(
            scene_color,
            scene_normal,
            scene_depth,
            reflection,
        ));
        reflection
    });

    let scatter = config.include_scatter_pass.then(|| {
        let scatter = graph.create_texture(
            "scatter",
            TextureSize::default(),
            TextureFormat::Rgba16Float,
            target,
        );
        graph.add_pass(ScatterPass::new(scene_depth, shadow_map, scatter));
        scatter
    });

    graph.add_pass(CompositePass::new(
        scene_color,
        reflection,
        scatter,
        swapchain,
        config.exposure,
    ));

    // Surface any declaration mistake at build time rather than on the first frame
    graph.compile()?;

    Ok((
        graph,
        FrameResources {
            swapchain,
            shadow_map,
            scene_color,
            scene_normal,
            scene_depth,
            reflection,
            scatter,
        },
    ))
}
