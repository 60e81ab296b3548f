//! Shadow map pass
//!
//! Renders scene depth from the light. The map is shared by all three shadow
//! techniques; the technique only changes how consumers sample it.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::uniforms::with_frame_bindings;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

const SHADOW_SHADER: &str = r#"
@group(1) @binding(0) var<uniform> object: ObjectUniform;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return frame.light_view_projection * object.model * vec4<f32>(position, 1.0);
}
"#;

/// Depth-only pass from the light's point of view
pub struct ShadowPass {
    shadow_map: ResourceId,
    pipeline: Option<RenderPipelineHandle>,
}

impl ShadowPass {
    pub fn new(shadow_map: ResourceId) -> Self {
        Self {
            shadow_map,
            pipeline: None,
        }
    }
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &str {
        "Shadow Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.write(self.shadow_map, ResourceUsage::DepthStencilWrite);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext) -> BackendResult<()> {
        let pipeline = ctx.backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Shadow Pipeline".into()),
            vertex_shader: with_frame_bindings(SHADOW_SHADER),
            fragment_shader: None,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![ctx.shared.frame_layout, ctx.shared.object_layout],
            front_face: FrontFace::Ccw,
            // Thin geometry such as the pond plane must cast from both sides
            cull_mode: CullMode::None,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: vec![],
        })?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn execute(&self, ctx: &mut PassExecuteContext) {
        let (Some(pipeline), Some(view)) = (self.pipeline, ctx.get_texture(self.shadow_map)) else {
            return;
        };

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Shadow Pass".into()),
            color_attachments: vec![],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_clear_value: 1.0,
            }),
        });

        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, ctx.shared.frame_bind_group);
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
    }
}
