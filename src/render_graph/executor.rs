//! Render graph executor

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::collections::{HashMap, HashSet};

/// What happened while executing one frame of the graph
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Passes that recorded commands, in execution order
    pub executed: Vec<String>,
    /// Passes that were disabled or missing inputs
    pub skipped: Vec<String>,
    /// Resources written by the executed passes
    pub produced: HashSet<ResourceId>,
}

/// Executor for running the compiled render graph
pub struct RenderGraphExecutor {
    /// Allocated textures mapped by resource ID
    allocated_textures: HashMap<ResourceId, TextureHandle>,
    allocated_texture_views: HashMap<ResourceId, TextureViewHandle>,

    /// External texture views (like swapchain)
    external_views: HashMap<ResourceId, TextureViewHandle>,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self {
            allocated_textures: HashMap::new(),
            allocated_texture_views: HashMap::new(),
            external_views: HashMap::new(),
        }
    }

    /// Set an external texture view (e.g., swapchain image)
    pub fn set_external_view(&mut self, resource: ResourceId, view: TextureViewHandle) {
        self.external_views.insert(resource, view);
    }

    /// Allocate a texture and view for every transient resource in the graph
    pub fn allocate_resources(
        &mut self,
        graph: &RenderGraph,
        backend: &mut dyn GraphicsBackend,
    ) -> BackendResult<()> {
        for resource in graph.resources() {
            if let VirtualResource::Texture(tex) = resource {
                if !self.allocated_textures.contains_key(&tex.id) {
                    let handle = backend.create_texture(&tex.desc)?;
                    let view = backend.create_texture_view(handle)?;
                    log::debug!(
                        "Allocated '{}' {}x{} {:?}",
                        tex.name,
                        tex.desc.width,
                        tex.desc.height,
                        tex.desc.format
                    );
                    self.allocated_textures.insert(tex.id, handle);
                    self.allocated_texture_views.insert(tex.id, view);
                }
            }
        }

        Ok(())
    }

    /// Let every pass build its pipelines against the allocated textures
    pub fn prepare_passes(
        &self,
        graph: &mut RenderGraph,
        backend: &mut dyn GraphicsBackend,
        shared: &SharedBindings,
    ) -> BackendResult<()> {
        let resource_names: HashMap<ResourceId, String> = graph
            .resources()
            .iter()
            .map(|r| (r.id(), r.name().to_string()))
            .collect();
        let surface_format = backend.swapchain_format();

        for pass in graph.passes_mut() {
            let mut ctx = PassPrepareContext {
                backend: &mut *backend,
                shared,
                surface_format,
                resource_textures: &self.allocated_texture_views,
                resource_names: &resource_names,
            };
            pass.prepare(&mut ctx)?;
        }

        Ok(())
    }

    /// Execute the render graph.
    ///
    /// Disabled passes are skipped without touching the backend. A pass whose
    /// required inputs were not produced this frame is skipped as well.
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &self,
        graph: &RenderGraph,
        compiled: &CompiledGraph,
        backend: &mut dyn GraphicsBackend,
        frame: &FrameParams,
        draws: &[DrawItem],
        shared: &SharedBindings,
        width: u32,
        height: u32,
    ) -> ExecutionReport {
        let mut texture_views: HashMap<ResourceId, TextureViewHandle> = HashMap::new();
        texture_views.extend(self.allocated_texture_views.iter().map(|(&k, &v)| (k, v)));
        texture_views.extend(self.external_views.iter().map(|(&k, &v)| (k, v)));

        let mut report = ExecutionReport::default();
        report.produced.extend(self.external_views.keys().copied());

        for &pass_id in &compiled.pass_order {
            let (Some(pass), Some(node)) = (graph.get_pass(pass_id), graph.get_pass_node(pass_id))
            else {
                continue;
            };

            if !pass.is_enabled(frame) {
                log::trace!("Pass '{}' disabled this frame", node.name);
                report.skipped.push(node.name.clone());
                continue;
            }

            if let Some(missing) = node
                .required_inputs()
                .find(|input| !report.produced.contains(&input.resource))
            {
                log::warn!(
                    "Skipping pass '{}': '{}' was not produced this frame",
                    node.name,
                    graph.resource_name(missing.resource)
                );
                report.skipped.push(node.name.clone());
                continue;
            }

            {
                let mut ctx = PassExecuteContext {
                    backend: &mut *backend,
                    frame,
                    draws,
                    shared,
                    width,
                    height,
                    resource_textures: &texture_views,
                    produced: &report.produced,
                };
                pass.execute(&mut ctx);
            }

            report
                .produced
                .extend(node.outputs.iter().map(|o| o.resource));
            report.executed.push(node.name.clone());
        }

        report
    }

    /// Release pass pipelines and every allocated texture
    pub fn cleanup(&mut self, graph: &mut RenderGraph, backend: &mut dyn GraphicsBackend) {
        for pass in graph.passes_mut() {
            pass.release(&mut *backend);
        }

        for (_, handle) in self.allocated_textures.drain() {
            backend.destroy_texture(handle);
        }
        self.allocated_texture_views.clear();
        self.external_views.clear();
    }
}

impl Default for RenderGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use crate::state::ShadowMode;
    use crate::timing::FrameTiming;

    struct Fill {
        name: &'static str,
        target: ResourceId,
        source: Option<ResourceId>,
        enabled: bool,
    }

    impl RenderPass for Fill {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            if let Some(source) = self.source {
                ctx.read(source, ResourceUsage::TextureRead);
            }
            ctx.write(self.target, ResourceUsage::RenderTarget);
        }

        fn is_enabled(&self, _frame: &FrameParams) -> bool {
            self.enabled
        }

        fn execute(&self, ctx: &mut PassExecuteContext) {
            let Some(view) = ctx.get_texture(self.target) else {
                return;
            };
            ctx.backend.begin_render_pass(&RenderPassDescriptor {
                label: Some(self.name.to_string()),
                color_attachments: vec![ColorAttachment::clear(view, [0.0; 4])],
                depth_stencil_attachment: None,
            });
            ctx.backend.draw(0..3, 0..1);
            ctx.backend.end_render_pass();
        }
    }

    fn frame() -> FrameParams {
        FrameParams {
            shadow_mode: ShadowMode::Hard,
            ssr_active: false,
            scatter_enabled: false,
            timing: FrameTiming::default(),
        }
    }

    fn shared(backend: &mut DummyBackend) -> SharedBindings {
        let layout = backend.create_bind_group_layout(&[]).unwrap();
        let group = backend.create_bind_group(layout, &[]).unwrap();
        SharedBindings {
            frame_layout: layout,
            frame_bind_group: group,
            object_layout: layout,
        }
    }

    fn graph_with(first_enabled: bool) -> RenderGraph {
        let mut graph = RenderGraph::new(32, 32);
        let a = graph.create_texture(
            "a",
            TextureSize::default(),
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        );
        let b = graph.create_texture(
            "b",
            TextureSize::default(),
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT,
        );
        graph.add_pass(Fill {
            name: "first",
            target: a,
            source: None,
            enabled: first_enabled,
        });
        graph.add_pass(Fill {
            name: "second",
            target: b,
            source: Some(a),
            enabled: true,
        });
        graph
    }

    #[test]
    fn test_execute_records_passes_in_order() {
        let mut backend = DummyBackend::new(32, 32);
        let shared = shared(&mut backend);
        let graph = graph_with(true);
        let compiled = graph.compile().unwrap();

        let mut executor = RenderGraphExecutor::new();
        executor.allocate_resources(&graph, &mut backend).unwrap();
        let report = executor.execute(&graph, &compiled, &mut backend, &frame(), &[], &shared, 32, 32);

        assert_eq!(report.executed, vec!["first", "second"]);
        assert_eq!(backend.render_pass_labels(), vec!["first", "second"]);
    }

    #[test]
    fn test_disabled_pass_records_nothing_and_starves_dependents() {
        let mut backend = DummyBackend::new(32, 32);
        let shared = shared(&mut backend);
        let graph = graph_with(false);
        let compiled = graph.compile().unwrap();

        let mut executor = RenderGraphExecutor::new();
        executor.allocate_resources(&graph, &mut backend).unwrap();
        let report = executor.execute(&graph, &compiled, &mut backend, &frame(), &[], &shared, 32, 32);

        assert!(report.executed.is_empty());
        assert_eq!(report.skipped, vec!["first", "second"]);
        assert!(!backend
            .commands()
            .iter()
            .any(|c| matches!(c, RecordedCommand::BeginRenderPass { .. })));
    }

    #[test]
    fn test_cleanup_releases_textures() {
        let mut backend = DummyBackend::new(32, 32);
        let mut graph = graph_with(true);

        let mut executor = RenderGraphExecutor::new();
        executor.allocate_resources(&graph, &mut backend).unwrap();
        assert_eq!(backend.live_texture_count(), 2);

        executor.cleanup(&mut graph, &mut backend);
        assert_eq!(backend.live_texture_count(), 0);
    }
}
