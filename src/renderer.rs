//! Per-frame renderer
//!
//! [`Renderer`] owns the backend, the scene and the frame graph. Every frame it
//! uploads the frame and object uniforms, derives [`FrameParams`] from the
//! [`RenderState`] and runs the graph; passes disabled by the state record
//! nothing.

use std::collections::HashMap;

use bevy_ecs::entity::Entity;
use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::{build_frame_graph, FrameResources, FrameUniform, ObjectUniform};
use crate::render_graph::{
    CompiledGraph, DrawItem, FrameParams, GraphError, RenderGraph, RenderGraphExecutor,
    ResourceId, SharedBindings,
};
use crate::scene::{CameraView, Scene};
use crate::state::RenderState;
use crate::timing::FrameTiming;
use crate::RendererConfig;

/// Errors raised while building or rebuilding the renderer
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Invalid render graph: {0}")]
    Graph(#[from] GraphError),
}

/// Outcome of one call to [`Renderer::render`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Passes that recorded commands, in order
    pub executed_passes: Vec<String>,
    /// Passes disabled by the render state this frame
    pub skipped_passes: Vec<String>,
    pub reflection_present: bool,
    pub scatter_present: bool,
    /// The surface was lost and the frame was dropped
    pub frame_skipped: bool,
}

impl FrameReport {
    fn dropped() -> Self {
        Self {
            frame_skipped: true,
            ..Default::default()
        }
    }

    pub fn executed(&self, pass: &str) -> bool {
        self.executed_passes.iter().any(|p| p == pass)
    }
}

/// GPU buffers for a mesh
struct GpuMesh {
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    index_count: u32,
}

/// Per-entity uniform buffer and its bind group
struct GpuObject {
    uniform_buffer: BufferHandle,
    bind_group: BindGroupHandle,
}

/// Renders a [`Scene`] through the frame graph on any [`GraphicsBackend`]
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    config: RendererConfig,
    scene: Scene,
    graph: RenderGraph,
    compiled: CompiledGraph,
    resources: FrameResources,
    executor: RenderGraphExecutor,
    shared: SharedBindings,
    frame_buffer: BufferHandle,
    gpu_meshes: Vec<GpuMesh>,
    gpu_objects: HashMap<Entity, GpuObject>,
    width: u32,
    height: u32,
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Create shared bindings, allocate the graph's buffers and build every pipeline
    pub fn new(mut backend: B, config: RendererConfig, scene: Scene) -> Result<Self, RenderError> {
        let (width, height) = backend.surface_size();

        let frame_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(
            0,
            ShaderStageFlags::VERTEX_FRAGMENT,
        )])?;
        let object_layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry::uniform(
            0,
            ShaderStageFlags::VERTEX_FRAGMENT,
        )])?;
        let frame_buffer =
            backend.create_buffer(&BufferDescriptor::uniform::<FrameUniform>("Frame Uniforms"))?;
        let frame_bind_group =
            backend.create_bind_group(frame_layout, &[(0, BindGroupEntry::Buffer(frame_buffer))])?;
        let shared = SharedBindings {
            frame_layout,
            frame_bind_group,
            object_layout,
        };

        let (mut graph, resources) = build_frame_graph(width, height, &config)?;
        let mut executor = RenderGraphExecutor::new();
        executor.allocate_resources(&graph, &mut backend)?;
        executor.prepare_passes(&mut graph, &mut backend, &shared)?;
        let compiled = graph.compile()?;

        log::info!(
            "Renderer ready at {}x{}: {} passes, shadow map {}x{}",
            width,
            height,
            graph.pass_nodes().len(),
            config.shadow_map_size,
            config.shadow_map_size
        );

        Ok(Self {
            backend,
            config,
            scene,
            graph,
            compiled,
            resources,
            executor,
            shared,
            frame_buffer,
            gpu_meshes: Vec::new(),
            gpu_objects: HashMap::new(),
            width,
            height,
        })
    }

    /// Render one frame.
    ///
    /// A lost or outdated surface is reconfigured at the current size and the
    /// frame is dropped. A timed out acquire drops the frame as is. Any other
    /// backend error is returned.
    pub fn render(
        &mut self,
        camera: &CameraView,
        state: &RenderState,
        timing: FrameTiming,
    ) -> BackendResult<FrameReport> {
        let draws = self.sync_scene()?;

        let frame = match self.backend.begin_frame() {
            Ok(frame) => frame,
            Err(BackendError::SurfaceLost | BackendError::SurfaceOutdated) => {
                log::warn!(
                    "Surface lost, reconfiguring at {}x{} and dropping the frame",
                    self.width,
                    self.height
                );
                self.backend.resize(self.width, self.height);
                return Ok(FrameReport::dropped());
            }
            Err(BackendError::SurfaceTimeout) => {
                log::warn!("Timed out acquiring the surface texture, dropping the frame");
                return Ok(FrameReport::dropped());
            }
            Err(err) => return Err(err),
        };

        let params = FrameParams {
            shadow_mode: state.shadow_mode(),
            ssr_active: state.ssr_active(),
            scatter_enabled: state.scatter_enabled(),
            timing,
        };

        let uniform = FrameUniform::new(
            camera,
            &self.scene.light,
            self.scene.ambient_light,
            &params,
            &self.config,
            (self.width, self.height),
        );
        self.backend
            .write_buffer(self.frame_buffer, 0, bytemuck::bytes_of(&uniform));

        for drawable in self.scene.drawables() {
            let (Some(object), Some(material)) = (
                self.gpu_objects.get(&drawable.entity),
                self.scene.material(drawable.renderer.material),
            ) else {
                continue;
            };
            let uniform = ObjectUniform::new(drawable.transform, material);
            self.backend
                .write_buffer(object.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
        }

        self.executor
            .set_external_view(self.resources.swapchain, frame.swapchain_view);
        let report = self.executor.execute(
            &self.graph,
            &self.compiled,
            &mut self.backend,
            &params,
            &draws,
            &self.shared,
            self.width,
            self.height,
        );

        self.backend.end_frame()?;

        let produced = |id: Option<ResourceId>| id.is_some_and(|id| report.produced.contains(&id));
        Ok(FrameReport {
            reflection_present: produced(self.resources.reflection),
            scatter_present: produced(self.resources.scatter),
            executed_passes: report.executed,
            skipped_passes: report.skipped,
            frame_skipped: false,
        })
    }

    /// Resize the surface and reallocate every size-dependent buffer
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.backend.resize(width, height);
        let (width, height) = self.backend.surface_size();
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        self.executor.cleanup(&mut self.graph, &mut self.backend);

        let (mut graph, resources) = build_frame_graph(width, height, &self.config)?;
        self.executor.allocate_resources(&graph, &mut self.backend)?;
        self.executor
            .prepare_passes(&mut graph, &mut self.backend, &self.shared)?;
        self.compiled = graph.compile()?;
        self.graph = graph;
        self.resources = resources;
        self.width = width;
        self.height = height;

        log::debug!("Frame buffers reallocated at {}x{}", width, height);
        Ok(())
    }

    /// Upload new meshes, create buffers for new entities and drop despawned ones
    fn sync_scene(&mut self) -> BackendResult<Vec<DrawItem>> {
        for (id, mesh) in self.scene.meshes().iter().enumerate().skip(self.gpu_meshes.len()) {
            let vertex_buffer = self.backend.create_buffer_init(
                &BufferDescriptor {
                    label: Some(format!("Vertex Buffer {}", id)),
                    size: mesh.vertex_bytes().len() as u64,
                    usage: BufferUsage::VERTEX,
                },
                mesh.vertex_bytes(),
            )?;
            let index_buffer = self.backend.create_buffer_init(
                &BufferDescriptor {
                    label: Some(format!("Index Buffer {}", id)),
                    size: mesh.index_bytes().len() as u64,
                    usage: BufferUsage::INDEX,
                },
                mesh.index_bytes(),
            )?;
            log::debug!("Uploaded mesh '{}' ({} triangles)", mesh.name, mesh.triangle_count());
            self.gpu_meshes.push(GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count() as u32,
            });
        }

        let live: Vec<Entity> = self.scene.drawables().map(|d| d.entity).collect();
        let stale: Vec<Entity> = self
            .gpu_objects
            .keys()
            .filter(|e| !live.contains(*e))
            .copied()
            .collect();
        for entity in stale {
            if let Some(object) = self.gpu_objects.remove(&entity) {
                self.backend.destroy_bind_group(object.bind_group);
                self.backend.destroy_buffer(object.uniform_buffer);
            }
        }

        let mut draws = Vec::with_capacity(live.len());
        for drawable in self.scene.drawables() {
            let Some(mesh) = self.gpu_meshes.get(drawable.renderer.mesh) else {
                log::warn!("{:?} references missing mesh {}", drawable.entity, drawable.renderer.mesh);
                continue;
            };
            if self.scene.material(drawable.renderer.material).is_none() {
                log::warn!(
                    "{:?} references missing material {}",
                    drawable.entity,
                    drawable.renderer.material
                );
                continue;
            }

            if !self.gpu_objects.contains_key(&drawable.entity) {
                let uniform_buffer = self
                    .backend
                    .create_buffer(&BufferDescriptor::uniform::<ObjectUniform>("Object Uniforms"))?;
                let bind_group = self.backend.create_bind_group(
                    self.shared.object_layout,
                    &[(0, BindGroupEntry::Buffer(uniform_buffer))],
                )?;
                self.gpu_objects.insert(
                    drawable.entity,
                    GpuObject {
                        uniform_buffer,
                        bind_group,
                    },
                );
            }
            let Some(object) = self.gpu_objects.get(&drawable.entity) else {
                continue;
            };

            draws.push(DrawItem {
                vertex_buffer: mesh.vertex_buffer,
                index_buffer: mesh.index_buffer,
                index_count: mesh.index_count,
                object_bind_group: object.bind_group,
            });
        }

        Ok(draws)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::resources::{Material, Mesh};
    use crate::scene::{Camera, Transform};
    use glam::Vec3;

    fn renderer() -> Renderer<DummyBackend> {
        Renderer::new(
            DummyBackend::new(320, 180),
            RendererConfig::default(),
            Scene::night_garden(),
        )
        .unwrap()
    }

    fn render(renderer: &mut Renderer<DummyBackend>, state: &RenderState) -> FrameReport {
        let camera = Camera::default().view(renderer.aspect_ratio());
        renderer
            .render(&camera, state, FrameTiming::default())
            .unwrap()
    }

    #[test]
    fn test_default_state_runs_base_passes() {
        let mut renderer = renderer();
        let report = render(&mut renderer, &RenderState::new());
        assert_eq!(
            report.executed_passes,
            vec!["Shadow Pass", "Geometry Pass", "Skybox Pass", "Composite Pass"]
        );
        assert_eq!(report.skipped_passes, vec!["SSR Pass", "Scatter Pass"]);
        assert!(!report.reflection_present);
        assert!(!report.scatter_present);
    }

    #[test]
    fn test_every_drawable_is_drawn_in_scene_passes() {
        let mut renderer = renderer();
        let expected = renderer.scene().drawable_count();
        render(&mut renderer, &RenderState::new());

        let backend = renderer.backend();
        for pass in ["Shadow Pass", "Geometry Pass"] {
            let draws = backend
                .pass_commands(pass)
                .into_iter()
                .filter(|c| matches!(c, crate::backend::dummy::RecordedCommand::DrawIndexed { .. }))
                .count();
            assert_eq!(draws, expected, "{pass}");
        }
    }

    #[test]
    fn test_lost_surface_drops_one_frame() {
        let mut renderer = renderer();
        renderer.backend_mut().lose_surface(1);

        let report = render(&mut renderer, &RenderState::new());
        assert!(report.frame_skipped);
        assert!(renderer.backend().render_pass_labels().is_empty());

        let report = render(&mut renderer, &RenderState::new());
        assert!(!report.frame_skipped);
        assert!(report.executed("Composite Pass"));
    }

    #[test]
    fn test_despawned_entities_release_their_buffers() {
        let mut renderer = renderer();
        render(&mut renderer, &RenderState::new());
        let before = renderer.backend().live_bind_group_count();

        let entity = renderer.scene().drawables().next().unwrap().entity;
        assert!(renderer.scene_mut().despawn(entity));
        render(&mut renderer, &RenderState::new());
        assert_eq!(renderer.backend().live_bind_group_count(), before - 1);
    }

    #[test]
    fn test_entities_spawned_later_are_drawn() {
        let mut renderer = renderer();
        render(&mut renderer, &RenderState::new());

        let scene = renderer.scene_mut();
        let mesh = scene.add_mesh(Mesh::cube());
        let material = scene.add_material(Material::default());
        scene.spawn(Transform::from_position(Vec3::new(0.0, 3.0, 0.0)), mesh, material);
        let expected = scene.drawable_count();

        renderer.backend_mut().clear_commands();
        render(&mut renderer, &RenderState::new());
        let draws = renderer
            .backend()
            .pass_commands("Geometry Pass")
            .into_iter()
            .filter(|c| matches!(c, crate::backend::dummy::RecordedCommand::DrawIndexed { .. }))
            .count();
        assert_eq!(draws, expected);
    }

    #[test]
    fn test_entities_with_missing_material_are_not_drawn() {
        let mut renderer = renderer();
        let expected = renderer.scene().drawable_count();
        render(&mut renderer, &RenderState::new());
        let bind_groups = renderer.backend().live_bind_group_count();

        let scene = renderer.scene_mut();
        let material = scene.materials().len() + 7;
        scene.spawn(Transform::from_position(Vec3::new(0.0, 3.0, 0.0)), 0, material);

        renderer.backend_mut().clear_commands();
        render(&mut renderer, &RenderState::new());
        let draws = renderer
            .backend()
            .pass_commands("Geometry Pass")
            .into_iter()
            .filter(|c| matches!(c, crate::backend::dummy::RecordedCommand::DrawIndexed { .. }))
            .count();
        assert_eq!(draws, expected);
        assert_eq!(renderer.backend().live_bind_group_count(), bind_groups);
    }

    #[test]
    fn test_timed_out_surface_drops_one_frame() {
        let mut renderer = renderer();
        renderer.backend_mut().time_out_surface(1);

        let report = render(&mut renderer, &RenderState::new());
        assert!(report.frame_skipped);
        assert_eq!(renderer.backend().surface_configurations(), 0);

        let report = render(&mut renderer, &RenderState::new());
        assert!(!report.frame_skipped);
    }
}
