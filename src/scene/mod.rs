//! Scene management
//!
//! Drawables live in a `bevy_ecs` [`World`] as entities carrying a
//! [`Transform`] and a [`MeshRenderer`]. Mesh and material data are stored
//! alongside and referenced by index.

mod camera;
mod camera_controller;
mod light;
mod transform;

pub use camera::*;
pub use camera_controller::*;
pub use light::*;
pub use transform::*;

use bevy_ecs::prelude::*;
use glam::Vec3;

use crate::resources::{Material, Mesh};

/// Links an entity to the mesh and material it is drawn with
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRenderer {
    pub mesh: usize,
    pub material: usize,
}

/// One object to draw this frame
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    pub entity: Entity,
    pub transform: &'a Transform,
    pub renderer: MeshRenderer,
}

/// The scene containing all renderable content
pub struct Scene {
    world: World,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    pub light: LightDescriptor,
    pub ambient_light: Vec3,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            light: LightDescriptor::default(),
            ambient_light: Vec3::new(0.04, 0.045, 0.06),
        }
    }

    /// Add a mesh and return its ID
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// Add a material and return its ID
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn mesh(&self, id: usize) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn material(&self, id: usize) -> Option<&Material> {
        self.materials.get(id)
    }

    /// Spawn a drawable entity
    pub fn spawn(&mut self, transform: Transform, mesh: usize, material: usize) -> Entity {
        self.world
            .spawn((transform, MeshRenderer { mesh, material }))
            .id()
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Entities with both a transform and a mesh renderer.
    ///
    /// The iterator borrows the world and can be recreated every frame.
    pub fn drawables(&self) -> impl Iterator<Item = Drawable<'_>> + '_ {
        self.world.iter_entities().filter_map(|entity| {
            let transform = entity.get::<Transform>()?;
            let renderer = *entity.get::<MeshRenderer>()?;
            Some(Drawable {
                entity: entity.id(),
                transform,
                renderer,
            })
        })
    }

    pub fn drawable_count(&self) -> usize {
        self.drawables().count()
    }

    /// Moonlit garden: lawn, stone blocks, lacquered spheres and a pond
    pub fn night_garden() -> Self {
        let mut scene = Scene::new();

        let ground = scene.add_mesh(Mesh::plane(30.0, 30.0, 8));
        let pond = scene.add_mesh(Mesh::plane(5.0, 3.5, 1));
        let cube = scene.add_mesh(Mesh::cube());
        let sphere = scene.add_mesh(Mesh::sphere(32, 16));

        let grass = scene.add_material(Material::grass());
        let water = scene.add_material(Material::water());
        let granite = scene.add_material(Material::stone(Vec3::new(0.45, 0.43, 0.42)));
        let sandstone = scene.add_material(Material::stone(Vec3::new(0.62, 0.52, 0.38)));
        let red = scene.add_material(Material::lacquer(Vec3::new(0.55, 0.08, 0.07)));
        let ivory = scene.add_material(Material::lacquer(Vec3::new(0.85, 0.82, 0.74)));

        scene.spawn(Transform::default(), ground, grass);
        scene.spawn(Transform::from_position(Vec3::new(0.5, 0.01, -1.5)), pond, water);

        let blocks = [
            (Vec3::new(-2.5, 0.5, -3.0), 1.0, 0.3, granite),
            (Vec3::new(3.0, 0.75, -2.5), 1.5, -0.5, sandstone),
            (Vec3::new(-1.0, 0.35, 1.0), 0.7, 0.8, granite),
            (Vec3::new(2.2, 1.5, -6.0), 3.0, 0.1, sandstone),
        ];
        for (position, size, yaw, material) in blocks {
            let transform = Transform::from_position(position)
                .with_uniform_scale(size)
                .with_yaw(yaw);
            scene.spawn(transform, cube, material);
        }

        let spheres = [
            (Vec3::new(0.0, 0.6, -3.8), 1.2, red),
            (Vec3::new(1.6, 0.4, 0.2), 0.8, ivory),
            (Vec3::new(-3.4, 0.9, -0.8), 1.8, ivory),
        ];
        for (position, diameter, material) in spheres {
            scene.spawn(
                Transform::from_position(position).with_uniform_scale(diameter),
                sphere,
                material,
            );
        }

        scene.light = LightDescriptor::moon();
        scene
    }
}
