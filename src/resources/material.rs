//! Blinn-Phong material definitions

use glam::Vec3;

/// Surface properties consumed by the geometry pass
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: Vec3,
    /// Strength of the specular highlight
    pub specular: f32,
    /// Blinn-Phong exponent
    pub shininess: f32,
    /// Fraction of the screen-space reflection blended over the surface
    pub reflectivity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec3::splat(0.8),
            specular: 0.3,
            shininess: 32.0,
            reflectivity: 0.0,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_specular(mut self, specular: f32, shininess: f32) -> Self {
        self.specular = specular.max(0.0);
        self.shininess = shininess.max(1.0);
        self
    }

    pub fn with_reflectivity(mut self, reflectivity: f32) -> Self {
        self.reflectivity = reflectivity.clamp(0.0, 1.0);
        self
    }

    // Preset materials

    pub fn grass() -> Self {
        Self::new("grass")
            .with_base_color(Vec3::new(0.18, 0.32, 0.12))
            .with_specular(0.05, 8.0)
    }

    pub fn stone(color: Vec3) -> Self {
        Self::new("stone")
            .with_base_color(color)
            .with_specular(0.2, 16.0)
    }

    pub fn lacquer(color: Vec3) -> Self {
        Self::new("lacquer")
            .with_base_color(color)
            .with_specular(0.8, 96.0)
            .with_reflectivity(0.25)
    }

    pub fn water() -> Self {
        Self::new("water")
            .with_base_color(Vec3::new(0.03, 0.06, 0.09))
            .with_specular(1.0, 128.0)
            .with_reflectivity(0.85)
    }
}
