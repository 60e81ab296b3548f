//! Shadow-casting light

use glam::{Mat4, Vec3};

use super::camera::Projection;

/// A light with an orthographic shadow frustum, positioned looking at a target
#[derive(Debug, Clone, PartialEq)]
pub struct LightDescriptor {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// Half-width of the shadow frustum in world units
    pub extent: f32,
    pub near: f32,
    pub far: f32,
    /// Emitter size used to size PCSS penumbrae
    pub size: f32,
}

impl Default for LightDescriptor {
    fn default() -> Self {
        Self::moon()
    }
}

impl LightDescriptor {
    /// Cold, low moonlight from behind the scene
    pub fn moon() -> Self {
        Self {
            position: Vec3::new(-8.0, 12.0, -6.0),
            target: Vec3::ZERO,
            color: Vec3::new(0.62, 0.72, 1.0),
            intensity: 1.6,
            extent: 14.0,
            near: 1.0,
            far: 40.0,
            size: 0.6,
        }
    }

    /// Normalized direction the light travels in
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        // Avoid a degenerate basis when the light looks straight down
        let up = if self.direction().cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.position, self.target, up)
    }

    pub fn projection(&self) -> Mat4 {
        Projection::orthographic(self.extent * 2.0, self.extent * 2.0, self.near, self.far).matrix()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_projects_to_frustum_center() {
        let light = LightDescriptor::moon();
        let ndc = light.view_projection().project_point3(light.target);
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_straight_down_light_has_valid_view() {
        let light = LightDescriptor {
            position: Vec3::new(0.0, 10.0, 0.0),
            ..LightDescriptor::moon()
        };
        assert!(light.view().is_finite());
        assert!((light.direction() - Vec3::NEG_Y).length() < 1e-5);
    }
}
