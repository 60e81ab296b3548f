//! Camera system

use glam::{Mat4, Vec3};

/// Projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Projection::Orthographic {
            left: -half_w,
            right: half_w,
            bottom: -half_h,
            top: half_h,
            near,
            far,
        }
    }

    /// Right-handed projection matrix with depth in [0, 1]
    pub fn matrix(&self) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(*fov_y, *aspect, *near, *far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(*left, *right, *bottom, *top, *near, *far),
        }
    }
}

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_ZOOM: f32 = 45.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Fly camera described by Euler angles in degrees
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Heading in degrees; -90 looks down -Z
    pub yaw: f32,
    /// Elevation in degrees
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub zoom: f32,
    pub world_up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(2.0, 1.0, 4.0))
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            zoom: DEFAULT_ZOOM,
            world_up: Vec3::Y,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(self.world_up).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.front()).normalize()
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), self.up())
    }

    /// Perspective projection for the given aspect ratio
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Projection::perspective(self.zoom, aspect.max(f32::EPSILON), NEAR_PLANE, FAR_PLANE)
            .matrix()
    }

    /// Everything the renderer needs from the camera for one frame
    pub fn view(&self, aspect: f32) -> CameraView {
        CameraView {
            position: self.position,
            view: self.view_matrix(),
            projection: self.projection_matrix(aspect),
        }
    }
}

/// Camera data consumed by the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraView {
    /// View matrix with translation removed, for the skybox
    pub fn rotation_only(&self) -> Mat4 {
        let mut view = self.view;
        view.w_axis = glam::Vec4::W;
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert_eq!(camera.position(), Vec3::new(2.0, 1.0, 4.0));
        assert!((camera.front() - Vec3::NEG_Z).length() < 1e-5);
        assert!((camera.right() - Vec3::X).length() < 1e-5);
        assert_eq!(camera.zoom(), 45.0);
    }

    #[test]
    fn test_view_maps_position_to_origin() {
        let camera = Camera::new(Vec3::new(3.0, -2.0, 7.0));
        let at_eye = camera.view_matrix().transform_point3(camera.position);
        assert!(at_eye.length() < 1e-5);
    }

    #[test]
    fn test_rotation_only_drops_translation() {
        let view = Camera::new(Vec3::new(10.0, 5.0, -3.0)).view(1.5);
        let origin = view.rotation_only().transform_point3(Vec3::ZERO);
        assert!(origin.length() < 1e-6);
    }

    #[test]
    fn test_orthographic_depth_range() {
        let proj = Projection::orthographic(10.0, 10.0, 1.0, 21.0).matrix();
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -21.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-5);
    }
}
