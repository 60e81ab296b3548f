//! Camera controller system
//!
//! Turns per-frame input into camera motion. [`FreeFlyController`] is the fly
//! camera: WASD translation along the view axes, mouse look and scroll zoom.

use glam::Vec2;

use super::camera::{Camera, MAX_ZOOM, MIN_ZOOM};

/// Input state for camera controllers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraInput {
    /// Movement keys (WASD)
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,

    /// Cursor movement since last frame in pixels, y grows downwards
    pub mouse_delta: Vec2,

    /// Mouse scroll delta (positive = scroll up)
    pub scroll_delta: f32,
}

impl CameraInput {
    pub fn is_moving(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

/// Abstract camera controller trait
pub trait CameraController {
    /// Update the camera based on input and delta time
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;
}

/// Free-fly camera controller (FPS-style)
///
/// - WASD: move along the view direction and the right vector
/// - Mouse: yaw and pitch, moving the mouse up looks up
/// - Scroll: narrows or widens the field of view
#[derive(Debug, Clone)]
pub struct FreeFlyController {
    /// Movement speed in units per second
    pub move_speed: f32,
    /// Degrees per pixel of cursor movement
    pub mouse_sensitivity: f32,
    /// Pitch limit in degrees, both directions
    pub pitch_limit: f32,
}

impl Default for FreeFlyController {
    fn default() -> Self {
        Self {
            move_speed: 2.5,
            mouse_sensitivity: 0.1,
            pitch_limit: 89.0,
        }
    }
}

impl FreeFlyController {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraController for FreeFlyController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32) {
        if input.mouse_delta != Vec2::ZERO {
            camera.yaw += input.mouse_delta.x * self.mouse_sensitivity;
            camera.pitch -= input.mouse_delta.y * self.mouse_sensitivity;
            camera.pitch = camera.pitch.clamp(-self.pitch_limit, self.pitch_limit);
        }

        if input.scroll_delta != 0.0 {
            camera.zoom = (camera.zoom - input.scroll_delta).clamp(MIN_ZOOM, MAX_ZOOM);
        }

        if input.is_moving() {
            let velocity = self.move_speed * dt;
            let front = camera.front();
            let right = camera.right();
            if input.forward {
                camera.position += front * velocity;
            }
            if input.backward {
                camera.position -= front * velocity;
            }
            if input.left {
                camera.position -= right * velocity;
            }
            if input.right {
                camera.position += right * velocity;
            }
        }
    }

    fn name(&self) -> &'static str {
        "FreeFly"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_forward_moves_along_front() {
        let mut camera = Camera::new(Vec3::ZERO);
        let mut controller = FreeFlyController::new();
        let input = CameraInput {
            forward: true,
            ..Default::default()
        };
        controller.update(&mut camera, &input, 2.0);
        assert!((camera.position - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn test_mouse_up_looks_up_and_pitch_is_clamped() {
        let mut camera = Camera::default();
        let mut controller = FreeFlyController::new();
        let input = CameraInput {
            mouse_delta: Vec2::new(10.0, -50.0),
            ..Default::default()
        };
        controller.update(&mut camera, &input, 0.016);
        assert!((camera.yaw - -89.0).abs() < 1e-4);
        assert!((camera.pitch - 5.0).abs() < 1e-4);

        let input = CameraInput {
            mouse_delta: Vec2::new(0.0, -5000.0),
            ..Default::default()
        };
        controller.update(&mut camera, &input, 0.016);
        assert_eq!(camera.pitch, 89.0);
    }

    #[test]
    fn test_scroll_zoom_is_clamped() {
        let mut camera = Camera::default();
        let mut controller = FreeFlyController::new();
        let zoom_in = CameraInput {
            scroll_delta: 10.0,
            ..Default::default()
        };
        controller.update(&mut camera, &zoom_in, 0.016);
        assert_eq!(camera.zoom(), 35.0);

        let zoom_out = CameraInput {
            scroll_delta: -100.0,
            ..Default::default()
        };
        controller.update(&mut camera, &zoom_out, 0.016);
        assert_eq!(camera.zoom(), 45.0);

        let far_in = CameraInput {
            scroll_delta: 100.0,
            ..Default::default()
        };
        controller.update(&mut camera, &far_in, 0.016);
        assert_eq!(camera.zoom(), 1.0);
    }
}
