//! Keyboard and mouse input
//!
//! Window events are forwarded to an [`InputSink`]. [`InputState`] collects
//! them between frames; [`InputState::process`] then applies the held keys to
//! the [`RenderState`] and hands back the camera input for the frame.

use std::collections::HashSet;

use glam::Vec2;
use winit::keyboard::KeyCode;

use crate::scene::CameraInput;
use crate::state::{RenderState, ShadowMode, ToggleAction};

/// Receiver for window input events
pub trait InputSink {
    /// Called when a key is pressed or released.
    fn on_key(&mut self, _key: KeyCode, _pressed: bool) {}

    /// Called with the cursor position in pixels.
    fn on_mouse_move(&mut self, _x: f64, _y: f64) {}

    /// Called when the mouse wheel is scrolled, in lines.
    fn on_scroll(&mut self, _delta: f32) {}

    /// Called when the window is resized.
    fn on_resize(&mut self, _width: u32, _height: u32) {}
}

/// What a non-movement key does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Toggle(ToggleAction),
    Exit,
}

/// Keys polled every frame, in the order they are applied
const ACTION_KEYS: [KeyCode; 7] = [
    KeyCode::Escape,
    KeyCode::KeyQ,
    KeyCode::KeyE,
    KeyCode::KeyR,
    KeyCode::KeyZ,
    KeyCode::KeyX,
    KeyCode::KeyC,
];

/// Map a key to its render or application action
pub fn key_action(key: KeyCode) -> Option<KeyAction> {
    let action = match key {
        KeyCode::Escape => KeyAction::Exit,
        KeyCode::KeyQ => KeyAction::Toggle(ToggleAction::SsrTest),
        KeyCode::KeyE => KeyAction::Toggle(ToggleAction::Ssr),
        KeyCode::KeyR => KeyAction::Toggle(ToggleAction::Scatter),
        KeyCode::KeyZ => KeyAction::Toggle(ToggleAction::ShadowMode(ShadowMode::Hard)),
        KeyCode::KeyX => KeyAction::Toggle(ToggleAction::ShadowMode(ShadowMode::Pcf)),
        KeyCode::KeyC => KeyAction::Toggle(ToggleAction::ShadowMode(ShadowMode::Pcss)),
        _ => return None,
    };
    Some(action)
}

/// Result of processing one frame of input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub exit_requested: bool,
    /// Toggles that changed the render state this frame
    pub accepted: Vec<ToggleAction>,
    pub camera: CameraInput,
}

/// Input collected between frames
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    last_cursor: Option<(f64, f64)>,
    mouse_delta: Vec2,
    scroll_delta: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    /// Apply held keys to `state` at time `now` and drain the mouse deltas.
    ///
    /// Keys are polled rather than edge-triggered, so a held toggle key
    /// repeats once per debounce interval.
    pub fn process(&mut self, state: &mut RenderState, now: f64) -> FrameInput {
        let mut frame = FrameInput::default();

        for key in ACTION_KEYS {
            if !self.held.contains(&key) {
                continue;
            }
            match key_action(key) {
                Some(KeyAction::Exit) => frame.exit_requested = true,
                Some(KeyAction::Toggle(action)) => {
                    let before = state.clone();
                    if state.apply(action, now) && *state != before {
                        frame.accepted.push(action);
                    }
                }
                None => {}
            }
        }

        frame.camera = CameraInput {
            forward: self.is_held(KeyCode::KeyW),
            backward: self.is_held(KeyCode::KeyS),
            left: self.is_held(KeyCode::KeyA),
            right: self.is_held(KeyCode::KeyD),
            mouse_delta: std::mem::take(&mut self.mouse_delta),
            scroll_delta: std::mem::take(&mut self.scroll_delta),
        };

        frame
    }
}

impl InputSink for InputState {
    fn on_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }

    fn on_mouse_move(&mut self, x: f64, y: f64) {
        // The first position only establishes a reference point
        if let Some((last_x, last_y)) = self.last_cursor {
            self.mouse_delta += Vec2::new((x - last_x) as f32, (y - last_y) as f32);
        }
        self.last_cursor = Some((x, y));
    }

    fn on_scroll(&mut self, delta: f32) {
        self.scroll_delta += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut InputState, key: KeyCode) {
        input.on_key(key, true);
    }

    fn release(input: &mut InputState, key: KeyCode) {
        input.on_key(key, false);
    }

    #[test]
    fn test_first_cursor_event_is_suppressed() {
        let mut input = InputState::new();
        let mut state = RenderState::new();
        input.on_mouse_move(400.0, 300.0);
        assert_eq!(input.process(&mut state, 0.0).camera.mouse_delta, Vec2::ZERO);

        input.on_mouse_move(410.0, 290.0);
        input.on_mouse_move(415.0, 295.0);
        let frame = input.process(&mut state, 0.1);
        assert_eq!(frame.camera.mouse_delta, Vec2::new(15.0, -5.0));
        assert_eq!(input.process(&mut state, 0.2).camera.mouse_delta, Vec2::ZERO);
    }

    #[test]
    fn test_held_toggle_repeats_after_debounce() {
        let mut input = InputState::new();
        let mut state = RenderState::new();
        press(&mut input, KeyCode::KeyR);

        assert_eq!(input.process(&mut state, 0.0).accepted, vec![ToggleAction::Scatter]);
        assert!(input.process(&mut state, 0.2).accepted.is_empty());
        assert!(state.scatter_enabled());
        assert_eq!(input.process(&mut state, 0.5).accepted, vec![ToggleAction::Scatter]);
        assert!(!state.scatter_enabled());
    }

    #[test]
    fn test_shadow_keys_and_exit() {
        let mut input = InputState::new();
        let mut state = RenderState::new();
        press(&mut input, KeyCode::KeyZ);
        let frame = input.process(&mut state, 0.0);
        assert_eq!(state.shadow_mode(), ShadowMode::Hard);
        assert_eq!(
            frame.accepted,
            vec![ToggleAction::ShadowMode(ShadowMode::Hard)]
        );

        // Holding the key keeps the mode without reporting a change
        assert!(input.process(&mut state, 0.01).accepted.is_empty());

        release(&mut input, KeyCode::KeyZ);
        press(&mut input, KeyCode::Escape);
        assert!(input.process(&mut state, 0.02).exit_requested);
    }

    #[test]
    fn test_movement_keys_fill_camera_input() {
        let mut input = InputState::new();
        let mut state = RenderState::new();
        press(&mut input, KeyCode::KeyW);
        press(&mut input, KeyCode::KeyD);
        input.on_scroll(1.5);

        let frame = input.process(&mut state, 0.0);
        assert!(frame.camera.forward && frame.camera.right);
        assert!(!frame.camera.backward && !frame.camera.left);
        assert_eq!(frame.camera.scroll_delta, 1.5);
        assert!(frame.accepted.is_empty());
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(key_action(KeyCode::KeyQ), Some(KeyAction::Toggle(ToggleAction::SsrTest)));
        assert_eq!(key_action(KeyCode::Escape), Some(KeyAction::Exit));
        assert_eq!(key_action(KeyCode::KeyW), None);
    }
}
