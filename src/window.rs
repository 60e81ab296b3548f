//! Window management using winit

use std::sync::Arc;

use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window as WinitWindow, WindowBuilder},
};

use crate::backend::traits::BackendError;
use crate::input::InputSink;
use crate::renderer::RenderError;
use crate::RendererConfig;

/// Failures that end the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to run the event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Application driven by [`run`]
pub trait FrameHandler: InputSink {
    /// Advance and draw one frame. Returning `false` closes the window.
    fn frame(&mut self) -> Result<bool, AppError>;
}

/// Scroll amount in lines
fn scroll_lines(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => (position.y / 40.0) as f32,
    }
}

/// Open the window, build the handler for it and run until it asks to stop
pub fn run<H, F>(config: &RendererConfig, create: F) -> Result<(), AppError>
where
    H: FrameHandler,
    F: FnOnce(Arc<WinitWindow>) -> Result<H, AppError>,
{
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)?,
    );

    if let Err(err) = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
    {
        log::warn!("Cursor grab unavailable: {}", err);
    }
    window.set_cursor_visible(false);

    let mut handler = create(Arc::clone(&window))?;
    let mut failure: Option<AppError> = None;
    // Mouse motion is relative; the handler sees an unbounded virtual cursor
    let mut cursor = (0.0_f64, 0.0_f64);

    event_loop.run(|event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => handler.on_resize(size.width, size.height),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(key),
                            state,
                            ..
                        },
                    ..
                } => handler.on_key(key, state == ElementState::Pressed),
                WindowEvent::MouseWheel { delta, .. } => handler.on_scroll(scroll_lines(delta)),
                _ => {}
            },
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                cursor.0 += delta.0;
                cursor.1 += delta.1;
                handler.on_mouse_move(cursor.0, cursor.1);
            }
            Event::AboutToWait => match handler.frame() {
                Ok(true) => window.request_redraw(),
                Ok(false) => elwt.exit(),
                Err(err) => {
                    failure = Some(err);
                    elwt.exit();
                }
            },
            _ => {}
        }
    })?;

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn test_scroll_lines() {
        assert_eq!(scroll_lines(MouseScrollDelta::LineDelta(0.0, -2.0)), -2.0);
        assert_eq!(
            scroll_lines(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 80.0))),
            2.0
        );
    }
}
