//! A Midsummer Night
//!
//! Opens a window on the built-in night scene and renders it until Esc is
//! pressed, the window is closed or `--max-frames` is reached.

use std::sync::Arc;

use clap::Parser;
use winit::keyboard::KeyCode;
use winit::window::Window as WinitWindow;

use midsummer_night::args::Args;
use midsummer_night::input::{InputSink, InputState};
use midsummer_night::scene::{Camera, CameraController, FreeFlyController, Scene};
use midsummer_night::status::StatusReporter;
use midsummer_night::window::{self, AppError, FrameHandler};
use midsummer_night::{FrameClock, RenderState, Renderer, RendererConfig, WgpuBackend};

/// Frame driver: owns the toggle state, the camera and the renderer
struct App {
    input: InputState,
    state: RenderState,
    camera: Camera,
    controller: FreeFlyController,
    clock: FrameClock,
    status: StatusReporter,
    renderer: Renderer<WgpuBackend>,
    frames: u64,
    max_frames: Option<u64>,
    pending_resize: Option<(u32, u32)>,
}

impl App {
    fn new(window: Arc<WinitWindow>, config: RendererConfig) -> Result<Self, AppError> {
        let backend = WgpuBackend::new(window, config.vsync)?;
        let state = config.render_state();
        let max_frames = config.max_frames;
        let renderer = Renderer::new(backend, config, Scene::night_garden())?;
        let controller = FreeFlyController::new();
        log::debug!("Camera controller: {}", controller.name());

        Ok(Self {
            input: InputState::new(),
            state,
            camera: Camera::default(),
            controller,
            clock: FrameClock::new(),
            status: StatusReporter::new(),
            renderer,
            frames: 0,
            max_frames,
            pending_resize: None,
        })
    }
}

impl InputSink for App {
    fn on_key(&mut self, key: KeyCode, pressed: bool) {
        self.input.on_key(key, pressed);
    }

    fn on_mouse_move(&mut self, x: f64, y: f64) {
        self.input.on_mouse_move(x, y);
    }

    fn on_scroll(&mut self, delta: f32) {
        self.input.on_scroll(delta);
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width, height));
    }
}

impl FrameHandler for App {
    fn frame(&mut self) -> Result<bool, AppError> {
        if let Some((width, height)) = self.pending_resize.take() {
            self.renderer.resize(width, height)?;
        }

        let timing = self.clock.tick();
        let input = self.input.process(&mut self.state, timing.elapsed_time);
        if input.exit_requested {
            log::info!("Exit requested");
            return Ok(false);
        }
        for action in &input.accepted {
            log::debug!("Accepted {:?}", action);
        }

        self.controller
            .update(&mut self.camera, &input.camera, timing.delta_time);
        let view = self.camera.view(self.renderer.aspect_ratio());
        let report = self.renderer.render(&view, &self.state, timing)?;
        if report.frame_skipped {
            return Ok(true);
        }
        log::trace!("Frame {}: {}", self.frames, report.executed_passes.join(", "));

        if let Some(snapshot) = self.status.frame(&self.state, timing.elapsed_time) {
            log::info!("\n{}", snapshot);
        }

        self.frames += 1;
        if self.max_frames.is_some_and(|max| self.frames >= max) {
            log::info!("Rendered {} frames, exiting", self.frames);
            return Ok(false);
        }
        Ok(true)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config: RendererConfig = Args::parse().into();
    log::info!("{}", config.title);
    for line in config.banner().lines() {
        log::info!("{}", line);
    }

    let app_config = config.clone();
    if let Err(err) = window::run(&config, move |window| App::new(window, app_config)) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
