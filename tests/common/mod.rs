//! Shared helpers for the integration tests.

#![allow(dead_code)]

use midsummer_night::backend::dummy::{DummyBackend, RecordedCommand};
use midsummer_night::input::{FrameInput, InputSink, InputState};
use midsummer_night::scene::{Camera, Scene};
use midsummer_night::{FrameReport, FrameTiming, RenderState, Renderer, RendererConfig};
use winit::keyboard::KeyCode;

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 180;

/// Renderer on the recording backend with the built-in scene
pub fn dummy_renderer(config: RendererConfig) -> Renderer<DummyBackend> {
    Renderer::new(
        DummyBackend::new(WIDTH, HEIGHT),
        config,
        Scene::night_garden(),
    )
    .expect("renderer on the dummy backend")
}

/// Render one frame at `elapsed` seconds from the default camera
pub fn render_at(
    renderer: &mut Renderer<DummyBackend>,
    state: &RenderState,
    elapsed: f64,
) -> FrameReport {
    let view = Camera::default().view(renderer.aspect_ratio());
    let timing = FrameTiming {
        delta_time: 1.0 / 60.0,
        elapsed_time: elapsed,
    };
    renderer
        .render(&view, state, timing)
        .expect("frame on the dummy backend")
}

/// Press and release `key` with one frame processed in between
pub fn tap(input: &mut InputState, state: &mut RenderState, key: KeyCode, now: f64) -> FrameInput {
    input.on_key(key, true);
    let frame = input.process(state, now);
    input.on_key(key, false);
    frame
}

/// Commands of a pass with resource handles stripped out
pub fn pass_shape(backend: &DummyBackend, label: &str) -> Vec<String> {
    backend
        .pass_commands(label)
        .into_iter()
        .map(|cmd| match cmd {
            RecordedCommand::SetPipeline(_) => "SetPipeline".to_string(),
            RecordedCommand::SetBindGroup { index, .. } => format!("SetBindGroup({index})"),
            RecordedCommand::SetVertexBuffer { slot, .. } => format!("SetVertexBuffer({slot})"),
            RecordedCommand::SetIndexBuffer { .. } => "SetIndexBuffer".to_string(),
            RecordedCommand::WriteBuffer { data, .. } => format!("WriteBuffer({} bytes)", data.len()),
            other => format!("{other:?}"),
        })
        .collect()
}
