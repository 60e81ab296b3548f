//! Full-frame integration tests on the recording backend.
//!
//! Every test builds the real renderer with the built-in scene on
//! [`DummyBackend`] and inspects the commands a frame submitted.
//!
//! # Test Categories
//!
//! - **Pass Selection**: which passes run for each toggle combination
//! - **Compositor Inputs**: presence flags for reflection and scattering
//! - **Surface Changes**: resize and lost surfaces

mod common;

use rstest::rstest;

use common::{dummy_renderer, pass_shape, render_at, HEIGHT, WIDTH};
use midsummer_night::backend::dummy::RecordedCommand;
use midsummer_night::pipeline::{CompositeParams, FrameUniform};
use midsummer_night::{RenderState, RendererConfig, ShadowMode, ToggleAction};

fn state_with(ssr_test: bool, ssr: bool, scatter: bool) -> RenderState {
    let mut state = RenderState::new();
    if ssr_test {
        state.toggle_ssr_test();
    }
    if ssr {
        state.toggle_ssr();
    }
    if scatter {
        state.toggle_scatter();
    }
    state
}

fn composite_params(data: &[u8]) -> CompositeParams {
    bytemuck::pod_read_unaligned(data)
}

// ============================================================================
// Pass Selection
// ============================================================================

#[rstest]
#[case::defaults(false, false, false, &[])]
#[case::ssr_without_test(false, true, false, &[])]
#[case::test_without_ssr(true, false, false, &[])]
#[case::ssr_active(true, true, false, &["SSR Pass"])]
#[case::scatter(false, false, true, &["Scatter Pass"])]
#[case::everything(true, true, true, &["SSR Pass", "Scatter Pass"])]
fn test_passes_follow_render_state(
    #[case] ssr_test: bool,
    #[case] ssr: bool,
    #[case] scatter: bool,
    #[case] optional: &[&str],
) {
    let mut renderer = dummy_renderer(RendererConfig::default());
    let report = render_at(&mut renderer, &state_with(ssr_test, ssr, scatter), 0.0);

    let mut expected = vec!["Shadow Pass", "Geometry Pass", "Skybox Pass"];
    expected.extend_from_slice(optional);
    expected.push("Composite Pass");

    assert_eq!(report.executed_passes, expected);
    assert_eq!(renderer.backend().render_pass_labels(), expected);
    assert_eq!(report.reflection_present, optional.contains(&"SSR Pass"));
    assert_eq!(report.scatter_present, optional.contains(&"Scatter Pass"));
}

#[test]
fn test_shadow_map_is_drawn_before_it_is_sampled() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    render_at(&mut renderer, &RenderState::new(), 0.0);

    let labels = renderer.backend().render_pass_labels();
    let shadow = labels.iter().position(|l| *l == "Shadow Pass").unwrap();
    let geometry = labels.iter().position(|l| *l == "Geometry Pass").unwrap();
    assert!(shadow < geometry);

    // Group 2 of the geometry pass is the shadow map binding
    let commands = renderer.backend().pass_commands("Geometry Pass");
    assert!(commands
        .iter()
        .any(|c| matches!(c, RecordedCommand::SetBindGroup { index: 2, .. })));
}

#[rstest]
#[case::hard(ShadowMode::Hard)]
#[case::pcf(ShadowMode::Pcf)]
#[case::pcss(ShadowMode::Pcss)]
fn test_shadow_mode_reaches_the_frame_uniform(#[case] mode: ShadowMode) {
    let mut renderer = dummy_renderer(RendererConfig::default());
    let textures = renderer.backend().live_texture_count();

    let mut state = RenderState::new();
    state.apply(ToggleAction::ShadowMode(mode), 0.0);
    render_at(&mut renderer, &state, 0.0);

    let writes = renderer.backend().buffer_writes("Frame Uniforms");
    let uniform: FrameUniform = bytemuck::pod_read_unaligned(writes[0]);
    assert_eq!(uniform.settings.x, mode.as_u32());
    assert_eq!(renderer.backend().live_texture_count(), textures);
}

// ============================================================================
// Compositor Inputs
// ============================================================================

/// Turning scattering off leaves the frame as if the pass had never been added.
#[test]
fn test_disabled_scatter_matches_graph_without_scatter() {
    let state = state_with(true, true, false);

    let mut with_pass = dummy_renderer(RendererConfig::default());
    let mut without_pass = dummy_renderer(RendererConfig {
        include_scatter_pass: false,
        ..Default::default()
    });
    let a = render_at(&mut with_pass, &state, 1.25);
    let b = render_at(&mut without_pass, &state, 1.25);

    assert_eq!(a.executed_passes, b.executed_passes);
    assert_eq!(a.scatter_present, b.scatter_present);

    let (a, b) = (with_pass.backend(), without_pass.backend());
    assert_eq!(a.render_pass_labels(), b.render_pass_labels());
    assert_eq!(pass_shape(a, "Composite Pass"), pass_shape(b, "Composite Pass"));
    assert_eq!(a.buffer_writes("Composite Params"), b.buffer_writes("Composite Params"));
    assert_eq!(a.buffer_writes("Frame Uniforms"), b.buffer_writes("Frame Uniforms"));
}

#[rstest]
#[case::nothing(false, false)]
#[case::reflection(true, false)]
#[case::scatter(false, true)]
#[case::both(true, true)]
fn test_presence_flags_track_executed_passes(#[case] ssr: bool, #[case] scatter: bool) {
    let mut renderer = dummy_renderer(RendererConfig::default());
    render_at(&mut renderer, &state_with(ssr, ssr, scatter), 0.0);

    let writes = renderer.backend().buffer_writes("Composite Params");
    assert_eq!(writes.len(), 1);
    let params = composite_params(writes[0]);
    assert_eq!(params.reflection_present(), ssr);
    assert_eq!(params.scatter_present(), scatter);
}

#[test]
fn test_fallback_input_is_transparent_black() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    assert_eq!(
        renderer.backend().texture_writes("Composite Fallback"),
        vec![&[0u8; 8][..]]
    );

    renderer.resize(WIDTH * 2, HEIGHT * 2).unwrap();
    assert_eq!(renderer.backend().texture_writes("Composite Fallback").len(), 1);
}

/// A pass that ran but found nothing still counts as present.
#[test]
fn test_executed_ssr_clears_its_target() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    render_at(&mut renderer, &state_with(true, true, false), 0.0);

    let begin = renderer
        .backend()
        .commands()
        .iter()
        .find_map(|c| match c {
            RecordedCommand::BeginRenderPass {
                label: Some(label),
                color_attachments,
                ..
            } if label == "SSR Pass" => Some(color_attachments.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        begin,
        vec![midsummer_night::backend::LoadOp::Clear([0.0; 4])]
    );
}

// ============================================================================
// Surface Changes
// ============================================================================

#[test]
fn test_resize_reallocates_without_leaking() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    render_at(&mut renderer, &RenderState::new(), 0.0);
    let textures = renderer.backend().live_texture_count();

    renderer.resize(WIDTH * 2, HEIGHT * 2).unwrap();
    assert_eq!(renderer.dimensions(), (WIDTH * 2, HEIGHT * 2));
    assert_eq!(renderer.backend().live_texture_count(), textures);

    renderer.backend_mut().clear_commands();
    render_at(&mut renderer, &RenderState::new(), 0.1);
    assert!(renderer
        .backend()
        .pass_commands("Composite Pass")
        .contains(&&RecordedCommand::SetViewport {
            width: (WIDTH * 2) as f32,
            height: (HEIGHT * 2) as f32,
        }));
}

#[test]
fn test_zero_sized_resize_is_ignored() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    renderer.resize(0, 0).unwrap();
    assert_eq!(renderer.dimensions(), (WIDTH, HEIGHT));
}

#[test]
fn test_lost_surface_skips_exactly_one_frame() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    renderer.backend_mut().lose_surface(1);

    let dropped = render_at(&mut renderer, &RenderState::new(), 0.0);
    assert!(dropped.frame_skipped);
    assert!(dropped.executed_passes.is_empty());

    let next = render_at(&mut renderer, &RenderState::new(), 0.016);
    assert!(!next.frame_skipped);
    assert_eq!(renderer.backend().render_pass_labels().len(), 4);
}

#[test]
fn test_timed_out_surface_drops_the_frame_without_reconfiguring() {
    let mut renderer = dummy_renderer(RendererConfig::default());
    renderer.backend_mut().time_out_surface(1);
    let configurations = renderer.backend().surface_configurations();

    let dropped = render_at(&mut renderer, &RenderState::new(), 0.0);
    assert!(dropped.frame_skipped);
    assert!(renderer.backend().render_pass_labels().is_empty());
    assert_eq!(renderer.backend().surface_configurations(), configurations);

    let next = render_at(&mut renderer, &RenderState::new(), 0.016);
    assert!(!next.frame_skipped);
    assert_eq!(next.executed_passes.len(), 4);
}
