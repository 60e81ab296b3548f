//! Toggle state integration tests.
//!
//! Drives [`RenderState`] directly and through [`InputState`] the way the
//! window loop does, checking the debounce contract and the SSR gate.

mod common;

use rstest::rstest;
use winit::keyboard::KeyCode;

use common::tap;
use midsummer_night::input::{InputSink, InputState};
use midsummer_night::{DebouncePolicy, RenderState, ShadowMode, ToggleAction};

const INTERVAL: f64 = 0.4;

fn state(policy: DebouncePolicy) -> RenderState {
    RenderState::with_debounce(INTERVAL, policy)
}

// ============================================================================
// SSR gate
// ============================================================================

/// `ssr_active` always equals the conjunction of the two flags, and arming
/// the test gate always turns SSR off.
#[rstest]
#[case::test_then_ssr(&[ToggleAction::SsrTest, ToggleAction::Ssr])]
#[case::ssr_then_test(&[ToggleAction::Ssr, ToggleAction::SsrTest])]
#[case::rearm(&[ToggleAction::SsrTest, ToggleAction::Ssr, ToggleAction::SsrTest, ToggleAction::SsrTest])]
#[case::mixed(&[
    ToggleAction::Scatter,
    ToggleAction::Ssr,
    ToggleAction::ShadowMode(ShadowMode::Hard),
    ToggleAction::SsrTest,
    ToggleAction::Ssr,
    ToggleAction::Ssr,
])]
fn test_ssr_gate_holds_for_sequences(
    #[case] actions: &[ToggleAction],
    #[values(DebouncePolicy::PerAction, DebouncePolicy::Shared)] policy: DebouncePolicy,
) {
    let mut state = state(policy);
    for (i, &action) in actions.iter().enumerate() {
        let was_armed = state.ssr_test_enabled();
        let accepted = state.apply(action, i as f64 * 0.5);
        assert!(accepted, "{action:?} spaced by 0.5 s must be accepted");

        assert_eq!(
            state.ssr_active(),
            state.ssr_test_enabled() && state.ssr_enabled()
        );
        if action == ToggleAction::SsrTest && !was_armed {
            assert!(!state.ssr_enabled(), "arming must force SSR off");
        }
    }
}

// ============================================================================
// Debounce
// ============================================================================

#[rstest]
#[case::ssr_test(ToggleAction::SsrTest)]
#[case::ssr(ToggleAction::Ssr)]
#[case::scatter(ToggleAction::Scatter)]
fn test_repeat_within_interval_is_rejected(
    #[case] action: ToggleAction,
    #[values(DebouncePolicy::PerAction, DebouncePolicy::Shared)] policy: DebouncePolicy,
) {
    let mut state = state(policy);
    assert!(state.apply(action, 1.0));
    let after_first = state.clone();

    assert!(!state.apply(action, 1.0 + INTERVAL * 0.5));
    assert_eq!(state, after_first);
    assert_eq!(state.last_toggle_time(), Some(1.0));

    assert!(state.apply(action, 1.0 + INTERVAL + 0.01));
}

#[rstest]
#[case::per_action(DebouncePolicy::PerAction, true)]
#[case::shared(DebouncePolicy::Shared, false)]
fn test_different_keys_within_interval(#[case] policy: DebouncePolicy, #[case] second_accepted: bool) {
    let mut state = state(policy);
    assert!(state.apply(ToggleAction::Scatter, 0.0));
    assert_eq!(state.apply(ToggleAction::Ssr, 0.1), second_accepted);
    assert_eq!(state.ssr_enabled(), second_accepted);
}

#[rstest]
#[case::per_action(DebouncePolicy::PerAction)]
#[case::shared(DebouncePolicy::Shared)]
fn test_shadow_mode_is_never_debounced(#[case] policy: DebouncePolicy) {
    let mut state = state(policy);
    assert!(state.apply(ToggleAction::Scatter, 0.0));
    for (i, mode) in ShadowMode::ALL.into_iter().enumerate() {
        assert!(state.apply(ToggleAction::ShadowMode(mode), 0.01 * i as f64));
        assert_eq!(state.shadow_mode(), mode);
    }
    assert_eq!(state.last_toggle_time(), Some(0.0));
}

#[rstest]
#[case::hard(ShadowMode::Hard)]
#[case::pcf(ShadowMode::Pcf)]
#[case::pcss(ShadowMode::Pcss)]
fn test_reselecting_shadow_mode_is_idempotent(#[case] mode: ShadowMode) {
    let mut state = RenderState::new();
    state.set_shadow_mode(mode);
    let once = state.clone();
    state.set_shadow_mode(mode);
    assert_eq!(state, once);
}

// ============================================================================
// Key scenarios
// ============================================================================

/// Q at 0.0 s and E at 0.05 s are both accepted; E again at 0.1 s is not.
#[test]
fn test_q_then_e_scenario() {
    let mut input = InputState::new();
    let mut state = RenderState::new();

    let q = tap(&mut input, &mut state, KeyCode::KeyQ, 0.0);
    assert_eq!(q.accepted, vec![ToggleAction::SsrTest]);

    let e = tap(&mut input, &mut state, KeyCode::KeyE, 0.05);
    assert_eq!(e.accepted, vec![ToggleAction::Ssr]);
    assert!(state.ssr_test_enabled());
    assert!(state.ssr_enabled());
    assert!(state.ssr_active());

    let again = tap(&mut input, &mut state, KeyCode::KeyE, 0.1);
    assert!(again.accepted.is_empty());
    assert!(state.ssr_enabled());
}

/// Z, X, C spaced beyond the interval walk through every mode once and end on PCSS.
#[test]
fn test_shadow_key_scenario() {
    let mut input = InputState::new();
    let mut state = RenderState::new();
    let mut observed = Vec::new();

    for (i, key) in [KeyCode::KeyZ, KeyCode::KeyX, KeyCode::KeyC].into_iter().enumerate() {
        let frame = tap(&mut input, &mut state, key, i as f64 * 0.5);
        assert_eq!(frame.accepted.len(), 1);
        observed.push(state.shadow_mode());
    }

    assert_eq!(observed, ShadowMode::ALL.to_vec());
    assert_eq!(state.shadow_mode(), ShadowMode::Pcss);
}

/// A held toggle key repeats once per interval.
#[test]
fn test_held_key_repeats_per_interval() {
    let mut input = InputState::new();
    let mut state = RenderState::new();
    input.on_key(KeyCode::KeyR, true);

    let accepted: usize = (0..34)
        .map(|frame| input.process(&mut state, frame as f64 * 0.03).accepted.len())
        .sum();

    // Accepted at 0.0, 0.42 and 0.84 s
    assert_eq!(accepted, 3);
    assert!(state.scatter_enabled());
}

#[test]
fn test_escape_requests_exit() {
    let mut input = InputState::new();
    let mut state = RenderState::new();
    let frame = tap(&mut input, &mut state, KeyCode::Escape, 0.0);
    assert!(frame.exit_requested);
    assert_eq!(state, RenderState::new());
}
