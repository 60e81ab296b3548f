//! Runtime render toggles
//!
//! [`RenderState`] is owned by the frame driver, mutated by input handling and
//! read by the renderer once per frame.

/// Minimum time between two accepted toggles of the same kind, in seconds
pub const DEFAULT_DEBOUNCE_INTERVAL: f64 = 0.4;

/// Shadow filtering technique
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShadowMode {
    /// Single depth comparison
    Hard = 0,
    /// Fixed-size percentage-closer filtering
    Pcf = 1,
    /// Percentage-closer soft shadows with a blocker search
    #[default]
    Pcss = 2,
}

impl ShadowMode {
    pub const ALL: [ShadowMode; 3] = [ShadowMode::Hard, ShadowMode::Pcf, ShadowMode::Pcss];

    /// Value written into shader uniforms
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Label used in status output
    pub fn name(self) -> &'static str {
        match self {
            ShadowMode::Hard => "hard shadow",
            ShadowMode::Pcf => "PCF",
            ShadowMode::Pcss => "PCSS",
        }
    }
}

impl std::fmt::Display for ShadowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How debounce timers are shared between toggle keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebouncePolicy {
    /// Every toggle action has its own timer
    #[default]
    PerAction,
    /// One timer for all toggle actions
    Shared,
}

/// A user request that changes the render state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    SsrTest,
    Ssr,
    Scatter,
    ShadowMode(ShadowMode),
}

impl ToggleAction {
    /// Timer slot for debounced actions; shadow mode selection has none
    fn timer_slot(self) -> Option<usize> {
        match self {
            ToggleAction::SsrTest => Some(0),
            ToggleAction::Ssr => Some(1),
            ToggleAction::Scatter => Some(2),
            ToggleAction::ShadowMode(_) => None,
        }
    }
}

/// Mutable toggle state read by the renderer every frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    shadow_mode: ShadowMode,
    ssr_test_enabled: bool,
    ssr_enabled: bool,
    scatter_enabled: bool,
    last_toggle_time: Option<f64>,
    action_times: [Option<f64>; 3],
    debounce_interval: f64,
    debounce_policy: DebouncePolicy,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderState {
    /// PCSS shadows, SSR test off, SSR off, scattering off
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE_INTERVAL, DebouncePolicy::default())
    }

    pub fn with_debounce(interval: f64, policy: DebouncePolicy) -> Self {
        Self {
            shadow_mode: ShadowMode::default(),
            ssr_test_enabled: false,
            ssr_enabled: false,
            scatter_enabled: false,
            last_toggle_time: None,
            action_times: [None; 3],
            debounce_interval: interval.max(0.0),
            debounce_policy: policy,
        }
    }

    pub fn shadow_mode(&self) -> ShadowMode {
        self.shadow_mode
    }

    pub fn ssr_test_enabled(&self) -> bool {
        self.ssr_test_enabled
    }

    pub fn ssr_enabled(&self) -> bool {
        self.ssr_enabled
    }

    /// Effective SSR: the test gate and the SSR flag must both be set
    pub fn ssr_active(&self) -> bool {
        self.ssr_test_enabled && self.ssr_enabled
    }

    pub fn scatter_enabled(&self) -> bool {
        self.scatter_enabled
    }

    /// Time of the most recent accepted debounced toggle
    pub fn last_toggle_time(&self) -> Option<f64> {
        self.last_toggle_time
    }

    pub fn debounce_policy(&self) -> DebouncePolicy {
        self.debounce_policy
    }

    pub fn debounce_interval(&self) -> f64 {
        self.debounce_interval
    }

    pub fn set_shadow_mode(&mut self, mode: ShadowMode) {
        self.shadow_mode = mode;
    }

    /// Flip the SSR test gate; arming it also turns SSR off
    pub fn toggle_ssr_test(&mut self) {
        self.ssr_test_enabled = !self.ssr_test_enabled;
        if self.ssr_test_enabled {
            self.ssr_enabled = false;
        }
    }

    pub fn toggle_ssr(&mut self) {
        self.ssr_enabled = !self.ssr_enabled;
    }

    pub fn toggle_scatter(&mut self) {
        self.scatter_enabled = !self.scatter_enabled;
    }

    /// Apply a key-driven action at time `now` (seconds since start).
    ///
    /// Returns whether the action was accepted. Debounced actions arriving
    /// sooner than the debounce interval after the previous accepted toggle
    /// are dropped without changing anything.
    pub fn apply(&mut self, action: ToggleAction, now: f64) -> bool {
        let Some(slot) = action.timer_slot() else {
            if let ToggleAction::ShadowMode(mode) = action {
                self.set_shadow_mode(mode);
            }
            return true;
        };

        let previous = match self.debounce_policy {
            DebouncePolicy::PerAction => self.action_times[slot],
            DebouncePolicy::Shared => self.last_toggle_time,
        };
        if let Some(previous) = previous {
            if now - previous < self.debounce_interval {
                log::trace!("Debounced {:?} at {:.3}s", action, now);
                return false;
            }
        }

        match action {
            ToggleAction::SsrTest => self.toggle_ssr_test(),
            ToggleAction::Ssr => self.toggle_ssr(),
            ToggleAction::Scatter => self.toggle_scatter(),
            ToggleAction::ShadowMode(_) => {}
        }
        self.action_times[slot] = Some(now);
        self.last_toggle_time = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = RenderState::new();
        assert_eq!(state.shadow_mode(), ShadowMode::Pcss);
        assert!(!state.ssr_test_enabled());
        assert!(!state.ssr_enabled());
        assert!(!state.ssr_active());
        assert!(!state.scatter_enabled());
        assert_eq!(state.last_toggle_time(), None);
        assert_eq!(state.debounce_policy(), DebouncePolicy::PerAction);
    }

    #[test]
    fn test_arming_ssr_test_forces_ssr_off() {
        let mut state = RenderState::new();
        state.toggle_ssr();
        assert!(state.ssr_enabled());

        state.toggle_ssr_test();
        assert!(state.ssr_test_enabled());
        assert!(!state.ssr_enabled());

        state.toggle_ssr();
        assert!(state.ssr_active());

        // Disarming leaves the SSR flag alone
        state.toggle_ssr_test();
        assert!(state.ssr_enabled());
        assert!(!state.ssr_active());
    }

    #[test]
    fn test_q_then_e_then_early_e() {
        let mut state = RenderState::new();
        assert!(state.apply(ToggleAction::SsrTest, 0.0));
        assert!(state.apply(ToggleAction::Ssr, 0.05));
        assert!(state.ssr_test_enabled());
        assert!(state.ssr_active());

        assert!(!state.apply(ToggleAction::Ssr, 0.1));
        assert!(state.ssr_active());
        assert_eq!(state.last_toggle_time(), Some(0.05));
    }

    #[test]
    fn test_repeated_press_is_dropped() {
        let mut state = RenderState::new();
        assert!(state.apply(ToggleAction::Scatter, 1.0));
        let after_first = state.clone();
        assert!(!state.apply(ToggleAction::Scatter, 1.39));
        assert_eq!(state, after_first);

        assert!(state.apply(ToggleAction::Scatter, 1.45));
        assert!(!state.scatter_enabled());
    }

    #[test]
    fn test_shared_policy_debounces_across_keys() {
        let mut state = RenderState::with_debounce(0.4, DebouncePolicy::Shared);
        assert!(state.apply(ToggleAction::SsrTest, 0.0));
        assert!(!state.apply(ToggleAction::Scatter, 0.2));
        assert!(!state.scatter_enabled());
        assert!(state.apply(ToggleAction::Scatter, 0.5));
        assert!(state.scatter_enabled());
    }

    #[test]
    fn test_shadow_mode_is_never_debounced() {
        let mut state = RenderState::new();
        assert!(state.apply(ToggleAction::Ssr, 0.0));
        assert!(state.apply(ToggleAction::ShadowMode(ShadowMode::Hard), 0.01));
        assert!(state.apply(ToggleAction::ShadowMode(ShadowMode::Pcf), 0.02));
        assert_eq!(state.shadow_mode(), ShadowMode::Pcf);
        // Shadow selection does not consume a toggle slot
        assert_eq!(state.last_toggle_time(), Some(0.0));

        assert!(state.apply(ToggleAction::ShadowMode(ShadowMode::Pcf), 0.03));
        assert_eq!(state.shadow_mode(), ShadowMode::Pcf);
    }

    #[test]
    fn test_shadow_mode_uniform_values() {
        let values: Vec<u32> = ShadowMode::ALL.iter().map(|m| m.as_u32()).collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(ShadowMode::Hard.to_string(), "hard shadow");
    }
}
