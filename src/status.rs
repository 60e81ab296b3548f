//! Console status lines: frame rate and the effective render toggles

use crate::state::{RenderState, ShadowMode};
use std::fmt;

/// Seconds between periodic status reports
pub const STATUS_INTERVAL: f64 = 1.0;

/// What gets printed in one status report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    pub fps: u32,
    pub shadow_mode: ShadowMode,
    pub ssr_on: bool,
    pub scatter_on: bool,
}

impl StatusSnapshot {
    fn same_toggles(&self, other: &StatusSnapshot) -> bool {
        self.shadow_mode == other.shadow_mode
            && self.ssr_on == other.ssr_on
            && self.scatter_on == other.scatter_on
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FPS : {}", self.fps)?;
        writeln!(f, "shadow mode : {}", self.shadow_mode)?;
        writeln!(f, "SSR {}", on_off(self.ssr_on))?;
        write!(f, "volumetric light {}", on_off(self.scatter_on))
    }
}

/// Decides when a status report is due
#[derive(Debug, Default)]
pub struct StatusReporter {
    window_start: Option<f64>,
    frames_in_window: u32,
    fps: u32,
    last: Option<StatusSnapshot>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a frame at time `now`.
    ///
    /// Returns a snapshot once per [`STATUS_INTERVAL`], on the first frame, or
    /// right away when the effective toggles differ from the last report.
    pub fn frame(&mut self, state: &RenderState, now: f64) -> Option<StatusSnapshot> {
        self.frames_in_window += 1;
        let window_start = *self.window_start.get_or_insert(now);

        let mut due = self.last.is_none();
        let window = now - window_start;
        if window >= STATUS_INTERVAL {
            self.fps = (self.frames_in_window as f64 / window).round() as u32;
            self.frames_in_window = 0;
            self.window_start = Some(now);
            due = true;
        }

        let snapshot = StatusSnapshot {
            fps: self.fps,
            shadow_mode: state.shadow_mode(),
            ssr_on: state.ssr_active(),
            scatter_on: state.scatter_enabled(),
        };
        if let Some(last) = &self.last {
            due |= !last.same_toggles(&snapshot);
        }

        if due {
            self.last = Some(snapshot);
            Some(snapshot)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ToggleAction;

    #[test]
    fn test_display_lines() {
        let snapshot = StatusSnapshot {
            fps: 60,
            shadow_mode: ShadowMode::Pcf,
            ssr_on: true,
            scatter_on: false,
        };
        assert_eq!(
            snapshot.to_string(),
            "FPS : 60\nshadow mode : PCF\nSSR ON\nvolumetric light OFF"
        );
    }

    #[test]
    fn test_reports_once_per_second() {
        let state = RenderState::new();
        let mut reporter = StatusReporter::new();
        assert!(reporter.frame(&state, 0.0).is_some());

        let mut reports = 0;
        for i in 1..=120 {
            if reporter.frame(&state, i as f64 / 60.0).is_some() {
                reports += 1;
            }
        }
        assert_eq!(reports, 2);
    }

    #[test]
    fn test_reports_immediately_on_toggle() {
        let mut state = RenderState::new();
        let mut reporter = StatusReporter::new();
        reporter.frame(&state, 0.0);
        assert!(reporter.frame(&state, 0.1).is_none());

        state.apply(ToggleAction::Scatter, 0.2);
        let snapshot = reporter.frame(&state, 0.2).unwrap();
        assert!(snapshot.scatter_on);
        assert!(reporter.frame(&state, 0.3).is_none());
    }

    #[test]
    fn test_ssr_shows_effective_state() {
        let mut state = RenderState::new();
        let mut reporter = StatusReporter::new();
        state.toggle_ssr();
        let snapshot = reporter.frame(&state, 0.0).unwrap();
        assert!(!snapshot.ssr_on);
    }
}
