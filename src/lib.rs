//! A Midsummer Night - a render graph-based night scene renderer
//!
//! The scene is lit by a single moon light and drawn through a fixed graph of
//! passes whose variants can be switched while running.
//!
//! # Features
//! - Render graph with validated read/write declarations and per-frame pass skipping
//! - Shadow mapping with hard, PCF and PCSS filtering
//! - Screen-space reflections
//! - Volumetric light scattering
//! - Entity Component System (ECS) based scene management using Bevy ECS
//! - A recording backend so the whole frame can run without a GPU

pub mod args;
pub mod backend;
pub mod input;
pub mod pipeline;
pub mod render_graph;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod state;
pub mod status;
pub mod timing;
pub mod window;

// Re-export Bevy ECS prelude for users
pub use bevy_ecs::prelude::*;

pub use renderer::{FrameReport, RenderError, Renderer};
pub use state::{DebouncePolicy, RenderState, ShadowMode, ToggleAction};
pub use timing::{FrameClock, FrameTiming};
pub use window::AppError;

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

/// Configuration for the window, the renderer and the toggle state
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Edge length of the square shadow map in texels
    pub shadow_map_size: u32,
    /// PCF kernel width; also the PCSS blocker search width
    pub shadow_kernel: u32,
    /// Maximum ray-march steps for screen-space reflections
    pub ssr_steps: u32,
    /// Ray-march steps for volumetric scattering
    pub scatter_steps: u32,
    /// Exposure applied before tonemapping
    pub exposure: f32,
    /// Minimum seconds between two accepted toggles
    pub debounce_interval: f64,
    pub debounce_policy: DebouncePolicy,
    /// Build the graph with the SSR pass
    pub include_ssr_pass: bool,
    /// Build the graph with the scatter pass
    pub include_scatter_pass: bool,
    /// Exit after this many frames
    pub max_frames: Option<u64>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "A Midsummer Night".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            shadow_map_size: 2048,
            shadow_kernel: 5,
            ssr_steps: 64,
            scatter_steps: 32,
            exposure: 1.0,
            debounce_interval: state::DEFAULT_DEBOUNCE_INTERVAL,
            debounce_policy: DebouncePolicy::PerAction,
            include_ssr_pass: true,
            include_scatter_pass: true,
            max_frames: None,
        }
    }
}

impl RendererConfig {
    /// Fresh toggle state using this configuration's debounce settings
    pub fn render_state(&self) -> RenderState {
        RenderState::with_debounce(self.debounce_interval, self.debounce_policy)
    }

    /// Startup banner with the sample budgets
    pub fn banner(&self) -> String {
        format!(
            "shadows samples = {}\nSSR samples = {}\nscatter samples = {}",
            self.shadow_kernel * self.shadow_kernel,
            self.ssr_steps,
            self.scatter_steps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.title, "A Midsummer Night");
        assert_eq!(config.shadow_kernel % 2, 1);
        assert_eq!(config.debounce_policy, DebouncePolicy::PerAction);
    }

    #[test]
    fn test_banner_lists_sample_budgets() {
        let config = RendererConfig {
            shadow_kernel: 3,
            ssr_steps: 16,
            scatter_steps: 8,
            ..Default::default()
        };
        assert_eq!(
            config.banner(),
            "shadows samples = 9\nSSR samples = 16\nscatter samples = 8"
        );
    }

    #[test]
    fn test_render_state_uses_debounce_settings() {
        let config = RendererConfig {
            debounce_interval: 1.0,
            debounce_policy: DebouncePolicy::Shared,
            ..Default::default()
        };
        let state = config.render_state();
        assert_eq!(state.debounce_interval(), 1.0);
        assert_eq!(state.debounce_policy(), DebouncePolicy::Shared);
        assert_eq!(state.shadow_mode(), ShadowMode::Pcss);
    }
}
