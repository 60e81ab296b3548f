//! Command line arguments.
//!
//! Uses clap for CLI parsing with:
//! - Help text (`--help`) that also lists the runtime controls
//! - Validation and clear error messages
//! - Conversion into [`RendererConfig`]

use clap::Parser;

use crate::state::DebouncePolicy;
use crate::RendererConfig;

/// Debounce policy selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliDebounce {
    /// Each toggle key has its own timer.
    #[default]
    #[value(name = "per-action")]
    PerAction,
    /// One timer shared by every toggle key.
    Shared,
}

impl From<CliDebounce> for DebouncePolicy {
    fn from(cli: CliDebounce) -> Self {
        match cli {
            CliDebounce::PerAction => DebouncePolicy::PerAction,
            CliDebounce::Shared => DebouncePolicy::Shared,
        }
    }
}

/// A Midsummer Night arguments.
#[derive(Parser, Debug)]
#[command(
    name = "midsummer-night",
    about = "Night scene renderer with switchable shadows, reflections and volumetric light",
    long_about = "Renders a moonlit garden with switchable shadow filtering, \
        screen-space reflections and volumetric light scattering.\n\n\
        CONTROLS:\n  \
          W/A/S/D         move the camera\n  \
          mouse / wheel   look around / zoom\n  \
          Z / X / C       hard shadows / PCF / PCSS\n  \
          Q               arm the SSR test (turns SSR off)\n  \
          E               toggle SSR\n  \
          R               toggle volumetric light\n  \
          Esc             quit\n\n\
        EXAMPLES:\n  \
          # Smoke test: render 120 frames and exit\n  \
          midsummer-night --max-frames 120\n\n  \
          # Cheaper settings\n  \
          midsummer-night --shadow-map-size 1024 --ssr-steps 32 --scatter-steps 16",
    version
)]
pub struct Args {
    /// Initial window width in pixels.
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Initial window height in pixels.
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Disable vertical sync (may cause tearing).
    #[arg(long)]
    pub no_vsync: bool,

    /// Shadow map edge length in texels.
    #[arg(long, default_value = "2048", value_parser = clap::value_parser!(u32).range(64..=8192))]
    pub shadow_map_size: u32,

    /// PCF kernel width; even values are rounded up to the next odd one.
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=15))]
    pub shadow_kernel: u32,

    /// Maximum SSR ray-march steps.
    #[arg(long, default_value = "64", value_parser = clap::value_parser!(u32).range(1..=512))]
    pub ssr_steps: u32,

    /// Volumetric scattering ray-march steps.
    #[arg(long, default_value = "32", value_parser = clap::value_parser!(u32).range(1..=256))]
    pub scatter_steps: u32,

    /// Exposure applied before tonemapping.
    #[arg(long, default_value = "1.0")]
    pub exposure: f32,

    /// Seconds a toggle key is ignored after it was accepted.
    #[arg(long, default_value = "0.4")]
    pub debounce: f64,

    /// Whether toggle keys share one debounce timer.
    #[arg(long, default_value = "per-action", value_enum)]
    pub debounce_policy: CliDebounce,

    /// Exit after rendering N frames (useful for testing).
    #[arg(long)]
    pub max_frames: Option<u64>,
}

impl From<Args> for RendererConfig {
    fn from(args: Args) -> Self {
        let shadow_kernel = args.shadow_kernel | 1;
        if shadow_kernel != args.shadow_kernel {
            log::warn!(
                "--shadow-kernel {} is even, using {}",
                args.shadow_kernel,
                shadow_kernel
            );
        }

        Self {
            width: args.width.max(1),
            height: args.height.max(1),
            vsync: !args.no_vsync,
            shadow_map_size: args.shadow_map_size,
            shadow_kernel,
            ssr_steps: args.ssr_steps,
            scatter_steps: args.scatter_steps,
            exposure: args.exposure.max(0.0),
            debounce_interval: args.debounce.max(0.0),
            debounce_policy: args.debounce_policy.into(),
            max_frames: args.max_frames,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let config: RendererConfig = Args::parse_from(["midsummer-night"]).into();
        let expected = RendererConfig::default();
        assert_eq!(config.width, expected.width);
        assert_eq!(config.shadow_kernel, expected.shadow_kernel);
        assert_eq!(config.ssr_steps, expected.ssr_steps);
        assert_eq!(config.scatter_steps, expected.scatter_steps);
        assert_eq!(config.debounce_interval, expected.debounce_interval);
        assert!(config.vsync);
    }

    #[test]
    fn test_even_kernel_is_made_odd() {
        let config: RendererConfig =
            Args::parse_from(["midsummer-night", "--shadow-kernel", "4"]).into();
        assert_eq!(config.shadow_kernel, 5);
    }

    #[test]
    fn test_shared_policy_and_frame_limit() {
        let config: RendererConfig = Args::parse_from([
            "midsummer-night",
            "--debounce-policy",
            "shared",
            "--max-frames",
            "10",
            "--no-vsync",
        ])
        .into();
        assert_eq!(config.debounce_policy, DebouncePolicy::Shared);
        assert_eq!(config.max_frames, Some(10));
        assert!(!config.vsync);
    }

    #[test]
    fn test_out_of_range_steps_are_rejected() {
        assert!(Args::try_parse_from(["midsummer-night", "--ssr-steps", "0"]).is_err());
    }
}
