use anyhow::{Context, Result};
use alphaplay::{
    AlphaChannel, AutoplayPolicy, FillMode, GpuPowerPreference, LayoutSpec, PlayerConfig,
    RegionOrder, VideoLayout,
};
use playerconfig::PlayerProfile;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::{export, window};

pub fn run(cli: Cli) -> Result<()> {
    let profile = match cli.config.as_deref() {
        Some(path) => {
            let profile = PlayerProfile::from_path(path)
                .with_context(|| format!("failed to load profile {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded player profile");
            Some(profile)
        }
        None => None,
    };
    let config = resolve_config(&cli, profile.as_ref());
    tracing::debug!(?config, "resolved player configuration");

    match cli.export_frame.as_deref() {
        Some(output) => export::export_frame(config, output, cli.at),
        None => {
            if config.src.is_none() {
                tracing::info!("no media source given; opening an empty window");
            }
            window::run_window(config)
        }
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Layers the command line over the profile over the built-in defaults.
pub fn resolve_config(cli: &Cli, profile: Option<&PlayerProfile>) -> PlayerConfig {
    let mut config = PlayerConfig::default();

    if let Some(profile) = profile {
        apply_profile(&mut config, profile);
    }

    if let Some(src) = &cli.src {
        config.src = Some(src.clone());
    }
    if let Some(layout) = cli.layout {
        config.layout.layout = layout;
    }
    if let Some(split) = cli.split {
        config.layout = config.layout.with_split(split);
    }
    if cli.alpha_first {
        config.layout.order = RegionOrder::AlphaFirst;
    }
    if let Some(channel) = cli.alpha_channel {
        config.layout.alpha_channel = channel;
    }
    if let Some(fill) = cli.fill {
        config.fill_mode = fill;
    }
    if let Some((width, height)) = cli.size {
        config.width = width;
        config.height = height;
    }
    // Boolean flags can only switch behaviour on.
    config.autoplay |= cli.autoplay;
    config.looping |= cli.looping;
    config.muted |= cli.muted;
    if let Some(fps) = cli.fps {
        config.sequence_fps = fps;
    }

    config
}

fn apply_profile(config: &mut PlayerConfig, profile: &PlayerProfile) {
    use playerconfig as pc;

    if let Some(src) = &profile.src {
        config.src = Some(src.clone());
    }
    let mut layout = LayoutSpec::new(match profile.layout {
        Some(pc::Layout::TopBottom) => VideoLayout::TopBottom,
        Some(pc::Layout::SideBySide) | None => VideoLayout::SideBySide,
    });
    if let Some(split) = profile.split {
        layout = layout.with_split(split);
    }
    if let Some(order) = profile.order {
        layout.order = match order {
            pc::Order::ColorFirst => RegionOrder::ColorFirst,
            pc::Order::AlphaFirst => RegionOrder::AlphaFirst,
        };
    }
    if let Some(channel) = profile.alpha_channel {
        layout.alpha_channel = match channel {
            pc::AlphaChannel::Red => AlphaChannel::Red,
            pc::AlphaChannel::Green => AlphaChannel::Green,
            pc::AlphaChannel::Blue => AlphaChannel::Blue,
            pc::AlphaChannel::Luma => AlphaChannel::Luma,
        };
    }
    config.layout = layout;

    if let Some(fill) = profile.fill {
        config.fill_mode = match fill {
            pc::Fill::Contain => FillMode::Contain,
            pc::Fill::Cover => FillMode::Cover,
            pc::Fill::Stretch => FillMode::Stretch,
        };
    }
    if let Some(autoplay) = profile.autoplay {
        config.autoplay = autoplay;
    }
    if let Some(looping) = profile.looping {
        config.looping = looping;
    }
    if let Some(muted) = profile.muted {
        config.muted = muted;
    }
    if let Some(policy) = profile.autoplay_policy {
        config.autoplay_policy = match policy {
            pc::AutoplayPolicy::Allowed => AutoplayPolicy::Allowed,
            pc::AutoplayPolicy::MutedOnly => AutoplayPolicy::MutedOnly,
            pc::AutoplayPolicy::Blocked => AutoplayPolicy::Blocked,
        };
    }
    if let Some(interval) = profile.timeupdate_interval {
        config.timeupdate_interval = interval;
    }
    if let Some([width, height]) = profile.size {
        config.width = width;
        config.height = height;
    }
    if let Some(clear_color) = profile.clear_color {
        config.clear_color = clear_color;
    }
    if let Some(fps) = profile.sequence_fps {
        config.sequence_fps = fps;
    }
    if let Some(shader) = &profile.fragment_shader {
        config.fragment_shader = Some(shader.clone());
    }
    if let Some(power) = profile.gpu_power {
        config.gpu_power = match power {
            pc::GpuPower::Low => GpuPowerPreference::Low,
            pc::GpuPower::High => GpuPowerPreference::High,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::*;

    const PROFILE: &str = r#"
version = 1
src = "orb.gif"
layout = "top-bottom"
split = 0.4
order = "alpha-first"
alpha_channel = "green"
fill = "cover"
autoplay = true
muted = true
autoplay_policy = "allowed"
timeupdate_interval = "100ms"
size = [320, 200]
sequence_fps = 12
"#;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["alphaplay"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_without_profile_or_flags() {
        let config = resolve_config(&cli(&[]), None);
        assert_eq!(config, PlayerConfig::default());
    }

    #[test]
    fn profile_values_are_applied() {
        let profile = PlayerProfile::from_toml_str(PROFILE).unwrap();
        let config = resolve_config(&cli(&[]), Some(&profile));
        assert_eq!(config.src.as_deref(), Some("orb.gif"));
        assert_eq!(config.layout.layout, VideoLayout::TopBottom);
        assert!((config.layout.split - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.layout.order, RegionOrder::AlphaFirst);
        assert_eq!(config.layout.alpha_channel, AlphaChannel::Green);
        assert_eq!(config.fill_mode, FillMode::Cover);
        assert!(config.autoplay && config.muted && !config.looping);
        assert_eq!(config.autoplay_policy, AutoplayPolicy::Allowed);
        assert_eq!(config.timeupdate_interval, Duration::from_millis(100));
        assert_eq!((config.width, config.height), (320, 200));
        assert_eq!(config.sequence_fps, 12.0);
    }

    #[test]
    fn flags_override_the_profile() {
        let profile = PlayerProfile::from_toml_str(PROFILE).unwrap();
        let config = resolve_config(
            &cli(&[
                "other.gif",
                "--layout",
                "side-by-side",
                "--alpha-channel",
                "luma",
                "--size",
                "64x32",
                "--loop",
                "--fps",
                "5",
            ]),
            Some(&profile),
        );
        assert_eq!(config.src.as_deref(), Some("other.gif"));
        assert_eq!(config.layout.layout, VideoLayout::SideBySide);
        assert_eq!(config.layout.alpha_channel, AlphaChannel::Luma);
        assert_eq!(config.layout.order, RegionOrder::AlphaFirst);
        assert_eq!((config.width, config.height), (64, 32));
        assert!(config.looping);
        assert_eq!(config.sequence_fps, 5.0);
    }
}
