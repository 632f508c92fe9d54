//! TOML player profiles.
//!
//! A profile carries the same knobs as the `alphaplay` command line. Every
//! field is optional so the CLI can layer its flags on top; `version` is the
//! only required key.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    SideBySide,
    TopBottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Order {
    ColorFirst,
    AlphaFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaChannel {
    Red,
    Green,
    Blue,
    Luma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    Contain,
    Cover,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoplayPolicy {
    Allowed,
    MutedOnly,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPower {
    Low,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerProfile {
    pub version: u32,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub split: Option<f32>,
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub alpha_channel: Option<AlphaChannel>,
    #[serde(default)]
    pub fill: Option<Fill>,
    #[serde(default)]
    pub autoplay: Option<bool>,
    #[serde(default, rename = "loop")]
    pub looping: Option<bool>,
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default)]
    pub autoplay_policy: Option<AutoplayPolicy>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub timeupdate_interval: Option<Duration>,
    #[serde(default)]
    pub size: Option<[u32; 2]>,
    #[serde(default)]
    pub clear_color: Option<[f32; 4]>,
    #[serde(default)]
    pub sequence_fps: Option<f32>,
    #[serde(default)]
    pub fragment_shader: Option<PathBuf>,
    #[serde(default)]
    pub gpu_power: Option<GpuPower>,
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl PlayerProfile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PlayerProfile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`. Relative media and shader paths are
    /// resolved against the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profile = Self::from_toml_str(&input)?;
        if let Some(base) = path.parent() {
            profile.resolve_relative_to(base);
        }
        Ok(profile)
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(src) = self.src.as_mut() {
            if !src.contains("://") && Path::new(src.as_str()).is_relative() {
                *src = base.join(src.as_str()).to_string_lossy().into_owned();
            }
        }
        if let Some(shader) = self.fragment_shader.as_mut() {
            if shader.is_relative() {
                *shader = base.join(&*shader);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(split) = self.split {
            if !(split > 0.0 && split < 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "split must be between 0 and 1 (exclusive), got {split}"
                )));
            }
        }

        if let Some([width, height]) = self.size {
            if width == 0 || height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "size must be non-zero, got {width}x{height}"
                )));
            }
        }

        if let Some(color) = self.clear_color {
            if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(ConfigError::Invalid(
                    "clear_color components must be within [0, 1]".into(),
                ));
            }
        }

        if let Some(fps) = self.sequence_fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "sequence_fps must be positive, got {fps}"
                )));
            }
        }

        if self.timeupdate_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::Invalid(
                "timeupdate_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
src = "clips/orb.gif"
layout = "top-bottom"
split = 0.5
order = "alpha-first"
alpha_channel = "luma"
fill = "cover"
autoplay = true
loop = true
muted = true
autoplay_policy = "muted-only"
timeupdate_interval = "250ms"
size = [960, 540]
clear_color = [0.0, 0.0, 0.0, 0.0]
sequence_fps = 24
"#;

    #[test]
    fn parses_sample_profile() {
        let profile = PlayerProfile::from_toml_str(SAMPLE).expect("parse profile");
        assert_eq!(profile.layout, Some(Layout::TopBottom));
        assert_eq!(profile.order, Some(Order::AlphaFirst));
        assert_eq!(profile.alpha_channel, Some(AlphaChannel::Luma));
        assert_eq!(profile.looping, Some(true));
        assert_eq!(profile.autoplay_policy, Some(AutoplayPolicy::MutedOnly));
        assert_eq!(profile.timeupdate_interval, Some(Duration::from_millis(250)));
        assert_eq!(profile.size, Some([960, 540]));
        assert_eq!(profile.sequence_fps, Some(24.0));
    }

    #[test]
    fn minimal_profile_leaves_everything_unset() {
        let profile = PlayerProfile::from_toml_str("version = 1").unwrap();
        assert_eq!(
            profile,
            PlayerProfile {
                version: 1,
                ..PlayerProfile::default()
            }
        );
    }

    #[test]
    fn durations_accept_bare_seconds() {
        let profile =
            PlayerProfile::from_toml_str("version = 1\ntimeupdate_interval = 0.5").unwrap();
        assert_eq!(profile.timeupdate_interval, Some(Duration::from_millis(500)));
    }

    #[test]
    fn rejects_other_versions() {
        let err = PlayerProfile::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for body in [
            "split = 1.5",
            "size = [0, 10]",
            "clear_color = [2.0, 0.0, 0.0, 1.0]",
            "sequence_fps = 0",
            "timeupdate_interval = \"0s\"",
        ] {
            let err = PlayerProfile::from_toml_str(&format!("version = 1\n{body}")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{body}");
        }
    }

    #[test]
    fn unknown_keys_and_names_fail_to_parse() {
        assert!(matches!(
            PlayerProfile::from_toml_str("version = 1\nlayout = \"diagonal\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PlayerProfile::from_toml_str("version = 1\nspeed = 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn relative_paths_follow_the_profile() {
        let mut profile = PlayerProfile {
            version: 1,
            src: Some("clips/orb.gif".into()),
            fragment_shader: Some(PathBuf::from("shaders/custom.frag")),
            ..PlayerProfile::default()
        };
        profile.resolve_relative_to(Path::new("/etc/alphaplay"));
        assert_eq!(profile.src.as_deref(), Some("/etc/alphaplay/clips/orb.gif"));
        assert_eq!(
            profile.fragment_shader,
            Some(PathBuf::from("/etc/alphaplay/shaders/custom.frag"))
        );

        let mut remote = PlayerProfile {
            version: 1,
            src: Some("file:///srv/orb.gif".into()),
            ..PlayerProfile::default()
        };
        remote.resolve_relative_to(Path::new("/etc/alphaplay"));
        assert_eq!(remote.src.as_deref(), Some("file:///srv/orb.gif"));
    }

    #[test]
    fn from_path_reports_missing_files() {
        let err = PlayerProfile::from_path(Path::new("/nonexistent/alphaplay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
