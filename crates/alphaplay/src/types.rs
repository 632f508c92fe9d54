use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Smallest share of the frame either region may occupy.
pub const MIN_SPLIT: f32 = 0.05;
/// Largest share of the frame either region may occupy.
pub const MAX_SPLIT: f32 = 0.95;

/// Spatial arrangement of the color and alpha regions inside one video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoLayout {
    /// Regions sit next to each other horizontally.
    #[default]
    SideBySide,
    /// Regions are stacked vertically.
    TopBottom,
}

impl FromStr for VideoLayout {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "side-by-side" | "sbs" | "horizontal" => Ok(Self::SideBySide),
            "top-bottom" | "tb" | "vertical" => Ok(Self::TopBottom),
            other => Err(format!(
                "unknown layout '{other}' (expected side-by-side or top-bottom)"
            )),
        }
    }
}

impl fmt::Display for VideoLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoLayout::SideBySide => f.write_str("side-by-side"),
            VideoLayout::TopBottom => f.write_str("top-bottom"),
        }
    }
}

/// Which region comes first (left or top) in the authored frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionOrder {
    #[default]
    ColorFirst,
    AlphaFirst,
}

/// Channel of the alpha region that carries the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaChannel {
    #[default]
    Red,
    Green,
    Blue,
    /// Rec. 601 luma of the alpha region.
    Luma,
}

impl AlphaChannel {
    /// Dot-product weights applied to the sampled RGBA texel.
    pub fn weights(self) -> [f32; 4] {
        match self {
            AlphaChannel::Red => [1.0, 0.0, 0.0, 0.0],
            AlphaChannel::Green => [0.0, 1.0, 0.0, 0.0],
            AlphaChannel::Blue => [0.0, 0.0, 1.0, 0.0],
            AlphaChannel::Luma => [0.299, 0.587, 0.114, 0.0],
        }
    }
}

impl FromStr for AlphaChannel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(Self::Red),
            "green" | "g" => Ok(Self::Green),
            "blue" | "b" => Ok(Self::Blue),
            "luma" | "luminance" | "y" => Ok(Self::Luma),
            other => Err(format!(
                "unknown alpha channel '{other}' (expected red, green, blue, or luma)"
            )),
        }
    }
}

/// Full description of how a dual-region frame is authored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSpec {
    pub layout: VideoLayout,
    /// Share of the frame (width or height, depending on `layout`) taken by
    /// the first region.
    pub split: f32,
    pub order: RegionOrder,
    pub alpha_channel: AlphaChannel,
}

impl LayoutSpec {
    pub fn new(layout: VideoLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Returns a copy with the split ratio clamped to the supported range.
    pub fn with_split(mut self, split: f32) -> Self {
        self.split = clamp_split(split);
        self
    }

    pub fn with_order(mut self, order: RegionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_alpha_channel(mut self, channel: AlphaChannel) -> Self {
        self.alpha_channel = channel;
        self
    }
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self {
            layout: VideoLayout::SideBySide,
            split: 0.5,
            order: RegionOrder::ColorFirst,
            alpha_channel: AlphaChannel::Red,
        }
    }
}

pub(crate) fn clamp_split(split: f32) -> f32 {
    if split.is_finite() {
        split.clamp(MIN_SPLIT, MAX_SPLIT)
    } else {
        0.5
    }
}

/// Mapping of the video content onto the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMode {
    /// Letterbox so the whole color region is visible.
    #[default]
    Contain,
    /// Scale until the surface is covered, cropping the overflow.
    Cover,
    /// Ignore aspect ratio and fill the surface exactly.
    Stretch,
}

impl FromStr for FillMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "contain" => Ok(Self::Contain),
            "cover" => Ok(Self::Cover),
            "stretch" | "fill" => Ok(Self::Stretch),
            other => Err(format!(
                "unknown fill mode '{other}' (expected contain, cover, or stretch)"
            )),
        }
    }
}

/// Whether an `autoplay` start is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoplayPolicy {
    Allowed,
    /// Autoplay only while muted.
    #[default]
    MutedOnly,
    Blocked,
}

impl AutoplayPolicy {
    pub fn permits(self, muted: bool) -> bool {
        match self {
            AutoplayPolicy::Allowed => true,
            AutoplayPolicy::MutedOnly => muted,
            AutoplayPolicy::Blocked => false,
        }
    }
}

/// Adapter power preference forwarded to `wgpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

/// Output target description owned by the context manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSurface {
    /// Logical width before the device-pixel ratio is applied.
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    /// Straight RGBA used outside the video quad.
    pub clear_color: [f32; 4],
    pub fill_mode: FillMode,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale_factor: 1.0,
            clear_color: [0.0; 4],
            fill_mode: FillMode::default(),
        }
    }

    /// Drawing-buffer size in physical pixels, never smaller than 1x1.
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            1.0
        };
        let width = (f64::from(self.width) * scale).round().max(1.0) as u32;
        let height = (f64::from(self.height) * scale).round().max(1.0) as u32;
        (width, height)
    }
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self::new(640, 360)
    }
}

/// Construction options for a [`Player`](crate::Player).
///
/// Mirrors the properties a host UI wrapper binds onto the player: source,
/// layout, playback flags, fill mode, and surface size.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    /// Media URL (plain path or `file://`). `None` leaves the player idle.
    pub src: Option<String>,
    pub layout: LayoutSpec,
    pub autoplay: bool,
    pub looping: bool,
    pub muted: bool,
    pub fill_mode: FillMode,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
    pub clear_color: [f32; 4],
    pub autoplay_policy: AutoplayPolicy,
    /// Minimum spacing between `TimeUpdate` events while playing.
    pub timeupdate_interval: Duration,
    /// Frame rate used for image-sequence sources.
    pub sequence_fps: f32,
    /// Replaces the bundled fragment program when set.
    pub fragment_shader: Option<PathBuf>,
    pub gpu_power: GpuPowerPreference,
}

impl PlayerConfig {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::default()
        }
    }

    /// Surface description derived from the configured size and fill mode.
    pub fn surface(&self) -> RenderSurface {
        RenderSurface {
            width: self.width,
            height: self.height,
            scale_factor: self.scale_factor,
            clear_color: self.clear_color,
            fill_mode: self.fill_mode,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            src: None,
            layout: LayoutSpec::default(),
            autoplay: false,
            looping: false,
            muted: false,
            fill_mode: FillMode::default(),
            width: 640,
            height: 360,
            scale_factor: 1.0,
            clear_color: [0.0; 4],
            autoplay_policy: AutoplayPolicy::default(),
            timeupdate_interval: Duration::from_millis(250),
            sequence_fps: 30.0,
            fragment_shader: None,
            gpu_power: GpuPowerPreference::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_clamped() {
        assert_eq!(LayoutSpec::default().with_split(0.0).split, MIN_SPLIT);
        assert_eq!(LayoutSpec::default().with_split(2.0).split, MAX_SPLIT);
        assert_eq!(LayoutSpec::default().with_split(f32::NAN).split, 0.5);
    }

    #[test]
    fn parses_layout_names() {
        assert_eq!("top-bottom".parse::<VideoLayout>(), Ok(VideoLayout::TopBottom));
        assert_eq!("SBS".parse::<VideoLayout>(), Ok(VideoLayout::SideBySide));
        assert!("diagonal".parse::<VideoLayout>().is_err());
    }

    #[test]
    fn physical_size_applies_scale_and_floor() {
        let mut surface = RenderSurface::new(100, 50);
        surface.scale_factor = 1.5;
        assert_eq!(surface.physical_size(), (150, 75));
        surface.width = 0;
        assert_eq!(surface.physical_size(), (1, 75));
    }

    #[test]
    fn muted_only_policy_requires_mute() {
        assert!(AutoplayPolicy::MutedOnly.permits(true));
        assert!(!AutoplayPolicy::MutedOnly.permits(false));
        assert!(!AutoplayPolicy::Blocked.permits(true));
    }
}
