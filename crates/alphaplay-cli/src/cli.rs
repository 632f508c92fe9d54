use std::path::PathBuf;

use alphaplay::{AlphaChannel, FillMode, VideoLayout};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "alphaplay",
    author,
    version,
    about = "Play dual-region alpha video in a transparent window",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Media path or `file://` URL (animated GIF/PNG, still image, or a directory of frames).
    #[arg(value_name = "SRC")]
    pub src: Option<String>,

    /// TOML profile; command-line flags override its values.
    #[arg(long, value_name = "FILE", env = "ALPHAPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Region arrangement: `side-by-side` or `top-bottom`.
    #[arg(long, value_name = "LAYOUT", value_parser = parse_layout)]
    pub layout: Option<VideoLayout>,

    /// Share of the frame taken by the first region (0-1, exclusive).
    #[arg(long, value_name = "F", value_parser = parse_split)]
    pub split: Option<f32>,

    /// The alpha region comes first (left or top).
    #[arg(long)]
    pub alpha_first: bool,

    /// Channel of the alpha region holding the mask: `red`, `green`, `blue`, or `luma`.
    #[arg(long, value_name = "CHANNEL", value_parser = parse_alpha_channel)]
    pub alpha_channel: Option<AlphaChannel>,

    /// How the video maps onto the window: `contain`, `cover`, or `stretch`.
    #[arg(long, value_name = "MODE", value_parser = parse_fill)]
    pub fill: Option<FillMode>,

    /// Surface size in logical pixels (e.g. `960x540`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Start playing as soon as the first frame is ready.
    #[arg(long)]
    pub autoplay: bool,

    /// Restart from the beginning instead of ending.
    #[arg(long = "loop")]
    pub looping: bool,

    #[arg(long)]
    pub muted: bool,

    /// Frame rate for image directories and frames without timing.
    #[arg(long, value_name = "N", value_parser = parse_fps)]
    pub fps: Option<f32>,

    /// Composite one frame without a window and write it as PNG.
    #[arg(long, value_name = "PATH")]
    pub export_frame: Option<PathBuf>,

    /// Media time in seconds for `--export-frame`.
    #[arg(long, value_name = "SECONDS", requires = "export_frame", default_value_t = 0.0)]
    pub at: f64,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_layout(value: &str) -> Result<VideoLayout, String> {
    value.parse()
}

pub fn parse_alpha_channel(value: &str) -> Result<AlphaChannel, String> {
    value.parse()
}

pub fn parse_fill(value: &str) -> Result<FillMode, String> {
    value.parse()
}

pub fn parse_split(value: &str) -> Result<f32, String> {
    let split: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid split '{value}'; expected a number between 0 and 1"))?;
    if split > 0.0 && split < 1.0 {
        Ok(split)
    } else {
        Err(format!("split must be between 0 and 1 (exclusive), got {split}"))
    }
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{value}'"))?;
    if fps.is_finite() && fps > 0.0 {
        Ok(fps)
    } else {
        Err("frame rate must be greater than zero".to_string())
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 960x540".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}
