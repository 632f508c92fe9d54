use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, RgbaImage};

use super::{MediaElement, MediaInfo, VideoFrame};
use crate::error::MediaError;

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];
/// GIF delays at or below this are replaced, as browsers do.
const MIN_GIF_DELAY_SECS: f64 = 0.011;
const DEFAULT_GIF_DELAY_SECS: f64 = 0.1;

/// Decoded frames plus the media time at which each becomes visible.
#[derive(Debug, Clone)]
pub struct Clip {
    frames: Vec<VideoFrame>,
    starts: Vec<f64>,
    duration: f64,
}

impl Clip {
    /// Builds a clip from equally spaced images.
    pub fn from_images(images: Vec<RgbaImage>, fps: f32) -> Result<Self, MediaError> {
        let period = frame_period(fps);
        let timed = images.into_iter().map(|image| (image, period)).collect();
        Self::from_timed(timed, Path::new("<memory>"))
    }

    /// A clip of `frames` identical frames filled with `rgba`.
    pub fn solid(width: u32, height: u32, frames: usize, fps: f32, rgba: [u8; 4]) -> Self {
        let frames = frames.max(1);
        let period = frame_period(fps);
        let frames: Vec<VideoFrame> = (0..frames)
            .map(|index| {
                let image = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
                VideoFrame::from_image(image, index)
            })
            .collect();
        let starts = (0..frames.len()).map(|index| index as f64 * period).collect();
        Self {
            duration: frames.len() as f64 * period,
            frames,
            starts,
        }
    }

    fn from_timed(timed: Vec<(RgbaImage, f64)>, origin: &Path) -> Result<Self, MediaError> {
        let Some((first, _)) = timed.first() else {
            return Err(MediaError::Empty(origin.to_path_buf()));
        };
        let (expected_width, expected_height) = first.dimensions();

        let mut frames = Vec::with_capacity(timed.len());
        let mut starts = Vec::with_capacity(timed.len());
        let mut cursor = 0.0_f64;
        for (index, (image, delay)) in timed.into_iter().enumerate() {
            let (width, height) = image.dimensions();
            if (width, height) != (expected_width, expected_height) {
                return Err(MediaError::FrameSize {
                    index,
                    width,
                    height,
                    expected_width,
                    expected_height,
                });
            }
            starts.push(cursor);
            cursor += delay;
            frames.push(VideoFrame::from_image(image, index));
        }

        Ok(Self {
            frames,
            starts,
            duration: cursor,
        })
    }

    pub fn info(&self) -> MediaInfo {
        let (width, height) = self
            .frames
            .first()
            .map(|frame| (frame.width, frame.height))
            .unwrap_or((0, 0));
        MediaInfo {
            duration: self.duration,
            width,
            height,
            frame_count: self.frames.len(),
        }
    }

    /// Last frame whose start time is at or before `seconds`.
    pub fn frame_at(&self, seconds: f64) -> Option<&VideoFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let seconds = if seconds.is_finite() { seconds } else { 0.0 };
        let index = self
            .starts
            .partition_point(|start| *start <= seconds)
            .saturating_sub(1);
        self.frames.get(index.min(self.frames.len() - 1))
    }
}

fn frame_period(fps: f32) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        1.0 / f64::from(fps)
    } else {
        1.0 / 30.0
    }
}

/// In-memory clips addressed by name; `open` looks the URL up verbatim.
#[derive(Debug, Default)]
pub struct ClipLibrary {
    clips: HashMap<String, Clip>,
    current: Option<String>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, clip: Clip) {
        self.clips.insert(url.into(), clip);
    }

    pub fn with_clip(mut self, url: impl Into<String>, clip: Clip) -> Self {
        self.insert(url, clip);
        self
    }
}

impl MediaElement for ClipLibrary {
    fn open(&mut self, url: &str) -> Result<MediaInfo, MediaError> {
        let clip = self
            .clips
            .get(url)
            .ok_or_else(|| MediaError::NotFound(url.to_string()))?;
        self.current = Some(url.to_string());
        Ok(clip.info())
    }

    fn frame_at(&self, seconds: f64) -> Option<&VideoFrame> {
        let key = self.current.as_ref()?;
        self.clips.get(key)?.frame_at(seconds)
    }

    fn close(&mut self) {
        self.current = None;
    }
}

/// File-backed element decoding with the `image` crate.
///
/// Accepts animated GIF, APNG, any still image the `image` features cover,
/// and directories of still frames (sorted by file name, spaced at `fps`).
#[derive(Debug)]
pub struct FrameSequence {
    fps: f32,
    clip: Option<Clip>,
}

impl FrameSequence {
    pub fn new(fps: f32) -> Self {
        Self { fps, clip: None }
    }

    fn decode(&self, path: &Path) -> Result<Clip, MediaError> {
        if path.is_dir() {
            return self.decode_directory(path);
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("gif") => decode_gif(path),
            Some("png") | Some("apng") => self.decode_png(path),
            _ => self.decode_still(path),
        }
    }

    fn decode_directory(&self, directory: &Path) -> Result<Clip, MediaError> {
        let entries = fs::read_dir(directory).map_err(|source| MediaError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && has_frame_extension(path))
            .collect();
        paths.sort();

        let period = frame_period(self.fps);
        let mut timed = Vec::with_capacity(paths.len());
        for path in &paths {
            timed.push((open_rgba(path)?, period));
        }
        tracing::debug!(
            directory = %directory.display(),
            frames = timed.len(),
            fps = self.fps,
            "decoded image sequence"
        );
        Clip::from_timed(timed, directory)
    }

    fn decode_png(&self, path: &Path) -> Result<Clip, MediaError> {
        let decoder = PngDecoder::new(buffered(path)?).map_err(|source| decode_error(path, source))?;
        let animated = decoder
            .is_apng()
            .map_err(|source| decode_error(path, source))?;
        if !animated {
            return self.decode_still(path);
        }
        let frames = decoder
            .apng()
            .map_err(|source| decode_error(path, source))?
            .into_frames()
            .collect_frames()
            .map_err(|source| decode_error(path, source))?;
        let period = frame_period(self.fps);
        let timed = frames
            .into_iter()
            .map(|frame| {
                let mut delay = delay_seconds(frame.delay());
                if delay <= 0.0 {
                    delay = period;
                }
                (frame.into_buffer(), delay)
            })
            .collect();
        Clip::from_timed(timed, path)
    }

    fn decode_still(&self, path: &Path) -> Result<Clip, MediaError> {
        let image = open_rgba(path)?;
        Clip::from_timed(vec![(image, frame_period(self.fps))], path)
    }
}

impl Default for FrameSequence {
    fn default() -> Self {
        Self::new(30.0)
    }
}

impl MediaElement for FrameSequence {
    fn open(&mut self, url: &str) -> Result<MediaInfo, MediaError> {
        let path = path_from_url(url)?;
        if !path.exists() {
            return Err(MediaError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        self.clip = None;
        let clip = self.decode(&path)?;
        let info = clip.info();
        self.clip = Some(clip);
        Ok(info)
    }

    fn frame_at(&self, seconds: f64) -> Option<&VideoFrame> {
        self.clip.as_ref()?.frame_at(seconds)
    }

    fn close(&mut self) {
        self.clip = None;
    }
}

/// Accepts plain paths and `file://` URLs.
pub(crate) fn path_from_url(url: &str) -> Result<PathBuf, MediaError> {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if let Some((scheme, _)) = trimmed.split_once("://") {
        if scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-') {
            return Err(MediaError::UnsupportedScheme(trimmed.to_string()));
        }
    }
    Ok(PathBuf::from(trimmed))
}

fn decode_gif(path: &Path) -> Result<Clip, MediaError> {
    let decoder = GifDecoder::new(buffered(path)?).map_err(|source| decode_error(path, source))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|source| decode_error(path, source))?;
    let timed = frames
        .into_iter()
        .map(|frame| {
            let mut delay = delay_seconds(frame.delay());
            if delay < MIN_GIF_DELAY_SECS {
                delay = DEFAULT_GIF_DELAY_SECS;
            }
            (frame.into_buffer(), delay)
        })
        .collect();
    Clip::from_timed(timed, path)
}

fn delay_seconds(delay: image::Delay) -> f64 {
    let (numerator, denominator) = delay.numer_denom_ms();
    if denominator == 0 {
        return 0.0;
    }
    f64::from(numerator) / f64::from(denominator) / 1000.0
}

fn buffered(path: &Path) -> Result<BufReader<File>, MediaError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| MediaError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn open_rgba(path: &Path) -> Result<RgbaImage, MediaError> {
    image::open(path)
        .map(|image| image.to_rgba8())
        .map_err(|source| decode_error(path, source))
}

fn decode_error(path: &Path, source: image::ImageError) -> MediaError {
    MediaError::Decode {
        path: path.to_path_buf(),
        source,
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}
