//! Media side of the player: decoded frames and the playback clock.
//!
//! A [`MediaElement`] is the decoder. It knows how to open a URL and which
//! frame is visible at a given media time, nothing else. [`MediaSource`]
//! wraps an element with the transport state the player needs: anchored
//! play/pause, clamped seeking, looping, and the `loaded`/`timeupdate`/`ended`
//! notifications drained once per tick.

mod sequence;

use std::time::Duration;

use crate::clock::SharedClock;
use crate::error::MediaError;

pub use sequence::{Clip, ClipLibrary, FrameSequence};

/// One decoded RGBA8 frame, row-major with the top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Position of the frame inside its clip.
    pub index: usize,
    pub pixels: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, index: usize, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width as usize) * (height as usize) * 4);
        Self {
            width,
            height,
            index,
            pixels,
        }
    }

    pub fn from_image(image: image::RgbaImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, index, image.into_raw())
    }

    /// Reads one texel, clamping coordinates to the frame edge.
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        if self.width == 0 || self.height == 0 {
            return [0; 4];
        }
        let x = x.clamp(0, i64::from(self.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.height) - 1) as usize;
        let offset = (y * self.width as usize + x) * 4;
        match self.pixels.get(offset..offset + 4) {
            Some(texel) => [texel[0], texel[1], texel[2], texel[3]],
            None => [0; 4],
        }
    }
}

/// Stream properties reported once a source opens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Total length in seconds.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
}

/// Decoder behind a [`MediaSource`].
pub trait MediaElement: Send {
    /// Opens `url`, replacing any previously opened media.
    fn open(&mut self, url: &str) -> Result<MediaInfo, MediaError>;

    /// Frame visible at `seconds`, or `None` when nothing is open.
    fn frame_at(&self, seconds: f64) -> Option<&VideoFrame>;

    /// Audio passthrough toggle. Elements without audio ignore it.
    fn set_muted(&mut self, _muted: bool) {}

    /// Releases decoded data.
    fn close(&mut self);
}

/// Notifications produced by [`MediaSource::poll`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    Loaded(MediaInfo),
    TimeUpdate(f64),
    Ended,
}

/// Transport state wrapped around a [`MediaElement`].
pub struct MediaSource {
    element: Box<dyn MediaElement>,
    clock: SharedClock,
    info: Option<MediaInfo>,
    generation: u64,
    announce_loaded: bool,
    /// Media time at `anchor`, or the frozen time while paused.
    position: f64,
    /// Clock reading when playback last (re)started.
    anchor: Option<Duration>,
    looping: bool,
    muted: bool,
    timeupdate_interval: Duration,
    last_timeupdate: Option<Duration>,
    force_timeupdate: bool,
}

impl MediaSource {
    pub fn new(element: Box<dyn MediaElement>, clock: SharedClock) -> Self {
        Self {
            element,
            clock,
            info: None,
            generation: 0,
            announce_loaded: false,
            position: 0.0,
            anchor: None,
            looping: false,
            muted: false,
            timeupdate_interval: Duration::from_millis(250),
            last_timeupdate: None,
            force_timeupdate: false,
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        if self.looping != looping {
            // Re-anchor so the wrap point is computed from the current time.
            let now = self.current_time();
            self.looping = looping;
            self.reanchor(now);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.element.set_muted(muted);
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn set_timeupdate_interval(&mut self, interval: Duration) {
        self.timeupdate_interval = interval;
    }

    /// Opens `url`. `Loaded` is reported by the next [`poll`](Self::poll).
    pub fn load(&mut self, url: &str) -> Result<MediaInfo, MediaError> {
        self.element.close();
        self.info = None;
        self.anchor = None;
        self.position = 0.0;
        self.last_timeupdate = None;
        self.force_timeupdate = false;
        self.generation = self.generation.wrapping_add(1);

        let info = self.element.open(url)?;
        self.element.set_muted(self.muted);
        tracing::debug!(
            url,
            duration = info.duration,
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            "media opened"
        );
        self.info = Some(info);
        self.announce_loaded = true;
        Ok(info)
    }

    pub fn info(&self) -> Option<MediaInfo> {
        self.info
    }

    pub fn duration(&self) -> f64 {
        self.info.map(|info| info.duration).unwrap_or(0.0)
    }

    /// Increments on every `load`; lets consumers tell clips apart.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    /// Starts (or restarts from zero when at the end) playback.
    pub fn play(&mut self) -> Result<(), MediaError> {
        let Some(info) = self.info else {
            return Err(MediaError::NotLoaded);
        };
        if self.anchor.is_some() {
            return Ok(());
        }
        if !self.looping && self.position >= info.duration {
            self.position = 0.0;
        }
        self.anchor = Some(self.clock.now());
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.anchor.is_some() {
            self.position = self.current_time();
            self.anchor = None;
        }
    }

    /// Moves the playhead, clamped to `[0, duration]`. Returns the new time.
    pub fn seek(&mut self, seconds: f64) -> f64 {
        let duration = self.duration();
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, duration)
        } else {
            0.0
        };
        self.reanchor(target);
        self.force_timeupdate = true;
        target
    }

    /// Current media time in seconds.
    pub fn current_time(&self) -> f64 {
        let duration = self.duration();
        let Some(anchor) = self.anchor else {
            return self.position;
        };
        let elapsed = self.clock.now().saturating_sub(anchor).as_secs_f64();
        let raw = self.position + elapsed;
        if self.looping && duration > 0.0 {
            raw % duration
        } else {
            raw.min(duration)
        }
    }

    /// Frame for the current playhead.
    pub fn current_frame(&self) -> Option<&VideoFrame> {
        self.info?;
        self.element.frame_at(self.current_time())
    }

    /// Drains pending notifications. Called once per tick.
    pub fn poll(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        let Some(info) = self.info else {
            return events;
        };
        if self.announce_loaded {
            self.announce_loaded = false;
            events.push(MediaEvent::Loaded(info));
        }

        if let Some(anchor) = self.anchor {
            let now = self.clock.now();
            let raw = self.position + now.saturating_sub(anchor).as_secs_f64();
            if raw >= info.duration {
                if self.looping && info.duration > 0.0 {
                    self.position = raw % info.duration;
                    self.anchor = Some(now);
                } else {
                    self.position = info.duration;
                    self.anchor = None;
                    events.push(MediaEvent::TimeUpdate(self.position));
                    self.last_timeupdate = Some(now);
                    self.force_timeupdate = false;
                    events.push(MediaEvent::Ended);
                    return events;
                }
            }
        }

        let now = self.clock.now();
        let due = match self.last_timeupdate {
            None => self.anchor.is_some(),
            Some(last) => {
                self.anchor.is_some() && now.saturating_sub(last) >= self.timeupdate_interval
            }
        };
        if self.force_timeupdate || due {
            self.force_timeupdate = false;
            self.last_timeupdate = Some(now);
            events.push(MediaEvent::TimeUpdate(self.current_time()));
        }
        events
    }

    /// Releases the element. The source can be reused with `load`.
    pub fn destroy(&mut self) {
        self.anchor = None;
        self.info = None;
        self.announce_loaded = false;
        self.force_timeupdate = false;
        self.element.close();
    }

    fn reanchor(&mut self, position: f64) {
        self.position = position;
        if self.anchor.is_some() {
            self.anchor = Some(self.clock.now());
        }
    }
}

impl std::fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSource")
            .field("info", &self.info)
            .field("generation", &self.generation)
            .field("position", &self.position)
            .field("playing", &self.anchor.is_some())
            .field("looping", &self.looping)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;

    fn source_with_clip(frames: usize, fps: f32) -> (MediaSource, ManualClock) {
        let clock = ManualClock::new();
        let mut library = ClipLibrary::new();
        library.insert("clip", Clip::solid(4, 2, frames, fps, [10, 20, 30, 255]));
        let mut source = MediaSource::new(Box::new(library), Arc::new(clock.clone()));
        source.load("clip").unwrap();
        (source, clock)
    }

    #[test]
    fn loaded_is_reported_once() {
        let (mut source, _clock) = source_with_clip(10, 10.0);
        let first = source.poll();
        assert!(matches!(first.as_slice(), [MediaEvent::Loaded(_)]));
        assert!(source.poll().is_empty());
    }

    #[test]
    fn pause_freezes_the_playhead() {
        let (mut source, clock) = source_with_clip(10, 10.0);
        source.play().unwrap();
        clock.advance_secs(0.3);
        source.pause();
        let paused_at = source.current_time();
        clock.advance_secs(5.0);
        assert!((source.current_time() - paused_at).abs() < 1e-9);
        source.play().unwrap();
        assert!((source.current_time() - paused_at).abs() < 1e-9);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let (mut source, _clock) = source_with_clip(10, 10.0);
        assert_eq!(source.seek(-1.0), 0.0);
        assert!((source.seek(99.0) - 1.0).abs() < 1e-9);
        assert_eq!(source.seek(f64::NAN), 0.0);
    }

    #[test]
    fn seek_forces_a_timeupdate() {
        let (mut source, _clock) = source_with_clip(10, 10.0);
        source.poll();
        source.seek(0.45);
        let events = source.poll();
        assert_eq!(events, vec![MediaEvent::TimeUpdate(0.45)]);
    }

    #[test]
    fn reaching_the_end_reports_ended_once() {
        let (mut source, clock) = source_with_clip(10, 10.0);
        source.poll();
        source.play().unwrap();
        clock.advance_secs(1.5);
        let events = source.poll();
        assert_eq!(events.last(), Some(&MediaEvent::Ended));
        assert!(!source.is_playing());
        assert!(source.poll().iter().all(|event| *event != MediaEvent::Ended));
    }

    #[test]
    fn looping_wraps_without_ended() {
        let (mut source, clock) = source_with_clip(10, 10.0);
        source.set_looping(true);
        source.poll();
        source.play().unwrap();
        clock.advance_secs(1.25);
        let events = source.poll();
        assert!(events.iter().all(|event| *event != MediaEvent::Ended));
        assert!((source.current_time() - 0.25).abs() < 1e-6);
        assert!(source.is_playing());
    }

    #[test]
    fn play_after_end_restarts() {
        let (mut source, clock) = source_with_clip(10, 10.0);
        source.play().unwrap();
        clock.advance_secs(2.0);
        source.poll();
        source.play().unwrap();
        assert_eq!(source.current_time(), 0.0);
    }

    #[test]
    fn play_without_media_fails() {
        let clock = ManualClock::new();
        let mut source = MediaSource::new(Box::new(ClipLibrary::new()), Arc::new(clock));
        assert!(matches!(source.play(), Err(MediaError::NotLoaded)));
    }

    #[test]
    fn texel_reads_clamp_to_edges() {
        let frame = VideoFrame::new(2, 1, 0, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(frame.texel(-5, 0), [1, 2, 3, 4]);
        assert_eq!(frame.texel(9, 9), [5, 6, 7, 8]);
    }
}
