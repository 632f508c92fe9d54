use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::backend::GraphicsBackend;
use crate::clock::{SharedClock, SystemClock};
use crate::compositor::{CompositeOutcome, FrameCompositor};
use crate::context::{ContextManager, ContextState};
use crate::error::{PlayerError, PlayerResult};
use crate::events::{EventSink, PlayerEvent};
use crate::media::{FrameSequence, MediaElement, MediaEvent, MediaSource};
use crate::pipeline::ShaderPipeline;
use crate::render_loop::{RefreshSource, RenderLoop};
use crate::shader::ShaderProgram;
use crate::state::{PlaybackMachine, PlaybackState};
use crate::types::{FillMode, LayoutSpec, PlayerConfig, RenderSurface};

/// Who asked for playback to begin once the source is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartRequest {
    Autoplay,
    User,
}

/// Public surface of the player.
///
/// Commands mutate playback state and return immediately; failures are
/// published as [`PlayerEvent::Error`] on the channel from
/// [`events`](Self::events). Rendering happens only inside
/// [`on_refresh`](Self::on_refresh), which the host calls from its display
/// refresh callback whenever the [`RefreshSource`] asked for one.
pub struct Player<B: GraphicsBackend, R: RefreshSource> {
    config: PlayerConfig,
    clock: SharedClock,
    media: MediaSource,
    playback: PlaybackMachine,
    context: ContextManager<B>,
    pipeline: Option<ShaderPipeline<B>>,
    program: Option<ShaderProgram>,
    compositor: FrameCompositor,
    render_loop: RenderLoop<R>,
    sink: EventSink,
    events: Receiver<PlayerEvent>,
    start_request: Option<StartRequest>,
    pending_seek: Option<f64>,
    /// One composite is owed even though playback is not running.
    redraw: bool,
    /// A fatal error stopped rendering for good.
    halted: bool,
    destroyed: bool,
}

impl<B: GraphicsBackend, R: RefreshSource> Player<B, R> {
    /// Player that decodes `config.src` with [`FrameSequence`] on the system clock.
    pub fn new(config: PlayerConfig, backend: B, refresh: R) -> Self {
        let element = FrameSequence::new(config.sequence_fps);
        Self::with_media(
            config,
            backend,
            refresh,
            Box::new(element),
            Arc::new(SystemClock::new()),
        )
    }

    pub fn with_media(
        config: PlayerConfig,
        backend: B,
        refresh: R,
        element: Box<dyn MediaElement>,
        clock: SharedClock,
    ) -> Self {
        let (sink, events) = EventSink::channel();
        let mut media = MediaSource::new(element, Arc::clone(&clock));
        media.set_looping(config.looping);
        media.set_muted(config.muted);
        media.set_timeupdate_interval(config.timeupdate_interval);

        let program = match &config.fragment_shader {
            Some(path) => ShaderProgram::with_fragment_file(path),
            None => Ok(ShaderProgram::bundled()),
        };

        let mut player = Self {
            context: ContextManager::new(backend, config.surface()),
            compositor: FrameCompositor::new(config.layout),
            render_loop: RenderLoop::new(refresh),
            clock,
            media,
            playback: PlaybackMachine::default(),
            pipeline: None,
            program: None,
            sink,
            events,
            start_request: None,
            pending_seek: None,
            redraw: false,
            halted: false,
            destroyed: false,
            config,
        };

        match program {
            Ok(program) => player.program = Some(program),
            Err(err) => {
                player.halt(err);
                return player;
            }
        }
        player.render_loop.start();
        if let Some(src) = player.config.src.clone() {
            player.load(&src);
        }
        player
    }

    /// Receiver for every event this player emits. Clones share one queue.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.playback.get()
    }

    pub fn surface(&self) -> RenderSurface {
        *self.context.surface()
    }

    pub fn context_state(&self) -> ContextState {
        self.context.state()
    }

    pub fn current_time(&self) -> f64 {
        self.media.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.media.duration()
    }

    pub fn muted(&self) -> bool {
        self.media.muted()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// `false` once destroyed or after a fatal error halted rendering.
    fn accepts_commands(&self) -> bool {
        !self.destroyed && !self.halted
    }

    /// Opens `url`. `Loaded` follows on a later refresh.
    ///
    /// [`FrameSequence`] decodes every frame of the source inside this call,
    /// so a long animation or a large frame directory blocks the caller for
    /// the length of the decode. Hosts that cannot afford that should supply
    /// their own [`MediaElement`] through [`with_media`](Self::with_media).
    pub fn load(&mut self, url: &str) {
        if !self.accepts_commands() {
            tracing::debug!(url, "load ignored");
            return;
        }
        self.playback.transition(PlaybackState::Loading);
        self.pending_seek = None;
        self.redraw = false;
        self.start_request = self.config.autoplay.then_some(StartRequest::Autoplay);

        match self.media.load(url) {
            Ok(_) => {
                tracing::info!(url, "loading media");
                self.render_loop.wake();
            }
            Err(err) => {
                self.start_request = None;
                self.fail(PlayerError::from(err));
            }
        }
    }

    pub fn play(&mut self) {
        if !self.accepts_commands() {
            return;
        }
        match self.playback.get() {
            PlaybackState::Playing => {}
            PlaybackState::Idle => tracing::debug!("play ignored without media"),
            PlaybackState::Loading => self.start_request = Some(StartRequest::User),
            PlaybackState::Errored if self.media.info().is_none() => {
                tracing::debug!("play ignored: media failed to load");
            }
            _ => self.start_playback(),
        }
    }

    pub fn pause(&mut self) {
        if !self.accepts_commands() {
            return;
        }
        match self.playback.get() {
            PlaybackState::Playing => {
                self.media.pause();
                if self.playback.transition(PlaybackState::Paused) {
                    self.sink.emit(PlayerEvent::Pause);
                }
            }
            PlaybackState::Loading => self.start_request = None,
            _ => {}
        }
    }

    /// Moves the playhead, clamped to `[0, duration]`.
    pub fn seek(&mut self, seconds: f64) {
        if !self.accepts_commands() {
            return;
        }
        match self.playback.get() {
            PlaybackState::Idle => {}
            PlaybackState::Loading => self.pending_seek = Some(seconds),
            PlaybackState::Errored if self.media.info().is_none() => {}
            state => {
                let time = self.media.seek(seconds);
                if state == PlaybackState::Ended {
                    self.playback.transition(PlaybackState::Paused);
                }
                self.sink.emit(PlayerEvent::Seeked { current_time: time });
                self.redraw = true;
                self.render_loop.wake();
            }
        }
    }

    /// Stages a new logical surface size, applied before the next draw.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.accepts_commands() {
            return;
        }
        if self.context.resize(width, height) {
            tracing::debug!(width, height, "surface resize staged");
            self.request_redraw();
        }
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if self.accepts_commands() && self.context.set_scale_factor(scale_factor) {
            self.request_redraw();
        }
    }

    /// Switches how the frame is split into color and alpha. Used from the
    /// next composite on.
    pub fn set_layout(&mut self, layout: LayoutSpec) {
        if !self.accepts_commands() {
            return;
        }
        let layout = layout.with_split(layout.split);
        if self.compositor.set_layout(layout) {
            tracing::debug!(?layout, "layout changed");
            self.config.layout = layout;
            self.request_redraw();
        }
    }

    pub fn set_fill_mode(&mut self, fill_mode: FillMode) {
        if self.accepts_commands() && self.context.set_fill_mode(fill_mode) {
            tracing::debug!(?fill_mode, "fill mode changed");
            self.config.fill_mode = fill_mode;
            self.request_redraw();
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.accepts_commands() {
            self.media.set_muted(muted);
        }
    }

    /// Stops rendering, then releases GPU resources, then the media.
    /// Later calls do nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.render_loop.stop();
        self.pipeline = None;
        self.context.release();
        self.media.destroy();
        self.start_request = None;
        self.pending_seek = None;
        self.playback.transition(PlaybackState::Idle);
        tracing::debug!("player destroyed");
    }

    /// One display refresh. Drains media notifications, keeps the context
    /// alive, and composites when playing or when a redraw is owed.
    pub fn on_refresh(&mut self) {
        if self.destroyed || self.halted {
            return;
        }
        self.pump_media();
        if self.halted || !self.ensure_pipeline() {
            return;
        }

        let state = self.playback.get();
        // A blocked autoplay leaves the player errored but still owes the first frame.
        let active =
            state == PlaybackState::Playing || (self.redraw && self.media.info().is_some());
        let Some(tick) =
            self.render_loop
                .begin_tick(self.clock.now(), self.media.current_time(), active)
        else {
            return;
        };
        if !self.render_loop.is_current(tick.generation) {
            return;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        let frame = self.media.current_frame();
        let outcome = self.compositor.composite(
            &tick,
            &mut self.context,
            pipeline,
            self.media.generation(),
            frame,
        );
        match outcome {
            Ok(CompositeOutcome::Drawn { .. }) => self.redraw = false,
            Ok(CompositeOutcome::NoFrame | CompositeOutcome::Stale) => {}
            // The owed composite stays owed; `again` asks for another refresh.
            Ok(CompositeOutcome::Skipped) => {}
            Err(PlayerError::ContextLost) => {
                self.context.mark_lost();
                self.on_context_lost();
            }
            Err(err) if err.kind().is_fatal() => self.halt(err),
            Err(err) => self.report(&err),
        }
        let again = self.playback.get() == PlaybackState::Playing || self.redraw;
        self.render_loop.end_tick(&tick, again);
    }

    fn pump_media(&mut self) {
        for event in self.media.poll() {
            match event {
                MediaEvent::Loaded(info) => {
                    if !self.playback.transition(PlaybackState::Ready) {
                        continue;
                    }
                    self.sink.emit(PlayerEvent::Loaded {
                        duration: info.duration,
                        width: info.width,
                        height: info.height,
                    });
                    self.redraw = true;
                    if let Some(seconds) = self.pending_seek.take() {
                        let time = self.media.seek(seconds);
                        self.sink.emit(PlayerEvent::Seeked { current_time: time });
                    }
                    match self.start_request.take() {
                        Some(StartRequest::Autoplay) => self.autoplay(),
                        Some(StartRequest::User) => self.start_playback(),
                        None => {}
                    }
                }
                MediaEvent::TimeUpdate(current_time) => {
                    self.sink.emit(PlayerEvent::TimeUpdate { current_time });
                }
                MediaEvent::Ended => {
                    if self.playback.transition(PlaybackState::Ended) {
                        // Show the final frame once more.
                        self.redraw = true;
                        self.sink.emit(PlayerEvent::Ended);
                    }
                }
            }
        }
    }

    fn autoplay(&mut self) {
        let muted = self.media.muted();
        if self.config.autoplay_policy.permits(muted) {
            self.start_playback();
        } else {
            tracing::warn!(muted, policy = ?self.config.autoplay_policy, "autoplay blocked");
            self.fail(PlayerError::AutoplayBlocked { muted });
        }
    }

    fn start_playback(&mut self) {
        if let Err(err) = self.media.play() {
            self.fail(PlayerError::from(err));
            return;
        }
        if self.playback.transition(PlaybackState::Playing) {
            self.sink.emit(PlayerEvent::Play);
            self.render_loop.wake();
        }
    }

    /// Makes sure a live context and a pipeline built on it exist.
    fn ensure_pipeline(&mut self) -> bool {
        if self.context.poll_lost() {
            self.on_context_lost();
        }
        let restoring = match self.context.state() {
            ContextState::Active if self.pipeline.is_some() => return true,
            ContextState::Active | ContextState::Unacquired => false,
            ContextState::Lost => true,
            ContextState::Failed | ContextState::Released => return false,
        };

        if let Err(err) = self.context.acquire() {
            if matches!(err, PlayerError::ContextLost) {
                self.render_loop.wake();
            } else {
                self.halt(err);
            }
            return false;
        }
        match self.build_pipeline() {
            Ok(pipeline) => self.pipeline = Some(pipeline),
            Err(PlayerError::ContextLost) => {
                self.context.mark_lost();
                self.render_loop.wake();
                return false;
            }
            Err(err) => {
                self.halt(err);
                return false;
            }
        }
        if restoring {
            tracing::info!("graphics context restored");
            self.sink.emit(PlayerEvent::ContextRestored);
            self.redraw = true;
        }
        true
    }

    fn build_pipeline(&mut self) -> PlayerResult<ShaderPipeline<B>> {
        let program = self.program.as_ref().ok_or_else(|| {
            PlayerError::context_unavailable("no shader program available")
        })?;
        ShaderPipeline::build(self.context.backend_mut(), program)
    }

    fn on_context_lost(&mut self) {
        self.pipeline = None;
        self.render_loop.invalidate();
        self.report(&PlayerError::ContextLost);
        self.render_loop.wake();
    }

    fn request_redraw(&mut self) {
        self.redraw = true;
        self.render_loop.wake();
    }

    /// Non-fatal failure: playback becomes errored, rendering continues.
    fn fail(&mut self, err: PlayerError) {
        tracing::warn!(error = %err, kind = %err.kind(), "playback failed");
        self.playback.transition(PlaybackState::Errored);
        self.report(&err);
    }

    /// Fatal failure: reported once, the render loop stops for good and the
    /// surface keeps its last composite.
    fn halt(&mut self, err: PlayerError) {
        tracing::error!(error = %err, kind = %err.kind(), "rendering halted");
        self.halted = true;
        self.render_loop.stop();
        self.pipeline = None;
        self.media.pause();
        self.playback.transition(PlaybackState::Errored);
        self.report(&err);
    }

    fn report(&self, err: &PlayerError) {
        self.sink.emit(PlayerEvent::from_error(err));
    }
}

impl<B: GraphicsBackend, R: RefreshSource> Drop for Player<B, R> {
    fn drop(&mut self) {
        self.destroy();
    }
}
