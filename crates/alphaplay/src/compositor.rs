use std::time::Duration;

use crate::backend::GraphicsBackend;
use crate::context::ContextManager;
use crate::error::PlayerResult;
use crate::media::VideoFrame;
use crate::pipeline::ShaderPipeline;
use crate::types::LayoutSpec;
use crate::uniforms::CompositeUniforms;

/// Per-tick value handed from the render loop to the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Clock reading when the tick started.
    pub timestamp: Duration,
    pub media_time: f64,
    /// Strictly increasing across ticks of one render loop.
    pub sequence: u64,
    /// Render-loop generation the tick was issued under.
    pub generation: u64,
}

/// What a composite call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOutcome {
    /// Drawn; `uploaded` tells whether new pixels were copied first.
    Drawn { uploaded: bool },
    /// No frame has been decoded yet.
    NoFrame,
    /// Tick is older than one already composited.
    Stale,
    /// The surface refused the frame; the composite is still owed.
    Skipped,
}

/// Turns the media's current frame into one draw per tick.
#[derive(Debug)]
pub struct FrameCompositor {
    layout: LayoutSpec,
    last_sequence: Option<u64>,
}

impl FrameCompositor {
    pub fn new(layout: LayoutSpec) -> Self {
        Self {
            layout,
            last_sequence: None,
        }
    }

    pub fn layout(&self) -> &LayoutSpec {
        &self.layout
    }

    /// Returns `false` when `layout` is already in use.
    pub fn set_layout(&mut self, layout: LayoutSpec) -> bool {
        if self.layout == layout {
            return false;
        }
        self.layout = layout;
        true
    }

    /// Applies staged resize, uploads `frame` when it changed, and draws.
    pub fn composite<B: GraphicsBackend>(
        &mut self,
        tick: &FrameTick,
        context: &mut ContextManager<B>,
        pipeline: &mut ShaderPipeline<B>,
        media_generation: u64,
        frame: Option<&VideoFrame>,
    ) -> PlayerResult<CompositeOutcome> {
        if self.last_sequence.is_some_and(|last| tick.sequence <= last) {
            tracing::trace!(sequence = tick.sequence, "dropping stale tick");
            return Ok(CompositeOutcome::Stale);
        }

        let surface_size = context.apply_resize();
        let uploaded = match frame {
            Some(frame) => pipeline.upload(context.backend_mut(), media_generation, frame)?,
            None => false,
        };
        let Some(frame_size) = pipeline.frame_size() else {
            return Ok(CompositeOutcome::NoFrame);
        };

        let surface = *context.surface();
        let premultiply = context.backend().premultiplied_output();
        let uniforms = CompositeUniforms::new(
            &self.layout,
            frame_size,
            surface_size,
            surface.fill_mode,
            premultiply,
        );
        if !pipeline.draw(context.backend_mut(), &uniforms, surface.clear_color)? {
            tracing::debug!(sequence = tick.sequence, "surface skipped the frame");
            return Ok(CompositeOutcome::Skipped);
        }
        self.last_sequence = Some(tick.sequence);
        tracing::trace!(
            sequence = tick.sequence,
            media_time = tick.media_time,
            uploaded,
            "frame composited"
        );
        Ok(CompositeOutcome::Drawn { uploaded })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderProgram;
    use crate::software::SoftwareBackend;
    use crate::types::{RenderSurface, VideoLayout};

    fn tick(sequence: u64) -> FrameTick {
        FrameTick {
            timestamp: Duration::ZERO,
            media_time: 0.0,
            sequence,
            generation: 0,
        }
    }

    fn setup() -> (
        ContextManager<SoftwareBackend>,
        ShaderPipeline<SoftwareBackend>,
        crate::software::BackendStats,
    ) {
        let backend = SoftwareBackend::new();
        let stats = backend.stats();
        let mut context = ContextManager::new(backend, RenderSurface::new(2, 2));
        context.acquire().unwrap();
        let pipeline = ShaderPipeline::build(context.backend_mut(), &ShaderProgram::bundled()).unwrap();
        (context, pipeline, stats)
    }

    #[test]
    fn nothing_is_drawn_before_the_first_frame() {
        let (mut context, mut pipeline, stats) = setup();
        let mut compositor = FrameCompositor::new(LayoutSpec::new(VideoLayout::SideBySide));
        let outcome = compositor
            .composite(&tick(1), &mut context, &mut pipeline, 1, None)
            .unwrap();
        assert_eq!(outcome, CompositeOutcome::NoFrame);
        assert_eq!(stats.draws(), 0);
    }

    #[test]
    fn identical_frames_skip_upload_but_still_draw() {
        let (mut context, mut pipeline, stats) = setup();
        let mut compositor = FrameCompositor::new(LayoutSpec::default());
        let frame = VideoFrame::new(2, 1, 0, vec![255; 8]);
        let first = compositor
            .composite(&tick(1), &mut context, &mut pipeline, 1, Some(&frame))
            .unwrap();
        let second = compositor
            .composite(&tick(2), &mut context, &mut pipeline, 1, Some(&frame))
            .unwrap();
        assert_eq!(first, CompositeOutcome::Drawn { uploaded: true });
        assert_eq!(second, CompositeOutcome::Drawn { uploaded: false });
        assert_eq!((stats.uploads(), stats.draws()), (1, 2));
    }

    #[test]
    fn refused_frames_are_not_counted_as_drawn() {
        let backend = SoftwareBackend::new();
        let controller = backend.controller();
        let stats = backend.stats();
        let mut context = ContextManager::new(backend, RenderSurface::new(2, 2));
        context.acquire().unwrap();
        let mut pipeline = ShaderPipeline::build(context.backend_mut(), &ShaderProgram::bundled()).unwrap();
        let mut compositor = FrameCompositor::new(LayoutSpec::default());
        let frame = VideoFrame::new(2, 1, 0, vec![255; 8]);

        controller.skip_presents(1);
        let skipped = compositor
            .composite(&tick(1), &mut context, &mut pipeline, 1, Some(&frame))
            .unwrap();
        assert_eq!(skipped, CompositeOutcome::Skipped);
        let retried = compositor
            .composite(&tick(2), &mut context, &mut pipeline, 1, Some(&frame))
            .unwrap();
        assert_eq!(retried, CompositeOutcome::Drawn { uploaded: false });
        assert_eq!(stats.draws(), 1);
    }

    #[test]
    fn older_ticks_are_never_replayed() {
        let (mut context, mut pipeline, stats) = setup();
        let mut compositor = FrameCompositor::new(LayoutSpec::default());
        let frame = VideoFrame::new(2, 1, 0, vec![255; 8]);
        compositor
            .composite(&tick(5), &mut context, &mut pipeline, 1, Some(&frame))
            .unwrap();
        let outcome = compositor
            .composite(&tick(4), &mut context, &mut pipeline, 1, Some(&frame))
            .unwrap();
        assert_eq!(outcome, CompositeOutcome::Stale);
        assert_eq!(stats.draws(), 1);
    }
}
