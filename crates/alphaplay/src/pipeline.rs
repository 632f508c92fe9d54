use crate::backend::GraphicsBackend;
use crate::error::PlayerResult;
use crate::media::VideoFrame;
use crate::shader::ShaderProgram;
use crate::uniforms::CompositeUniforms;

/// Identity of the frame currently resident in the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameKey {
    pub generation: u64,
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

impl FrameKey {
    pub fn of(generation: u64, frame: &VideoFrame) -> Self {
        Self {
            generation,
            index: frame.index,
            width: frame.width,
            height: frame.height,
        }
    }
}

/// Compiled program plus the geometry and texture built from it.
///
/// A pipeline belongs to exactly one context: after a loss it is dropped and
/// a new one is built on the restored context.
pub struct ShaderPipeline<B: GraphicsBackend> {
    resources: B::Resources,
    resident: Option<FrameKey>,
}

impl<B: GraphicsBackend> ShaderPipeline<B> {
    /// Validates `program`, then builds it on `backend`.
    pub fn build(backend: &mut B, program: &ShaderProgram) -> PlayerResult<Self> {
        program.validate()?;
        let resources = backend.create_resources(program)?;
        tracing::debug!("composite pipeline built");
        Ok(Self {
            resources,
            resident: None,
        })
    }

    /// Uploads `frame` unless the same frame is already resident.
    ///
    /// Returns `true` when pixels were copied.
    pub(crate) fn upload(
        &mut self,
        backend: &mut B,
        generation: u64,
        frame: &VideoFrame,
    ) -> PlayerResult<bool> {
        let key = FrameKey::of(generation, frame);
        if self.resident == Some(key) {
            return Ok(false);
        }
        backend.upload_frame(&mut self.resources, frame)?;
        self.resident = Some(key);
        Ok(true)
    }

    pub(crate) fn draw(
        &self,
        backend: &mut B,
        uniforms: &CompositeUniforms,
        clear_color: [f32; 4],
    ) -> PlayerResult<bool> {
        backend.draw(&self.resources, uniforms, clear_color)
    }

    /// Size of the resident frame.
    pub(crate) fn frame_size(&self) -> Option<(u32, u32)> {
        self.resident.map(|key| (key.width, key.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareBackend;
    use crate::types::RenderSurface;

    #[test]
    fn repeated_frames_are_not_reuploaded() {
        let mut backend = SoftwareBackend::new();
        let stats = backend.stats();
        backend.acquire(&RenderSurface::new(4, 4)).unwrap();
        let mut pipeline = ShaderPipeline::build(&mut backend, &ShaderProgram::bundled()).unwrap();
        let frame = VideoFrame::new(2, 1, 0, vec![0; 8]);
        assert!(pipeline.upload(&mut backend, 1, &frame).unwrap());
        assert!(!pipeline.upload(&mut backend, 1, &frame).unwrap());
        // A new clip with an identical first frame still uploads.
        assert!(pipeline.upload(&mut backend, 2, &frame).unwrap());
        assert_eq!(stats.uploads(), 2);
        assert_eq!(pipeline.frame_size(), Some((2, 1)));
    }
}
