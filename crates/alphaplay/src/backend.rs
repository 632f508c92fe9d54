use crate::error::PlayerResult;
use crate::media::VideoFrame;
use crate::shader::ShaderProgram;
use crate::types::RenderSurface;
use crate::uniforms::CompositeUniforms;

/// Asynchronous context notifications observed at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextStatus {
    /// Nothing happened since the last poll.
    Unchanged,
    /// The context became invalid; every resource built on it is dead.
    Lost,
}

/// Rendering API underneath the context manager and shader pipeline.
///
/// A backend owns the device/surface pair. `Resources` is everything built
/// from a compiled [`ShaderProgram`] on the current device; it is handed back
/// to the backend for upload and draw and must never outlive the context it
/// was created on.
pub trait GraphicsBackend {
    type Resources;

    /// Binds a context to the output surface. `ContextUnavailable` is fatal;
    /// `ContextLost` means a restore is still pending and may be retried.
    fn acquire(&mut self, surface: &RenderSurface) -> PlayerResult<()>;

    /// Compiles `program` and allocates buffers on the current context.
    fn create_resources(&mut self, program: &ShaderProgram) -> PlayerResult<Self::Resources>;

    /// Copies `frame` into the resource texture, re-specifying storage when
    /// the frame size changed.
    fn upload_frame(
        &mut self,
        resources: &mut Self::Resources,
        frame: &VideoFrame,
    ) -> PlayerResult<()>;

    /// Draws the quad onto the surface. `Ok(false)` means the surface could
    /// not take a frame this time and nothing was presented.
    fn draw(
        &mut self,
        resources: &Self::Resources,
        uniforms: &CompositeUniforms,
        clear_color: [f32; 4],
    ) -> PlayerResult<bool>;

    /// Reconfigures the drawing buffer to `width` x `height` physical pixels.
    fn resize(&mut self, width: u32, height: u32);

    fn poll_context(&mut self) -> ContextStatus;

    /// Whether the surface composites pre-multiplied output.
    fn premultiplied_output(&self) -> bool {
        false
    }

    /// Drops the context. Resources must already be released.
    fn release(&mut self);
}
