//! Hardware backend on `wgpu`.

mod context;
mod resources;

use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::backend::{ContextStatus, GraphicsBackend};
use crate::error::{PlayerError, PlayerResult};
use crate::media::VideoFrame;
use crate::shader::ShaderProgram;
use crate::types::{GpuPowerPreference, RenderSurface};
use crate::uniforms::CompositeUniforms;

use self::context::GpuContext;
pub use self::resources::GpuResources;

/// Renders into the surface of a window-like `target`.
pub struct WgpuBackend<W> {
    target: Arc<W>,
    gpu_power: GpuPowerPreference,
    context: Option<GpuContext>,
    /// Set once any acquire succeeded; later failures are treated as a
    /// pending restore rather than a missing device.
    acquired_once: bool,
}

impl<W> WgpuBackend<W>
where
    W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
{
    pub fn new(target: Arc<W>, gpu_power: GpuPowerPreference) -> Self {
        Self {
            target,
            gpu_power,
            context: None,
            acquired_once: false,
        }
    }

    fn live_context(&self) -> PlayerResult<&GpuContext> {
        match self.context.as_ref() {
            Some(context) if !context.is_lost() => Ok(context),
            _ => Err(PlayerError::ContextLost),
        }
    }
}

impl<W> GraphicsBackend for WgpuBackend<W>
where
    W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
{
    type Resources = GpuResources;

    fn acquire(&mut self, surface: &RenderSurface) -> PlayerResult<()> {
        if let Some(context) = self.context.as_mut() {
            if !context.is_lost() {
                let (width, height) = surface.physical_size();
                context.resize(width, height);
                return Ok(());
            }
        }
        self.context = None;

        match GpuContext::new(Arc::clone(&self.target), surface.physical_size(), self.gpu_power) {
            Ok(context) => {
                self.context = Some(context);
                self.acquired_once = true;
                Ok(())
            }
            Err(err) if self.acquired_once => {
                tracing::debug!(error = %format!("{err:#}"), "device not restored yet");
                Err(PlayerError::ContextLost)
            }
            Err(err) => Err(PlayerError::context_unavailable(format!("{err:#}"))),
        }
    }

    fn create_resources(&mut self, program: &ShaderProgram) -> PlayerResult<Self::Resources> {
        let context = self.live_context()?;
        GpuResources::new(&context.device, context.config.format, program)
    }

    fn upload_frame(
        &mut self,
        resources: &mut Self::Resources,
        frame: &VideoFrame,
    ) -> PlayerResult<()> {
        let context = self.live_context()?;
        let limit = context.max_texture_dimension;
        if frame.width > limit || frame.height > limit {
            return Err(PlayerError::context_unavailable(format!(
                "frame {}x{} exceeds the GPU texture limit of {limit}",
                frame.width, frame.height
            )));
        }
        resources.upload(&context.device, &context.queue, frame);
        Ok(())
    }

    fn draw(
        &mut self,
        resources: &Self::Resources,
        uniforms: &CompositeUniforms,
        clear_color: [f32; 4],
    ) -> PlayerResult<bool> {
        let context = self.live_context()?;
        let output = match context.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface outdated; reconfiguring and skipping frame");
                context.reconfigure();
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface acquire timed out; skipping frame");
                return Ok(false);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                context.mark_lost();
                return Err(PlayerError::ContextLost);
            }
            Err(err) => {
                tracing::warn!(error = %err, "surface error; skipping frame");
                return Ok(false);
            }
        };

        resources.write_uniforms(&context.queue, uniforms);
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_value(clear_color, context.premultiplied)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            resources.record(&mut pass);
        }
        context.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(true)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(context) = self.context.as_mut() {
            context.resize(width, height);
        }
    }

    fn poll_context(&mut self) -> ContextStatus {
        match self.context.as_ref() {
            Some(context) if context.is_lost() => ContextStatus::Lost,
            _ => ContextStatus::Unchanged,
        }
    }

    fn premultiplied_output(&self) -> bool {
        self.context
            .as_ref()
            .is_some_and(|context| context.premultiplied)
    }

    fn release(&mut self) {
        self.context = None;
    }
}

fn clear_value(color: [f32; 4], premultiplied: bool) -> wgpu::Color {
    let [r, g, b, a] = color.map(|channel| f64::from(channel.clamp(0.0, 1.0)));
    if premultiplied {
        wgpu::Color {
            r: r * a,
            g: g * a,
            b: b * a,
            a,
        }
    } else {
        wgpu::Color { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_color_follows_surface_alpha_mode() {
        let straight = clear_value([1.0, 0.5, 0.0, 0.5], false);
        assert_eq!((straight.r, straight.a), (1.0, 0.5));
        let premultiplied = clear_value([1.0, 0.5, 0.0, 0.5], true);
        assert_eq!((premultiplied.r, premultiplied.g), (0.5, 0.25));
    }
}
