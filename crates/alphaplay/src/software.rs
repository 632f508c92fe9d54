//! Headless CPU backend.
//!
//! Evaluates the same math as `shaders/composite.{vert,frag}` with nearest
//! sampling, one fragment per output pixel. The output is a straight-alpha
//! [`RgbaImage`] readable through [`SoftwareSurface`]. Contexts can be lost,
//! restored, or made unavailable through [`SoftwareController`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::backend::{ContextStatus, GraphicsBackend};
use crate::error::{PlayerError, PlayerResult};
use crate::media::VideoFrame;
use crate::shader::ShaderProgram;
use crate::types::RenderSurface;
use crate::uniforms::CompositeUniforms;

#[derive(Debug)]
struct ControlState {
    available: AtomicBool,
    lost: AtomicBool,
    skipped_presents: AtomicU64,
}

/// Shared switchboard for the context of a [`SoftwareBackend`].
#[derive(Debug, Clone)]
pub struct SoftwareController {
    state: Arc<ControlState>,
}

impl SoftwareController {
    /// When `false`, every acquire fails with `ContextUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Invalidates the current context. Detected on the next poll.
    pub fn lose_context(&self) {
        self.state.lost.store(true, Ordering::SeqCst);
    }

    /// Lets the next acquire succeed again.
    pub fn restore_context(&self) {
        self.state.lost.store(false, Ordering::SeqCst);
    }

    pub fn is_lost(&self) -> bool {
        self.state.lost.load(Ordering::SeqCst)
    }

    /// Makes the next `count` draws behave like an outdated surface: nothing
    /// is presented and the draw reports a skip.
    pub fn skip_presents(&self, count: u64) {
        self.state.skipped_presents.store(count, Ordering::SeqCst);
    }

    fn take_skip(&self) -> bool {
        self.state
            .skipped_presents
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Counters {
    acquisitions: AtomicU64,
    uploads: AtomicU64,
    draws: AtomicU64,
    resizes: AtomicU64,
    releases: AtomicU64,
}

/// Read-only view of the work a [`SoftwareBackend`] performed.
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    counters: Arc<Counters>,
}

impl BackendStats {
    pub fn acquisitions(&self) -> u64 {
        self.counters.acquisitions.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> u64 {
        self.counters.uploads.load(Ordering::SeqCst)
    }

    pub fn draws(&self) -> u64 {
        self.counters.draws.load(Ordering::SeqCst)
    }

    pub fn resizes(&self) -> u64 {
        self.counters.resizes.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u64 {
        self.counters.releases.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handle to the image a [`SoftwareBackend`] draws into.
#[derive(Debug, Clone)]
pub struct SoftwareSurface {
    image: Arc<Mutex<RgbaImage>>,
}

impl SoftwareSurface {
    /// Copy of the last composited image.
    pub fn snapshot(&self) -> RgbaImage {
        match self.image.lock() {
            Ok(image) => image.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.snapshot().dimensions()
    }

    fn replace(&self, next: RgbaImage) {
        match self.image.lock() {
            Ok(mut image) => *image = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Texture state built on one software context.
#[derive(Debug)]
pub struct SoftwareResources {
    epoch: u64,
    texture: Option<VideoFrame>,
}

#[derive(Debug)]
pub struct SoftwareBackend {
    controller: SoftwareController,
    stats: BackendStats,
    surface: SoftwareSurface,
    size: (u32, u32),
    /// Incremented on every acquire; resources from older epochs are dead.
    epoch: u64,
    active: bool,
    premultiplied: bool,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            controller: SoftwareController {
                state: Arc::new(ControlState {
                    available: AtomicBool::new(true),
                    lost: AtomicBool::new(false),
                    skipped_presents: AtomicU64::new(0),
                }),
            },
            stats: BackendStats::default(),
            surface: SoftwareSurface {
                image: Arc::new(Mutex::new(RgbaImage::new(1, 1))),
            },
            size: (1, 1),
            epoch: 0,
            active: false,
            premultiplied: false,
        }
    }

    /// Emulates a surface that composites pre-multiplied alpha.
    pub fn with_premultiplied_output(mut self, premultiplied: bool) -> Self {
        self.premultiplied = premultiplied;
        self
    }

    pub fn controller(&self) -> SoftwareController {
        self.controller.clone()
    }

    pub fn stats(&self) -> BackendStats {
        self.stats.clone()
    }

    pub fn surface(&self) -> SoftwareSurface {
        self.surface.clone()
    }

    fn ensure_live(&self, epoch: Option<u64>) -> PlayerResult<()> {
        if !self.active || self.controller.is_lost() {
            return Err(PlayerError::ContextLost);
        }
        if epoch.is_some_and(|epoch| epoch != self.epoch) {
            return Err(PlayerError::ContextLost);
        }
        Ok(())
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsBackend for SoftwareBackend {
    type Resources = SoftwareResources;

    fn acquire(&mut self, surface: &RenderSurface) -> PlayerResult<()> {
        if !self.controller.is_available() {
            return Err(PlayerError::context_unavailable(
                "software context disabled",
            ));
        }
        if self.controller.is_lost() {
            return Err(PlayerError::ContextLost);
        }
        self.size = surface.physical_size();
        self.epoch += 1;
        self.active = true;
        self.surface.replace(RgbaImage::new(self.size.0, self.size.1));
        BackendStats::bump(&self.stats.counters.acquisitions);
        Ok(())
    }

    fn create_resources(&mut self, program: &ShaderProgram) -> PlayerResult<Self::Resources> {
        self.ensure_live(None)?;
        program.validate()?;
        Ok(SoftwareResources {
            epoch: self.epoch,
            texture: None,
        })
    }

    fn upload_frame(
        &mut self,
        resources: &mut Self::Resources,
        frame: &VideoFrame,
    ) -> PlayerResult<()> {
        self.ensure_live(Some(resources.epoch))?;
        match resources.texture.as_mut() {
            Some(texture) if texture.width == frame.width && texture.height == frame.height => {
                texture.pixels.copy_from_slice(&frame.pixels);
                texture.index = frame.index;
            }
            _ => resources.texture = Some(frame.clone()),
        }
        BackendStats::bump(&self.stats.counters.uploads);
        Ok(())
    }

    fn draw(
        &mut self,
        resources: &Self::Resources,
        uniforms: &CompositeUniforms,
        clear_color: [f32; 4],
    ) -> PlayerResult<bool> {
        self.ensure_live(Some(resources.epoch))?;
        if self.controller.take_skip() {
            return Ok(false);
        }
        let (width, height) = self.size;
        let clear = Rgba(clear_color.map(unit_to_byte));
        let mut target = RgbaImage::from_pixel(width, height, clear);
        if let Some(texture) = resources.texture.as_ref() {
            rasterize(&mut target, texture, uniforms);
        }
        self.surface.replace(target);
        BackendStats::bump(&self.stats.counters.draws);
        Ok(true)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
        BackendStats::bump(&self.stats.counters.resizes);
    }

    fn poll_context(&mut self) -> ContextStatus {
        if self.active && self.controller.is_lost() {
            self.active = false;
            return ContextStatus::Lost;
        }
        ContextStatus::Unchanged
    }

    fn premultiplied_output(&self) -> bool {
        self.premultiplied
    }

    fn release(&mut self) {
        self.active = false;
        BackendStats::bump(&self.stats.counters.releases);
    }
}

fn rasterize(target: &mut RgbaImage, texture: &VideoFrame, uniforms: &CompositeUniforms) {
    let (width, height) = target.dimensions();
    let [scale_x, scale_y, _, _] = uniforms.quad;
    if scale_x <= 0.0 || scale_y <= 0.0 {
        return;
    }
    let premultiply = uniforms.premultiply();
    for py in 0..height {
        let ndc_y = 1.0 - (py as f32 + 0.5) / height as f32 * 2.0;
        let v = (1.0 - ndc_y / scale_y) * 0.5;
        if !(0.0..=1.0).contains(&v) {
            continue;
        }
        for px in 0..width {
            let ndc_x = (px as f32 + 0.5) / width as f32 * 2.0 - 1.0;
            let u = (ndc_x / scale_x + 1.0) * 0.5;
            if !(0.0..=1.0).contains(&u) {
                continue;
            }
            let color = sample(texture, uniforms.color_rect, u, v);
            let mask = sample(texture, uniforms.alpha_rect, u, v);
            let alpha = mask
                .iter()
                .zip(uniforms.alpha_weights)
                .map(|(&channel, weight)| f32::from(channel) / 255.0 * weight)
                .sum::<f32>()
                .clamp(0.0, 1.0);
            let rgb = if premultiply {
                [0, 1, 2].map(|i| unit_to_byte(f32::from(color[i]) / 255.0 * alpha))
            } else {
                [color[0], color[1], color[2]]
            };
            target.put_pixel(px, py, Rgba([rgb[0], rgb[1], rgb[2], unit_to_byte(alpha)]));
        }
    }
}

/// Nearest texel of `rect` at `(u, v)`, kept inside the region so the
/// quad edge never reads the neighbouring region.
fn sample(texture: &VideoFrame, rect: [f32; 4], u: f32, v: f32) -> [u8; 4] {
    let axis = |offset: f32, extent: f32, t: f32, size: u32| {
        let size = size as f32;
        let lo = (offset * size).floor();
        let hi = ((offset + extent) * size).ceil() - 1.0;
        ((offset + t * extent) * size).floor().clamp(lo, hi.max(lo)) as i64
    };
    let x = axis(rect[0], rect[2], u, texture.width);
    let y = axis(rect[1], rect[3], v, texture.height);
    texture.texel(x, y)
}

fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FillMode, LayoutSpec, VideoLayout};

    fn side_by_side(color: [u8; 4], mask: [u8; 4]) -> VideoFrame {
        let mut pixels = Vec::new();
        pixels.extend_from_slice(&color);
        pixels.extend_from_slice(&mask);
        VideoFrame::new(2, 1, 0, pixels)
    }

    fn render(frame: &VideoFrame, premultiplied: bool) -> RgbaImage {
        let mut backend = SoftwareBackend::new().with_premultiplied_output(premultiplied);
        backend.acquire(&RenderSurface::new(1, 1)).unwrap();
        let mut resources = backend.create_resources(&ShaderProgram::bundled()).unwrap();
        backend.upload_frame(&mut resources, frame).unwrap();
        let uniforms = CompositeUniforms::new(
            &LayoutSpec::new(VideoLayout::SideBySide),
            (frame.width, frame.height),
            (1, 1),
            FillMode::Stretch,
            premultiplied,
        );
        backend.draw(&resources, &uniforms, [0.0; 4]).unwrap();
        backend.surface().snapshot()
    }

    #[test]
    fn straight_alpha_keeps_color() {
        let image = render(&side_by_side([200, 100, 50, 255], [128, 0, 0, 255]), false);
        assert_eq!(image.get_pixel(0, 0).0, [200, 100, 50, 128]);
    }

    #[test]
    fn premultiplied_surfaces_scale_color() {
        let image = render(&side_by_side([200, 100, 50, 255], [0, 0, 0, 255]), true);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn contain_leaves_clear_color_outside_the_quad() {
        let mut backend = SoftwareBackend::new();
        backend.acquire(&RenderSurface::new(3, 1)).unwrap();
        let mut resources = backend.create_resources(&ShaderProgram::bundled()).unwrap();
        backend
            .upload_frame(&mut resources, &side_by_side([10, 20, 30, 255], [255, 0, 0, 255]))
            .unwrap();
        let uniforms = CompositeUniforms::new(
            &LayoutSpec::default(),
            (2, 1),
            (3, 1),
            FillMode::Contain,
            false,
        );
        backend.draw(&resources, &uniforms, [0.0, 0.0, 1.0, 1.0]).unwrap();
        let image = backend.surface().snapshot();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [10, 20, 30, 255]);
        assert_eq!(image.get_pixel(2, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn lost_context_rejects_work_until_reacquired() {
        let mut backend = SoftwareBackend::new();
        let controller = backend.controller();
        backend.acquire(&RenderSurface::new(1, 1)).unwrap();
        let mut resources = backend.create_resources(&ShaderProgram::bundled()).unwrap();
        controller.lose_context();
        assert_eq!(backend.poll_context(), ContextStatus::Lost);
        let frame = side_by_side([0; 4], [0; 4]);
        assert!(matches!(
            backend.upload_frame(&mut resources, &frame),
            Err(PlayerError::ContextLost)
        ));
        controller.restore_context();
        backend.acquire(&RenderSurface::new(1, 1)).unwrap();
        // Resources from the previous context stay dead.
        assert!(backend.upload_frame(&mut resources, &frame).is_err());
    }
}
