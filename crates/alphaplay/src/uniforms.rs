use bytemuck::{Pod, Zeroable};

use crate::types::{FillMode, LayoutSpec, RegionOrder, VideoLayout};

/// Normalized sub-rectangle of the source frame (`x`, `y`, `width`, `height`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RegionRect {
    fn as_uniform(self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// Returns `(color, alpha)` rectangles for `layout`.
pub fn region_rects(layout: &LayoutSpec) -> (RegionRect, RegionRect) {
    let split = crate::types::clamp_split(layout.split);
    let (first, second) = match layout.layout {
        VideoLayout::SideBySide => (
            RegionRect {
                x: 0.0,
                y: 0.0,
                width: split,
                height: 1.0,
            },
            RegionRect {
                x: split,
                y: 0.0,
                width: 1.0 - split,
                height: 1.0,
            },
        ),
        VideoLayout::TopBottom => (
            RegionRect {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: split,
            },
            RegionRect {
                x: 0.0,
                y: split,
                width: 1.0,
                height: 1.0 - split,
            },
        ),
    };
    match layout.order {
        RegionOrder::ColorFirst => (first, second),
        RegionOrder::AlphaFirst => (second, first),
    }
}

/// Pixel size of the color region for a `frame_width` x `frame_height` frame.
pub fn content_size(layout: &LayoutSpec, frame_width: u32, frame_height: u32) -> (f32, f32) {
    let (color, _) = region_rects(layout);
    (
        frame_width as f32 * color.width,
        frame_height as f32 * color.height,
    )
}

/// NDC scale applied to the unit quad so the content honours `fill`.
pub fn quad_scale(fill: FillMode, content: (f32, f32), surface: (u32, u32)) -> [f32; 2] {
    let surface_w = surface.0.max(1) as f32;
    let surface_h = surface.1.max(1) as f32;
    let (content_w, content_h) = content;
    if content_w <= 0.0 || content_h <= 0.0 {
        return [1.0, 1.0];
    }
    let fit_x = surface_w / content_w;
    let fit_y = surface_h / content_h;
    let scale = match fill {
        FillMode::Stretch => return [1.0, 1.0],
        FillMode::Contain => fit_x.min(fit_y),
        FillMode::Cover => fit_x.max(fit_y),
    };
    [
        content_w * scale / surface_w,
        content_h * scale / surface_h,
    ]
}

/// Uniform block shared by the vertex and fragment programs.
///
/// The layout must match `CompositeParams` in `shaders/composite.vert` and
/// `shaders/composite.frag`: five std140 `vec4`s.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeUniforms {
    /// Color region as offset (xy) and extent (zw) in texture space.
    pub color_rect: [f32; 4],
    pub alpha_rect: [f32; 4],
    pub alpha_weights: [f32; 4],
    /// Quad scale (xy), premultiply flag (z), unused (w).
    pub quad: [f32; 4],
    /// Surface size (xy) and its reciprocal (zw).
    pub surface: [f32; 4],
}

unsafe impl Zeroable for CompositeUniforms {}
unsafe impl Pod for CompositeUniforms {}

impl CompositeUniforms {
    pub fn new(
        layout: &LayoutSpec,
        frame_size: (u32, u32),
        surface: (u32, u32),
        fill: FillMode,
        premultiply: bool,
    ) -> Self {
        let (color, alpha) = region_rects(layout);
        let content = content_size(layout, frame_size.0, frame_size.1);
        let scale = quad_scale(fill, content, surface);
        let surface_w = surface.0.max(1) as f32;
        let surface_h = surface.1.max(1) as f32;
        Self {
            color_rect: color.as_uniform(),
            alpha_rect: alpha.as_uniform(),
            alpha_weights: layout.alpha_channel.weights(),
            quad: [scale[0], scale[1], if premultiply { 1.0 } else { 0.0 }, 0.0],
            surface: [surface_w, surface_h, 1.0 / surface_w, 1.0 / surface_h],
        }
    }

    pub fn premultiply(&self) -> bool {
        self.quad[2] > 0.5
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface[0] as u32, self.surface[1] as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlphaChannel;

    #[test]
    fn side_by_side_splits_horizontally() {
        let (color, alpha) = region_rects(&LayoutSpec::new(VideoLayout::SideBySide));
        assert_eq!(color.as_uniform(), [0.0, 0.0, 0.5, 1.0]);
        assert_eq!(alpha.as_uniform(), [0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn alpha_first_swaps_regions() {
        let layout = LayoutSpec::new(VideoLayout::TopBottom)
            .with_split(0.25)
            .with_order(RegionOrder::AlphaFirst);
        let (color, alpha) = region_rects(&layout);
        assert_eq!(alpha.as_uniform(), [0.0, 0.0, 1.0, 0.25]);
        assert_eq!(color.as_uniform(), [0.0, 0.25, 1.0, 0.75]);
    }

    #[test]
    fn contain_letterboxes_wide_surfaces() {
        let scale = quad_scale(FillMode::Contain, (100.0, 100.0), (200, 100));
        assert_eq!(scale, [0.5, 1.0]);
    }

    #[test]
    fn cover_overflows_the_short_axis() {
        let scale = quad_scale(FillMode::Cover, (100.0, 100.0), (200, 100));
        assert_eq!(scale, [1.0, 2.0]);
    }

    #[test]
    fn stretch_and_empty_content_use_identity() {
        assert_eq!(quad_scale(FillMode::Stretch, (10.0, 90.0), (5, 5)), [1.0, 1.0]);
        assert_eq!(quad_scale(FillMode::Contain, (0.0, 0.0), (5, 5)), [1.0, 1.0]);
    }

    #[test]
    fn uniforms_pack_layout_parameters() {
        let layout = LayoutSpec::new(VideoLayout::SideBySide).with_alpha_channel(AlphaChannel::Green);
        let uniforms = CompositeUniforms::new(&layout, (200, 100), (100, 100), FillMode::Contain, true);
        assert_eq!(uniforms.alpha_weights, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(&uniforms.quad[..2], &[1.0, 1.0]);
        assert!(uniforms.premultiply());
        assert_eq!(uniforms.surface_size(), (100, 100));
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 80);
    }
}
