//! Pixel operations on RGBA bitmaps before they are shipped to the terminal.

use pdfpick_core::RenderImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    /// Rounds outwards and clips to `width` x `height`. `None` when nothing
    /// is left.
    pub fn from_f32(
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if !(left.is_finite() && top.is_finite() && right.is_finite() && bottom.is_finite()) {
            return None;
        }
        let x0 = left.floor().clamp(0.0, width as f32) as u32;
        let y0 = top.floor().clamp(0.0, height as f32) as u32;
        let x1 = right.ceil().clamp(0.0, width as f32) as u32;
        let y1 = bottom.ceil().clamp(0.0, height as f32) as u32;
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self { x0, y0, x1, y1 })
    }
}

pub fn crop_render_image(
    image: &RenderImage,
    origin_x: u32,
    origin_y: u32,
    width: u32,
    height: u32,
) -> RenderImage {
    if image.width == 0 || image.height == 0 {
        return RenderImage {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
    }

    let width = width.min(image.width).max(1);
    let height = height.min(image.height).max(1);
    let max_origin_x = image.width.saturating_sub(width);
    let max_origin_y = image.height.saturating_sub(height);
    let origin_x = origin_x.min(max_origin_x);
    let origin_y = origin_y.min(max_origin_y);

    let stride = image.width as usize * 4;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);

    for row in 0..height {
        let src_y = origin_y + row;
        let start = src_y as usize * stride + origin_x as usize * 4;
        let end = start + width as usize * 4;
        pixels.extend_from_slice(&image.pixels[start..end]);
    }

    RenderImage {
        width,
        height,
        pixels,
    }
}

pub fn fill_rect(image: &mut RenderImage, rect: PixelRect, color: [u8; 3], alpha: f32) {
    if rect.x0 >= rect.x1 || rect.y0 >= rect.y1 {
        return;
    }
    let width = image.width as usize;
    if width == 0 || image.height == 0 {
        return;
    }

    let x1 = rect.x1.min(image.width);
    let y1 = rect.y1.min(image.height);
    let x0 = rect.x0.min(x1);
    let y0 = rect.y0.min(y1);

    for y in y0..y1 {
        let row_start = (y as usize) * width * 4;
        for x in x0..x1 {
            let idx = row_start + (x as usize) * 4;
            blend_pixel(&mut image.pixels[idx..idx + 4], color, alpha);
        }
    }
}

/// Draws a `thickness` pixel border just inside `rect`.
pub fn stroke_rect(image: &mut RenderImage, rect: PixelRect, color: [u8; 3], thickness: u32) {
    let t = thickness
        .max(1)
        .min((rect.x1 - rect.x0).max(1))
        .min((rect.y1 - rect.y0).max(1));
    let edges = [
        PixelRect {
            y1: rect.y0 + t,
            ..rect
        },
        PixelRect {
            y0: rect.y1.saturating_sub(t),
            ..rect
        },
        PixelRect {
            x1: rect.x0 + t,
            ..rect
        },
        PixelRect {
            x0: rect.x1.saturating_sub(t),
            ..rect
        },
    ];
    for edge in edges {
        fill_rect(image, edge, color, 1.0);
    }
}

/// Copies `src` into `dst` with its top-left corner at (`x`, `y`), showing at
/// most `max_width` x `max_height` of it. Anything past `dst` is clipped.
pub fn blit(dst: &mut RenderImage, src: &RenderImage, x: u32, y: u32, max_width: u32, max_height: u32) {
    if x >= dst.width || y >= dst.height {
        return;
    }
    let width = src.width.min(max_width).min(dst.width - x) as usize;
    let height = src.height.min(max_height).min(dst.height - y);
    if width == 0 {
        return;
    }
    let dst_stride = dst.width as usize * 4;
    let src_stride = src.width as usize * 4;
    for row in 0..height {
        let from = row as usize * src_stride;
        let to = (y + row) as usize * dst_stride + x as usize * 4;
        dst.pixels[to..to + width * 4].copy_from_slice(&src.pixels[from..from + width * 4]);
    }
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (channel, target) in pixel.iter_mut().zip(color) {
        *channel = ((*channel as f32 * inv) + (target as f32 * alpha))
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}
