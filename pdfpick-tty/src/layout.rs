//! Mapping between terminal cells and the engine's viewport pixels.
//!
//! The page is drawn from the top-left cell, so a viewport pixel is simply
//! `cell * cell_size`. The last row is reserved for the status line.

use pdfpick_core::{Frame, ImageIndex, ScreenPoint, ViewportTransform};

use crate::paint::{crop_render_image, fill_rect, stroke_rect, PixelRect};
use pdfpick_core::RenderImage;

/// Used when the terminal does not report its pixel size.
const FALLBACK_CELL: (f32, f32) = (8.0, 16.0);

const BOX_COLOR: [u8; 3] = [0, 120, 215];
const HOVER_COLOR: [u8; 3] = [255, 140, 0];
const SELECTED_COLOR: [u8; 3] = [220, 30, 60];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl TerminalLayout {
    pub fn new(columns: u16, rows: u16, pixel_width: u16, pixel_height: u16) -> Self {
        let columns = u32::from(columns).max(1);
        let rows = u32::from(rows).max(1);
        let (cell_width, cell_height) = if pixel_width > 0 && pixel_height > 0 {
            (
                f32::from(pixel_width) / columns as f32,
                f32::from(pixel_height) / rows as f32,
            )
        } else {
            FALLBACK_CELL
        };
        Self {
            columns,
            rows,
            cell_width,
            cell_height,
        }
    }

    pub fn image_rows(&self) -> u32 {
        self.rows.saturating_sub(1).max(1)
    }

    pub fn status_row(&self) -> u16 {
        self.rows.saturating_sub(1) as u16
    }

    /// Pixel size of the area the page may occupy.
    pub fn viewport_pixels(&self) -> (f32, f32) {
        (
            self.columns as f32 * self.cell_width,
            self.image_rows() as f32 * self.cell_height,
        )
    }

    /// Viewport pixel at the centre of a cell.
    pub fn cell_center(&self, column: u16, row: u16) -> ScreenPoint {
        ScreenPoint::new(
            (f32::from(column) + 0.5) * self.cell_width,
            (f32::from(row) + 0.5) * self.cell_height,
        )
    }

    pub fn cells_for(&self, width: f32, height: f32) -> (u32, u32) {
        let columns = (width / self.cell_width).round().max(1.0) as u32;
        let rows = (height / self.cell_height).round().max(1.0) as u32;
        (columns.min(self.columns), rows.min(self.image_rows()))
    }

    /// Cell placement that shows a `width` x `height` bitmap whole and
    /// centred, never enlarged past one bitmap pixel per viewport pixel.
    /// Returns `(column, row, columns, rows)`.
    pub fn centered_fit(&self, width: u32, height: u32) -> (u16, u16, u32, u32) {
        let (viewport_width, viewport_height) = self.viewport_pixels();
        let width = width.max(1) as f32;
        let height = height.max(1) as f32;
        let scale = (viewport_width / width).min(viewport_height / height).min(1.0);
        let (columns, rows) = self.cells_for(width * scale, height * scale);
        let column = (self.columns - columns) / 2;
        let row = (self.image_rows() - rows) / 2;
        (column as u16, row as u16, columns, rows)
    }
}

/// The part of a frame that falls inside the viewport, cropped and ready to
/// be drawn.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub image: RenderImage,
    /// Size on screen in viewport pixels.
    pub screen_width: f32,
    pub screen_height: f32,
    /// Frame pixels per viewport pixel.
    ratio: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Highlights {
    pub hovered: Option<usize>,
    pub selected: Option<usize>,
}

impl FrameView {
    /// Crops `frame` to what `transform` shows in a `viewport` sized window.
    /// Works for stretched frames too: the frame is mapped onto the page's
    /// content size at the current zoom.
    pub fn new(frame: &Frame, transform: &ViewportTransform, viewport: (f32, f32)) -> Option<Self> {
        let image = &frame.image;
        let (content_width, content_height) = transform.content_size();
        if image.width == 0 || content_width <= 0.0 || content_height <= 0.0 {
            return None;
        }
        let (scroll_x, scroll_y) = transform.scroll();
        let screen_width = (content_width - scroll_x).min(viewport.0);
        let screen_height = (content_height - scroll_y).min(viewport.1);
        if screen_width <= 0.0 || screen_height <= 0.0 {
            return None;
        }

        let ratio = image.width as f32 / content_width;
        let crop_x = (scroll_x * ratio).floor().max(0.0) as u32;
        let crop_y = (scroll_y * ratio).floor().max(0.0) as u32;
        let crop_w = (screen_width * ratio).round().max(1.0) as u32;
        let crop_h = (screen_height * ratio).round().max(1.0) as u32;
        Some(Self {
            image: crop_render_image(image, crop_x, crop_y, crop_w, crop_h),
            screen_width,
            screen_height,
            ratio,
        })
    }

    /// Outlines every interactive image, emphasising the hovered and the
    /// selected ones (by ordinal).
    pub fn paint_boxes(
        &mut self,
        transform: &ViewportTransform,
        index: &ImageIndex,
        highlights: Highlights,
    ) {
        for entry in index.interactive() {
            let screen = transform.to_screen_rect(entry.rect);
            let Some(rect) = PixelRect::from_f32(
                screen.left * self.ratio,
                screen.top * self.ratio,
                screen.right * self.ratio,
                screen.bottom * self.ratio,
                self.image.width,
                self.image.height,
            ) else {
                continue;
            };
            if highlights.selected == Some(entry.ordinal) {
                fill_rect(&mut self.image, rect, SELECTED_COLOR, 0.25);
                stroke_rect(&mut self.image, rect, SELECTED_COLOR, 3);
            } else if highlights.hovered == Some(entry.ordinal) {
                fill_rect(&mut self.image, rect, HOVER_COLOR, 0.2);
                stroke_rect(&mut self.image, rect, HOVER_COLOR, 2);
            } else {
                stroke_rect(&mut self.image, rect, BOX_COLOR, 1);
            }
        }
    }
}
