//! Contact sheet of page thumbnails.
//!
//! Pages are laid out row-major in fixed cells. A sheet holds as many cells as
//! fit the viewport; the sheet shown is the one containing the selected page.

use std::sync::Arc;

use pdfpick_core::{RenderImage, ScreenPoint};

use crate::paint::{blit, stroke_rect, PixelRect};

/// Gap around each thumbnail, in pixels.
const PADDING: u32 = 8;
/// Portrait US Letter; taller pages are clipped at the bottom of the cell.
const PAGE_ASPECT: f32 = 11.0 / 8.5;

const BACKGROUND: u8 = 48;
const SELECTED_COLOR: [u8; 3] = [220, 30, 60];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailGrid {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl ThumbnailGrid {
    pub fn for_viewport(viewport: (f32, f32), thumbnail_width: u32) -> Self {
        let thumbnail_width = thumbnail_width.max(1);
        let thumbnail_height = (thumbnail_width as f32 * PAGE_ASPECT).ceil() as u32;
        let cell_width = thumbnail_width + 2 * PADDING;
        let cell_height = thumbnail_height + 2 * PADDING;
        let columns = (viewport.0.max(0.0) as u32 / cell_width).max(1);
        let rows = (viewport.1.max(0.0) as u32 / cell_height).max(1);
        Self {
            columns,
            rows,
            cell_width,
            cell_height,
        }
    }

    pub fn per_sheet(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn first_on_sheet(&self, page: usize) -> usize {
        page - page % self.per_sheet()
    }

    pub fn sheet_size(&self) -> (u32, u32) {
        (self.columns * self.cell_width, self.rows * self.cell_height)
    }

    /// Slot under `point`, counted from the first cell of the sheet.
    pub fn slot_at(&self, point: ScreenPoint) -> Option<usize> {
        if !(point.x >= 0.0 && point.y >= 0.0) {
            return None;
        }
        let column = point.x as u32 / self.cell_width;
        let row = point.y as u32 / self.cell_height;
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some((row * self.columns + column) as usize)
    }

    /// Moves `dx` cells sideways and `dy` rows, staying inside the document.
    pub fn step(&self, page: usize, dx: i32, dy: i32, page_count: usize) -> usize {
        if page_count == 0 {
            return 0;
        }
        let offset = i64::from(dx) + i64::from(dy) * i64::from(self.columns);
        let last = page_count as i64 - 1;
        (page as i64).saturating_add(offset).clamp(0, last) as usize
    }

    /// Paints `thumbnails` into consecutive slots; `selected` is a slot too.
    pub fn compose(&self, thumbnails: &[Arc<RenderImage>], selected: Option<usize>) -> RenderImage {
        let (width, height) = self.sheet_size();
        let mut sheet = RenderImage {
            width,
            height,
            pixels: [BACKGROUND, BACKGROUND, BACKGROUND, 255].repeat(width as usize * height as usize),
        };
        let inner_width = self.cell_width - 2 * PADDING;
        let inner_height = self.cell_height - 2 * PADDING;
        for (slot, thumbnail) in thumbnails.iter().take(self.per_sheet()).enumerate() {
            let (x, y) = self.cell_origin(slot);
            blit(
                &mut sheet,
                thumbnail,
                x + PADDING,
                y + PADDING,
                inner_width,
                inner_height,
            );
        }
        if let Some(slot) = selected.filter(|&slot| slot < self.per_sheet()) {
            let (x, y) = self.cell_origin(slot);
            let inset = PADDING / 2;
            let rect = PixelRect {
                x0: x + inset,
                y0: y + inset,
                x1: x + self.cell_width - inset,
                y1: y + self.cell_height - inset,
            };
            stroke_rect(&mut sheet, rect, SELECTED_COLOR, 3);
        }
        sheet
    }

    fn cell_origin(&self, slot: usize) -> (u32, u32) {
        let slot = slot as u32;
        (
            (slot % self.columns) * self.cell_width,
            (slot / self.columns) * self.cell_height,
        )
    }
}
