//! Kitty graphics protocol output.

use std::io::Write;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::cursor;
use crossterm::terminal::{Clear, ClearType};
use png::{BitDepth, ColorType, Encoder};
use pdfpick_core::RenderImage;

/// Base64 payload bytes per escape sequence.
const CHUNK_SIZE: usize = 4096;

/// Cell area an image is stretched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Places `image` at the cursor. The image and placement ids are fixed, so
    /// each draw replaces the previous frame instead of stacking on it.
    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<()> {
        let payload = BASE64.encode(encode_png(image)?);
        let header = format!(
            "a=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1",
            self.image_id, self.placement_id, params.columns, params.rows, image.width, image.height
        );
        self.transmit(&header, payload.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn transmit(&mut self, header: &str, payload: &[u8]) -> Result<()> {
        let chunks: Vec<&[u8]> = payload.chunks(CHUNK_SIZE).collect();
        let last = chunks.len().saturating_sub(1);
        if chunks.is_empty() {
            write!(self.writer, "\u{1b}_G{},m=0\u{1b}\\", header)?;
            return Ok(());
        }
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let more = u8::from(idx != last);
            if idx == 0 {
                write!(self.writer, "\u{1b}_G{},m={};", header, more)?;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2;", more)?;
            }
            self.writer.write_all(chunk)?;
            self.writer.write_all(b"\x1b\\")?;
        }
        Ok(())
    }

    /// Removes every image placement from the screen.
    pub fn delete_images(&mut self) -> Result<()> {
        self.writer.write_all(b"\x1b_Ga=d,d=A,q=2\x1b\\")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Terminal holds output until [`Self::end_sync_update`].
    pub fn begin_sync_update(&mut self) -> Result<()> {
        self.writer.write_all(b"\x1b[?2026h")?;
        Ok(())
    }

    pub fn end_sync_update(&mut self) -> Result<()> {
        self.writer.write_all(b"\x1b[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

fn encode_png(image: &RenderImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .context("failed to write PNG header for frame")?;
    writer
        .write_image_data(&image.pixels)
        .context("frame pixel buffer does not match its size")?;
    writer.finish()?;
    Ok(buffer)
}
