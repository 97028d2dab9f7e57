// src/rasterizer.rs

//! Glyph rasterizer: walks a glyph's run-length stream and blits it
//! straight into the shared pixel surface.
//!
//! Drawn pixels are grey (the intensity copied into B, G and R) with an
//! opaque padding byte. Skipped pixels leave the surface untouched.

use crate::display::sync::FrameSync;
use crate::error::Anomaly;
use crate::font::{Font, GlyphDescriptor};
use crate::surface::PixelSurface;
use log::warn;

const OPAQUE: u8 = 0xff;

/// A drawn pixel relative to the glyph origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPixel {
    pub col: u32,
    pub row: u32,
    pub intensity: u8,
}

/// Decodes a run-length stream into positioned pixels.
///
/// The column never reaches `width`: a drawn pixel that fills the row, or a
/// skip that reaches its end, wraps to column zero of the next row. Long
/// skips are consumed one row remainder at a time.
pub struct ZrleWalker<'a> {
    stream: &'a [u8],
    pos: usize,
    width: u32,
    col: u32,
    row: u32,
    row_left: u32,
    skip_left: u32,
    truncated: bool,
}

impl<'a> ZrleWalker<'a> {
    pub fn new(stream: &'a [u8], width: u32) -> Self {
        Self {
            stream,
            pos: 0,
            width,
            col: 0,
            row: 0,
            row_left: width,
            skip_left: 0,
            truncated: false,
        }
    }

    /// Bytes of the stream consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// True once the walk hit a skip marker with no count byte after it.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn next_row(&mut self) {
        self.col = 0;
        self.row += 1;
        self.row_left = self.width;
    }
}

impl Iterator for ZrleWalker<'_> {
    type Item = GlyphPixel;

    fn next(&mut self) -> Option<GlyphPixel> {
        if self.width == 0 {
            return None;
        }
        loop {
            if self.pos >= self.stream.len() {
                return None;
            }
            if self.skip_left > 0 {
                if self.skip_left >= self.row_left {
                    self.skip_left -= self.row_left;
                    self.next_row();
                    continue;
                }
                self.row_left -= self.skip_left;
                self.col += self.skip_left;
                self.skip_left = 0;
            }

            let token = self.stream[self.pos];
            self.pos += 1;
            if token == 0 {
                match self.stream.get(self.pos) {
                    Some(count) => {
                        self.skip_left = u32::from(*count);
                        self.pos += 1;
                        continue;
                    }
                    None => {
                        self.truncated = true;
                        return None;
                    }
                }
            }

            let pixel = GlyphPixel {
                col: self.col,
                row: self.row,
                intensity: token,
            };
            self.col += 1;
            self.row_left -= 1;
            if self.row_left == 0 {
                self.next_row();
            }
            return Some(pixel);
        }
    }
}

/// Pen x after a glyph `advance` plus inter-glyph `spacing`; stops at the
/// far edge of the coordinate space instead of wrapping.
pub fn advance_pen(x: u32, advance: u32, spacing: u32) -> u32 {
    x.saturating_add(advance).saturating_add(spacing)
}

/// Horizontal offset of the glyph from the pen x.
pub fn glyph_lead(font: &Font, glyph: &GlyphDescriptor) -> u32 {
    let bias = (font.nominal_width >> 1) as i32;
    (glyph.left - bias).max(0) as u32
}

/// Draws `code` with its origin at pen position (`x`, `y`) and returns the
/// horizontal advance.
///
/// A space only advances. Codes missing from the font draw `.` instead; if
/// that is missing too nothing is drawn and the advance is zero. Any drawn
/// glyph marks the frame as predrawn, even when clipping hid every pixel.
pub fn draw_char(
    surface: &mut PixelSurface,
    sync: &mut FrameSync,
    font: &Font,
    x: u32,
    y: u32,
    code: u8,
) -> u32 {
    if code == b' ' {
        return 1 + (font.nominal_width >> 2);
    }

    let glyph = match font.glyph(code).or_else(|| font.glyph(b'.')) {
        Some(glyph) => glyph,
        None => return 0,
    };

    let lead = glyph_lead(font, glyph);
    let origin_x = x.saturating_add(lead);
    let origin_y = y.saturating_add(glyph.top);

    let mut walker = ZrleWalker::new(&glyph.zrle, glyph.width);
    for px in walker.by_ref() {
        surface.set_pixel(
            origin_x.saturating_add(px.col),
            origin_y.saturating_add(px.row),
            [px.intensity, px.intensity, px.intensity, OPAQUE],
        );
    }
    if walker.is_truncated() {
        let anomaly = Anomaly::TruncatedGlyphStream {
            code,
            consumed: walker.consumed(),
            len: glyph.zrle.len(),
        };
        warn!("{}", anomaly);
        sync.record_anomaly();
    }

    sync.mark_predrawn();
    lead + glyph.width
}

#[cfg(test)]
mod tests;
