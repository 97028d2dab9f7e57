// src/font/mod.rs

//! Bitmap fonts in the run-length glyph format consumed by the rasterizer.
//!
//! A `Font` maps byte codes to `GlyphDescriptor`s. Codes without an entry
//! fall back to `.` at draw time.

pub mod mono8x8;
pub mod zrle;

use std::collections::HashMap;

pub use mono8x8::builtin_mono;

/// One character's encoded bitmap and placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphDescriptor {
    /// Pixels per bitmap row.
    pub width: u32,
    /// Rows from the pen y to the first bitmap row.
    pub top: u32,
    /// Horizontal placement, biased by half the font's nominal width; the
    /// rasterizer subtracts the bias and clamps at zero.
    pub left: i32,
    pub zrle: Vec<u8>,
}

impl GlyphDescriptor {
    /// Builds a glyph from a row-major intensity matrix `width` pixels wide.
    pub fn from_coverage(width: u32, top: u32, left: i32, coverage: &[u8]) -> Self {
        Self {
            width,
            top,
            left,
            zrle: zrle::encode(coverage),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Font {
    /// Nominal cell width; drives space advance and the `left` bias.
    pub nominal_width: u32,
    glyphs: HashMap<u8, GlyphDescriptor>,
}

impl Font {
    pub fn new(nominal_width: u32) -> Self {
        Self {
            nominal_width,
            glyphs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, code: u8, glyph: GlyphDescriptor) {
        self.glyphs.insert(code, glyph);
    }

    pub fn glyph(&self, code: u8) -> Option<&GlyphDescriptor> {
        self.glyphs.get(&code)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn glyphs(&self) -> impl Iterator<Item = (u8, &GlyphDescriptor)> {
        self.glyphs.iter().map(|(code, glyph)| (*code, glyph))
    }
}
