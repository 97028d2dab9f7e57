// src/rasterizer/tests.rs

use super::*;
use crate::display::sync::DrawStatus;
use crate::font::{builtin_mono, zrle};
use test_log::test;

const INK: u8 = 0xff;

fn blank_surface(width: u32, height: u32) -> PixelSurface {
    let mut surface = PixelSurface::allocate(width, height).unwrap();
    surface.fill(0);
    surface
}

fn inked(surface: &PixelSurface) -> Vec<(u32, u32)> {
    let mut points = Vec::new();
    for y in 0..surface.height() {
        for x in 0..surface.width() {
            if surface.pixel(x, y).is_some_and(|px| px[0] != 0) {
                points.push((x, y));
            }
        }
    }
    points
}

/// Rasterizes a picture like `"#.#"` rows into a glyph.
fn glyph_from_art(top: u32, left: i32, art: &[&str]) -> GlyphDescriptor {
    let width = art[0].len() as u32;
    let coverage: Vec<u8> = art
        .iter()
        .flat_map(|row| row.bytes().map(|b| if b == b'#' { INK } else { 0 }))
        .collect();
    GlyphDescriptor::from_coverage(width, top, left, &coverage)
}

/// Nominal width 8, 12 rows tall, with `H`, `i` and `.`.
fn twelve_pixel_font() -> Font {
    let mut font = Font::new(8);
    font.insert(
        b'H',
        glyph_from_art(
            1,
            4 + 1,
            &[
                "##..##", "##..##", "##..##", "##..##", "######", "######",
                "##..##", "##..##", "##..##", "##..##", "##..##",
            ],
        ),
    );
    font.insert(
        b'i',
        glyph_from_art(
            1,
            4,
            &[
                "##", "..", "..", "##", "##", "##", "##", "##", "##", "##", "##",
            ],
        ),
    );
    font.insert(b'.', glyph_from_art(9, 4 + 2, &["##", "##"]));
    font
}

#[test]
fn it_should_advance_over_spaces_without_drawing() {
    let font = twelve_pixel_font();
    let mut surface = blank_surface(32, 16);
    let mut sync = FrameSync::new();

    let advance = draw_char(&mut surface, &mut sync, &font, 0, 0, b' ');

    assert_eq!(advance, 1 + (8 >> 2));
    assert!(inked(&surface).is_empty());
    assert!(!sync.status().contains(DrawStatus::PREDRAWN));
}

#[test]
fn it_should_substitute_the_period_for_unknown_codes() {
    let font = twelve_pixel_font();
    let mut expected = blank_surface(32, 16);
    let mut actual = blank_surface(32, 16);
    let mut sync = FrameSync::new();

    let a = draw_char(&mut expected, &mut sync, &font, 3, 2, b'.');
    let b = draw_char(&mut actual, &mut sync, &font, 3, 2, b'Q');

    assert_eq!(a, b);
    assert_eq!(inked(&expected), inked(&actual));
    assert_eq!(inked(&actual).len(), 4);
}

#[test]
fn it_should_draw_nothing_when_neither_glyph_nor_period_exists() {
    let mut font = Font::new(8);
    font.insert(b'i', glyph_from_art(0, 4, &["#"]));
    let mut surface = blank_surface(16, 16);
    let mut sync = FrameSync::new();

    let advance = draw_char(&mut surface, &mut sync, &font, 0, 0, b'Z');

    assert_eq!(advance, 0);
    assert!(inked(&surface).is_empty());
    assert!(sync.status().is_empty());
}

#[test]
fn it_should_clamp_negative_lead_to_the_pen_position() {
    let mut font = Font::new(8);
    font.insert(b'x', glyph_from_art(2, 1, &["#"]));
    let mut surface = blank_surface(16, 16);
    let mut sync = FrameSync::new();

    let advance = draw_char(&mut surface, &mut sync, &font, 5, 5, b'x');

    assert_eq!(advance, 1);
    assert_eq!(inked(&surface), vec![(5, 7)]);
}

#[test]
fn it_should_write_intensity_to_colour_channels_with_opaque_padding() {
    let mut font = Font::new(8);
    font.insert(
        b'g',
        GlyphDescriptor {
            width: 2,
            top: 0,
            left: 4,
            zrle: vec![0x40, 0x80],
        },
    );
    let mut surface = blank_surface(4, 4);
    let mut sync = FrameSync::new();

    draw_char(&mut surface, &mut sync, &font, 0, 0, b'g');

    assert_eq!(surface.pixel(0, 0), Some([0x40, 0x40, 0x40, 0xff]));
    assert_eq!(surface.pixel(1, 0), Some([0x80, 0x80, 0x80, 0xff]));
}

#[test]
fn it_should_carry_skip_runs_across_row_boundaries() {
    // Width 3: pixel, then skip 4 (two left on row 0, two more on row 1),
    // then a pixel at column 2 of row 1.
    let pixels: Vec<_> = ZrleWalker::new(&[5, 0, 4, 6], 3).collect();
    assert_eq!(
        pixels,
        vec![
            GlyphPixel { col: 0, row: 0, intensity: 5 },
            GlyphPixel { col: 2, row: 1, intensity: 6 },
        ]
    );
}

#[test]
fn it_should_consume_multi_row_skips_one_row_at_a_time() {
    // Skip 7 over width 2 lands on column 1 of row 3.
    let pixels: Vec<_> = ZrleWalker::new(&[0, 7, 9], 2).collect();
    assert_eq!(pixels, vec![GlyphPixel { col: 1, row: 3, intensity: 9 }]);
}

#[test]
fn it_should_flag_a_stream_that_ends_on_a_skip_marker() {
    let mut walker = ZrleWalker::new(&[7, 0], 4);
    assert_eq!(walker.next().map(|p| p.intensity), Some(7));
    assert_eq!(walker.next(), None);
    assert!(walker.is_truncated());

    let mut clean = ZrleWalker::new(&[7, 0, 2, 8], 4);
    assert_eq!(clean.by_ref().count(), 2);
    assert!(!clean.is_truncated());
    assert_eq!(clean.consumed(), 4);
}

#[test]
fn it_should_still_mark_predrawn_for_a_truncated_glyph() {
    let mut font = Font::new(8);
    font.insert(
        b't',
        GlyphDescriptor {
            width: 2,
            top: 0,
            left: 4,
            zrle: vec![0x10, 0],
        },
    );
    let mut surface = blank_surface(4, 4);
    let mut sync = FrameSync::new();

    let advance = draw_char(&mut surface, &mut sync, &font, 0, 0, b't');

    assert_eq!(advance, 2);
    assert_eq!(inked(&surface), vec![(0, 0)]);
    assert!(sync.status().contains(DrawStatus::PREDRAWN));
    assert_eq!(sync.anomalies(), 1);
}

#[test]
fn it_should_not_decode_zero_width_glyphs() {
    assert_eq!(ZrleWalker::new(&[0, 9, 1, 1], 0).count(), 0);
}

#[test]
fn it_should_mark_predrawn_even_when_fully_clipped() {
    let font = twelve_pixel_font();
    let mut surface = blank_surface(10, 10);
    let mut sync = FrameSync::new();

    let advance = draw_char(&mut surface, &mut sync, &font, 500, 500, b'H');

    assert_eq!(advance, 1 + 6);
    assert!(inked(&surface).is_empty());
    assert!(surface.clipped_count() > 0);
    assert!(sync.status().contains(DrawStatus::PREDRAWN));
}

#[test]
fn it_should_keep_every_builtin_glyph_inside_its_width_and_reencode_exactly() {
    for scale in [1, 2, 3] {
        let font = builtin_mono(scale);
        for (code, glyph) in font.glyphs() {
            let mut walker = ZrleWalker::new(&glyph.zrle, glyph.width);
            let pixels: Vec<_> = walker.by_ref().collect();
            assert!(!walker.is_truncated(), "glyph {:#04x}", code);
            assert_eq!(walker.consumed(), glyph.zrle.len(), "glyph {:#04x}", code);
            assert!(pixels.iter().all(|p| p.col < glyph.width), "glyph {:#04x}", code);

            let rows = pixels.iter().map(|p| p.row + 1).max().unwrap_or(0);
            let mut matrix = vec![0u8; (rows * glyph.width) as usize];
            for p in &pixels {
                matrix[(p.row * glyph.width + p.col) as usize] = p.intensity;
            }
            assert_eq!(zrle::encode(&matrix), glyph.zrle, "glyph {:#04x}", code);
        }
    }
}

#[test]
fn it_should_draw_two_separate_clusters_for_hi() {
    let font = twelve_pixel_font();
    let mut surface = blank_surface(80, 20);
    let mut sync = FrameSync::new();

    let (x, y) = (10, 10);
    let h_advance = draw_char(&mut surface, &mut sync, &font, x, y, b'H');
    let i_x = x + h_advance + 1;
    let i_advance = draw_char(&mut surface, &mut sync, &font, i_x, y, b'i');

    let h_glyph = font.glyph(b'H').unwrap();
    let i_glyph = font.glyph(b'i').unwrap();
    let h_origin = (x + glyph_lead(&font, h_glyph), y + h_glyph.top);
    let i_origin = (i_x + glyph_lead(&font, i_glyph), y + i_glyph.top);

    let points = inked(&surface);
    let (h_cluster, i_cluster): (Vec<_>, Vec<_>) =
        points.iter().copied().partition(|(px, _)| *px < i_origin.0);

    assert!(h_cluster.contains(&h_origin));
    assert!(i_cluster.contains(&i_origin));
    let h_right = h_cluster.iter().map(|(px, _)| *px).max().unwrap();
    let i_left = i_cluster.iter().map(|(px, _)| *px).min().unwrap();
    assert!(h_right < i_left);
    assert!(h_advance + i_advance >= h_glyph.width + i_glyph.width);

    // Rows 20 and beyond fall off the 20-row surface.
    assert!(points.iter().all(|(_, py)| *py < 20));
    assert!(surface.clipped_count() > 0);
    assert!(sync.status().contains(DrawStatus::PREDRAWN));
}

#[test]
fn it_should_saturate_the_pen_instead_of_wrapping() {
    assert_eq!(advance_pen(100, 12, 1), 113);
    assert_eq!(advance_pen(u32::MAX - 5, 12, 1), u32::MAX);
    assert_eq!(advance_pen(7, 0, u32::MAX), u32::MAX);
}
