// src/font/zrle.rs

//! Encoder for the run-length glyph format.
//!
//! A stream is a sequence of tokens. A non-zero byte is one drawn pixel of
//! that intensity. A zero byte is followed by a count of transparent pixels
//! to skip; skips wrap across rows. Skips longer than 255 are split and a
//! trailing skip is omitted, since decoding stops at the end of the stream.

const MAX_SKIP: usize = u8::MAX as usize;

/// Encodes row-major intensities; zero is transparent.
pub fn encode(coverage: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(coverage.len());
    let mut pending_skip = 0usize;

    for &value in coverage {
        if value == 0 {
            pending_skip += 1;
            continue;
        }
        push_skip(&mut out, pending_skip);
        pending_skip = 0;
        out.push(value);
    }

    out
}

fn push_skip(out: &mut Vec<u8>, mut skip: usize) {
    while skip > 0 {
        let run = skip.min(MAX_SKIP);
        out.push(0);
        out.push(run as u8);
        skip -= run;
    }
}
