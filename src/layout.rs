//! Pixel mapping for a blade made of two opposed strips.
//!
//! The strips are chained electrically but mounted pointing in opposite
//! directions, so physical index 0 and physical index `led_count - 1` both
//! sit at the hilt. Code above this module only speaks in *logical* indices:
//! `0..segment_length` is strip one from hilt to tip, and
//! `segment_length..led_count` is strip two from hilt to tip.

use crate::{BladeError, Color};

/// Map a logical blade position to a physical strip position.
///
/// Strip one is wired forward, strip two reversed:
/// `logical < segment_length` maps to itself, anything above maps to
/// `led_count - 1 - (logical - segment_length)`.
pub fn map_logical_to_physical(
    logical: usize,
    segment_length: usize,
    led_count: usize,
) -> Result<usize, BladeError> {
    if logical >= led_count {
        return Err(BladeError::OutOfRange {
            index: logical,
            led_count,
        });
    }
    if logical < segment_length {
        Ok(logical)
    } else {
        Ok(led_count - 1 - (logical - segment_length))
    }
}

/// Dimensions of a two-strip blade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BladeLayout {
    led_count: usize,
    segment_length: usize,
}

impl BladeLayout {
    /// `led_count` must already be validated as even and at least 2.
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            segment_length: led_count / 2,
        }
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn segment_length(&self) -> usize {
        self.segment_length
    }

    pub fn to_physical(&self, logical: usize) -> Result<usize, BladeError> {
        map_logical_to_physical(logical, self.segment_length, self.led_count)
    }

    /// Physical positions of the LED pair `pair` steps away from the hilt,
    /// one on each strip.
    pub fn pair(&self, pair: usize) -> Result<(usize, usize), BladeError> {
        Ok((
            self.to_physical(pair)?,
            self.to_physical(self.segment_length + pair)?,
        ))
    }
}

// ── Frame ────────────────────────────────────────────────────────────

/// A complete pixel buffer in physical order, ready to push to the sink.
///
/// A frame always holds exactly `led_count` pixels; there is no way to
/// resize it after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<Color>,
}

impl Frame {
    /// Every pixel set to `color`.
    pub fn filled(led_count: usize, color: Color) -> Self {
        Self {
            pixels: vec![color; led_count],
        }
    }

    /// Every pixel off.
    pub fn off(led_count: usize) -> Self {
        Self::filled(led_count, Color::OFF)
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Set one LED pair (both strips, same distance from the hilt).
    pub fn set_pair(
        &mut self,
        layout: &BladeLayout,
        pair: usize,
        color: Color,
    ) -> Result<(), BladeError> {
        let (first, second) = layout.pair(pair)?;
        self.pixels[first] = color;
        self.pixels[second] = color;
        Ok(())
    }

    /// Number of pixels that are not off.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|c| !c.is_off()).count()
    }

    /// Raw `r, g, b, r, g, b, ...` bytes in physical order.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| [c.r, c.g, c.b]).collect()
    }
}
