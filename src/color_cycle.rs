//! The fixed, wrapping list of blade colors.

use crate::{BladeError, Color};

/// Index of the color after `current` in a list of `len` colors.
pub fn next_index(len: usize, current: usize) -> usize {
    (current + 1) % len
}

/// An ordered, non-empty list of colors. The caller owns the position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorCycle {
    colors: Vec<Color>,
}

impl ColorCycle {
    pub fn new(colors: Vec<Color>) -> Result<Self, BladeError> {
        if colors.is_empty() {
            return Err(BladeError::InvalidConfig("color list is empty".to_string()));
        }
        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always false; construction rejects an empty list.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn next(&self, current: usize) -> usize {
        next_index(self.colors.len(), current)
    }

    /// Color at `index`, wrapping if the index is past the end.
    pub fn get(&self, index: usize) -> Color {
        self.colors[index % self.colors.len()]
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}
