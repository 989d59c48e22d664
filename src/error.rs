//! Error taxonomy for the blade controller.
//!
//! ## Rust concepts
//! - A plain `enum` as the error type, one variant per failure class
//! - Implementing `Display` and `std::error::Error` by hand
//! - `source()` to expose the underlying I/O cause

use std::fmt;
use std::io;

/// Everything that can go wrong while driving the blade.
///
/// Invalid transitions (e.g. `activate()` while already on) are not errors:
/// the state machine ignores them.
#[derive(Debug)]
pub enum BladeError {
    /// The pixel sink is unreachable or a frame could not be written.
    Connection(io::Error),
    /// The configuration cannot describe a working blade. Fatal at startup.
    InvalidConfig(String),
    /// A logical LED index outside `[0, led_count)`. Indicates a logic bug.
    OutOfRange { index: usize, led_count: usize },
    /// Reading or preparing the button GPIO failed.
    Gpio(io::Error),
}

impl fmt::Display for BladeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "pixel sink connection failed: {e}"),
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            Self::OutOfRange { index, led_count } => {
                write!(f, "LED index {index} out of range for {led_count} LEDs")
            }
            Self::Gpio(e) => write!(f, "GPIO access failed: {e}"),
        }
    }
}

impl std::error::Error for BladeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(e) | Self::Gpio(e) => Some(e),
            Self::InvalidConfig(_) | Self::OutOfRange { .. } => None,
        }
    }
}
