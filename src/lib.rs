//! Lightsaber blade controller.
//!
//! One push-button drives an addressable LED blade made of two physically
//! reversed strips. A short press ignites the blade (or cycles its color once
//! lit), a sustained hold retracts it. Frames are pushed to an Open Pixel
//! Control server that owns the actual LED hardware.
//!
//! This module provides the pieces every other module shares:
//! - The `Color` value type
//! - Signal handling for clean shutdown
//!
//! The components live in their own modules, leaf-first:
//! `layout` → `color_cycle` → `blade` ← `input`, wired together by
//! `controller` and exposed over HTTP by `server`.

pub mod blade;
pub mod color_cycle;
pub mod config;
pub mod controller;
pub mod error;
pub mod gpio;
pub mod input;
pub mod layout;
pub mod server;
pub mod sink;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use error::BladeError;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Color ──────────────────────────────────────────────────────────

/// One RGB pixel value, 8 bits per channel.
///
/// # Rust concept: serde `from`/`into`
/// In config files and JSON responses a color is written as `[r, g, b]`.
/// Routing serde through `[u8; 3]` gives us that format without a
/// hand-written `Deserialize` impl.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// All channels off.
    pub const OFF: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_off(self) -> bool {
        self == Self::OFF
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Color> for [u8; 3] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b]
    }
}

// ── Signal handling ────────────────────────────────────────────────

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the signal handler, the GPIO watcher thread
/// and the main loop. `Arc` gives shared ownership, `AtomicBool` makes the
/// single bool thread-safe without a mutex.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
