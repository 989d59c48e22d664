//! Blade thread: owns the blade and the pixel sink, processes commands via a
//! channel.
//!
//! Button presses and HTTP requests both end up as `BladeCommand`s on one
//! `mpsc` channel, so every transition runs on this single thread and no two
//! of them can interleave. A sweep blocks the thread for its full duration;
//! commands that pile up meanwhile are dropped once it ends, which is how
//! the "ignore input while animating" rule looks from the outside.
//!
//! ## Rust concepts
//! - `std::sync::mpsc` channels for thread communication
//! - `Arc<Mutex<T>>` for status shared with the HTTP server
//! - `try_recv()` to drain a channel without blocking

use crate::blade::{Blade, BladePhase};
use crate::input::{ButtonEvent, InputClassifier, LevelSource, RawEdge};
use crate::sink::PixelSink;
use crate::time::Clock;
use crate::{BladeError, Color};
use serde::Serialize;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

// ── Commands ─────────────────────────────────────────────────────────

/// Commands sent to the blade thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BladeCommand {
    /// A classified button event, from the physical button or the API.
    Button(ButtonEvent),
    /// Clear the LEDs and stop the thread.
    Shutdown,
}

// ── Status ───────────────────────────────────────────────────────────

/// Snapshot of the blade, written by the blade thread and read by the HTTP
/// server.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct BladeStatus {
    /// Current blade phase
    pub phase: BladePhase,
    /// Index into the configured color list
    pub color_index: usize,
    /// Current blade color as [red, green, blue]
    #[schema(value_type = Vec<u8>, example = "[255, 0, 0]")]
    pub color: Color,
    /// Frames pushed to the pixel sink since startup
    pub frames_sent: u64,
    /// Whether the last interaction with the pixel sink succeeded
    pub sink_connected: bool,
    /// Server version
    pub version: String,
}

impl BladeStatus {
    pub fn new<S: PixelSink, C: Clock>(blade: &Blade<S, C>, sink_connected: bool) -> Self {
        Self {
            phase: blade.phase(),
            color_index: blade.state().current_color_index,
            color: blade.current_color(),
            frames_sent: blade.frames_sent(),
            sink_connected,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn refresh<S: PixelSink, C: Clock>(&mut self, blade: &Blade<S, C>) {
        self.phase = blade.phase();
        self.color_index = blade.state().current_color_index;
        self.color = blade.current_color();
        self.frames_sent = blade.frames_sent();
    }
}

// ── Blade loop ───────────────────────────────────────────────────────

/// Main blade loop. Runs until a `Shutdown` command arrives or every sender
/// is dropped, then pushes a best-effort all-off frame and hands the blade
/// back.
///
/// Shutdown never interrupts a sweep: the command is only seen once the
/// sweep in progress has finished.
pub fn blade_loop<S: PixelSink, C: Clock>(
    rx: Receiver<BladeCommand>,
    mut blade: Blade<S, C>,
    status: Arc<Mutex<BladeStatus>>,
) -> Blade<S, C> {
    tracing::info!("Blade thread started, waiting for commands...");

    loop {
        let event = match rx.recv() {
            Ok(BladeCommand::Button(event)) => event,
            Ok(BladeCommand::Shutdown) => break,
            Err(_) => {
                tracing::info!("Blade thread: channel closed, shutting down.");
                break;
            }
        };

        let sweep = blade.sweep_phase(event);
        if let Some(phase) = sweep {
            lock(&status).phase = phase;
        }

        let result = blade.handle(event);
        // Drain before publishing the new phase, so anything sent after a
        // client sees the sweep finish is handled normally.
        let shutdown = sweep.is_some() && drain_after_sweep(&rx);
        {
            let mut s = lock(&status);
            s.refresh(&blade);
            match &result {
                Ok(true) => s.sink_connected = true,
                Ok(false) => {}
                Err(BladeError::Connection(_)) => s.sink_connected = false,
                Err(_) => {}
            }
        }

        if shutdown {
            break;
        }
    }

    blade.shutdown();
    lock(&status).refresh(&blade);
    tracing::info!("Blade thread stopped");
    blade
}

/// Drop button commands that queued up during a sweep. Returns true if a
/// shutdown was among them.
fn drain_after_sweep(rx: &Receiver<BladeCommand>) -> bool {
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            BladeCommand::Shutdown => return true,
            BladeCommand::Button(event) => {
                tracing::debug!("Ignoring {:?} received while animating", event);
            }
        }
    }
    false
}

/// Lock the status, recovering it if a previous holder panicked. The status
/// is a plain snapshot, so a poisoned value is still usable.
pub fn lock(status: &Mutex<BladeStatus>) -> std::sync::MutexGuard<'_, BladeStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Classifier loop ──────────────────────────────────────────────────

/// Feed raw edges through the classifier and forward every classified event
/// to the blade thread. Runs until the edge channel closes or the blade
/// thread is gone.
pub fn classifier_loop<L: LevelSource, C: Clock>(
    edges: Receiver<RawEdge>,
    mut classifier: InputClassifier<L, C>,
    commands: Sender<BladeCommand>,
) {
    for edge in edges {
        let mut blade_gone = false;
        classifier.handle_edge(edge, |event| {
            tracing::info!("Button: {:?}", event);
            if commands.send(BladeCommand::Button(event)).is_err() {
                blade_gone = true;
            }
        });
        if blade_gone {
            tracing::info!("Blade thread gone, stopping classifier");
            break;
        }
    }
}
