//! The blade state machine: ignition, color changes, retraction.
//!
//! ```text
//!          activate()                 sweep done
//!   Off ──────────────► Igniting ──────────────► On ──┐ advance_color()
//!    ▲                                            │ ◄─┘
//!    │      sweep done              deactivate()  │
//!    └────────────────── Deactivating ◄───────────┘
//! ```
//!
//! A sweep is a blocking run of {update frame, send frame, sleep} steps.
//! While it runs the `animating` flag is set and every other transition is
//! ignored. Invalid transitions are silent no-ops, not errors.
//!
//! ## Rust concepts
//! - Generic struct over two traits (`PixelSink`, `Clock`) so tests can run
//!   the exact same code against a recording sink and a fake clock
//! - `Result<bool, _>` to tell "ignored" apart from "ran" and "failed"

use crate::color_cycle::ColorCycle;
use crate::config::{BladeConfig, IgnitionStyle};
use crate::input::ButtonEvent;
use crate::layout::{BladeLayout, Frame};
use crate::sink::PixelSink;
use crate::time::Clock;
use crate::{BladeError, Color};
use serde::Serialize;
use std::time::Duration;

/// What the blade is doing right now, as reported over the status API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BladePhase {
    Off,
    Igniting,
    On,
    Deactivating,
}

/// Mutable blade state. Owned by exactly one `Blade`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BladeState {
    pub is_on: bool,
    /// Always a valid index into the color cycle.
    pub current_color_index: usize,
    /// Set for the whole duration of a sweep.
    pub animating: bool,
}

/// Which way a sweep runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sweep {
    /// Hilt to tip, lighting pairs.
    Ignite,
    /// Tip to hilt, clearing pairs.
    Retract,
}

pub struct Blade<S, C> {
    layout: BladeLayout,
    cycle: ColorCycle,
    ignition: IgnitionStyle,
    step_delay: Duration,
    state: BladeState,
    frames_sent: u64,
    sink: S,
    clock: C,
}

impl<S: PixelSink, C: Clock> Blade<S, C> {
    /// Build a blade from a configuration. Fails fast on an invalid one.
    pub fn new(config: &BladeConfig, sink: S, clock: C) -> Result<Self, BladeError> {
        config.validate()?;
        Ok(Self {
            layout: BladeLayout::new(config.led_count),
            cycle: ColorCycle::new(config.colors.clone())?,
            ignition: config.ignition,
            step_delay: config.activation_step_delay(),
            state: BladeState::default(),
            frames_sent: 0,
            sink,
            clock,
        })
    }

    pub fn state(&self) -> &BladeState {
        &self.state
    }

    pub fn phase(&self) -> BladePhase {
        match (self.state.animating, self.state.is_on) {
            (true, false) => BladePhase::Igniting,
            (true, true) => BladePhase::Deactivating,
            (false, true) => BladePhase::On,
            (false, false) => BladePhase::Off,
        }
    }

    pub fn current_color(&self) -> Color {
        self.cycle.get(self.state.current_color_index)
    }

    pub fn colors(&self) -> &[Color] {
        self.cycle.colors()
    }

    pub fn layout(&self) -> BladeLayout {
        self.layout
    }

    /// Frames successfully pushed to the sink so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The transient phase `event` would start, if it starts a sweep.
    pub fn sweep_phase(&self, event: ButtonEvent) -> Option<BladePhase> {
        if self.state.animating {
            return None;
        }
        match event {
            ButtonEvent::ShortPress if !self.state.is_on => Some(BladePhase::Igniting),
            ButtonEvent::LongHold if self.state.is_on => Some(BladePhase::Deactivating),
            _ => None,
        }
    }

    /// Dispatch a classified button event.
    ///
    /// A short press ignites the blade, or cycles the color if it is already
    /// lit. A hold retracts it.
    pub fn handle(&mut self, event: ButtonEvent) -> Result<bool, BladeError> {
        match event {
            ButtonEvent::ShortPress if self.state.is_on => self.advance_color(),
            ButtonEvent::ShortPress => self.activate(),
            ButtonEvent::LongHold => self.deactivate(),
        }
    }

    /// Ignite the blade. Returns `Ok(false)` if it was already on or busy.
    pub fn activate(&mut self) -> Result<bool, BladeError> {
        if self.state.is_on || self.state.animating {
            tracing::debug!("Ignoring activate: blade is {:?}", self.phase());
            return Ok(false);
        }

        self.run_sweep(Sweep::Ignite)?;
        self.state.is_on = true;
        tracing::info!("Lightsaber activated");
        Ok(true)
    }

    /// Retract the blade. Returns `Ok(false)` if it was already off or busy.
    pub fn deactivate(&mut self) -> Result<bool, BladeError> {
        if !self.state.is_on || self.state.animating {
            tracing::debug!("Ignoring deactivate: blade is {:?}", self.phase());
            return Ok(false);
        }

        self.run_sweep(Sweep::Retract)?;
        self.state.is_on = false;
        tracing::info!("Lightsaber deactivated");
        Ok(true)
    }

    /// Switch the lit blade to the next color in one frame.
    ///
    /// Rejected while off or mid-sweep. The color index only moves once the
    /// frame is out, so the state keeps matching what the LEDs show.
    pub fn advance_color(&mut self) -> Result<bool, BladeError> {
        if !self.state.is_on || self.state.animating {
            tracing::debug!("Ignoring color change: blade is {:?}", self.phase());
            return Ok(false);
        }

        let next = self.cycle.next(self.state.current_color_index);
        let color = self.cycle.get(next);
        let frame = Frame::filled(self.layout.led_count(), color);
        if let Err(e) = self.push(&frame) {
            tracing::error!("Color change failed: {}", e);
            return Err(e);
        }

        self.state.current_color_index = next;
        tracing::info!("Color changed to: {:?}", color);
        Ok(true)
    }

    /// Best-effort all-off frame for process exit. The state always ends
    /// `Off`, whether or not the frame got through.
    pub fn shutdown(&mut self) {
        let frame = Frame::off(self.layout.led_count());
        match self.push(&frame) {
            Ok(()) => tracing::info!("All LEDs off"),
            Err(e) => tracing::warn!("Could not clear LEDs on shutdown: {}", e),
        }
        self.state.is_on = false;
        self.state.animating = false;
    }

    // ── Sweeps ───────────────────────────────────────────────────────

    /// Run a sweep with the `animating` guard held. On any failure the
    /// guard is released and no further frames are sent.
    fn run_sweep(&mut self, sweep: Sweep) -> Result<(), BladeError> {
        self.state.animating = true;
        let result = self.sweep_frames(sweep);
        self.state.animating = false;

        if let Err(e) = &result {
            tracing::error!("{:?} sweep aborted: {}", sweep, e);
        }
        result
    }

    fn sweep_frames(&mut self, sweep: Sweep) -> Result<(), BladeError> {
        let led_count = self.layout.led_count();
        let color = self.current_color();

        if self.ignition == IgnitionStyle::Instant {
            let frame = match sweep {
                Sweep::Ignite => Frame::filled(led_count, color),
                Sweep::Retract => Frame::off(led_count),
            };
            return self.push(&frame);
        }

        let segment_length = self.layout.segment_length();
        let mut frame = match sweep {
            Sweep::Ignite => Frame::off(led_count),
            Sweep::Retract => Frame::filled(led_count, color),
        };

        for step in 0..segment_length {
            // Ignition lights the pair `step` away from the hilt; retraction
            // clears from the tip back, so its first step is the last pair.
            let (pair, pixel) = match sweep {
                Sweep::Ignite => (step, color),
                Sweep::Retract => (segment_length - 1 - step, Color::OFF),
            };
            frame.set_pair(&self.layout, pair, pixel)?;
            self.push(&frame)?;
            self.clock.sleep(self.step_delay);
        }
        Ok(())
    }

    fn push(&mut self, frame: &Frame) -> Result<(), BladeError> {
        self.sink.send_frame(frame)?;
        self.frames_sent += 1;
        Ok(())
    }
}
