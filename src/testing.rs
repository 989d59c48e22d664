//! Test doubles shared by the unit tests.

use crate::BladeError;
use crate::input::{Level, LevelSource};
use crate::layout::Frame;
use crate::sink::PixelSink;
use crate::time::Clock;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct FakeTime {
    offset: Duration,
    slept: Duration,
}

/// A clock that only moves when something sleeps on it (or `advance` is
/// called). Clones share the same time and can cross threads.
#[derive(Clone)]
pub(crate) struct FakeClock {
    start: Instant,
    time: Arc<Mutex<FakeTime>>,
}

impl FakeClock {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
            time: Arc::new(Mutex::new(FakeTime::default())),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.time.lock().unwrap().offset += by;
    }

    /// Total time spent in `sleep`.
    pub(crate) fn slept(&self) -> Duration {
        self.time.lock().unwrap().slept
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.time.lock().unwrap().offset
    }

    fn sleep(&self, duration: Duration) {
        let mut time = self.time.lock().unwrap();
        time.slept += duration;
        time.offset += duration;
    }
}

/// Keeps every frame it receives. Can be told to fail from the n-th send on.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) frames: Vec<Frame>,
    pub(crate) fail_from: Option<usize>,
    pub(crate) unreachable: bool,
}

impl RecordingSink {
    pub(crate) fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::default()
        }
    }
}

impl PixelSink for RecordingSink {
    fn can_connect(&mut self) -> bool {
        !self.unreachable
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<(), BladeError> {
        if self.unreachable || self.fail_from.is_some_and(|n| self.frames.len() >= n) {
            return Err(BladeError::Connection(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// A button pressed at `pressed_at` and held for `held_for`, read against a
/// shared fake clock. The button reads `Low` for the whole closed interval
/// `[pressed_at, pressed_at + held_for]`.
pub(crate) struct ScriptedButton {
    clock: FakeClock,
    presses: Vec<(Instant, Duration)>,
    pub(crate) reads: usize,
}

impl ScriptedButton {
    pub(crate) fn new(clock: FakeClock) -> Self {
        Self {
            clock,
            presses: Vec::new(),
            reads: 0,
        }
    }

    pub(crate) fn press(&mut self, pressed_at: Instant, held_for: Duration) {
        self.presses.push((pressed_at, held_for));
    }
}

impl LevelSource for ScriptedButton {
    fn read_level(&mut self) -> Result<Level, BladeError> {
        self.reads += 1;
        let now = self.clock.now();
        let held = self
            .presses
            .iter()
            .any(|&(at, held_for)| now >= at && now <= at + held_for);
        Ok(if held { Level::Low } else { Level::High })
    }
}
