//! Button input classification: short press vs. hold.
//!
//! Raw level changes arrive as timestamped `RawEdge`s. A falling edge starts
//! a press; after one poll interval of settling the classifier polls the
//! button level until either it is released (`ShortPress`) or the hold
//! threshold is reached (`LongHold`).
//!
//! ```text
//!   Idle ──falling edge──► Pressed ──released before threshold──► ShortPress ─► Idle
//!                             │
//!                             └──still low at threshold──► LongHold ─► wait for release ─► Idle
//! ```
//!
//! After a LongHold the classifier waits for the release with no upper
//! bound: a button that stays held keeps the classifier busy until it is let
//! go. Edges stamped before the previous press resolved, or within the
//! debounce window after it, are contact bounce and are dropped.

use crate::BladeError;
use crate::config::BladeConfig;
use crate::time::Clock;
use std::time::{Duration, Instant};

/// Electrical level of the button input. The button pulls the line low.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

/// A level change observed at the GPIO boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEdge {
    /// Level after the change.
    pub level: Level,
    pub at: Instant,
}

impl RawEdge {
    pub fn falling(at: Instant) -> Self {
        Self {
            level: Level::Low,
            at,
        }
    }

    pub fn rising(at: Instant) -> Self {
        Self {
            level: Level::High,
            at,
        }
    }
}

/// What the user did with the button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongHold,
}

/// Anything that can report the current button level.
pub trait LevelSource {
    fn read_level(&mut self) -> Result<Level, BladeError>;
}

/// Timing knobs for the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierSettings {
    pub hold_threshold: Duration,
    pub debounce: Duration,
    pub poll_interval: Duration,
}

impl ClassifierSettings {
    pub fn from_config(config: &BladeConfig) -> Self {
        Self {
            hold_threshold: config.hold_threshold(),
            debounce: config.debounce(),
            poll_interval: config.poll_interval(),
        }
    }
}

pub struct InputClassifier<L, C> {
    levels: L,
    clock: C,
    settings: ClassifierSettings,
    /// When the last press finished classifying (release seen).
    last_resolved: Option<Instant>,
}

impl<L: LevelSource, C: Clock> InputClassifier<L, C> {
    pub fn new(levels: L, clock: C, settings: ClassifierSettings) -> Self {
        Self {
            levels,
            clock,
            settings,
            last_resolved: None,
        }
    }

    /// Classify one raw edge.
    ///
    /// `emit` is called as soon as the event is known; for a hold that is at
    /// the threshold, before the release wait. Returns the event, or `None`
    /// if the edge was ignored.
    pub fn handle_edge(
        &mut self,
        edge: RawEdge,
        mut emit: impl FnMut(ButtonEvent),
    ) -> Option<ButtonEvent> {
        if edge.level != Level::Low {
            return None;
        }

        if let Some(resolved) = self.last_resolved {
            if edge.at < resolved + self.settings.debounce {
                tracing::debug!("Ignoring bounce edge inside debounce window");
                return None;
            }
        }

        let event = self.classify(edge.at, &mut emit);
        self.last_resolved = Some(self.clock.now());
        Some(event)
    }

    fn classify(
        &mut self,
        pressed_at: Instant,
        emit: &mut impl FnMut(ButtonEvent),
    ) -> ButtonEvent {
        let threshold = self.settings.hold_threshold;
        // Let contact bounce settle so the first sample is not a bounce high.
        self.clock.sleep(self.settings.poll_interval.min(threshold));
        loop {
            let held_for = self.clock.since(pressed_at);
            match self.sample() {
                Level::High => {
                    tracing::debug!("Short press ({} ms)", held_for.as_millis());
                    emit(ButtonEvent::ShortPress);
                    return ButtonEvent::ShortPress;
                }
                Level::Low if held_for >= threshold => {
                    tracing::debug!("Hold detected");
                    emit(ButtonEvent::LongHold);
                    self.wait_for_release();
                    return ButtonEvent::LongHold;
                }
                Level::Low => {
                    // Never overshoot the threshold so a hold is reported on time.
                    let remaining = threshold - held_for;
                    self.clock.sleep(self.settings.poll_interval.min(remaining));
                }
            }
        }
    }

    fn wait_for_release(&mut self) {
        while self.sample() == Level::Low {
            self.clock.sleep(self.settings.poll_interval);
        }
    }

    /// Read the button; a read failure counts as released so a broken pin
    /// can never wedge the classifier.
    fn sample(&mut self) -> Level {
        match self.levels.read_level() {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!("Button read failed, treating as released: {}", e);
                Level::High
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClock, ScriptedButton};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const HOLD: Duration = Duration::from_millis(1000);

    fn settings() -> ClassifierSettings {
        ClassifierSettings {
            hold_threshold: HOLD,
            debounce: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn classifier(
        button: ScriptedButton,
        clock: &FakeClock,
    ) -> InputClassifier<ScriptedButton, FakeClock> {
        InputClassifier::new(button, clock.clone(), settings())
    }

    /// Press the button now for `held_for` and classify the falling edge.
    fn classify_press(held_for: Duration) -> (Option<ButtonEvent>, Vec<ButtonEvent>) {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        button.press(t0, held_for);

        let mut emitted = Vec::new();
        let result =
            classifier(button, &clock).handle_edge(RawEdge::falling(t0), |e| emitted.push(e));
        (result, emitted)
    }

    #[rstest]
    #[case::tap(Duration::from_millis(50), ButtonEvent::ShortPress)]
    #[case::just_under(HOLD - Duration::from_millis(1), ButtonEvent::ShortPress)]
    #[case::exactly_at_threshold(HOLD, ButtonEvent::LongHold)]
    #[case::long(Duration::from_millis(2500), ButtonEvent::LongHold)]
    fn classifies_by_hold_duration(#[case] held_for: Duration, #[case] expected: ButtonEvent) {
        let (result, emitted) = classify_press(held_for);
        assert_eq!(result, Some(expected));
        assert_eq!(emitted, vec![expected]);
    }

    #[test]
    fn hold_is_emitted_before_release() {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        button.press(t0, Duration::from_secs(3));

        let mut emitted_at = None;
        let observer = clock.clone();
        let result = classifier(button, &clock).handle_edge(RawEdge::falling(t0), |_| {
            emitted_at = Some(observer.since(t0));
        });

        assert_eq!(result, Some(ButtonEvent::LongHold));
        assert_eq!(emitted_at, Some(HOLD));
        // The classifier stayed busy until the button came back up.
        assert!(clock.since(t0) > Duration::from_secs(3));
    }

    #[test]
    fn rising_edges_are_ignored() {
        let clock = FakeClock::new();
        let button = ScriptedButton::new(clock.clone());
        let mut classifier = classifier(button, &clock);
        assert_eq!(classifier.handle_edge(RawEdge::rising(clock.now()), |_| {}), None);
    }

    #[test]
    fn bounce_inside_debounce_window_yields_one_event() {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        button.press(t0, Duration::from_millis(40));
        button.press(t0 + Duration::from_millis(60), Duration::from_millis(20));
        let mut classifier = classifier(button, &clock);

        let mut emitted = Vec::new();
        classifier.handle_edge(RawEdge::falling(t0), |e| emitted.push(e));
        let bounce = RawEdge::falling(t0 + Duration::from_millis(60));
        assert_eq!(classifier.handle_edge(bounce, |e| emitted.push(e)), None);

        assert_eq!(emitted, vec![ButtonEvent::ShortPress]);
    }

    #[test]
    fn edges_queued_during_a_hold_are_dropped() {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        button.press(t0, Duration::from_millis(1500));
        let mut classifier = classifier(button, &clock);

        assert_eq!(
            classifier.handle_edge(RawEdge::falling(t0), |_| {}),
            Some(ButtonEvent::LongHold)
        );
        // A bounce captured mid-hold is only delivered after classification.
        let stale = RawEdge::falling(t0 + Duration::from_millis(700));
        assert_eq!(classifier.handle_edge(stale, |_| {}), None);
    }

    #[test]
    fn press_after_debounce_window_is_classified() {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        button.press(t0, Duration::from_millis(100));
        let second = t0 + Duration::from_millis(800);
        button.press(second, Duration::from_millis(100));
        let mut classifier = classifier(button, &clock);

        classifier.handle_edge(RawEdge::falling(t0), |_| {});
        clock.advance(second - clock.now());
        assert_eq!(
            classifier.handle_edge(RawEdge::falling(second), |_| {}),
            Some(ButtonEvent::ShortPress)
        );
    }

    #[test]
    fn hold_poll_is_bounded_by_threshold() {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        button.press(t0, HOLD);
        let mut classifier = classifier(button, &clock);

        classifier.handle_edge(RawEdge::falling(t0), |_| {});
        // One settle interval, then 99 samples before the threshold and one
        // at it. The release wait sees the button down once more.
        assert_eq!(classifier.levels.reads, 102);
    }

    #[test]
    fn bounce_high_right_after_the_edge_does_not_cut_a_hold_short() {
        let clock = FakeClock::new();
        let mut button = ScriptedButton::new(clock.clone());
        let t0 = clock.now();
        // The contact springs back up for a moment right after the edge.
        button.press(t0 + Duration::from_millis(3), Duration::from_secs(2));
        let mut classifier = classifier(button, &clock);

        assert_eq!(
            classifier.handle_edge(RawEdge::falling(t0), |_| {}),
            Some(ButtonEvent::LongHold)
        );
    }

    struct BrokenPin;

    impl LevelSource for BrokenPin {
        fn read_level(&mut self) -> Result<Level, BladeError> {
            Err(BladeError::Gpio(std::io::Error::from(std::io::ErrorKind::NotFound)))
        }
    }

    #[test]
    fn unreadable_pin_counts_as_release() {
        let clock = FakeClock::new();
        let mut classifier = InputClassifier::new(BrokenPin, clock.clone(), settings());
        assert_eq!(
            classifier.handle_edge(RawEdge::falling(clock.now()), |_| {}),
            Some(ButtonEvent::ShortPress)
        );
    }
}
