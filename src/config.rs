//! Static blade configuration, loaded once at startup.
//!
//! The configuration file is JSON. Every field is optional and falls back to
//! the values of the reference build (60 LEDs, PocketBeagle button on P2_2,
//! OPC server on localhost). Colors are written as `[r, g, b]` arrays:
//!
//! ```json
//! {
//!   "led_count": 60,
//!   "activation_step_delay_ms": 10,
//!   "colors": [[255, 0, 0], [0, 255, 0], [0, 0, 255]]
//! }
//! ```

use crate::{BladeError, Color};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How activation and deactivation are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnitionStyle {
    /// Pair-by-pair sweep from the base to the tip and back.
    #[default]
    Sweep,
    /// One full frame, no animation.
    Instant,
}

/// Everything the controller needs to know about the hardware.
///
/// # Rust concept: `#[serde(default)]`
/// With a container-level `default`, any field missing from the JSON is
/// taken from `BladeConfig::default()`, so a config file only has to list
/// what differs from the reference build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BladeConfig {
    /// Total pixels across both strips. Must be even and at least 2.
    pub led_count: usize,
    /// Delay between two sweep steps.
    pub activation_step_delay_ms: u64,
    /// Press duration at which a press becomes a hold.
    pub hold_threshold_ms: u64,
    /// Quiet window after a resolved press during which edges are ignored.
    pub debounce_ms: u64,
    /// Sampling interval while measuring a hold.
    pub poll_interval_ms: u64,
    pub ignition: IgnitionStyle,
    /// Open Pixel Control server, `host:port`.
    pub sink_address: String,
    pub opc_channel: u8,
    /// Linux GPIO number of the button (sysfs numbering).
    pub button_gpio: u32,
    pub gpio_root: PathBuf,
    /// Color cycle, first entry is the color at startup.
    pub colors: Vec<Color>,
}

impl Default for BladeConfig {
    fn default() -> Self {
        Self {
            led_count: 60,
            activation_step_delay_ms: 10,
            hold_threshold_ms: 1000,
            debounce_ms: 300,
            poll_interval_ms: 10,
            ignition: IgnitionStyle::Sweep,
            sink_address: "localhost:7890".to_string(),
            opc_channel: 0,
            // P2_2 on the PocketBeagle header is GPIO1_27
            button_gpio: 59,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            colors: default_colors(),
        }
    }
}

/// Red, Orange, Yellow, Green, Cyan, Blue, Magenta, White.
pub fn default_colors() -> Vec<Color> {
    vec![
        Color::new(255, 0, 0),
        Color::new(255, 100, 0),
        Color::new(255, 160, 0),
        Color::new(0, 255, 0),
        Color::new(0, 255, 255),
        Color::new(0, 0, 255),
        Color::new(255, 0, 255),
        Color::new(255, 255, 255),
    ]
}

impl BladeConfig {
    /// Read a JSON config file. Does not validate; call `validate()` after
    /// applying any command-line overrides.
    pub fn load(path: &Path) -> Result<Self, BladeError> {
        let text = fs::read_to_string(path).map_err(|e| {
            BladeError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            BladeError::InvalidConfig(format!("cannot parse {}: {e}", path.display()))
        })
    }

    /// Reject configurations that cannot drive a two-strip blade.
    pub fn validate(&self) -> Result<(), BladeError> {
        if self.led_count < 2 || self.led_count % 2 != 0 {
            return Err(BladeError::InvalidConfig(format!(
                "led_count must be even and at least 2, got {}",
                self.led_count
            )));
        }
        if self.colors.is_empty() {
            return Err(BladeError::InvalidConfig("color list is empty".to_string()));
        }
        for (name, value) in [
            ("activation_step_delay_ms", self.activation_step_delay_ms),
            ("hold_threshold_ms", self.hold_threshold_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(BladeError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// LEDs per strip.
    pub fn segment_length(&self) -> usize {
        self.led_count / 2
    }

    pub fn activation_step_delay(&self) -> Duration {
        Duration::from_millis(self.activation_step_delay_ms)
    }

    pub fn hold_threshold(&self) -> Duration {
        Duration::from_millis(self.hold_threshold_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
