//! Button GPIO through the Linux sysfs interface.
//!
//! The pin lives at `<root>/gpio<N>/`, with `value` holding `0` or `1`.
//! If the pin directory is missing we export it and switch it to input.
//! Edges are interrupt driven: with `edge` set to `both`, the kernel flags
//! `POLLPRI` on the open `value` file whenever the level changes, and
//! `poll(2)` blocks until then.
//!
//! ## Rust concepts
//! - `fs::read_to_string` / `fs::write` for sysfs attribute files
//! - `nix::poll` with a `BorrowedFd` from `AsFd`
//! - `mpsc::Sender` to hand edges to another thread
//! - `Arc<AtomicBool>` as a shared stop flag

use crate::input::{Level, LevelSource, RawEdge};
use crate::time::Clock;
use crate::{BladeError, is_running};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Longest a single edge wait blocks, so the watcher notices the stop flag.
pub const EDGE_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// How long to wait for udev to create the pin directory after export.
const EXPORT_SETTLE: Duration = Duration::from_millis(500);
const EXPORT_POLL: Duration = Duration::from_millis(50);

/// One sysfs GPIO configured as input. Cloning gives another handle to the
/// same pin.
#[derive(Clone, Debug)]
pub struct SysfsPin {
    gpio: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Open GPIO `gpio` under `root` (normally `/sys/class/gpio`) as an
    /// input that interrupts on both edges.
    pub fn open(root: &Path, gpio: u32) -> Result<Self, BladeError> {
        let dir = root.join(format!("gpio{gpio}"));
        let value_path = dir.join("value");

        if !value_path.exists() {
            tracing::info!("Exporting GPIO {}", gpio);
            fs::write(root.join("export"), gpio.to_string()).map_err(BladeError::Gpio)?;
            wait_for(&value_path)?;
        }

        let direction = dir.join("direction");
        let current = fs::read_to_string(&direction).unwrap_or_default();
        if current.trim() != "in" {
            fs::write(&direction, "in").map_err(BladeError::Gpio)?;
        }

        // Rising edges are needed too, or the tracked level goes stale.
        fs::write(dir.join("edge"), "both").map_err(BladeError::Gpio)?;

        Ok(Self { gpio, value_path })
    }

    pub fn gpio(&self) -> u32 {
        self.gpio
    }

    /// Open the value file for edge waits. The initial read arms the
    /// interrupt, so only changes after this call are reported.
    pub fn edge_events(&self) -> Result<EdgeEvents, BladeError> {
        let mut file = File::open(&self.value_path).map_err(BladeError::Gpio)?;
        let last = read_value(&mut file)?;
        Ok(EdgeEvents { file, last })
    }
}

fn wait_for(path: &Path) -> Result<(), BladeError> {
    let mut waited = Duration::ZERO;
    while !path.exists() {
        if waited >= EXPORT_SETTLE {
            return Err(BladeError::Gpio(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} did not appear after export", path.display()),
            )));
        }
        std::thread::sleep(EXPORT_POLL);
        waited += EXPORT_POLL;
    }
    Ok(())
}

/// Parse the contents of a sysfs `value` file.
pub fn parse_level(raw: &str) -> Result<Level, BladeError> {
    match raw.trim() {
        "0" => Ok(Level::Low),
        "1" => Ok(Level::High),
        other => Err(BladeError::Gpio(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected GPIO value {other:?}"),
        ))),
    }
}

/// sysfs wants the value re-read from offset 0 after every interrupt.
fn read_value(file: &mut File) -> Result<Level, BladeError> {
    let mut raw = String::new();
    file.seek(SeekFrom::Start(0)).map_err(BladeError::Gpio)?;
    file.read_to_string(&mut raw).map_err(BladeError::Gpio)?;
    parse_level(&raw)
}

impl LevelSource for SysfsPin {
    fn read_level(&mut self) -> Result<Level, BladeError> {
        let raw = fs::read_to_string(&self.value_path).map_err(BladeError::Gpio)?;
        parse_level(&raw)
    }
}

/// Anything that can block until the button level changes.
pub trait EdgeSource {
    /// Wait up to `timeout` for a level change. `Ok(None)` means nothing
    /// changed in time.
    fn wait_for_edge(&mut self, timeout: Duration) -> Result<Option<Level>, BladeError>;
}

/// Edge interrupts of one sysfs pin.
pub struct EdgeEvents {
    file: File,
    last: Level,
}

impl EdgeSource for EdgeEvents {
    fn wait_for_edge(&mut self, timeout: Duration) -> Result<Option<Level>, BladeError> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let ready = {
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLPRI | PollFlags::POLLERR)];
            match poll(&mut fds, millis) {
                Ok(ready) => ready,
                // Ctrl+C lands here; the caller checks its stop flag.
                Err(Errno::EINTR) => return Ok(None),
                Err(e) => return Err(BladeError::Gpio(e.into())),
            }
        };
        if ready == 0 {
            return Ok(None);
        }

        // A quick press and release can collapse into one wake-up with the
        // level already back where it was.
        let level = read_value(&mut self.file)?;
        if level == self.last {
            return Ok(None);
        }
        self.last = level;
        Ok(Some(level))
    }
}

/// Wait for level changes on `source` and push a `RawEdge` for each one.
///
/// Runs until `running` clears or the receiving side hangs up. Meant to be
/// the body of a dedicated thread.
pub fn watch_edges<E: EdgeSource, C: Clock>(
    mut source: E,
    clock: C,
    edges: Sender<RawEdge>,
    running: Arc<AtomicBool>,
) {
    let mut wait_failing = false;

    while is_running(&running) {
        let level = match source.wait_for_edge(EDGE_WAIT_TIMEOUT) {
            Ok(Some(level)) => {
                wait_failing = false;
                level
            }
            Ok(None) => continue,
            Err(e) => {
                // Log the first failure of a run only.
                if !wait_failing {
                    tracing::warn!("Button edge wait failed: {}", e);
                    wait_failing = true;
                }
                clock.sleep(EDGE_WAIT_TIMEOUT);
                continue;
            }
        };

        let edge = RawEdge {
            level,
            at: clock.now(),
        };
        if edges.send(edge).is_err() {
            tracing::info!("Edge receiver gone, stopping GPIO watcher");
            break;
        }
    }
}
