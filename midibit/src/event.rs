use crate::dispatch::Command;
use crate::display::format_hms;
use crate::session::Mode;
use crate::store::{BootMode, WriteFailure};

use std::fmt;

/// Status events reported by the monitor to an optional user specified
/// channel, and used internally to drive the display.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// No usable MIDI input was found on this search attempt.
    DeviceSearching { attempt: u64 },
    /// Searching has gone on past the idle display timeout.
    SearchHeartbeat,
    DeviceFound(String),
    /// Opening an input failed; the search carries on.
    DeviceError(String),
    DeviceLost,
    SessionStarted { at: f64 },
    /// The displayed whole-second totals changed.
    TotalsUpdated { practice: i64, play: i64 },
    SessionClosed { mode: Mode, seconds: f64 },
    Saved { practice: i64, play: i64 },
    SaveFailed(WriteFailure),
    CommandRecognized(Command),
    TotalsReset,
    /// Practice/play accounting switched to `mode`; `adjustment` seconds
    /// were taken off the bucket being left.
    ModeChanged { mode: Mode, adjustment: f64 },
    BootModeChanged(BootMode),
    BootModeChangeFailed(WriteFailure),
    /// Not in a session for longer than the idle display timeout.
    DisplayIdle,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::DeviceSearching { attempt } => {
                write!(f, "No MIDI device found on try #{}", attempt)
            }
            Event::SearchHeartbeat => write!(f, "Still looking for MIDI"),
            Event::DeviceFound(name) => write!(f, "Found MIDI device: {}", name),
            Event::DeviceError(err) => write!(f, "MIDI device error: {}", err),
            Event::DeviceLost => write!(f, "MIDI device lost"),
            Event::SessionStarted { .. } => write!(f, "Starting session"),
            Event::TotalsUpdated { practice, play } => write!(
                f,
                "Totals: practice {} play {}",
                format_hms(*practice),
                format_hms(*play)
            ),
            Event::SessionClosed { mode, seconds } => {
                write!(f, "Session over: {:.1}s of {}", seconds, mode.label())
            }
            Event::Saved { practice, play } => write!(f, "Saved {} {}", practice, play),
            Event::SaveFailed(err) => write!(f, "Can't write totals: {}", err),
            Event::CommandRecognized(cmd) => write!(f, "Got command {:?}", cmd),
            Event::TotalsReset => write!(f, "Totals reset"),
            Event::ModeChanged { mode, adjustment } => write!(
                f,
                "Now counting {}; took {:.1}s off the previous mode",
                mode.label(),
                adjustment
            ),
            Event::BootModeChanged(mode) => write!(f, "Boot flag set, Dev: {}", mode.is_dev()),
            Event::BootModeChangeFailed(err) => write!(f, "Can't set boot flag: {}", err),
            Event::DisplayIdle => write!(f, "Display idle"),
        }
    }
}
