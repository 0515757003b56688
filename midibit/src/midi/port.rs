//! Abstract MIDI input device
//!
//! An `Enumerator` finds and opens an input; the resulting `DeviceHandle`
//! delivers raw messages until it reports `RecvError::Disconnected`, after
//! which it must be dropped and a new one opened. The host implementation
//! lives in `host`; the scripted one here drives the monitor in tests.

use super::MidiMessage;
use crate::clock::ManualClock;

use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Possible errors when receiving from a `DeviceHandle`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvError {
    /// Nothing arrived within the timeout.
    NotReady,
    /// The device went away. The handle is no longer usable.
    Disconnected,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("MIDI subsystem unavailable: {0}")]
    Init(String),

    #[error("failed to open MIDI input '{name}': {reason}")]
    Connect { name: String, reason: String },
}

pub trait DeviceHandle {
    /// Human readable device name.
    fn name(&self) -> &str;

    /// Waits at most `timeout` for the next message.
    fn recv(&mut self, timeout: Duration) -> Result<MidiMessage, RecvError>;
}

pub trait Enumerator {
    type Handle: DeviceHandle;

    /// Opens the first usable input. `Ok(None)` when nothing suitable is
    /// attached right now.
    fn open(&mut self) -> Result<Option<Self::Handle>, DeviceError>;
}

/// One step of a scripted device.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    Message(MidiMessage),
    /// Nothing arrives for this many seconds.
    Silence(f64),
    Disconnect,
}

/// Device replaying a `Script`, advancing a `ManualClock` while it waits.
/// An exhausted script behaves like an idle keyboard.
#[derive(Debug)]
pub struct ScriptedDevice {
    name: String,
    clock: ManualClock,
    script: VecDeque<Script>,
}

impl ScriptedDevice {
    pub fn new<I>(name: &str, clock: &ManualClock, script: I) -> ScriptedDevice
    where
        I: IntoIterator<Item = Script>,
    {
        ScriptedDevice {
            name: name.to_string(),
            clock: clock.clone(),
            script: script.into_iter().collect(),
        }
    }
}

impl DeviceHandle for ScriptedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn recv(&mut self, timeout: Duration) -> Result<MidiMessage, RecvError> {
        let timeout = timeout.as_secs_f64();
        match self.script.pop_front() {
            Some(Script::Message(msg)) => Ok(msg),
            Some(Script::Silence(secs)) => {
                if secs > timeout {
                    self.clock.advance(timeout);
                    self.script.push_front(Script::Silence(secs - timeout));
                } else {
                    self.clock.advance(secs);
                }
                Err(RecvError::NotReady)
            }
            Some(Script::Disconnect) => Err(RecvError::Disconnected),
            None => {
                self.clock.advance(timeout);
                Err(RecvError::NotReady)
            }
        }
    }
}

/// Hands out scripted devices in order; `None` entries are failed search
/// attempts.
#[derive(Debug, Default)]
pub struct ScriptedEnumerator {
    devices: VecDeque<Option<ScriptedDevice>>,
    attempts: usize,
}

impl ScriptedEnumerator {
    pub fn new<I>(devices: I) -> ScriptedEnumerator
    where
        I: IntoIterator<Item = Option<ScriptedDevice>>,
    {
        ScriptedEnumerator {
            devices: devices.into_iter().collect(),
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Enumerator for ScriptedEnumerator {
    type Handle = ScriptedDevice;

    fn open(&mut self) -> Result<Option<ScriptedDevice>, DeviceError> {
        self.attempts += 1;
        Ok(self.devices.pop_front().flatten())
    }
}
