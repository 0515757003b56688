//! Host MIDI input through `midir`
//!
//! midir delivers messages on its own callback thread; they are forwarded
//! into a bounded crossbeam channel and read back with a timeout from the
//! control loop. midir has no unplug notification, so an open device is
//! considered lost when its port disappears from the enumeration, checked
//! at most once per `PRESENCE_CHECK_INTERVAL`.

use super::port::{DeviceError, DeviceHandle, Enumerator, RecvError};
use super::MidiMessage;

use crossbeam::channel;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use std::env;
use std::time::{Duration, Instant};

pub const DEFAULT_RX_CHANNEL_SIZE: usize = 256;
const PRESENCE_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const CLIENT_NAME: &str = "midibit";

/// Size of the channel between the midir callback and the control loop.
/// `MIDIBIT_RX_BUFSIZE` can raise it, never lower it.
pub fn rx_channel_size() -> usize {
    if let Ok(req) = env::var("MIDIBIT_RX_BUFSIZE") {
        std::cmp::max(req.parse().unwrap_or(0), DEFAULT_RX_CHANNEL_SIZE)
    } else {
        DEFAULT_RX_CHANNEL_SIZE
    }
}

/// Opens the first host MIDI input matching `filter` (a substring of the
/// port name). Without a filter, loopback "Through" ports are skipped.
#[derive(Debug, Clone, Default)]
pub struct HostEnumerator {
    filter: Option<String>,
}

impl HostEnumerator {
    pub fn new(filter: Option<String>) -> HostEnumerator {
        HostEnumerator { filter }
    }

    fn accepts(&self, name: &str) -> bool {
        match &self.filter {
            Some(filter) => name.contains(filter.as_str()),
            None => !name.contains("Through"),
        }
    }

    /// Names of every input port currently visible to the host.
    pub fn port_names() -> Result<Vec<String>, DeviceError> {
        let midi_in = new_input("scan")?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect())
    }

    fn find_port(&self, midi_in: &MidiInput) -> Option<(MidiInputPort, String)> {
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                if self.accepts(&name) {
                    return Some((port, name));
                }
            }
        }
        None
    }
}

fn new_input(role: &str) -> Result<MidiInput, DeviceError> {
    MidiInput::new(&format!("{} {}", CLIENT_NAME, role))
        .map_err(|e| DeviceError::Init(e.to_string()))
}

impl Enumerator for HostEnumerator {
    type Handle = HostDevice;

    fn open(&mut self) -> Result<Option<HostDevice>, DeviceError> {
        let mut midi_in = new_input("input")?;
        let (port, name) = match self.find_port(&midi_in) {
            Some(found) => found,
            None => return Ok(None),
        };
        // Drops sysex, clock and active sensing before they reach the channel.
        midi_in.ignore(Ignore::All);

        let (tx, rx) = channel::bounded::<MidiMessage>(rx_channel_size());
        let connection = midi_in
            .connect(
                &port,
                "midibit-in",
                move |_stamp, bytes, _| {
                    if let Some(msg) = MidiMessage::from_bytes(bytes) {
                        let _ = tx.try_send(msg);
                    }
                },
                (),
            )
            .map_err(|e| DeviceError::Connect {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Some(HostDevice {
            name,
            _connection: connection,
            rx,
            watcher: new_input("watch")?,
            last_check: Instant::now(),
        }))
    }
}

pub struct HostDevice {
    name: String,
    _connection: MidiInputConnection<()>,
    rx: channel::Receiver<MidiMessage>,
    watcher: MidiInput,
    last_check: Instant,
}

impl HostDevice {
    fn still_present(&self) -> bool {
        self.watcher
            .ports()
            .iter()
            .filter_map(|p| self.watcher.port_name(p).ok())
            .any(|n| n == self.name)
    }
}

impl DeviceHandle for HostDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn recv(&mut self, timeout: Duration) -> Result<MidiMessage, RecvError> {
        if self.last_check.elapsed() >= PRESENCE_CHECK_INTERVAL {
            self.last_check = Instant::now();
            if !self.still_present() {
                return Err(RecvError::Disconnected);
            }
        }
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Ok(msg),
            Err(channel::RecvTimeoutError::Timeout) => Err(RecvError::NotReady),
            Err(channel::RecvTimeoutError::Disconnected) => Err(RecvError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HostEnumerator;

    #[test]
    fn filter_selects_ports() {
        let any = HostEnumerator::default();
        assert!(any.accepts("USB MIDI Keyboard"));
        assert!(!any.accepts("Midi Through:Midi Through Port-0 14:0"));

        let roland = HostEnumerator::new(Some("Roland".to_string()));
        assert!(roland.accepts("Roland FP-30 MIDI 1"));
        assert!(!roland.accepts("USB MIDI Keyboard"));
    }
}
