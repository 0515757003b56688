//! MIDI input
//!
//! Only the note-on/note-off distinction matters here. Everything else a
//! keyboard sends (controllers, pitch bend, clock, sysex) decodes to
//! `DecodedMidi::Other` and is ignored by the monitor.

pub mod host;
pub mod port;
pub mod supervisor;

pub use port::{DeviceError, DeviceHandle, Enumerator, RecvError};
pub use supervisor::{ConnectionSupervisor, Received};

use num_enum::TryFromPrimitive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> MidiMessage {
        MidiMessage {
            status: 0x90 | (channel & 0x0F),
            data1: note,
            data2: velocity,
        }
    }

    pub fn note_off(channel: u8, note: u8) -> MidiMessage {
        MidiMessage {
            status: 0x80 | (channel & 0x0F),
            data1: note,
            data2: 0,
        }
    }

    /// Builds a message from raw bytes as delivered by the host MIDI stack.
    /// Missing data bytes read as zero.
    pub fn from_bytes(bytes: &[u8]) -> Option<MidiMessage> {
        let status = *bytes.first()?;
        Some(MidiMessage {
            status,
            data1: bytes.get(1).copied().unwrap_or(0) & 0x7F,
            data2: bytes.get(2).copied().unwrap_or(0) & 0x7F,
        })
    }
}

/// Upper nibble of a channel voice status byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum StatusKind {
    NoteOff = 0x8,
    NoteOn = 0x9,
    PolyPressure = 0xA,
    ControlChange = 0xB,
    ProgramChange = 0xC,
    ChannelPressure = 0xD,
    PitchBend = 0xE,
    System = 0xF,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodedMidi {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    Other,
}

/// Decodes a message. A note-on with zero velocity is a note-off.
pub fn decode_message(msg: MidiMessage) -> DecodedMidi {
    let channel = msg.status & 0x0F;
    match StatusKind::try_from(msg.status >> 4) {
        Ok(StatusKind::NoteOn) if msg.data2 > 0 => DecodedMidi::NoteOn {
            channel,
            note: msg.data1,
            velocity: msg.data2,
        },
        Ok(StatusKind::NoteOn) | Ok(StatusKind::NoteOff) => DecodedMidi::NoteOff {
            channel,
            note: msg.data1,
        },
        _ => DecodedMidi::Other,
    }
}

/// A note-on that survived velocity filtering, stamped with the monotonic
/// time (in seconds) at which it was received.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub timestamp: f64,
}
