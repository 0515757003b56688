//! Connection supervisor
//!
//! Device arrival and removal is the common failure here: a USB keyboard
//! gets unplugged, switched off, or is not there yet at startup. The
//! supervisor keeps that churn away from the accounting code, which only
//! ever sees a note, nothing, or `DeviceLost`.

use super::port::{DeviceHandle, Enumerator, RecvError};
use super::{decode_message, DecodedMidi, NoteEvent};
use crate::clock::Clock;
use crate::event::Event;

use std::time::Duration;

/// Result of one `receive` call.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Note(NoteEvent),
    /// Nothing of interest this tick (no message, or not a note-on).
    Empty,
    /// The handle is dead; drop it and `acquire()` again.
    DeviceLost,
}

pub struct ConnectionSupervisor<E: Enumerator> {
    enumerator: E,
    poll_interval: Duration,
    receive_timeout: Duration,
    search_idle_timeout: f64,
}

impl<E: Enumerator> ConnectionSupervisor<E> {
    pub fn new(
        enumerator: E,
        poll_interval: Duration,
        receive_timeout: Duration,
        search_idle_timeout: f64,
    ) -> ConnectionSupervisor<E> {
        ConnectionSupervisor {
            enumerator,
            poll_interval,
            receive_timeout,
            search_idle_timeout,
        }
    }

    pub fn enumerator(&self) -> &E {
        &self.enumerator
    }

    /// Makes one attempt at opening a device.
    pub fn try_acquire<F: FnMut(Event)>(&mut self, report: &mut F) -> Option<E::Handle> {
        match self.enumerator.open() {
            Ok(Some(handle)) => {
                report(Event::DeviceFound(handle.name().to_string()));
                Some(handle)
            }
            Ok(None) => None,
            Err(err) => {
                report(Event::DeviceError(err.to_string()));
                None
            }
        }
    }

    /// Blocks until a device opens, retrying every `poll_interval`. Once
    /// the search has gone on longer than the idle timeout, every further
    /// attempt also reports a `SearchHeartbeat`.
    pub fn acquire<C: Clock, F: FnMut(Event)>(&mut self, clock: &C, mut report: F) -> E::Handle {
        loop {
            if let Some(handle) = self.acquire_until(clock, &mut report, || false) {
                return handle;
            }
        }
    }

    /// Same as `acquire`, but gives up with `None` as soon as `stop`
    /// returns true. `stop` is checked before every attempt.
    pub fn acquire_until<C, F, S>(&mut self, clock: &C, mut report: F, stop: S) -> Option<E::Handle>
    where
        C: Clock,
        F: FnMut(Event),
        S: Fn() -> bool,
    {
        let search_start = clock.now();
        let mut attempt: u64 = 0;
        while !stop() {
            attempt += 1;
            if let Some(handle) = self.try_acquire(&mut report) {
                return Some(handle);
            }
            report(Event::DeviceSearching { attempt });
            clock.sleep(self.poll_interval);
            if clock.now() - search_start > self.search_idle_timeout {
                report(Event::SearchHeartbeat);
            }
        }
        None
    }

    /// Waits at most the receive timeout for the next note-on.
    pub fn receive<C: Clock>(&self, handle: &mut E::Handle, clock: &C) -> Received {
        match handle.recv(self.receive_timeout) {
            Ok(msg) => match decode_message(msg) {
                DecodedMidi::NoteOn { note, velocity, .. } => Received::Note(NoteEvent {
                    pitch: note,
                    velocity,
                    timestamp: clock.now(),
                }),
                _ => Received::Empty,
            },
            Err(RecvError::NotReady) => Received::Empty,
            Err(RecvError::Disconnected) => Received::DeviceLost,
        }
    }
}
