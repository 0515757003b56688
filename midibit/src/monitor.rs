//! The control loop
//!
//! `Monitor` ties the pieces together on one thread: it holds at most one
//! open input, polls it with a short timeout, hands notes to the
//! `CommandDispatcher`, and turns the resulting events into display text.
//! Each call to `step()` is one pass of the loop; `run()` repeats it until
//! the stop flag is raised and then flushes any running session.

use crate::clock::Clock;
use crate::config::{Config, ConfigError};
use crate::dispatch::CommandDispatcher;
use crate::display::{fit, format_hms, Region, Spinner, TextDisplay};
use crate::event::Event;
use crate::midi::{ConnectionSupervisor, Enumerator, Received};
use crate::session::{Mode, SessionAccumulator};
use crate::store::{BootFlag, CounterStore};

use crossbeam::channel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Seconds a transient status message stays up before the spinner may
/// replace it.
pub const STATUS_HOLD: f64 = 2.0;
/// Same, for failures.
pub const FAILURE_HOLD: f64 = 5.0;

pub const SEARCHING_TEXT: &str = "Looking for MIDI...";
pub const SAVED_TEXT: &str = "DATA SAVED";
pub const SAVE_FAILED_DEV_TEXT: &str = "FAILED TO SAVE - OK";
pub const SAVE_FAILED_TEXT: &str = "FAILED TO SAVE!";

/// Turns events into display updates and forwards them to the status queue.
struct Presenter<D: TextDisplay> {
    display: D,
    dev_mode: bool,
    spinner: Spinner,
    totals: (i64, i64),
    mode: Mode,
    blanked: bool,
    status_until: Option<f64>,
    status_queue: Option<channel::Sender<Event>>,
}

impl<D: TextDisplay> Presenter<D> {
    fn put(&mut self, region: Region, text: &str) {
        self.display.set_text(region, fit(text));
    }

    fn redraw(&mut self) {
        self.blanked = false;
        self.put(Region::Practice, &format_hms(self.totals.0));
        self.put(Region::Play, &format_hms(self.totals.1));
        self.put(Region::Mode, self.mode.label());
        self.put(Region::Status, "");
        self.status_until = None;
    }

    fn blank(&mut self) {
        if !self.blanked {
            self.blanked = true;
            self.status_until = None;
            self.display.blank();
        }
    }

    fn wake(&mut self) {
        if self.blanked {
            self.redraw();
        }
    }

    fn hold_status(&mut self, text: &str, now: f64, hold: f64) {
        if self.blanked {
            return;
        }
        self.put(Region::Status, text);
        self.status_until = Some(now + hold);
    }

    fn set_status(&mut self, text: &str) {
        if !self.blanked && self.status_until.is_none() {
            self.put(Region::Status, text);
        }
    }

    fn save_failed_text(&self) -> &'static str {
        if self.dev_mode {
            SAVE_FAILED_DEV_TEXT
        } else {
            SAVE_FAILED_TEXT
        }
    }

    /// An accepted note arrived.
    fn note(&mut self) {
        self.wake();
        let frame = self.spinner.advance().to_string();
        self.set_status(&frame);
    }

    fn expire(&mut self, now: f64) {
        if let Some(until) = self.status_until {
            if now >= until {
                self.status_until = None;
                if !self.blanked {
                    self.put(Region::Status, "");
                }
            }
        }
    }

    fn present(&mut self, event: &Event, now: f64) {
        if let Some(queue) = &self.status_queue {
            let _ = queue.try_send(event.clone());
        }
        match event {
            Event::DeviceSearching { attempt: 1 } => self.set_status(SEARCHING_TEXT),
            Event::SearchHeartbeat | Event::DisplayIdle => self.blank(),
            Event::DeviceFound(name) => {
                self.wake();
                self.status_until = None;
                self.set_status(&format!("Found {}", name));
            }
            Event::SessionStarted { .. } => self.wake(),
            Event::TotalsUpdated { practice, play } => {
                self.totals = (*practice, *play);
                if !self.blanked {
                    self.put(Region::Practice, &format_hms(*practice));
                    self.put(Region::Play, &format_hms(*play));
                }
            }
            Event::SessionClosed { .. } => self.set_status(""),
            Event::Saved { .. } => self.hold_status(SAVED_TEXT, now, STATUS_HOLD),
            Event::SaveFailed(_) | Event::BootModeChangeFailed(_) => {
                let text = self.save_failed_text();
                self.hold_status(text, now, FAILURE_HOLD)
            }
            Event::ModeChanged { mode, .. } => {
                self.mode = *mode;
                if !self.blanked {
                    self.put(Region::Mode, mode.label());
                }
            }
            Event::BootModeChanged(mode) => {
                self.hold_status(&format!("Dev: {}", mode.is_dev()), now, STATUS_HOLD)
            }
            _ => {}
        }
    }
}

pub struct Monitor<E: Enumerator, C: Clock, D: TextDisplay> {
    supervisor: ConnectionSupervisor<E>,
    handle: Option<E::Handle>,
    dispatcher: CommandDispatcher,
    clock: C,
    presenter: Presenter<D>,
    idle_display_timeout: f64,
    idle_since: f64,
    stop: Arc<AtomicBool>,
}

impl<E: Enumerator, C: Clock, D: TextDisplay> Monitor<E, C, D> {
    /// Creates a monitor and draws the initial totals. `dev_mode` only
    /// changes how save failures are shown; timeouts are already part of
    /// `supervisor` and `dispatcher`.
    pub fn new(
        supervisor: ConnectionSupervisor<E>,
        dispatcher: CommandDispatcher,
        clock: C,
        display: D,
        dev_mode: bool,
        idle_display_timeout: f64,
    ) -> Monitor<E, C, D> {
        let acc = dispatcher.accumulator();
        let mut presenter = Presenter {
            display,
            dev_mode,
            spinner: Spinner::default(),
            totals: acc.displayed_totals(),
            mode: acc.mode(),
            blanked: false,
            status_until: None,
            status_queue: None,
        };
        presenter.redraw();
        let idle_since = clock.now();
        Monitor {
            supervisor,
            handle: None,
            dispatcher,
            clock,
            presenter,
            idle_display_timeout,
            idle_since,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builds the full pipeline described by `config`.
    pub fn from_config(
        config: &Config,
        dev_mode: bool,
        enumerator: E,
        store: Box<dyn CounterStore>,
        boot_flag: Box<dyn BootFlag>,
        clock: C,
        display: D,
    ) -> Result<Monitor<E, C, D>, ConfigError> {
        let timeouts = config.timeouts(dev_mode);
        let supervisor = ConnectionSupervisor::new(
            enumerator,
            config.poll_interval(),
            config.receive_timeout(),
            timeouts.idle_display,
        );
        let accumulator = SessionAccumulator::new(store, timeouts.session);
        let dispatcher =
            CommandDispatcher::new(accumulator, boot_flag).with_bindings(config.bindings()?);
        Ok(Monitor::new(
            supervisor,
            dispatcher,
            clock,
            display,
            dev_mode,
            timeouts.idle_display,
        ))
    }

    /// Sends every event to `queue` as well. Events are dropped when the
    /// queue is full.
    pub fn with_status_queue(mut self, queue: channel::Sender<Event>) -> Monitor<E, C, D> {
        self.presenter.status_queue = Some(queue);
        self
    }

    /// Flag that makes `run()` return. Setting it also abandons a device
    /// search in progress.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn accumulator(&self) -> &SessionAccumulator {
        self.dispatcher.accumulator()
    }

    pub fn display(&self) -> &D {
        &self.presenter.display
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// One pass of the loop: find a device if there is none, wait briefly
    /// for a note, then run the timers.
    pub fn step(&mut self) {
        if self.handle.is_none() {
            let clock = &self.clock;
            let presenter = &mut self.presenter;
            let stop = &self.stop;
            let found = self.supervisor.acquire_until(
                clock,
                |event| presenter.present(&event, clock.now()),
                || stop.load(Ordering::Relaxed),
            );
            match found {
                Some(handle) => {
                    self.handle = Some(handle);
                    self.idle_since = self.clock.now();
                }
                None => return,
            }
        }

        let received = match self.handle.as_mut() {
            Some(handle) => self.supervisor.receive(handle, &self.clock),
            None => return,
        };
        let now = self.clock.now();
        match received {
            Received::Note(note) => {
                self.presenter.note();
                self.dispatcher.note_on(note.pitch, note.timestamp);
            }
            Received::Empty => {}
            Received::DeviceLost => {
                self.handle = None;
                self.presenter.present(&Event::DeviceLost, now);
                self.dispatcher.device_lost();
            }
        }

        self.dispatcher.tick(now);
        self.drain(now);

        if self.handle.is_some()
            && !self.dispatcher.accumulator().in_session()
            && !self.presenter.blanked
            && now - self.idle_since > self.idle_display_timeout
        {
            self.presenter.present(&Event::DisplayIdle, now);
        }
        self.presenter.expire(now);
    }

    /// Steps until the stop flag is raised, then shuts down.
    pub fn run(&mut self) {
        while !self.stop.load(Ordering::Relaxed) {
            self.step();
        }
        self.shutdown();
    }

    /// Commits and writes any running session, and releases the device.
    pub fn shutdown(&mut self) {
        let now = self.clock.now();
        self.dispatcher.device_lost();
        self.drain(now);
        self.handle = None;
    }

    fn drain(&mut self, now: f64) {
        while let Some(event) = self.dispatcher.next_event() {
            if let Event::SessionClosed { .. } = event {
                self.idle_since = now;
            }
            self.presenter.present(&event, now);
        }
    }
}
