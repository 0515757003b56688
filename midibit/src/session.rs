//! Session accounting
//!
//! `SessionAccumulator` turns a stream of note-on times into practice and
//! play totals. A session starts with the first note after an idle period
//! and ends after `session_timeout` seconds without notes, or when the
//! input device goes away. Only then is the session length added to the
//! active bucket and written to the `CounterStore`.
//!
//! All times are monotonic seconds as `f64`. Totals are kept as `f64` too,
//! and truncated to whole seconds for display and storage.

use crate::event::Event;
use crate::store::CounterStore;

use std::collections::VecDeque;

/// Which bucket receives session time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Practice,
    Play,
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Practice => Mode::Play,
            Mode::Play => Mode::Practice,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Practice => "Practice",
            Mode::Play => "Play",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub practice: f64,
    pub play: f64,
}

impl Totals {
    pub fn get(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Practice => self.practice,
            Mode::Play => self.play,
        }
    }

    fn get_mut(&mut self, mode: Mode) -> &mut f64 {
        match mode {
            Mode::Practice => &mut self.practice,
            Mode::Play => &mut self.play,
        }
    }

    /// Whole seconds, rounded down.
    pub fn whole_seconds(&self) -> (i64, i64) {
        (self.practice.floor() as i64, self.play.floor() as i64)
    }
}

pub struct SessionAccumulator {
    store: Box<dyn CounterStore>,
    session_timeout: f64,

    mode: Mode,
    in_session: bool,
    session_start: f64,
    session_length: f64,
    last_event_time: f64,
    totals: Totals,
    last_displayed: (i64, i64),

    event_queue: VecDeque<Event>,
}

impl SessionAccumulator {
    /// Creates an idle accumulator in practice mode, with totals loaded
    /// from `store`.
    pub fn new(store: Box<dyn CounterStore>, session_timeout: f64) -> SessionAccumulator {
        let (practice, play) = store.read();
        SessionAccumulator {
            store,
            session_timeout,
            mode: Mode::Practice,
            in_session: false,
            session_start: 0.0,
            session_length: 0.0,
            last_event_time: 0.0,
            totals: Totals {
                practice: practice as f64,
                play: play as f64,
            },
            last_displayed: (practice, play),
            event_queue: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn in_session(&self) -> bool {
        self.in_session
    }

    /// Committed totals, not including the running session.
    pub fn totals(&self) -> Totals {
        self.totals
    }

    pub fn session_length(&self) -> f64 {
        self.session_length
    }

    pub fn last_event_time(&self) -> f64 {
        self.last_event_time
    }

    /// Committed totals plus the running session, in whole seconds.
    pub fn displayed_totals(&self) -> (i64, i64) {
        let mut running = self.totals;
        *running.get_mut(self.mode) += self.session_length;
        running.whole_seconds()
    }

    /// Activity signal: a note-on arrived at `now`. A session whose timeout
    /// already ran out is closed first, so the note starts a new one.
    pub fn note_on(&mut self, now: f64) {
        self.tick(now);
        if !self.in_session {
            self.in_session = true;
            self.session_start = now;
            self.session_length = 0.0;
            self.event_queue.push_back(Event::SessionStarted { at: now });
        }
        self.last_event_time = now;
        self.session_length = (now - self.session_start).max(0.0);
        self.update_display(false);
    }

    /// Closes the session once `session_timeout` seconds passed since the
    /// last note. Returns true if the session was closed.
    pub fn tick(&mut self, now: f64) -> bool {
        if self.in_session && now - self.last_event_time >= self.session_timeout {
            self.close_session();
            return true;
        }
        false
    }

    /// The input device went away: close and flush any running session
    /// without waiting for the timeout.
    pub fn device_lost(&mut self) -> bool {
        if self.in_session {
            self.close_session();
            return true;
        }
        false
    }

    /// Zeroes both totals and the running session, and writes through.
    /// A running session keeps going, counting from `now`.
    pub fn reset(&mut self, now: f64) {
        self.totals = Totals::default();
        self.session_length = 0.0;
        self.session_start = now;
        self.event_queue.push_back(Event::TotalsReset);
        self.persist();
        self.update_display(true);
    }

    /// Switches to the other bucket. The time spent keying in the command,
    /// `now - gesture_start`, was counted as activity in the old mode, so
    /// it is taken off the old bucket's total. This is not clamped and can
    /// leave that total negative.
    pub fn toggle_mode(&mut self, now: f64, gesture_start: f64) {
        let adjustment = now - gesture_start;
        *self.totals.get_mut(self.mode) -= adjustment;
        self.mode = self.mode.toggled();
        self.event_queue.push_back(Event::ModeChanged {
            mode: self.mode,
            adjustment,
        });
        self.update_display(true);
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.event_queue.pop_front()
    }

    pub(crate) fn drain_events(&mut self) -> std::collections::vec_deque::Drain<'_, Event> {
        self.event_queue.drain(..)
    }

    fn close_session(&mut self) {
        let seconds = self.session_length;
        *self.totals.get_mut(self.mode) += seconds;
        self.in_session = false;
        self.session_length = 0.0;
        self.event_queue.push_back(Event::SessionClosed {
            mode: self.mode,
            seconds,
        });
        // The in-memory total stays committed even if this fails.
        self.persist();
        self.update_display(false);
    }

    fn persist(&mut self) {
        let (practice, play) = self.totals.whole_seconds();
        let event = match self.store.write(practice, play) {
            Ok(()) => Event::Saved { practice, play },
            Err(err) => Event::SaveFailed(err),
        };
        self.event_queue.push_back(event);
    }

    fn update_display(&mut self, force: bool) {
        let shown = self.displayed_totals();
        if force || shown != self.last_displayed {
            self.last_displayed = shown;
            self.event_queue.push_back(Event::TotalsUpdated {
                practice: shown.0,
                play: shown.1,
            });
        }
    }
}
