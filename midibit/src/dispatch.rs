//! Command dispatch
//!
//! The dispatcher owns one `SequenceMatcher` per command, in registration
//! order, together with the session accumulator and the boot flag. Every
//! note-on goes to the accumulator first (command notes count as activity)
//! and then to every matcher. At most one command fires per note: the first
//! matcher in registration order that completes.

use crate::event::Event;
use crate::sequence::{MatchResult, SequenceMatcher, TargetSequence};
use crate::session::SessionAccumulator;
use crate::store::BootFlag;

use std::collections::VecDeque;

/// Actions that can be keyed in at the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Zero both totals and write through.
    Reset,
    /// Flip the persisted dev/run boot flag.
    ToggleBoot,
    /// Switch between practice and play accounting.
    ToggleMode,
}

struct Binding {
    matcher: SequenceMatcher,
    command: Command,
}

pub struct CommandDispatcher {
    bindings: Vec<Binding>,
    accumulator: SessionAccumulator,
    boot_flag: Box<dyn BootFlag>,
    event_queue: VecDeque<Event>,
}

impl CommandDispatcher {
    pub fn new(accumulator: SessionAccumulator, boot_flag: Box<dyn BootFlag>) -> CommandDispatcher {
        CommandDispatcher {
            bindings: Vec::new(),
            accumulator,
            boot_flag,
            event_queue: VecDeque::new(),
        }
    }

    /// Registers `sequence` to trigger `command`. Earlier registrations win
    /// when two sequences complete on the same note.
    pub fn bind(&mut self, sequence: TargetSequence, command: Command) {
        self.bindings.push(Binding {
            matcher: SequenceMatcher::new(sequence),
            command,
        });
    }

    pub fn with_bindings<I>(mut self, bindings: I) -> CommandDispatcher
    where
        I: IntoIterator<Item = (TargetSequence, Command)>,
    {
        for (sequence, command) in bindings {
            self.bind(sequence, command);
        }
        self
    }

    pub fn accumulator(&self) -> &SessionAccumulator {
        &self.accumulator
    }

    /// Handles one (velocity filtered) note-on. Returns the command that
    /// fired, if any.
    pub fn note_on(&mut self, pitch: u8, now: f64) -> Option<Command> {
        self.accumulator.note_on(now);
        self.absorb();

        let mut fired: Option<(Command, f64)> = None;
        for binding in self.bindings.iter_mut() {
            if let MatchResult::Completed { started_at } = binding.matcher.feed(pitch, now) {
                if fired.is_none() {
                    fired = Some((binding.command, started_at));
                }
            }
        }

        let (command, started_at) = fired?;
        self.event_queue.push_back(Event::CommandRecognized(command));
        match command {
            Command::Reset => self.accumulator.reset(now),
            Command::ToggleMode => self.accumulator.toggle_mode(now, started_at),
            Command::ToggleBoot => {
                let event = match self.boot_flag.toggle() {
                    Ok(mode) => Event::BootModeChanged(mode),
                    Err(err) => Event::BootModeChangeFailed(err),
                };
                self.event_queue.push_back(event);
            }
        }
        self.absorb();
        Some(command)
    }

    /// Polls the session timeout.
    pub fn tick(&mut self, now: f64) -> bool {
        let closed = self.accumulator.tick(now);
        self.absorb();
        closed
    }

    pub fn device_lost(&mut self) -> bool {
        let closed = self.accumulator.device_lost();
        self.absorb();
        closed
    }

    pub fn next_event(&mut self) -> Option<Event> {
        self.event_queue.pop_front()
    }

    fn absorb(&mut self) {
        self.event_queue.extend(self.accumulator.drain_events());
    }
}
