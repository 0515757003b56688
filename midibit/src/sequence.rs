//! Note sequence recognition
//!
//! A `SequenceMatcher` watches a live stream of note pitches for a single
//! fixed `TargetSequence`. To watch for several sequences, create several
//! matchers; they never share state.

use thiserror::Error;

/// Highest valid MIDI pitch.
pub const MAX_PITCH: u8 = 127;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("a target sequence needs at least one note")]
    Empty,

    #[error("pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(u8),
}

/// An ordered, non-empty list of pitches. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSequence(Vec<u8>);

impl TargetSequence {
    pub fn new(pitches: Vec<u8>) -> Result<TargetSequence, SequenceError> {
        if pitches.is_empty() {
            return Err(SequenceError::Empty);
        }
        if let Some(bad) = pitches.iter().find(|p| **p > MAX_PITCH) {
            return Err(SequenceError::PitchOutOfRange(*bad));
        }
        Ok(TargetSequence(pitches))
    }

    /// A shared prefix followed by one distinguishing final pitch.
    pub fn with_suffix(prefix: &[u8], last: u8) -> Result<TargetSequence, SequenceError> {
        let mut pitches = prefix.to_vec();
        pitches.push(last);
        Self::new(pitches)
    }

    pub fn pitches(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> u8 {
        self.0[0]
    }
}

/// Outcome of feeding one pitch to a `SequenceMatcher`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult {
    /// The pitch extended (or restarted) a partial match.
    Progressed,
    /// The pitch completed the sequence. `started_at` is when the first
    /// note of the completing attempt arrived.
    Completed { started_at: f64 },
    /// The pitch broke the partial match.
    Reset,
}

#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    target: TargetSequence,
    /// Number of leading target notes matched so far; zero means no progress.
    matched: usize,
    first_match_time: Option<f64>,
}

impl SequenceMatcher {
    pub fn new(target: TargetSequence) -> SequenceMatcher {
        SequenceMatcher {
            target,
            matched: 0,
            first_match_time: None,
        }
    }

    /// Index of the last matched note, or -1 when there is no progress.
    pub fn cursor(&self) -> isize {
        self.matched as isize - 1
    }

    /// When the current partial match began, if there is one.
    pub fn first_match_time(&self) -> Option<f64> {
        self.first_match_time
    }

    pub fn feed(&mut self, pitch: u8, now: f64) -> MatchResult {
        let expected = self.target.pitches()[self.matched];

        if pitch != expected {
            // A wrong note may still be the start of a fresh attempt.
            if pitch == self.target.first() {
                self.matched = 1;
                self.first_match_time = Some(now);
                return MatchResult::Progressed;
            }
            self.clear();
            return MatchResult::Reset;
        }

        if self.matched == 0 {
            self.first_match_time = Some(now);
        }
        self.matched += 1;

        if self.matched < self.target.len() {
            return MatchResult::Progressed;
        }

        let started_at = self.first_match_time.unwrap_or(now);
        self.clear();
        MatchResult::Completed { started_at }
    }

    fn clear(&mut self) {
        self.matched = 0;
        self.first_match_time = None;
    }
}
