//! Status display
//!
//! The physical display is a handful of short text fields. The monitor
//! writes to them through `TextDisplay`; the terminal renderer lives in
//! the tools crate, and `MemoryDisplay` records what was shown for tests.

use std::collections::HashMap;

/// Longest text a region can show. Longer text is cut.
pub const MAX_TEXT_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Practice,
    Play,
    Status,
    Mode,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Practice, Region::Play, Region::Status, Region::Mode];

    pub fn label(self) -> &'static str {
        match self {
            Region::Practice => "Practice",
            Region::Play => "Play",
            Region::Status => "Status",
            Region::Mode => "Mode",
        }
    }
}

pub trait TextDisplay {
    /// Replaces the text of one region. Callers pass at most
    /// `MAX_TEXT_LEN` characters.
    fn set_text(&mut self, region: Region, text: &str);

    /// Clears every region.
    fn blank(&mut self);
}

/// Cuts `text` to `MAX_TEXT_LEN` characters.
pub fn fit(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Formats whole seconds as `H:MM:SS`, with a leading `-` when negative.
pub fn format_hms(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let s = seconds.unsigned_abs();
    format!("{}{}:{:02}:{:02}", sign, s / 3600, (s / 60) % 60, s % 60)
}

/// Activity indicator advanced once per note.
#[derive(Debug, Clone, Default)]
pub struct Spinner {
    pos: usize,
}

impl Spinner {
    const FRAMES: [char; 4] = ['|', '/', '-', '\\'];

    pub fn advance(&mut self) -> char {
        let c = Self::FRAMES[self.pos];
        self.pos = (self.pos + 1) % Self::FRAMES.len();
        c
    }
}

/// Display that remembers the current text of each region.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisplay {
    regions: HashMap<Region, String>,
    blanks: usize,
    history: Vec<(Region, String)>,
}

impl MemoryDisplay {
    pub fn text(&self, region: Region) -> &str {
        self.regions.get(&region).map(|s| s.as_str()).unwrap_or("")
    }

    /// Number of times the display was blanked.
    pub fn blanks(&self) -> usize {
        self.blanks
    }

    /// Every `set_text` call so far, in order.
    pub fn history(&self) -> &[(Region, String)] {
        &self.history
    }

    pub fn is_blank(&self) -> bool {
        self.regions.values().all(|s| s.is_empty())
    }
}

impl TextDisplay for MemoryDisplay {
    fn set_text(&mut self, region: Region, text: &str) {
        let text = fit(text).to_string();
        self.history.push((region, text.clone()));
        self.regions.insert(region, text);
    }

    fn blank(&mut self) {
        self.blanks += 1;
        self.regions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "0:00:00");
        assert_eq!(format_hms(59), "0:00:59");
        assert_eq!(format_hms(3600 + 23 * 60 + 5), "1:23:05");
        assert_eq!(format_hms(100 * 3600), "100:00:00");
        assert_eq!(format_hms(-3), "-0:00:03");
    }

    #[test]
    fn spinner_cycles() {
        let mut s = Spinner::default();
        let frames: String = (0..6).map(|_| s.advance()).collect();
        assert_eq!(frames, "|/-\\|/");
    }

    #[test]
    fn long_text_is_cut() {
        assert_eq!(fit("short"), "short");
        assert_eq!(fit("Found USB MIDI Keyboard Port 1"), "Found USB MIDI Keybo");
        let mut d = MemoryDisplay::default();
        d.set_text(Region::Status, "Found USB MIDI Keyboard Port 1");
        assert_eq!(d.text(Region::Status).len(), MAX_TEXT_LEN);
    }

    #[test]
    fn blank_clears_regions() {
        let mut d = MemoryDisplay::default();
        d.set_text(Region::Practice, "0:00:10");
        assert!(!d.is_blank());
        d.blank();
        assert!(d.is_blank());
        assert_eq!(d.blanks(), 1);
        assert_eq!(d.text(Region::Practice), "");
    }
}
