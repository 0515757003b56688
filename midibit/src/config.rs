//! Monitor configuration
//!
//! Loaded from YAML; every field is optional. The two timeouts default
//! differently in dev and run mode unless the file pins them, and the
//! environment can override both after the file is read.

use crate::dispatch::Command;
use crate::sequence::{SequenceError, TargetSequence};

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const RUN_SESSION_TIMEOUT: f64 = 15.0;
pub const DEV_SESSION_TIMEOUT: f64 = 5.0;
pub const RUN_IDLE_DISPLAY_TIMEOUT: f64 = 60.0;
pub const DEV_IDLE_DISPLAY_TIMEOUT: f64 = 10.0;

pub const SESSION_TIMEOUT_VAR: &str = "MIDIBIT_SESSION_TIMEOUT";
pub const IDLE_DISPLAY_TIMEOUT_VAR: &str = "MIDIBIT_IDLE_DISPLAY_TIMEOUT";

/// G G G Eb F F F D
pub const COMMAND_PREFIX: [u8; 8] = [67, 67, 67, 63, 65, 65, 65, 62];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid command sequence: {0}")]
    Sequence(#[from] SequenceError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Final pitch of each command, appended to the shared prefix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandConfig {
    pub prefix: Vec<u8>,
    pub reset: u8,
    pub toggle_boot: u8,
    pub toggle_mode: u8,
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            prefix: COMMAND_PREFIX.to_vec(),
            reset: 60,
            toggle_boot: 62,
            toggle_mode: 65,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub session_timeout_s: Option<f64>,
    pub idle_display_timeout_s: Option<f64>,
    pub poll_interval_ms: u64,
    pub receive_timeout_ms: u64,
    pub counters_path: PathBuf,
    pub boot_flag_path: PathBuf,
    pub device_filter: Option<String>,
    pub commands: CommandConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session_timeout_s: None,
            idle_display_timeout_s: None,
            poll_interval_ms: 1000,
            receive_timeout_ms: 100,
            counters_path: PathBuf::from("pm_settings.text"),
            boot_flag_path: PathBuf::from("midibit_boot.bin"),
            device_filter: None,
            commands: CommandConfig::default(),
        }
    }
}

/// Effective timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub session: f64,
    pub idle_display: f64,
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Config, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path)?;
        Config::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("session_timeout_s", self.session_timeout_s),
            ("idle_display_timeout_s", self.idle_display_timeout_s),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be a positive number of seconds",
                        name
                    )));
                }
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.receive_timeout_ms == 0 {
            return Err(ConfigError::Invalid("receive_timeout_ms must be > 0".into()));
        }
        self.bindings()?;
        Ok(())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value. Values that are not positive numbers are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |name: &str| {
            lookup(name)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v > 0.0)
        };
        if let Some(v) = parse(SESSION_TIMEOUT_VAR) {
            self.session_timeout_s = Some(v);
        }
        if let Some(v) = parse(IDLE_DISPLAY_TIMEOUT_VAR) {
            self.idle_display_timeout_s = Some(v);
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    pub fn timeouts(&self, dev_mode: bool) -> Timeouts {
        let (session, idle_display) = if dev_mode {
            (DEV_SESSION_TIMEOUT, DEV_IDLE_DISPLAY_TIMEOUT)
        } else {
            (RUN_SESSION_TIMEOUT, RUN_IDLE_DISPLAY_TIMEOUT)
        };
        Timeouts {
            session: self.session_timeout_s.unwrap_or(session),
            idle_display: self.idle_display_timeout_s.unwrap_or(idle_display),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Command sequences in registration order: reset, toggle boot, toggle
    /// mode.
    pub fn bindings(&self) -> Result<Vec<(TargetSequence, Command)>, SequenceError> {
        let c = &self.commands;
        Ok(vec![
            (TargetSequence::with_suffix(&c.prefix, c.reset)?, Command::Reset),
            (
                TargetSequence::with_suffix(&c.prefix, c.toggle_boot)?,
                Command::ToggleBoot,
            ),
            (
                TargetSequence::with_suffix(&c.prefix, c.toggle_mode)?,
                Command::ToggleMode,
            ),
        ])
    }
}
