use getopts::{Matches, Options};
use midibit::config::{Config, ConfigError};
use midibit::Event;
use std::path::PathBuf;

pub const DEFAULT_TIME_FORMAT: &str = "%T%.3f ";

#[macro_export]
macro_rules! log{
    ($tf:expr, $msg:expr)=>{
    {
        println!("{}{}", chrono::Local::now().format(&$tf), $msg);
    }
    };
    ($tf:expr, $f:expr,$($a:tt)*)=>{
    {
        $crate::log!($tf, format!($f, $($a)*));
    }
    };
}

/// Options every tool understands: where the config, counters and boot
/// flag live.
pub fn storage_options(opts: &mut Options) {
    opts.optopt("c", "", "YAML config file", "path");
    opts.optopt("f", "", "Counters file (default pm_settings.text)", "path");
    opts.optopt("b", "", "Boot flag file (default midibit_boot.bin)", "path");
}

/// Builds the effective config: file given with `-c` (or defaults), then
/// the environment, then `-f`/`-b`/`-m` from the command line.
pub fn load_config(matches: &Matches) -> Result<Config, ConfigError> {
    let mut config = match matches.opt_str("c") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(path) = matches.opt_str("f") {
        config.counters_path = PathBuf::from(path);
    }
    if let Some(path) = matches.opt_str("b") {
        config.boot_flag_path = PathBuf::from(path);
    }
    if matches.opt_defined("m") {
        if let Some(filter) = matches.opt_str("m") {
            config.device_filter = Some(filter);
        }
    }
    Ok(config)
}

/// Log line for `event`, or `None` when it is too chatty for non-verbose
/// output.
pub fn describe(event: &Event, verbose: bool) -> Option<String> {
    match event {
        Event::TotalsUpdated { .. } | Event::CommandRecognized(_) if !verbose => None,
        Event::DeviceSearching { attempt } if !verbose && *attempt > 1 => None,
        _ => Some(event.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Matches {
        let mut opts = Options::new();
        storage_options(&mut opts);
        opts.optopt("m", "", "", "");
        opts.parse(args).unwrap()
    }

    #[test]
    fn command_line_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("midibit.yaml");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        writeln!(f, "counters_path: from_file.text\ndevice_filter: Casio").unwrap();

        let cfg_arg = cfg_path.to_string_lossy().to_string();
        let cfg = load_config(&parse(&["-c", &cfg_arg, "-f", "cli.text"])).unwrap();
        assert_eq!(cfg.counters_path, PathBuf::from("cli.text"));
        assert_eq!(cfg.device_filter.as_deref(), Some("Casio"));

        let cfg = load_config(&parse(&["-c", &cfg_arg, "-m", "Roland"])).unwrap();
        assert_eq!(cfg.counters_path, PathBuf::from("from_file.text"));
        assert_eq!(cfg.device_filter.as_deref(), Some("Roland"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml").to_string_lossy().to_string();
        assert!(matches!(
            load_config(&parse(&["-c", &missing])),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn quiet_logging_skips_chatter() {
        let update = Event::TotalsUpdated {
            practice: 1,
            play: 0,
        };
        assert_eq!(describe(&update, false), None);
        assert!(describe(&update, true).is_some());
        assert!(describe(&Event::DeviceSearching { attempt: 1 }, false).is_some());
        assert_eq!(describe(&Event::DeviceSearching { attempt: 2 }, false), None);
        assert_eq!(
            describe(&Event::DeviceFound("Keys".to_string()), false).as_deref(),
            Some("Found MIDI device: Keys")
        );
    }
}
