//! midibit-tool
//!
//! Maintenance commands for the files the monitor keeps, and a MIDI port
//! listing to pick a `-m` filter from.

use midibit::display::format_hms;
use midibit::midi::host::HostEnumerator;
use midibit::store::{BootFlag, BootMode, CounterStore, FileBootFlag, FileCounterStore};
use midibit::Config;
use midibit_tools::{load_config, storage_options};

use getopts::Options;
use std::env;
use std::process::ExitCode;

fn list_ports() -> Result<(), ()> {
    let names = HostEnumerator::port_names().map_err(|e| {
        eprintln!("{}", e);
    })?;
    if names.is_empty() {
        println!("No MIDI inputs found");
    } else {
        println!("MIDI inputs:");
        for name in names {
            println!(" * {}", name);
        }
    }
    Ok(())
}

fn show(config: &Config) -> Result<(), ()> {
    let store = FileCounterStore::new(&config.counters_path);
    let (practice, play) = store.read();
    let boot = FileBootFlag::new(&config.boot_flag_path).load();
    println!("{}:", store.path().display());
    println!("  practice {:>10} ({})", practice, format_hms(practice));
    println!("  play     {:>10} ({})", play, format_hms(play));
    println!("Dev: {}", boot.is_dev());
    Ok(())
}

fn reset(config: &Config) -> Result<(), ()> {
    let mut store = FileCounterStore::new(&config.counters_path);
    store.write(0, 0).map_err(|e| {
        eprintln!("Failed to reset {}: {}", store.path().display(), e);
    })?;
    println!("OK");
    Ok(())
}

fn boot(config: &Config, arg: Option<&str>) -> Result<(), ()> {
    let mut flag = FileBootFlag::new(&config.boot_flag_path);
    let result = match arg {
        None => Ok(flag.load()),
        Some("dev") => flag.store(BootMode::Dev).map(|_| BootMode::Dev),
        Some("run") => flag.store(BootMode::Run).map(|_| BootMode::Run),
        Some("toggle") => flag.toggle(),
        Some(other) => {
            eprintln!("Unknown boot mode '{}', expected dev, run or toggle", other);
            return Err(());
        }
    };
    match result {
        Ok(mode) => {
            println!("Dev: {}", mode.is_dev());
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to write boot flag: {}", e);
            Err(())
        }
    }
}

fn main() -> ExitCode {
    let mut opts = Options::new();
    storage_options(&mut opts);

    let mut args: Vec<String> = env::args().collect();

    macro_rules! die{
        ($f:expr,$($a:tt)*)=>{
        {
            die!(format!($f, $($a)*));
        }
        };
        ($msg:expr)=>{
        {
            eprintln!("ERROR: {}", $msg);
            return ExitCode::FAILURE;
        }
        };
    }
    macro_rules! die_usage{
        ($f:expr,$($a:tt)*)=>{
        {
            die_usage!(format!($f, $($a)*));
        }
        };
        ($msg:expr)=>{
        {
            let usage = format!("Usage: {} [-c config] [-f counters] [-b bootflag] (enum | show | reset | boot [dev|run|toggle])", &args[0]);
            die!("{}\n{}", $msg, opts.usage(&usage));
        }
        };
    }

    let matches = match opts.parse(&mut args[1..]) {
        Ok(m) => m,
        Err(f) => die_usage!("{}", f.to_string()),
    };
    let config = match load_config(&matches) {
        Ok(c) => c,
        Err(e) => die!("{}", e),
    };

    let free: Vec<&str> = matches.free.iter().map(|s| s.as_str()).collect();
    let result = match free.as_slice() {
        ["enum"] => list_ports(),
        ["show"] => show(&config),
        ["reset"] => reset(&config),
        ["boot"] => boot(&config, None),
        ["boot", mode] => boot(&config, Some(*mode)),
        [] => die_usage!("missing command"),
        [cmd, ..] => die_usage!("invalid command '{}'", cmd),
    };

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
