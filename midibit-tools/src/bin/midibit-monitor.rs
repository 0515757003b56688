//! midibit-monitor
//!
//! Watches the first MIDI keyboard it can find and keeps the practice and
//! play totals up to date, on the terminal or as plain log output.

use midibit::clock::MonotonicClock;
use midibit::display::{Region, TextDisplay};
use midibit::midi::host::HostEnumerator;
use midibit::store::{BootFlag, FileBootFlag, FileCounterStore};
use midibit::{Event, Monitor};
use midibit_tools::{describe, load_config, log, storage_options, DEFAULT_TIME_FORMAT};

use crossbeam::channel;
use crossterm::{cursor, event, style, terminal, ExecutableCommand, QueueableCommand};
use getopts::Options;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

const LOG_LINES: usize = 12;

/// Full screen rendering of the display regions, with the most recent log
/// lines underneath.
struct Screen {
    stdout: io::Stdout,
    regions: HashMap<Region, String>,
    log: VecDeque<String>,
}

impl Screen {
    fn setup() -> io::Result<Screen> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Screen {
            stdout,
            regions: HashMap::new(),
            log: VecDeque::new(),
        })
    }

    fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(line);
    }

    fn draw(&mut self) -> io::Result<()> {
        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout.queue(terminal::Clear(terminal::ClearType::All))?;
        for region in Region::ALL {
            let text = self.regions.get(&region).map(|s| s.as_str()).unwrap_or("");
            self.stdout.queue(style::Print(format!(
                "{:<10}{}",
                format!("{}:", region.label()),
                text
            )))?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        for line in self.log.iter() {
            self.stdout.queue(style::Print(line))?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        self.stdout.queue(style::Print("q to quit"))?;
        self.stdout.flush()
    }
}

/// Display handle given to the monitor. The status logger thread shares
/// the same screen.
struct TerminalDisplay {
    screen: Arc<Mutex<Screen>>,
}

impl TerminalDisplay {
    fn with_screen<F: FnOnce(&mut Screen)>(&self, f: F) {
        if let Ok(mut screen) = self.screen.lock() {
            f(&mut screen);
            let _ = screen.draw();
        }
    }
}

impl TextDisplay for TerminalDisplay {
    fn set_text(&mut self, region: Region, text: &str) {
        self.with_screen(|s| {
            s.regions.insert(region, text.to_string());
        });
    }

    fn blank(&mut self) {
        self.with_screen(|s| s.regions.clear());
    }
}

/// Display that only logs region changes, for use without a terminal.
struct PlainDisplay {
    tf: String,
    verbose: bool,
}

impl TextDisplay for PlainDisplay {
    fn set_text(&mut self, region: Region, text: &str) {
        if self.verbose && !text.is_empty() {
            log!(self.tf, "[{}] {}", region.label(), text);
        }
    }

    fn blank(&mut self) {
        if self.verbose {
            log!(self.tf, "[display blanked]");
        }
    }
}

fn main() -> ExitCode {
    let mut opts = Options::new();
    storage_options(&mut opts);
    opts.optopt("m", "", "Only use MIDI inputs whose name contains this text", "name");
    opts.optopt("t", "", "Timestamp format (default '%T%.3f ')", "fmt");
    opts.optflag("v", "", "Verbose output");
    opts.optflag("", "dev", "Run in dev mode, ignoring the boot flag");
    opts.optflag("", "run", "Run in run mode, ignoring the boot flag");
    opts.optflag("", "plain", "Log to stdout instead of drawing the display");

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
            let usage = format!("Usage: {} [-c config] [-f counters] [-b bootflag] [-m name] [-v] [-t fmt] [--dev | --run] [--plain]", &args[0]);
            die!("{}\n{}", $msg, opts.usage(&usage));
        }
        };
    }

    let matches = match opts.parse(&mut args[1..]) {
        Ok(m) => m,
        Err(f) => die_usage!("{}", f.to_string()),
    };
    if !matches.free.is_empty() {
        die_usage!("unexpected argument '{}'", matches.free[0]);
    }
    if matches.opt_present("dev") && matches.opt_present("run") {
        die_usage!("--dev and --run are exclusive");
    }

    let config = match load_config(&matches) {
        Ok(c) => c,
        Err(e) => die!("{}", e),
    };
    let verbose = matches.opt_present("v");
    let plain = matches.opt_present("plain");
    let tf = matches
        .opt_str("t")
        .unwrap_or(DEFAULT_TIME_FORMAT.to_string());

    let boot_flag = FileBootFlag::new(&config.boot_flag_path);
    let dev_mode = if matches.opt_present("dev") {
        true
    } else if matches.opt_present("run") {
        false
    } else {
        boot_flag.load().is_dev()
    };
    let timeouts = config.timeouts(dev_mode);

    let (status_send, status_recv) = channel::bounded::<Event>(50);
    let store = Box::new(FileCounterStore::new(&config.counters_path));
    let enumerator = HostEnumerator::new(config.device_filter.clone());
    let dev_banner = format!(
        "DEV MODE: session timeout {}s, display idle timeout {}s",
        timeouts.session, timeouts.idle_display
    );

    if plain {
        if dev_mode {
            log!(tf, dev_banner);
        }
        let display = PlainDisplay {
            tf: tf.clone(),
            verbose,
        };
        let mut monitor = match Monitor::from_config(
            &config,
            dev_mode,
            enumerator,
            store,
            Box::new(boot_flag),
            MonotonicClock::new(),
            display,
        ) {
            Ok(m) => m.with_status_queue(status_send),
            Err(e) => die!("{}", e),
        };
        let status = std::thread::Builder::new()
            .name("status".to_string())
            .spawn(move || {
                for event in status_recv.iter() {
                    if let Some(line) = describe(&event, verbose) {
                        log!(tf, line);
                    }
                }
            });
        monitor.run();
        // Closes the status queue so the logger drains and exits.
        drop(monitor);
        if let Ok(status) = status {
            let _ = status.join();
        }
        return ExitCode::SUCCESS;
    }

    let screen = match Screen::setup() {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => die!("cannot set up terminal: {}", e),
    };
    let display = TerminalDisplay {
        screen: screen.clone(),
    };
    let mut monitor = match Monitor::from_config(
        &config,
        dev_mode,
        enumerator,
        store,
        Box::new(boot_flag),
        MonotonicClock::new(),
        display,
    ) {
        Ok(m) => m.with_status_queue(status_send),
        Err(e) => {
            if let Ok(mut s) = screen.lock() {
                s.teardown();
            }
            die!("{}", e);
        }
    };
    if dev_mode {
        if let Ok(mut s) = screen.lock() {
            s.push_log(dev_banner);
            let _ = s.draw();
        }
    }

    let log_screen = screen.clone();
    let status = std::thread::Builder::new()
        .name("status".to_string())
        .spawn(move || {
            for event in status_recv.iter() {
                if let Some(line) = describe(&event, verbose) {
                    if let Ok(mut s) = log_screen.lock() {
                        s.push_log(format!("{}{}", chrono::Local::now().format(&tf), line));
                        let _ = s.draw();
                    }
                }
            }
        });

    // ^C arrives as a key event in raw mode.
    let stop = monitor.stop_handle();
    let _ = std::thread::Builder::new()
        .name("keys".to_string())
        .spawn(move || loop {
            if let Ok(event::Event::Key(k)) = event::read() {
                use event::{KeyCode, KeyModifiers};
                let quit = k.code == KeyCode::Char('q')
                    || k.code == KeyCode::Esc
                    || (k.code == KeyCode::Char('c') && k.modifiers == KeyModifiers::CONTROL);
                if quit {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
        });

    monitor.run();
    drop(monitor);
    if let Ok(status) = status {
        let _ = status.join();
    }
    if let Ok(mut s) = screen.lock() {
        s.teardown();
    }
    ExitCode::SUCCESS
}
