use midibit::clock::{Clock, ManualClock};
use midibit::config::{Config, COMMAND_PREFIX};
use midibit::display::{MemoryDisplay, Region};
use midibit::midi::port::{Script, ScriptedDevice, ScriptedEnumerator};
use midibit::midi::MidiMessage;
use midibit::session::Mode;
use midibit::store::{MemoryBootFlag, MemoryCounterStore};
use midibit::{Event, Monitor};

use crossbeam::channel;
use float_cmp::approx_eq;

type TestMonitor = Monitor<ScriptedEnumerator, ManualClock, MemoryDisplay>;

fn monitor(
    clock: &ManualClock,
    devices: Vec<Option<ScriptedDevice>>,
    practice: i64,
    play: i64,
) -> (TestMonitor, channel::Receiver<Event>) {
    let config = Config {
        receive_timeout_ms: 250,
        ..Config::default()
    };
    let (tx, rx) = channel::bounded(1024);
    let monitor = Monitor::from_config(
        &config,
        false,
        ScriptedEnumerator::new(devices),
        Box::new(MemoryCounterStore::with_values(practice, play)),
        Box::new(MemoryBootFlag::default()),
        clock.clone(),
        MemoryDisplay::default(),
    )
    .unwrap()
    .with_status_queue(tx);
    (monitor, rx)
}

fn note(pitch: u8) -> Script {
    Script::Message(MidiMessage::note_on(0, pitch, 90))
}

fn run_until(m: &mut TestMonitor, t: f64) {
    while m.clock().now() < t {
        m.step();
    }
}

fn command(last: u8, gap: f64) -> Vec<Script> {
    let mut script = Vec::new();
    for pitch in COMMAND_PREFIX {
        script.push(note(pitch));
        script.push(Script::Silence(gap));
    }
    script.push(note(last));
    script
}

#[test]
fn session_times_out_and_commits_span() {
    let clock = ManualClock::default();
    let dev = ScriptedDevice::new("Keys", &clock, [note(60), Script::Silence(10.0), note(64)]);
    let (mut m, rx) = monitor(&clock, vec![Some(dev)], 0, 0);

    run_until(&mut m, 24.75);
    assert!(m.accumulator().in_session());
    run_until(&mut m, 25.0);
    assert!(!m.accumulator().in_session());
    assert_eq!(m.accumulator().mode(), Mode::Practice);
    assert_eq!(m.accumulator().totals().whole_seconds(), (10, 0));
    assert_eq!(m.display().text(Region::Practice), "0:00:10");

    let events: Vec<Event> = rx.try_iter().collect();
    assert!(events.contains(&Event::Saved {
        practice: 10,
        play: 0
    }));
}

#[test]
fn reset_sequence_zeroes_totals_mid_session() {
    let clock = ManualClock::default();
    let mut script = vec![note(50), Script::Silence(5.0)];
    script.extend(command(60, 0.25));
    let dev = ScriptedDevice::new("Keys", &clock, script);
    let (mut m, rx) = monitor(&clock, vec![Some(dev)], 1000, 2000);

    run_until(&mut m, 7.5);
    let acc = m.accumulator();
    assert!(acc.in_session());
    assert_eq!(acc.totals().whole_seconds(), (0, 0));
    assert!(acc.session_length() < 1.0);
    assert_eq!(m.display().text(Region::Practice), "0:00:00");
    assert_eq!(m.display().text(Region::Play), "0:00:00");

    let events: Vec<Event> = rx.try_iter().collect();
    assert!(events.contains(&Event::TotalsReset));
    assert!(events.contains(&Event::Saved {
        practice: 0,
        play: 0
    }));
}

#[test]
fn device_loss_commits_and_reconnects() {
    let clock = ManualClock::default();
    let first = ScriptedDevice::new(
        "Keys",
        &clock,
        [note(60), Script::Silence(7.0), note(62), Script::Disconnect],
    );
    let second = ScriptedDevice::new("Keys 2", &clock, [note(64)]);
    let (mut m, rx) = monitor(&clock, vec![Some(first), None, Some(second)], 0, 0);

    run_until(&mut m, 7.0);
    // Second note, then the disconnect.
    m.step();
    assert!(m.is_connected());
    assert!(approx_eq!(f64, m.accumulator().session_length(), 7.0));
    m.step();
    assert!(!m.is_connected());
    assert!(!m.accumulator().in_session());
    assert_eq!(m.accumulator().totals().whole_seconds(), (7, 0));

    // One empty search attempt, then the second device.
    m.step();
    assert!(m.is_connected());
    assert!(m.accumulator().in_session());
    assert!(approx_eq!(f64, m.accumulator().last_event_time(), 8.0));

    let events: Vec<Event> = rx.try_iter().collect();
    let lost = events.iter().position(|e| *e == Event::DeviceLost).unwrap();
    let saved = events
        .iter()
        .position(|e| {
            *e == Event::Saved {
                practice: 7,
                play: 0,
            }
        })
        .unwrap();
    let found = events
        .iter()
        .position(|e| *e == Event::DeviceFound("Keys 2".to_string()))
        .unwrap();
    assert!(lost < saved && saved < found);
}

#[test]
fn toggle_mode_takes_gesture_off_practice() {
    let clock = ManualClock::default();
    let mut script = vec![Script::Silence(10.0)];
    script.extend(command(65, 0.375));
    let dev = ScriptedDevice::new("Keys", &clock, script);
    let (mut m, _rx) = monitor(&clock, vec![Some(dev)], 100, 0);

    run_until(&mut m, 13.25);
    let acc = m.accumulator();
    assert_eq!(acc.mode(), Mode::Play);
    assert!(approx_eq!(f64, acc.totals().practice, 97.0));
    assert_eq!(m.display().text(Region::Mode), "Play");

    // The running session is committed to the new mode.
    run_until(&mut m, 30.0);
    assert_eq!(m.accumulator().totals().whole_seconds(), (97, 3));
}

#[test]
fn toggle_mode_from_zero_goes_negative() {
    let clock = ManualClock::default();
    let dev = ScriptedDevice::new("Keys", &clock, command(65, 0.5));
    let (mut m, _rx) = monitor(&clock, vec![Some(dev)], 0, 0);

    run_until(&mut m, 4.25);
    assert_eq!(m.accumulator().mode(), Mode::Play);
    assert!(approx_eq!(f64, m.accumulator().totals().practice, -4.0));
    assert_eq!(m.display().text(Region::Practice), "-0:00:04");
}

#[test]
fn other_traffic_neither_starts_sessions_nor_matches() {
    let clock = ManualClock::default();
    let control = Script::Message(MidiMessage {
        status: 0xB0,
        data1: 64,
        data2: 127,
    });
    let note_off = Script::Message(MidiMessage::note_off(0, 60));
    let silent_on = Script::Message(MidiMessage::note_on(0, 60, 0));
    let dev = ScriptedDevice::new("Keys", &clock, [control, note_off, silent_on]);
    let (mut m, _rx) = monitor(&clock, vec![Some(dev)], 5, 5);

    run_until(&mut m, 2.0);
    assert!(!m.accumulator().in_session());
    assert_eq!(m.accumulator().totals().whole_seconds(), (5, 5));
}
