//! Hardware integration tests against a real MIDI port.
//!
//! Needs a loopback port (macOS IAC Driver, ALSA `snd-virmidi`, loopMIDI on
//! Windows) whose output and input share a name containing `CHIPTRACK_PORT`
//! (default "IAC"). All tests are `#[ignore]` so CI doesn't fail without hardware.
//!
//! Run with:
//!   cargo test -p chiptrack-midi-io --test hardware -- --ignored --test-threads=1

#![cfg(feature = "midi-io")]

use chiptrack_midi_io::{
    MidiDevice, MidiMessage, MidiService, MidirDriver, MidirOutput, SelectOutcome,
};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SETTLE: Duration = Duration::from_millis(200);
const SEND_READ_DELAY: Duration = Duration::from_millis(100);

fn loopback_name() -> String {
    let pattern = std::env::var("CHIPTRACK_PORT").unwrap_or_else(|_| "IAC".to_string());
    MidirDriver::output_port_names()
        .into_iter()
        .find(|name| name.contains(&pattern))
        .expect("Loopback MIDI port not found. Set CHIPTRACK_PORT or enable the IAC Driver")
}

/// Build a service with zero delay and open the loopback port in both directions.
fn setup_loopback(send_sync: bool) -> MidiService {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let midi = MidiService::builder()
        .io()
        .midi_delay_ticks(0)
        .send_sync(send_sync)
        .build()
        .expect("Failed to build MidiService");

    let name = loopback_name();
    assert_eq!(midi.select_device(&name), SelectOutcome::Activated);
    assert_eq!(midi.on_player_start(), SelectOutcome::Activated);
    thread::sleep(SETTLE);
    let _ = midi.drain_input();
    midi
}

fn flush_and_read(midi: &MidiService) -> Vec<MidiMessage> {
    for _ in 0..midi.config().buffer_count {
        midi.request_flush();
    }
    thread::sleep(SEND_READ_DELAY);
    midi.drain_input()
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
#[ignore]
fn test_enumerates_ports() {
    let midi = MidiService::builder().io().build().unwrap();
    assert!(!midi.output_names().is_empty(), "No MIDI outputs found");
    assert_eq!(midi.output_names(), MidirDriver::output_port_names());
}

#[test]
#[ignore]
fn test_note_loopback() {
    let midi = setup_loopback(false);
    midi.enqueue(MidiMessage::note_on(0, 60, 100));
    midi.enqueue(MidiMessage::note_off(0, 60, 0));

    let received = flush_and_read(&midi);
    assert_eq!(
        received,
        vec![MidiMessage::note_on(0, 60, 100), MidiMessage::note_off(0, 60, 0)]
    );
}

#[test]
#[ignore]
fn test_transport_messages_loopback() {
    let midi = setup_loopback(true);
    midi.on_player_stop();

    let received = flush_and_read(&midi);
    assert_eq!(received, vec![MidiMessage::start(), MidiMessage::stop()]);
}

#[test]
#[ignore]
fn test_output_reopens_after_stop() {
    let midi = setup_loopback(false);
    let name = midi.active_output_name().unwrap();

    midi.stop_output();
    assert!(!midi.is_output_active());

    midi.select_output(&name);
    assert_eq!(midi.on_player_start(), SelectOutcome::Activated);
    thread::sleep(SETTLE);

    midi.enqueue(MidiMessage::control_change(0, 7, 100));
    assert_eq!(flush_and_read(&midi), vec![MidiMessage::control_change(0, 7, 100)]);
}

#[test]
#[ignore]
fn test_missing_port_reports_not_found() {
    let midi = MidiService::builder().io().build().unwrap();
    midi.select_output("chiptrack-no-such-port");
    assert_eq!(midi.on_player_start(), SelectOutcome::NotFound);
    assert!(!midi.is_output_active());
}

#[test]
#[ignore]
fn test_stop_before_connect_keeps_port_usable() {
    let mut output = MidirOutput::new(loopback_name());
    output.init().unwrap();

    // A disconnect while idle must not cost the port its client
    output.stop();
    output.start().unwrap();

    output.stop();
    output.start().unwrap();
    output.close();
}
