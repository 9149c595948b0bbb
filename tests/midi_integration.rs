//! MIDI integration tests through the umbrella crate (requires the "midi" feature).
//!
//! Drives the service the way the player does: one slice per row step, one
//! driver tick per audio buffer.
//!
//! Run with:
//! ```bash
//! cargo test -p chiptrack --test midi_integration --no-default-features --features midi
//! ```

#![cfg(feature = "midi")]

use chiptrack::midi::{VirtualDriver, VirtualMonitor, VirtualOutput};
use chiptrack::prelude::*;
use std::collections::BTreeMap;

fn settings(delay: &str, sync: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("MIDIDELAY".to_string(), delay.to_string());
    map.insert("MIDISENDSYNC".to_string(), sync.to_string());
    map
}

fn build(settings: &BTreeMap<String, String>, monitor: &VirtualMonitor) -> Result<MidiService> {
    let midi = MidiService::builder()
        .config_source(settings)
        .clock(SliceDivider::new(4))
        .driver(
            VirtualDriver::new().with_output(VirtualOutput::with_monitor("Synth", monitor.clone())),
        )
        .build()?;
    Ok(midi)
}

/// Play `rows` slices, each followed by one audio buffer.
fn play(midi: &MidiService, rows: u8) {
    for row in 0..rows {
        midi.on_playback_slice();
        midi.enqueue(MidiMessage::note_on(0, 48 + row, 100));
        midi.request_flush();
        midi.on_driver_event(DriverEvent::Tick);
    }
}

#[test]
fn test_player_session() -> Result<()> {
    let monitor = VirtualMonitor::new();
    let midi = build(&settings("1", "YES"), &monitor)?;

    midi.select_output("Synth");
    assert_eq!(midi.on_player_start(), SelectOutcome::Activated);
    play(&midi, 8);
    midi.on_player_stop();
    for _ in 0..midi.config().buffer_count {
        midi.request_flush();
        midi.on_driver_event(DriverEvent::Tick);
    }

    let messages = monitor.messages();
    let notes: Vec<u8> = messages
        .iter()
        .filter(|m| !m.is_realtime())
        .map(|m| m.data1)
        .collect();
    assert_eq!(notes, (48..56).collect::<Vec<u8>>());
    assert_eq!(messages.first(), Some(&MidiMessage::start()));
    assert_eq!(messages.last(), Some(&MidiMessage::stop()));
    assert_eq!(
        messages
            .iter()
            .filter(|m| **m == MidiMessage::timing_clock())
            .count(),
        2
    );
    Ok(())
}

#[test]
fn test_sync_off_from_settings() -> Result<()> {
    let monitor = VirtualMonitor::new();
    let midi = build(&settings("0", "no"), &monitor)?;

    midi.select_output("Synth");
    midi.on_player_start();
    play(&midi, 4);
    midi.on_player_stop();
    midi.request_flush();

    assert!(monitor.messages().iter().all(|m| !m.is_realtime()));
    Ok(())
}

#[test]
fn test_invalid_config_surfaces_as_umbrella_error() {
    let result = MidiService::builder().buffer_count(0).build().map_err(Error::from);
    assert!(matches!(
        result,
        Err(Error::Midi(chiptrack::midi::Error::InvalidConfig(_)))
    ));
}
