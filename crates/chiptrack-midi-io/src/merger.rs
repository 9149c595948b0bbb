//! Lock-free merge of several input devices into one logical stream.

use crate::device::{InputSink, MidiInDevice};
use crate::message::MidiMessage;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapRb};

const DEFAULT_CAPACITY: usize = 256;

struct MergedInput {
    name: String,
    consumer: HeapCons<MidiMessage>,
}

/// Presents every inserted input device as a single stream.
///
/// Each device gets its own SPSC ring; order within a device is preserved,
/// order across devices follows insertion order of the devices.
pub struct InputMerger {
    inputs: Mutex<Vec<MergedInput>>,
    capacity: usize,
}

impl InputMerger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` is the per-device ring size.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inputs: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Attach a fresh ring to `device` and start merging it.
    pub fn insert<D: MidiInDevice + ?Sized>(&self, device: &mut D) {
        let (producer, consumer) = HeapRb::<MidiMessage>::new(self.capacity).split();
        device.attach(InputSink::new(producer));
        self.inputs.lock().push(MergedInput {
            name: device.name().to_string(),
            consumer,
        });
        tracing::debug!("Merging MIDI input: {}", device.name());
    }

    pub fn len(&self) -> usize {
        self.inputs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.lock().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.inputs
            .lock()
            .iter()
            .map(|input| input.name.clone())
            .collect()
    }

    /// Uses `try_lock` so a contended drain returns nothing instead of blocking.
    pub fn drain(&self) -> Vec<MidiMessage> {
        let mut out = Vec::new();
        self.drain_into(&mut out);
        out
    }

    /// Appends pending messages to `out`, returns how many were appended.
    pub fn drain_into(&self, out: &mut Vec<MidiMessage>) -> usize {
        let mut inputs = match self.inputs.try_lock() {
            Some(guard) => guard,
            None => return 0,
        };
        let before = out.len();
        for input in inputs.iter_mut() {
            out.reserve(input.consumer.occupied_len());
            while let Some(message) = input.consumer.try_pop() {
                out.push(message);
            }
        }
        out.len() - before
    }

    /// Uses `try_lock` to avoid blocking.
    pub fn has_pending(&self) -> bool {
        match self.inputs.try_lock() {
            Some(inputs) => inputs.iter().any(|input| !input.consumer.is_empty()),
            None => false,
        }
    }

    /// Forget every device. Their sinks keep working but nobody reads them.
    pub fn clear(&self) {
        self.inputs.lock().clear();
    }
}

impl Default for InputMerger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MidiDevice;
    use crate::virtual_device::VirtualInput;

    fn running_input(name: &str, merger: &InputMerger) -> VirtualInput {
        let mut input = VirtualInput::new(name);
        merger.insert(&mut input);
        input.init().unwrap();
        input.start().unwrap();
        input
    }

    #[test]
    fn test_merges_union_preserving_device_order() {
        let merger = InputMerger::new();
        let keys = running_input("Keys", &merger);
        let pads = running_input("Pads", &merger);

        keys.inject(MidiMessage::note_on(0, 60, 100));
        pads.inject(MidiMessage::note_on(9, 36, 127));
        keys.inject(MidiMessage::note_off(0, 60, 0));

        assert!(merger.has_pending());
        let merged = merger.drain();
        assert_eq!(
            merged,
            vec![
                MidiMessage::note_on(0, 60, 100),
                MidiMessage::note_off(0, 60, 0),
                MidiMessage::note_on(9, 36, 127),
            ]
        );
        assert!(!merger.has_pending());
        assert_eq!(merger.names(), vec!["Keys", "Pads"]);
    }

    #[test]
    fn test_per_device_capacity() {
        let merger = InputMerger::with_capacity(2);
        let keys = running_input("Keys", &merger);

        assert!(keys.inject(MidiMessage::timing_clock()));
        assert!(keys.inject(MidiMessage::timing_clock()));
        assert!(!keys.inject(MidiMessage::timing_clock()));

        let mut out = vec![MidiMessage::start()];
        assert_eq!(merger.drain_into(&mut out), 2);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_clear() {
        let merger = InputMerger::new();
        let _keys = running_input("Keys", &merger);
        assert_eq!(merger.len(), 1);
        merger.clear();
        assert!(merger.is_empty());
        assert!(merger.drain().is_empty());
    }
}
