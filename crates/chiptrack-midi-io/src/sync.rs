//! Transport synchronization: MIDI clock, start and stop.

use crate::message::MidiMessage;
use std::sync::atomic::{AtomicU32, Ordering};

/// The playback engine's view of the MIDI clock.
pub trait TransportClock: Send + Sync {
    /// Queried once per playback slice: does this slice carry a clock pulse?
    fn is_clock_slice(&self) -> bool;
}

impl<F> TransportClock for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_clock_slice(&self) -> bool {
        self()
    }
}

/// Clock that never pulses. Used when the host does not inject one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl TransportClock for NoClock {
    fn is_clock_slice(&self) -> bool {
        false
    }
}

/// Pulses on every `every`-th query, starting with the first.
#[derive(Debug)]
pub struct SliceDivider {
    every: u32,
    count: AtomicU32,
}

impl SliceDivider {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            count: AtomicU32::new(0),
        }
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }
}

impl TransportClock for SliceDivider {
    fn is_clock_slice(&self) -> bool {
        let every = self.every;
        let previous = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some((n + 1) % every)
            })
            .unwrap_or(0);
        previous == 0
    }
}

/// Decides which realtime messages go out, gated on the send-sync setting.
#[derive(Debug, Clone, Copy)]
pub struct SyncBridge {
    enabled: bool,
}

impl SyncBridge {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Timing clock for this slice, if sync is on and the clock pulses.
    ///
    /// The clock is not queried at all when sync is off.
    pub fn clock_pulse(&self, clock: &dyn TransportClock) -> Option<MidiMessage> {
        (self.enabled && clock.is_clock_slice()).then(MidiMessage::timing_clock)
    }

    pub fn transport_start(&self) -> Option<MidiMessage> {
        self.enabled.then(MidiMessage::start)
    }

    pub fn transport_stop(&self) -> Option<MidiMessage> {
        self.enabled.then(MidiMessage::stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_gating() {
        let on = SyncBridge::new(true);
        assert_eq!(on.transport_start(), Some(MidiMessage::start()));
        assert_eq!(on.transport_stop(), Some(MidiMessage::stop()));
        assert_eq!(on.clock_pulse(&|| true), Some(MidiMessage::timing_clock()));
        assert_eq!(on.clock_pulse(&NoClock), None);

        let off = SyncBridge::new(false);
        assert_eq!(off.transport_start(), None);
        assert_eq!(off.transport_stop(), None);
        assert_eq!(off.clock_pulse(&|| true), None);
    }

    #[test]
    fn test_disabled_sync_does_not_query_clock() {
        let queried = AtomicBool::new(false);
        let clock = || {
            queried.store(true, Ordering::Relaxed);
            true
        };
        SyncBridge::new(false).clock_pulse(&clock);
        assert!(!queried.load(Ordering::Relaxed));
    }

    #[test]
    fn test_slice_divider() {
        let divider = SliceDivider::new(3);
        let pulses: Vec<bool> = (0..7).map(|_| divider.is_clock_slice()).collect();
        assert_eq!(pulses, vec![true, false, false, true, false, false, true]);

        divider.reset();
        assert!(divider.is_clock_slice());

        let every_slice = SliceDivider::new(0);
        assert!(every_slice.is_clock_slice());
        assert!(every_slice.is_clock_slice());
    }
}
