//! Short MIDI messages as they travel through the output ring.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Status bytes used by the engine.
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_PRESSURE: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    pub const SYSEX: u8 = 0xF0;
    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const START: u8 = 0xFA;
    pub const CONTINUE: u8 = 0xFB;
    pub const STOP: u8 = 0xFC;
}

/// A single short MIDI message: one status byte and up to two data bytes.
///
/// Unused data bytes are zero. Messages are copied into the ring on
/// enqueue, so the caller's value is never aliased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MidiMessage {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    #[inline]
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    #[inline]
    pub const fn timing_clock() -> Self {
        Self::new(status::TIMING_CLOCK, 0, 0)
    }

    #[inline]
    pub const fn start() -> Self {
        Self::new(status::START, 0, 0)
    }

    #[inline]
    pub const fn stop() -> Self {
        Self::new(status::STOP, 0, 0)
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(status::NOTE_ON | channel.min(15), note & 0x7F, velocity & 0x7F)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(status::NOTE_OFF | channel.min(15), note & 0x7F, velocity & 0x7F)
    }

    pub fn control_change(channel: u8, cc_number: u8, value: u8) -> Self {
        Self::new(
            status::CONTROL_CHANGE | channel.min(15),
            cc_number & 0x7F,
            value & 0x7F,
        )
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::new(status::PROGRAM_CHANGE | channel.min(15), program & 0x7F, 0)
    }

    /// Clock, start, continue, stop and the other single-byte system realtime messages.
    #[inline]
    pub fn is_realtime(&self) -> bool {
        self.status >= status::TIMING_CLOCK
    }

    /// Number of bytes this message occupies on the wire.
    pub fn wire_len(&self) -> usize {
        match self.status {
            0xF8..=0xFF | 0xF6 => 1,
            0xF1 | 0xF3 => 2,
            0xF2 => 3,
            0xC0..=0xDF => 2,
            _ => 3,
        }
    }

    pub fn to_bytes(&self) -> SmallVec<[u8; 3]> {
        let bytes = [self.status, self.data1, self.data2];
        SmallVec::from_slice(&bytes[..self.wire_len()])
    }

    /// Parse one short message from raw bytes.
    ///
    /// Returns `None` for empty input, a leading data byte, or SysEx.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&first, data) = bytes.split_first()?;
        if first & 0x80 == 0 || first == status::SYSEX {
            return None;
        }
        let data1 = data.first().copied().unwrap_or(0) & 0x7F;
        let data2 = data.get(1).copied().unwrap_or(0) & 0x7F;
        let msg = Self::new(first, data1, data2);
        Some(match msg.wire_len() {
            1 => Self::new(first, 0, 0),
            2 => Self::new(first, data1, 0),
            _ => msg,
        })
    }
}
