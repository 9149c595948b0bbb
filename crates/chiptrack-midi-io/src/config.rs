//! Service configuration.
//!
//! Values are read once at construction from whatever key/value store the
//! host keeps its settings in (see [`ConfigSource`]) and never change
//! afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Ticks between a flush request and delivery to the device.
pub const MIDI_DELAY_KEY: &str = "MIDIDELAY";
/// `"YES"` enables clock/start/stop output.
pub const MIDI_SEND_SYNC_KEY: &str = "MIDISENDSYNC";

pub const DEFAULT_MIDI_DELAY_TICKS: u32 = 1;
pub const DEFAULT_BUFFER_COUNT: usize = 4;
pub const DEFAULT_MAX_MESSAGES_PER_SLOT: usize = 4096;
pub const DEFAULT_INPUT_CAPACITY: usize = 256;

/// Read-only key/value lookup.
pub trait ConfigSource {
    fn value(&self, key: &str) -> Option<&str>;
}

impl ConfigSource for HashMap<String, String> {
    fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiServiceConfig {
    /// Hardware ticks between `request_flush` and the rotation. `0` flushes synchronously.
    pub midi_delay_ticks: u32,
    /// Emit clock, start and stop realtime messages.
    pub send_sync: bool,
    /// Number of slots in the output ring.
    pub buffer_count: usize,
    /// Per-slot cap; messages past it are dropped.
    pub max_messages_per_slot: usize,
    /// Ring size of each merged input device.
    pub input_capacity: usize,
}

impl Default for MidiServiceConfig {
    fn default() -> Self {
        Self {
            midi_delay_ticks: DEFAULT_MIDI_DELAY_TICKS,
            send_sync: true,
            buffer_count: DEFAULT_BUFFER_COUNT,
            max_messages_per_slot: DEFAULT_MAX_MESSAGES_PER_SLOT,
            input_capacity: DEFAULT_INPUT_CAPACITY,
        }
    }
}

impl MidiServiceConfig {
    /// Defaults overridden by `MIDIDELAY` and `MIDISENDSYNC` when present.
    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Self {
        let mut config = Self::default();
        if let Some(raw) = source.value(MIDI_DELAY_KEY) {
            config.midi_delay_ticks = parse_ticks(raw);
        }
        if let Some(raw) = source.value(MIDI_SEND_SYNC_KEY) {
            config.send_sync = raw == "YES";
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_count < 2 {
            return Err(Error::InvalidConfig(format!(
                "buffer_count must be at least 2, got {}",
                self.buffer_count
            )));
        }
        if self.max_messages_per_slot == 0 {
            return Err(Error::InvalidConfig(
                "max_messages_per_slot must be non-zero".to_string(),
            ));
        }
        if self.input_capacity == 0 {
            return Err(Error::InvalidConfig(
                "input_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `atoi`-style: optional whitespace and sign, then leading digits.
/// Anything unparsable reads as 0, negatives clamp to 0.
fn parse_ticks(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits = rest
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u64::from(digit - b'0'))
        });
    if negative {
        0
    } else {
        u32::try_from(digits).unwrap_or(u32::MAX)
    }
}
