//! # chiptrack - Tracker Playback Engine
//!
//! Umbrella crate over the playback subsystems.
//!
//! ## Architecture
//!
//! - **chiptrack-midi-io** - MIDI output scheduling (queue ring, tick-driven
//!   flush, clock/start/stop sync, device selection and hot-swap)
//!
//! ## Quick Start
//!
//! ```ignore
//! use chiptrack::prelude::*;
//!
//! let midi = MidiService::builder()
//!     .io()
//!     .midi_delay_ticks(1)
//!     .build()?;
//!
//! midi.select_device("USB MIDI Interface");
//! midi.on_player_start();
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - MIDI with hardware ports
//! - `midi` - MIDI subsystem (virtual devices only)
//! - `midi-hardware` - Hardware MIDI I/O through midir

pub mod error;
pub use error::{Error, Result};

/// Re-export of chiptrack-midi-io for direct access
#[cfg(feature = "midi")]
pub use chiptrack_midi_io as midi;

#[cfg(feature = "midi")]
pub use chiptrack_midi_io::{
    DriverEvent, MidiMessage, MidiService, MidiServiceBuilder, MidiServiceConfig, SelectOutcome,
};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    #[cfg(feature = "midi")]
    pub use crate::midi::{
        ConfigSource, DriverEvent, MidiMessage, MidiService, SelectOutcome, SliceDivider,
        TransportClock,
    };
}
