//! MIDI output scheduling for the chiptrack player.
//!
//! Buffers outgoing MIDI in a ring of per-slice queues, delivers each queue
//! to the active output device a fixed number of audio ticks after the
//! player asks for it, emits clock/start/stop sync, and manages device
//! selection across transport starts.
//!
//! Feature gates: `midi-io` (hardware ports through midir).

pub mod error;
pub use error::{Error, Result};

mod system;
pub use system::{DriverEvent, MidiService, MidiServiceBuilder};

pub mod message;
pub use message::MidiMessage;

pub mod device;
pub use device::{DeviceState, InputSink, MidiDevice, MidiInDevice, MidiOutDevice};

pub mod catalog;
pub use catalog::{DeviceArena, DeviceCatalog, DeviceHandle, DeviceInfo, MidiDriver};

pub(crate) mod lifecycle;
pub use lifecycle::SelectOutcome;

pub mod config;
pub use config::{ConfigSource, MidiServiceConfig};

pub mod ring;
pub use ring::{OutputQueueRing, RingStats};

pub mod scheduler;
pub use scheduler::TickScheduler;

pub mod sync;
pub use sync::{NoClock, SliceDivider, SyncBridge, TransportClock};

pub mod merger;
pub use merger::InputMerger;

pub mod virtual_device;
pub use virtual_device::{
    DeviceCall, FailurePlan, VirtualDriver, VirtualInput, VirtualMonitor, VirtualOutput,
};

#[cfg(feature = "midi-io")]
pub(crate) mod io;

#[cfg(feature = "midi-io")]
pub use io::{MidirDriver, MidirInput, MidirOutput};
