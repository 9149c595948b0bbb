//! Device capability traits shared by every input and output backend.
//!
//! A device only knows how to open, start, stop and close itself. Which
//! transitions are legal is decided by the catalog arena that owns it
//! (see [`crate::catalog::DeviceArena`]), so backends never see an
//! out-of-order call.

use crate::error::Result;
use crate::message::MidiMessage;
use ringbuf::{traits::*, HeapProd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceState {
    #[default]
    Closed,
    Initialized,
    Running,
}

/// Open/start/stop/close capability of a MIDI endpoint.
pub trait MidiDevice: Send {
    fn name(&self) -> &str;

    /// Acquire the endpoint. A failed `init` or `start` is unwound with [`MidiDevice::close`].
    fn init(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self);

    fn close(&mut self);
}

/// Output endpoint: receives one ordered batch per ring rotation.
pub trait MidiOutDevice: MidiDevice {
    /// Deliver `messages` in order. Must not block on the physical transport.
    fn send_queue(&mut self, messages: &[MidiMessage]);
}

/// Input endpoint: pushes whatever it receives into the sink it was attached to.
pub trait MidiInDevice: MidiDevice {
    fn attach(&mut self, sink: InputSink);
}

/// Producer half of an input device's message ring.
///
/// Handed to a [`MidiInDevice`] by the [`crate::InputMerger`]; the merger
/// keeps the consumer half.
pub struct InputSink {
    producer: HeapProd<MidiMessage>,
}

impl InputSink {
    pub(crate) fn new(producer: HeapProd<MidiMessage>) -> Self {
        Self { producer }
    }

    /// Returns `false` if the ring is full and the message was dropped.
    #[inline]
    pub fn push(&mut self, message: MidiMessage) -> bool {
        self.producer.try_push(message).is_ok()
    }
}

impl std::fmt::Debug for InputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSink")
            .field("pending", &self.producer.occupied_len())
            .finish()
    }
}
