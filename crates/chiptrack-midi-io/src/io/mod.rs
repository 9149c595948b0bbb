//! Hardware MIDI I/O.
//!
//! Port enumeration and real-time I/O via midir. Every open device owns a
//! dedicated thread holding its midir client and connection; the device
//! handle only talks to it through a crossbeam channel, so `send_queue`
//! never blocks on the driver.
//! Requires the `midi-io` feature.

mod input;
mod output;

pub use input::MidirInput;
pub use output::MidirOutput;

use crate::catalog::MidiDriver;
use crate::device::{MidiInDevice, MidiOutDevice};
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use midir::{MidiInput, MidiOutput};
use std::thread::{self, JoinHandle};
use tracing::warn;

pub(crate) const CLIENT_NAME: &str = "chiptrack";
const COMMAND_CAPACITY: usize = 1024;

/// Enumerates the system's MIDI ports through midir.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidirDriver;

impl MidirDriver {
    pub fn new() -> Self {
        Self
    }

    pub fn output_port_names() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(client) => client
                .ports()
                .iter()
                .filter_map(|port| client.port_name(port).ok())
                .collect(),
            Err(e) => {
                warn!("Cannot enumerate MIDI outputs: {}", e);
                Vec::new()
            }
        }
    }

    pub fn input_port_names() -> Vec<String> {
        match MidiInput::new(CLIENT_NAME) {
            Ok(client) => client
                .ports()
                .iter()
                .filter_map(|port| client.port_name(port).ok())
                .collect(),
            Err(e) => {
                warn!("Cannot enumerate MIDI inputs: {}", e);
                Vec::new()
            }
        }
    }
}

impl MidiDriver for MidirDriver {
    fn output_devices(&self) -> Vec<Box<dyn MidiOutDevice>> {
        Self::output_port_names()
            .into_iter()
            .map(|name| Box::new(MidirOutput::new(name)) as Box<dyn MidiOutDevice>)
            .collect()
    }

    fn input_devices(&self) -> Vec<Box<dyn MidiInDevice>> {
        Self::input_port_names()
            .into_iter()
            .map(|name| Box::new(MidirInput::new(name)) as Box<dyn MidiInDevice>)
            .collect()
    }
}

/// Reply channel for commands that must report success to the caller.
pub(crate) type Reply = Sender<Result<()>>;

/// A device thread plus its command channel.
pub(crate) struct Worker<C> {
    commands: Sender<C>,
    thread: Option<JoinHandle<()>>,
}

impl<C: Send + 'static> Worker<C> {
    /// Spawn the thread and wait until `run` reports on the ready channel.
    pub(crate) fn spawn<F>(thread_name: &str, run: F) -> Result<Self>
    where
        F: FnOnce(Receiver<C>, Reply) + Send + 'static,
    {
        let (commands, receiver) = bounded(COMMAND_CAPACITY);
        let (ready_tx, ready_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run(receiver, ready_tx))
            .map_err(|e| Error::MidiDevice(format!("Failed to spawn {}: {}", thread_name, e)))?;

        let mut worker = Self {
            commands,
            thread: Some(thread),
        };
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(worker),
            Ok(Err(e)) => {
                worker.join();
                Err(e)
            }
            Err(_) => {
                worker.join();
                Err(thread_gone())
            }
        }
    }

    /// Send a command carrying a reply channel and wait for the answer.
    pub(crate) fn request(&self, command: impl FnOnce(Reply) -> C) -> Result<()> {
        let (reply, answer) = bounded(1);
        self.commands
            .send(command(reply))
            .map_err(|_| thread_gone())?;
        answer.recv().map_err(|_| thread_gone())?
    }

    pub(crate) fn send(&self, command: C) {
        if self.commands.send(command).is_err() {
            warn!("MIDI device thread not running");
        }
    }

    pub(crate) fn try_send(&self, command: C) -> std::result::Result<(), TrySendError<C>> {
        self.commands.try_send(command)
    }

    pub(crate) fn shutdown(mut self, command: C) {
        let _ = self.commands.send(command);
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("MIDI device thread panicked");
            }
        }
    }
}

fn thread_gone() -> Error {
    Error::MidiDevice("MIDI device thread not running".to_string())
}

fn not_open(name: &str) -> Error {
    Error::MidiDevice(format!("{} is not open", name))
}
