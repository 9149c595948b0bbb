//! MIDI input port. Incoming bytes are parsed on the midir callback and
//! pushed straight into the sink the merger attached.

use super::{not_open, Reply, Worker, CLIENT_NAME};
use crate::device::{InputSink, MidiDevice, MidiInDevice};
use crate::error::{Error, Result};
use crate::message::MidiMessage;
use crossbeam_channel::Receiver;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

type SharedSink = Arc<Mutex<Option<InputSink>>>;

enum InputCommand {
    Connect(Reply),
    Disconnect,
    Shutdown,
}

enum Link {
    Idle(MidiInput),
    Connected(MidiInputConnection<SharedSink>),
    Lost,
}

/// A system MIDI input port, addressed by its exact port name.
pub struct MidirInput {
    name: String,
    sink: SharedSink,
    worker: Option<Worker<InputCommand>>,
}

impl MidirInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }
}

impl MidiDevice for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        let port_name = self.name.clone();
        let sink = Arc::clone(&self.sink);
        let worker = Worker::spawn("midi-input-thread", move |commands, ready| {
            input_thread(port_name, sink, commands, ready)
        })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.worker
            .as_ref()
            .ok_or_else(|| not_open(&self.name))?
            .request(InputCommand::Connect)
    }

    fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.send(InputCommand::Disconnect);
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown(InputCommand::Shutdown);
        }
    }
}

impl MidiInDevice for MidirInput {
    fn attach(&mut self, sink: InputSink) {
        *self.sink.lock() = Some(sink);
    }
}

impl Drop for MidirInput {
    fn drop(&mut self) {
        self.close();
    }
}

fn find_port(client: &MidiInput, name: &str) -> Option<MidiInputPort> {
    client
        .ports()
        .into_iter()
        .find(|port| client.port_name(port).is_ok_and(|port_name| port_name == name))
}

fn on_message(_timestamp: u64, bytes: &[u8], sink: &mut SharedSink) {
    let Some(message) = MidiMessage::from_bytes(bytes) else {
        return;
    };
    if let Some(sink) = sink.lock().as_mut() {
        if !sink.push(message) {
            trace!("MIDI input ring full, dropped {:?}", message);
        }
    }
}

fn input_thread(name: String, sink: SharedSink, commands: Receiver<InputCommand>, ready: Reply) {
    let client = match MidiInput::new(CLIENT_NAME) {
        Ok(client) => client,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    if find_port(&client, &name).is_none() {
        let _ = ready.send(Err(Error::DeviceNotFound(name)));
        return;
    }
    let _ = ready.send(Ok(()));

    let mut link = Link::Idle(client);
    for command in commands.iter() {
        match command {
            InputCommand::Connect(reply) => {
                let current = std::mem::replace(&mut link, Link::Lost);
                let (next, result) = connect(current, &name, &sink);
                link = next;
                let _ = reply.send(result);
            }
            InputCommand::Disconnect => {
                link = match std::mem::replace(&mut link, Link::Lost) {
                    Link::Connected(connection) => {
                        debug!("MIDI input {} disconnected", name);
                        Link::Idle(connection.close().0)
                    }
                    other => other,
                };
            }
            InputCommand::Shutdown => break,
        }
    }
}

fn connect(link: Link, name: &str, sink: &SharedSink) -> (Link, Result<()>) {
    match link {
        Link::Idle(mut client) => {
            let Some(port) = find_port(&client, name) else {
                return (
                    Link::Idle(client),
                    Err(Error::DeviceNotFound(name.to_string())),
                );
            };
            client.ignore(Ignore::Sysex);
            match client.connect(&port, "chiptrack-input", on_message, Arc::clone(sink)) {
                Ok(connection) => {
                    info!("MIDI input {} connected", name);
                    (Link::Connected(connection), Ok(()))
                }
                Err(e) => {
                    let error = Error::MidiPort(e.to_string());
                    (Link::Idle(e.into_inner()), Err(error))
                }
            }
        }
        connected @ Link::Connected(_) => (connected, Ok(())),
        Link::Lost => (
            Link::Lost,
            Err(Error::MidiDevice(format!("{} lost its MIDI client", name))),
        ),
    }
}
