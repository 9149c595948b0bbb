//! MIDI output port: connection and batch sending via a dedicated thread.

use super::{not_open, Reply, Worker, CLIENT_NAME};
use crate::device::{MidiDevice, MidiOutDevice};
use crate::error::{Error, Result};
use crate::message::MidiMessage;
use crossbeam_channel::{Receiver, TrySendError};
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use tracing::{debug, info, warn};

enum OutputCommand {
    Connect(Reply),
    Disconnect,
    Send(Vec<MidiMessage>),
    Shutdown,
}

enum Link {
    Idle(MidiOutput),
    Connected(MidiOutputConnection),
    Lost,
}

/// A system MIDI output port, addressed by its exact port name.
pub struct MidirOutput {
    name: String,
    worker: Option<Worker<OutputCommand>>,
}

impl MidirOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            worker: None,
        }
    }

    fn worker(&self) -> Result<&Worker<OutputCommand>> {
        self.worker.as_ref().ok_or_else(|| not_open(&self.name))
    }
}

impl MidiDevice for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        let port_name = self.name.clone();
        let worker = Worker::spawn("midi-output-thread", move |commands, ready| {
            output_thread(port_name, commands, ready)
        })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.worker()?.request(OutputCommand::Connect)
    }

    fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.send(OutputCommand::Disconnect);
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown(OutputCommand::Shutdown);
        }
    }
}

impl MidiOutDevice for MidirOutput {
    fn send_queue(&mut self, messages: &[MidiMessage]) {
        let Some(worker) = &self.worker else {
            return;
        };
        match worker.try_send(OutputCommand::Send(messages.to_vec())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(
                    "MIDI output {} backlogged, dropped {} message(s)",
                    self.name,
                    messages.len()
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("MIDI output {} thread not running", self.name);
            }
        }
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        self.close();
    }
}

fn find_port(client: &MidiOutput, name: &str) -> Option<MidiOutputPort> {
    client
        .ports()
        .into_iter()
        .find(|port| client.port_name(port).is_ok_and(|port_name| port_name == name))
}

fn open_client(name: &str) -> Result<MidiOutput> {
    let client = MidiOutput::new(CLIENT_NAME)?;
    if find_port(&client, name).is_none() {
        return Err(Error::DeviceNotFound(name.to_string()));
    }
    Ok(client)
}

fn output_thread(name: String, commands: Receiver<OutputCommand>, ready: Reply) {
    let mut link = match open_client(&name) {
        Ok(client) => {
            let _ = ready.send(Ok(()));
            Link::Idle(client)
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    for command in commands.iter() {
        match command {
            OutputCommand::Connect(reply) => {
                let current = std::mem::replace(&mut link, Link::Lost);
                let (next, result) = connect(current, &name);
                link = next;
                let _ = reply.send(result);
            }
            OutputCommand::Disconnect => {
                link = match std::mem::replace(&mut link, Link::Lost) {
                    Link::Connected(connection) => {
                        debug!("MIDI output {} disconnected", name);
                        Link::Idle(connection.close())
                    }
                    other => other,
                };
            }
            OutputCommand::Send(batch) => match &mut link {
                Link::Connected(connection) => {
                    for message in &batch {
                        if let Err(e) = connection.send(&message.to_bytes()) {
                            warn!("MIDI output {} send failed: {}", name, e);
                        }
                    }
                }
                _ => debug!("Cannot send MIDI batch: {} not connected", name),
            },
            OutputCommand::Shutdown => break,
        }
    }
}

fn connect(link: Link, name: &str) -> (Link, Result<()>) {
    match link {
        Link::Idle(client) => {
            let Some(port) = find_port(&client, name) else {
                return (
                    Link::Idle(client),
                    Err(Error::DeviceNotFound(name.to_string())),
                );
            };
            match client.connect(&port, "chiptrack-output") {
                Ok(connection) => {
                    info!("MIDI output {} connected", name);
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
