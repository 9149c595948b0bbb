//! In-process MIDI endpoints.
//!
//! `VirtualOutput` records every batch it is handed in a [`VirtualMonitor`],
//! `VirtualInput` lets the host inject messages as if they came from a
//! controller. Both can be scripted to fail `init` or `start`, which makes
//! them the backend of choice for headless runs and tests.

use crate::catalog::MidiDriver;
use crate::device::{InputSink, MidiDevice, MidiInDevice, MidiOutDevice};
use crate::error::{Error, Result};
use crate::message::MidiMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A lifecycle call as seen by a virtual device, tagged with the device name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Init(String),
    Start(String),
    Stop(String),
    Close(String),
}

#[derive(Default)]
struct MonitorState {
    batches: Vec<(String, Vec<MidiMessage>)>,
    calls: Vec<DeviceCall>,
}

/// Shared record of lifecycle calls and delivered batches. Clone is cheap.
#[derive(Clone, Default)]
pub struct VirtualMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl VirtualMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivered batch, in delivery order.
    pub fn batches(&self) -> Vec<Vec<MidiMessage>> {
        self.state
            .lock()
            .batches
            .iter()
            .map(|(_, batch)| batch.clone())
            .collect()
    }

    /// Batches delivered to the device called `name`.
    pub fn batches_for(&self, name: &str) -> Vec<Vec<MidiMessage>> {
        self.state
            .lock()
            .batches
            .iter()
            .filter(|(device, _)| device == name)
            .map(|(_, batch)| batch.clone())
            .collect()
    }

    /// All delivered messages, flattened.
    pub fn messages(&self) -> Vec<MidiMessage> {
        self.state
            .lock()
            .batches
            .iter()
            .flat_map(|(_, batch)| batch.iter().copied())
            .collect()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.batches.clear();
        state.calls.clear();
    }

    fn record_call(&self, call: DeviceCall) {
        self.state.lock().calls.push(call);
    }

    fn record_batch(&self, name: &str, batch: &[MidiMessage]) {
        self.state
            .lock()
            .batches
            .push((name.to_string(), batch.to_vec()));
    }
}

impl std::fmt::Debug for VirtualMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VirtualMonitor")
            .field("batches", &state.batches.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

/// Which lifecycle step a virtual device should refuse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub fail_init: bool,
    pub fail_start: bool,
}

impl FailurePlan {
    fn check(&self, name: &str, init: bool) -> Result<()> {
        match (init, self.fail_init, self.fail_start) {
            (true, true, _) => Err(Error::MidiDevice(format!("{name}: init refused"))),
            (false, _, true) => Err(Error::MidiDevice(format!("{name}: start refused"))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirtualOutput {
    name: String,
    monitor: VirtualMonitor,
    failure: FailurePlan,
}

impl VirtualOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_monitor(name, VirtualMonitor::new())
    }

    pub fn with_monitor(name: impl Into<String>, monitor: VirtualMonitor) -> Self {
        Self {
            name: name.into(),
            monitor,
            failure: FailurePlan::default(),
        }
    }

    pub fn failing(mut self, failure: FailurePlan) -> Self {
        self.failure = failure;
        self
    }

    pub fn monitor(&self) -> &VirtualMonitor {
        &self.monitor
    }
}

impl MidiDevice for VirtualOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        self.monitor.record_call(DeviceCall::Init(self.name.clone()));
        self.failure.check(&self.name, true)
    }

    fn start(&mut self) -> Result<()> {
        self.monitor.record_call(DeviceCall::Start(self.name.clone()));
        self.failure.check(&self.name, false)
    }

    fn stop(&mut self) {
        self.monitor.record_call(DeviceCall::Stop(self.name.clone()));
    }

    fn close(&mut self) {
        self.monitor.record_call(DeviceCall::Close(self.name.clone()));
    }
}

impl MidiOutDevice for VirtualOutput {
    fn send_queue(&mut self, messages: &[MidiMessage]) {
        self.monitor.record_batch(&self.name, messages);
    }
}

#[derive(Default)]
struct InputShared {
    sink: Mutex<Option<InputSink>>,
    running: AtomicBool,
}

/// Virtual controller. Clones share the same attached sink.
#[derive(Clone)]
pub struct VirtualInput {
    name: String,
    monitor: VirtualMonitor,
    failure: FailurePlan,
    shared: Arc<InputShared>,
}

impl VirtualInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_monitor(name, VirtualMonitor::new())
    }

    pub fn with_monitor(name: impl Into<String>, monitor: VirtualMonitor) -> Self {
        Self {
            name: name.into(),
            monitor,
            failure: FailurePlan::default(),
            shared: Arc::new(InputShared::default()),
        }
    }

    pub fn failing(mut self, failure: FailurePlan) -> Self {
        self.failure = failure;
        self
    }

    pub fn monitor(&self) -> &VirtualMonitor {
        &self.monitor
    }

    /// Inject a message. Dropped unless the device is running and attached.
    pub fn inject(&self, message: MidiMessage) -> bool {
        if !self.shared.running.load(Ordering::Acquire) {
            return false;
        }
        match self.shared.sink.lock().as_mut() {
            Some(sink) => sink.push(message),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for VirtualInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualInput")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl MidiDevice for VirtualInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<()> {
        self.monitor.record_call(DeviceCall::Init(self.name.clone()));
        self.failure.check(&self.name, true)
    }

    fn start(&mut self) -> Result<()> {
        self.monitor.record_call(DeviceCall::Start(self.name.clone()));
        self.failure.check(&self.name, false)?;
        self.shared.running.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) {
        self.monitor.record_call(DeviceCall::Stop(self.name.clone()));
        self.shared.running.store(false, Ordering::Release);
    }

    fn close(&mut self) {
        self.monitor.record_call(DeviceCall::Close(self.name.clone()));
        self.shared.running.store(false, Ordering::Release);
    }
}

impl MidiInDevice for VirtualInput {
    fn attach(&mut self, sink: InputSink) {
        *self.shared.sink.lock() = Some(sink);
    }
}

/// Driver reporting a fixed set of virtual devices.
///
/// Each enumeration hands out fresh clones, so monitors and injection
/// handles kept by the caller stay connected across re-enumeration.
#[derive(Debug, Clone, Default)]
pub struct VirtualDriver {
    outputs: Vec<VirtualOutput>,
    inputs: Vec<VirtualInput>,
}

impl VirtualDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, output: VirtualOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_input(mut self, input: VirtualInput) -> Self {
        self.inputs.push(input);
        self
    }
}

impl MidiDriver for VirtualDriver {
    fn output_devices(&self) -> Vec<Box<dyn MidiOutDevice>> {
        self.outputs
            .iter()
            .cloned()
            .map(|device| Box::new(device) as Box<dyn MidiOutDevice>)
            .collect()
    }

    fn input_devices(&self) -> Vec<Box<dyn MidiInDevice>> {
        self.inputs
            .iter()
            .cloned()
            .map(|device| Box::new(device) as Box<dyn MidiInDevice>)
            .collect()
    }
}
