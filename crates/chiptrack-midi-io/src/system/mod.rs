//! MIDI output service: the entry point tying ring, scheduler, sync and device lifecycle together.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chiptrack_midi_io::{MidiMessage, MidiService, SliceDivider};
//!
//! let midi = MidiService::builder()
//!     .io()
//!     .midi_delay_ticks(2)
//!     .clock(SliceDivider::new(6))
//!     .build()?;
//!
//! midi.select_device("USB MIDI Interface");
//! midi.on_player_start();
//!
//! // Playback context, once per slice
//! midi.enqueue(MidiMessage::note_on(0, 60, 100));
//! midi.on_playback_slice();
//! midi.request_flush();
//!
//! // Audio context, once per hardware buffer
//! midi.on_hardware_tick();
//! ```
//!
//! ## Threading
//!
//! `MidiService` is `Send + Sync` and cheap to clone. The playback context
//! calls `enqueue`, `on_playback_slice`, `request_flush` and the transport
//! hooks; the audio context calls `on_hardware_tick`. Device selection may
//! come from either of them or from a UI thread. Opening and closing devices
//! happens under the output-slot lock; the flush path only `try_lock`s it, so
//! a tick never waits on device I/O. A batch that finds the slot busy stays
//! in the ring and goes out with the next rotation. `enqueue` never takes
//! that lock; it reads an atomic published once the slot has settled.

mod builder;

pub use builder::MidiServiceBuilder;

use crate::catalog::{DeviceCatalog, DeviceInfo, MidiDriver};
use crate::config::MidiServiceConfig;
use crate::device::{DeviceState, MidiInDevice, MidiOutDevice};
use crate::lifecycle::{DeviceSelector, SelectOutcome};
use crate::merger::InputMerger;
use crate::message::MidiMessage;
use crate::ring::{OutputQueueRing, RingStats};
use crate::scheduler::TickScheduler;
use crate::sync::{SyncBridge, TransportClock};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Notifications published by the audio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    /// One hardware buffer period elapsed.
    Tick,
    Started,
    Stopped,
}

/// MIDI output scheduling service. Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct MidiService {
    inner: Arc<MidiServiceInner>,
}

struct OutputSlot {
    selector: DeviceSelector<dyn MidiOutDevice>,
    /// Name picked by the user, opened on the next transport start.
    pending: Option<String>,
}

pub(crate) struct MidiServiceInner {
    config: MidiServiceConfig,
    driver: Box<dyn MidiDriver>,
    clock: Arc<dyn TransportClock>,
    ring: OutputQueueRing,
    scheduler: TickScheduler,
    sync: SyncBridge,
    output: Mutex<OutputSlot>,
    input: Mutex<DeviceSelector<dyn MidiInDevice>>,
    merger: InputMerger,
    output_active: AtomicBool,
    active_output_name: ArcSwap<Option<String>>,
    active_input_name: ArcSwap<Option<String>>,
}

impl MidiService {
    pub fn builder() -> MidiServiceBuilder {
        MidiServiceBuilder::default()
    }

    pub(crate) fn from_parts(
        config: MidiServiceConfig,
        driver: Box<dyn MidiDriver>,
        clock: Arc<dyn TransportClock>,
    ) -> Self {
        let inner = MidiServiceInner {
            ring: OutputQueueRing::new(config.buffer_count, config.max_messages_per_slot),
            scheduler: TickScheduler::new(config.midi_delay_ticks),
            sync: SyncBridge::new(config.send_sync),
            merger: InputMerger::with_capacity(config.input_capacity),
            output: Mutex::new(OutputSlot {
                selector: DeviceSelector::new(Default::default(), "output"),
                pending: None,
            }),
            input: Mutex::new(DeviceSelector::new(Default::default(), "input")),
            output_active: AtomicBool::new(false),
            active_output_name: ArcSwap::from_pointee(None),
            active_input_name: ArcSwap::from_pointee(None),
            config,
            driver,
            clock,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    // ==================== Catalog ====================

    /// Re-enumerate devices from the driver and rebuild the input merger.
    ///
    /// Open devices of the previous catalog are closed first. A pending
    /// output name survives and is resolved against the new catalog on the
    /// next transport start.
    pub fn init(&self) {
        let DeviceCatalog {
            outputs,
            mut inputs,
        } = DeviceCatalog::enumerate(self.inner.driver.as_ref());
        info!(
            "MIDI catalog: {} output(s), {} input(s)",
            outputs.len(),
            inputs.len()
        );

        {
            let mut output = self.inner.output.lock();
            self.inner.output_active.store(false, Ordering::Release);
            output.selector.replace_arena(outputs);
            self.publish_output(&output);
        }

        let mut input = self.inner.input.lock();
        self.inner.merger.clear();
        for device in inputs.devices_mut() {
            self.inner.merger.insert(device);
        }
        input.replace_arena(inputs);
        self.publish_input(&input);
    }

    pub fn output_names(&self) -> Vec<String> {
        self.inner.output.lock().selector.names()
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inner.input.lock().names()
    }

    pub fn outputs(&self) -> Vec<DeviceInfo> {
        self.inner.output.lock().selector.list()
    }

    pub fn inputs(&self) -> Vec<DeviceInfo> {
        self.inner.input.lock().list()
    }

    // ==================== Device Selection ====================

    /// Open the input called `name` for monitoring.
    ///
    /// Re-selecting the running input is a no-op. Otherwise the current
    /// input is closed first; if `name` cannot be opened nothing is active.
    pub fn select_input(&self, name: &str) -> SelectOutcome {
        let mut input = self.inner.input.lock();
        if input.is_active_named(name) {
            debug!("MIDI input {} already active", name);
            return SelectOutcome::Unchanged;
        }
        input.deactivate();
        let outcome = input.activate(name);
        self.publish_input(&input);
        outcome
    }

    /// Remember `name` as the output to open on the next transport start.
    pub fn select_output(&self, name: &str) -> SelectOutcome {
        self.inner.output.lock().pending = Some(name.to_string());
        info!("MIDI output {} selected, opening on next start", name);
        SelectOutcome::Deferred
    }

    /// Select `name` for both directions: the output is deferred, the input opens now.
    pub fn select_device(&self, name: &str) -> SelectOutcome {
        self.select_output(name);
        self.select_input(name)
    }

    pub fn pending_output_name(&self) -> Option<String> {
        self.inner.output.lock().pending.clone()
    }

    /// Lock-free.
    pub fn active_output_name(&self) -> Option<String> {
        self.inner.active_output_name.load().as_ref().clone()
    }

    /// Lock-free.
    pub fn active_input_name(&self) -> Option<String> {
        self.inner.active_input_name.load().as_ref().clone()
    }

    /// Lock-free.
    pub fn is_output_active(&self) -> bool {
        self.inner.output_active.load(Ordering::Acquire)
    }

    // ==================== Transport ====================

    /// Reset both ring cursors and drop anything still buffered.
    pub fn start(&self) {
        self.inner.scheduler.disarm();
        self.inner.ring.reset();
    }

    /// Playback started: open the pending output (or keep the current one),
    /// then queue a Start message when sync is on.
    pub fn on_player_start(&self) -> SelectOutcome {
        let outcome = {
            let mut output = self.inner.output.lock();
            let outcome = match output.pending.take() {
                Some(name) => {
                    self.inner.output_active.store(false, Ordering::Release);
                    output.selector.deactivate();
                    output.selector.activate(&name)
                }
                None if output.selector.active().is_some() => SelectOutcome::Unchanged,
                None => SelectOutcome::Inactive,
            };
            self.publish_output(&output);
            outcome
        };

        if let Some(message) = self.inner.sync.transport_start() {
            self.enqueue(message);
        }
        outcome
    }

    /// Playback stopped: queue a Stop message when sync is on. The device stays open.
    pub fn on_player_stop(&self) {
        if let Some(message) = self.inner.sync.transport_stop() {
            self.enqueue(message);
        }
    }

    /// Stop and close the active output.
    pub fn stop_output(&self) {
        let mut output = self.inner.output.lock();
        self.inner.output_active.store(false, Ordering::Release);
        if output.selector.deactivate() {
            info!("MIDI output stopped");
        }
        self.publish_output(&output);
    }

    /// Stop and close both the active output and the active input.
    pub fn close(&self) {
        self.stop_output();
        let mut input = self.inner.input.lock();
        input.deactivate();
        self.publish_input(&input);
    }

    // ==================== Playback Context ====================

    /// Queue `message` for the next rotation of the current slot.
    ///
    /// Silently dropped while no output device is active.
    pub fn enqueue(&self, message: MidiMessage) -> bool {
        if !self.inner.output_active.load(Ordering::Acquire) {
            trace!("Dropping MIDI message {:?}: no output device", message);
            return false;
        }
        self.inner.ring.enqueue(message)
    }

    pub fn advance_play_cursor(&self) {
        self.inner.ring.advance_play_cursor();
    }

    /// Once per playback slice: move to the next slot, then add a clock
    /// pulse if the transport clock asks for one.
    pub fn on_playback_slice(&self) {
        self.advance_play_cursor();
        if self.is_output_active() {
            if let Some(message) = self.inner.sync.clock_pulse(self.inner.clock.as_ref()) {
                self.enqueue(message);
            }
        }
    }

    /// Arm the delayed flush, or flush right away when the delay is zero.
    pub fn request_flush(&self) {
        if self.inner.scheduler.request_flush() {
            self.rotate();
        }
    }

    // ==================== Audio Context ====================

    pub fn on_hardware_tick(&self) {
        if self.inner.scheduler.on_tick() {
            self.rotate();
        }
    }

    pub fn on_driver_event(&self, event: DriverEvent) {
        if event == DriverEvent::Tick {
            self.on_hardware_tick();
        }
    }

    /// Hand the slot at the out cursor to the active output, then advance
    /// the out cursor.
    ///
    /// Returns the number of messages drained. They are discarded when no
    /// output is active. While a device is being opened or closed the batch
    /// is held instead, and 0 is returned.
    pub fn rotate(&self) -> usize {
        let inner = &self.inner;
        inner.ring.try_rotate(|batch| {
            let Some(mut output) = inner.output.try_lock() else {
                trace!("MIDI output busy, holding {} message(s)", batch.len());
                return false;
            };
            match output.selector.active_device_mut() {
                Some(device) => device.send_queue(batch),
                None => debug!("Discarding {} MIDI message(s): no output device", batch.len()),
            }
            true
        })
    }

    // ==================== Inspection ====================

    pub fn config(&self) -> &MidiServiceConfig {
        &self.inner.config
    }

    pub fn ring_stats(&self) -> RingStats {
        self.inner.ring.stats()
    }

    /// Messages buffered in the ring, all slots combined.
    pub fn pending_messages(&self) -> usize {
        self.inner.ring.pending()
    }

    pub fn play_cursor(&self) -> usize {
        self.inner.ring.play_cursor()
    }

    pub fn out_cursor(&self) -> usize {
        self.inner.ring.out_cursor()
    }

    pub fn slot_len(&self, index: usize) -> Option<usize> {
        self.inner.ring.slot_len(index)
    }

    pub fn ticks_until_flush(&self) -> u32 {
        self.inner.scheduler.ticks_remaining()
    }

    pub fn input_merger(&self) -> &InputMerger {
        &self.inner.merger
    }

    /// Everything received from the inputs since the last call.
    pub fn drain_input(&self) -> Vec<MidiMessage> {
        self.inner.merger.drain()
    }

    fn publish_output(&self, output: &OutputSlot) {
        let running = output.selector.active_state() == Some(DeviceState::Running);
        self.inner
            .active_output_name
            .store(Arc::new(output.selector.active_name().map(str::to_owned)));
        self.inner.output_active.store(running, Ordering::Release);
    }

    fn publish_input(&self, input: &DeviceSelector<dyn MidiInDevice>) {
        self.inner
            .active_input_name
            .store(Arc::new(input.active_name().map(str::to_owned)));
    }
}

impl Drop for MidiServiceInner {
    fn drop(&mut self) {
        let output = self.output.get_mut();
        output.selector.deactivate();
        self.input.get_mut().deactivate();
    }
}
