//! Device catalog: arenas of discoverable input and output endpoints.
//!
//! Devices are owned here and addressed by [`DeviceHandle`]. The arena
//! tracks each descriptor's lifecycle state and refuses out-of-order
//! transitions before they reach the backend.

use crate::device::{DeviceState, MidiDevice, MidiInDevice, MidiOutDevice};
use crate::error::{Error, Result};

/// Stable index of a device inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub handle: DeviceHandle,
    pub name: String,
    pub state: DeviceState,
}

struct DeviceSlot<T: ?Sized> {
    device: Box<T>,
    state: DeviceState,
}

pub struct DeviceArena<T: ?Sized> {
    slots: Vec<DeviceSlot<T>>,
}

impl<T: ?Sized> Default for DeviceArena<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T: MidiDevice + ?Sized> DeviceArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: Vec<Box<T>>) -> Self {
        let mut arena = Self::new();
        for device in devices {
            arena.push(device);
        }
        arena
    }

    pub fn push(&mut self, device: Box<T>) -> DeviceHandle {
        let handle = DeviceHandle(self.slots.len());
        self.slots.push(DeviceSlot {
            device,
            state: DeviceState::Closed,
        });
        handle
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// First device whose name matches exactly.
    pub fn find(&self, name: &str) -> Option<DeviceHandle> {
        self.slots
            .iter()
            .position(|slot| slot.device.name() == name)
            .map(DeviceHandle)
    }

    pub fn name(&self, handle: DeviceHandle) -> Option<&str> {
        self.slots.get(handle.0).map(|slot| slot.device.name())
    }

    pub fn state(&self, handle: DeviceHandle) -> Option<DeviceState> {
        self.slots.get(handle.0).map(|slot| slot.state)
    }

    pub fn names(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| slot.device.name().to_string())
            .collect()
    }

    pub fn list(&self) -> Vec<DeviceInfo> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| DeviceInfo {
                handle: DeviceHandle(index),
                name: slot.device.name().to_string(),
                state: slot.state,
            })
            .collect()
    }

    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.0).map(|slot| &mut *slot.device)
    }

    pub fn devices_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().map(|slot| &mut *slot.device)
    }

    /// `Closed -> Initialized`. A failed init is closed again before the error returns.
    pub fn init(&mut self, handle: DeviceHandle) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        Self::check(slot, DeviceState::Closed, DeviceState::Initialized)?;
        if let Err(e) = slot.device.init() {
            slot.device.close();
            return Err(e);
        }
        slot.state = DeviceState::Initialized;
        Ok(())
    }

    /// `Initialized -> Running`.
    pub fn start(&mut self, handle: DeviceHandle) -> Result<()> {
        let slot = self.slot_mut(handle)?;
        Self::check(slot, DeviceState::Initialized, DeviceState::Running)?;
        slot.device.start()?;
        slot.state = DeviceState::Running;
        Ok(())
    }

    /// `Running -> Initialized`. No-op in any other state.
    pub fn stop(&mut self, handle: DeviceHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            if slot.state == DeviceState::Running {
                slot.device.stop();
                slot.state = DeviceState::Initialized;
            }
        }
    }

    /// Stops a running device first, then closes it. No-op when already closed.
    pub fn close(&mut self, handle: DeviceHandle) {
        self.stop(handle);
        if let Some(slot) = self.slots.get_mut(handle.0) {
            if slot.state != DeviceState::Closed {
                slot.device.close();
                slot.state = DeviceState::Closed;
            }
        }
    }

    /// Close every open device and forget all of them.
    pub fn clear(&mut self) {
        for index in 0..self.slots.len() {
            self.close(DeviceHandle(index));
        }
        self.slots.clear();
    }

    fn slot_mut(&mut self, handle: DeviceHandle) -> Result<&mut DeviceSlot<T>> {
        self.slots
            .get_mut(handle.0)
            .ok_or_else(|| Error::DeviceNotFound(format!("handle {}", handle.0)))
    }

    fn check(slot: &DeviceSlot<T>, expected: DeviceState, to: DeviceState) -> Result<()> {
        if slot.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                name: slot.device.name().to_string(),
                from: slot.state,
                to,
            })
        }
    }
}

/// Source of discoverable endpoints (hardware backend, virtual devices, ...).
pub trait MidiDriver: Send + Sync {
    fn output_devices(&self) -> Vec<Box<dyn MidiOutDevice>>;

    fn input_devices(&self) -> Vec<Box<dyn MidiInDevice>>;
}

/// Every input and output endpoint a driver reported.
#[derive(Default)]
pub struct DeviceCatalog {
    pub outputs: DeviceArena<dyn MidiOutDevice>,
    pub inputs: DeviceArena<dyn MidiInDevice>,
}

impl DeviceCatalog {
    pub fn enumerate(driver: &dyn MidiDriver) -> Self {
        Self {
            outputs: DeviceArena::from_devices(driver.output_devices()),
            inputs: DeviceArena::from_devices(driver.input_devices()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_device::{DeviceCall, FailurePlan, VirtualMonitor, VirtualOutput};

    fn arena_with(names: &[&str]) -> (DeviceArena<dyn MidiOutDevice>, VirtualMonitor) {
        let monitor = VirtualMonitor::new();
        let devices = names
            .iter()
            .map(|name| {
                Box::new(VirtualOutput::with_monitor(*name, monitor.clone()))
                    as Box<dyn MidiOutDevice>
            })
            .collect();
        (DeviceArena::from_devices(devices), monitor)
    }

    #[test]
    fn test_find_by_exact_name() {
        let (arena, _) = arena_with(&["USB MIDI 1", "USB MIDI"]);
        assert_eq!(arena.find("USB MIDI").map(DeviceHandle::index), Some(1));
        assert_eq!(arena.find("usb midi"), None);
        assert_eq!(arena.names(), vec!["USB MIDI 1", "USB MIDI"]);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (mut arena, monitor) = arena_with(&["Synth"]);
        let handle = arena.find("Synth").unwrap();

        arena.init(handle).unwrap();
        assert_eq!(arena.state(handle), Some(DeviceState::Initialized));
        arena.start(handle).unwrap();
        assert_eq!(arena.state(handle), Some(DeviceState::Running));
        arena.close(handle);
        assert_eq!(arena.state(handle), Some(DeviceState::Closed));

        assert_eq!(
            monitor.calls(),
            vec![
                DeviceCall::Init("Synth".into()),
                DeviceCall::Start("Synth".into()),
                DeviceCall::Stop("Synth".into()),
                DeviceCall::Close("Synth".into()),
            ]
        );
    }

    #[test]
    fn test_out_of_order_transition_rejected() {
        let (mut arena, monitor) = arena_with(&["Synth"]);
        let handle = arena.find("Synth").unwrap();

        let err = arena.start(handle).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTransition {
                from: DeviceState::Closed,
                to: DeviceState::Running,
                ..
            }
        ));
        // The backend never saw the rejected call
        assert!(monitor.calls().is_empty());

        // Stop/close on a closed device are no-ops
        arena.stop(handle);
        arena.close(handle);
        assert!(monitor.calls().is_empty());
    }

    #[test]
    fn test_failed_init_leaves_device_closed() {
        let mut arena: DeviceArena<dyn MidiOutDevice> = DeviceArena::new();
        let monitor = VirtualMonitor::new();
        let handle = arena.push(Box::new(
            VirtualOutput::with_monitor("Broken", monitor.clone()).failing(FailurePlan {
                fail_init: true,
                fail_start: false,
            }),
        ));

        assert!(arena.init(handle).is_err());
        assert_eq!(arena.state(handle), Some(DeviceState::Closed));
        // Partially acquired resources are released
        assert_eq!(
            monitor.calls(),
            vec![
                DeviceCall::Init("Broken".into()),
                DeviceCall::Close("Broken".into()),
            ]
        );

        // A later close does not reach the backend twice
        arena.close(handle);
        assert_eq!(monitor.calls().len(), 2);
    }

    #[test]
    fn test_unknown_handle() {
        let (mut arena, _) = arena_with(&[]);
        assert!(arena.is_empty());
        assert!(matches!(
            arena.init(DeviceHandle(3)),
            Err(Error::DeviceNotFound(_))
        ));
        assert_eq!(arena.state(DeviceHandle(3)), None);
    }

    #[test]
    fn test_clear_closes_open_devices() {
        let (mut arena, monitor) = arena_with(&["A", "B"]);
        let a = arena.find("A").unwrap();
        arena.init(a).unwrap();
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(
            monitor.calls(),
            vec![DeviceCall::Init("A".into()), DeviceCall::Close("A".into())]
        );
    }
}
