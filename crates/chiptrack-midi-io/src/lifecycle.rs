//! Active-device bookkeeping for one direction (input or output).

use crate::catalog::{DeviceArena, DeviceHandle, DeviceInfo};
use crate::device::{DeviceState, MidiDevice};
use tracing::{debug, info, warn};

/// Result of a selection or transport-start request.
///
/// Failures are reported here and logged; they never propagate as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A device was opened and is now running.
    Activated,
    /// The requested device was already the active one; nothing was touched.
    Unchanged,
    /// The name was recorded and will be opened when playback starts.
    Deferred,
    /// Nothing is selected.
    Inactive,
    /// No device with the requested name exists.
    NotFound,
    /// The device exists but refused to open or start.
    Failed(String),
}

impl SelectOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SelectOutcome::NotFound | SelectOutcome::Failed(_))
    }
}

/// Owns one arena and remembers which of its devices is active.
pub struct DeviceSelector<T: ?Sized> {
    arena: DeviceArena<T>,
    active: Option<DeviceHandle>,
    kind: &'static str,
}

impl<T: MidiDevice + ?Sized> DeviceSelector<T> {
    /// `kind` labels log lines ("input", "output").
    pub fn new(arena: DeviceArena<T>, kind: &'static str) -> Self {
        Self {
            arena,
            active: None,
            kind,
        }
    }

    pub fn active(&self) -> Option<DeviceHandle> {
        self.active
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.and_then(|handle| self.arena.name(handle))
    }

    pub fn active_state(&self) -> Option<DeviceState> {
        self.active.and_then(|handle| self.arena.state(handle))
    }

    pub fn is_active_named(&self, name: &str) -> bool {
        self.active_name() == Some(name)
    }

    pub fn active_device_mut(&mut self) -> Option<&mut T> {
        let handle = self.active?;
        self.arena.get_mut(handle)
    }

    pub fn names(&self) -> Vec<String> {
        self.arena.names()
    }

    pub fn list(&self) -> Vec<DeviceInfo> {
        self.arena.list()
    }

    /// Find `name`, then init and start it. Any previous device must already
    /// be deactivated. On failure the device is closed and nothing is active.
    pub fn activate(&mut self, name: &str) -> SelectOutcome {
        debug_assert!(self.active.is_none());
        let Some(handle) = self.arena.find(name) else {
            warn!("MIDI {} device {} not found", self.kind, name);
            return SelectOutcome::NotFound;
        };

        if let Err(e) = self.arena.init(handle) {
            warn!("MIDI {} device {} failed to open: {}", self.kind, name, e);
            self.arena.close(handle);
            return SelectOutcome::Failed(e.to_string());
        }
        if let Err(e) = self.arena.start(handle) {
            warn!("MIDI {} device {} failed to start: {}", self.kind, name, e);
            self.arena.close(handle);
            return SelectOutcome::Failed(e.to_string());
        }

        self.active = Some(handle);
        info!("MIDI {} device {} started", self.kind, name);
        SelectOutcome::Activated
    }

    /// Stop and close the active device, if any. Returns whether one was active.
    pub fn deactivate(&mut self) -> bool {
        let Some(handle) = self.active.take() else {
            return false;
        };
        self.arena.close(handle);
        debug!(
            "MIDI {} device {} closed",
            self.kind,
            self.arena.name(handle).unwrap_or("?")
        );
        true
    }

    /// Swap in a freshly enumerated arena. The active device is closed first
    /// and every device of the old arena is released.
    pub fn replace_arena(&mut self, arena: DeviceArena<T>) {
        self.deactivate();
        self.arena.clear();
        self.arena = arena;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MidiOutDevice;
    use crate::virtual_device::{DeviceCall, FailurePlan, VirtualMonitor, VirtualOutput};

    fn selector(devices: Vec<VirtualOutput>) -> DeviceSelector<dyn MidiOutDevice> {
        let devices = devices
            .into_iter()
            .map(|d| Box::new(d) as Box<dyn MidiOutDevice>)
            .collect();
        DeviceSelector::new(DeviceArena::from_devices(devices), "output")
    }

    #[test]
    fn test_activate_and_deactivate() {
        let monitor = VirtualMonitor::new();
        let mut selector = selector(vec![VirtualOutput::with_monitor("X", monitor.clone())]);

        assert_eq!(selector.activate("X"), SelectOutcome::Activated);
        assert!(selector.is_active_named("X"));
        assert_eq!(selector.active_state(), Some(DeviceState::Running));

        assert!(selector.deactivate());
        assert!(!selector.deactivate());
        assert_eq!(selector.active_name(), None);
        assert_eq!(
            monitor.calls(),
            vec![
                DeviceCall::Init("X".into()),
                DeviceCall::Start("X".into()),
                DeviceCall::Stop("X".into()),
                DeviceCall::Close("X".into()),
            ]
        );
    }

    #[test]
    fn test_not_found() {
        let mut selector = selector(vec![VirtualOutput::new("X")]);
        assert_eq!(selector.activate("Y"), SelectOutcome::NotFound);
        assert!(selector.active().is_none());
        assert!(SelectOutcome::NotFound.is_failure());
    }

    #[test]
    fn test_start_failure_closes_device() {
        let monitor = VirtualMonitor::new();
        let mut selector = selector(vec![VirtualOutput::with_monitor("X", monitor.clone())
            .failing(FailurePlan {
                fail_init: false,
                fail_start: true,
            })]);

        let outcome = selector.activate("X");
        assert!(matches!(outcome, SelectOutcome::Failed(_)));
        assert!(selector.active().is_none());
        assert_eq!(
            monitor.calls(),
            vec![
                DeviceCall::Init("X".into()),
                DeviceCall::Start("X".into()),
                DeviceCall::Close("X".into()),
            ]
        );
        assert_eq!(selector.list()[0].state, DeviceState::Closed);
    }

    #[test]
    fn test_init_failure_closes_device() {
        let monitor = VirtualMonitor::new();
        let mut selector = selector(vec![VirtualOutput::with_monitor("X", monitor.clone())
            .failing(FailurePlan {
                fail_init: true,
                fail_start: false,
            })]);

        assert!(matches!(selector.activate("X"), SelectOutcome::Failed(_)));
        assert!(selector.active().is_none());
        assert_eq!(
            monitor.calls(),
            vec![DeviceCall::Init("X".into()), DeviceCall::Close("X".into())]
        );
    }

    #[test]
    fn test_replace_arena_closes_active() {
        let monitor = VirtualMonitor::new();
        let mut selector = selector(vec![VirtualOutput::with_monitor("X", monitor.clone())]);
        selector.activate("X");
        monitor.clear();

        selector.replace_arena(DeviceArena::from_devices(vec![
            Box::new(VirtualOutput::new("Z")) as Box<dyn MidiOutDevice>
        ]));
        assert_eq!(
            monitor.calls(),
            vec![DeviceCall::Stop("X".into()), DeviceCall::Close("X".into())]
        );
        assert_eq!(selector.names(), vec!["Z"]);
        assert!(selector.active().is_none());
    }
}
