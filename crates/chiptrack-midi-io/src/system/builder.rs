//! MidiService builder for configuring the output path.

use std::sync::Arc;

use crate::catalog::MidiDriver;
use crate::config::{ConfigSource, MidiServiceConfig};
use crate::error::Result;
use crate::sync::{NoClock, TransportClock};
use crate::virtual_device::VirtualDriver;

use super::MidiService;

pub struct MidiServiceBuilder {
    pub(super) config: MidiServiceConfig,
    pub(super) driver: Option<Box<dyn MidiDriver>>,
    pub(super) clock: Option<Arc<dyn TransportClock>>,
}

#[allow(clippy::derivable_impls)]
impl Default for MidiServiceBuilder {
    fn default() -> Self {
        Self {
            config: MidiServiceConfig::default(),
            driver: None,
            clock: None,
        }
    }
}

impl MidiServiceBuilder {
    /// Use the system MIDI backend (midir).
    #[cfg(feature = "midi-io")]
    pub fn io(self) -> Self {
        self.driver(crate::io::MidirDriver::new())
    }

    pub fn config(mut self, config: MidiServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Read `MIDIDELAY` and `MIDISENDSYNC` from the host's settings.
    pub fn config_source<S: ConfigSource + ?Sized>(mut self, source: &S) -> Self {
        let defaults = MidiServiceConfig::from_source(source);
        self.config.midi_delay_ticks = defaults.midi_delay_ticks;
        self.config.send_sync = defaults.send_sync;
        self
    }

    pub fn midi_delay_ticks(mut self, ticks: u32) -> Self {
        self.config.midi_delay_ticks = ticks;
        self
    }

    pub fn send_sync(mut self, enabled: bool) -> Self {
        self.config.send_sync = enabled;
        self
    }

    pub fn buffer_count(mut self, count: usize) -> Self {
        self.config.buffer_count = count;
        self
    }

    pub fn driver<D: MidiDriver + 'static>(mut self, driver: D) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    /// Source of clock pulses. Without one no timing clock is ever sent.
    pub fn clock<C: TransportClock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<MidiService> {
        self.config.validate()?;

        let driver = self
            .driver
            .unwrap_or_else(|| Box::new(VirtualDriver::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(NoClock));

        let service = MidiService::from_parts(self.config, driver, clock);
        service.init();
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::virtual_device::{VirtualInput, VirtualOutput};
    use std::collections::HashMap;

    #[test]
    fn test_default_build() {
        let midi = MidiServiceBuilder::default().build().unwrap();
        assert!(midi.output_names().is_empty());
        assert!(midi.input_names().is_empty());
        assert_eq!(midi.config().midi_delay_ticks, 1);
        assert!(!midi.is_output_active());
    }

    #[test]
    fn test_build_enumerates_driver() {
        let midi = MidiServiceBuilder::default()
            .driver(
                VirtualDriver::new()
                    .with_output(VirtualOutput::new("Synth"))
                    .with_input(VirtualInput::new("Keys")),
            )
            .build()
            .unwrap();
        assert_eq!(midi.output_names(), vec!["Synth"]);
        assert_eq!(midi.input_names(), vec!["Keys"]);
        assert_eq!(midi.input_merger().names(), vec!["Keys"]);
    }

    #[test]
    fn test_config_source() {
        let mut settings = HashMap::new();
        settings.insert("MIDIDELAY".to_string(), "3".to_string());
        settings.insert("MIDISENDSYNC".to_string(), "NO".to_string());

        let midi = MidiServiceBuilder::default()
            .buffer_count(8)
            .config_source(&settings)
            .build()
            .unwrap();
        assert_eq!(midi.config().midi_delay_ticks, 3);
        assert!(!midi.config().send_sync);
        assert_eq!(midi.config().buffer_count, 8);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = MidiServiceBuilder::default().buffer_count(1).build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
