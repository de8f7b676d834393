//! Everything a scenario needs from the configuration.

use tilt_config::{BenchConfig, ConfigError, PinLayout, ResolvedPins, Truncation};
use tilt_proto::{SpiPins, TruncationPolicy};
use tilt_sim::{Bench, Clock, Device, ResetSequence, SimError};

/// A validated configuration with its pins resolved.
#[derive(Clone, Debug)]
pub struct ScenarioContext {
    /// The bench configuration.
    pub config: BenchConfig,
    /// Device signals behind each logical pin.
    pub pins: ResolvedPins,
}

impl ScenarioContext {
    /// Resolves the pins of `config`.
    pub fn new(config: BenchConfig) -> Result<Self, ConfigError> {
        let pins = tilt_config::resolve_pins(&config.pins)?;
        Ok(Self { config, pins })
    }

    /// The same context with a pin layout preset in place of the
    /// configured pins.
    pub fn with_layout(&self, layout: PinLayout) -> Self {
        Self {
            config: self.config.clone(),
            pins: ResolvedPins::preset(layout),
        }
    }

    /// Builds a bench around `device` with the configured clock.
    pub fn bench<D: Device>(&self, device: D) -> Result<Bench<D>, SimError> {
        let clock = Clock::from_frequency(&self.config.clock.signal, self.config.clock.frequency)?;
        Bench::new(device, clock)
    }

    /// The configured reset pulse.
    pub fn reset_sequence(&self) -> ResetSequence {
        let r = &self.config.reset;
        let mut seq = ResetSequence::active_low(&r.signal, r.hold_ns, r.settle_ns);
        seq.active_low = r.active_low;
        seq
    }

    /// The peripheral bus pins.
    pub fn spi_pins(&self) -> SpiPins {
        SpiPins {
            select: self.pins.select.clone(),
            sclk: self.pins.sclk.clone(),
            mosi: self.pins.mosi.clone(),
            miso: self.pins.miso.clone(),
        }
    }

    /// The configured truncation policy.
    pub fn truncation_policy(&self) -> TruncationPolicy {
        match self.config.spi.truncation {
            Truncation::Tolerate => TruncationPolicy::Tolerate,
            Truncation::Fail => TruncationPolicy::Fail,
        }
    }
}

impl Default for ScenarioContext {
    fn default() -> Self {
        Self {
            config: BenchConfig::default(),
            pins: ResolvedPins::preset(PinLayout::Discrete),
        }
    }
}
