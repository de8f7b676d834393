//! Pin resolution: laying explicit pin roles over a layout preset.

use crate::error::ConfigError;
use crate::types::{PinLayout, PinsConfig};
use tilt_sim::Pin;

/// The device signals behind every logical pin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPins {
    /// Active-low chip select.
    pub select: Pin,
    /// Bus clock.
    pub sclk: Pin,
    /// Controller-to-peripheral data.
    pub mosi: Pin,
    /// Peripheral-to-controller data.
    pub miso: Pin,
    /// Telemetry serial line.
    pub telemetry: Pin,
}

impl ResolvedPins {
    /// The preset for a layout.
    pub fn preset(layout: PinLayout) -> Self {
        match layout {
            PinLayout::Discrete => Self {
                select: Pin::new("spi_cs_n"),
                sclk: Pin::new("spi_sclk"),
                mosi: Pin::new("spi_mosi"),
                miso: Pin::new("spi_miso"),
                telemetry: Pin::new("uart_tx_out"),
            },
            PinLayout::Packed => Self {
                select: Pin::bit("uo_out", 2),
                sclk: Pin::bit("uo_out", 0),
                mosi: Pin::bit("uo_out", 1),
                miso: Pin::bit("ui_in", 0),
                telemetry: Pin::bit("uo_out", 3),
            },
        }
    }
}

/// Resolves the `[pins]` section.
///
/// The layout preset forms the base and any role given explicitly replaces
/// the preset's pin for that role.
pub fn resolve_pins(config: &PinsConfig) -> Result<ResolvedPins, ConfigError> {
    let mut pins = ResolvedPins::preset(config.layout);
    let overrides = [
        ("select", &config.select, &mut pins.select),
        ("sclk", &config.sclk, &mut pins.sclk),
        ("mosi", &config.mosi, &mut pins.mosi),
        ("miso", &config.miso, &mut pins.miso),
        ("telemetry", &config.telemetry, &mut pins.telemetry),
    ];
    for (role, spec, slot) in overrides {
        if let Some(spec) = spec {
            *slot = spec.parse().map_err(|e: tilt_sim::SimError| ConfigError::InvalidPin {
                role: role.to_string(),
                reason: e.to_string(),
            })?;
        }
    }
    Ok(pins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_by_default() {
        let pins = resolve_pins(&PinsConfig::default()).unwrap();
        assert_eq!(pins.select, Pin::new("spi_cs_n"));
        assert_eq!(pins.telemetry, Pin::new("uart_tx_out"));
    }

    #[test]
    fn packed_preset() {
        let config = PinsConfig {
            layout: PinLayout::Packed,
            ..Default::default()
        };
        let pins = resolve_pins(&config).unwrap();
        assert_eq!(pins.sclk, Pin::bit("uo_out", 0));
        assert_eq!(pins.mosi, Pin::bit("uo_out", 1));
        assert_eq!(pins.select, Pin::bit("uo_out", 2));
        assert_eq!(pins.telemetry, Pin::bit("uo_out", 3));
        assert_eq!(pins.miso, Pin::bit("ui_in", 0));
    }

    #[test]
    fn explicit_roles_override_preset() {
        let config = PinsConfig {
            layout: PinLayout::Packed,
            telemetry: Some("uo_out[7]".into()),
            ..Default::default()
        };
        let pins = resolve_pins(&config).unwrap();
        assert_eq!(pins.telemetry, Pin::bit("uo_out", 7));
        assert_eq!(pins.select, Pin::bit("uo_out", 2));
    }

    #[test]
    fn malformed_override_names_role() {
        let config = PinsConfig {
            sclk: Some("".into()),
            ..Default::default()
        };
        match resolve_pins(&config).unwrap_err() {
            ConfigError::InvalidPin { role, .. } => assert_eq!(role, "sclk"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
