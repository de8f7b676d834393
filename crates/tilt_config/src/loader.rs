//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::resolve::resolve_pins;
use crate::types::{BenchConfig, PACKET_LEN};
use std::path::Path;

/// The file name looked up in a bench directory.
pub const CONFIG_FILE: &str = "tilt.toml";

/// Loads and validates `tilt.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<BenchConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<BenchConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `tilt.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<BenchConfig, ConfigError> {
    let config: BenchConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and the ranges of numeric settings.
fn validate_config(config: &BenchConfig) -> Result<(), ConfigError> {
    if config.clock.signal.is_empty() {
        return Err(ConfigError::MissingField("clock.signal".to_string()));
    }
    if config.reset.signal.is_empty() {
        return Err(ConfigError::MissingField("reset.signal".to_string()));
    }
    if config.clock.frequency.period_fs() < 2 {
        return Err(ConfigError::ValidationError(format!(
            "clock.frequency must be positive, got {}",
            config.clock.frequency
        )));
    }
    if config.telemetry.baud == 0 {
        return Err(ConfigError::ValidationError(
            "telemetry.baud must be positive".to_string(),
        ));
    }
    if config.telemetry.header.is_empty() {
        return Err(ConfigError::MissingField("telemetry.header".to_string()));
    }
    if config.telemetry.header.len() > PACKET_LEN {
        return Err(ConfigError::ValidationError(format!(
            "telemetry.header has {} bytes, a packet has {PACKET_LEN}",
            config.telemetry.header.len()
        )));
    }
    if config.slow_bit_period() == 0 {
        return Err(ConfigError::ValidationError(format!(
            "telemetry.baud {} exceeds the clock frequency {}",
            config.telemetry.baud, config.clock.frequency
        )));
    }
    let timing = &config.timing;
    for (name, value) in [
        ("timing.probe_cycles", timing.probe_cycles),
        ("timing.fast_timeout", timing.fast_timeout),
        ("timing.slow_timeout", timing.slow_timeout),
        ("timing.fast_bit_period", timing.fast_bit_period),
        ("oracle.done_cap", config.oracle.done_cap),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{name} must be positive"
            )));
        }
    }
    let tolerance = config.oracle.rotation_tolerance_deg;
    if tolerance.is_nan() || tolerance <= 0.0 {
        return Err(ConfigError::ValidationError(
            "oracle.rotation_tolerance_deg must be positive".to_string(),
        ));
    }
    resolve_pins(&config.pins)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PinLayout, Truncation};

    #[test]
    fn parse_empty_config() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.clock.signal, "clk");
        assert_eq!(config.slow_bit_period(), 1042);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[clock]
frequency = "10MHz"
signal = "clk"

[reset]
signal = "rst_n"
hold_ns = 200
settle_ns = 50

[telemetry]
baud = 115200
header = [0xDE, 0xAD]

[timing]
probe_cycles = 4000
fast_timeout = 10000
slow_timeout = 400000
fast_bit_period = 5

[spi]
truncation = "fail"
burst_opcode = 0xBB

[pins]
layout = "packed"
telemetry = "uo_out[3]"

[oracle]
rotation_tolerance_deg = 0.5
done_cap = 32
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.reset.hold_ns, 200);
        assert_eq!(config.slow_bit_period(), 87);
        assert_eq!(config.timing.probe_cycles, 4000);
        assert_eq!(config.spi.truncation, Truncation::Fail);
        assert_eq!(config.pins.layout, PinLayout::Packed);
        assert_eq!(config.oracle.rotation_tolerance_deg, 0.5);
    }

    #[test]
    fn reject_unparseable() {
        let err = load_config_from_str("[clock\nfrequency = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn reject_zero_frequency() {
        let err = load_config_from_str("[clock]\nfrequency = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn reject_zero_baud_and_empty_header() {
        assert!(load_config_from_str("[telemetry]\nbaud = 0").is_err());
        let err = load_config_from_str("[telemetry]\nheader = []").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn header_fits_in_one_packet() {
        let config = load_config_from_str("[telemetry]\nheader = [1, 2, 3, 4, 5, 6]").unwrap();
        assert_eq!(config.telemetry.header.len(), PACKET_LEN);
        assert!(!config.telemetry.check_gyro_echo);
        let err = load_config_from_str("[telemetry]\nheader = [1, 2, 3, 4, 5, 6, 7]").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("7 bytes"), "{err}");
    }

    #[test]
    fn reject_zero_timeouts() {
        let err = load_config_from_str("[timing]\nfast_timeout = 0").unwrap_err();
        assert!(err.to_string().contains("timing.fast_timeout"));
    }

    #[test]
    fn reject_bad_tolerance() {
        assert!(load_config_from_str("[oracle]\nrotation_tolerance_deg = 0.0").is_err());
        assert!(load_config_from_str("[oracle]\nrotation_tolerance_deg = nan").is_err());
    }

    #[test]
    fn reject_bad_pin() {
        let err = load_config_from_str("[pins]\nmiso = \"ui_in[\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPin { .. }));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[telemetry]\nbaud = 19200\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.telemetry.baud, 19200);
        assert_eq!(config.slow_bit_period(), 521);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
