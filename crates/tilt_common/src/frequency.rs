//! Frequencies with unit parsing, and the periods derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Femtoseconds in one second.
const FS_PER_S: f64 = 1e15;

/// Unit suffixes accepted by [`Frequency::from_str`], longest first.
const UNITS: [(&str, f64); 4] = [("ghz", 1e9), ("mhz", 1e6), ("khz", 1e3), ("hz", 1.0)];

/// A frequency stored in Hertz.
///
/// Parses from strings like `"10MHz"`, `"9600Hz"` or a bare number of Hertz.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frequency(f64);

impl Frequency {
    /// Creates a frequency from a value in Hertz.
    pub fn new(hz: f64) -> Self {
        Self(hz)
    }

    /// Returns the frequency in Hertz.
    pub fn hz(&self) -> f64 {
        self.0
    }

    /// Returns the period rounded to whole femtoseconds.
    ///
    /// Non-positive frequencies have no period and return 0.
    pub fn period_fs(&self) -> u64 {
        if self.0 <= 0.0 {
            return 0;
        }
        (FS_PER_S / self.0).round() as u64
    }

    /// Returns how many cycles of this frequency make up one period of `rate`,
    /// rounded to the nearest integer.
    ///
    /// This is how a serial bit period is derived from a clock and a baud
    /// rate: 10 MHz at 9600 baud gives 1042 cycles per bit.
    pub fn cycles_per(&self, rate: f64) -> u64 {
        if rate <= 0.0 {
            return 0;
        }
        (self.0 / rate).round() as u64
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        match UNITS.iter().find(|(_, scale)| hz >= *scale) {
            Some((unit, scale)) => {
                let label = match *unit {
                    "ghz" => "GHz",
                    "mhz" => "MHz",
                    "khz" => "KHz",
                    _ => "Hz",
                };
                write!(f, "{}{label}", hz / scale)
            }
            None => write!(f, "{hz}Hz"),
        }
    }
}

/// Error returned when a frequency string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };
        let lower = s.to_ascii_lowercase();
        let (number, scale) = UNITS
            .iter()
            .find_map(|(unit, scale)| lower.strip_suffix(unit).map(|n| (n, *scale)))
            .unwrap_or((lower.as_str(), 1.0));
        let value: f64 = number.trim().parse().map_err(|_| err())?;
        Ok(Frequency(value * scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!("10MHz".parse::<Frequency>().unwrap().hz(), 10_000_000.0);
        assert_eq!("100KHz".parse::<Frequency>().unwrap().hz(), 100_000.0);
        assert_eq!("9600Hz".parse::<Frequency>().unwrap().hz(), 9_600.0);
        assert_eq!("1GHz".parse::<Frequency>().unwrap().hz(), 1e9);
        assert_eq!("25000000".parse::<Frequency>().unwrap().hz(), 25e6);
        assert_eq!("50mhz".parse::<Frequency>().unwrap().hz(), 50e6);
    }

    #[test]
    fn parse_invalid() {
        let err = "fast".parse::<Frequency>().unwrap_err();
        assert_eq!(err.to_string(), "invalid frequency: 'fast'");
    }

    #[test]
    fn ten_mhz_period_is_100ns() {
        assert_eq!(Frequency::new(10e6).period_fs(), 100_000_000);
        assert_eq!(Frequency::new(0.0).period_fs(), 0);
    }

    #[test]
    fn uart_divisor_rounds() {
        let clk = Frequency::new(10e6);
        assert_eq!(clk.cycles_per(9600.0), 1042);
        assert_eq!(clk.cycles_per(115_200.0), 87);
        assert_eq!(clk.cycles_per(0.0), 0);
    }

    #[test]
    fn display_selects_unit() {
        assert_eq!(Frequency::new(10e6).to_string(), "10MHz");
        assert_eq!(Frequency::new(44_100.0).to_string(), "44.1KHz");
        assert_eq!(Frequency::new(500.0).to_string(), "500Hz");
    }
}
