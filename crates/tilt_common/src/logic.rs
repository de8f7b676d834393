//! Four-state logic values as observed on the device boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Not;

/// A single 4-state logic value.
///
/// - `Zero`: driven low
/// - `One`: driven high
/// - `X`: unknown, typically a register before reset
/// - `Z`: high-impedance, nothing drives the net
///
/// `X` and `Z` are both *indeterminate*: they never convert to a number
/// implicitly. Callers that need a level must either handle the `None` from
/// [`Logic::to_bool`] or name a fallback with [`Logic::or_idle`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum Logic {
    /// Logic low (0).
    Zero = 0,
    /// Logic high (1).
    One = 1,
    /// Unknown or uninitialized.
    X = 2,
    /// High-impedance (tri-state).
    Z = 3,
}

impl Logic {
    /// Converts a character to a [`Logic`] value.
    ///
    /// Accepts '0', '1', 'x'/'X', and 'z'/'Z'.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Logic::Zero),
            '1' => Some(Logic::One),
            'x' | 'X' => Some(Logic::X),
            'z' | 'Z' => Some(Logic::Z),
            _ => None,
        }
    }

    /// Returns the driven level for a boolean.
    pub fn from_bool(level: bool) -> Self {
        if level {
            Logic::One
        } else {
            Logic::Zero
        }
    }

    /// Returns `true` for `Zero` and `One`.
    pub fn is_known(self) -> bool {
        matches!(self, Logic::Zero | Logic::One)
    }

    /// Returns the level, or `None` when the value is indeterminate.
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Logic::Zero => Some(false),
            Logic::One => Some(true),
            Logic::X | Logic::Z => None,
        }
    }

    /// Returns the level, substituting `idle` for an indeterminate value.
    ///
    /// This is the documented fallback for idle-high lines (chip select,
    /// UART TX) that are undriven while the device sits in reset.
    pub fn or_idle(self, idle: bool) -> bool {
        self.to_bool().unwrap_or(idle)
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::Zero => write!(f, "0"),
            Logic::One => write!(f, "1"),
            Logic::X => write!(f, "X"),
            Logic::Z => write!(f, "Z"),
        }
    }
}

/// `!X` and `!Z` stay unknown.
impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Logic::Zero => Logic::One,
            Logic::One => Logic::Zero,
            Logic::X | Logic::Z => Logic::X,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Logic::{self, *};

    #[test]
    fn known_levels_convert() {
        assert_eq!(Zero.to_bool(), Some(false));
        assert_eq!(One.to_bool(), Some(true));
        assert_eq!(Logic::from_bool(true), One);
        assert_eq!(Logic::from_bool(false), Zero);
    }

    #[test]
    fn indeterminate_never_converts() {
        assert_eq!(X.to_bool(), None);
        assert_eq!(Z.to_bool(), None);
        assert!(!X.is_known());
        assert!(!Z.is_known());
    }

    #[test]
    fn idle_fallback_only_applies_to_indeterminate() {
        assert!(X.or_idle(true));
        assert!(Z.or_idle(true));
        assert!(!Zero.or_idle(true));
        assert!(One.or_idle(false));
    }

    #[test]
    fn not_values() {
        assert_eq!(!Zero, One);
        assert_eq!(!One, Zero);
        assert_eq!(!X, X);
        assert_eq!(!Z, X);
    }

    #[test]
    fn display_and_parse() {
        for (c, v) in [('0', Zero), ('1', One), ('X', X), ('Z', Z)] {
            assert_eq!(Logic::from_char(c), Some(v));
            assert_eq!(v.to_string(), c.to_string());
        }
        assert_eq!(Logic::from_char('x'), Some(X));
        assert_eq!(Logic::from_char('2'), None);
    }
}
