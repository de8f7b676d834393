//! Packed vectors of 4-state logic values, the value type of every port.

use crate::logic::Logic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-width vector of [`Logic`] values.
///
/// Each value occupies 2 bits, 32 values per `u64` word. Index 0 is the least
/// significant bit. Numeric conversions return `None` as soon as any bit is
/// `X` or `Z`, so an undriven bus can never masquerade as zero.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicVec {
    width: u32,
    /// Packed storage: 2 bits per logic value, 32 values per u64.
    data: Vec<u64>,
}

const VALUES_PER_WORD: u32 = 32;

impl LogicVec {
    /// Creates a vector of the given width with every bit `Zero`.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            data: vec![0; width.div_ceil(VALUES_PER_WORD) as usize],
        }
    }

    /// Creates a vector of the given width with every bit `X`.
    ///
    /// Device outputs start in this state until the device first drives them.
    pub fn all_x(width: u32) -> Self {
        let mut v = Self::new(width);
        for i in 0..width {
            v.set(i, Logic::X);
        }
        v
    }

    /// Returns the number of bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Gets the logic value at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> Logic {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = self.data[(index / VALUES_PER_WORD) as usize];
        match (word >> ((index % VALUES_PER_WORD) * 2)) & 0b11 {
            0 => Logic::Zero,
            1 => Logic::One,
            2 => Logic::X,
            _ => Logic::Z,
        }
    }

    /// Sets the logic value at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: Logic) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = &mut self.data[(index / VALUES_PER_WORD) as usize];
        let shift = (index % VALUES_PER_WORD) * 2;
        *word = (*word & !(0b11u64 << shift)) | ((value as u64) << shift);
    }

    /// Creates a single-bit vector from a boolean.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(value as u64, 1)
    }

    /// Creates a vector from the low `width` bits of `value`.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut v = Self::new(width);
        for i in 0..width.min(64) {
            if (value >> i) & 1 != 0 {
                v.set(i, Logic::One);
            }
        }
        v
    }

    /// Creates a vector holding the two's-complement encoding of `value`.
    pub fn from_i64(value: i64, width: u32) -> Self {
        Self::from_u64(value as u64, width)
    }

    /// Returns `true` if no bit is `X` or `Z`.
    pub fn is_known(&self) -> bool {
        (0..self.width).all(|i| self.get(i).is_known())
    }

    /// Converts to an unsigned integer.
    ///
    /// Returns `None` if any bit is indeterminate or the width exceeds 64.
    pub fn to_u64(&self) -> Option<u64> {
        if self.width > 64 {
            return None;
        }
        let mut result = 0u64;
        for i in 0..self.width {
            if self.get(i).to_bool()? {
                result |= 1 << i;
            }
        }
        Some(result)
    }

    /// Converts to a signed integer, treating the top bit as the sign.
    ///
    /// Returns `None` under the same conditions as [`LogicVec::to_u64`].
    pub fn to_i64(&self) -> Option<i64> {
        let raw = self.to_u64()?;
        if self.width == 0 || self.width >= 64 {
            return Some(raw as i64);
        }
        let shift = 64 - self.width;
        Some(((raw << shift) as i64) >> shift)
    }

    /// Parses a binary string like `"10XZ"`, most significant bit first.
    ///
    /// Returns `None` if the string contains invalid characters.
    pub fn from_binary_str(s: &str) -> Option<Self> {
        let mut v = Self::new(s.len() as u32);
        for (i, c) in s.chars().rev().enumerate() {
            v.set(i as u32, Logic::from_char(c)?);
        }
        Some(v)
    }
}

impl fmt::Display for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            write!(f, "{}", self.get(i))?;
        }
        Ok(())
    }
}

impl fmt::Debug for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicVec({self})")
    }
}
