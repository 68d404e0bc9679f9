// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The 80-bit versionstamp type.

use std::fmt;
use std::str::FromStr;

/// Number of hex digits in a rendered versionstamp.
const HEX_WIDTH: usize = 20;

/// Mask selecting the lower 80 bits.
const BITS_MASK: u128 = (1 << 80) - 1;

/// Error returned when parsing a malformed versionstamp string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid versionstamp: expected 20 lowercase hex digits, got {0:?}")]
pub struct InvalidVersionstamp(pub String);

/// An 80-bit monotone logical timestamp assigned to writes.
///
/// Rendered as a 20-character lowercase hex string whose lexicographic
/// order matches numeric order. [`Versionstamp::ZERO`] sorts before any
/// stamp a clock can produce and means "before any write".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Versionstamp(u128);

impl Versionstamp {
    /// The all-zero stamp, reserved as "before any write".
    pub const ZERO: Versionstamp = Versionstamp(0);

    /// Creates a stamp from raw bits, masked to 80 bits.
    #[inline]
    pub(crate) fn from_bits(bits: u128) -> Self {
        Self(bits & BITS_MASK)
    }

    /// Returns the stamp's numeric value.
    #[inline]
    pub fn bits(&self) -> u128 {
        self.0
    }

    /// Returns true if this is the reserved zero stamp.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Versionstamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:020x}", self.0)
    }
}

impl FromStr for Versionstamp {
    type Err = InvalidVersionstamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HEX_WIDTH
            || !s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(InvalidVersionstamp(s.to_string()));
        }
        let bits =
            u128::from_str_radix(s, 16).map_err(|_| InvalidVersionstamp(s.to_string()))?;
        Ok(Versionstamp(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_renders_as_twenty_zeros() {
        assert_eq!(Versionstamp::ZERO.to_string(), "0".repeat(20));
        assert!(Versionstamp::ZERO.is_zero());
    }

    #[test]
    fn test_display_is_zero_padded_lowercase() {
        let vs = Versionstamp::from_bits(0xdead_beef);
        assert_eq!(vs.to_string(), "000000000000deadbeef");
    }

    #[test]
    fn test_parse_roundtrip() {
        let vs = Versionstamp::from_bits(0x0123_4567_89ab_cdef_0011);
        let parsed: Versionstamp = vs.to_string().parse().unwrap();
        assert_eq!(parsed, vs);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for s in ["", "short", "0".repeat(19).as_str(), "0".repeat(21).as_str()] {
            assert!(s.parse::<Versionstamp>().is_err(), "{s:?}");
        }
        // Uppercase hex is not a valid rendering.
        assert!("0000000000000000000A".parse::<Versionstamp>().is_err());
        assert!("0000000000000000000g".parse::<Versionstamp>().is_err());
    }

    #[test]
    fn test_from_bits_masks_to_80_bits() {
        let vs = Versionstamp::from_bits(u128::MAX);
        assert_eq!(vs.bits(), (1 << 80) - 1);
        assert_eq!(vs.to_string(), "f".repeat(20));
    }

    #[test]
    fn test_lexicographic_order_matches_numeric() {
        let a = Versionstamp::from_bits(0x0f);
        let b = Versionstamp::from_bits(0x10);
        let c = Versionstamp::from_bits(0x100);
        assert!(a < b && b < c);
        assert!(a.to_string() < b.to_string());
        assert!(b.to_string() < c.to_string());
    }
}
