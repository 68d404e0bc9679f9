// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Monotone versionstamp clock.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use super::stamp::Versionstamp;

/// Produces strictly increasing versionstamps.
///
/// Each tick takes the wall clock in microseconds and falls back to
/// `last + 1` when the clock has not advanced, so bursts faster than the
/// clock resolution still receive distinct, ordered stamps. Large backward
/// clock jumps across process restarts are not defended against.
pub struct VersionstampClock {
    last: Mutex<u128>,
}

impl VersionstampClock {
    /// Creates a clock whose first stamp is at least the current time.
    pub fn new() -> Self {
        Self {
            last: Mutex::new(0),
        }
    }

    fn wall_clock_micros() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or(0)
    }

    /// Returns the next versionstamp, strictly greater than all previous.
    pub fn next(&self) -> Versionstamp {
        let now = Self::wall_clock_micros();
        let mut last = self.last.lock();
        *last = if *last < now { now } else { *last + 1 };
        Versionstamp::from_bits(*last)
    }
}

impl Default for VersionstampClock {
    fn default() -> Self {
        Self::new()
    }
}
