// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Versionstamps and the monotone versionstamp clock.
//!
//! A versionstamp is an 80-bit logical timestamp rendered as 20 lowercase
//! hex digits, so its lexicographic order equals its numeric order. The
//! clock ticks at wall-clock microsecond resolution and falls back to
//! `last + 1` whenever the wall clock fails to advance, which keeps stamps
//! strictly monotone within a process even under sub-microsecond bursts.

mod clock;
mod stamp;

pub use clock::VersionstampClock;
pub use stamp::{InvalidVersionstamp, Versionstamp};
