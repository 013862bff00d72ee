/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Capability levels and their process-wide resolution.
//!
//! ## Hierarchies
//!
//! ### X86
//!
//! * [`Level::V3`]: Supporting AVX2, FMA and F16C (the `x86-64-v3` feature set).
//! * [`Level::Scalar`]: Fallback level.
//!
//! The ordering is `Scalar` < `V3`.
//!
//! ### Other targets
//!
//! Support is limited to [`Level::Scalar`].

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use thiserror::Error;

/// The environment variable consulted to cap the resolved [`Level`].
pub const ARCH_ENV: &str = "DESCR_MAX_ARCH";

/// An opaque representation of a kernel family's capability level.
///
/// Levels that compare greater represent more capable instruction sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Portable kernels relying on the compiler for optimization.
    Scalar,
    /// Kernels using AVX2, FMA and F16C.
    V3,
}

impl Level {
    /// The canonical name of the level, as accepted by [`ARCH_ENV`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::V3 => "x86-64-v3",
        }
    }

    const fn number(self) -> u64 {
        match self {
            Self::Scalar => LEVEL_SCALAR,
            Self::V3 => LEVEL_V3,
        }
    }

    const fn from_number(number: u64) -> Self {
        if number >= LEVEL_V3 {
            Self::V3
        } else {
            Self::Scalar
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized architecture level \"{0}\", expected \"scalar\" or \"x86-64-v3\"")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scalar" => Ok(Self::Scalar),
            "x86-64-v3" => Ok(Self::V3),
            other => Err(ParseLevelError(other.to_owned())),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;

        fn detect() -> Level {
            if x86_64::supports_v3() {
                Level::V3
            } else {
                Level::Scalar
            }
        }
    } else {
        fn detect() -> Level {
            Level::Scalar
        }
    }
}

// We cache a single number and use it to indicate the level with the following meaning:
//
// 0: Uninitialized
// 1: Scalar
// 2: V3
//
// NOTE: Levels must be properly nested in ascending order so compatibility checks can be
// done with a `>=` comparison.
static LEVEL_NUMBER: AtomicU64 = AtomicU64::new(LEVEL_UNINITIALIZED);

const LEVEL_UNINITIALIZED: u64 = 0;
const LEVEL_SCALAR: u64 = 1;
const LEVEL_V3: u64 = 2;

/// Return the highest level supported by the hardware, ignoring [`ARCH_ENV`] and the cache.
pub fn detected() -> Level {
    detect()
}

/// Return the process-wide [`Level`].
///
/// The first call detects the hardware capability and applies the cap requested through
/// [`ARCH_ENV`]. Subsequent calls return the cached result.
#[inline]
pub fn level() -> Level {
    let mut number = LEVEL_NUMBER.load(Ordering::Relaxed);
    if number == LEVEL_UNINITIALIZED {
        number = resolve_level();
    }
    Level::from_number(number)
}

#[inline(never)]
fn resolve_level() -> u64 {
    let detected = detect();
    let cap = requested_cap();
    let selected = apply_cap(detected, cap);
    tracing::debug!(
        %detected,
        cap = ?cap,
        %selected,
        "resolved kernel capability level"
    );

    let number = selected.number();
    LEVEL_NUMBER.store(number, Ordering::Relaxed);
    number
}

fn requested_cap() -> Option<Level> {
    let value = match std::env::var(ARCH_ENV) {
        Ok(v) => v,
        Err(std::env::VarError::NotPresent) => return None,
        Err(std::env::VarError::NotUnicode(s)) => {
            tracing::warn!(variable = ARCH_ENV, value = ?s, "ignoring non-unicode level cap");
            return None;
        }
    };

    match value.parse::<Level>() {
        Ok(level) => Some(level),
        Err(err) => {
            tracing::warn!(variable = ARCH_ENV, %err, "ignoring level cap");
            None
        }
    }
}

/// Lower `detected` to `cap` if a cap is given. A cap never raises the level.
pub fn apply_cap(detected: Level, cap: Option<Level>) -> Level {
    match cap {
        Some(cap) => detected.min(cap),
        None => detected,
    }
}

///////////
// Tests //
///////////
