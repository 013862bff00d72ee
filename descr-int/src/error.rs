/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Error types reported by context construction and configuration.
//!
//! Only configuration problems are reported as errors. Violating the preconditions of a
//! constructed context (wrong slice lengths, misaligned reducer inputs) is a programming
//! error and panics.

use thiserror::Error;

/// Reasons a `(size, depth)` pair cannot be used to build a
/// [`DescrInt`](crate::DescrInt).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    #[error("unsupported depth {0}, expected a value in 4..=8")]
    UnsupportedDepth(usize),
    #[error("vector size must be non-zero")]
    ZeroSize,
    #[error("vector size {size} is not a multiple of {align}")]
    MisalignedSize { size: usize, align: usize },
    #[error("vector size {size} exceeds the maximum of {max}")]
    SizeTooLarge { size: usize, max: usize },
}

/// Reasons a [`Tuning`](crate::Tuning) cannot be applied.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TuningError {
    #[error("cache budget for {level} must be non-zero")]
    ZeroBudget { level: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            InitError::UnsupportedDepth(3).to_string(),
            "unsupported depth 3, expected a value in 4..=8"
        );
        assert_eq!(
            InitError::MisalignedSize { size: 12, align: 8 }.to_string(),
            "vector size 12 is not a multiple of 8"
        );
        assert_eq!(
            TuningError::ZeroBudget { level: "L2" }.to_string(),
            "cache budget for L2 must be non-zero"
        );
    }
}
