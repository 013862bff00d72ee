/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use serde::{Deserialize, Serialize};

use crate::error::TuningError;

/// Cache budgets, in bytes, used to size the macro blocks of the batched strategies.
///
/// Fields missing from a serialized form fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Per-core L1 data cache budget. Bounds the panel size of the unpack strategy.
    pub l1: usize,
    /// Per-core L2 budget. Bounds the number of rows per macro block.
    pub l2: usize,
    /// Shared L3 budget. Bounds the number of unpacked columns per macro block.
    pub l3: usize,
}

impl Tuning {
    pub const DEFAULT_L1: usize = 32 * 1024;
    pub const DEFAULT_L2: usize = 256 * 1024;
    pub const DEFAULT_L3: usize = 2 * 1024 * 1024;

    pub const fn new(l1: usize, l2: usize, l3: usize) -> Self {
        Self { l1, l2, l3 }
    }

    /// Ensure every budget is non-zero.
    pub fn validate(&self) -> Result<(), TuningError> {
        for (level, value) in [("L1", self.l1), ("L2", self.l2), ("L3", self.l3)] {
            if value == 0 {
                return Err(TuningError::ZeroBudget { level });
            }
        }
        Ok(())
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new(Self::DEFAULT_L1, Self::DEFAULT_L2, Self::DEFAULT_L3)
    }
}

/// Register tile shapes of a backend's micro kernels.
///
/// These are fixed by the kernels and not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroTiles {
    /// Rows per tile of the direct strategy.
    pub md: usize,
    /// Columns per tile of the direct strategy.
    pub nd: usize,
    /// Rows per tile of the unpack strategy.
    pub mu: usize,
    /// Columns per tile (and panel width) of the unpack strategy.
    pub nu: usize,
}
