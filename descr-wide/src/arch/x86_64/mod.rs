/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use super::{level, Level};

/// Return `true` if the running CPU supports the feature set required by [`V3`].
///
/// This performs the check every time and does not consult the cached [`level`].
pub fn supports_v3() -> bool {
    is_x86_feature_detected!("avx2")
        && is_x86_feature_detected!("avx")
        && is_x86_feature_detected!("f16c")
        && is_x86_feature_detected!("fma")
        && is_x86_feature_detected!("sse4.1")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hidden;

/// A capability token for the `x86-64-v3` kernels.
///
/// Holding an instance proves that AVX2, AVX, FMA, F16C and SSE4.1 are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3(Hidden);

impl V3 {
    /// Construct a new `V3` token.
    ///
    /// # Safety
    ///
    /// To avoid undefined behavior, this function must only be called on a machine that
    /// supports the features listed in [`supports_v3`].
    pub const unsafe fn new() -> Self {
        Self(Hidden)
    }

    /// Return an instance of `Self` if the process-wide [`level`] allows it. Otherwise,
    /// return `None`.
    pub fn new_checked() -> Option<Self> {
        if level() >= Level::V3 {
            // SAFETY: The resolved level never exceeds the detected hardware level.
            Some(unsafe { Self::new() })
        } else {
            None
        }
    }

    /// Return an instance of `Self` if the hardware supports it, ignoring any cap placed on
    /// the process-wide level.
    ///
    /// This is provided to allow tests to exercise both kernel families regardless of the
    /// dispatch selection.
    pub fn new_checked_uncached() -> Option<Self> {
        if supports_v3() {
            // SAFETY: `supports_v3` performed the necessary runtime checks.
            Some(unsafe { Self::new() })
        } else {
            None
        }
    }
}
