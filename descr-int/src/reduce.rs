/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use crate::{codec::Element, layout::ALIGN};

/// Portable minimum and maximum over `src`.
///
/// The reduction keeps [`ALIGN`] independent lanes, updating a lane only when the new value
/// compares strictly less (greater), then combines the lanes in order. Vectorized reducers
/// must follow the same lane discipline so all backends agree bit for bit.
///
/// # Panics
///
/// Panics if `src.len()` is not a multiple of [`ALIGN`].
#[inline(always)]
pub(crate) fn min_max<T: Element>(src: &[T]) -> (f32, f32) {
    assert_eq!(
        src.len() % ALIGN,
        0,
        "reducer input must be a multiple of {ALIGN} elements"
    );

    let mut min = [f32::MAX; ALIGN];
    let mut max = [-f32::MAX; ALIGN];
    for chunk in src.chunks_exact(ALIGN) {
        for (lane, &x) in chunk.iter().enumerate() {
            let x = x.to_f32();
            if x < min[lane] {
                min[lane] = x;
            }
            if x > max[lane] {
                max[lane] = x;
            }
        }
    }
    combine(min, max)
}

/// Fold per-lane minima and maxima into a single pair.
#[inline(always)]
pub(crate) fn combine(min: [f32; ALIGN], max: [f32; ALIGN]) -> (f32, f32) {
    let mut lo = min[0];
    let mut hi = max[0];
    for lane in 1..ALIGN {
        if min[lane] < lo {
            lo = min[lane];
        }
        if max[lane] > hi {
            hi = max[lane];
        }
    }
    (lo, hi)
}
