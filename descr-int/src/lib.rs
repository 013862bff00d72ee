/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

#![cfg_attr(
    not(test),
    warn(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::undocumented_unsafe_blocks
    )
)]

//! Quantized descriptors and cosine distances between them.
//!
//! Vectors of `size` components are compressed to `depth` bits per component (4 to 8)
//! using a per-vector affine mapping from `[min, max]` onto `[0, 2^depth - 1]`. Each encoded
//! descriptor is self-contained: a 16-byte [`DescrHeader`] carrying the compensation terms
//! followed by the bit-packed codes. See [`bits`] for the packing layout.
//!
//! The [`DescrInt`] context encodes and decodes descriptors and computes cosine distances,
//! either for a single pair or for all pairs of two sets of descriptors. Batched distances
//! use one of two cache-blocked [`Strategy`]s:
//!
//! * [`Strategy::Direct`]: Codes are decoded on the fly from the packed descriptors.
//!   Used for small batches, depths 4 and 8, and vectors too wide for the unpack panels.
//!
//! * [`Strategy::Unpack`]: Codes are first widened into working buffers sized to the cache
//!   budgets of [`Tuning`], then consumed by register-tiled micro kernels.
//!
//! Every kernel computes the integer dot product of the codes exactly, so distances are
//! identical regardless of strategy or [`backend`].
//!
//! # Backends
//!
//! Kernels are provided by a [`Backend`](backend::Backend). The portable
//! [`Scalar`](backend::Scalar) backend is always available. On x86-64 machines supporting
//! AVX2, FMA and F16C the [`V3`](backend::V3) backend is used instead. The selection
//! follows [`descr_wide::level`] and can be capped with the `DESCR_MAX_ARCH` environment
//! variable.

pub mod backend;
pub mod bits;
mod codec;
mod context;
pub mod error;
mod header;
mod kernels;
mod layout;
mod reduce;
mod tuning;
mod unpack;

#[cfg(test)]
mod test_util;

pub use context::{DescrInt, Strategy};
pub use error::{InitError, TuningError};
pub use header::{CodeStats, DescrHeader, HEADER_BYTES};
pub use layout::{Depth, Layout, ALIGN, MAX_SIZE};
pub use tuning::{MicroTiles, Tuning};
