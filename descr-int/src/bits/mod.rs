/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Packing of 4-bit to 8-bit (inclusive) codes into groups.
//!
//! Codes are packed eight at a time. A group of eight `N`-bit codes occupies exactly `N`
//! bytes and is treated as a little-endian bit stream: code `i` of the group occupies bits
//! `[i * N, (i + 1) * N)`. Within a byte, the lower-indexed code lands in the lower bits.
//! For example, at depth 4 the byte holding codes `c0` and `c1` is `c0 | (c1 << 4)`.

mod packing;

pub use packing::{pack, pack_group, unpack, unpack_group, GROUP};

#[cfg(test)]
pub(crate) use packing::get;
