/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The per-descriptor header and the shared distance finalization.
//!
//! Every encoded descriptor starts with a [`DescrHeader`]. A reconstructed component is
//! `x'[i] = scale * code[i] + shift`, so the dot product of two reconstructions expands to
//! ```text
//! <a', b'> = sa * sb * D + na * mb + nb * ma + size * ma * mb
//! ```
//! where `D` is the integer dot product of the codes, `n = scale * sum(code)` and `m` is the
//! shift. Every backend computes `D` exactly and hands it to [`cosine_distance`], which
//! makes the final distances identical across kernels.

use bytemuck::{Pod, Zeroable};

/// The number of bytes occupied by a [`DescrHeader`].
pub const HEADER_BYTES: usize = std::mem::size_of::<DescrHeader>();

/// Compensation terms stored at the front of each descriptor as four little-endian `f32`
/// values in field order.
#[derive(Default, Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DescrHeader {
    /// The quantization step, `(max - min) / (2^depth - 1)`.
    pub scale: f32,
    /// The minimum component value.
    pub shift: f32,
    /// `scale * sum(code)`.
    pub n: f32,
    /// The squared norm of the reconstructed vector.
    pub norm_sq: f32,
}

const _: () = assert!(HEADER_BYTES == 16);

/// Sums of the codes of a single descriptor, accumulated during encoding.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeStats {
    pub sum: u32,
    pub sum_sq: u32,
}

impl CodeStats {
    #[inline(always)]
    pub fn add(&mut self, code: u8) {
        let code = u32::from(code);
        self.sum += code;
        self.sum_sq += code * code;
    }
}

impl DescrHeader {
    /// Compute the header of a descriptor from its quantization parameters and code sums.
    pub fn from_stats(scale: f32, shift: f32, stats: CodeStats, size: usize) -> Self {
        let (s, m) = (f64::from(scale), f64::from(shift));
        let sum = f64::from(stats.sum);
        let sum_sq = f64::from(stats.sum_sq);
        let norm_sq = s * s * sum_sq + 2.0 * s * m * sum + (size as f64) * m * m;
        Self {
            scale,
            shift,
            n: (s * sum) as f32,
            norm_sq: norm_sq as f32,
        }
    }

    /// Read the header from the first [`HEADER_BYTES`] of `descr`.
    ///
    /// No alignment is required of `descr`.
    #[inline(always)]
    pub fn read(descr: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&descr[..HEADER_BYTES])
    }

    /// Write `self` into the first [`HEADER_BYTES`] of `descr`.
    #[inline(always)]
    pub fn write(&self, descr: &mut [u8]) {
        descr[..HEADER_BYTES].copy_from_slice(bytemuck::bytes_of(self));
    }

    #[inline(always)]
    pub fn from_array([scale, shift, n, norm_sq]: [f32; 4]) -> Self {
        Self {
            scale,
            shift,
            n,
            norm_sq,
        }
    }

    #[inline(always)]
    pub fn to_array(self) -> [f32; 4] {
        [self.scale, self.shift, self.n, self.norm_sq]
    }

    /// The Euclidean norm of the reconstructed vector.
    pub fn norm(&self) -> f32 {
        self.norm_sq.sqrt()
    }
}

/// Finalize the cosine distance between two descriptors of `size` components given the
/// exact integer dot product `dot` of their codes.
///
/// The result is clamped to `[0, 2]`. If either norm is zero the distance is `0` when both
/// are zero and `1` otherwise.
#[inline]
pub fn cosine_distance(dot: u32, a: &DescrHeader, b: &DescrHeader, size: usize) -> f32 {
    let denom = f64::from(a.norm_sq) * f64::from(b.norm_sq);
    if denom <= 0.0 {
        return if a.norm_sq <= 0.0 && b.norm_sq <= 0.0 {
            0.0
        } else {
            1.0
        };
    }

    let (sa, ma, na) = (f64::from(a.scale), f64::from(a.shift), f64::from(a.n));
    let (sb, mb, nb) = (f64::from(b.scale), f64::from(b.shift), f64::from(b.n));
    let dot = sa * sb * f64::from(dot) + na * mb + nb * ma + (size as f64) * ma * mb;
    let distance = 1.0 - dot / denom.sqrt();
    // Headers of vectors near the `f32` limits can carry infinite sums.
    if distance.is_nan() {
        return 1.0;
    }
    distance.clamp(0.0, 2.0) as f32
}
