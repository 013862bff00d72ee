/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Portable quantization and dequantization of packed codes.

use half::f16;

use crate::{
    bits::{pack_group, unpack_group, GROUP},
    header::CodeStats,
};

/// Floating point element types accepted by the codec.
pub(crate) trait Element: Copy + Send + Sync + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl Element for f32 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }
    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl Element for f16 {
    #[inline(always)]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

/// Quantize `src` to `N`-bit codes and pack them into `dst`.
///
/// Each code is `round((x - shift) / scale)` clamped to `[0, 2^N - 1]`. A `scale` of zero
/// maps every component to code zero. Returns the sums needed by the descriptor header.
///
/// # Panics
///
/// Panics if `src.len()` is not a multiple of [`GROUP`] or if `dst` is not exactly
/// `src.len() / GROUP * N` bytes.
#[inline(always)]
pub(crate) fn encode<T: Element, const N: usize>(
    src: &[T],
    shift: f32,
    scale: f32,
    dst: &mut [u8],
) -> CodeStats {
    assert_eq!(src.len() % GROUP, 0);
    assert_eq!(dst.len(), src.len() / GROUP * N);

    let max_code = f64::from((1u16 << N) - 1);
    let inverse = if scale > 0.0 { 1.0 / f64::from(scale) } else { 0.0 };
    let shift = f64::from(shift);

    let mut stats = CodeStats::default();
    for (s, d) in src.chunks_exact(GROUP).zip(dst.chunks_exact_mut(N)) {
        let mut codes = [0u8; GROUP];
        for (code, &x) in codes.iter_mut().zip(s) {
            let offset = f64::from(x.to_f32()) - shift;
            *code = (offset * inverse).round().clamp(0.0, max_code) as u8;
            stats.add(*code);
        }
        pack_group::<N>(&codes, d);
    }
    stats
}

/// Reconstruct `scale * code + shift` for every packed code in `src`.
///
/// Reconstructed values saturate to the finite `f32` range.
///
/// # Panics
///
/// Panics if `dst.len()` is not a multiple of [`GROUP`] or if `src` is not exactly
/// `dst.len() / GROUP * N` bytes.
#[inline(always)]
pub(crate) fn decode<T: Element, const N: usize>(
    src: &[u8],
    scale: f32,
    shift: f32,
    dst: &mut [T],
) {
    assert_eq!(dst.len() % GROUP, 0);
    assert_eq!(src.len(), dst.len() / GROUP * N);

    let (scale, shift) = (f64::from(scale), f64::from(shift));
    for (s, d) in src.chunks_exact(N).zip(dst.chunks_exact_mut(GROUP)) {
        let codes = unpack_group::<N>(s);
        for (out, &code) in d.iter_mut().zip(&codes) {
            let value = f64::from(code) * scale + shift;
            *out = T::from_f32(value.clamp(-f64::from(f32::MAX), f64::from(f32::MAX)) as f32);
        }
    }
}
