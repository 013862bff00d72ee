/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Kernels for the `x86-64-v3` feature set.
//!
//! Every routine here is an `unsafe` function compiled with the V3 target features and
//! exposed through a safe wrapper. The wrappers are only reachable through the primitive
//! tables of [`V3`], which cannot be constructed without a
//! [`descr_wide::arch::x86_64::V3`] capability token.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use half::f16;

use descr_wide::{arch::x86_64::V3 as V3Token, Level};

use super::{Backend, Primitives, Sealed};
use crate::{
    bits::{unpack_group, GROUP},
    codec::{self, Element},
    header::{cosine_distance, CodeStats, DescrHeader, HEADER_BYTES},
    layout::{Depth, ALIGN},
    reduce,
    tuning::MicroTiles,
    unpack::{self, code_width, load_code, UnpackedA, UnpackedB},
};

/// The `x86-64-v3` backend.
#[derive(Debug, Clone, Copy)]
pub struct V3 {
    _token: V3Token,
}

impl V3 {
    /// Construct the backend from a capability token.
    pub fn new(token: V3Token) -> Self {
        Self { _token: token }
    }
}

const MD: usize = 2;
const ND: usize = 4;
const NU: usize = 8;

/// Rows per unpack tile. Depth 8 codes are widened to 16 bits which leaves room for an
/// extra accumulator row.
const fn micro_mu(bits: usize) -> usize {
    if bits == 8 {
        6
    } else {
        5
    }
}

fn table<const N: usize>() -> Primitives {
    Primitives {
        min_max_32f,
        min_max_16f,
        encode_32f: encode::<f32, N>,
        encode_16f: encode::<f16, N>,
        decode_32f: decode::<f32, N>,
        decode_16f: decode::<f16, N>,
        code_dot: code_dot::<N>,
        macro_direct: macro_direct::<N>,
        unpack_norm_a,
        unpack_norm_b,
        unpack_data_a: unpack_data_a::<N>,
        unpack_data_b: unpack_data_b::<N>,
        macro_unpack: if N == 8 {
            macro_unpack::<N, { micro_mu(8) }>
        } else {
            macro_unpack::<N, { micro_mu(4) }>
        },
    }
}

impl Sealed for V3 {}

impl Backend for V3 {
    fn name(&self) -> &'static str {
        "x86-64-v3"
    }

    fn level(&self) -> Level {
        Level::V3
    }

    fn micro_tiles(&self, depth: Depth) -> MicroTiles {
        MicroTiles {
            md: MD,
            nd: ND,
            mu: micro_mu(depth.bits()),
            nu: NU,
        }
    }

    fn primitives(&self, depth: Depth) -> Primitives {
        dispatch_depth!(depth, table)
    }
}

//////////////////
// Safe entries //
//////////////////

// SAFETY (applies to every wrapper below): these functions are only bound into the
// primitive tables of `V3`, which holds a token proving the required features exist.

fn min_max_32f(src: &[f32]) -> (f32, f32) {
    // SAFETY: See above.
    unsafe { min_max_32f_v3(src) }
}

fn min_max_16f(src: &[f16]) -> (f32, f32) {
    // SAFETY: See above.
    unsafe { min_max_16f_v3(src) }
}

fn encode<T: Element, const N: usize>(
    src: &[T],
    shift: f32,
    scale: f32,
    dst: &mut [u8],
) -> CodeStats {
    // SAFETY: See above.
    unsafe { encode_v3::<T, N>(src, shift, scale, dst) }
}

fn decode<T: Element, const N: usize>(src: &[u8], scale: f32, shift: f32, dst: &mut [T]) {
    // SAFETY: See above.
    unsafe { decode_v3::<T, N>(src, scale, shift, dst) }
}

fn code_dot<const N: usize>(a: &[u8], b: &[u8]) -> u32 {
    // SAFETY: See above.
    unsafe { code_dot_v3::<N>(a, b) }
}

fn macro_direct<const N: usize>(
    a: &[&[u8]],
    b: &[&[u8]],
    size: usize,
    out: &mut [f32],
    stride: usize,
) {
    // SAFETY: See above.
    unsafe { macro_direct_v3::<N>(a, b, size, out, stride) }
}

fn unpack_norm_a(src: &[&[u8]], dst: &mut [f32]) {
    // SAFETY: See above.
    unsafe { unpack_norm_a_v3(src, dst) }
}

fn unpack_norm_b(src: &[&[u8]], dst: &mut [f32], stride: usize) {
    // SAFETY: See above.
    unsafe { unpack_norm_b_v3(src, dst, stride) }
}

fn unpack_data_a<const N: usize>(src: &[&[u8]], size: usize, dst: &mut [u8]) {
    // SAFETY: See above.
    unsafe { unpack_data_a_v3::<N>(src, size, dst) }
}

fn unpack_data_b<const N: usize>(src: &[&[u8]], size: usize, dst: &mut [u8]) {
    // SAFETY: See above.
    unsafe { unpack_data_b_v3::<N>(src, size, dst) }
}

fn macro_unpack<const N: usize, const MU: usize>(
    a: UnpackedA<'_>,
    b: UnpackedB<'_>,
    size: usize,
    out: &mut [f32],
    stride: usize,
) {
    // SAFETY: See above.
    unsafe { macro_unpack_v3::<N, MU>(a, b, size, out, stride) }
}

/////////////
// Reduce //
/////////////

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn min_max_32f_v3(src: &[f32]) -> (f32, f32) {
    assert_eq!(
        src.len() % ALIGN,
        0,
        "reducer input must be a multiple of {ALIGN} elements"
    );

    let mut min = _mm256_set1_ps(f32::MAX);
    let mut max = _mm256_set1_ps(-f32::MAX);
    for chunk in src.chunks_exact(ALIGN) {
        let x = _mm256_loadu_ps(chunk.as_ptr());
        min = _mm256_min_ps(x, min);
        max = _mm256_max_ps(x, max);
    }
    finish_min_max(min, max)
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn min_max_16f_v3(src: &[f16]) -> (f32, f32) {
    assert_eq!(
        src.len() % ALIGN,
        0,
        "reducer input must be a multiple of {ALIGN} elements"
    );

    let mut min = _mm256_set1_ps(f32::MAX);
    let mut max = _mm256_set1_ps(-f32::MAX);
    for chunk in src.chunks_exact(ALIGN) {
        let x = _mm256_cvtph_ps(_mm_loadu_si128(chunk.as_ptr().cast()));
        min = _mm256_min_ps(x, min);
        max = _mm256_max_ps(x, max);
    }
    finish_min_max(min, max)
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
#[inline]
unsafe fn finish_min_max(min: __m256, max: __m256) -> (f32, f32) {
    let mut lo = [0.0f32; ALIGN];
    let mut hi = [0.0f32; ALIGN];
    _mm256_storeu_ps(lo.as_mut_ptr(), min);
    _mm256_storeu_ps(hi.as_mut_ptr(), max);
    reduce::combine(lo, hi)
}

////////////
// Codec //
////////////

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn encode_v3<T: Element, const N: usize>(
    src: &[T],
    shift: f32,
    scale: f32,
    dst: &mut [u8],
) -> CodeStats {
    codec::encode::<T, N>(src, shift, scale, dst)
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn decode_v3<T: Element, const N: usize>(
    src: &[u8],
    scale: f32,
    shift: f32,
    dst: &mut [T],
) {
    codec::decode::<T, N>(src, scale, shift, dst)
}

/////////////
// Unpack //
/////////////

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn unpack_norm_a_v3(src: &[&[u8]], dst: &mut [f32]) {
    unpack::unpack_norm_a(src, dst)
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn unpack_norm_b_v3(src: &[&[u8]], dst: &mut [f32], stride: usize) {
    assert!(stride >= src.len());
    assert!(dst.len() >= 4 * stride);

    let blocks = src.chunks_exact(4);
    let tail = blocks.remainder();
    let out = dst.as_mut_ptr();
    for (b, block) in blocks.enumerate() {
        let s0 = _mm_loadu_ps(block[0][..HEADER_BYTES].as_ptr().cast());
        let s1 = _mm_loadu_ps(block[1][..HEADER_BYTES].as_ptr().cast());
        let s2 = _mm_loadu_ps(block[2][..HEADER_BYTES].as_ptr().cast());
        let s3 = _mm_loadu_ps(block[3][..HEADER_BYTES].as_ptr().cast());

        let s00 = _mm_unpacklo_ps(s0, s2);
        let s01 = _mm_unpacklo_ps(s1, s3);
        let s10 = _mm_unpackhi_ps(s0, s2);
        let s11 = _mm_unpackhi_ps(s1, s3);

        // `4 * b + 3 < src.len() <= stride` and `dst.len() >= 4 * stride`.
        let j = 4 * b;
        _mm_storeu_ps(out.add(j), _mm_unpacklo_ps(s00, s01));
        _mm_storeu_ps(out.add(stride + j), _mm_unpackhi_ps(s00, s01));
        _mm_storeu_ps(out.add(2 * stride + j), _mm_unpacklo_ps(s10, s11));
        _mm_storeu_ps(out.add(3 * stride + j), _mm_unpackhi_ps(s10, s11));
    }

    let start = src.len() - tail.len();
    for (j, descr) in tail.iter().enumerate() {
        let h = DescrHeader::read(descr).to_array();
        for (c, v) in h.into_iter().enumerate() {
            dst[c * stride + start + j] = v;
        }
    }
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn unpack_data_a_v3<const N: usize>(src: &[&[u8]], size: usize, dst: &mut [u8]) {
    unpack::unpack_data_a::<N>(src, size, dst)
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn unpack_data_b_v3<const N: usize>(src: &[&[u8]], size: usize, dst: &mut [u8]) {
    unpack::unpack_data_b::<N, NU>(src, size, dst)
}

//////////////
// Kernels //
//////////////

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn code_dot_v3<const N: usize>(a: &[u8], b: &[u8]) -> u32 {
    assert_eq!(a.len(), b.len());
    let mut acc = _mm_setzero_si128();
    for (a, b) in a.chunks_exact(N).zip(b.chunks_exact(N)) {
        acc = _mm_add_epi32(acc, _mm_madd_epi16(widen::<N>(a), widen::<N>(b)));
    }
    horizontal_sum(acc)
}

/// Unpack a group of codes and zero-extend them to eight 16-bit lanes.
#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
#[inline]
unsafe fn widen<const N: usize>(group: &[u8]) -> __m128i {
    let codes = unpack_group::<N>(group);
    _mm_cvtepu8_epi16(_mm_loadl_epi64(codes.as_ptr().cast()))
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
#[inline]
unsafe fn horizontal_sum(v: __m128i) -> u32 {
    let mut lanes = [0i32; 4];
    _mm_storeu_si128(lanes.as_mut_ptr().cast(), v);
    lanes.iter().map(|&v| v as u32).sum()
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn macro_direct_v3<const N: usize>(
    a: &[&[u8]],
    b: &[&[u8]],
    size: usize,
    out: &mut [f32],
    stride: usize,
) {
    let groups = size / GROUP;
    for (i, rows) in a.chunks(MD).enumerate().map(|(t, rows)| (t * MD, rows)) {
        for (j, cols) in b.chunks(ND).enumerate().map(|(t, cols)| (t * ND, cols)) {
            let mut acc = [[_mm_setzero_si128(); ND]; MD];
            for g in 0..groups {
                let offset = HEADER_BYTES + g * N;
                let mut bv = [_mm_setzero_si128(); ND];
                for (bv, descr) in bv.iter_mut().zip(cols) {
                    *bv = widen::<N>(&descr[offset..offset + N]);
                }
                for (acc, descr) in acc.iter_mut().zip(rows) {
                    let av = widen::<N>(&descr[offset..offset + N]);
                    for (acc, &bv) in acc.iter_mut().zip(&bv).take(cols.len()) {
                        *acc = _mm_add_epi32(*acc, _mm_madd_epi16(av, bv));
                    }
                }
            }

            for (r, descr) in rows.iter().enumerate() {
                let ha = DescrHeader::read(descr);
                for (c, other) in cols.iter().enumerate() {
                    let hb = DescrHeader::read(other);
                    let dot = horizontal_sum(acc[r][c]);
                    out[(i + r) * stride + j + c] = cosine_distance(dot, &ha, &hb, size);
                }
            }
        }
    }
}

#[target_feature(enable = "avx2,avx,fma,f16c,sse4.1")]
unsafe fn macro_unpack_v3<const N: usize, const MU: usize>(
    a: UnpackedA<'_>,
    b: UnpackedB<'_>,
    size: usize,
    out: &mut [f32],
    stride: usize,
) {
    let row = size * code_width::<N>();
    let panel = NU * row;
    assert!(a.data.len() >= a.count * row);
    assert!(b.data.len() >= b.count.div_ceil(NU) * panel);

    for i in (0..a.count).step_by(MU) {
        let rows = MU.min(a.count - i);
        for (p, j) in (0..b.count).step_by(NU).enumerate() {
            let cols = NU.min(b.count - j);
            // In bounds by the assertion on `b.data` above.
            let data = b.data.as_ptr().add(p * panel);

            let mut acc = [_mm256_setzero_si256(); MU];
            for k in 0..size {
                let bv = if N == 8 {
                    _mm256_cvtepu16_epi32(_mm_loadu_si128(data.add(2 * NU * k).cast()))
                } else {
                    _mm256_cvtepu8_epi32(_mm_loadl_epi64(data.add(NU * k).cast()))
                };
                for (r, acc) in acc.iter_mut().enumerate().take(rows) {
                    let av = load_code::<N>(a.data, (i + r) * size + k) as i32;
                    *acc = _mm256_add_epi32(*acc, _mm256_mullo_epi32(bv, _mm256_set1_epi32(av)));
                }
            }

            for (r, acc) in acc.iter().enumerate().take(rows) {
                let mut dots = [0i32; NU];
                _mm256_storeu_si256(dots.as_mut_ptr().cast(), *acc);
                let ha = a.header(i + r);
                for (c, &dot) in dots.iter().enumerate().take(cols) {
                    let hb = b.header(j + c);
                    out[(i + r) * stride + j + c] = cosine_distance(dot as u32, &ha, &hb, size);
                }
            }
        }
    }
}
