/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Portable distance kernels.
//!
//! All kernels accumulate the exact integer dot product of codes and finalize through
//! [`cosine_distance`]. Output tiles are written to `out[r * stride + c]`.

use crate::{
    bits::{unpack_group, GROUP},
    header::{cosine_distance, DescrHeader, HEADER_BYTES},
    unpack::{code_width, load_code, UnpackedA, UnpackedB},
};

/// Integer dot product of two packed code payloads.
#[inline(always)]
pub(crate) fn code_dot<const N: usize>(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    a.chunks_exact(N)
        .zip(b.chunks_exact(N))
        .map(|(a, b)| {
            let a = unpack_group::<N>(a);
            let b = unpack_group::<N>(b);
            a.iter()
                .zip(&b)
                .map(|(&x, &y)| u32::from(x) * u32::from(y))
                .sum::<u32>()
        })
        .sum()
}

/// Compute the distances between every descriptor in `a` and every descriptor in `b`,
/// decoding codes straight from the packed descriptors in `MD x ND` tiles.
#[inline(always)]
pub(crate) fn macro_direct<const N: usize, const MD: usize, const ND: usize>(
    a: &[&[u8]],
    b: &[&[u8]],
    size: usize,
    out: &mut [f32],
    stride: usize,
) {
    let groups = size / GROUP;
    for (i, rows) in a.chunks(MD).enumerate().map(|(t, rows)| (t * MD, rows)) {
        for (j, cols) in b.chunks(ND).enumerate().map(|(t, cols)| (t * ND, cols)) {
            let mut acc = [[0u32; ND]; MD];
            for g in 0..groups {
                let offset = HEADER_BYTES + g * N;
                let bc: [[u8; GROUP]; ND] = std::array::from_fn(|c| match cols.get(c) {
                    Some(descr) => unpack_group::<N>(&descr[offset..]),
                    None => [0; GROUP],
                });
                for (r, descr) in rows.iter().enumerate() {
                    let ac = unpack_group::<N>(&descr[offset..]);
                    for (c, bc) in bc.iter().enumerate() {
                        acc[r][c] += ac
                            .iter()
                            .zip(bc)
                            .map(|(&x, &y)| u32::from(x) * u32::from(y))
                            .sum::<u32>();
                    }
                }
            }

            for (r, descr) in rows.iter().enumerate() {
                let ha = DescrHeader::read(descr);
                for (c, other) in cols.iter().enumerate() {
                    let hb = DescrHeader::read(other);
                    out[(i + r) * stride + j + c] = cosine_distance(acc[r][c], &ha, &hb, size);
                }
            }
        }
    }
}

/// Compute the distances between two unpacked blocks in `MU x NU` tiles.
#[inline(always)]
pub(crate) fn macro_unpack<const N: usize, const MU: usize, const NU: usize>(
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
            let data = &b.data[p * panel..(p + 1) * panel];

            let mut acc = [[0u32; NU]; MU];
            for k in 0..size {
                let bv: [u32; NU] = std::array::from_fn(|l| load_code::<N>(data, k * NU + l));
                for (r, acc) in acc.iter_mut().enumerate().take(rows) {
                    let av = load_code::<N>(a.data, (i + r) * size + k);
                    for (acc, &bv) in acc.iter_mut().zip(&bv) {
                        *acc += av * bv;
                    }
                }
            }

            for (r, acc) in acc.iter().enumerate().take(rows) {
                let ha = a.header(i + r);
                for (c, &dot) in acc.iter().enumerate().take(cols) {
                    let hb = b.header(j + c);
                    out[(i + r) * stride + j + c] = cosine_distance(dot, &ha, &hb, size);
                }
            }
        }
    }
}
