/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Working-buffer layouts of the unpack strategy.
//!
//! * Row side (A): headers are copied verbatim, four floats per descriptor. Codes are
//!   widened to one byte each (two little-endian bytes at depth 8) and stored row-major.
//!
//! * Column side (B): headers are transposed into four planes of `stride` floats so that
//!   `norms[c * stride + j]` is field `c` of descriptor `j`. Codes are stored in panels of
//!   `NU` descriptors where code `k` of descriptor `j` lives at element
//!   `(j / NU) * NU * size + k * NU + j % NU`. Lanes of a trailing partial panel are zero.

use crate::{
    bits::{unpack_group, GROUP},
    header::{DescrHeader, HEADER_BYTES},
};

/// An unpacked block of row descriptors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnpackedA<'a> {
    pub data: &'a [u8],
    pub norms: &'a [f32],
    pub count: usize,
}

impl UnpackedA<'_> {
    #[inline(always)]
    pub fn header(&self, i: usize) -> DescrHeader {
        let h = &self.norms[4 * i..4 * i + 4];
        DescrHeader::from_array([h[0], h[1], h[2], h[3]])
    }
}

/// An unpacked block of column descriptors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UnpackedB<'a> {
    pub data: &'a [u8],
    pub norms: &'a [f32],
    pub stride: usize,
    pub count: usize,
}

impl UnpackedB<'_> {
    #[inline(always)]
    pub fn header(&self, j: usize) -> DescrHeader {
        let s = self.stride;
        DescrHeader::from_array([
            self.norms[j],
            self.norms[s + j],
            self.norms[2 * s + j],
            self.norms[3 * s + j],
        ])
    }
}

/// The number of bytes per unpacked code at depth `N`.
#[inline(always)]
pub(crate) const fn code_width<const N: usize>() -> usize {
    if N == 8 {
        2
    } else {
        1
    }
}

/// Load unpacked code `index` from `data`.
#[inline(always)]
pub(crate) fn load_code<const N: usize>(data: &[u8], index: usize) -> u32 {
    if N == 8 {
        u32::from(u16::from_le_bytes([data[2 * index], data[2 * index + 1]]))
    } else {
        u32::from(data[index])
    }
}

#[inline(always)]
fn store_code<const N: usize>(data: &mut [u8], index: usize, code: u8) {
    if N == 8 {
        data[2 * index..2 * index + 2].copy_from_slice(&u16::from(code).to_le_bytes());
    } else {
        data[index] = code;
    }
}

#[inline(always)]
fn payload<const N: usize>(descr: &[u8], size: usize) -> &[u8] {
    &descr[HEADER_BYTES..HEADER_BYTES + size / GROUP * N]
}

/// Copy the headers of `src` into `dst`, four floats per descriptor.
#[inline(always)]
pub(crate) fn unpack_norm_a(src: &[&[u8]], dst: &mut [f32]) {
    assert!(dst.len() >= 4 * src.len());
    for (descr, out) in src.iter().zip(dst.chunks_exact_mut(4)) {
        out.copy_from_slice(&DescrHeader::read(descr).to_array());
    }
}

/// Transpose the headers of `src` into four planes of `stride` floats.
#[inline(always)]
pub(crate) fn unpack_norm_b(src: &[&[u8]], dst: &mut [f32], stride: usize) {
    assert!(stride >= src.len());
    assert!(dst.len() >= 4 * stride);

    let blocks = src.chunks_exact(4);
    let tail = blocks.remainder();
    for (b, block) in blocks.enumerate() {
        let h: [[f32; 4]; 4] = std::array::from_fn(|k| DescrHeader::read(block[k]).to_array());
        for c in 0..4 {
            let out = &mut dst[c * stride + 4 * b..c * stride + 4 * b + 4];
            out.copy_from_slice(&[h[0][c], h[1][c], h[2][c], h[3][c]]);
        }
    }

    let start = src.len() - tail.len();
    for (j, descr) in tail.iter().enumerate() {
        let h = DescrHeader::read(descr).to_array();
        for (c, v) in h.into_iter().enumerate() {
            dst[c * stride + start + j] = v;
        }
    }
}

/// Widen the codes of every descriptor in `src` into consecutive rows of `dst`.
#[inline(always)]
pub(crate) fn unpack_data_a<const N: usize>(src: &[&[u8]], size: usize, dst: &mut [u8]) {
    let row = size * code_width::<N>();
    assert!(dst.len() >= row * src.len());

    for (descr, out) in src.iter().zip(dst.chunks_exact_mut(row)) {
        for (g, group) in payload::<N>(descr, size).chunks_exact(N).enumerate() {
            let codes = unpack_group::<N>(group);
            if N == 8 {
                for (i, &code) in codes.iter().enumerate() {
                    store_code::<N>(out, g * GROUP + i, code);
                }
            } else {
                out[g * GROUP..(g + 1) * GROUP].copy_from_slice(&codes);
            }
        }
    }
}

/// Widen the codes of every descriptor in `src` into interleaved panels of `NU` lanes.
#[inline(always)]
pub(crate) fn unpack_data_b<const N: usize, const NU: usize>(
    src: &[&[u8]],
    size: usize,
    dst: &mut [u8],
) {
    let panel = NU * size * code_width::<N>();
    assert!(dst.len() >= panel * src.len().div_ceil(NU));

    for (descrs, out) in src.chunks(NU).zip(dst.chunks_exact_mut(panel)) {
        if descrs.len() < NU {
            out.fill(0);
        }
        for (lane, descr) in descrs.iter().enumerate() {
            for (g, group) in payload::<N>(descr, size).chunks_exact(N).enumerate() {
                let codes = unpack_group::<N>(group);
                for (i, &code) in codes.iter().enumerate() {
                    store_code::<N>(out, (g * GROUP + i) * NU + lane, code);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{
        distr::{Distribution, Uniform},
        rngs::StdRng,
        SeedableRng,
    };

    use super::*;
    use crate::bits;

    fn random_descriptors(
        rng: &mut StdRng,
        count: usize,
        size: usize,
        nbits: usize,
    ) -> Vec<Vec<u8>> {
        let bytes = Uniform::new_inclusive(0u8, 255).unwrap();
        (0..count)
            .map(|_| {
                (0..HEADER_BYTES + size / 8 * nbits)
                    .map(|_| bytes.sample(rng))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn norms() {
        let mut rng = StdRng::seed_from_u64(7);
        for count in 0..12 {
            let descrs = random_descriptors(&mut rng, count, 8, 4);
            let refs: Vec<&[u8]> = descrs.iter().map(|d| d.as_slice()).collect();

            let mut a = vec![0.0f32; 4 * count];
            unpack_norm_a(&refs, &mut a);

            let stride = count.next_multiple_of(8);
            let mut b = vec![0.0f32; 4 * stride];
            unpack_norm_b(&refs, &mut b, stride);

            let na = UnpackedA {
                data: &[],
                norms: &a,
                count,
            };
            let nb = UnpackedB {
                data: &[],
                norms: &b,
                stride,
                count,
            };
            for (j, descr) in refs.iter().enumerate() {
                let expected = DescrHeader::read(descr);
                // Compare bit patterns since random bytes may form NaNs.
                assert_eq!(
                    bytemuck::bytes_of(&na.header(j)),
                    bytemuck::bytes_of(&expected)
                );
                assert_eq!(
                    bytemuck::bytes_of(&nb.header(j)),
                    bytemuck::bytes_of(&expected)
                );
            }
        }
    }

    fn test_data_impl<const N: usize>() {
        const NU: usize = 8;
        let mut rng = StdRng::seed_from_u64(N as u64);
        let size = 24;
        for count in [1, 7, 8, 9, 17] {
            let descrs = random_descriptors(&mut rng, count, size, N);
            let refs: Vec<&[u8]> = descrs.iter().map(|d| d.as_slice()).collect();
            let w = code_width::<N>();

            let mut a = vec![0u8; count * size * w];
            unpack_data_a::<N>(&refs, size, &mut a);

            let panels = count.div_ceil(NU);
            let mut b = vec![0xffu8; panels * NU * size * w];
            unpack_data_b::<N, NU>(&refs, size, &mut b);

            for (j, descr) in refs.iter().enumerate() {
                for k in 0..size {
                    let expected = u32::from(bits::get(&descr[HEADER_BYTES..], N, k));
                    assert_eq!(load_code::<N>(&a, j * size + k), expected);
                    let index = (j / NU) * NU * size + k * NU + j % NU;
                    assert_eq!(load_code::<N>(&b, index), expected);
                }
            }

            // Padding lanes of the last panel are zero.
            for j in count..panels * NU {
                for k in 0..size {
                    let index = (j / NU) * NU * size + k * NU + j % NU;
                    assert_eq!(load_code::<N>(&b, index), 0);
                }
            }
        }
    }

    #[test]
    fn data_4bit() {
        test_data_impl::<4>();
    }

    #[test]
    fn data_5bit() {
        test_data_impl::<5>();
    }

    #[test]
    fn data_6bit() {
        test_data_impl::<6>();
    }

    #[test]
    fn data_7bit() {
        test_data_impl::<7>();
    }

    #[test]
    fn data_8bit() {
        test_data_impl::<8>();
    }
}
