/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

/// The number of codes in a packing group.
pub const GROUP: usize = 8;

const fn mask<const N: usize>() -> u8 {
    const { assert!(N >= 4 && N <= 8) };
    0xffu8 >> { 8 - N }
}

/// Unpack `N` bits from `byte` in the bit range `[bitstart, bitstart + N)` and
/// return in the lower bits of the result, zeroing the upper bits.
///
/// # Requires
///
/// Requires `8 - bitstart >= N`. That is - the range to be unpacked must fit
/// entirely within the byte.
#[inline(always)]
fn unpack_u8<const N: usize>(byte: u8, bitstart: usize) -> u8 {
    debug_assert!(bitstart <= { 8 - N });
    (byte >> bitstart) & mask::<N>()
}

/// Unpack `N` bits from `word` in the bit range `[bitstart, bitstart + N)`.
///
/// Only used when the range crosses a byte boundary.
///
/// # Requires
///
/// Requires `8 - N < bitstart < 8`.
#[inline(always)]
fn unpack_u16<const N: usize>(word: u16, bitstart: usize) -> u8 {
    debug_assert!(bitstart < 8);
    debug_assert!({ 8 - N } < bitstart);
    ((word >> bitstart) as u8) & mask::<N>()
}

/// Pack the lower `N` bits of `value` into `before` at `[bitstart, bitstart + N)`, leaving
/// the other bits undisturbed.
///
/// # Requires
///
/// Requires `8 - bitstart >= N`.
#[inline(always)]
fn pack_u8<const N: usize>(before: u8, value: u8, bitstart: usize) -> u8 {
    let mask = mask::<N>();
    debug_assert!(value <= mask);
    debug_assert!(bitstart <= { 8 - N });

    let shifted_mask = mask << bitstart;
    (before & !shifted_mask) | ((value << bitstart) & shifted_mask)
}

/// Pack the lower `N` bits of `value` into `before` at `[bitstart, bitstart + N)` where
/// the range crosses a byte boundary.
///
/// # Requires
///
/// Requires `8 - N < bitstart < 8`.
#[inline(always)]
fn pack_u16<const N: usize>(before: u16, value: u8, bitstart: usize) -> u16 {
    let mask = mask::<N>();
    debug_assert!(value <= mask);
    debug_assert!(bitstart < 8);
    debug_assert!({ 8 - N } < bitstart);

    let value: u16 = value.into();
    let shifted_mask = <u16 as From<u8>>::from(mask) << bitstart;
    (before & !shifted_mask) | ((value << bitstart) & shifted_mask)
}

/// Pack the first [`GROUP`] entries of `codes` into the first `N` bytes of `dst`.
///
/// Every code must fit in `N` bits.
#[inline(always)]
pub fn pack_group<const N: usize>(codes: &[u8], dst: &mut [u8]) {
    let codes = &codes[..GROUP];
    let dst = &mut dst[..N];
    dst.fill(0);

    for (i, &code) in codes.iter().enumerate() {
        let bit = i * N;
        let byte = bit / 8;
        let bitstart = bit % 8;
        if bitstart + N <= 8 {
            dst[byte] = pack_u8::<N>(dst[byte], code, bitstart);
        } else {
            let before = u16::from_le_bytes([dst[byte], dst[byte + 1]]);
            let [lo, hi] = pack_u16::<N>(before, code, bitstart).to_le_bytes();
            dst[byte] = lo;
            dst[byte + 1] = hi;
        }
    }
}

/// Unpack a group of [`GROUP`] codes from the first `N` bytes of `src`.
#[inline(always)]
pub fn unpack_group<const N: usize>(src: &[u8]) -> [u8; GROUP] {
    let src = &src[..N];
    if N == 8 {
        let mut codes = [0u8; GROUP];
        codes.copy_from_slice(src);
        return codes;
    }

    std::array::from_fn(|i| {
        let bit = i * N;
        let byte = bit / 8;
        let bitstart = bit % 8;
        if bitstart + N <= 8 {
            unpack_u8::<N>(src[byte], bitstart)
        } else {
            unpack_u16::<N>(u16::from_le_bytes([src[byte], src[byte + 1]]), bitstart)
        }
    })
}

/// Pack all of `codes` into `dst`.
///
/// # Panics
///
/// Panics if `codes.len()` is not a multiple of [`GROUP`] or if `dst` is not exactly
/// `codes.len() / GROUP * N` bytes.
pub fn pack<const N: usize>(codes: &[u8], dst: &mut [u8]) {
    assert_eq!(codes.len() % GROUP, 0, "code count must be a multiple of {GROUP}");
    assert_eq!(dst.len(), codes.len() / GROUP * N);
    codes
        .chunks_exact(GROUP)
        .zip(dst.chunks_exact_mut(N))
        .for_each(|(c, d)| pack_group::<N>(c, d));
}

/// Unpack all codes from `src` into `dst`.
///
/// # Panics
///
/// Panics if `src.len()` is not a multiple of `N` or `dst` is not exactly
/// `src.len() / N * GROUP` codes long.
pub fn unpack<const N: usize>(src: &[u8], dst: &mut [u8]) {
    assert_eq!(src.len() % N, 0);
    assert_eq!(dst.len(), src.len() / N * GROUP);
    src.chunks_exact(N)
        .zip(dst.chunks_exact_mut(GROUP))
        .for_each(|(s, d)| d.copy_from_slice(&unpack_group::<N>(s)));
}

/// Return code `i` from a packed stream by reading the bit stream directly.
#[cfg(test)]
pub(crate) fn get(packed: &[u8], nbits: usize, i: usize) -> u8 {
    let mut value = 0u8;
    for b in 0..nbits {
        let bit = i * nbits + b;
        value |= ((packed[bit / 8] >> (bit % 8)) & 1) << b;
    }
    value
}
