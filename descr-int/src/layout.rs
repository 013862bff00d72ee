/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use crate::{bits::GROUP, error::InitError, header::HEADER_BYTES};

/// Vector sizes must be a multiple of this many components.
///
/// This is both the width of a packing group and the register width of the reducers.
pub const ALIGN: usize = GROUP;

/// The largest supported vector size.
///
/// Integer code dot products are accumulated in 32-bit lanes. At depth 8 a single product
/// is at most `255 * 255`, so this bound keeps every accumulator below `i32::MAX`.
pub const MAX_SIZE: usize = 32768;

/// The number of bits used to encode each vector component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Depth(u8);

impl Depth {
    /// The smallest supported depth.
    pub const MIN: usize = 4;

    /// The largest supported depth.
    pub const MAX: usize = 8;

    /// Construct a new `Depth`, returning an error if `bits` is not in `4..=8`.
    pub fn new(bits: usize) -> Result<Self, InitError> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Ok(Self(bits as u8))
        } else {
            Err(InitError::UnsupportedDepth(bits))
        }
    }

    /// Return the number of bits per component.
    pub const fn bits(self) -> usize {
        self.0 as usize
    }

    /// The largest encodable code, `2^depth - 1`.
    pub const fn max_code(self) -> u8 {
        ((1u16 << self.0) - 1) as u8
    }

    /// The number of bytes a single component occupies after unpacking.
    ///
    /// Depth 8 codes are widened to 16 bits, all others to 8 bits.
    pub const fn unpacked_width(self) -> usize {
        if self.0 == 8 {
            2
        } else {
            1
        }
    }

    /// Iterate over all supported depths in ascending order.
    pub fn all() -> impl Iterator<Item = Depth> {
        (Self::MIN..=Self::MAX).map(|bits| Self(bits as u8))
    }
}

impl TryFrom<usize> for Depth {
    type Error = InitError;
    fn try_from(bits: usize) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.0)
    }
}

/// The sizes derived from a validated `(size, depth)` pair.
///
/// All members are fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    size: usize,
    depth: Depth,
    encoded_size: usize,
    unpacked_size: usize,
}

impl Layout {
    /// Validate `(size, depth)` and compute the derived sizes.
    pub fn new(size: usize, depth: usize) -> Result<Self, InitError> {
        let depth = Depth::new(depth)?;
        if size == 0 {
            return Err(InitError::ZeroSize);
        }
        if size % ALIGN != 0 {
            return Err(InitError::MisalignedSize {
                size,
                align: ALIGN,
            });
        }
        if size > MAX_SIZE {
            return Err(InitError::SizeTooLarge {
                size,
                max: MAX_SIZE,
            });
        }

        Ok(Self {
            size,
            depth,
            encoded_size: Self::encoded_size_of(size, depth),
            unpacked_size: size * depth.unpacked_width(),
        })
    }

    /// The number of bytes in an encoded descriptor: a 16-byte header followed by
    /// `size * depth / 8` bytes of packed codes.
    pub const fn encoded_size_of(size: usize, depth: Depth) -> usize {
        HEADER_BYTES + Self::payload_size_of(size, depth)
    }

    const fn payload_size_of(size: usize, depth: Depth) -> usize {
        size / GROUP * depth.bits()
    }

    /// The number of real components.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// The number of bytes in an encoded descriptor.
    pub fn encoded_size(&self) -> usize {
        self.encoded_size
    }

    /// The number of packed code bytes following the header.
    pub fn payload_size(&self) -> usize {
        self.encoded_size - HEADER_BYTES
    }

    /// The per-vector working-buffer size of the unpack strategy.
    pub fn unpacked_size(&self) -> usize {
        self.unpacked_size
    }
}
