/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::fmt;

use half::f16;

use crate::{
    backend::{self, Backend, Primitives},
    error::{InitError, TuningError},
    header::{cosine_distance, DescrHeader, HEADER_BYTES},
    layout::{Depth, Layout},
    tuning::{MicroTiles, Tuning},
    unpack::{UnpackedA, UnpackedB},
};

/// The blocking strategy used for a batch of distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Decode codes on the fly from the packed descriptors.
    Direct,
    /// Widen codes into cache-resident working buffers first.
    Unpack,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Unpack => "unpack",
        };
        f.write_str(s)
    }
}

/// A context for encoding, decoding and comparing descriptors of a fixed size and depth.
///
/// A context is immutable after construction and may be shared freely between threads.
/// Every method that takes descriptors or output buffers panics if their lengths do not
/// match [`encoded_size`](Self::encoded_size) or the requested shape.
///
/// # Example
///
/// ```
/// use descr_int::DescrInt;
///
/// let context = DescrInt::new(16, 6).unwrap();
/// let a: Vec<f32> = (0..16).map(|i| i as f32).collect();
/// let b: Vec<f32> = (0..16).map(|i| (16 - i) as f32).collect();
///
/// let ea = context.encode32f_vec(&a);
/// let eb = context.encode32f_vec(&b);
/// assert_eq!(ea.len(), context.encoded_size());
///
/// let d = context.cosine_distance(&ea, &eb);
/// assert!((0.0..=2.0).contains(&d));
/// assert!(context.cosine_distance(&ea, &ea) < 1e-4);
/// ```
#[derive(Clone, Copy)]
pub struct DescrInt {
    layout: Layout,
    tiles: MicroTiles,
    tuning: Tuning,
    backend: &'static str,
    primitives: Primitives,
}

impl DescrInt {
    /// Return `true` if a context can be built for `(size, depth)`.
    pub fn valid(size: usize, depth: usize) -> bool {
        Layout::new(size, depth).is_ok()
    }

    /// Construct a context using the process-wide [`backend::active`] backend.
    pub fn new(size: usize, depth: usize) -> Result<Self, InitError> {
        Self::with_backend(size, depth, backend::active())
    }

    /// Construct a context bound to the kernels of `backend`.
    pub fn with_backend(
        size: usize,
        depth: usize,
        backend: &dyn Backend,
    ) -> Result<Self, InitError> {
        let layout = Layout::new(size, depth)?;
        let depth = layout.depth();
        let this = Self {
            layout,
            tiles: backend.micro_tiles(depth),
            tuning: backend.tuning(),
            backend: backend.name(),
            primitives: backend.primitives(depth),
        };
        tracing::debug!(
            size,
            depth = depth.bits(),
            encoded_size = this.encoded_size(),
            backend = this.backend,
            "constructed descriptor context"
        );
        Ok(this)
    }

    /// Replace the cache budgets used for macro blocking.
    pub fn with_tuning(self, tuning: Tuning) -> Result<Self, TuningError> {
        tuning.validate()?;
        Ok(Self { tuning, ..self })
    }

    /// The number of components per vector.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    pub fn depth(&self) -> Depth {
        self.layout.depth()
    }

    /// The number of bytes in an encoded descriptor.
    pub fn encoded_size(&self) -> usize {
        self.layout.encoded_size()
    }

    /// The per-vector working-buffer size used by the unpack strategy.
    pub fn unpacked_size(&self) -> usize {
        self.layout.unpacked_size()
    }

    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    pub fn micro_tiles(&self) -> MicroTiles {
        self.tiles
    }

    /// The name of the backend whose kernels this context is bound to.
    pub fn backend_name(&self) -> &'static str {
        self.backend
    }

    //-------//
    // Codec //
    //-------//

    /// Quantize `src` into the descriptor `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `src.len() != self.size()` or `dst.len() != self.encoded_size()`.
    pub fn encode32f(&self, src: &[f32], dst: &mut [u8]) {
        self.check_encode(src.len(), dst.len());
        let (min, max) = (self.primitives.min_max_32f)(src);
        let scale = self.scale(min, max);
        let (header, payload) = dst.split_at_mut(HEADER_BYTES);
        let stats = (self.primitives.encode_32f)(src, min, scale, payload);
        DescrHeader::from_stats(scale, min, stats, self.size()).write(header);
    }

    /// Quantize the half-precision vector `src` into the descriptor `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `src.len() != self.size()` or `dst.len() != self.encoded_size()`.
    pub fn encode16f(&self, src: &[f16], dst: &mut [u8]) {
        self.check_encode(src.len(), dst.len());
        let (min, max) = (self.primitives.min_max_16f)(src);
        let scale = self.scale(min, max);
        let (header, payload) = dst.split_at_mut(HEADER_BYTES);
        let stats = (self.primitives.encode_16f)(src, min, scale, payload);
        DescrHeader::from_stats(scale, min, stats, self.size()).write(header);
    }

    /// Reconstruct the vector stored in `src` into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `src.len() != self.encoded_size()` or `dst.len() != self.size()`.
    pub fn decode32f(&self, src: &[u8], dst: &mut [f32]) {
        self.check_encode(dst.len(), src.len());
        let header = DescrHeader::read(src);
        (self.primitives.decode_32f)(&src[HEADER_BYTES..], header.scale, header.shift, dst);
    }

    /// Reconstruct the vector stored in `src` into the half-precision `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `src.len() != self.encoded_size()` or `dst.len() != self.size()`.
    pub fn decode16f(&self, src: &[u8], dst: &mut [f16]) {
        self.check_encode(dst.len(), src.len());
        let header = DescrHeader::read(src);
        (self.primitives.decode_16f)(&src[HEADER_BYTES..], header.scale, header.shift, dst);
    }

    /// Encode `src` into a newly allocated descriptor.
    pub fn encode32f_vec(&self, src: &[f32]) -> Vec<u8> {
        let mut dst = vec![0u8; self.encoded_size()];
        self.encode32f(src, &mut dst);
        dst
    }

    /// Encode `src` into a newly allocated descriptor.
    pub fn encode16f_vec(&self, src: &[f16]) -> Vec<u8> {
        let mut dst = vec![0u8; self.encoded_size()];
        self.encode16f(src, &mut dst);
        dst
    }

    /// Decode `src` into a newly allocated vector.
    pub fn decode32f_vec(&self, src: &[u8]) -> Vec<f32> {
        let mut dst = vec![0.0f32; self.size()];
        self.decode32f(src, &mut dst);
        dst
    }

    fn scale(&self, min: f32, max: f32) -> f32 {
        if max > min {
            // The range of two finite `f32` values may exceed `f32::MAX`.
            ((f64::from(max) - f64::from(min)) / f64::from(self.depth().max_code())) as f32
        } else {
            0.0
        }
    }

    fn check_encode(&self, vector: usize, descr: usize) {
        assert_eq!(vector, self.size(), "vector length must equal the context size");
        assert_eq!(
            descr,
            self.encoded_size(),
            "descriptor length must equal the encoded size"
        );
    }

    //-----------//
    // Distances //
    //-----------//

    /// The Euclidean norm of the vector reconstructed from `descr`.
    pub fn vector_norm(&self, descr: &[u8]) -> f32 {
        self.check_descriptor(descr);
        DescrHeader::read(descr).norm()
    }

    /// The cosine distance between two descriptors, in `[0, 2]`.
    pub fn cosine_distance(&self, a: &[u8], b: &[u8]) -> f32 {
        self.check_descriptor(a);
        self.check_descriptor(b);
        let end = self.encoded_size();
        let dot = (self.primitives.code_dot)(&a[HEADER_BYTES..end], &b[HEADER_BYTES..end]);
        cosine_distance(dot, &DescrHeader::read(a), &DescrHeader::read(b), self.size())
    }

    /// Compute all distances between the descriptors of `a` and `b`.
    ///
    /// Writes `M * N` row-major results into `distances` such that
    /// `distances[i * N + j]` is the distance between `a[i]` and `b[j]`.
    ///
    /// # Panics
    ///
    /// Panics if any descriptor has the wrong length or `distances` holds fewer than
    /// `M * N` elements.
    pub fn cosine_distances_mxna(&self, a: &[&[u8]], b: &[&[u8]], distances: &mut [f32]) {
        self.cosine_distances_with(self.select_strategy(b.len()), a, b, distances);
    }

    /// Compute all distances between `m` contiguous descriptors in `a` and `n` contiguous
    /// descriptors in `b`.
    ///
    /// # Panics
    ///
    /// Panics if `a` or `b` are shorter than `m` or `n` descriptors, or `distances` holds
    /// fewer than `m * n` elements.
    pub fn cosine_distances_mxnp(
        &self,
        m: usize,
        n: usize,
        a: &[u8],
        b: &[u8],
        distances: &mut [f32],
    ) {
        let a = self.split(a, m);
        let b = self.split(b, n);
        self.cosine_distances_mxna(&a, &b, distances);
    }

    /// Choose the blocking strategy for a batch with `n` column descriptors.
    pub fn select_strategy(&self, n: usize) -> Strategy {
        let bits = self.depth().bits();
        let strategy = if self.unpacked_size() * self.tiles.nu > self.tuning.l1
            || n * 2 < self.tiles.nu
            || bits < 5
            || bits == 8
        {
            Strategy::Direct
        } else {
            Strategy::Unpack
        };
        tracing::trace!(n, %strategy, "selected blocking strategy");
        strategy
    }

    /// Compute all distances between `a` and `b` with an explicit blocking `strategy`.
    ///
    /// Both strategies produce identical results. See
    /// [`cosine_distances_mxna`](Self::cosine_distances_mxna) for the output layout.
    pub fn cosine_distances_with(
        &self,
        strategy: Strategy,
        a: &[&[u8]],
        b: &[&[u8]],
        distances: &mut [f32],
    ) {
        let (m, n) = (a.len(), b.len());
        if m == 0 || n == 0 {
            return;
        }
        assert!(
            distances.len() >= m * n,
            "output holds {} elements, expected at least {}",
            distances.len(),
            m * n
        );
        a.iter().chain(b).for_each(|d| self.check_descriptor(d));

        match strategy {
            Strategy::Direct => self.direct(a, b, distances),
            Strategy::Unpack => self.unpack(a, b, distances),
        }
    }

    fn direct(&self, a: &[&[u8]], b: &[&[u8]], distances: &mut [f32]) {
        let (m, n) = (a.len(), b.len());
        let MicroTiles { md, nd, .. } = self.tiles;
        let per_l2 = self.tuning.l2 / self.encoded_size();
        let macro_m = align_lo(per_l2, md).max(md);
        let macro_n = align_lo(per_l2, nd).max(nd);

        for i in (0..m).step_by(macro_m) {
            let dm = macro_m.min(m - i);
            for j in (0..n).step_by(macro_n) {
                let dn = macro_n.min(n - j);
                (self.primitives.macro_direct)(
                    &a[i..i + dm],
                    &b[j..j + dn],
                    self.size(),
                    &mut distances[i * n + j..],
                    n,
                );
            }
        }
    }

    fn unpack(&self, a: &[&[u8]], b: &[&[u8]], distances: &mut [f32]) {
        let (m, n) = (a.len(), b.len());
        let MicroTiles { mu, nu, .. } = self.tiles;
        let unpacked = self.unpacked_size();
        let macro_m = align_lo(self.tuning.l2 / unpacked, mu).max(mu);
        let macro_n = align_lo(self.tuning.l3 / unpacked, nu).max(nu);

        let rows = macro_m.min(m);
        let cols = align_hi(macro_n.min(n), nu);
        let mut data_a = vec![0u8; rows * unpacked];
        let mut norm_a = vec![0.0f32; rows * 4];
        let mut data_b = vec![0u8; cols * unpacked];
        let mut norm_b = vec![0.0f32; cols * 4];

        for i in (0..m).step_by(macro_m) {
            let dm = macro_m.min(m - i);
            let block_a = &a[i..i + dm];
            (self.primitives.unpack_norm_a)(block_a, &mut norm_a[..dm * 4]);
            (self.primitives.unpack_data_a)(block_a, self.size(), &mut data_a[..dm * unpacked]);

            for j in (0..n).step_by(macro_n) {
                let dn = macro_n.min(n - j);
                let padded = align_hi(dn, nu);
                let block_b = &b[j..j + dn];
                (self.primitives.unpack_norm_b)(block_b, &mut norm_b[..padded * 4], padded);
                (self.primitives.unpack_data_b)(
                    block_b,
                    self.size(),
                    &mut data_b[..padded * unpacked],
                );

                (self.primitives.macro_unpack)(
                    UnpackedA {
                        data: &data_a[..dm * unpacked],
                        norms: &norm_a[..dm * 4],
                        count: dm,
                    },
                    UnpackedB {
                        data: &data_b[..padded * unpacked],
                        norms: &norm_b[..padded * 4],
                        stride: padded,
                        count: dn,
                    },
                    self.size(),
                    &mut distances[i * n + j..],
                    n,
                );
            }
        }
    }

    fn check_descriptor(&self, descr: &[u8]) {
        assert_eq!(
            descr.len(),
            self.encoded_size(),
            "descriptor length must equal the encoded size"
        );
    }

    fn split<'a>(&self, data: &'a [u8], count: usize) -> Vec<&'a [u8]> {
        let size = self.encoded_size();
        assert!(
            data.len() >= count * size,
            "buffer holds {} bytes, expected at least {}",
            data.len(),
            count * size
        );
        data.chunks_exact(size).take(count).collect()
    }
}

impl fmt::Debug for DescrInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescrInt")
            .field("size", &self.size())
            .field("depth", &self.depth().bits())
            .field("encoded_size", &self.encoded_size())
            .field("backend", &self.backend)
            .field("tuning", &self.tuning)
            .finish()
    }
}

#[inline]
fn align_lo(value: usize, align: usize) -> usize {
    value / align * align
}

#[inline]
fn align_hi(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}
