/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Kernel families and their process-wide selection.
//!
//! A [`Backend`] supplies the primitive routines for every supported depth together with the
//! register tile shapes its kernels were written for. The [`DescrInt`](crate::DescrInt)
//! context binds the primitives for its depth once at construction and never dispatches on
//! the depth again.
//!
//! [`active`] returns the most capable backend allowed by
//! [`descr_wide::level`]. The choice is made once per process.

use std::{fmt::Debug, sync::OnceLock};

use half::f16;

use descr_wide::Level;

use crate::{
    header::CodeStats,
    layout::Depth,
    tuning::{MicroTiles, Tuning},
    unpack::{UnpackedA, UnpackedB},
};

pub(crate) type MinMax32f = fn(&[f32]) -> (f32, f32);
pub(crate) type MinMax16f = fn(&[f16]) -> (f32, f32);
pub(crate) type Encode32f = fn(&[f32], f32, f32, &mut [u8]) -> CodeStats;
pub(crate) type Encode16f = fn(&[f16], f32, f32, &mut [u8]) -> CodeStats;
pub(crate) type Decode32f = fn(&[u8], f32, f32, &mut [f32]);
pub(crate) type Decode16f = fn(&[u8], f32, f32, &mut [f16]);
pub(crate) type CodeDot = fn(&[u8], &[u8]) -> u32;
pub(crate) type MacroDirect = fn(&[&[u8]], &[&[u8]], usize, &mut [f32], usize);
pub(crate) type UnpackNormA = fn(&[&[u8]], &mut [f32]);
pub(crate) type UnpackNormB = fn(&[&[u8]], &mut [f32], usize);
pub(crate) type UnpackData = fn(&[&[u8]], usize, &mut [u8]);
pub(crate) type MacroUnpack = fn(UnpackedA<'_>, UnpackedB<'_>, usize, &mut [f32], usize);

/// The routines a backend binds for a single depth.
#[derive(Clone, Copy)]
pub struct Primitives {
    pub(crate) min_max_32f: MinMax32f,
    pub(crate) min_max_16f: MinMax16f,
    pub(crate) encode_32f: Encode32f,
    pub(crate) encode_16f: Encode16f,
    pub(crate) decode_32f: Decode32f,
    pub(crate) decode_16f: Decode16f,
    pub(crate) code_dot: CodeDot,
    pub(crate) macro_direct: MacroDirect,
    pub(crate) unpack_norm_a: UnpackNormA,
    pub(crate) unpack_norm_b: UnpackNormB,
    pub(crate) unpack_data_a: UnpackData,
    pub(crate) unpack_data_b: UnpackData,
    pub(crate) macro_unpack: MacroUnpack,
}

impl Debug for Primitives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Primitives").finish_non_exhaustive()
    }
}

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;

/// A family of kernels targeting a capability [`Level`].
///
/// This trait is sealed. Backends are obtained from [`active`], [`scalar`] or
/// [`available`].
pub trait Backend: Sealed + Debug + Send + Sync {
    /// A short name for diagnostics.
    fn name(&self) -> &'static str;

    /// The capability level this backend requires.
    fn level(&self) -> Level;

    /// The cache budgets this backend's block sizing was tuned for.
    fn tuning(&self) -> Tuning {
        Tuning::default()
    }

    /// The register tile shapes of the kernels bound for `depth`.
    fn micro_tiles(&self, depth: Depth) -> MicroTiles;

    /// The primitive routines for `depth`.
    fn primitives(&self, depth: Depth) -> Primitives;
}

/// Build a primitive table by monomorphizing `$table` over every supported depth.
///
/// Backend modules are declared below so the macro is in textual scope for them.
macro_rules! dispatch_depth {
    ($depth:expr, $table:ident) => {
        match $depth.bits() {
            4 => $table::<4>(),
            5 => $table::<5>(),
            6 => $table::<6>(),
            7 => $table::<7>(),
            _ => $table::<8>(),
        }
    };
}

mod scalar;
pub use scalar::Scalar;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use x86_64::V3;
    }
}

static SCALAR: Scalar = Scalar;

/// The portable backend. Always available.
pub fn scalar() -> &'static dyn Backend {
    &SCALAR
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        fn v3(token: Option<descr_wide::arch::x86_64::V3>) -> Option<&'static dyn Backend> {
            static V3_BACKEND: OnceLock<V3> = OnceLock::new();
            token.map(|token| V3_BACKEND.get_or_init(|| V3::new(token)) as &'static dyn Backend)
        }

        fn select(level: Level) -> &'static dyn Backend {
            match level {
                Level::V3 => v3(descr_wide::arch::x86_64::V3::new_checked()).unwrap_or_else(scalar),
                Level::Scalar => scalar(),
            }
        }

        /// Every backend the running hardware supports, regardless of any level cap.
        pub fn available() -> Vec<&'static dyn Backend> {
            let mut backends = vec![scalar()];
            backends.extend(v3(descr_wide::arch::x86_64::V3::new_checked_uncached()));
            backends
        }
    } else {
        fn select(_level: Level) -> &'static dyn Backend {
            scalar()
        }

        /// Every backend the running hardware supports, regardless of any level cap.
        pub fn available() -> Vec<&'static dyn Backend> {
            vec![scalar()]
        }
    }
}

/// The backend selected for this process.
pub fn active() -> &'static dyn Backend {
    static ACTIVE: OnceLock<&'static dyn Backend> = OnceLock::new();
    *ACTIVE.get_or_init(|| {
        let backend = select(descr_wide::level());
        tracing::debug!(
            backend = backend.name(),
            level = %backend.level(),
            "selected descriptor backend"
        );
        backend
    })
}
