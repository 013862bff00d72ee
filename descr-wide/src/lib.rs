/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! # Wide - Capability Levels for Descriptor Kernels
//!
//! This crate answers a single question for the rest of the workspace: which family of
//! SIMD kernels is it safe and profitable to run on the current machine?
//!
//! The answer is expressed as a [`arch::Level`]. Levels are totally ordered, with
//! [`arch::Level::Scalar`] always available as the lowest level.
//!
//! ## Resolution
//!
//! Run time detection happens only once (modulo race conditions) and, once resolved,
//! obtaining the level involves an atomic load and a branch. See [`arch::level`].
//!
//! The resolved level can be capped (never raised) with the environment variable
//! [`arch::ARCH_ENV`]. Recognized values are:
//!
//! * `x86-64-v3`: Allow up to the [`arch::Level::V3`] kernels.
//! * `scalar`: Force the portable kernels.
//!
//! ## Safety
//!
//! Architecture specific kernels are guarded by capability tokens such as
//! [`arch::x86_64::V3`]. A token can only be obtained:
//!
//! - From the safe constructor `new_checked`, which consults the resolved level.
//! - Through an `unsafe` constructor, in which case all bets are off.
//!
//! So the existence of a token serves as proof that the associated target features may be
//! used.
#![cfg_attr(
    not(test),
    warn(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::undocumented_unsafe_blocks
    )
)]

pub mod arch;
pub use arch::{level, Level, ParseLevelError};
