/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

#![allow(dead_code)]

use descr_int::DescrInt;
use rand::{
    distr::{Distribution, Uniform},
    rngs::StdRng,
};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// Install a thread-local subscriber for the duration of a test.
pub fn init_test_subscriber() -> tracing::subscriber::DefaultGuard {
    let fmt_layer = fmt::layer().with_target(true).with_test_writer();

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .set_default()
}

/// Generate `count` vectors of `size` components drawn uniformly from `[lo, hi)`.
pub fn random_vectors(
    rng: &mut StdRng,
    count: usize,
    size: usize,
    lo: f32,
    hi: f32,
) -> Vec<Vec<f32>> {
    let dist = Uniform::new(lo, hi).unwrap();
    (0..count)
        .map(|_| (0..size).map(|_| dist.sample(rng)).collect())
        .collect()
}

/// Encode every vector in `vectors` with `context`.
pub fn encode_all(context: &DescrInt, vectors: &[Vec<f32>]) -> Vec<Vec<u8>> {
    vectors.iter().map(|v| context.encode32f_vec(v)).collect()
}

/// Borrow each descriptor.
pub fn as_refs(descrs: &[Vec<u8>]) -> Vec<&[u8]> {
    descrs.iter().map(|d| d.as_slice()).collect()
}

/// Concatenate descriptors into a single contiguous buffer.
pub fn packed(descrs: &[Vec<u8>]) -> Vec<u8> {
    descrs.concat()
}

/// Cosine distance between two float vectors computed in double precision.
pub fn float_cosine(a: &[f32], b: &[f32]) -> f64 {
    let mut ip = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        ip += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return if na == nb { 0.0 } else { 1.0 };
    }
    (1.0 - ip / (na.sqrt() * nb.sqrt())).clamp(0.0, 2.0)
}
