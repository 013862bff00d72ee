/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

mod common;

use descr_int::{backend, DescrInt, Strategy, Tuning};
use rand::{rngs::StdRng, SeedableRng};
use rstest::rstest;

use common::{as_refs, encode_all, float_cosine, init_test_subscriber, packed, random_vectors};

#[rstest]
fn self_distance_is_zero(#[values(4, 5, 6, 7, 8)] depth: usize) {
    let mut rng = StdRng::seed_from_u64(depth as u64);
    for backend in backend::available() {
        let context = DescrInt::with_backend(128, depth, backend).unwrap();
        for v in random_vectors(&mut rng, 16, 128, -1.0, 1.0) {
            let descr = context.encode32f_vec(&v);
            let d = context.cosine_distance(&descr, &descr);
            assert!(d < 1e-4, "{}: self distance {d} at depth {depth}", backend.name());
        }
    }
}

#[rstest]
fn matches_reconstructed_cosine(#[values(4, 5, 6, 7, 8)] depth: usize) {
    let size = 64;
    let mut rng = StdRng::seed_from_u64(0x51 + depth as u64);
    let context = DescrInt::new(size, depth).unwrap();
    let vectors = random_vectors(&mut rng, 12, size, -2.0, 3.0);
    let descrs = encode_all(&context, &vectors);

    for (a, va) in descrs.iter().zip(&vectors) {
        for (b, vb) in descrs.iter().zip(&vectors) {
            let d = context.cosine_distance(a, b);
            assert!((0.0..=2.0).contains(&d));

            // Exact against the reconstruction.
            let ra = context.decode32f_vec(a);
            let rb = context.decode32f_vec(b);
            let expected = float_cosine(&ra, &rb);
            assert!((f64::from(d) - expected).abs() < 1e-4, "{d} vs {expected}");

            // Approximate against the original vectors.
            let original = float_cosine(va, vb);
            let tolerance = 8.0 / f64::from((1u32 << depth) - 1);
            assert!((f64::from(d) - original).abs() < tolerance, "{d} vs {original}");
        }
    }
}

#[test]
fn two_by_three() {
    let _guard = init_test_subscriber();
    let size = 16;
    let mut rng = StdRng::seed_from_u64(23);
    let context = DescrInt::new(size, 6).unwrap();
    let va = random_vectors(&mut rng, 2, size, -1.0, 1.0);
    let vb = random_vectors(&mut rng, 3, size, -1.0, 1.0);
    let a = encode_all(&context, &va);
    let b = encode_all(&context, &vb);

    let mut distances = [f32::NAN; 6];
    context.cosine_distances_mxna(&as_refs(&a), &as_refs(&b), &mut distances);
    for i in 0..2 {
        for j in 0..3 {
            assert_eq!(distances[i * 3 + j], context.cosine_distance(&a[i], &b[j]));
        }
    }

    for strategy in [Strategy::Direct, Strategy::Unpack] {
        let mut distances = [f32::NAN; 6];
        context.cosine_distances_with(strategy, &as_refs(&a), &as_refs(&b), &mut distances);
        for i in 0..2 {
            for j in 0..3 {
                let d = f64::from(distances[i * 3 + j]);
                let ra = context.decode32f_vec(&a[i]);
                let rb = context.decode32f_vec(&b[j]);
                let expected = float_cosine(&ra, &rb);
                assert!((d - expected).abs() < 1e-3, "{strategy:?} ({i}, {j}): {d} vs {expected}");
            }
        }

        let expected = float_cosine(&va[1], &vb[2]);
        let d = f64::from(distances[5]);
        assert!((d - expected).abs() < 1e-3, "{strategy:?}: {d} vs {expected}");
    }
}

#[test]
fn empty_batches_leave_output_untouched() {
    let context = DescrInt::new(32, 5).unwrap();
    let one = vec![context.encode32f_vec(&[1.0; 32])];

    let mut distances = [-1.0f32; 4];
    context.cosine_distances_mxna(&[], &as_refs(&one), &mut distances);
    context.cosine_distances_mxna(&as_refs(&one), &[], &mut distances);
    context.cosine_distances_mxnp(0, 1, &[], &packed(&one), &mut distances);
    context.cosine_distances_mxnp(1, 0, &packed(&one), &[], &mut distances);
    for strategy in [Strategy::Direct, Strategy::Unpack] {
        context.cosine_distances_with(strategy, &[], &[], &mut []);
    }
    assert_eq!(distances, [-1.0; 4]);
}

#[rstest]
#[case(1, 1)]
#[case(3, 5)]
#[case(8, 8)]
#[case(13, 29)]
#[case(40, 70)]
fn batched_forms_agree(
    #[values(4, 5, 6, 7, 8)] depth: usize,
    #[values(8, 48, 264)] size: usize,
    #[case] m: usize,
    #[case] n: usize,
) {
    let mut rng = StdRng::seed_from_u64((depth * 1000 + size * 10 + m + n) as u64);
    let va = random_vectors(&mut rng, m, size, -1.0, 2.0);
    let vb = random_vectors(&mut rng, n, size, -2.0, 1.0);

    for backend in backend::available() {
        let context = DescrInt::with_backend(size, depth, backend).unwrap();
        let a = encode_all(&context, &va);
        let b = encode_all(&context, &vb);

        let mut pairwise = vec![0.0f32; m * n];
        for (i, a) in a.iter().enumerate() {
            for (j, b) in b.iter().enumerate() {
                pairwise[i * n + j] = context.cosine_distance(a, b);
            }
        }

        let mut array = vec![f32::NAN; m * n];
        context.cosine_distances_mxna(&as_refs(&a), &as_refs(&b), &mut array);
        assert_eq!(array, pairwise, "{} mxna", backend.name());

        let mut contiguous = vec![f32::NAN; m * n];
        context.cosine_distances_mxnp(m, n, &packed(&a), &packed(&b), &mut contiguous);
        assert_eq!(contiguous, pairwise, "{} mxnp", backend.name());

        for strategy in [Strategy::Direct, Strategy::Unpack] {
            let mut forced = vec![f32::NAN; m * n];
            context.cosine_distances_with(strategy, &as_refs(&a), &as_refs(&b), &mut forced);
            assert_eq!(forced, pairwise, "{} {strategy}", backend.name());
        }
    }
}

#[test]
fn blocking_covers_every_output() {
    // Small budgets force many macro blocks with ragged edges.
    let size = 40;
    let (m, n) = (37, 53);
    let mut rng = StdRng::seed_from_u64(0xb10c);
    let va = random_vectors(&mut rng, m, size, -1.0, 1.0);
    let vb = random_vectors(&mut rng, n, size, -1.0, 1.0);

    for backend in backend::available() {
        let reference = DescrInt::with_backend(size, 6, backend).unwrap();
        let a = encode_all(&reference, &va);
        let b = encode_all(&reference, &vb);

        let mut expected = vec![0.0f32; m * n];
        reference.cosine_distances_with(
            Strategy::Direct,
            &as_refs(&a),
            &as_refs(&b),
            &mut expected,
        );

        for tuning in [
            Tuning::new(512, 200, 300),
            Tuning::new(512, 1000, 2000),
            Tuning::new(1, 1, 1),
        ] {
            let context = reference.with_tuning(tuning).unwrap();
            for strategy in [Strategy::Direct, Strategy::Unpack] {
                // Trailing sentinel entries must survive.
                let mut distances = vec![f32::NAN; m * n + 3];
                distances[m * n..].fill(-7.0);
                context.cosine_distances_with(strategy, &as_refs(&a), &as_refs(&b), &mut distances);
                assert_eq!(&distances[..m * n], &expected[..], "{tuning:?} {strategy}");
                assert_eq!(&distances[m * n..], &[-7.0; 3]);
            }
        }
    }
}

#[test]
fn distances_are_identical_across_backends() {
    let size = 152;
    let mut rng = StdRng::seed_from_u64(0x0b5e);
    let va = random_vectors(&mut rng, 11, size, -5.0, 5.0);
    let vb = random_vectors(&mut rng, 19, size, -5.0, 5.0);

    for depth in 4..=8 {
        let reference = DescrInt::with_backend(size, depth, backend::scalar()).unwrap();
        let a = encode_all(&reference, &va);
        let b = encode_all(&reference, &vb);
        let mut expected = vec![0.0f32; 11 * 19];
        reference.cosine_distances_mxna(&as_refs(&a), &as_refs(&b), &mut expected);

        for backend in backend::available() {
            let context = DescrInt::with_backend(size, depth, backend).unwrap();
            for strategy in [Strategy::Direct, Strategy::Unpack] {
                let mut got = vec![0.0f32; 11 * 19];
                context.cosine_distances_with(strategy, &as_refs(&a), &as_refs(&b), &mut got);
                assert_eq!(got, expected, "{} {strategy} depth {depth}", backend.name());
            }
        }
    }
}

#[test]
fn contexts_are_shareable() {
    let size = 64;
    let context = DescrInt::new(size, 6).unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let a = encode_all(&context, &random_vectors(&mut rng, 16, size, -1.0, 1.0));
    let b = encode_all(&context, &random_vectors(&mut rng, 16, size, -1.0, 1.0));

    let mut expected = vec![0.0f32; 256];
    context.cosine_distances_mxna(&as_refs(&a), &as_refs(&b), &mut expected);

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let mut got = vec![0.0f32; 256];
                context.cosine_distances_mxna(&as_refs(&a), &as_refs(&b), &mut got);
                assert_eq!(got, expected);
            });
        }
    });
}

#[test]
#[should_panic(expected = "output holds 5 elements, expected at least 6")]
fn rejects_short_output() {
    let context = DescrInt::new(8, 4).unwrap();
    let a = vec![context.encode32f_vec(&[1.0; 8]); 2];
    let b = vec![context.encode32f_vec(&[2.0; 8]); 3];
    let mut distances = [0.0f32; 5];
    context.cosine_distances_mxna(&as_refs(&a), &as_refs(&b), &mut distances);
}
