/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

mod common;

use descr_int::{backend, DescrInt, InitError, Tuning, TuningError, MAX_SIZE};
use rstest::rstest;

#[rstest]
#[case(8, 4, true)]
#[case(8, 8, true)]
#[case(512, 6, true)]
#[case(MAX_SIZE, 8, true)]
#[case(0, 4, false)]
#[case(12, 4, false)]
#[case(8, 3, false)]
#[case(8, 9, false)]
#[case(MAX_SIZE + 8, 4, false)]
fn validity(#[case] size: usize, #[case] depth: usize, #[case] valid: bool) {
    assert_eq!(DescrInt::valid(size, depth), valid);
    assert_eq!(DescrInt::new(size, depth).is_ok(), valid);
}

#[test]
fn construction_errors() {
    assert_eq!(DescrInt::new(8, 2).unwrap_err(), InitError::UnsupportedDepth(2));
    assert_eq!(DescrInt::new(0, 6).unwrap_err(), InitError::ZeroSize);
    assert_eq!(
        DescrInt::new(100, 6).unwrap_err(),
        InitError::MisalignedSize { size: 100, align: 8 }
    );
    assert_eq!(
        DescrInt::new(2 * MAX_SIZE, 6).unwrap_err(),
        InitError::SizeTooLarge {
            size: 2 * MAX_SIZE,
            max: MAX_SIZE
        }
    );
}

#[rstest]
fn derived_sizes(#[values(4, 5, 6, 7, 8)] depth: usize) {
    let _guard = common::init_test_subscriber();
    for backend in backend::available() {
        let context = DescrInt::with_backend(256, depth, backend).unwrap();
        assert_eq!(context.size(), 256);
        assert_eq!(context.depth().bits(), depth);
        assert_eq!(context.encoded_size(), 16 + 256 * depth / 8);
        let width = if depth == 8 { 2 } else { 1 };
        assert_eq!(context.unpacked_size(), 256 * width);
        assert_eq!(context.backend_name(), backend.name());
        assert_eq!(context.tuning(), Tuning::default());
    }
}

#[test]
fn micro_tiles_follow_backend() {
    for backend in backend::available() {
        for depth in 4..=8 {
            let context = DescrInt::with_backend(64, depth, backend).unwrap();
            let tiles = context.micro_tiles();
            assert_eq!(tiles, backend.micro_tiles(context.depth()));

            // Replacing the cache budgets never changes the register tiles.
            let tuned = context.with_tuning(Tuning::new(4096, 8192, 16384)).unwrap();
            assert_eq!(tuned.micro_tiles(), tiles);
            assert_eq!(tuned.tuning(), Tuning::new(4096, 8192, 16384));
        }
    }
}

#[test]
fn tuning_from_json() {
    let tuning: Tuning =
        serde_json::from_str(r#"{"l1": 49152, "l2": 2097152, "l3": 8388608}"#).unwrap();
    let context = DescrInt::new(64, 6).unwrap().with_tuning(tuning).unwrap();
    assert_eq!(context.tuning().l2, 2 * 1024 * 1024);

    let bad: Tuning = serde_json::from_str(r#"{"l3": 0}"#).unwrap();
    assert_eq!(
        DescrInt::new(64, 6).unwrap().with_tuning(bad).unwrap_err(),
        TuningError::ZeroBudget { level: "L3" }
    );
}

#[test]
fn active_backend_is_stable() {
    let first = backend::active();
    let second = backend::active();
    assert_eq!(first.name(), second.name());
    assert_eq!(DescrInt::new(8, 4).unwrap().backend_name(), first.name());
}
