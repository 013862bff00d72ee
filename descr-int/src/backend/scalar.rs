/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use half::f16;

use descr_wide::Level;

use super::{Backend, Primitives, Sealed};
use crate::{codec, kernels, layout::Depth, reduce, tuning::MicroTiles, unpack};

/// The portable reference backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct Scalar;

const MD: usize = 2;
const ND: usize = 4;
const MU: usize = 4;
const NU: usize = 8;

fn table<const N: usize>() -> Primitives {
    Primitives {
        min_max_32f: reduce::min_max::<f32>,
        min_max_16f: reduce::min_max::<f16>,
        encode_32f: codec::encode::<f32, N>,
        encode_16f: codec::encode::<f16, N>,
        decode_32f: codec::decode::<f32, N>,
        decode_16f: codec::decode::<f16, N>,
        code_dot: kernels::code_dot::<N>,
        macro_direct: kernels::macro_direct::<N, MD, ND>,
        unpack_norm_a: unpack::unpack_norm_a,
        unpack_norm_b: unpack::unpack_norm_b,
        unpack_data_a: unpack::unpack_data_a::<N>,
        unpack_data_b: unpack::unpack_data_b::<N, NU>,
        macro_unpack: kernels::macro_unpack::<N, MU, NU>,
    }
}

impl Sealed for Scalar {}

impl Backend for Scalar {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn level(&self) -> Level {
        Level::Scalar
    }

    fn micro_tiles(&self, _depth: Depth) -> MicroTiles {
        MicroTiles {
            md: MD,
            nd: ND,
            mu: MU,
            nu: NU,
        }
    }

    fn primitives(&self, depth: Depth) -> Primitives {
        dispatch_depth!(depth, table)
    }
}
