// SPDX-License-Identifier: AGPL-3.0-only

//! One full test pass: random operands → tiled product on the device →
//! software reference → exact comparison.

use crate::backend::{BackendType, RegisterBackend};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::tiling::BlockTiling;
use crate::verify::{reference_product, verify};
use rand::rngs::StdRng;
use rand::SeedableRng;
use systolic_chip::geometry::FULL_DIM;
use tracing::info;

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Side length of A, B and C
    pub dim: usize,

    /// Operand seed; drawn from entropy when `None`
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dim: FULL_DIM,
            seed: None,
        }
    }
}

/// Everything a verified pass produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Backend the pass ran on
    pub backend: BackendType,
    /// Seed the operands were drawn from
    pub seed: u64,
    /// Left operand
    pub a: Matrix<i8>,
    /// Right operand
    pub b: Matrix<i8>,
    /// Device result
    pub c: Matrix<i16>,
    /// Software reference
    pub reference: Matrix<i16>,
    /// Output tiles processed
    pub tiles: usize,
    /// Compute triggers issued
    pub compute_passes: usize,
    /// Elements verified
    pub compared: usize,
}

/// Run one full pass with freshly generated operands
///
/// # Errors
///
/// `InvalidDimension` for an untileable `dim`, any register fault, or
/// `Mismatch` if the device result differs from the reference.
pub fn run_full_pass<B: RegisterBackend + ?Sized>(
    backend: &mut B,
    config: &RunConfig,
) -> Result<RunReport> {
    let tiling = BlockTiling::new(config.dim)?;
    let seed = config.seed.unwrap_or_else(rand::random);

    info!("Populating A and B ({0}×{0}, seed {seed})", config.dim);
    let mut rng = StdRng::seed_from_u64(seed);
    let a = Matrix::random(config.dim, &mut rng);
    let b = Matrix::random(config.dim, &mut rng);

    run_with_operands(backend, &tiling, a, b, seed)
}

/// Run one pass on given operands
///
/// # Errors
///
/// Same as [`run_full_pass`].
pub fn run_with_operands<B: RegisterBackend + ?Sized>(
    backend: &mut B,
    tiling: &BlockTiling,
    a: Matrix<i8>,
    b: Matrix<i8>,
    seed: u64,
) -> Result<RunReport> {
    info!("Calculating reference values of C");
    let reference = reference_product(&a, &b);

    info!("Running tiled product on {}", backend.backend_type());
    let product = tiling.multiply(backend, &a, &b)?;

    info!("Calculation finished, verifying");
    let verified = verify(&product.c, &reference)?;
    info!("All {} elements match", verified.compared);

    Ok(RunReport {
        backend: backend.backend_type(),
        seed,
        a,
        b,
        c: product.c,
        reference,
        tiles: product.tiles,
        compute_passes: product.compute_passes,
        compared: verified.compared,
    })
}
