// SPDX-License-Identifier: AGPL-3.0-only

//! Software reference product and exact result verification

use crate::error::{AccelError, Result};
use crate::matrix::Matrix;
use tracing::{error, trace};

/// First coordinate where two result matrices differ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Row
    pub row: usize,
    /// Column
    pub col: usize,
    /// Device value
    pub got: i16,
    /// Reference value
    pub expected: i16,
}

impl From<Mismatch> for AccelError {
    fn from(m: Mismatch) -> Self {
        Self::Mismatch {
            row: m.row,
            col: m.col,
            got: m.got,
            expected: m.expected,
        }
    }
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyReport {
    /// Elements compared
    pub compared: usize,
}

/// `C[i][j] = Σ_k A[i][k]·B[k][j]` with a wrapping 16-bit accumulator,
/// matching the device's accumulator width.
///
/// # Panics
///
/// Panics if `a` and `b` differ in size.
pub fn reference_product(a: &Matrix<i8>, b: &Matrix<i8>) -> Matrix<i16> {
    assert_eq!(a.dim(), b.dim(), "operand sizes differ");
    let dim = a.dim();
    Matrix::from_fn(dim, |i, j| {
        (0..dim).fold(0i16, |acc, k| {
            acc.wrapping_add(i16::from(a[(i, k)]).wrapping_mul(i16::from(b[(k, j)])))
        })
    })
}

/// Row-major scan for the first differing element. Does not modify either
/// matrix, so repeated calls agree.
///
/// # Panics
///
/// Panics if the matrices differ in size.
pub fn first_mismatch(c: &Matrix<i16>, reference: &Matrix<i16>) -> Option<Mismatch> {
    assert_eq!(c.dim(), reference.dim(), "result sizes differ");
    c.rows()
        .zip(reference.rows())
        .enumerate()
        .find_map(|(row, (got_row, ref_row))| {
            got_row
                .iter()
                .zip(ref_row)
                .position(|(g, e)| g != e)
                .map(|col| Mismatch {
                    row,
                    col,
                    got: got_row[col],
                    expected: ref_row[col],
                })
        })
}

/// Compare the device result against the reference
///
/// # Errors
///
/// `Mismatch` naming the first differing coordinate and both values;
/// `InvalidDimension` if the matrices differ in size.
pub fn verify(c: &Matrix<i16>, reference: &Matrix<i16>) -> Result<VerifyReport> {
    if c.dim() != reference.dim() {
        return Err(AccelError::invalid_dimension(
            c.dim(),
            format!("result is not {0}×{0} like the reference", reference.dim()),
        ));
    }
    if let Some(m) = first_mismatch(c, reference) {
        error!(
            "row: {}, col: {} | got: {:#06x}, expected {:#06x}",
            m.row, m.col, m.got, m.expected
        );
        return Err(m.into());
    }
    trace!("All {} elements match", c.dim() * c.dim());
    Ok(VerifyReport {
        compared: c.dim() * c.dim(),
    })
}
