// SPDX-License-Identifier: AGPL-3.0-only

//! Block-tiling controller
//!
//! Computes `C = A · B` for `dim × dim` operands on an accelerator that only
//! multiplies `TILE_DIM × TILE_DIM` tiles, using the standard blocked
//! decomposition
//!
//! ```text
//! C[R][Cc] = Σ_k  A[R][k] · B[k][Cc]        (R, Cc, k range over tile blocks)
//! ```
//!
//! Per output tile `(R, Cc)`, strictly in this order:
//!
//! ```text
//! Preload-C   C rows 0..T   ← current C tile (zero)        seeds the device accumulator
//! for k in 0..blocks:
//!   Load-A    A rows 0..T   ← A[R*T + r][k*T .. k*T+T]
//!   Load-B    B rows 0..T   ← B[k*T + r][Cc*T .. Cc*T+T]
//!   Trigger                                                 device: C_tile += A_tile · B_tile
//! Drain-C     C[R*T + r][Cc*T .. Cc*T+T] ← C rows 0..T
//! ```
//!
//! The first failing register access aborts the whole product; no partial
//! matrix is returned.

use crate::backend::RegisterBackend;
use crate::error::{AccelError, Result};
use crate::matrix::Matrix;
use crate::transfer::TileTransfer;
use systolic_chip::geometry::{self, OperandRow, ResultRow, MAX_DIM, TILE_DIM};
use systolic_chip::regs::RowKind;
use tracing::{debug, info};

/// Tile grid for one `dim × dim` product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTiling {
    dim: usize,
    blocks: usize,
}

/// Output of a tiled product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiledProduct {
    /// Reassembled result matrix
    pub c: Matrix<i16>,
    /// Output tiles processed
    pub tiles: usize,
    /// Compute triggers issued
    pub compute_passes: usize,
}

impl BlockTiling {
    /// Tile grid for side length `dim`
    ///
    /// # Errors
    ///
    /// `InvalidDimension` if `dim` is zero, not a multiple of `TILE_DIM`, or
    /// larger than `MAX_DIM`.
    pub fn new(dim: usize) -> Result<Self> {
        let blocks = geometry::tiles_per_side(dim).ok_or_else(|| {
            AccelError::invalid_dimension(
                dim,
                format!(
                    "must be a positive multiple of the {TILE_DIM}×{TILE_DIM} tile, \
                     at most {MAX_DIM}"
                ),
            )
        })?;
        Ok(Self { dim, blocks })
    }

    /// Side length
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Tiles along one side
    pub const fn blocks(&self) -> usize {
        self.blocks
    }

    /// Output tile positions `(block_row, block_col)` in processing order
    pub fn tile_positions(&self) -> impl Iterator<Item = (usize, usize)> {
        let blocks = self.blocks;
        (0..blocks).flat_map(move |r| (0..blocks).map(move |c| (r, c)))
    }

    /// Run the full tiled product on `backend`
    ///
    /// # Errors
    ///
    /// `InvalidDimension` if either operand is not `dim × dim`; otherwise the
    /// first register access failure.
    pub fn multiply<B: RegisterBackend + ?Sized>(
        &self,
        backend: &mut B,
        a: &Matrix<i8>,
        b: &Matrix<i8>,
    ) -> Result<TiledProduct> {
        for (name, m) in [("A", a), ("B", b)] {
            if m.dim() != self.dim {
                return Err(AccelError::invalid_dimension(
                    m.dim(),
                    format!("operand {name} does not match the {0}×{0} tiling", self.dim),
                ));
            }
        }

        info!(
            "Tiled product: {0}×{0} as {1}×{1} tiles of {TILE_DIM}×{TILE_DIM}",
            self.dim, self.blocks
        );

        let mut c = Matrix::<i16>::zeros(self.dim);
        let mut xfer = TileTransfer::new(backend);
        let mut tiles = 0;
        let mut compute_passes = 0;

        for (blk_r, blk_c) in self.tile_positions() {
            let (row0, col0) = (blk_r * TILE_DIM, blk_c * TILE_DIM);
            debug!("Block row {blk_r}, block col {blk_c}");

            debug!("Preloading C tile");
            for c_r in 0..TILE_DIM {
                xfer.send_result_row(c_r, result_row(c.row_segment(row0 + c_r, col0, TILE_DIM)))?;
            }

            for k in 0..self.blocks {
                let k0 = k * TILE_DIM;

                debug!("Loading A tile ({blk_r}, {k})");
                for a_r in 0..TILE_DIM {
                    let row = operand_row(a.row_segment(row0 + a_r, k0, TILE_DIM));
                    xfer.send_row(RowKind::A, a_r, row)?;
                }

                debug!("Loading B tile ({k}, {blk_c})");
                for b_r in 0..TILE_DIM {
                    let row = operand_row(b.row_segment(k0 + b_r, col0, TILE_DIM));
                    xfer.send_row(RowKind::B, b_r, row)?;
                }

                xfer.trigger_compute()?;
                compute_passes += 1;
            }

            debug!("Draining C tile");
            for c_r in 0..TILE_DIM {
                let row = xfer.receive_result_row(c_r)?;
                c.row_segment_mut(row0 + c_r, col0, TILE_DIM).copy_from_slice(&row);
            }
            tiles += 1;
        }

        info!("Tiled product done: {tiles} tiles, {compute_passes} compute passes");

        Ok(TiledProduct {
            c,
            tiles,
            compute_passes,
        })
    }
}

fn operand_row(segment: &[i8]) -> OperandRow {
    let mut row = [0; TILE_DIM];
    row.copy_from_slice(segment);
    row
}

fn result_row(segment: &[i16]) -> ResultRow {
    let mut row = [0; TILE_DIM];
    row.copy_from_slice(segment);
    row
}
