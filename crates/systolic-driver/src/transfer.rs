// SPDX-License-Identifier: AGPL-3.0-only

//! Tile transfer driver
//!
//! Moves one row of one tile across the register boundary: pack with the
//! codec, compute the address from the register map, issue the blocking
//! access. Failures propagate unchanged; nothing here retries.
//!
//! There is no completion handshake. After [`TileTransfer::trigger_compute`]
//! the next register access is ordered behind the compute pass by the
//! device's own register interface, so the host never polls.

use crate::backend::RegisterBackend;
use crate::error::{AccelError, Result};
use systolic_chip::geometry::{OperandRow, ResultRow, TILE_DIM};
use systolic_chip::regs::{self, RowKind};
use systolic_chip::{pack_operand_row, pack_result_row, unpack_result_row};
use tracing::debug;

/// Row-level access to one accelerator
#[derive(Debug)]
pub struct TileTransfer<'a, B: RegisterBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: RegisterBackend + ?Sized> TileTransfer<'a, B> {
    /// Wrap a backend for the duration of a transfer sequence
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    /// Write one operand row
    ///
    /// # Errors
    ///
    /// `InvalidRow` for `row >= TILE_DIM`, otherwise the backend's write error.
    pub fn send_row(&mut self, kind: RowKind, row: usize, values: OperandRow) -> Result<()> {
        check_row(row)?;
        let address = regs::operand_row(kind, row);
        let word = pack_operand_row(values);
        debug!("{kind} row {row}: {word:#018x} @ {address:#05x}");
        self.backend.write(address, word)
    }

    /// Write one result row, low word then high word
    ///
    /// # Errors
    ///
    /// `InvalidRow` for `row >= TILE_DIM`, otherwise the backend's write error.
    pub fn send_result_row(&mut self, row: usize, values: ResultRow) -> Result<()> {
        check_row(row)?;
        let (low, high) = pack_result_row(values);
        let (lw_addr, hw_addr) = (regs::c_row_low(row), regs::c_row_high(row));
        debug!("C row {row} write: {low:#018x} | {high:#018x} @ {lw_addr:#05x} @ {hw_addr:#05x}");
        self.backend.write(lw_addr, low)?;
        self.backend.write(hw_addr, high)
    }

    /// Read one result row, low word then high word
    ///
    /// # Errors
    ///
    /// `InvalidRow` for `row >= TILE_DIM`, otherwise the backend's read error.
    pub fn receive_result_row(&mut self, row: usize) -> Result<ResultRow> {
        check_row(row)?;
        let (lw_addr, hw_addr) = (regs::c_row_low(row), regs::c_row_high(row));
        let low = self.backend.read(lw_addr)?;
        let high = self.backend.read(hw_addr)?;
        debug!("C row {row} read: {low:#018x} | {high:#018x} @ {lw_addr:#05x} @ {hw_addr:#05x}");
        Ok(unpack_result_row(low, high))
    }

    /// Start one compute pass over the loaded A and B tiles
    ///
    /// # Errors
    ///
    /// Returns the backend's write error.
    pub fn trigger_compute(&mut self) -> Result<()> {
        debug!("trigger @ {:#05x}", regs::TRIGGER);
        self.backend.write(regs::TRIGGER, regs::TRIGGER_START)
    }

    /// Read the user scratch register
    ///
    /// # Errors
    ///
    /// Returns the backend's read error.
    pub fn read_user_register(&mut self) -> Result<u64> {
        self.backend.read(regs::USER_REG)
    }

    /// Write the user scratch register
    ///
    /// # Errors
    ///
    /// Returns the backend's write error.
    pub fn write_user_register(&mut self, word: u64) -> Result<()> {
        self.backend.write(regs::USER_REG, word)
    }
}

fn check_row(row: usize) -> Result<()> {
    if row < TILE_DIM {
        Ok(())
    } else {
        Err(AccelError::InvalidRow {
            row,
            tile_dim: TILE_DIM,
        })
    }
}
