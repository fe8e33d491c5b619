// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the systolic 8×8 matrix-multiply accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the device as seen from the host: tile geometry, the MMIO
//! register map, and the bit layout of operand and result rows inside a
//! 64-bit register word.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`geometry`] | Tile and full-matrix dimensions, element and lane widths |
//! | [`pcie`] | Vendor/device IDs of the FPGA cards hosting the accelerator |
//! | [`regs`] | Register map: A/B/C row windows, trigger, user register, ID header |
//! | [`codec`] | Packing rows of `i8` operands / `i16` results into register words |
//!
//! The register map must match the accelerator RTL exactly. A wrong offset
//! here does not fault; it produces wrong numbers that only end-to-end
//! verification catches.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod geometry;
pub mod pcie;
pub mod regs;

pub use codec::{pack_operand_row, pack_result_row, unpack_operand_row, unpack_result_row};
pub use geometry::{OperandRow, ResultRow, FULL_DIM, MAX_DIM, TILE_DIM};
