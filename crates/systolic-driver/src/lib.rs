// SPDX-License-Identifier: AGPL-3.0-only

//! Host driver for the systolic 8×8 matrix-multiply accelerator.
//!
//! The accelerator multiplies one 8×8 `i8` tile pair into an 8×8 `i16` tile
//! and is reachable only through 64-bit memory-mapped registers. This crate
//! drives it end to end:
//!
//! ```text
//! BlockTiling ──► TileTransfer ──► codec / register map ──► RegisterBackend
//!      ▲                                                        │
//!      └──────────── result rows ◄──────────────────────────────┘
//!                         │
//!                     verify() against reference_product()
//! ```
//!
//! # Backends
//!
//! ```text
//! MmioBackend      — PCIe BAR mapped through sysfs (hardware)
//! SoftwareBackend  — register-exact model of the accelerator (CI, debugging)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use systolic_driver::{run_full_pass, select_backend, BackendSelection, DeviceConfig, RunConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut backend = select_backend(BackendSelection::Auto, &DeviceConfig::default())?;
//! let report = run_full_pass(&mut backend, &RunConfig::default())?;
//! println!("{} elements verified over {} tiles", report.compared, report.tiles);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
mod discovery;
mod error;
mod matrix;
mod run;
pub mod tiling;
pub mod transfer;
pub mod verify;

/// Silicon model (re-exported from systolic-chip).
pub use systolic_chip as chip;

pub use backend::{select_backend, BackendSelection, BackendType, RegisterBackend};
pub use backends::{MmioBackend, SoftwareBackend};
pub use discovery::{
    AcceleratorId, DeviceConfig, DeviceInfo, DeviceManager, DEFAULT_ACCELERATOR_ID,
    SYSFS_PCI_DEVICES,
};
pub use error::{AccelError, ErrorKind, Result};
pub use matrix::Matrix;
pub use run::{run_full_pass, run_with_operands, RunConfig, RunReport};
pub use tiling::{BlockTiling, TiledProduct};
pub use transfer::TileTransfer;
pub use verify::{first_mismatch, reference_product, verify, Mismatch, VerifyReport};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        run_full_pass, select_backend, AccelError, AcceleratorId, BackendSelection, BlockTiling,
        DeviceConfig, DeviceManager, Matrix, RegisterBackend, Result, RunConfig, SoftwareBackend,
        TileTransfer,
    };
}
