// SPDX-License-Identifier: AGPL-3.0-only

//! Register backend implementations
//!
//! Two backends available:
//! - **MMIO**: PCIe BAR mapped through sysfs (real hardware)
//! - **Software**: register-exact model of the accelerator (CI, debugging)

pub mod mmio;
pub mod software;

pub use mmio::MmioBackend;
pub use software::SoftwareBackend;
