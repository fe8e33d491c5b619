// SPDX-License-Identifier: AGPL-3.0-only

//! Backend abstraction for the register interface
//!
//! The host core only ever sees two primitives: read one 64-bit register and
//! write one 64-bit register. Both block until the device acknowledges the
//! access. Everything above this trait (transfer, tiling, verification) is
//! backend-agnostic.

use crate::discovery::{DeviceConfig, DeviceManager};
use crate::error::Result;
use std::fmt::Debug;

/// Register-level access to one accelerator
pub trait RegisterBackend: Debug + Send {
    /// Read the 64-bit register at `address`
    ///
    /// # Errors
    ///
    /// Returns `RegisterAccess` if the access fails at the primitive level.
    fn read(&mut self, address: usize) -> Result<u64>;

    /// Write `word` to the 64-bit register at `address`
    ///
    /// # Errors
    ///
    /// Returns `RegisterAccess` if the access fails at the primitive level.
    fn write(&mut self, address: usize, word: u64) -> Result<()>;

    /// Get backend type for debugging
    fn backend_type(&self) -> BackendType;
}

impl<B: RegisterBackend + ?Sized> RegisterBackend for Box<B> {
    fn read(&mut self, address: usize) -> Result<u64> {
        (**self).read(address)
    }

    fn write(&mut self, address: usize, word: u64) -> Result<()> {
        (**self).write(address, word)
    }

    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Memory-mapped PCIe BAR
    Mmio,

    /// Software model of the register file and systolic array
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmio => write!(f, "MMIO"),
            Self::Software => write!(f, "Software (virtual accelerator)"),
        }
    }
}

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Hardware if an accelerator opens, software otherwise
    Auto,

    /// Force hardware
    #[default]
    Mmio,

    /// Force the software model (CI, protocol debugging)
    Software,
}

/// Select appropriate backend based on availability and requirements
///
/// # Errors
///
/// Returns the discovery/open error when hardware is required and cannot be
/// opened.
pub fn select_backend(
    selection: BackendSelection,
    config: &DeviceConfig,
) -> Result<Box<dyn RegisterBackend>> {
    use crate::backends::software::SoftwareBackend;

    match selection {
        BackendSelection::Auto => match open_hardware(config) {
            Ok(backend) => {
                tracing::info!("Using MMIO backend for {}", config.accelerator_id);
                Ok(backend)
            }
            Err(e) => {
                tracing::warn!("Hardware unavailable ({e}), using software backend");
                Ok(Box::new(SoftwareBackend::with_id(config.accelerator_id)))
            }
        },

        BackendSelection::Mmio => open_hardware(config),

        BackendSelection::Software => {
            Ok(Box::new(SoftwareBackend::with_id(config.accelerator_id)))
        }
    }
}

fn open_hardware(config: &DeviceConfig) -> Result<Box<dyn RegisterBackend>> {
    let backend = match &config.pcie_address {
        Some(addr) => DeviceManager::open_at(config, addr)?,
        None => DeviceManager::discover_with(config)?.open(&config.accelerator_id)?,
    };
    Ok(Box::new(backend))
}
