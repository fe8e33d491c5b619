// SPDX-License-Identifier: AGPL-3.0-only

//! Runtime device discovery
//!
//! Finds FPGA cards by scanning PCIe sysfs for known vendor/device IDs, then
//! opens them one by one and matches the 128-bit accelerator ID exposed in
//! the register header. The first unlocked card carrying the requested
//! accelerator wins.

use crate::backend::RegisterBackend;
use crate::backends::MmioBackend;
use crate::error::{AccelError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use systolic_chip::{pcie, regs};

/// Root of the PCIe device tree in sysfs
pub const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// Accelerator ID of the systolic matrix-multiply AFU.
///
/// Must match the `accelerator-type-uuid` in the AFU JSON the bitstream was
/// built from.
pub const DEFAULT_ACCELERATOR_ID: AcceleratorId =
    AcceleratorId(0x5e6c_1f3a_8b24_4d71_9c0e_2a7f_b4d8_63e1);

/// 128-bit accelerator identity, written and parsed in UUID form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AcceleratorId(u128);

impl AcceleratorId {
    /// Build from the two ID register words.
    pub const fn from_words(high: u64, low: u64) -> Self {
        Self(((high as u128) << 64) | low as u128)
    }

    /// Value of the `AFU_ID_L` register.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn low(self) -> u64 {
        self.0 as u64
    }

    /// Value of the `AFU_ID_H` register.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// Read the ID a device reports through its header registers.
    ///
    /// # Errors
    ///
    /// Propagates register read failures.
    pub fn read_from<B: RegisterBackend + ?Sized>(backend: &mut B) -> Result<Self> {
        let low = backend.read(regs::AFU_ID_L)?;
        let high = backend.read(regs::AFU_ID_H)?;
        Ok(Self::from_words(high, low))
    }
}

impl Default for AcceleratorId {
    fn default() -> Self {
        DEFAULT_ACCELERATOR_ID
    }
}

impl std::fmt::Display for AcceleratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            v >> 96,
            (v >> 80) & 0xFFFF,
            (v >> 64) & 0xFFFF,
            (v >> 48) & 0xFFFF,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}

impl FromStr for AcceleratorId {
    type Err = AccelError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| AccelError::InvalidAcceleratorId {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let groups: Vec<&str> = s.trim().split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if lengths != [8, 4, 4, 4, 12] {
            return Err(invalid("expected 8-4-4-4-12 hex groups"));
        }
        // from_str_radix alone would also take a sign
        if !groups.iter().all(|g| g.bytes().all(|b| b.is_ascii_hexdigit())) {
            return Err(invalid("groups must be hexadecimal digits only"));
        }

        let hex: String = groups.concat();
        u128::from_str_radix(&hex, 16)
            .map(Self)
            .map_err(|e| invalid(&e.to_string()))
    }
}

/// Which accelerator to open and where to look for it
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Identity the accelerator must report
    pub accelerator_id: AcceleratorId,

    /// Open this PCIe function only, instead of scanning
    pub pcie_address: Option<String>,

    /// BAR carrying the register window
    pub bar: usize,

    /// Root of the PCIe sysfs tree
    pub sysfs_root: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            accelerator_id: AcceleratorId::default(),
            pcie_address: None,
            bar: pcie::AFU_BAR,
            sysfs_root: PathBuf::from(SYSFS_PCI_DEVICES),
        }
    }
}

/// Information about a discovered card function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// PCIe bus address (0000:3b:00.1, etc.)
    pub pcie_address: String,

    /// sysfs directory of the function
    pub path: PathBuf,

    /// PCI vendor ID
    pub vendor_id: u16,

    /// PCI device ID
    pub device_id: u16,
}

impl DeviceInfo {
    /// Whether this is a virtual function
    pub const fn is_virtual_function(&self) -> bool {
        matches!(
            self.device_id,
            pcie::device_id::PAC_A10_VF | pcie::device_id::PAC_D5005_VF
        )
    }
}

/// Device manager for runtime discovery and access
#[derive(Debug)]
pub struct DeviceManager {
    devices: Vec<DeviceInfo>,
    bar: usize,
}

impl DeviceManager {
    /// Discover candidate cards under the system sysfs tree
    ///
    /// # Errors
    ///
    /// Returns `DriverMissing` if the PCIe sysfs tree cannot be read.
    pub fn discover() -> Result<Self> {
        Self::discover_with(&DeviceConfig::default())
    }

    /// Discover candidate cards as configured
    ///
    /// # Errors
    ///
    /// Returns `DriverMissing` if the PCIe sysfs tree cannot be read.
    pub fn discover_with(config: &DeviceConfig) -> Result<Self> {
        let root = config.sysfs_root.as_path();
        tracing::info!("Discovering accelerator cards under {}", root.display());

        let entries = std::fs::read_dir(root).map_err(|e| {
            AccelError::driver_missing(format!("cannot read {}: {e}", root.display()))
        })?;

        let mut devices = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();

            let vendor_id = read_hex_sysfs(&path.join("vendor")).ok();
            let device_id = read_hex_sysfs(&path.join("device")).ok();

            if let (Some(vendor_id), Some(device_id)) = (vendor_id, device_id) {
                if pcie::is_supported(vendor_id, device_id) {
                    let pcie_address = entry.file_name().to_string_lossy().to_string();
                    tracing::debug!("Found card {pcie_address} ({vendor_id:04x}:{device_id:04x})");
                    devices.push(DeviceInfo {
                        pcie_address,
                        path,
                        vendor_id,
                        device_id,
                    });
                }
            }
        }

        // Sort to ensure consistent ordering
        devices.sort_by(|a, b| a.pcie_address.cmp(&b.pcie_address));

        tracing::info!("Discovered {} candidate card function(s)", devices.len());

        Ok(Self {
            devices,
            bar: config.bar,
        })
    }

    /// Get number of discovered card functions
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Get slice of all card functions
    #[must_use]
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Open the first unlocked card carrying `accelerator_id`
    ///
    /// # Errors
    ///
    /// - `DeviceBusy` if a candidate could not be locked and no other matched
    /// - `DeviceNotFound` if no candidate reports `accelerator_id`
    pub fn open(&self, accelerator_id: &AcceleratorId) -> Result<MmioBackend> {
        let mut busy = None;

        for info in &self.devices {
            match open_matching(&info.path, &info.pcie_address, self.bar, accelerator_id) {
                Ok(Some(backend)) => return Ok(backend),
                Ok(None) => {}
                Err(AccelError::DeviceBusy { pcie_address }) => busy = Some(pcie_address),
                Err(e) => tracing::warn!("Skipping {}: {e}", info.pcie_address),
            }
        }

        match busy {
            Some(pcie_address) => Err(AccelError::device_busy(pcie_address)),
            None => {
                tracing::error!("No card carries accelerator {accelerator_id}");
                Err(AccelError::device_not_found(accelerator_id))
            }
        }
    }

    /// Open the function at `pcie_address` without scanning
    ///
    /// # Errors
    ///
    /// Returns the open error, or `DeviceNotFound` if the function does not
    /// report `accelerator_id`.
    pub fn open_at(config: &DeviceConfig, pcie_address: &str) -> Result<MmioBackend> {
        let path = config.sysfs_root.join(pcie_address);
        open_matching(&path, pcie_address, config.bar, &config.accelerator_id)?
            .ok_or_else(|| AccelError::device_not_found(config.accelerator_id))
    }
}

fn open_matching(
    path: &Path,
    pcie_address: &str,
    bar: usize,
    accelerator_id: &AcceleratorId,
) -> Result<Option<MmioBackend>> {
    let mut backend = MmioBackend::open(path, pcie_address, bar)?;
    let found = AcceleratorId::read_from(&mut backend)?;

    if found == *accelerator_id {
        tracing::info!("Opened accelerator {found} at {pcie_address}");
        Ok(Some(backend))
    } else {
        tracing::debug!("{pcie_address} carries {found}, not {accelerator_id}");
        Ok(None)
    }
}

/// Read a hexadecimal value from sysfs
fn read_hex_sysfs(path: &Path) -> Result<u16> {
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim().trim_start_matches("0x");

    u16::from_str_radix(trimmed, 16).map_err(|e| {
        AccelError::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid hex in {}: {e}", path.display()),
        ))
    })
}
