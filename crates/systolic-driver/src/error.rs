// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for accelerator operations

use thiserror::Error;

/// Result type alias for accelerator operations
pub type Result<T> = std::result::Result<T, AccelError>;

/// Errors that can occur while driving the accelerator
#[derive(Debug, Error)]
pub enum AccelError {
    /// No accelerator with the requested identity is present
    #[error("Accelerator {accelerator_id} not found")]
    DeviceNotFound {
        /// Identity that was searched for
        accelerator_id: String,
    },

    /// Every matching accelerator is held by another process
    #[error("All accelerators busy (last tried {pcie_address})")]
    DeviceBusy {
        /// PCIe address of the last instance tried
        pcie_address: String,
    },

    /// The device-access layer itself is unavailable
    #[error("No FPGA driver found: {reason}")]
    DriverMissing {
        /// What was missing
        reason: String,
    },

    /// A register read or write failed at the primitive level
    #[error("Register {op} @ {address:#05x} failed: {reason}")]
    RegisterAccess {
        /// `"read"` or `"write"`
        op: &'static str,
        /// Register offset
        address: usize,
        /// Reason for failure
        reason: String,
    },

    /// I/O error while opening or mapping the device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Device result differs from the software reference
    #[error(
        "Mismatch at row {row}, col {col}: got {got} ({got:#06x}), \
         expected {expected} ({expected:#06x})"
    )]
    Mismatch {
        /// Row of the first differing element
        row: usize,
        /// Column of the first differing element
        col: usize,
        /// Device-produced value
        got: i16,
        /// Reference value
        expected: i16,
    },

    /// Matrix side length does not decompose into whole tiles
    #[error("Invalid matrix dimension {dim}: {reason}")]
    InvalidDimension {
        /// Offending side length
        dim: usize,
        /// Reason for rejection
        reason: String,
    },

    /// Tile row index outside `0..TILE_DIM`
    #[error("Tile row {row} out of range (tile has {tile_dim} rows)")]
    InvalidRow {
        /// Requested row
        row: usize,
        /// Rows per tile
        tile_dim: usize,
    },

    /// Accelerator ID string could not be parsed
    #[error("Invalid accelerator ID {input:?}: {reason}")]
    InvalidAcceleratorId {
        /// Text that was parsed
        input: String,
        /// Reason for rejection
        reason: String,
    },
}

/// Coarse classification of [`AccelError`] used for reporting and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Accelerator not found or busy
    DeviceUnavailable,
    /// Device-access layer unavailable
    DriverMissing,
    /// Register-level I/O fault
    IoFault,
    /// Verification mismatch
    Mismatch,
    /// Caller supplied invalid input
    InvalidInput,
}

impl ErrorKind {
    /// Process exit status for this kind of failure
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::DeviceUnavailable => 2,
            Self::DriverMissing => 3,
            Self::IoFault => 4,
            Self::Mismatch => 5,
            Self::InvalidInput => 64,
        }
    }
}

impl AccelError {
    /// Create a device not found error
    pub fn device_not_found(accelerator_id: impl std::fmt::Display) -> Self {
        Self::DeviceNotFound {
            accelerator_id: accelerator_id.to_string(),
        }
    }

    /// Create a device busy error
    pub fn device_busy(pcie_address: impl Into<String>) -> Self {
        Self::DeviceBusy {
            pcie_address: pcie_address.into(),
        }
    }

    /// Create a driver missing error
    pub fn driver_missing(reason: impl Into<String>) -> Self {
        Self::DriverMissing {
            reason: reason.into(),
        }
    }

    /// Create a register read failure
    pub fn read_failed(address: usize, reason: impl Into<String>) -> Self {
        Self::RegisterAccess {
            op: "read",
            address,
            reason: reason.into(),
        }
    }

    /// Create a register write failure
    pub fn write_failed(address: usize, reason: impl Into<String>) -> Self {
        Self::RegisterAccess {
            op: "write",
            address,
            reason: reason.into(),
        }
    }

    /// Create an invalid dimension error
    pub fn invalid_dimension(dim: usize, reason: impl Into<String>) -> Self {
        Self::InvalidDimension {
            dim,
            reason: reason.into(),
        }
    }

    /// Taxonomy bucket of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DeviceNotFound { .. } | Self::DeviceBusy { .. } => ErrorKind::DeviceUnavailable,
            Self::DriverMissing { .. } => ErrorKind::DriverMissing,
            Self::RegisterAccess { .. } | Self::Io { .. } => ErrorKind::IoFault,
            Self::Mismatch { .. } => ErrorKind::Mismatch,
            Self::InvalidDimension { .. }
            | Self::InvalidRow { .. }
            | Self::InvalidAcceleratorId { .. } => ErrorKind::InvalidInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_buckets() {
        assert_eq!(AccelError::device_not_found("x").kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(AccelError::device_busy("0000:3b:00.0").kind(), ErrorKind::DeviceUnavailable);
        assert_eq!(AccelError::driver_missing("no sysfs").kind(), ErrorKind::DriverMissing);
        assert_eq!(AccelError::read_failed(0x300, "bus").kind(), ErrorKind::IoFault);
        let mismatch = AccelError::Mismatch {
            row: 0,
            col: 0,
            got: 1,
            expected: 2,
        };
        assert_eq!(mismatch.kind(), ErrorKind::Mismatch);
        assert_eq!(AccelError::invalid_dimension(12, "x").kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn exit_codes_distinct_and_nonzero() {
        let kinds = [
            ErrorKind::DeviceUnavailable,
            ErrorKind::DriverMissing,
            ErrorKind::IoFault,
            ErrorKind::Mismatch,
            ErrorKind::InvalidInput,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn mismatch_message_names_coordinates() {
        let e = AccelError::Mismatch {
            row: 3,
            col: 14,
            got: -2,
            expected: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("col 14"));
        assert!(msg.contains("got -2"));
        assert!(msg.contains("expected 7"));
    }

    #[test]
    fn register_fault_formats_address() {
        let msg = AccelError::write_failed(0x100, "link down").to_string();
        assert_eq!(msg, "Register write @ 0x100 failed: link down");
    }
}
