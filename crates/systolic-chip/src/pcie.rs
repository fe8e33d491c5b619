// SPDX-License-Identifier: AGPL-3.0-only

//! PCIe identifiers of the FPGA cards that host the accelerator function.
//!
//! The accelerator itself has no PCI identity; it is an accelerator function
//! unit (AFU) loaded into an FPGA card and recognised by the 128-bit ID in its
//! register header (see [`crate::regs::AFU_ID_L`]). Discovery first narrows
//! the PCI bus to these cards, then matches the AFU ID.

/// Intel vendor ID (PCI-SIG assigned).
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Device IDs for Intel programmable acceleration cards.
pub mod device_id {
    /// PAC with Arria 10 GX, physical function.
    pub const PAC_A10_PF: u16 = 0x09C4;
    /// PAC with Arria 10 GX, virtual function (AFU passthrough).
    pub const PAC_A10_VF: u16 = 0x09C5;
    /// PAC D5005 (Stratix 10), physical function.
    pub const PAC_D5005_PF: u16 = 0x0B2B;
    /// PAC D5005, virtual function.
    pub const PAC_D5005_VF: u16 = 0x0B2C;
}

/// All card functions that may expose the AFU register window.
pub const ALL_DEVICE_IDS: &[u16] = &[
    device_id::PAC_A10_PF,
    device_id::PAC_A10_VF,
    device_id::PAC_D5005_PF,
    device_id::PAC_D5005_VF,
];

/// BAR holding the AFU register window.
pub const AFU_BAR: usize = 0;

/// Whether `(vendor, device)` is a card that can host the accelerator.
#[must_use]
pub fn is_supported(vendor: u16, device: u16) -> bool {
    vendor == INTEL_VENDOR_ID && ALL_DEVICE_IDS.contains(&device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_cards() {
        assert!(is_supported(0x8086, 0x09C5));
        assert!(is_supported(0x8086, 0x0B2B));
        assert!(!is_supported(0x8086, 0x1234));
        assert!(!is_supported(0x1E7C, 0x09C4));
    }
}
