// SPDX-License-Identifier: AGPL-3.0-only

//! Register map of the accelerator function (AFU) MMIO window.
//!
//! All registers are 64 bits wide and 8-byte aligned. Offsets are relative to
//! the start of the mapped BAR.
//!
//! ```text
//! 0x000        feature header (DFH)                 read
//! 0x008        accelerator ID, low 64 bits          read
//! 0x010        accelerator ID, high 64 bits         read
//! 0x020        user register                        read/write   scratch, not used by tiling
//! 0x100-0x138  A rows 0..7   (0x100 + r*8)          write        8 × i8 lanes
//! 0x200-0x238  B rows 0..7   (0x200 + r*8)          write        8 × i8 lanes
//! 0x300-0x378  C rows 0..7   (0x300 + r*0x10)       read/write   lanes 0-3 low, 4-7 at +0x8
//! 0x400        compute trigger                      write        nonzero payload starts one pass
//! ```

use crate::geometry::TILE_DIM;

/// Width of one register in bytes.
pub const WORD_BYTES: usize = 8;

// ── Accelerator identity ─────────────────────────────────────────────────────

/// Device feature header.
pub const DFH: usize = 0x000;
/// Accelerator ID, low 64 bits of the 128-bit UUID.
pub const AFU_ID_L: usize = 0x008;
/// Accelerator ID, high 64 bits of the 128-bit UUID.
pub const AFU_ID_H: usize = 0x010;

// ── Scratch ──────────────────────────────────────────────────────────────────

/// User register. Generic scratch/status word, never touched by tiling.
pub const USER_REG: usize = 0x020;

// ── Operand rows ─────────────────────────────────────────────────────────────

/// First A-row register.
pub const A_ROW_BASE: usize = 0x100;
/// First B-row register.
pub const B_ROW_BASE: usize = 0x200;
/// Stride between consecutive operand rows.
pub const OPERAND_ROW_STRIDE: usize = 0x8;

// ── Result rows ──────────────────────────────────────────────────────────────

/// Low word of C row 0.
pub const C_ROW_BASE: usize = 0x300;
/// Stride between consecutive C rows (two words per row).
pub const C_ROW_STRIDE: usize = 0x10;
/// Offset of the high word from the low word of the same row.
pub const C_HIGH_OFFSET: usize = 0x8;

// ── Control ──────────────────────────────────────────────────────────────────

/// Compute trigger.
pub const TRIGGER: usize = 0x400;
/// Payload the host writes to [`TRIGGER`]. Any nonzero value starts a pass.
pub const TRIGGER_START: u64 = 100;

/// Size of the decoded register window.
pub const WINDOW_SIZE: usize = TRIGGER + WORD_BYTES;

/// Operand matrix selector for row writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    /// Left operand.
    A,
    /// Right operand.
    B,
}

impl RowKind {
    /// Base address of this operand's row window.
    #[must_use]
    pub const fn base(self) -> usize {
        match self {
            Self::A => A_ROW_BASE,
            Self::B => B_ROW_BASE,
        }
    }
}

impl std::fmt::Display for RowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Address of operand row `row` of `kind`. `row` must be below [`TILE_DIM`].
#[must_use]
pub const fn operand_row(kind: RowKind, row: usize) -> usize {
    debug_assert!(row < TILE_DIM);
    kind.base() + row * OPERAND_ROW_STRIDE
}

/// Address of A row `row`.
#[must_use]
pub const fn a_row(row: usize) -> usize {
    operand_row(RowKind::A, row)
}

/// Address of B row `row`.
#[must_use]
pub const fn b_row(row: usize) -> usize {
    operand_row(RowKind::B, row)
}

/// Address of the low word (lanes 0-3) of C row `row`.
#[must_use]
pub const fn c_row_low(row: usize) -> usize {
    debug_assert!(row < TILE_DIM);
    C_ROW_BASE + row * C_ROW_STRIDE
}

/// Address of the high word (lanes 4-7) of C row `row`.
#[must_use]
pub const fn c_row_high(row: usize) -> usize {
    c_row_low(row) + C_HIGH_OFFSET
}

/// Decoded register, as the device sees an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Feature header word.
    Header,
    /// Accelerator ID word (`false` = low, `true` = high).
    AcceleratorId {
        /// High half of the UUID.
        high: bool,
    },
    /// User scratch register.
    User,
    /// Operand row.
    Operand {
        /// Which operand.
        kind: RowKind,
        /// Tile row index.
        row: usize,
    },
    /// Result row word.
    Result {
        /// Tile row index.
        row: usize,
        /// `true` for lanes 4-7.
        high: bool,
    },
    /// Compute trigger.
    Trigger,
}

impl Region {
    /// Whether the host may write this register.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Header | Self::AcceleratorId { .. })
    }

    /// Whether the host may read this register.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Operand { .. } | Self::Trigger)
    }
}

/// Decode `address`. Returns `None` for unmapped or misaligned addresses.
#[must_use]
pub const fn region_of(address: usize) -> Option<Region> {
    if address % WORD_BYTES != 0 {
        return None;
    }
    let a_end = A_ROW_BASE + TILE_DIM * OPERAND_ROW_STRIDE;
    let b_end = B_ROW_BASE + TILE_DIM * OPERAND_ROW_STRIDE;
    let c_end = C_ROW_BASE + TILE_DIM * C_ROW_STRIDE;

    match address {
        DFH => Some(Region::Header),
        AFU_ID_L => Some(Region::AcceleratorId { high: false }),
        AFU_ID_H => Some(Region::AcceleratorId { high: true }),
        USER_REG => Some(Region::User),
        TRIGGER => Some(Region::Trigger),
        a if a >= A_ROW_BASE && a < a_end => Some(Region::Operand {
            kind: RowKind::A,
            row: (a - A_ROW_BASE) / OPERAND_ROW_STRIDE,
        }),
        b if b >= B_ROW_BASE && b < b_end => Some(Region::Operand {
            kind: RowKind::B,
            row: (b - B_ROW_BASE) / OPERAND_ROW_STRIDE,
        }),
        c if c >= C_ROW_BASE && c < c_end => Some(Region::Result {
            row: (c - C_ROW_BASE) / C_ROW_STRIDE,
            high: (c - C_ROW_BASE) % C_ROW_STRIDE == C_HIGH_OFFSET,
        }),
        _ => None,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Inverse of [`region_of`] for mapped registers.
    fn address_of(region: Region) -> usize {
        match region {
            Region::Header => DFH,
            Region::AcceleratorId { high: false } => AFU_ID_L,
            Region::AcceleratorId { high: true } => AFU_ID_H,
            Region::User => USER_REG,
            Region::Operand { kind, row } => operand_row(kind, row),
            Region::Result { row, high: false } => c_row_low(row),
            Region::Result { row, high: true } => c_row_high(row),
            Region::Trigger => TRIGGER,
        }
    }

    proptest! {
        /// Every decoded address encodes back to itself.
        #[test]
        fn prop_decode_then_encode_is_identity(address in 0..0x1000usize) {
            if let Some(region) = region_of(address) {
                prop_assert_eq!(address_of(region), address);
                prop_assert_eq!(address % WORD_BYTES, 0);
                prop_assert!(address < WINDOW_SIZE);
            }
        }

        /// Row addresses decode to the row they were built from.
        #[test]
        fn prop_row_addresses_decode_to_their_row(row in 0..TILE_DIM, high: bool) {
            prop_assert_eq!(
                region_of(a_row(row)),
                Some(Region::Operand { kind: RowKind::A, row })
            );
            prop_assert_eq!(
                region_of(b_row(row)),
                Some(Region::Operand { kind: RowKind::B, row })
            );
            let c = if high { c_row_high(row) } else { c_row_low(row) };
            prop_assert_eq!(region_of(c), Some(Region::Result { row, high }));
        }

        /// A and B rows never alias each other or the C words, for any pair
        /// of rows.
        #[test]
        fn prop_row_windows_disjoint(r in 0..TILE_DIM, s in 0..TILE_DIM) {
            prop_assert_ne!(a_row(r), b_row(s));
            prop_assert_ne!(c_row_low(r), c_row_high(s));
            for operand in [a_row(r), b_row(r)] {
                prop_assert_ne!(operand, c_row_low(s));
                prop_assert_ne!(operand, c_row_high(s));
                prop_assert_ne!(operand, USER_REG);
            }
        }
    }
}
