// SPDX-License-Identifier: AGPL-3.0-only

//! Tile geometry.
//!
//! ```text
//!  operand  i8   ×8 lanes  → 1 register word   (8 bits per lane)
//!  result   i16  ×8 lanes  → 2 register words  (16 bits per lane, 4 lanes per word)
//! ```

/// Side length of the accelerator-native tile.
pub const TILE_DIM: usize = 8;

/// Side length of the default full-size problem (2 × 2 tiles).
pub const FULL_DIM: usize = 16;

/// Largest side length the host will tile (4096 × 4096 `i16` results, 32 MiB).
pub const MAX_DIM: usize = 4096;

/// Register word width in bits.
pub const WORD_BITS: u32 = 64;

/// Operand element width in bits.
pub const OPERAND_BITS: u32 = 8;

/// Result (accumulator) element width in bits.
pub const RESULT_BITS: u32 = 16;

/// Result lanes carried by one register word.
pub const RESULT_LANES_PER_WORD: usize = (WORD_BITS / RESULT_BITS) as usize;

/// Register words needed for one result row.
pub const RESULT_WORDS_PER_ROW: usize = TILE_DIM / RESULT_LANES_PER_WORD;

/// One tile row of operands.
pub type OperandRow = [i8; TILE_DIM];

/// One tile row of results.
pub type ResultRow = [i16; TILE_DIM];

/// Number of tiles along one side of a `dim × dim` matrix, or `None` when
/// `dim` does not decompose into whole tiles or exceeds [`MAX_DIM`].
#[must_use]
pub const fn tiles_per_side(dim: usize) -> Option<usize> {
    if dim == 0 || dim % TILE_DIM != 0 || dim > MAX_DIM {
        None
    } else {
        Some(dim / TILE_DIM)
    }
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn row_fits_register_words() {
        assert_eq!(TILE_DIM as u32 * OPERAND_BITS, WORD_BITS);
        assert_eq!(RESULT_LANES_PER_WORD, 4);
        assert_eq!(RESULT_WORDS_PER_ROW, 2);
    }

    #[test]
    fn full_problem_is_two_by_two_tiles() {
        assert_eq!(tiles_per_side(FULL_DIM), Some(2));
        assert_eq!(tiles_per_side(TILE_DIM), Some(1));
    }

    #[test]
    fn partial_tiles_rejected() {
        assert_eq!(tiles_per_side(0), None);
        assert_eq!(tiles_per_side(12), None);
        assert_eq!(tiles_per_side(17), None);
    }

    #[test]
    fn oversized_sides_rejected() {
        assert_eq!(tiles_per_side(MAX_DIM), Some(MAX_DIM / TILE_DIM));
        assert_eq!(tiles_per_side(MAX_DIM + TILE_DIM), None);
        assert_eq!(tiles_per_side(1 << 32), None);
        assert_eq!(tiles_per_side(usize::MAX - 7), None);
    }
}
