// SPDX-License-Identifier: AGPL-3.0-only

//! Row ⇄ register-word codec.
//!
//! Operand rows: lane `t` occupies bits `t*8 .. t*8+8` of a single word.
//!
//! Result rows: lane `t` lives in word `t / 4` at bit offset `(t*16) % 64`,
//! so lanes 0-3 go to the low word and lanes 4-7 to the high word.
//!
//! Every function here is total: rows are fixed-length arrays and every bit
//! pattern of a lane is a valid value.

// Lane extraction reinterprets bits between signed and unsigned widths
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::geometry::{
    OperandRow, ResultRow, OPERAND_BITS, RESULT_BITS, RESULT_LANES_PER_WORD, TILE_DIM, WORD_BITS,
};

const OPERAND_MASK: u64 = (1 << OPERAND_BITS) - 1;
const RESULT_MASK: u64 = (1 << RESULT_BITS) - 1;

/// Word index and bit offset of result lane `lane`.
#[must_use]
pub const fn result_lane_position(lane: usize) -> (usize, u32) {
    (
        lane / RESULT_LANES_PER_WORD,
        (lane as u32 * RESULT_BITS) % WORD_BITS,
    )
}

/// Pack one operand row into a register word.
#[must_use]
pub fn pack_operand_row(values: OperandRow) -> u64 {
    values.iter().enumerate().fold(0u64, |word, (t, &v)| {
        // `as u8` keeps the two's-complement low byte
        word | ((u64::from(v as u8) & OPERAND_MASK) << (t as u32 * OPERAND_BITS))
    })
}

/// Unpack an operand row from a register word.
#[must_use]
pub fn unpack_operand_row(word: u64) -> OperandRow {
    let mut row = [0i8; TILE_DIM];
    for (t, lane) in row.iter_mut().enumerate() {
        *lane = ((word >> (t as u32 * OPERAND_BITS)) & OPERAND_MASK) as u8 as i8;
    }
    row
}

/// Pack one result row into its `(low, high)` register words.
#[must_use]
pub fn pack_result_row(values: ResultRow) -> (u64, u64) {
    let mut words = [0u64; 2];
    for (lane, &v) in values.iter().enumerate() {
        let (word, shift) = result_lane_position(lane);
        words[word] |= (u64::from(v as u16) & RESULT_MASK) << shift;
    }
    (words[0], words[1])
}

/// Unpack one result row from its `(low, high)` register words.
#[must_use]
pub fn unpack_result_row(low: u64, high: u64) -> ResultRow {
    let words = [low, high];
    let mut row = [0i16; TILE_DIM];
    for (lane, value) in row.iter_mut().enumerate() {
        let (word, shift) = result_lane_position(lane);
        *value = ((words[word] >> shift) & RESULT_MASK) as u16 as i16;
    }
    row
}
