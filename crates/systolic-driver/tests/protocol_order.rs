// SPDX-License-Identifier: AGPL-3.0-only

//! Register-level protocol ordering of the tiling controller

mod common;

use common::{Access, Recording};
use systolic_driver::chip::regs;
use systolic_driver::chip::{FULL_DIM, TILE_DIM};
use systolic_driver::{AccelError, BlockTiling, Matrix, SoftwareBackend};

fn run_recorded(dim: usize) -> Vec<Access> {
    let a = Matrix::from_fn(dim, |r, c| i8::try_from((r + 2 * c) % 9).unwrap());
    let b = Matrix::from_fn(dim, |r, c| i8::try_from((3 * r + c) % 7).unwrap() - 3);
    let mut rec = Recording::default();
    BlockTiling::new(dim).unwrap().multiply(&mut rec, &a, &b).unwrap();
    rec.log
}

fn expected_tile_sequence(blocks: usize) -> Vec<(Access, bool)> {
    // (access with address only, whether the payload is ignored)
    let mut seq = Vec::new();
    for r in 0..TILE_DIM {
        seq.push((Access::Write(regs::c_row_low(r), 0), true));
        seq.push((Access::Write(regs::c_row_high(r), 0), true));
    }
    for _ in 0..blocks {
        for r in 0..TILE_DIM {
            seq.push((Access::Write(regs::a_row(r), 0), true));
        }
        for r in 0..TILE_DIM {
            seq.push((Access::Write(regs::b_row(r), 0), true));
        }
        seq.push((Access::Write(regs::TRIGGER, regs::TRIGGER_START), false));
    }
    for r in 0..TILE_DIM {
        seq.push((Access::Read(regs::c_row_low(r)), false));
        seq.push((Access::Read(regs::c_row_high(r)), false));
    }
    seq
}

fn same_access(actual: Access, expected: Access, ignore_payload: bool) -> bool {
    match (actual, expected) {
        (Access::Write(a, _), Access::Write(e, _)) if ignore_payload => a == e,
        _ => actual == expected,
    }
}

#[test]
fn every_tile_follows_preload_load_trigger_drain() {
    let blocks = FULL_DIM / TILE_DIM;
    let log = run_recorded(FULL_DIM);
    let per_tile = expected_tile_sequence(blocks);

    assert_eq!(log.len(), per_tile.len() * blocks * blocks);
    for (tile, chunk) in log.chunks(per_tile.len()).enumerate() {
        for (i, (&actual, &(expected, ignore))) in chunk.iter().zip(&per_tile).enumerate() {
            assert!(
                same_access(actual, expected, ignore),
                "tile {tile}, access {i}: got {actual:?}, expected {expected:?}"
            );
        }
    }
}

#[test]
fn preload_writes_zero_seed() {
    let log = run_recorded(FULL_DIM);
    let preload = &log[..2 * TILE_DIM];
    let results = regs::C_ROW_BASE..regs::TRIGGER;
    assert!(preload
        .iter()
        .all(|a| matches!(a, Access::Write(addr, 0) if results.contains(addr))));
}

#[test]
fn trigger_count_is_tiles_times_inner_blocks() {
    for dim in [TILE_DIM, FULL_DIM, 24] {
        let blocks = dim / TILE_DIM;
        let triggers = run_recorded(dim)
            .iter()
            .filter(|a| matches!(a, Access::Write(regs::TRIGGER, _)))
            .count();
        assert_eq!(triggers, blocks * blocks * blocks, "dim {dim}");
    }
}

#[test]
fn no_reads_before_first_trigger() {
    let log = run_recorded(FULL_DIM);
    let first_trigger = log
        .iter()
        .position(|a| matches!(a, Access::Write(regs::TRIGGER, _)))
        .unwrap();
    assert!(log[..first_trigger].iter().all(|a| matches!(a, Access::Write(..))));
}

#[test]
fn user_register_untouched_by_tiling() {
    let log = run_recorded(FULL_DIM);
    assert!(!log.iter().any(|a| matches!(
        a,
        Access::Read(regs::USER_REG) | Access::Write(regs::USER_REG, _)
    )));
}

#[test]
fn fault_mid_run_stops_all_traffic() {
    let a = Matrix::from_fn(FULL_DIM, |_, _| 1i8);
    let mut rec = Recording {
        inner: SoftwareBackend::new().fail_after(50),
        log: Vec::new(),
    };
    let err = BlockTiling::new(FULL_DIM).unwrap().multiply(&mut rec, &a, &a).unwrap_err();
    assert!(matches!(err, AccelError::RegisterAccess { .. }));
    assert_eq!(rec.log.len(), 50, "no access may follow the failed one");
}
