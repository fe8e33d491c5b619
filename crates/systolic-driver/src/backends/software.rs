// SPDX-License-Identifier: AGPL-3.0-only

//! Software (virtual accelerator) backend
//!
//! Implements `RegisterBackend` with a bit-exact model of the accelerator's
//! register file and a CPU stand-in for the systolic array. This enables:
//!
//! 1. **CI without hardware**: the whole tiling protocol runs end to end and
//!    is verified against the software reference.
//!
//! 2. **Protocol debugging**: illegal accesses (reads of write-only rows,
//!    unmapped or misaligned offsets) fail loudly here, where real hardware
//!    would silently return garbage.
//!
//! 3. **Fault injection**: `fail_after(n)` makes every access after the
//!    `n`-th fail, to exercise fail-fast handling above the backend.
//!
//! ## Compute model
//!
//! ```text
//! write 0x400 ≠ 0  →  C_tile += A_tile · B_tile     (16-bit wrapping accumulate)
//! write 0x400 = 0  →  no-op
//! ```
//!
//! The array accumulates into the C registers, which is why the host preloads
//! C before the first pass of every output tile.

use crate::backend::{BackendType, RegisterBackend};
use crate::discovery::AcceleratorId;
use crate::error::{AccelError, Result};
use systolic_chip::geometry::{ResultRow, TILE_DIM};
use systolic_chip::regs::{self, Region};
use systolic_chip::{pack_result_row, unpack_operand_row, unpack_result_row};
use tracing::{debug, trace};

/// Feature header value reported by the model: AFU type, revision 1.
const MODEL_DFH: u64 = 0x1000_0000_0000_1001;

/// Software (virtual accelerator) backend.
#[derive(Debug)]
pub struct SoftwareBackend {
    accelerator_id: AcceleratorId,
    user: u64,
    a: [u64; TILE_DIM],
    b: [u64; TILE_DIM],
    /// `(low, high)` words per C row
    c: [(u64, u64); TILE_DIM],
    passes: u64,
    ops: u64,
    fail_after: Option<u64>,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::with_id(AcceleratorId::default())
    }
}

impl SoftwareBackend {
    /// Create a zeroed accelerator that reports the default accelerator ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed accelerator that reports `accelerator_id`.
    pub fn with_id(accelerator_id: AcceleratorId) -> Self {
        Self {
            accelerator_id,
            user: 0,
            a: [0; TILE_DIM],
            b: [0; TILE_DIM],
            c: [(0, 0); TILE_DIM],
            passes: 0,
            ops: 0,
            fail_after: None,
        }
    }

    /// Fail every register access after the first `ops` succeed.
    #[must_use]
    pub fn fail_after(mut self, ops: u64) -> Self {
        self.fail_after = Some(ops);
        self
    }

    /// Number of compute passes started so far.
    pub const fn compute_passes(&self) -> u64 {
        self.passes
    }

    /// Number of successful register accesses so far.
    pub const fn register_ops(&self) -> u64 {
        self.ops
    }

    /// Decoded contents of the C registers.
    pub fn c_tile(&self) -> [ResultRow; TILE_DIM] {
        self.c.map(|(low, high)| unpack_result_row(low, high))
    }

    /// One pass of the systolic array over the loaded tiles.
    fn compute(&mut self) {
        let a = self.a.map(unpack_operand_row);
        let b = self.b.map(unpack_operand_row);
        let mut c = self.c_tile();

        for (i, c_row) in c.iter_mut().enumerate() {
            for (j, acc) in c_row.iter_mut().enumerate() {
                let dot = (0..TILE_DIM).fold(0i16, |sum, k| {
                    sum.wrapping_add(i16::from(a[i][k]).wrapping_mul(i16::from(b[k][j])))
                });
                *acc = acc.wrapping_add(dot);
            }
        }

        self.c = c.map(pack_result_row);
        self.passes += 1;
        debug!("SoftwareBackend: compute pass {} done", self.passes);
    }

    /// Decode `address` unless the link is down. Callers count the access in
    /// `ops` only once it has succeeded.
    fn admit(&self, address: usize, op: &'static str) -> Result<Region> {
        if self.fail_after.is_some_and(|limit| self.ops >= limit) {
            return Err(AccelError::RegisterAccess {
                op,
                address,
                reason: "injected link fault".to_string(),
            });
        }
        regs::region_of(address).ok_or_else(|| AccelError::RegisterAccess {
            op,
            address,
            reason: "unmapped register".to_string(),
        })
    }
}

impl RegisterBackend for SoftwareBackend {
    fn read(&mut self, address: usize) -> Result<u64> {
        let region = self.admit(address, "read")?;
        let value = match region {
            Region::Header => MODEL_DFH,
            Region::AcceleratorId { high: false } => self.accelerator_id.low(),
            Region::AcceleratorId { high: true } => self.accelerator_id.high(),
            Region::User => self.user,
            Region::Result { row, high: false } => self.c[row].0,
            Region::Result { row, high: true } => self.c[row].1,
            Region::Operand { .. } | Region::Trigger => {
                return Err(AccelError::read_failed(address, "register is write-only"));
            }
        };
        self.ops += 1;
        trace!("read  @ {address:#05x} = {value:#018x}");
        Ok(value)
    }

    fn write(&mut self, address: usize, word: u64) -> Result<()> {
        let region = self.admit(address, "write")?;
        trace!("write @ {address:#05x} = {word:#018x}");
        match region {
            Region::User => self.user = word,
            Region::Operand { kind: regs::RowKind::A, row } => self.a[row] = word,
            Region::Operand { kind: regs::RowKind::B, row } => self.b[row] = word,
            Region::Result { row, high: false } => self.c[row].0 = word,
            Region::Result { row, high: true } => self.c[row].1 = word,
            Region::Trigger => {
                if word != 0 {
                    self.compute();
                }
            }
            Region::Header | Region::AcceleratorId { .. } => {
                return Err(AccelError::write_failed(address, "register is read-only"));
            }
        }
        self.ops += 1;
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Software
    }
}
