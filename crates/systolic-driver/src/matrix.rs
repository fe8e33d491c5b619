// SPDX-License-Identifier: AGPL-3.0-only

//! Square row-major matrices owned by a single run
//!
//! Operands are `Matrix<i8>`, results `Matrix<i16>`. Tiles are never copied
//! out: the controller reads and writes `TILE_DIM`-wide slices in place.

use rand::Rng;
use std::ops::{Index, IndexMut};

/// Square matrix of side `dim`, stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix<T> {
    dim: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Matrix<T> {
    /// All-default (zero) matrix
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![T::default(); dim * dim],
        }
    }
}

impl<T> Matrix<T> {
    /// Build element-wise from `f(row, col)`
    pub fn from_fn(dim: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let data = (0..dim * dim).map(|i| f(i / dim, i % dim)).collect();
        Self { dim, data }
    }

    /// Side length
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Full row `r`
    pub fn row(&self, r: usize) -> &[T] {
        &self.data[r * self.dim..(r + 1) * self.dim]
    }

    /// `len` elements of row `r` starting at column `col`
    pub fn row_segment(&self, r: usize, col: usize, len: usize) -> &[T] {
        &self.row(r)[col..col + len]
    }

    /// Mutable `len` elements of row `r` starting at column `col`
    pub fn row_segment_mut(&mut self, r: usize, col: usize, len: usize) -> &mut [T] {
        let start = r * self.dim + col;
        &mut self.data[start..start + len]
    }

    /// Iterate rows
    pub fn rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.dim.max(1))
    }
}

impl Matrix<i8> {
    /// Uniformly random operands over the full `i8` range
    pub fn random<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Self {
        Self::from_fn(dim, |_, _| rng.random::<i8>())
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (r, c): (usize, usize)) -> &T {
        assert!(c < self.dim, "column {c} out of range for dim {}", self.dim);
        &self.data[r * self.dim + c]
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut T {
        assert!(c < self.dim, "column {c} out of range for dim {}", self.dim);
        &mut self.data[r * self.dim + c]
    }
}
