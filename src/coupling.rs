//! Full-resolution mode-coupling matrix `M_{l1 l2}`.
//!
//! ```text
//! M_{l1 l2} = 1/(4π) · Σ_{l3} (2 l2 + 1) (2 l3 + 1) (l1 l2 l3; 0 0 0)² W(l3)
//! ```
//!
//! The sum runs over `|l1 − l2| ≤ l3 ≤ l1 + l2` with `l1 + l2 + l3` even.
//! Because `l1 + l2 + |l1 − l2| = 2·max(l1, l2)` is always even, the allowed
//! `l3` are exactly every second value starting at `|l1 − l2|`; the loop steps
//! by two and never asks the 3j provider for a forbidden triple.
//!
//! This is the O(lmax³) step of the pipeline and is done once per window.
//!
//! The matrix is not symmetric: the column weight `(2 l2 + 1)` breaks it.
//! What holds is `(2 l1 + 1) M_{l1 l2} = (2 l2 + 1) M_{l2 l1}`.

use core::f64::consts::PI;

use crate::error::{check_spectrum_len, DeconvolutionError, Result};
use crate::matrix::Matrix;
use crate::wigner::Wigner3jProvider;
use crate::window::{WindowFunction, WindowMode};

/// Dense `(lmax + 1) × (lmax + 1)` mode-coupling matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CouplingMatrix {
    lmax: usize,
    matrix: Matrix,
}

impl CouplingMatrix {
    /// Evaluate the triple sum for every `(l1, l2)` in `0..=lmax`.
    pub fn build<W: Wigner3jProvider + ?Sized>(
        lmax: usize,
        window: &WindowFunction,
        mode: WindowMode,
        wigner: &W,
    ) -> Self {
        debug_assert!(
            window.len() > 2 * lmax,
            "window of length {} not padded for lmax = {lmax}",
            window.len()
        );
        let n = lmax + 1;
        let mut matrix = Matrix::zeros(n, n);
        for l1 in 0..n {
            let row = matrix.row_mut(l1);
            for (l2, entry) in row.iter_mut().enumerate() {
                let col_weight = (2 * l2 + 1) as f64;
                let mut acc = 0.0;
                for l3 in (l1.abs_diff(l2)..=l1 + l2).step_by(2) {
                    let w = wigner.w000(l1, l2, l3);
                    acc += col_weight * (2 * l3 + 1) as f64 * (w * w) * window.value_in(l3, mode);
                }
                *entry = acc / (4.0 * PI);
            }
        }
        Self { lmax, matrix }
    }

    /// Adopt a previously computed matrix. It must be `(lmax + 1)` square.
    pub fn from_matrix(lmax: usize, matrix: Matrix) -> Result<Self> {
        let n = lmax + 1;
        if matrix.rows() != n {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "CouplingMatrix::from_matrix rows",
                expected: n,
                actual: matrix.rows(),
            });
        }
        if matrix.cols() != n {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "CouplingMatrix::from_matrix cols",
                expected: n,
                actual: matrix.cols(),
            });
        }
        Ok(Self { lmax, matrix })
    }

    /// Maximum multipole.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// `M_{l1 l2}`.
    #[inline]
    pub fn get(&self, l1: usize, l2: usize) -> f64 {
        self.matrix[(l1, l2)]
    }

    /// Borrow the underlying matrix.
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// Take the underlying matrix.
    pub fn into_matrix(self) -> Matrix {
        self.matrix
    }

    /// `M · C_l`: what a full-sky spectrum looks like through the mask.
    pub fn apply(&self, cl: &[f64]) -> Result<Vec<f64>> {
        check_spectrum_len(self.lmax, cl)?;
        self.matrix.mul_vec(cl)
    }
}
