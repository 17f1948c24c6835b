//! Dense row-major `f64` matrices and the handful of primitives the
//! deconvolution pipeline needs: products, transposed products,
//! vector-matrix products, and a Gauss-Jordan inverse.
//!
//! Storage is a single flat `Vec<f64>` with row stride = `cols`. Shapes are
//! checked on every product and reported as
//! [`DeconvolutionError::DimensionMismatch`].

use core::ops::{Index, IndexMut};

use crate::error::{DeconvolutionError, Result};

/// A dense `rows × cols` matrix of `f64`, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// Result of a successful inversion.
#[derive(Clone, Debug)]
pub struct Inverse {
    /// The inverse matrix.
    pub matrix: Matrix,
    /// Smallest pivot magnitude divided by the largest, a cheap conditioning proxy.
    pub pivot_ratio: f64,
}

impl Matrix {
    /// An all-zero `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// The `n × n` identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Wrap a flat row-major buffer. Fails if `data.len() != rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "Matrix::from_row_major",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from nested rows. Every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(DeconvolutionError::DimensionMismatch {
                    context: "Matrix::from_rows",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Borrow row `r`.
    #[inline]
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Mutably borrow row `r`.
    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// The flat row-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Copy out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }

    /// Largest absolute entry, 0 for an empty matrix.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0f64, |m, x| m.max(x.abs()))
    }

    /// `self · rhs`.
    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "Matrix::matmul",
                expected: self.cols,
                actual: rhs.rows,
            });
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            let a_row = self.row(i);
            let out_row = &mut out.data[i * rhs.cols..(i + 1) * rhs.cols];
            for (k, &a) in a_row.iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                for (o, &b) in out_row.iter_mut().zip(rhs.row(k)) {
                    *o += a * b;
                }
            }
        }
        Ok(out)
    }

    /// `self · rhsᵀ`, without materialising the transpose.
    pub fn matmul_transpose(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.cols {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "Matrix::matmul_transpose",
                expected: self.cols,
                actual: rhs.cols,
            });
        }
        let mut out = Matrix::zeros(self.rows, rhs.rows);
        for i in 0..self.rows {
            let a_row = self.row(i);
            for j in 0..rhs.rows {
                out.data[i * rhs.rows + j] = dot(a_row, rhs.row(j));
            }
        }
        Ok(out)
    }

    /// `self · v` for a column vector `v`.
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.cols {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "Matrix::mul_vec",
                expected: self.cols,
                actual: v.len(),
            });
        }
        Ok((0..self.rows).map(|r| dot(self.row(r), v)).collect())
    }

    /// `v · self` for a row vector `v`.
    pub fn vec_mul(&self, v: &[f64]) -> Result<Vec<f64>> {
        if v.len() != self.rows {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "Matrix::vec_mul",
                expected: self.rows,
                actual: v.len(),
            });
        }
        let mut out = vec![0.0; self.cols];
        for (r, &x) in v.iter().enumerate() {
            for (o, &m) in out.iter_mut().zip(self.row(r)) {
                *o += x * m;
            }
        }
        Ok(out)
    }

    /// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
    ///
    /// A pivot whose magnitude is at most `tolerance × max|aᵢⱼ|` is treated as
    /// singular. No regularisation or pseudo-inverse fallback is attempted.
    pub fn inverse(&self, tolerance: f64) -> Result<Inverse> {
        if self.rows != self.cols {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "Matrix::inverse",
                expected: self.rows,
                actual: self.cols,
            });
        }
        let n = self.rows;
        let scale = self.max_abs();
        let threshold = tolerance * scale;
        let mut a = self.clone();
        let mut inv = Matrix::identity(n);
        let mut min_pivot = f64::INFINITY;
        let mut max_pivot = 0.0f64;

        for col in 0..n {
            // Partial pivoting: largest magnitude at or below the diagonal.
            let mut best = col;
            let mut best_abs = a[(col, col)].abs();
            for r in col + 1..n {
                let v = a[(r, col)].abs();
                if v > best_abs {
                    best = r;
                    best_abs = v;
                }
            }
            if scale == 0.0 || best_abs <= threshold || !best_abs.is_finite() {
                return Err(DeconvolutionError::SingularMatrix {
                    pivot: col,
                    value: best_abs,
                });
            }
            min_pivot = min_pivot.min(best_abs);
            max_pivot = max_pivot.max(best_abs);

            if best != col {
                a.swap_rows(best, col);
                inv.swap_rows(best, col);
            }

            let p = a[(col, col)];
            for x in a.row_mut(col) {
                *x /= p;
            }
            for x in inv.row_mut(col) {
                *x /= p;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let f = a[(r, col)];
                if f == 0.0 {
                    continue;
                }
                for c in 0..n {
                    let a_cv = a.data[col * n + c];
                    a.data[r * n + c] -= f * a_cv;
                    let i_cv = inv.data[col * n + c];
                    inv.data[r * n + c] -= f * i_cv;
                }
            }
        }

        let pivot_ratio = if n == 0 { 1.0 } else { min_pivot / max_pivot };
        Ok(Inverse {
            matrix: inv,
            pivot_ratio,
        })
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.data[r * self.cols + c]
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn identity_is_its_own_inverse() {
        let inv = Matrix::identity(4).inverse(1e-12).unwrap();
        assert_eq!(inv.matrix, Matrix::identity(4));
        assert!(approx(inv.pivot_ratio, 1.0));
    }

    #[test]
    fn inverse_needs_pivoting() {
        // Zero on the leading diagonal forces a row swap.
        let m = Matrix::from_rows(&[vec![0.0, 2.0], vec![4.0, 1.0]]).unwrap();
        let inv = m.inverse(1e-12).unwrap().matrix;
        let prod = m.matmul(&inv).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!(approx(prod[(i, j)], expect), "prod[{i},{j}] = {}", prod[(i, j)]);
            }
        }
    }

    #[test]
    fn singular_matrix_is_reported() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        match m.inverse(1e-12) {
            Err(DeconvolutionError::SingularMatrix { pivot, .. }) => assert_eq!(pivot, 1),
            other => panic!("expected SingularMatrix, got {other:?}"),
        }
    }

    #[test]
    fn zero_row_is_singular() {
        let m = Matrix::from_rows(&[vec![0.0, 0.0], vec![0.0, 3.0]]).unwrap();
        assert!(matches!(
            m.inverse(1e-12),
            Err(DeconvolutionError::SingularMatrix { pivot: 0, .. })
        ));
    }

    #[test]
    fn non_square_inverse_rejected() {
        let m = Matrix::zeros(2, 3);
        assert!(matches!(
            m.inverse(1e-12),
            Err(DeconvolutionError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn vec_mul_and_mul_vec_differ_for_asymmetric() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.mul_vec(&[1.0, 1.0]).unwrap(), vec![3.0, 7.0]);
        assert_eq!(m.vec_mul(&[1.0, 1.0]).unwrap(), vec![4.0, 6.0]);
    }

    #[test]
    fn matmul_transpose_matches_explicit() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let b = Matrix::from_rows(&[vec![1.0, 0.0, 1.0]]).unwrap();
        let out = a.matmul_transpose(&b).unwrap();
        assert_eq!(out.shape(), (2, 1));
        assert_eq!(out.as_slice(), &[4.0, 10.0]);
    }

    #[test]
    fn shape_errors_are_reported() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        assert!(a.matmul(&b).is_err());
        assert!(a.mul_vec(&[1.0, 2.0]).is_err());
        assert!(a.vec_mul(&[1.0, 2.0, 3.0]).is_err());
        assert!(Matrix::from_row_major(2, 2, vec![0.0; 3]).is_err());
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }
}
