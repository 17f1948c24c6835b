//! Binning operators that compress per-multipole quantities into bandpowers.
//!
//! [`Binning`] is the uniform scheme the decoupler uses: contiguous blocks of
//! `lper_bin` multipoles, with two operators sharing the same boundaries:
//!
//! - `bins`: each row averages its block (`1 / lper_bin` per entry);
//! - `bins_no_weight`: each row is a 0/1 indicator of its block.
//!
//! The monopole is dropped from both (`[0, 0] = 0`). Multipoles past the last
//! full block are not binned.
//!
//! [`binning_matrix`] is the stand-alone variable-width generator (linear or
//! square-root growth, starting at `l = 2`), kept for external use.

use core::fmt;
use core::str::FromStr;

use crate::error::{check_spectrum_len, DeconvolutionError, Result};
use crate::matrix::Matrix;

/// Uniform bandpower binning for a fixed `lmax` and bin width.
#[derive(Clone, Debug, PartialEq)]
pub struct Binning {
    lmax: usize,
    lper_bin: usize,
    bins: Matrix,
    bins_no_weight: Matrix,
    binned_ells: Vec<f64>,
}

impl Binning {
    /// Build both operators and the bin centres.
    ///
    /// Fails with [`DeconvolutionError::InvalidBinWidth`] when `lper_bin` is
    /// zero or wider than `lmax + 1` (no bins at all).
    pub fn new(lmax: usize, lper_bin: usize) -> Result<Self> {
        let nl = lmax + 1;
        if lper_bin == 0 || lper_bin > nl {
            return Err(DeconvolutionError::InvalidBinWidth(lper_bin));
        }
        let n_bins = nl / lper_bin;
        let mut bins = Matrix::zeros(n_bins, nl);
        let mut bins_no_weight = Matrix::zeros(n_bins, nl);
        let weight = 1.0 / lper_bin as f64;
        for b in 0..n_bins {
            let start = b * lper_bin;
            for l in start..start + lper_bin {
                bins[(b, l)] = weight;
                bins_no_weight[(b, l)] = 1.0;
            }
        }
        // Drop the monopole from the first bin's average and sum.
        bins[(0, 0)] = 0.0;
        bins_no_weight[(0, 0)] = 0.0;

        let ells: Vec<f64> = (0..nl).map(|l| l as f64).collect();
        let binned_ells = bins.mul_vec(&ells)?;

        Ok(Self {
            lmax,
            lper_bin,
            bins,
            bins_no_weight,
            binned_ells,
        })
    }

    /// Maximum multipole covered.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Bin width.
    pub fn lper_bin(&self) -> usize {
        self.lper_bin
    }

    /// Number of bandpowers, `(lmax + 1) / lper_bin`.
    pub fn n_bins(&self) -> usize {
        self.bins.rows()
    }

    /// The averaging operator, `n_bins × (lmax + 1)`.
    pub fn bins(&self) -> &Matrix {
        &self.bins
    }

    /// The 0/1 summing operator, `n_bins × (lmax + 1)`.
    pub fn bins_no_weight(&self) -> &Matrix {
        &self.bins_no_weight
    }

    /// Weighted-average multipole of each bin.
    pub fn binned_ells(&self) -> &[f64] {
        &self.binned_ells
    }

    /// `Cb = bins · C_l`.
    pub fn bin_cls(&self, cl: &[f64]) -> Result<Vec<f64>> {
        check_spectrum_len(self.lmax, cl)?;
        bin_cls(&self.bins, cl)
    }

    /// `Mbb = bins · M · bins_no_weightᵀ`.
    pub fn bin_matrix(&self, m: &Matrix) -> Result<Matrix> {
        bin_matrix(&self.bins, &self.bins_no_weight, m)
    }
}

/// `bins · M · bins_no_weightᵀ`: average over incoming multipoles, sum over
/// outgoing ones.
pub fn bin_matrix(bins: &Matrix, bins_no_weight: &Matrix, m: &Matrix) -> Result<Matrix> {
    bins.matmul(m)?.matmul_transpose(bins_no_weight)
}

/// `bins · C_l`.
pub fn bin_cls(bins: &Matrix, cl: &[f64]) -> Result<Vec<f64>> {
    bins.mul_vec(cl)
}

// ─── Variable-width binning ──────────────────────────────────────────────────

/// Growth rule for [`binning_matrix`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinningScheme {
    /// Every bin is `step` wide.
    Linear,
    /// A bin starting at `l` is `ceil(sqrt(4 l) + step)` wide.
    Sqrt,
}

impl BinningScheme {
    /// Width of the bin that starts at `ell`.
    pub fn width(self, ell: usize, step: usize) -> usize {
        match self {
            Self::Linear => step,
            Self::Sqrt => ((4.0 * ell as f64).sqrt() + step as f64).ceil() as usize,
        }
    }

    /// Lower-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sqrt => "sqrt",
        }
    }
}

impl FromStr for BinningScheme {
    type Err = DeconvolutionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Self::Linear),
            "sqrt" => Ok(Self::Sqrt),
            other => Err(DeconvolutionError::UnknownBinningScheme(other.to_string())),
        }
    }
}

impl fmt::Display for BinningScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variable-width averaging operator over `0..=lmax`.
///
/// Bins start at `l = 2` (monopole and dipole excluded) and keep growing by
/// [`BinningScheme::width`] while the next boundary stays within `lmax + 1`.
/// Each row holds `1 / width` across its block. Only the averaging operator
/// is produced; there is no unweighted twin or bin-centre vector.
pub fn binning_matrix(lmax: usize, scheme: BinningScheme, step: usize) -> Result<Matrix> {
    if scheme == BinningScheme::Linear && step == 0 {
        return Err(DeconvolutionError::InvalidBinWidth(step));
    }
    let nl = lmax + 1;
    let mut edges = Vec::new();
    let mut l0 = 2usize;
    // Edges that overflow are past `nl` by definition.
    while let Some(l1) = l0
        .checked_add(scheme.width(l0, step))
        .filter(|&l1| l1 <= nl)
    {
        edges.push((l0, l1));
        l0 = l1;
    }

    let mut bins = Matrix::zeros(edges.len(), nl);
    for (row, &(lo, hi)) in edges.iter().enumerate() {
        let w = 1.0 / (hi - lo) as f64;
        for x in &mut bins.row_mut(row)[lo..hi] {
            *x = w;
        }
    }
    Ok(bins)
}
