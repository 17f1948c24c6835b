//! Window function of the mask, indexed by multipole.
//!
//! The coupling sum reads `W(l3)` for `l3` up to `2·lmax`, so the supplied
//! array is right-padded with zeros to `2·lmax + 1` entries at construction.
//! Longer arrays are kept whole.

use core::f64::consts::PI;

/// Which window the coupling builder should read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WindowMode {
    /// The stored, measured window values.
    #[default]
    Measured,
    /// Analytic full sky: `4π` at `l = 0`, zero elsewhere. The coupling
    /// matrix built from it is the identity, which makes it a correctness
    /// check rather than a production input.
    FullSky,
}

/// Zero-padded window function `W_l`.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowFunction {
    values: Vec<f64>,
    lmax: usize,
}

impl WindowFunction {
    /// Wrap `values`, padding with zeros to at least `2·lmax + 1` entries.
    pub fn new(mut values: Vec<f64>, lmax: usize) -> Self {
        let required = 2 * lmax + 1;
        if values.len() < required {
            values.resize(required, 0.0);
        }
        Self { values, lmax }
    }

    /// Copying constructor from a slice.
    pub fn from_slice(values: &[f64], lmax: usize) -> Self {
        Self::new(values.to_vec(), lmax)
    }

    /// The multipole the padding was sized for.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Number of stored entries (always `≥ 2·lmax + 1`).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true: padding guarantees at least one entry.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The padded values.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Stored window value at `l`, or 0 past the end of the array.
    #[inline]
    pub fn value(&self, l: usize) -> f64 {
        self.values.get(l).copied().unwrap_or(0.0)
    }

    /// Window value at `l` under `mode`.
    #[inline]
    pub fn value_in(&self, l: usize, mode: WindowMode) -> f64 {
        match mode {
            WindowMode::Measured => self.value(l),
            WindowMode::FullSky => full_sky(l),
        }
    }
}

/// `[∫ dn̂ Y*₀₀(n̂)]² = 4π` at `l = 0`, zero otherwise.
#[inline]
pub fn full_sky(l: usize) -> f64 {
    if l == 0 { 4.0 * PI } else { 0.0 }
}
