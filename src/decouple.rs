//! Mode decoupling of binned pseudo-Cls.
//!
//! [`MaskDeconvolution`] owns the expensive, immutable part of the pipeline
//! (the window and the full-resolution coupling matrix, computed once at
//! construction) and a [`BinningState`] that is rebuilt from scratch every
//! time a bin width is installed.
//!
//! ```text
//! new(lmax, W_l)             M_{l1 l2}                       O(lmax³), once
//! set_binning(lper_bin)      bins, Mbb = bins·M·bins_nwᵀ, Mbb⁻¹
//! decouple(C_l)              Cb = bins·C_l,  Cb·Mbb⁻¹
//! convolve_theory(C_l^th)    (bins·(M·C_l^th))·Mbb⁻¹
//! ```
//!
//! The decoupled bandpowers are the *row* vector `Cb` times `Mbb⁻¹`; the order
//! matters because `Mbb⁻¹` is not symmetric in general.
//!
//! An instance is single-owner: `set_binning` followed by `decouple` /
//! `convolve_theory` share the cached inverse.

use log::{debug, info, warn};

use crate::binning::{binning_matrix, Binning, BinningScheme};
use crate::coupling::CouplingMatrix;
use crate::error::{check_spectrum_len, DeconvolutionError, Result};
use crate::matrix::Matrix;
use crate::wigner::{Wigner3j000, Wigner3jProvider};
use crate::window::{WindowFunction, WindowMode};

// ─── DeconvolutionConfig ─────────────────────────────────────────────────────

/// Configuration parameters for [`MaskDeconvolution`].
#[derive(Clone, Debug, PartialEq)]
pub struct DeconvolutionConfig {
    /// Report construction progress at `info` level instead of `debug`. Default: true.
    pub verbose: bool,

    /// Relative pivot size (against the largest `|Mbb|` entry) at or below
    /// which inversion fails as singular. Default: 1e-12.
    pub singular_tolerance: f64,

    /// Smallest-to-largest pivot ratio below which a poorly conditioned
    /// `Mbb` is logged at `warn`. Default: 1e-10.
    pub conditioning_warning: f64,

    /// Window used to build the coupling matrix. Default: [`WindowMode::Measured`].
    pub window_mode: WindowMode,
}

impl Default for DeconvolutionConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            singular_tolerance: 1e-12,
            conditioning_warning: 1e-10,
            window_mode: WindowMode::Measured,
        }
    }
}

// ─── BinningState ────────────────────────────────────────────────────────────

/// Cached per-bin-width artefacts.
#[derive(Clone, Debug)]
pub enum BinningState {
    /// No bin width installed yet; decoupling and convolution are refused.
    Unset,
    /// A bin width is installed and its binned coupling inverse is cached.
    Ready {
        /// Operators and bin centres.
        binning: Binning,
        /// `bins · M · bins_no_weightᵀ`.
        mbb: Matrix,
        /// `Mbb⁻¹`.
        mbb_inv: Matrix,
    },
}

impl BinningState {
    /// Returns `true` once a bin width has been installed successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

// ─── Bandpowers ──────────────────────────────────────────────────────────────

/// Decoupled bandpowers and the multipoles they sit at, in ascending bin order.
#[derive(Clone, Debug, PartialEq)]
pub struct Bandpowers {
    /// Bin width used.
    pub lper_bin: usize,
    /// Weighted-average multipole of each bin.
    pub ells: Vec<f64>,
    /// Mode-decoupled bandpower of each bin.
    pub values: Vec<f64>,
}

impl Bandpowers {
    /// Number of bins.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if there are no bins.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(ell, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ells.iter().copied().zip(self.values.iter().copied())
    }
}

/// `Cb · Mbb⁻¹` with `Cb` as a row vector.
pub fn decouple_cls(mbb_inv: &Matrix, cb: &[f64]) -> Result<Vec<f64>> {
    mbb_inv.vec_mul(cb)
}

// ─── MaskDeconvolution ───────────────────────────────────────────────────────

/// Decouples pseudo-Cl bandpowers measured through a mask.
///
/// The coupling matrix is computed once in the constructor and reused for
/// every subsequent bin width and spectrum.
#[derive(Clone, Debug)]
pub struct MaskDeconvolution {
    lmax: usize,
    window: WindowFunction,
    coupling: CouplingMatrix,
    config: DeconvolutionConfig,
    state: BinningState,
}

impl MaskDeconvolution {
    /// Build with [`DeconvolutionConfig::default`] and the built-in 3j generator.
    pub fn new(lmax: usize, window: &[f64]) -> Self {
        Self::with_config(lmax, window, DeconvolutionConfig::default())
    }

    /// Build with an explicit configuration and the built-in 3j generator.
    pub fn with_config(lmax: usize, window: &[f64], config: DeconvolutionConfig) -> Self {
        progress(config.verbose, "precomputing Wigner 3j symbols");
        // Triples reach l3 = 2·lmax.
        let wigner = Wigner3j000::new(2 * lmax);
        Self::with_provider(lmax, window, config, &wigner)
    }

    /// Build with an external 3j generator.
    pub fn with_provider<W: Wigner3jProvider + ?Sized>(
        lmax: usize,
        window: &[f64],
        config: DeconvolutionConfig,
        wigner: &W,
    ) -> Self {
        let window = WindowFunction::from_slice(window, lmax);
        progress(config.verbose, "computing the mode-coupling matrix");
        let coupling = CouplingMatrix::build(lmax, &window, config.window_mode, wigner);
        progress(config.verbose, "mode-coupling matrix ready");
        debug!("coupling matrix: lmax = {lmax}, window length = {}", window.len());
        Self {
            lmax,
            window,
            coupling,
            config,
            state: BinningState::Unset,
        }
    }

    /// Adopt a previously computed coupling matrix instead of rebuilding it.
    pub fn from_coupling_matrix(
        lmax: usize,
        window: &[f64],
        matrix: Matrix,
        config: DeconvolutionConfig,
    ) -> Result<Self> {
        let coupling = CouplingMatrix::from_matrix(lmax, matrix)?;
        debug!("coupling matrix restored: lmax = {lmax}");
        Ok(Self {
            lmax,
            window: WindowFunction::from_slice(window, lmax),
            coupling,
            config,
            state: BinningState::Unset,
        })
    }

    // ── accessors ─────────────────────────────────────────────────────────

    /// Maximum multipole.
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// The padded window function.
    pub fn window(&self) -> &WindowFunction {
        &self.window
    }

    /// Window value at `l`; `FullSky` gives the analytic identity-producing window.
    pub fn window_value(&self, l: usize, mode: WindowMode) -> f64 {
        self.window.value_in(l, mode)
    }

    /// The full-resolution coupling matrix.
    pub fn coupling_matrix(&self) -> &CouplingMatrix {
        &self.coupling
    }

    /// Active configuration.
    pub fn config(&self) -> &DeconvolutionConfig {
        &self.config
    }

    /// Current binning state.
    pub fn state(&self) -> &BinningState {
        &self.state
    }

    /// The installed binning, if any.
    pub fn binning(&self) -> Option<&Binning> {
        match &self.state {
            BinningState::Ready { binning, .. } => Some(binning),
            BinningState::Unset => None,
        }
    }

    /// The cached binned coupling matrix, if any.
    pub fn binned_coupling(&self) -> Option<&Matrix> {
        match &self.state {
            BinningState::Ready { mbb, .. } => Some(mbb),
            BinningState::Unset => None,
        }
    }

    /// The cached `Mbb⁻¹`, if any.
    pub fn binned_inverse(&self) -> Option<&Matrix> {
        match &self.state {
            BinningState::Ready { mbb_inv, .. } => Some(mbb_inv),
            BinningState::Unset => None,
        }
    }

    // ── operations ────────────────────────────────────────────────────────

    /// Install a uniform bin width: rebuild the operators, bin `M`, invert it.
    ///
    /// Any previously cached inverse is discarded first, so a failure leaves
    /// the instance in [`BinningState::Unset`].
    pub fn set_binning(&mut self, lper_bin: usize) -> Result<()> {
        self.state = BinningState::Unset;

        let binning = Binning::new(self.lmax, lper_bin)?;
        debug!("binning: lper_bin = {lper_bin}, n_bins = {}", binning.n_bins());

        let mbb = binning.bin_matrix(self.coupling.matrix())?;
        let inverse = mbb.inverse(self.config.singular_tolerance)?;
        debug!(
            "inverted {0}x{0} binned coupling matrix, pivot ratio {1:e}",
            mbb.rows(),
            inverse.pivot_ratio
        );
        if inverse.pivot_ratio < self.config.conditioning_warning {
            warn!(
                "binned coupling matrix poorly conditioned for lper_bin = {lper_bin} (pivot ratio {:e})",
                inverse.pivot_ratio
            );
        }

        self.state = BinningState::Ready {
            binning,
            mbb,
            mbb_inv: inverse.matrix,
        };
        Ok(())
    }

    /// Decouple an observed spectrum with the installed binning.
    pub fn decouple(&self, cl: &[f64]) -> Result<Bandpowers> {
        check_spectrum_len(self.lmax, cl)?;
        let BinningState::Ready { binning, mbb_inv, .. } = &self.state else {
            return Err(DeconvolutionError::BinningNotSet);
        };
        let cb = binning.bin_cls(cl)?;
        let values = decouple_cls(mbb_inv, &cb)?;
        Ok(Bandpowers {
            lper_bin: binning.lper_bin(),
            ells: binning.binned_ells().to_vec(),
            values,
        })
    }

    /// Install `lper_bin` and decouple `cl` in one call.
    ///
    /// The spectrum length is checked before any binning work is done.
    pub fn deconvolve(&mut self, cl: &[f64], lper_bin: usize) -> Result<Bandpowers> {
        check_spectrum_len(self.lmax, cl)?;
        self.set_binning(lper_bin)?;
        self.decouple(cl)
    }

    /// Push a theory spectrum through the mask and back out:
    /// `(bins · (M · C_l^th)) · Mbb⁻¹`.
    ///
    /// Requires a prior [`Self::set_binning`] or [`Self::deconvolve`].
    pub fn convolve_theory(&self, clt: &[f64]) -> Result<Vec<f64>> {
        let BinningState::Ready { binning, mbb_inv, .. } = &self.state else {
            return Err(DeconvolutionError::BinningNotSet);
        };
        let coupled = self.coupling.apply(clt)?;
        let cb = binning.bin_cls(&coupled)?;
        decouple_cls(mbb_inv, &cb)
    }

    /// Variable-width averaging operator over this instance's `lmax`.
    pub fn binning_matrix(&self, scheme: BinningScheme, step: usize) -> Result<Matrix> {
        binning_matrix(self.lmax, scheme, step)
    }
}

fn progress(verbose: bool, msg: &str) {
    if verbose {
        info!("{msg}");
    } else {
        debug!("{msg}");
    }
}
