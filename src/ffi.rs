//! Python FFI bindings via PyO3.
//!
//! Exposes [`MaskDeconvolution`] to Python with the same call shape as the
//! familiar `MaskDeconvolution(lmax, W_l)` class: construct once (the expensive
//! coupling matrix is built here), then call it with a spectrum and a bin width.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from maskdecon import MaskDeconvolution
//!
//! md = MaskDeconvolution(lmax, W_l, verbose=False)
//! ells, Cb = md(C_l, 16)                 # decoupled bandpowers
//! Cb_th = md.convolve_theory_Cls(C_th)   # theory through the same pipeline
//! B = md.binning_matrix("sqrt", 4)       # variable-width averaging operator
//! ```
//!
//! Spectra and matrices cross the boundary as lists of floats. A Python
//! callable `w3j(l1, l2, l3)` may replace the built-in 3j generator; its
//! results are memoised so each distinct triple is requested once, and the
//! first exception it raises stops further calls and is re-raised.

#![allow(non_snake_case)]

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::binning::BinningScheme;
use crate::coupling::CouplingMatrix;
use crate::decouple::{DeconvolutionConfig, MaskDeconvolution};
use crate::error::DeconvolutionError;
use crate::wigner::{CachedWigner, FallibleWigner, Wigner3j000};
use crate::window::WindowMode;

fn to_py_err(e: DeconvolutionError) -> PyErr {
    match e {
        DeconvolutionError::BinningNotSet => PyRuntimeError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

fn window_mode(debug: bool) -> WindowMode {
    if debug { WindowMode::FullSky } else { WindowMode::Measured }
}

/// Mode-decoupling of pseudo-Cls induced by a sky mask.
///
/// Args:
///     lmax:    maximum multipole of the coupling matrix
///     W_l:     window function per multipole; zero-padded to 2*lmax+1
///     verbose: log construction progress at info level (default True)
///     w3j:     optional callable (l1, l2, l3) -> float returning (l1 l2 l3; 0 0 0)
#[pyclass(name = "MaskDeconvolution")]
pub struct PyMaskDeconvolution {
    inner: MaskDeconvolution,
}

#[pymethods]
impl PyMaskDeconvolution {
    /// Build the coupling matrix. This is the expensive step.
    #[new]
    #[pyo3(signature = (lmax, W_l, verbose=true, w3j=None))]
    pub fn new(
        lmax: usize,
        W_l: Vec<f64>,
        verbose: bool,
        w3j: Option<Bound<'_, PyAny>>,
    ) -> PyResult<Self> {
        let config = DeconvolutionConfig {
            verbose,
            ..DeconvolutionConfig::default()
        };
        let inner = match w3j {
            None => MaskDeconvolution::with_config(lmax, &W_l, config),
            Some(func) => {
                let call = |l1: usize, l2: usize, l3: usize| -> PyResult<f64> {
                    func.call1((l1, l2, l3))?.extract::<f64>()
                };
                let cached = CachedWigner::new(FallibleWigner::new(call));
                let md = MaskDeconvolution::with_provider(lmax, &W_l, config, &cached);
                if let Some(e) = cached.into_inner().into_error() {
                    return Err(e);
                }
                md
            }
        };
        Ok(Self { inner })
    }

    /// Decouple C_l with bins of width lperBin.
    ///
    /// Returns:
    ///     (binned_ells, decoupled_bandpowers)
    pub fn __call__(&mut self, C_l: Vec<f64>, lperBin: usize) -> PyResult<(Vec<f64>, Vec<f64>)> {
        let bp = self.inner.deconvolve(&C_l, lperBin).map_err(to_py_err)?;
        Ok((bp.ells, bp.values))
    }

    /// Push theory Cls through the coupling, binning and decoupling of the last call.
    ///
    /// Raises RuntimeError if the instance has not been called yet.
    pub fn convolve_theory_Cls(&self, Clt: Vec<f64>) -> PyResult<Vec<f64>> {
        self.inner.convolve_theory(&Clt).map_err(to_py_err)
    }

    /// Window function at multipole l; debug=True gives the full-sky window.
    #[pyo3(signature = (l, debug=false))]
    pub fn W(&self, l: usize, debug: bool) -> f64 {
        self.inner.window_value(l, window_mode(debug))
    }

    /// The mode-coupling matrix as nested lists.
    ///
    /// debug=True recomputes it for the full sky, which must be the identity.
    #[pyo3(signature = (debug=false))]
    pub fn get_M(&self, debug: bool) -> Vec<Vec<f64>> {
        if !debug {
            return self.inner.coupling_matrix().matrix().to_rows();
        }
        let lmax = self.inner.lmax();
        let wigner = Wigner3j000::new(2 * lmax);
        CouplingMatrix::build(lmax, self.inner.window(), WindowMode::FullSky, &wigner)
            .matrix()
            .to_rows()
    }

    /// Variable-width averaging operator ('linear' or 'sqrt').
    #[pyo3(signature = (r#type="linear", step=16))]
    pub fn binning_matrix(&self, r#type: &str, step: usize) -> PyResult<Vec<Vec<f64>>> {
        let scheme: BinningScheme = r#type.parse().map_err(to_py_err)?;
        let m = self.inner.binning_matrix(scheme, step).map_err(to_py_err)?;
        Ok(m.to_rows())
    }

    /// Maximum multipole.
    #[getter]
    pub fn lmax(&self) -> usize {
        self.inner.lmax()
    }

    /// The mode-coupling matrix as nested lists.
    #[getter]
    pub fn Mll(&self) -> Vec<Vec<f64>> {
        self.inner.coupling_matrix().matrix().to_rows()
    }

    /// Bin-centre multipoles of the last call, or None.
    #[getter]
    pub fn binned_ells(&self) -> Option<Vec<f64>> {
        self.inner.binning().map(|b| b.binned_ells().to_vec())
    }

    /// Inverse binned coupling matrix of the last call, or None.
    #[getter]
    pub fn Mbb_inv(&self) -> Option<Vec<Vec<f64>>> {
        self.inner.binned_inverse().map(|m| m.to_rows())
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        match self.inner.binning() {
            Some(b) => format!(
                "MaskDeconvolution(lmax={}, lperBin={})",
                self.inner.lmax(),
                b.lper_bin()
            ),
            None => format!("MaskDeconvolution(lmax={})", self.inner.lmax()),
        }
    }
}

// ── Module entry point ────────────────────────────────────────────────────────

/// Mode-coupling deconvolution of masked-sky angular power spectra.
#[pymodule]
pub fn maskdecon(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMaskDeconvolution>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
