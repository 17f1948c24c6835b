//! # maskdecon
//!
//! Mode-coupling deconvolution of angular power spectra measured on a partial
//! or weighted sky.
//!
//! ---
//!
//! A mask couples multipoles: the pseudo-Cl measured through it is
//! `⟨C̃_l⟩ = Σ_l' M_{l l'} C_l'`. Given the mask's window function `W_l`, this
//! crate builds `M` from Wigner 3j symbols, bins it and the observed spectrum
//! into bandpowers, and inverts the binned matrix to recover decoupled
//! bandpowers.
//!
//! ## The pipeline
//!
//! ```text
//! W_l ──► WindowFunction ──► CouplingMatrix (O(lmax³), once)
//!                                   │
//!          lper_bin ──► Binning ──► Mbb = bins·M·bins_nwᵀ ──► Mbb⁻¹ (cached)
//!                                                               │
//!          C_l ──► Cb = bins·C_l ─────────────────────► Cb·Mbb⁻¹ ──► Bandpowers
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`wigner`] | [`Wigner3jProvider`], [`Wigner3j000`], [`CachedWigner`], [`FallibleWigner`] | `(l1 l2 l3; 0 0 0)` symbols |
//! | [`window`] | [`WindowFunction`], [`WindowMode`] | Zero-padded window, full-sky check mode |
//! | [`coupling`] | [`CouplingMatrix`] | The triple sum over selection-rule-allowed `l3` |
//! | [`binning`] | [`Binning`], [`BinningScheme`] | Uniform and variable-width bandpower operators |
//! | [`decouple`] | [`MaskDeconvolution`], [`Bandpowers`] | Binned inversion, decoupling, theory convolution |
//! | [`matrix`] | [`Matrix`] | Dense row-major `f64` products and inverse |
//! | [`error`] | [`DeconvolutionError`] | Shape, ordering and singularity errors |
//! | `snapshot` | `CouplingSnapshot`, `BandpowerSnapshot` | Persistence (requires `serde` feature) |
//! | `ffi` | `PyMaskDeconvolution` | Python bindings (requires `python-ffi` feature) |
//!
//! ## Example
//!
//! ```rust
//! use maskdecon::{DeconvolutionConfig, MaskDeconvolution};
//!
//! let lmax = 15;
//! let w_l: Vec<f64> = (0..=2 * lmax).map(|l| 7.5 * (-(l as f64) / 4.0).exp()).collect();
//! let config = DeconvolutionConfig { verbose: false, ..Default::default() };
//! let mut md = MaskDeconvolution::with_config(lmax, &w_l, config);
//!
//! let cl = vec![1.0; lmax + 1];
//! let bp = md.deconvolve(&cl, 4).unwrap();
//! assert_eq!(bp.len(), 4);
//!
//! let conv = md.convolve_theory(&cl).unwrap();
//! assert_eq!(conv.len(), 4);
//! ```
//!
//! ## Logging
//!
//! Progress and conditioning diagnostics go through the [`log`] facade; install
//! any logger to see them.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod binning;
pub mod coupling;
pub mod decouple;
pub mod error;
pub mod matrix;
pub mod wigner;
pub mod window;
#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use binning::{binning_matrix, Binning, BinningScheme};
pub use coupling::CouplingMatrix;
pub use decouple::{Bandpowers, BinningState, DeconvolutionConfig, MaskDeconvolution};
pub use error::{DeconvolutionError, Result};
pub use matrix::Matrix;
pub use wigner::{CachedWigner, FallibleWigner, Wigner3j000, Wigner3jProvider};
pub use window::{WindowFunction, WindowMode};
