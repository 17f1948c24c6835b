//! End-to-end tests for the deconvolution pipeline.
//!
//! Covers the full-sky identity, the column-weighted symmetry of the coupling
//! matrix, the `l1 = 0` closed form, binning conservation and bin centres,
//! decoupling with an identity coupling, call-order enforcement and the
//! spectrum length contract.

use std::f64::consts::PI;

use maskdecon::{
    Binning, CouplingMatrix, DeconvolutionConfig, DeconvolutionError, MaskDeconvolution,
    Wigner3j000, Wigner3jProvider, WindowFunction, WindowMode,
};

// ─── helpers ─────────────────────────────────────────────────────────────────

fn quiet() -> DeconvolutionConfig {
    DeconvolutionConfig {
        verbose: false,
        ..DeconvolutionConfig::default()
    }
}

fn full_sky() -> DeconvolutionConfig {
    DeconvolutionConfig {
        window_mode: WindowMode::FullSky,
        ..quiet()
    }
}

/// A smooth window with f_sky ≈ 0.7 and a small negative ringing term.
fn masked_window(lmax: usize) -> Vec<f64> {
    (0..=2 * lmax)
        .map(|l| {
            let x = l as f64;
            4.0 * PI * 0.7 * (-x * x / 18.0).exp() - 0.01 * (x / 2.0).sin()
        })
        .collect()
}

fn assert_close(a: f64, b: f64, tol: f64, what: &str) {
    assert!(
        (a - b).abs() < tol,
        "{what}: {a:.15e} vs {b:.15e} (tol {tol:.0e})"
    );
}

// ─── coupling matrix ─────────────────────────────────────────────────────────

/// With W = 4π δ_{l0} the coupling matrix is exactly the identity.
#[test]
fn test_full_sky_coupling_is_identity() {
    for lmax in [0usize, 1, 8, 20] {
        let md = MaskDeconvolution::with_config(lmax, &[], full_sky());
        let m = md.coupling_matrix();
        for i in 0..=lmax {
            for j in 0..=lmax {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_close(m.get(i, j), expect, 1e-12, &format!("lmax={lmax} M[{i},{j}]"));
            }
        }
    }
}

/// The triple sum is symmetric once the column weight is divided out:
/// (2 l1 + 1) M[l1, l2] = (2 l2 + 1) M[l2, l1].
#[test]
fn test_coupling_weighted_symmetry() {
    let lmax = 12;
    let md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    let m = md.coupling_matrix();
    for l1 in 0..=lmax {
        for l2 in 0..=lmax {
            let a = (2 * l1 + 1) as f64 * m.get(l1, l2);
            let b = (2 * l2 + 1) as f64 * m.get(l2, l1);
            assert_close(a, b, 1e-10, &format!("weighted M[{l1},{l2}]"));
        }
    }
}

/// Row l1 = 0 only ever picks up l3 = l2.
#[test]
fn test_monopole_row_closed_form() {
    let lmax = 10;
    let w_l = masked_window(lmax);
    let md = MaskDeconvolution::with_config(lmax, &w_l, quiet());
    let w3j = Wigner3j000::new(2 * lmax);
    for l2 in 0..=lmax {
        let d = (2 * l2 + 1) as f64;
        let expect = d * d * w3j.w000(0, l2, l2).powi(2) * w_l[l2] / (4.0 * PI);
        assert_close(md.coupling_matrix().get(0, l2), expect, 1e-12, &format!("M[0,{l2}]"));
        // (0 l l; 0 0 0)^2 = 1 / (2l + 1) reduces it further.
        assert_close(md.coupling_matrix().get(0, l2), d * w_l[l2] / (4.0 * PI), 1e-12, "reduced");
    }
}

/// An external provider gives the same matrix as the built-in one.
#[test]
fn test_external_provider_matches_builtin() {
    let lmax = 7;
    let w_l = masked_window(lmax);
    let table = Wigner3j000::new(2 * lmax + 1);
    let external = |l1: usize, l2: usize, l3: usize| table.w000(l1, l2, l3);
    let a = MaskDeconvolution::with_config(lmax, &w_l, quiet());
    let b = MaskDeconvolution::with_provider(lmax, &w_l, quiet(), &external);
    assert_eq!(a.coupling_matrix(), b.coupling_matrix());
}

// ─── binning ─────────────────────────────────────────────────────────────────

/// A constant spectrum bins to the same constant, except the monopole-free first bin.
#[test]
fn test_binning_conserves_constant_spectrum() {
    let lmax = 23;
    let c = 2.75;
    let cl = vec![c; lmax + 1];
    for lper_bin in [2usize, 3, 4, 5, 8] {
        let b = Binning::new(lmax, lper_bin).unwrap();
        let cb = b.bin_cls(&cl).unwrap();
        for (i, &v) in cb.iter().enumerate().skip(1) {
            assert_close(v, c, 1e-14, &format!("lper_bin={lper_bin} Cb[{i}]"));
        }
        let first = c * (lper_bin - 1) as f64 / lper_bin as f64;
        assert_close(cb[0], first, 1e-14, "first bin");
    }
}

/// lmax = 9, width 2: centres are the weighted averages with l = 0 zeroed.
#[test]
fn test_bin_centres_lmax9_width2() {
    let b = Binning::new(9, 2).unwrap();
    // Bin 0: only l = 1 carries weight 1/2 -> 0.5. Bin 1: (2 + 3) / 2 = 2.5.
    assert_eq!(b.binned_ells(), &[0.5, 2.5, 4.5, 6.5, 8.5]);
}

// ─── decoupling ──────────────────────────────────────────────────────────────

/// With M = I, Mbb is diagonal: 1 for full bins and (w - 1)/w for the first,
/// so decoupling returns Cb except that the first bin is re-normalised to the
/// mean over l = 1..w-1.
#[test]
fn test_identity_coupling_round_trip() {
    let lmax = 15;
    let lper_bin = 4;
    let cl: Vec<f64> = (0..=lmax).map(|l| 1.0 + 0.1 * l as f64).collect();
    let mut md = MaskDeconvolution::with_config(lmax, &[], full_sky());
    let bp = md.deconvolve(&cl, lper_bin).unwrap();
    let binning = md.binning().unwrap();
    let cb = binning.bin_cls(&cl).unwrap();

    assert_eq!(bp.len(), 4);
    assert_eq!(bp.ells, binning.binned_ells());
    for b in 1..bp.len() {
        assert_close(bp.values[b], cb[b], 1e-12, &format!("bin {b}"));
    }
    let mean_first = (cl[1] + cl[2] + cl[3]) / 3.0;
    assert_close(bp.values[0], mean_first, 1e-12, "first bin");
}

/// Decoupled values are the row vector Cb times Mbb⁻¹.
#[test]
fn test_decouple_uses_row_vector_order() {
    let lmax = 19;
    let cl: Vec<f64> = (0..=lmax).map(|l| 100.0 / (1.0 + l as f64)).collect();
    let mut md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    let bp = md.deconvolve(&cl, 4).unwrap();

    let binning = md.binning().unwrap();
    let inv = md.binned_inverse().unwrap();
    let cb = binning.bin_cls(&cl).unwrap();
    let expect = inv.vec_mul(&cb).unwrap();
    for (i, (&got, &want)) in bp.values.iter().zip(&expect).enumerate() {
        assert_close(got, want, 1e-12, &format!("bin {i}"));
    }

    // The column-vector product gives something else for this mask.
    let other = inv.mul_vec(&cb).unwrap();
    let diff: f64 = other.iter().zip(&expect).map(|(a, b)| (a - b).abs()).sum();
    assert!(diff > 1e-8, "Mbb⁻¹ unexpectedly symmetric (diff {diff:e})");
}

/// Binned coupling is bins · M · bins_no_weightᵀ.
#[test]
fn test_binned_coupling_definition() {
    let lmax = 11;
    let mut md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    md.set_binning(3).unwrap();
    let b = md.binning().unwrap();
    let mbb = md.binned_coupling().unwrap();
    let m = md.coupling_matrix().matrix();
    for i in 0..b.n_bins() {
        for j in 0..b.n_bins() {
            let mut s = 0.0;
            for l1 in 0..=lmax {
                for l2 in 0..=lmax {
                    s += b.bins()[(i, l1)] * m[(l1, l2)] * b.bins_no_weight()[(j, l2)];
                }
            }
            assert_close(mbb[(i, j)], s, 1e-12, &format!("Mbb[{i},{j}]"));
        }
    }
}

/// Theory convolution is (bins · (M · Clt)) · Mbb⁻¹.
#[test]
fn test_convolve_theory_pipeline() {
    let lmax = 19;
    let clt: Vec<f64> = (0..=lmax).map(|l| 50.0 / (2.0 + l as f64).powi(2)).collect();
    let mut md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    md.set_binning(5).unwrap();
    let got = md.convolve_theory(&clt).unwrap();

    let coupled = md.coupling_matrix().apply(&clt).unwrap();
    let cb = md.binning().unwrap().bin_cls(&coupled).unwrap();
    let expect = md.binned_inverse().unwrap().vec_mul(&cb).unwrap();
    assert_eq!(got.len(), 4);
    for (i, (&g, &e)) in got.iter().zip(&expect).enumerate() {
        assert_close(g, e, 1e-12, &format!("bin {i}"));
    }
}

/// On the full sky, convolving theory through the pipeline equals decoupling it.
#[test]
fn test_convolve_theory_full_sky_matches_decouple() {
    let lmax = 15;
    let clt: Vec<f64> = (0..=lmax).map(|l| (l as f64).sqrt()).collect();
    let mut md = MaskDeconvolution::with_config(lmax, &[], full_sky());
    let bp = md.deconvolve(&clt, 4).unwrap();
    let conv = md.convolve_theory(&clt).unwrap();
    for (i, (&a, &b)) in conv.iter().zip(&bp.values).enumerate() {
        assert_close(a, b, 1e-12, &format!("bin {i}"));
    }
}

/// Re-binning replaces the cached inverse.
#[test]
fn test_rebinning_recomputes_inverse() {
    let lmax = 23;
    let mut md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    md.set_binning(4).unwrap();
    assert_eq!(md.binned_inverse().unwrap().shape(), (6, 6));
    md.set_binning(6).unwrap();
    assert_eq!(md.binned_inverse().unwrap().shape(), (4, 4));
    assert_eq!(md.convolve_theory(&vec![1.0; lmax + 1]).unwrap().len(), 4);
}

// ─── contracts ───────────────────────────────────────────────────────────────

/// Theory convolution on a fresh instance is refused, not defaulted.
#[test]
fn test_convolve_before_decouple_fails() {
    let lmax = 6;
    let md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    assert_eq!(
        md.convolve_theory(&vec![1.0; lmax + 1]),
        Err(DeconvolutionError::BinningNotSet)
    );
}

/// A spectrum one entry short is rejected up front.
#[test]
fn test_short_spectrum_rejected() {
    let lmax = 6;
    let mut md = MaskDeconvolution::with_config(lmax, &masked_window(lmax), quiet());
    let short = vec![1.0; lmax];
    assert_eq!(
        md.deconvolve(&short, 2),
        Err(DeconvolutionError::SpectrumLength { expected: 7, actual: 6 })
    );
    md.set_binning(2).unwrap();
    assert_eq!(
        md.decouple(&short),
        Err(DeconvolutionError::SpectrumLength { expected: 7, actual: 6 })
    );
}

/// Unknown variable-binning names are configuration errors.
#[test]
fn test_unknown_binning_scheme() {
    let err = "logarithmic".parse::<maskdecon::BinningScheme>().unwrap_err();
    assert_eq!(err, DeconvolutionError::UnknownBinningScheme("logarithmic".into()));
}

/// Building the matrix directly agrees with the instance's copy.
#[test]
fn test_coupling_build_standalone() {
    let lmax = 5;
    let w_l = masked_window(lmax);
    let md = MaskDeconvolution::with_config(lmax, &w_l, quiet());
    let window = WindowFunction::from_slice(&w_l, lmax);
    let direct =
        CouplingMatrix::build(lmax, &window, WindowMode::Measured, &Wigner3j000::new(2 * lmax + 1));
    assert_eq!(&direct, md.coupling_matrix());
}
