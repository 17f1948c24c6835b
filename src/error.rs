//! Error type shared by every fallible operation in the crate.
//!
//! The engine trusts its numeric inputs (window values, spectra) and only
//! reports structural problems: wrong lengths, bad binning parameters, calls
//! made in the wrong order, and singular binned coupling matrices.

use thiserror::Error;

/// Errors raised by the deconvolution engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconvolutionError {
    /// A spectrum did not have exactly `lmax + 1` entries.
    #[error("spectrum must have {expected} entries (lmax + 1), got {actual}")]
    SpectrumLength {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// Variable binning was asked for a scheme it does not know.
    #[error("unknown binning scheme `{0}` (expected `linear` or `sqrt`)")]
    UnknownBinningScheme(String),

    /// The bin width is zero or produces no bins for this `lmax`.
    #[error("invalid bin width {0}: must be at least 1 and yield at least one bin")]
    InvalidBinWidth(usize),

    /// Theory convolution was requested before any binning was installed.
    #[error("no binned coupling inverse available: call set_binning or deconvolve first")]
    BinningNotSet,

    /// Gauss-Jordan elimination hit a pivot too small to divide by.
    #[error("binned coupling matrix is singular (pivot {value:e} at column {pivot})")]
    SingularMatrix {
        /// Column at which elimination failed.
        pivot: usize,
        /// Magnitude of the offending pivot.
        value: f64,
    },

    /// A matrix or vector had the wrong shape for the requested operation.
    #[error("{context}: expected dimension {expected}, got {actual}")]
    DimensionMismatch {
        /// Operation that detected the mismatch.
        context: &'static str,
        /// Required dimension.
        expected: usize,
        /// Supplied dimension.
        actual: usize,
    },

    /// A persisted snapshot was written by an unsupported format version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion {
        /// Version stored in the snapshot.
        found: u16,
        /// Version this build understands.
        expected: u16,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, DeconvolutionError>;

/// Check that a per-multipole spectrum covers `0..=lmax` exactly.
pub(crate) fn check_spectrum_len(lmax: usize, spectrum: &[f64]) -> Result<()> {
    let expected = lmax + 1;
    if spectrum.len() != expected {
        return Err(DeconvolutionError::SpectrumLength {
            expected,
            actual: spectrum.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_length_accepts_exact() {
        assert!(check_spectrum_len(4, &[0.0; 5]).is_ok());
    }

    #[test]
    fn spectrum_length_rejects_short() {
        let err = check_spectrum_len(4, &[0.0; 4]).unwrap_err();
        assert_eq!(
            err,
            DeconvolutionError::SpectrumLength { expected: 5, actual: 4 }
        );
    }

    #[test]
    fn messages_name_the_problem() {
        let msg = DeconvolutionError::UnknownBinningScheme("log".into()).to_string();
        assert!(msg.contains("log"), "message was: {msg}");
        let msg = DeconvolutionError::SingularMatrix { pivot: 0, value: 0.0 }.to_string();
        assert!(msg.contains("singular"), "message was: {msg}");
    }
}
