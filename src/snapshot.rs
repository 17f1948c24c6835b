//! Serialisable snapshots for persistence and transport.
//!
//! The coupling matrix costs O(lmax³) to build, so it is worth keeping once
//! computed. [`CouplingSnapshot`] captures the window and `M_{l1 l2}` of a
//! [`MaskDeconvolution`] and restores a working instance without rebuilding.
//! [`BandpowerSnapshot`] captures a decoupled result.
//!
//! Matrices are stored as nested rows so the JSON form reads naturally from
//! other tools.
//!
//! Requires the `serde` feature.

use crate::decouple::{Bandpowers, DeconvolutionConfig, MaskDeconvolution};
use crate::error::{DeconvolutionError, Result};
use crate::matrix::Matrix;

/// Current [`CouplingSnapshot`] format version.
pub const COUPLING_SNAPSHOT_VERSION: u16 = 1;

/// Current [`BandpowerSnapshot`] format version.
pub const BANDPOWER_SNAPSHOT_VERSION: u16 = 1;

/// A persisted mode-coupling matrix together with the window it came from.
///
/// # Example
///
/// ```rust,ignore
/// use maskdecon::snapshot::CouplingSnapshot;
///
/// let snap = CouplingSnapshot::from_deconvolution(&md);
/// let json = serde_json::to_string(&snap).unwrap();
/// let back: CouplingSnapshot = serde_json::from_str(&json).unwrap();
/// let md2 = back.restore(DeconvolutionConfig::default())?;
/// ```
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct CouplingSnapshot {
    /// Format version, [`COUPLING_SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Maximum multipole of the matrix.
    pub lmax: usize,
    /// Padded window function.
    pub window: Vec<f64>,
    /// `M_{l1 l2}` as `lmax + 1` rows of `lmax + 1` entries.
    pub matrix: Vec<Vec<f64>>,
}

impl CouplingSnapshot {
    /// Capture the coupling state of a live instance.
    pub fn from_deconvolution(md: &MaskDeconvolution) -> Self {
        Self {
            version: COUPLING_SNAPSHOT_VERSION,
            lmax: md.lmax(),
            window: md.window().as_slice().to_vec(),
            matrix: md.coupling_matrix().matrix().to_rows(),
        }
    }

    /// Rebuild a [`MaskDeconvolution`] from this snapshot.
    ///
    /// Fails on a version mismatch or a matrix that is not `(lmax + 1)` square.
    /// The restored instance starts with no binning installed.
    pub fn restore(&self, config: DeconvolutionConfig) -> Result<MaskDeconvolution> {
        if self.version != COUPLING_SNAPSHOT_VERSION {
            return Err(DeconvolutionError::SnapshotVersion {
                found: self.version,
                expected: COUPLING_SNAPSHOT_VERSION,
            });
        }
        let matrix = Matrix::from_rows(&self.matrix)?;
        MaskDeconvolution::from_coupling_matrix(self.lmax, &self.window, matrix, config)
    }
}

/// A persisted set of decoupled bandpowers.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct BandpowerSnapshot {
    /// Format version, [`BANDPOWER_SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Maximum multipole of the input spectrum.
    pub lmax: usize,
    /// Bin width.
    pub lper_bin: usize,
    /// Bin-centre multipoles.
    pub binned_ells: Vec<f64>,
    /// Decoupled bandpowers.
    pub bandpowers: Vec<f64>,
}

impl BandpowerSnapshot {
    /// Capture a decoupling result.
    pub fn from_bandpowers(lmax: usize, bp: &Bandpowers) -> Self {
        Self {
            version: BANDPOWER_SNAPSHOT_VERSION,
            lmax,
            lper_bin: bp.lper_bin,
            binned_ells: bp.ells.clone(),
            bandpowers: bp.values.clone(),
        }
    }

    /// Convert back into [`Bandpowers`], checking the format version.
    pub fn to_bandpowers(&self) -> Result<Bandpowers> {
        if self.version != BANDPOWER_SNAPSHOT_VERSION {
            return Err(DeconvolutionError::SnapshotVersion {
                found: self.version,
                expected: BANDPOWER_SNAPSHOT_VERSION,
            });
        }
        if self.binned_ells.len() != self.bandpowers.len() {
            return Err(DeconvolutionError::DimensionMismatch {
                context: "BandpowerSnapshot::to_bandpowers",
                expected: self.binned_ells.len(),
                actual: self.bandpowers.len(),
            });
        }
        Ok(Bandpowers {
            lper_bin: self.lper_bin,
            ells: self.binned_ells.clone(),
            values: self.bandpowers.clone(),
        })
    }

    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.bandpowers.len()
    }
}
