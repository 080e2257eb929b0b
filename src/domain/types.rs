//! Shared domain types.
//!
//! Inputs (`SkyPosition`, `StarObservation`, `VelocityPrior`) are validated on
//! construction and immutable afterwards, so the numeric kernels can take them
//! by reference without re-checking.

use std::f64::consts::{FRAC_PI_2, PI};
use std::path::PathBuf;

use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

use crate::domain::constants::{DEFAULT_SIGMA_V_KMS, RV_PRECISION_ATOL, RV_SLOT};
use crate::error::EvidenceError;
use crate::math::{ln_det_positive, validate_precision};

/// A position on the sky, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    lon: f64,
    lat: f64,
}

impl SkyPosition {
    /// Longitude is taken as-is (any real, mod 2π); latitude must lie in `[-π/2, π/2]`.
    pub fn new(lon: f64, lat: f64) -> Result<Self, EvidenceError> {
        if !(lon.is_finite() && lat.is_finite()) {
            return Err(EvidenceError::malformed(format!(
                "non-finite sky position (lon={lon}, lat={lat})"
            )));
        }
        if lat.abs() > FRAC_PI_2 {
            return Err(EvidenceError::malformed(format!(
                "latitude {lat} rad outside [-π/2, π/2]"
            )));
        }
        Ok(Self { lon, lat })
    }

    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Result<Self, EvidenceError> {
        Self::new(lon_deg.to_radians(), lat_deg.to_radians())
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
}

/// Local orthonormal frame at a sky position.
///
/// Rows are `{e_ra, e_dec, e_radial}`: row 0 is the RA proper-motion direction,
/// row 1 the Dec direction and row 2 the line of sight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentBasis(Matrix3<f64>);

impl TangentBasis {
    pub(crate) fn from_rows(ra: Vector3<f64>, dec: Vector3<f64>, radial: Vector3<f64>) -> Self {
        Self(Matrix3::from_rows(&[ra.transpose(), dec.transpose(), radial.transpose()]))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn ra_hat(&self) -> Vector3<f64> {
        self.0.row(0).transpose()
    }

    pub fn dec_hat(&self) -> Vector3<f64> {
        self.0.row(1).transpose()
    }

    pub fn radial_hat(&self) -> Vector3<f64> {
        self.0.row(2).transpose()
    }

    /// Components `[v_ra, v_dec, v_radial]` of a Cartesian vector.
    pub fn project(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.0 * v
    }
}

/// One star's astrometry and (optional) radial velocity.
///
/// Units: parallax mas, proper motions mas/yr (`pm_ra` includes the `cos δ`
/// factor), RV km/s. `precision` is the 4×4 inverse covariance over
/// `(parallax, pm_ra, pm_dec, rv)` in those units. A missing RV is zero
/// information: row/column 3 of the precision is identically zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StarObservation {
    position: SkyPosition,
    parallax: f64,
    pm_ra: f64,
    pm_dec: f64,
    rv: Option<f64>,
    precision: Matrix4<f64>,
}

impl StarObservation {
    /// Build an observation from a precomputed precision matrix.
    ///
    /// When `rv` is `None` the RV row/column of `precision` is zeroed.
    pub fn new(
        position: SkyPosition,
        parallax: f64,
        pm_ra: f64,
        pm_dec: f64,
        rv: Option<f64>,
        precision: Matrix4<f64>,
    ) -> Result<Self, EvidenceError> {
        let values = [parallax, pm_ra, pm_dec, rv.unwrap_or(0.0)];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EvidenceError::malformed(format!(
                "non-finite astrometry {values:?}"
            )));
        }

        let mut precision = precision;
        if rv.is_none() {
            for k in 0..4 {
                precision[(RV_SLOT, k)] = 0.0;
                precision[(k, RV_SLOT)] = 0.0;
            }
        }

        let dynamic = DMatrix::from_column_slice(4, 4, precision.as_slice());
        validate_precision(&dynamic, "star precision")?;
        for k in 0..RV_SLOT {
            if precision[(k, k)] <= 0.0 {
                return Err(EvidenceError::malformed(format!(
                    "astrometric precision diagonal {k} must be positive, got {}",
                    precision[(k, k)]
                )));
            }
        }

        Ok(Self {
            position,
            parallax,
            pm_ra,
            pm_dec,
            rv,
            precision,
        })
    }

    /// Build an observation with uncorrelated errors (1σ, same units as the values).
    pub fn from_uncertainties(
        position: SkyPosition,
        (parallax, parallax_err): (f64, f64),
        (pm_ra, pm_ra_err): (f64, f64),
        (pm_dec, pm_dec_err): (f64, f64),
        rv: Option<(f64, f64)>,
    ) -> Result<Self, EvidenceError> {
        let mut errs = vec![parallax_err, pm_ra_err, pm_dec_err];
        if let Some((_, rv_err)) = rv {
            errs.push(rv_err);
        }
        if errs.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err(EvidenceError::malformed(format!(
                "uncertainties must be finite and positive, got {errs:?}"
            )));
        }

        let mut precision = Matrix4::zeros();
        for (k, e) in errs.iter().enumerate() {
            precision[(k, k)] = 1.0 / (e * e);
        }
        Self::new(
            position,
            parallax,
            pm_ra,
            pm_dec,
            rv.map(|(v, _)| v),
            precision,
        )
    }

    pub fn position(&self) -> SkyPosition {
        self.position
    }

    pub fn parallax(&self) -> f64 {
        self.parallax
    }

    pub fn pm_ra(&self) -> f64 {
        self.pm_ra
    }

    pub fn pm_dec(&self) -> f64 {
        self.pm_dec
    }

    pub fn rv(&self) -> Option<f64> {
        self.rv
    }

    pub fn precision(&self) -> &Matrix4<f64> {
        &self.precision
    }

    /// Observables in catalog units, with `0` standing in for a missing RV.
    pub fn observables(&self) -> [f64; 4] {
        [self.parallax, self.pm_ra, self.pm_dec, self.rv.unwrap_or(0.0)]
    }

    /// True when the RV slot carries information.
    pub fn has_rv(&self) -> bool {
        self.precision[(RV_SLOT, RV_SLOT)].abs() > RV_PRECISION_ATOL
    }
}

/// Prior over the latent 3D velocity: zero-mean Gaussian with precision `Vinv` (km/s units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityPrior {
    precision: Matrix3<f64>,
}

impl VelocityPrior {
    /// Isotropic prior with dispersion `sigma_kms` per axis.
    pub fn isotropic(sigma_kms: f64) -> Result<Self, EvidenceError> {
        if !(sigma_kms.is_finite() && sigma_kms > 0.0) {
            return Err(EvidenceError::malformed(format!(
                "velocity dispersion must be finite and positive, got {sigma_kms}"
            )));
        }
        Ok(Self {
            precision: Matrix3::from_diagonal_element(1.0 / (sigma_kms * sigma_kms)),
        })
    }

    /// Prior from an explicit 3×3 precision; must be symmetric positive definite.
    pub fn from_precision(precision: Matrix3<f64>) -> Result<Self, EvidenceError> {
        let dynamic = DMatrix::from_column_slice(3, 3, precision.as_slice());
        validate_precision(&dynamic, "velocity prior precision")?;
        if precision.cholesky().is_none() {
            return Err(EvidenceError::malformed(
                "velocity prior precision must be positive definite",
            ));
        }
        Ok(Self { precision })
    }

    pub fn precision(&self) -> &Matrix3<f64> {
        &self.precision
    }

    /// `ln N(v; 0, V)`.
    pub fn ln_density(&self, v: &Vector3<f64>) -> Result<f64, EvidenceError> {
        let scaled = DMatrix::from_column_slice(3, 3, self.precision.as_slice()) / (2.0 * PI);
        let ln_det = ln_det_positive(&scaled, "velocity prior precision")?;
        Ok(-0.5 * v.dot(&(self.precision * v)) + 0.5 * ln_det)
    }
}

impl Default for VelocityPrior {
    fn default() -> Self {
        Self {
            precision: Matrix3::from_diagonal_element(
                1.0 / (DEFAULT_SIGMA_V_KMS * DEFAULT_SIGMA_V_KMS),
            ),
        }
    }
}

/// Linear-Gaussian observation model `y = M·v + noise`, noise precision `Cinv`.
///
/// `y` has one block of 4 rows per star (a single star, or two stacked stars
/// sharing one velocity). `distances` holds the trial distance of each stacked
/// star and `rv_rows` the row index of each star's RV slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub y: DVector<f64>,
    pub design: DMatrix<f64>,
    pub precision: DMatrix<f64>,
    pub distances: Vec<f64>,
    pub rv_rows: Vec<usize>,
}

impl LinearModel {
    pub fn n_obs(&self) -> usize {
        self.y.len()
    }
}

/// Output of the analytic velocity marginalization.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceResult {
    /// Posterior covariance `A = (MᵀCinvM + Vinv)⁻¹`.
    pub posterior_cov: Matrix3<f64>,
    /// Posterior mean velocity `ν = A·MᵀCinv·y`.
    pub posterior_mean: Vector3<f64>,
    pub delta: f64,
    /// Log-marginal-likelihood `−Δ + ½·ln|2πA|`.
    pub ln_evidence: f64,
}

/// Both hypotheses at one pair of trial distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisEvidence {
    pub distance1: f64,
    pub distance2: f64,
    /// Shared velocity.
    pub ln_h1: f64,
    /// Independent velocities.
    pub ln_h2: f64,
}

impl HypothesisEvidence {
    /// `ln p(data | H1) − ln p(data | H2)`; positive favors a shared velocity.
    pub fn ln_ratio(&self) -> f64 {
        self.ln_h1 - self.ln_h2
    }
}

/// Configuration of an `evaluate` run.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pairs_path: PathBuf,
    pub output_path: PathBuf,
    pub sigma_v: f64,
    /// Worker threads for pair-level parallelism (`None` = rayon default).
    pub threads: Option<usize>,
    /// Replace an existing results file instead of reusing it.
    pub overwrite: bool,
}

/// Configuration of synthetic pair generation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub n_pairs: usize,
    pub seed: u64,
    /// Fraction of pairs generated with a shared velocity.
    pub comoving_fraction: f64,
    pub distance_min: f64,
    pub distance_max: f64,
    /// Maximum offset of the second star from the first, per axis (degrees).
    pub max_separation_deg: f64,
    pub parallax_err: f64,
    pub pm_err: f64,
    /// RV error (km/s); `None` generates stars without RV.
    pub rv_err: Option<f64>,
    pub sigma_v: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_pairs: 16,
            seed: 42,
            comoving_fraction: 0.5,
            distance_min: 50.0,
            distance_max: 200.0,
            max_separation_deg: 1.0,
            parallax_err: 0.3,
            pm_err: 0.5,
            rv_err: None,
            sigma_v: DEFAULT_SIGMA_V_KMS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_outside_range_is_malformed() {
        let err = SkyPosition::new(0.0, FRAC_PI_2 + 1e-6).unwrap_err();
        assert!(matches!(err, EvidenceError::MalformedInput { .. }));
        assert!(SkyPosition::new(7.0, -FRAC_PI_2).is_ok());
    }

    #[test]
    fn missing_rv_zeroes_precision_row() {
        let pos = SkyPosition::from_degrees(10.0, 20.0).unwrap();
        let mut p = Matrix4::from_diagonal(&nalgebra::Vector4::new(4.0, 1.0, 1.0, 0.25));
        p[(0, 3)] = 0.1;
        p[(3, 0)] = 0.1;
        let obs = StarObservation::new(pos, 5.0, 1.0, -2.0, None, p).unwrap();
        for k in 0..4 {
            assert_eq!(obs.precision()[(3, k)], 0.0);
            assert_eq!(obs.precision()[(k, 3)], 0.0);
        }
        assert!(!obs.has_rv());
        assert_eq!(obs.observables()[3], 0.0);
    }

    #[test]
    fn asymmetric_precision_is_malformed() {
        let pos = SkyPosition::from_degrees(10.0, 20.0).unwrap();
        let mut p = Matrix4::identity();
        p[(0, 1)] = 0.5;
        let err = StarObservation::new(pos, 5.0, 1.0, -2.0, Some(3.0), p).unwrap_err();
        assert!(matches!(err, EvidenceError::MalformedInput { .. }));
    }

    #[test]
    fn indefinite_precision_is_malformed() {
        let pos = SkyPosition::from_degrees(10.0, 20.0).unwrap();
        let mut p = Matrix4::identity();
        p[(0, 1)] = 2.0;
        p[(1, 0)] = 2.0;
        let err = StarObservation::new(pos, 5.0, 1.0, -2.0, Some(3.0), p).unwrap_err();
        assert!(matches!(err, EvidenceError::MalformedInput { .. }));
    }

    #[test]
    fn isotropic_prior_density_peaks_at_zero() {
        let prior = VelocityPrior::isotropic(25.0).unwrap();
        let at_zero = prior.ln_density(&Vector3::zeros()).unwrap();
        let away = prior.ln_density(&Vector3::new(25.0, 0.0, 0.0)).unwrap();
        assert!((at_zero - away - 0.5).abs() < 1e-12);
        // ln N(0; 0, 625 I) = -1.5 ln(2π·625)
        let expected = -1.5 * (2.0 * PI * 625.0).ln();
        assert!((at_zero - expected).abs() < 1e-10);
    }

    #[test]
    fn prior_rejects_singular_precision() {
        let m = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0));
        assert!(VelocityPrior::from_precision(m).is_err());
        assert_eq!(VelocityPrior::default(), VelocityPrior::isotropic(25.0).unwrap());
    }

    #[test]
    fn ln_ratio_is_h1_minus_h2() {
        let ev = HypothesisEvidence {
            distance1: 100.0,
            distance2: 101.0,
            ln_h1: -3.5,
            ln_h2: -7.0,
        };
        assert_eq!(ev.ln_ratio(), 3.5);
    }
}
