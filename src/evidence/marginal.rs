//! Closed-form marginalization of a linear-Gaussian model over the latent velocity.
//!
//! For `y = M·v + ε`, `ε ~ N(0, Cinv⁻¹)`, `v ~ N(0, Vinv⁻¹)`:
//!
//! ```text
//! Ainv = Mᵀ·Cinv·M + Vinv          A = Ainv⁻¹
//! B    = Mᵀ·Cinv·y                 ν = A·B
//! Δ    = −Σ 3·ln d − ½·ln|Cinv*/2π| − ½·ln|Vinv/2π| + ½·yᵀ·Cinv·y − ½·νᵀ·Ainv·ν
//! ln L = −Δ + ½·ln|2π·A|
//! ```
//!
//! `Cinv*` is `Cinv` with every RV row whose precision is (numerically) zero
//! dropped, which makes the determinant that of the informative block only.
//! The `3·ln d` term, one per stacked star, is the Jacobian of the
//! distance-scaled observables.
//!
//! Every determinant goes through the sign/log decomposition; a non-positive
//! sign surfaces as `SingularCovariance` instead of a NaN or −∞ evidence.

use std::f64::consts::PI;

use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::domain::{EvidenceResult, LinearModel, RV_PRECISION_ATOL, VelocityPrior};
use crate::error::EvidenceError;
use crate::math::{drop_rows_cols, ln_det_positive};

/// Marginalize one model over its latent velocity.
///
/// Pure: reads `model` and `prior`, returns a fresh result.
pub fn marginalize(
    model: &LinearModel,
    prior: &VelocityPrior,
) -> Result<EvidenceResult, EvidenceError> {
    check_model(model)?;

    let m = &model.design;
    let c = &model.precision;
    let y = &model.y;

    let mt_c = m.transpose() * c;
    let ainv_obs = &mt_c * m;
    let b_obs = &mt_c * y;

    let ainv = Matrix3::from_fn(|i, j| ainv_obs[(i, j)]) + prior.precision();
    let b = Vector3::new(b_obs[0], b_obs[1], b_obs[2]);

    ln_det_positive(&to_dynamic(&ainv), "posterior precision")?;
    let a = ainv
        .try_inverse()
        .ok_or_else(|| EvidenceError::singular("posterior precision", 0.0))?;
    let a = (a + a.transpose()) * 0.5;
    let nu = a * b;

    let informative = informative_precision(model);
    let ln_det_c = ln_det_positive(&(informative / (2.0 * PI)), "observation precision")?;
    let ln_det_v = ln_det_positive(
        &(to_dynamic(prior.precision()) / (2.0 * PI)),
        "velocity prior precision",
    )?;

    let jacobian: f64 = model.distances.iter().map(|d| 3.0 * d.ln()).sum();
    let chi2 = y.dot(&(c * y));
    let fit = nu.dot(&(ainv * nu));

    let delta = -jacobian - 0.5 * ln_det_c - 0.5 * ln_det_v + 0.5 * chi2 - 0.5 * fit;
    let ln_det_a = ln_det_positive(&(to_dynamic(&a) * (2.0 * PI)), "posterior covariance")?;
    let ln_evidence = -delta + 0.5 * ln_det_a;

    if !ln_evidence.is_finite() {
        return Err(EvidenceError::singular("posterior covariance", f64::NAN));
    }

    Ok(EvidenceResult {
        posterior_cov: a,
        posterior_mean: nu,
        delta,
        ln_evidence,
    })
}

/// Marginalize each model independently; output `i` belongs to input `i`.
///
/// Rows share nothing but `prior`, so the first failing row fails the batch
/// without affecting how the others would have evaluated.
pub fn marginalize_batch(
    models: &[LinearModel],
    prior: &VelocityPrior,
) -> Result<Vec<EvidenceResult>, EvidenceError> {
    models.iter().map(|m| marginalize(m, prior)).collect()
}

/// `Cinv` restricted to the rows that carry information.
fn informative_precision(model: &LinearModel) -> DMatrix<f64> {
    let empty: Vec<usize> = model
        .rv_rows
        .iter()
        .copied()
        .filter(|&r| model.precision[(r, r)].abs() <= RV_PRECISION_ATOL)
        .collect();
    if empty.is_empty() {
        model.precision.clone()
    } else {
        drop_rows_cols(&model.precision, &empty)
    }
}

fn check_model(model: &LinearModel) -> Result<(), EvidenceError> {
    let n = model.n_obs();
    if model.design.nrows() != n || model.design.ncols() != 3 {
        return Err(EvidenceError::shape(format!(
            "design matrix is {}×{}, expected {n}×3",
            model.design.nrows(),
            model.design.ncols()
        )));
    }
    if model.precision.nrows() != n || model.precision.ncols() != n {
        return Err(EvidenceError::shape(format!(
            "precision matrix is {}×{}, expected {n}×{n}",
            model.precision.nrows(),
            model.precision.ncols()
        )));
    }
    if let Some(&r) = model.rv_rows.iter().find(|&&r| r >= n) {
        return Err(EvidenceError::shape(format!(
            "RV row {r} out of range for {n} observables"
        )));
    }
    if model.distances.is_empty() {
        return Err(EvidenceError::shape("model carries no trial distance"));
    }
    if model
        .distances
        .iter()
        .any(|d| !(d.is_finite() && *d > 0.0))
    {
        return Err(EvidenceError::malformed(format!(
            "trial distances must be finite and positive, got {:?}",
            model.distances
        )));
    }
    let finite = model.y.iter().all(|v| v.is_finite())
        && model.design.iter().all(|v| v.is_finite())
        && model.precision.iter().all(|v| v.is_finite());
    if !finite {
        return Err(EvidenceError::malformed("model has non-finite entries"));
    }
    Ok(())
}

fn to_dynamic(m: &Matrix3<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(3, 3, m.as_slice())
}
