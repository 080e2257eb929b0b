//! Likelihoods at a fixed velocity, in catalog units.
//!
//! These are the integrands the marginalizer integrates in closed form: for a
//! Cartesian velocity `v` (km/s) and distance `d` (pc) the model prediction is
//!
//! ```text
//! x_th = (1000/d,  (T·v)_α/(d·k),  (T·v)_δ/(d·k),  (T·v)_r)
//! ```
//!
//! with `T` the star's tangent basis and `k = KMS_PER_PC_MASYR`. Useful for
//! inspecting a single velocity hypothesis and for cross-checking the
//! closed-form evidence.

use std::f64::consts::PI;

use nalgebra::{DMatrix, Vector3, Vector4};

use crate::domain::{
    KMS_PER_PC_MASYR, MAS_PER_ARCSEC, RV_PRECISION_ATOL, RV_SLOT, StarObservation, VelocityPrior,
};
use crate::error::EvidenceError;
use crate::math::{drop_rows_cols, ln_det_positive, tangent_basis};
use crate::models::check_distance;

/// `ln p(x | v, d)` for one star: `−½χ² + ½·ln|Cinv*/2π|`.
///
/// A missing RV drops out of both terms.
pub fn ln_likelihood_at_velocity(
    v: &Vector3<f64>,
    distance: f64,
    obs: &StarObservation,
) -> Result<f64, EvidenceError> {
    check_distance(distance)?;
    if v.iter().any(|c| !c.is_finite()) {
        return Err(EvidenceError::malformed(format!("non-finite velocity {v}")));
    }

    let pos = obs.position();
    let local = tangent_basis(pos.lon(), pos.lat()).project(v);
    let tangential = distance * KMS_PER_PC_MASYR;
    let predicted = Vector4::new(
        MAS_PER_ARCSEC / distance,
        local[0] / tangential,
        local[1] / tangential,
        local[2],
    );

    let x = Vector4::from(obs.observables());
    let dx = x - predicted;
    let p = obs.precision();
    let chi2 = dx.dot(&(p * dx));

    let dynamic = DMatrix::from_column_slice(4, 4, p.as_slice());
    let informative = if p[(RV_SLOT, RV_SLOT)].abs() <= RV_PRECISION_ATOL {
        drop_rows_cols(&dynamic, &[RV_SLOT])
    } else {
        dynamic
    };
    let ln_det = ln_det_positive(&(informative / (2.0 * PI)), "observation precision")?;

    Ok(-0.5 * chi2 + 0.5 * ln_det)
}

/// `ln p(x1, x2, v | H1, d1, d2)`: both stars at the same velocity, plus the prior on it.
pub fn ln_h1_at_velocity(
    v: &Vector3<f64>,
    d1: f64,
    d2: f64,
    obs1: &StarObservation,
    obs2: &StarObservation,
    prior: &VelocityPrior,
) -> Result<f64, EvidenceError> {
    Ok(ln_likelihood_at_velocity(v, d1, obs1)?
        + ln_likelihood_at_velocity(v, d2, obs2)?
        + prior.ln_density(v)?)
}

/// `ln p(x1, x2, v1, v2 | H2, d1, d2)`: each star at its own velocity, each with a prior term.
pub fn ln_h2_at_velocity(
    v1: &Vector3<f64>,
    v2: &Vector3<f64>,
    d1: f64,
    d2: f64,
    obs1: &StarObservation,
    obs2: &StarObservation,
    prior: &VelocityPrior,
) -> Result<f64, EvidenceError> {
    Ok(ln_likelihood_at_velocity(v1, d1, obs1)?
        + prior.ln_density(v1)?
        + ln_likelihood_at_velocity(v2, d2, obs2)?
        + prior.ln_density(v2)?)
}
