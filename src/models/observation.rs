//! Linear observation model for one star at a trial distance.
//!
//! The marginalizer needs three pieces per star:
//! - the observed vector `y`, linearized around the trial distance `d`
//! - the design matrix `M` mapping a Cartesian velocity (km/s) onto `y`
//! - the precision `Cinv` of `y`
//!
//! With catalog observables `x = (ϖ [mas], μ_α [mas/yr], μ_δ [mas/yr], v_r [km/s])`:
//!
//! ```text
//! y = (d·ϖ/1000 − 1,  d·k·μ_α,  d·k·μ_δ,  v_r)        k = KMS_PER_PC_MASYR
//! M = [ 0 ; e_α ; e_δ ; e_r ]                           (4×3, rows = basis rows)
//! Cinv_y = S⁻¹ · Cinv_x · S⁻¹                           S = diag(d/1000, d·k, d·k, 1)
//! ```
//!
//! so the parallax/proper-motion block of the precision picks up `1/d²`, and a
//! missing RV stays an all-zero row/column.

use nalgebra::{DMatrix, DVector};

use crate::domain::{
    KMS_PER_PC_MASYR, LinearModel, MAS_PER_ARCSEC, OBS_PER_STAR, RV_SLOT, StarObservation,
};
use crate::error::EvidenceError;
use crate::math::tangent_basis;

/// Build `(y, M, Cinv)` for one star at trial distance `distance` (pc).
pub fn assemble(obs: &StarObservation, distance: f64) -> Result<LinearModel, EvidenceError> {
    check_distance(distance)?;

    let pos = obs.position();
    let basis = tangent_basis(pos.lon(), pos.lat());
    let scale = observable_scale(distance);

    let x = obs.observables();
    let y = DVector::from_row_slice(&[
        scale[0] * x[0] - 1.0,
        scale[1] * x[1],
        scale[2] * x[2],
        scale[3] * x[3],
    ]);

    // Parallax does not depend on velocity: row 0 stays zero.
    let mut design = DMatrix::zeros(OBS_PER_STAR, 3);
    for r in 0..3 {
        for c in 0..3 {
            design[(r + 1, c)] = basis.matrix()[(r, c)];
        }
    }

    let p = obs.precision();
    let precision = DMatrix::from_fn(OBS_PER_STAR, OBS_PER_STAR, |i, j| {
        p[(i, j)] / (scale[i] * scale[j])
    });

    Ok(LinearModel {
        y,
        design,
        precision,
        distances: vec![distance],
        rv_rows: vec![RV_SLOT],
    })
}

/// One model per trial distance, in the order given.
pub fn assemble_batch(
    obs: &StarObservation,
    distances: &[f64],
) -> Result<Vec<LinearModel>, EvidenceError> {
    distances.iter().map(|&d| assemble(obs, d)).collect()
}

/// Stack two models into one system that shares a single latent velocity.
///
/// `y` and `M` are concatenated row-wise and the precisions placed block-diagonally;
/// both stars' design blocks multiply the same three velocity columns.
pub fn stack(a: &LinearModel, b: &LinearModel) -> Result<LinearModel, EvidenceError> {
    for (label, m) in [("first", a), ("second", b)] {
        if m.design.ncols() != 3 {
            return Err(EvidenceError::shape(format!(
                "{label} design matrix has {} velocity columns, expected 3",
                m.design.ncols()
            )));
        }
        if m.design.nrows() != m.n_obs() || m.precision.nrows() != m.n_obs() {
            return Err(EvidenceError::shape(format!(
                "{label} model rows disagree: y={}, M={}, Cinv={}",
                m.n_obs(),
                m.design.nrows(),
                m.precision.nrows()
            )));
        }
    }

    let na = a.n_obs();
    let n = na + b.n_obs();

    let y = DVector::from_iterator(n, a.y.iter().chain(b.y.iter()).copied());

    let mut design = DMatrix::zeros(n, 3);
    design.rows_mut(0, na).copy_from(&a.design);
    design.rows_mut(na, b.n_obs()).copy_from(&b.design);

    let mut precision = DMatrix::zeros(n, n);
    precision.view_mut((0, 0), (na, na)).copy_from(&a.precision);
    precision
        .view_mut((na, na), (b.n_obs(), b.n_obs()))
        .copy_from(&b.precision);

    let distances = a.distances.iter().chain(&b.distances).copied().collect();
    let rv_rows = a
        .rv_rows
        .iter()
        .copied()
        .chain(b.rv_rows.iter().map(|r| r + na))
        .collect();

    Ok(LinearModel {
        y,
        design,
        precision,
        distances,
        rv_rows,
    })
}

/// Per-slot factors turning catalog units into the distance-scaled `y` units.
fn observable_scale(distance: f64) -> [f64; 4] {
    let tangential = distance * KMS_PER_PC_MASYR;
    [distance / MAS_PER_ARCSEC, tangential, tangential, 1.0]
}

pub(crate) fn check_distance(distance: f64) -> Result<(), EvidenceError> {
    if !(distance.is_finite() && distance > 0.0) {
        return Err(EvidenceError::malformed(format!(
            "trial distance must be finite and positive, got {distance}"
        )));
    }
    Ok(())
}
