//! Small dense linear-algebra helpers.
//!
//! Every determinant in the evidence goes through [`slogdet`]: the matrices are
//! tiny (3×3 up to 8×8) but can be close to singular, so we never form a raw
//! determinant. The sign channel is what separates "legitimately tiny" from
//! "degenerate".

use nalgebra::DMatrix;

use crate::error::EvidenceError;

/// Relative tolerance for symmetry / PSD checks on input precision matrices.
const PRECISION_TOL: f64 = 1e-9;

/// Sign and natural log of `|det(m)|`, via LU with partial pivoting.
///
/// Returns `(0.0, -inf)` when a pivot is exactly zero or non-finite.
///
/// # Panics
/// Panics if `m` is not square.
pub fn slogdet(m: &DMatrix<f64>) -> (f64, f64) {
    assert!(m.is_square(), "slogdet needs a square matrix");
    let n = m.nrows();
    if n == 0 {
        return (1.0, 0.0);
    }

    let lu = m.clone().lu();
    let u = lu.u();
    let mut sign: f64 = lu.p().determinant();
    let mut ln_det = 0.0;
    for i in 0..n {
        let pivot = u[(i, i)];
        if pivot == 0.0 || !pivot.is_finite() {
            return (0.0, f64::NEG_INFINITY);
        }
        if pivot < 0.0 {
            sign = -sign;
        }
        ln_det += pivot.abs().ln();
    }
    (sign, ln_det)
}

/// `ln det(m)` for a matrix that must be positive definite.
///
/// A non-positive sign (or a non-finite log) surfaces as `SingularCovariance`
/// naming `what`.
pub fn ln_det_positive(m: &DMatrix<f64>, what: &'static str) -> Result<f64, EvidenceError> {
    let (sign, ln_det) = slogdet(m);
    if sign <= 0.0 || !ln_det.is_finite() {
        return Err(EvidenceError::singular(what, sign));
    }
    Ok(ln_det)
}

/// Check that `m` is finite, symmetric and positive semi-definite.
pub fn validate_precision(m: &DMatrix<f64>, name: &str) -> Result<(), EvidenceError> {
    if !m.is_square() {
        return Err(EvidenceError::shape(format!(
            "{name} must be square, got {}×{}",
            m.nrows(),
            m.ncols()
        )));
    }
    if m.iter().any(|v| !v.is_finite()) {
        return Err(EvidenceError::malformed(format!("{name} has non-finite entries")));
    }

    let scale = m.amax().max(1.0);
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > PRECISION_TOL * scale {
                return Err(EvidenceError::malformed(format!(
                    "{name} is not symmetric at ({i}, {j}): {} vs {}",
                    m[(i, j)],
                    m[(j, i)]
                )));
            }
        }
    }

    let eigenvalues = m.symmetric_eigenvalues();
    let min_eig = eigenvalues.min();
    if min_eig < -PRECISION_TOL * scale {
        return Err(EvidenceError::malformed(format!(
            "{name} is not positive semi-definite (min eigenvalue {min_eig:e})"
        )));
    }
    Ok(())
}

/// Copy of `m` with the given rows and columns removed.
pub fn drop_rows_cols(m: &DMatrix<f64>, indices: &[usize]) -> DMatrix<f64> {
    let keep: Vec<usize> = (0..m.nrows()).filter(|i| !indices.contains(i)).collect();
    DMatrix::from_fn(keep.len(), keep.len(), |i, j| m[(keep[i], keep[j])])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slogdet_matches_direct_determinant() {
        let m = DMatrix::from_row_slice(3, 3, &[2.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 4.0]);
        let (sign, ln_det) = slogdet(&m);
        assert_eq!(sign, 1.0);
        assert!((ln_det - m.determinant().ln()).abs() < 1e-12);
    }

    #[test]
    fn slogdet_tracks_negative_sign() {
        // Row swap of the identity: det = -1.
        let m = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let (sign, ln_det) = slogdet(&m);
        assert_eq!(sign, -1.0);
        assert!(ln_det.abs() < 1e-15);

        let m = DMatrix::from_row_slice(2, 2, &[-3.0, 0.0, 0.0, 2.0]);
        let (sign, ln_det) = slogdet(&m);
        assert_eq!(sign, -1.0);
        assert!((ln_det - 6.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn slogdet_handles_tiny_but_valid_determinants() {
        // det = 1e-400 underflows as a raw product but not in log space.
        let m = DMatrix::from_diagonal_element(4, 4, 1e-100);
        let (sign, ln_det) = slogdet(&m);
        assert_eq!(sign, 1.0);
        assert!((ln_det - 4.0 * (1e-100_f64).ln()).abs() < 1e-9);
    }

    #[test]
    fn ln_det_positive_rejects_singular() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let err = ln_det_positive(&m, "test matrix").unwrap_err();
        assert!(err.is_singular());
    }

    #[test]
    fn validate_precision_accepts_rank_deficient_psd() {
        let m = DMatrix::from_diagonal(&nalgebra::DVector::from_row_slice(&[1.0, 2.0, 0.0]));
        assert!(validate_precision(&m, "p").is_ok());
    }

    #[test]
    fn drop_rows_cols_keeps_order() {
        let m = DMatrix::from_fn(4, 4, |i, j| (10 * i + j) as f64);
        let d = drop_rows_cols(&m, &[1]);
        assert_eq!(d.nrows(), 3);
        assert_eq!(d[(0, 0)], 0.0);
        assert_eq!(d[(1, 2)], 23.0);
        assert_eq!(d[(2, 1)], 32.0);
    }
}
