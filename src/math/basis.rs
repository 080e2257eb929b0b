//! Tangent-plane basis on the celestial sphere.
//!
//! For a sky position `(α, δ)` we build the local frame `{e_α, e_δ, e_r}`:
//!
//! - `e_r` is the unit vector toward the star (the standard spherical-to-Cartesian map)
//! - `e_δ` and `e_α` come from finite differences of the unit vector, orthonormalized
//!   against `e_r` with Gram–Schmidt in the order `{e_r, e_δ, e_α}`
//!
//! Numerical notes:
//! - The offsets are a fixed 0.5 rad, so this is an approximation of the
//!   derivative directions, not the analytic frame. Gram–Schmidt makes the
//!   result exactly orthonormal regardless.
//! - Above `δ = π/4` the declination difference is taken toward the equator and
//!   negated, so the offset point never crosses the pole.
//! - The exact poles are not guarded: at `|δ| = π/2` the RA difference vanishes.

use std::f64::consts::FRAC_PI_4;

use nalgebra::Vector3;

use crate::domain::{SkyPosition, TangentBasis, TANGENT_OFFSET_RAD};

/// Cartesian unit vector toward `(lon, lat)` (radians).
pub fn unit_vector(lon: f64, lat: f64) -> Vector3<f64> {
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Orthonormal basis at `(lon, lat)`; rows are `{e_ra, e_dec, e_radial}`.
pub fn tangent_basis(lon: f64, lat: f64) -> TangentBasis {
    let u_hat = unit_vector(lon, lat);

    let dec_diff = if lat > FRAC_PI_4 {
        -(unit_vector(lon, lat - TANGENT_OFFSET_RAD) - u_hat)
    } else {
        unit_vector(lon, lat + TANGENT_OFFSET_RAD) - u_hat
    };
    // Always a positive offset in RA.
    let ra_diff = unit_vector(lon + TANGENT_OFFSET_RAD, lat) - u_hat;

    let u1 = u_hat;
    let u2 = (dec_diff - dec_diff.dot(&u1) * u1).normalize();
    let u3 = (ra_diff - ra_diff.dot(&u1) * u1 - ra_diff.dot(&u2) * u2).normalize();

    TangentBasis::from_rows(u3, u2, u1)
}

/// Tangent bases for many positions, one per input, in input order.
pub fn tangent_basis_batch(positions: &[SkyPosition]) -> Vec<TangentBasis> {
    positions
        .iter()
        .map(|p| tangent_basis(p.lon(), p.lat()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_3, PI};

    #[test]
    fn unit_vector_cardinal_points() {
        let x = unit_vector(0.0, 0.0);
        assert!((x - Vector3::x()).norm() < 1e-15);
        let y = unit_vector(PI / 2.0, 0.0);
        assert!((y - Vector3::y()).norm() < 1e-15);
        let z = unit_vector(1.234, PI / 2.0);
        assert!((z - Vector3::z()).norm() < 1e-15);
    }

    #[test]
    fn basis_at_origin_is_east_north_out() {
        let b = tangent_basis(0.0, 0.0);
        assert!((b.ra_hat() - Vector3::y()).norm() < 1e-12, "{}", b.ra_hat());
        assert!((b.dec_hat() - Vector3::z()).norm() < 1e-12, "{}", b.dec_hat());
        assert_eq!(b.radial_hat(), Vector3::x());
    }

    #[test]
    fn dec_hat_points_north_above_switch_latitude() {
        // Just above π/4 the difference is taken southward and negated.
        let lat = 1.2;
        let b = tangent_basis(0.7, lat);
        let north = unit_vector(0.7, lat + 1e-6) - unit_vector(0.7, lat);
        assert!(b.dec_hat().dot(&north) > 0.0);
        let east = unit_vector(0.7 + 1e-6, lat) - unit_vector(0.7, lat);
        assert!(b.ra_hat().dot(&east) > 0.0);
    }

    #[test]
    fn batch_matches_single_evaluation() {
        let positions = [
            SkyPosition::new(0.0, 0.0).unwrap(),
            SkyPosition::new(PI, FRAC_PI_4).unwrap(),
            SkyPosition::new(3.0 * PI / 2.0, -FRAC_PI_3).unwrap(),
        ];
        let batch = tangent_basis_batch(&positions);
        assert_eq!(batch.len(), positions.len());
        for (p, b) in positions.iter().zip(&batch) {
            assert_eq!(*b, tangent_basis(p.lon(), p.lat()));
        }
    }
}
