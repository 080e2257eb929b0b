//! Synthetic star pairs with known velocities.
//!
//! A pair is either co-moving (one velocity drawn from the prior, shared by both
//! stars, and nearly equal distances) or independent (two velocities, two
//! distances). Each star's catalog observables are the exact projection of its
//! velocity plus Gaussian noise at the configured uncertainties.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Vector3;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{
    KMS_PER_PC_MASYR, MAS_PER_ARCSEC, SimulationConfig, SkyPosition, StarObservation,
    TANGENT_OFFSET_RAD,
};
use crate::error::EvidenceError;
use crate::math::tangent_basis;

/// Relative scatter of the second star's distance in a co-moving pair.
const COMOVING_DISTANCE_SCATTER: f64 = 0.01;

/// 1σ uncertainties of a synthetic star (catalog units).
#[derive(Debug, Clone, Copy)]
pub struct ObservationErrors {
    pub parallax: f64,
    pub pm: f64,
    /// `None` means no RV is measured.
    pub rv: Option<f64>,
}

impl From<&SimulationConfig> for ObservationErrors {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            parallax: config.parallax_err,
            pm: config.pm_err,
            rv: config.rv_err,
        }
    }
}

/// A generated pair plus the truth it was generated from.
#[derive(Debug, Clone)]
pub struct SyntheticPair {
    pub index: usize,
    pub comoving: bool,
    pub star1: StarObservation,
    pub star2: StarObservation,
    pub distance1: f64,
    pub distance2: f64,
    pub velocity1: Vector3<f64>,
    pub velocity2: Vector3<f64>,
}

/// Noise-free catalog observables of a star at `distance` moving with Cartesian `velocity`.
pub fn true_observables(position: SkyPosition, distance: f64, velocity: &Vector3<f64>) -> [f64; 4] {
    let local = tangent_basis(position.lon(), position.lat()).project(velocity);
    let tangential = distance * KMS_PER_PC_MASYR;
    [
        MAS_PER_ARCSEC / distance,
        local[0] / tangential,
        local[1] / tangential,
        local[2],
    ]
}

/// A star observed without noise, carrying the given uncertainties.
pub fn exact_star(
    position: SkyPosition,
    distance: f64,
    velocity: &Vector3<f64>,
    errors: &ObservationErrors,
) -> Result<StarObservation, EvidenceError> {
    let x = true_observables(position, distance, velocity);
    StarObservation::from_uncertainties(
        position,
        (x[0], errors.parallax),
        (x[1], errors.pm),
        (x[2], errors.pm),
        errors.rv.map(|e| (x[3], e)),
    )
}

/// A star observed with Gaussian noise at the given uncertainties.
pub fn observe_star<R: Rng + ?Sized>(
    rng: &mut R,
    position: SkyPosition,
    distance: f64,
    velocity: &Vector3<f64>,
    errors: &ObservationErrors,
) -> Result<StarObservation, EvidenceError> {
    let x = true_observables(position, distance, velocity);
    let unit = Normal::new(0.0, 1.0)
        .map_err(|e| EvidenceError::malformed(format!("noise distribution error: {e}")))?;
    let mut noisy = |value: f64, sigma: f64| value + sigma * unit.sample(&mut *rng);

    let parallax = noisy(x[0], errors.parallax);
    let pm_ra = noisy(x[1], errors.pm);
    let pm_dec = noisy(x[2], errors.pm);
    let rv = errors.rv.map(|e| (noisy(x[3], e), e));

    StarObservation::from_uncertainties(
        position,
        (parallax, errors.parallax),
        (pm_ra, errors.pm),
        (pm_dec, errors.pm),
        rv,
    )
}

/// Generate `config.n_pairs` pairs deterministically from `config.seed`.
pub fn generate_pairs(config: &SimulationConfig) -> Result<Vec<SyntheticPair>, EvidenceError> {
    validate(config)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let velocity = Normal::new(0.0, config.sigma_v)
        .map_err(|e| EvidenceError::malformed(format!("velocity distribution error: {e}")))?;
    let scatter = Normal::new(0.0, COMOVING_DISTANCE_SCATTER)
        .map_err(|e| EvidenceError::malformed(format!("distance distribution error: {e}")))?;
    let errors = ObservationErrors::from(config);

    // Keep both stars clear of the poles, where the tangent basis is not defined.
    let max_lat = FRAC_PI_2 - TANGENT_OFFSET_RAD - config.max_separation_deg.to_radians();
    let sin_max = max_lat.sin();
    let max_sep = config.max_separation_deg.to_radians();

    let mut pairs = Vec::with_capacity(config.n_pairs);
    for index in 0..config.n_pairs {
        let comoving = rng.gen_bool(config.comoving_fraction);

        let lon1 = rng.gen_range(0.0..2.0 * PI);
        let lat1 = rng.gen_range(-sin_max..=sin_max).asin();
        let lat2 = lat1 + rng.gen_range(-max_sep..=max_sep);
        let lon2 = lon1 + rng.gen_range(-max_sep..=max_sep) / lat1.cos();
        let pos1 = SkyPosition::new(lon1, lat1)?;
        let pos2 = SkyPosition::new(lon2, lat2)?;

        let distance1 = rng.gen_range(config.distance_min..=config.distance_max);
        let distance2 = if comoving {
            distance1 * (1.0 + scatter.sample(&mut rng))
        } else {
            rng.gen_range(config.distance_min..=config.distance_max)
        };

        let mut draw = || {
            Vector3::new(
                velocity.sample(&mut rng),
                velocity.sample(&mut rng),
                velocity.sample(&mut rng),
            )
        };
        let velocity1 = draw();
        let velocity2 = if comoving { velocity1 } else { draw() };

        let star1 = observe_star(&mut rng, pos1, distance1, &velocity1, &errors)?;
        let star2 = observe_star(&mut rng, pos2, distance2, &velocity2, &errors)?;

        pairs.push(SyntheticPair {
            index,
            comoving,
            star1,
            star2,
            distance1,
            distance2,
            velocity1,
            velocity2,
        });
    }

    Ok(pairs)
}

fn validate(config: &SimulationConfig) -> Result<(), EvidenceError> {
    if config.n_pairs == 0 {
        return Err(EvidenceError::malformed("pair count must be > 0"));
    }
    if !(0.0..=1.0).contains(&config.comoving_fraction) {
        return Err(EvidenceError::malformed(format!(
            "co-moving fraction must be in [0, 1], got {}",
            config.comoving_fraction
        )));
    }
    if !(config.distance_min.is_finite()
        && config.distance_max.is_finite()
        && config.distance_min > 0.0
        && config.distance_max >= config.distance_min)
    {
        return Err(EvidenceError::malformed(format!(
            "invalid distance range {}..{}",
            config.distance_min, config.distance_max
        )));
    }
    if !(config.max_separation_deg.is_finite()
        && config.max_separation_deg >= 0.0
        && config.max_separation_deg < 10.0)
    {
        return Err(EvidenceError::malformed(format!(
            "separation must be in [0, 10) degrees, got {}",
            config.max_separation_deg
        )));
    }
    if !(config.sigma_v.is_finite() && config.sigma_v > 0.0) {
        return Err(EvidenceError::malformed("velocity dispersion must be > 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_pairs() {
        let config = SimulationConfig {
            n_pairs: 5,
            ..SimulationConfig::default()
        };
        let a = generate_pairs(&config).unwrap();
        let b = generate_pairs(&config).unwrap();
        assert_eq!(a.len(), 5);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.star1, y.star1);
            assert_eq!(x.star2, y.star2);
            assert_eq!(x.comoving, y.comoving);
        }
    }

    #[test]
    fn comoving_pairs_share_velocity() {
        let config = SimulationConfig {
            n_pairs: 8,
            comoving_fraction: 1.0,
            rv_err: Some(1.0),
            ..SimulationConfig::default()
        };
        for pair in generate_pairs(&config).unwrap() {
            assert!(pair.comoving);
            assert_eq!(pair.velocity1, pair.velocity2);
            assert!(pair.star1.has_rv() && pair.star2.has_rv());
            assert!((pair.distance2 / pair.distance1 - 1.0).abs() < 0.1);
        }
    }

    #[test]
    fn exact_star_round_trips_parallax() {
        let pos = SkyPosition::from_degrees(10.0, -20.0).unwrap();
        let errors = ObservationErrors {
            parallax: 0.1,
            pm: 0.1,
            rv: None,
        };
        let star = exact_star(pos, 250.0, &Vector3::new(10.0, 0.0, 0.0), &errors).unwrap();
        assert!((star.parallax() - 4.0).abs() < 1e-12);
        assert!(!star.has_rv());
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        let config = SimulationConfig {
            comoving_fraction: 1.5,
            ..SimulationConfig::default()
        };
        assert!(generate_pairs(&config).is_err());
    }
}
