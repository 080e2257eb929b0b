//! Shared-velocity (H1) versus independent-velocity (H2) evidence for a star pair.
//!
//! - H2 marginalizes each star on its own and sums the two log-evidences.
//! - H1 stacks both stars into one 8-row system with a single latent velocity
//!   and marginalizes once. The shared velocity couples the two stars'
//!   precision before inversion, so this is not a sum of per-star terms.
//!
//! Combining the per-distance values over a distance grid or sample set is the
//! caller's job.

use tracing::debug;

use crate::domain::{HypothesisEvidence, StarObservation, VelocityPrior};
use crate::error::EvidenceError;
use crate::evidence::marginal::marginalize;
use crate::models::{assemble, check_distance, stack};

/// ln p(data | H1, d1, d2): both stars share one velocity.
pub fn ln_h1_marginal(
    d1: f64,
    d2: f64,
    obs1: &StarObservation,
    obs2: &StarObservation,
    prior: &VelocityPrior,
) -> Result<f64, EvidenceError> {
    let joint = stack(&assemble(obs1, d1)?, &assemble(obs2, d2)?)?;
    Ok(marginalize(&joint, prior)?.ln_evidence)
}

/// ln p(data | H2, d1, d2): each star has its own velocity.
pub fn ln_h2_marginal(
    d1: f64,
    d2: f64,
    obs1: &StarObservation,
    obs2: &StarObservation,
    prior: &VelocityPrior,
) -> Result<f64, EvidenceError> {
    let first = marginalize(&assemble(obs1, d1)?, prior)?;
    let second = marginalize(&assemble(obs2, d2)?, prior)?;
    Ok(first.ln_evidence + second.ln_evidence)
}

/// Both hypotheses at one pair of trial distances.
///
/// Each star's model is assembled once and shared by the stacked H1 system and
/// the two single-star H2 terms.
pub fn evaluate_at(
    d1: f64,
    d2: f64,
    obs1: &StarObservation,
    obs2: &StarObservation,
    prior: &VelocityPrior,
) -> Result<HypothesisEvidence, EvidenceError> {
    let first = assemble(obs1, d1)?;
    let second = assemble(obs2, d2)?;
    let ln_h1 = marginalize(&stack(&first, &second)?, prior)?.ln_evidence;
    let ln_h2 = marginalize(&first, prior)?.ln_evidence + marginalize(&second, prior)?.ln_evidence;
    Ok(HypothesisEvidence {
        distance1: d1,
        distance2: d2,
        ln_h1,
        ln_h2,
    })
}

/// Evaluate a pair over a batch of trial distances.
///
/// `distances1[i]` and `distances2[i]` form row `i`; the grids must have the
/// same, non-zero length. Bad grids fail the whole call. A singular covariance
/// only fails its own row, so the caller can drop that distance and keep the rest.
pub fn evaluate_pair(
    obs1: &StarObservation,
    obs2: &StarObservation,
    distances1: &[f64],
    distances2: &[f64],
    prior: &VelocityPrior,
) -> Result<Vec<Result<HypothesisEvidence, EvidenceError>>, EvidenceError> {
    if distances1.len() != distances2.len() {
        return Err(EvidenceError::shape(format!(
            "distance grids differ in length: {} vs {}",
            distances1.len(),
            distances2.len()
        )));
    }
    if distances1.is_empty() {
        return Err(EvidenceError::shape("empty distance grid"));
    }
    for &d in distances1.iter().chain(distances2) {
        check_distance(d)?;
    }

    let rows = distances1
        .iter()
        .zip(distances2)
        .map(|(&d1, &d2)| {
            evaluate_at(d1, d2, obs1, obs2, prior).inspect_err(|e| {
                debug!(d1, d2, error = %e, "trial distance rejected");
            })
        })
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SkyPosition;
    use crate::evidence::marginal::marginalize;

    fn pair() -> (StarObservation, StarObservation) {
        let a = StarObservation::from_uncertainties(
            SkyPosition::from_degrees(200.0, 10.0).unwrap(),
            (10.0, 0.3),
            (15.0, 0.4),
            (-8.0, 0.4),
            Some((12.0, 1.0)),
        )
        .unwrap();
        let b = StarObservation::from_uncertainties(
            SkyPosition::from_degrees(200.5, 10.4).unwrap(),
            (9.8, 0.3),
            (14.6, 0.4),
            (-7.9, 0.4),
            None,
        )
        .unwrap();
        (a, b)
    }

    #[test]
    fn h2_is_sum_of_single_star_evidences() {
        let (a, b) = pair();
        let prior = VelocityPrior::default();
        let h2 = ln_h2_marginal(100.0, 102.0, &a, &b, &prior).unwrap();
        let ea = marginalize(&assemble(&a, 100.0).unwrap(), &prior).unwrap();
        let eb = marginalize(&assemble(&b, 102.0).unwrap(), &prior).unwrap();
        assert!((h2 - ea.ln_evidence - eb.ln_evidence).abs() < 1e-12);
    }

    #[test]
    fn h1_is_not_sum_of_single_star_evidences() {
        let (a, b) = pair();
        let prior = VelocityPrior::default();
        let h1 = ln_h1_marginal(100.0, 102.0, &a, &b, &prior).unwrap();
        let h2 = ln_h2_marginal(100.0, 102.0, &a, &b, &prior).unwrap();
        assert!(h1.is_finite() && h2.is_finite());
        assert!((h1 - h2).abs() > 1e-6);
    }

    #[test]
    fn evaluate_at_agrees_with_separate_hypotheses() {
        let (a, b) = pair();
        let prior = VelocityPrior::default();
        let ev = evaluate_at(95.0, 104.0, &a, &b, &prior).unwrap();
        let h1 = ln_h1_marginal(95.0, 104.0, &a, &b, &prior).unwrap();
        let h2 = ln_h2_marginal(95.0, 104.0, &a, &b, &prior).unwrap();
        assert_eq!(ev.ln_h1, h1);
        assert_eq!(ev.ln_h2, h2);
        assert_eq!(ev.ln_ratio(), h1 - h2);
    }

    #[test]
    fn mismatched_grids_are_a_shape_error() {
        let (a, b) = pair();
        let err = evaluate_pair(&a, &b, &[100.0, 110.0], &[100.0], &VelocityPrior::default())
            .unwrap_err();
        assert!(matches!(err, EvidenceError::ShapeMismatch { .. }));
    }

    #[test]
    fn rows_follow_grid_order() {
        let (a, b) = pair();
        let prior = VelocityPrior::default();
        let d1 = [90.0, 100.0, 110.0];
        let d2 = [92.0, 102.0, 112.0];
        let rows = evaluate_pair(&a, &b, &d1, &d2, &prior).unwrap();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref().unwrap();
            assert_eq!(row.distance1, d1[i]);
            assert_eq!(row.distance2, d2[i]);
            assert_eq!(*row, evaluate_at(d1[i], d2[i], &a, &b, &prior).unwrap());
        }
    }
}
