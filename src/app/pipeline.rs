//! Shared pair-evaluation logic used by the `evaluate` and `simulate` commands.
//!
//! Workflow: read pair records -> build observations -> evaluate both
//! hypotheses over each pair's distance grid -> collect per-pair results.
//!
//! Work is distributed one pair per rayon task; the distance grid inside a pair
//! is evaluated sequentially since each row is a handful of tiny matrix products.

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::data::generate_pairs;
use crate::domain::{RunConfig, SimulationConfig, VelocityPrior};
use crate::error::EvidenceError;
use crate::evidence::evaluate_pair;
use crate::io::{
    PairFile, PairRecord, PairResult, ResultsFile, StarRecord, read_pairs_json, read_results_json,
    write_results_json,
};

/// Evaluate every pair; output order matches input order.
pub fn evaluate_pairs(pairs: &[PairRecord], prior: &VelocityPrior) -> Vec<PairResult> {
    pairs
        .par_iter()
        .map(|pair| evaluate_record(pair, prior))
        .collect()
}

fn evaluate_record(pair: &PairRecord, prior: &VelocityPrior) -> PairResult {
    let rows = pair
        .star1
        .to_observation()
        .and_then(|obs1| Ok((obs1, pair.star2.to_observation()?)))
        .and_then(|(obs1, obs2)| {
            evaluate_pair(&obs1, &obs2, &pair.distances1, &pair.distances2, prior)
        });

    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => {
            warn!(index = pair.index, error = %e, "pair could not be evaluated");
            return PairResult::failed(pair.index, &e);
        }
    };

    let mut ln_h1 = Vec::with_capacity(rows.len());
    let mut ln_h2 = Vec::with_capacity(rows.len());
    let mut row_errors = Vec::with_capacity(rows.len());
    let mut best_ln_ratio = f64::NEG_INFINITY;
    for row in rows {
        match row {
            Ok(ev) => {
                best_ln_ratio = best_ln_ratio.max(ev.ln_ratio());
                ln_h1.push(Some(ev.ln_h1));
                ln_h2.push(Some(ev.ln_h2));
                row_errors.push(None);
            }
            Err(e) => {
                ln_h1.push(None);
                ln_h2.push(None);
                row_errors.push(Some(e.to_string()));
            }
        }
    }

    debug!(
        index = pair.index,
        rows = ln_h1.len(),
        rejected = row_errors.iter().filter(|e| e.is_some()).count(),
        best_ln_ratio,
        "pair evaluated"
    );

    PairResult {
        index: pair.index,
        distances1: pair.distances1.clone(),
        distances2: pair.distances2.clone(),
        ln_h1,
        ln_h2,
        row_errors,
        error: None,
    }
}

/// Execute an `evaluate` run: read pairs, evaluate, write results.
///
/// Unless `config.overwrite` is set, an existing results file is reused: its
/// successful entries are kept and only failed pairs are evaluated again. A
/// results file whose length differs from the pair file is refused.
pub fn run_evaluate(config: &RunConfig) -> Result<ResultsFile, EvidenceError> {
    let prior = VelocityPrior::isotropic(config.sigma_v)?;
    let input = read_pairs_json(&config.pairs_path)?;
    info!(
        pairs = input.pairs.len(),
        sigma_v = config.sigma_v,
        path = %config.pairs_path.display(),
        "evaluating candidate pairs"
    );

    let cached = if config.overwrite {
        None
    } else {
        load_cached_results(config, input.pairs.len())?
    };

    let evaluate = |pairs: &[PairRecord]| match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map(|pool| pool.install(|| evaluate_pairs(pairs, &prior)))
            .map_err(|e| EvidenceError::malformed(format!("Invalid thread pool: {e}"))),
        None => Ok(evaluate_pairs(pairs, &prior)),
    };

    let results = match cached {
        None => evaluate(&input.pairs)?,
        Some(mut results) => {
            let pending: Vec<usize> = results
                .iter()
                .enumerate()
                .filter(|(_, r)| r.error.is_some())
                .map(|(i, _)| i)
                .collect();
            info!(
                reused = results.len() - pending.len(),
                pending = pending.len(),
                "reusing cached results"
            );
            let retry: Vec<PairRecord> = pending.iter().map(|&i| input.pairs[i].clone()).collect();
            for (i, fresh) in pending.into_iter().zip(evaluate(&retry)?) {
                results[i] = fresh;
            }
            results
        }
    };

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        warn!(failed, "some pairs failed");
    }

    let p = prior.precision();
    let output = ResultsFile {
        tool: "comove".to_string(),
        generated: Utc::now(),
        velocity_prior: [
            [p[(0, 0)], p[(0, 1)], p[(0, 2)]],
            [p[(1, 0)], p[(1, 1)], p[(1, 2)]],
            [p[(2, 0)], p[(2, 1)], p[(2, 2)]],
        ],
        results,
    };
    write_results_json(&config.output_path, &output)?;
    info!(path = %config.output_path.display(), "results written");

    Ok(output)
}

/// Previous results at the output path, if any, checked against the pair count.
fn load_cached_results(
    config: &RunConfig,
    n_pairs: usize,
) -> Result<Option<Vec<PairResult>>, EvidenceError> {
    if !config.output_path.exists() {
        return Ok(None);
    }
    let previous = read_results_json(&config.output_path)?;
    if previous.results.len() != n_pairs {
        return Err(EvidenceError::shape(format!(
            "existing results '{}' hold {} pairs, expected {n_pairs} (use --overwrite)",
            config.output_path.display(),
            previous.results.len()
        )));
    }
    debug!(path = %config.output_path.display(), "found existing results");
    Ok(Some(previous.results))
}

/// Synthetic pairs as a pair file, each evaluated at its true distances.
pub fn simulated_pair_file(config: &SimulationConfig) -> Result<PairFile, EvidenceError> {
    let pairs = generate_pairs(config)?
        .into_iter()
        .map(|pair| PairRecord {
            index: pair.index,
            star1: StarRecord::from_observation(&pair.star1),
            star2: StarRecord::from_observation(&pair.star2),
            distances1: vec![pair.distance1],
            distances2: vec![pair.distance2],
            label: Some(if pair.comoving { "comoving" } else { "independent" }.to_string()),
        })
        .collect();
    Ok(PairFile { pairs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_follow_input_order() {
        let config = SimulationConfig {
            n_pairs: 12,
            seed: 7,
            ..SimulationConfig::default()
        };
        let file = simulated_pair_file(&config).unwrap();
        let results = evaluate_pairs(&file.pairs, &VelocityPrior::default());
        assert_eq!(results.len(), 12);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.index, i);
            assert!(r.error.is_none(), "{:?}", r.error);
            assert_eq!(r.n_ok(), 1);
        }
    }

    #[test]
    fn malformed_pair_does_not_abort_the_run() {
        let config = SimulationConfig {
            n_pairs: 3,
            ..SimulationConfig::default()
        };
        let mut file = simulated_pair_file(&config).unwrap();
        file.pairs[1].star2.dec = 4.0;
        file.pairs[2].distances2.push(120.0);

        let results = evaluate_pairs(&file.pairs, &VelocityPrior::default());
        assert!(results[0].error.is_none());
        assert!(results[1].error.as_deref().unwrap().contains("latitude"));
        assert!(results[2].error.as_deref().unwrap().contains("shape mismatch"));
    }

    fn temp_paths(tag: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir();
        let id = std::process::id();
        let out = dir.join(format!("comove-results-{tag}-{id}.json"));
        std::fs::remove_file(&out).ok();
        (dir.join(format!("comove-pairs-{tag}-{id}.json")), out)
    }

    fn run_config(pairs: &std::path::Path, out: &std::path::Path, overwrite: bool) -> RunConfig {
        RunConfig {
            pairs_path: pairs.to_path_buf(),
            output_path: out.to_path_buf(),
            sigma_v: 25.0,
            threads: Some(2),
            overwrite,
        }
    }

    #[test]
    fn existing_results_of_wrong_length_are_refused_unless_overwriting() {
        let (pairs_path, out_path) = temp_paths("shape");
        let small = simulated_pair_file(&SimulationConfig {
            n_pairs: 2,
            ..SimulationConfig::default()
        })
        .unwrap();
        let large = simulated_pair_file(&SimulationConfig {
            n_pairs: 3,
            ..SimulationConfig::default()
        })
        .unwrap();

        crate::io::write_pairs_json(&pairs_path, &small).unwrap();
        run_evaluate(&run_config(&pairs_path, &out_path, false)).unwrap();

        crate::io::write_pairs_json(&pairs_path, &large).unwrap();
        let err = run_evaluate(&run_config(&pairs_path, &out_path, false)).unwrap_err();
        assert!(matches!(err, EvidenceError::ShapeMismatch { .. }), "{err}");
        assert_eq!(read_results_json(&out_path).unwrap().results.len(), 2);

        let output = run_evaluate(&run_config(&pairs_path, &out_path, true)).unwrap();
        assert_eq!(output.results.len(), 3);
        assert_eq!(read_results_json(&out_path).unwrap().results.len(), 3);

        std::fs::remove_file(&pairs_path).ok();
        std::fs::remove_file(&out_path).ok();
    }

    #[test]
    fn matching_results_are_reused_and_failures_retried() {
        let (pairs_path, out_path) = temp_paths("reuse");
        let file = simulated_pair_file(&SimulationConfig {
            n_pairs: 2,
            ..SimulationConfig::default()
        })
        .unwrap();
        crate::io::write_pairs_json(&pairs_path, &file).unwrap();
        let first = run_evaluate(&run_config(&pairs_path, &out_path, true)).unwrap();

        let mut previous = first.clone();
        previous.results[0].ln_h1 = vec![Some(123.0)];
        previous.results[1] = PairResult::failed(1, &EvidenceError::malformed("stale"));
        write_results_json(&out_path, &previous).unwrap();

        let second = run_evaluate(&run_config(&pairs_path, &out_path, false)).unwrap();
        assert_eq!(second.results[0].ln_h1, vec![Some(123.0)]);
        assert_eq!(second.results[1], first.results[1]);

        std::fs::remove_file(&pairs_path).ok();
        std::fs::remove_file(&out_path).ok();
    }
}
