//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the tracing subscriber
//! - runs pair evaluation or simulation
//! - prints a short summary

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EvaluateArgs, SimulateArgs};
use crate::domain::{RunConfig, SimulationConfig};
use crate::error::EvidenceError;
use crate::io::{PairResult, write_pairs_json};

pub mod pipeline;

/// Entry point for the `comove` binary.
pub fn run() -> Result<(), EvidenceError> {
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Evaluate(args) => handle_evaluate(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

/// Install a stderr subscriber; `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbose: u8, quiet: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn level_for(verbose: u8, quiet: u8) -> &'static str {
    match (verbose, quiet) {
        (0, 0) => "info",
        (1, _) => "debug",
        (v, _) if v >= 2 => "trace",
        (_, 1) => "warn",
        _ => "error",
    }
}

fn handle_evaluate(args: EvaluateArgs) -> Result<(), EvidenceError> {
    let config = run_config_from_args(&args);
    let output = pipeline::run_evaluate(&config)?;
    println!("{}", format_summary(&output.results));
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), EvidenceError> {
    let config = simulation_config_from_args(&args);
    let file = pipeline::simulated_pair_file(&config)?;
    write_pairs_json(&args.out, &file)?;
    info!(
        pairs = file.pairs.len(),
        seed = config.seed,
        path = %args.out.display(),
        "synthetic pairs written"
    );
    Ok(())
}

pub fn run_config_from_args(args: &EvaluateArgs) -> RunConfig {
    RunConfig {
        pairs_path: args.pairs.clone(),
        output_path: args.out.clone(),
        sigma_v: args.sigma_v,
        threads: args.threads,
        overwrite: args.overwrite,
    }
}

pub fn simulation_config_from_args(args: &SimulateArgs) -> SimulationConfig {
    SimulationConfig {
        n_pairs: args.n_pairs,
        seed: args.seed,
        comoving_fraction: args.comoving_fraction,
        distance_min: args.distance_min,
        distance_max: args.distance_max,
        max_separation_deg: args.max_separation_deg,
        parallax_err: args.parallax_err,
        pm_err: args.pm_err,
        rv_err: args.rv_err,
        sigma_v: args.sigma_v,
    }
}

/// One line per pair: index, usable rows, and the range of per-row ln(H1/H2).
pub fn format_summary(results: &[PairResult]) -> String {
    let mut out = format!(
        "{:>6}  {:>5}  {:>12}  {:>12}\n",
        "pair", "rows", "min lnH1/H2", "max lnH1/H2"
    );
    for r in results {
        if let Some(err) = &r.error {
            out.push_str(&format!("{:>6}  {:>5}  {err}\n", r.index, "-"));
            continue;
        }
        let ratios: Vec<f64> = r
            .ln_h1
            .iter()
            .zip(&r.ln_h2)
            .filter_map(|(a, b)| Some((*a)? - (*b)?))
            .collect();
        let min = ratios.iter().copied().fold(f64::INFINITY, f64::min);
        let max = ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if ratios.is_empty() {
            out.push_str(&format!("{:>6}  {:>5}  {:>12}  {:>12}\n", r.index, 0, "-", "-"));
        } else {
            out.push_str(&format!(
                "{:>6}  {:>5}  {:>12.3}  {:>12.3}\n",
                r.index,
                ratios.len(),
                min,
                max
            ));
        }
    }
    out
}
