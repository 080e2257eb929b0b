//! Command-line parsing for the co-moving pair evidence driver.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! evidence code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::DEFAULT_SIGMA_V_KMS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "comove",
    version,
    about = "Co-moving star pair evidence (shared vs independent velocity)"
)]
pub struct Cli {
    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less logging (-q warn, -qq error).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate ln p(data | H1) and ln p(data | H2) over each pair's distance grid.
    Evaluate(EvaluateArgs),
    /// Write a pair file of synthetic co-moving / independent pairs.
    Simulate(SimulateArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct EvaluateArgs {
    /// Pair file (JSON) with observation records and trial-distance grids.
    #[arg(long, value_name = "JSON")]
    pub pairs: PathBuf,

    /// Where to write the per-pair results (JSON).
    #[arg(short, long, value_name = "JSON")]
    pub out: PathBuf,

    /// Isotropic velocity-prior dispersion (km/s).
    #[arg(long, default_value_t = DEFAULT_SIGMA_V_KMS)]
    pub sigma_v: f64,

    /// Worker threads (defaults to one per core).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Replace existing results instead of reusing them.
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Number of pairs to generate.
    #[arg(short = 'n', long, default_value_t = 16)]
    pub n_pairs: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fraction of pairs sharing one velocity.
    #[arg(long, default_value_t = 0.5)]
    pub comoving_fraction: f64,

    /// Minimum distance (pc).
    #[arg(long, default_value_t = 50.0)]
    pub distance_min: f64,

    /// Maximum distance (pc).
    #[arg(long, default_value_t = 200.0)]
    pub distance_max: f64,

    /// Maximum per-axis offset of the second star (degrees).
    #[arg(long, default_value_t = 1.0)]
    pub max_separation_deg: f64,

    /// Parallax error (mas).
    #[arg(long, default_value_t = 0.3)]
    pub parallax_err: f64,

    /// Proper-motion error (mas/yr).
    #[arg(long, default_value_t = 0.5)]
    pub pm_err: f64,

    /// RV error (km/s); omit to generate stars without RV.
    #[arg(long)]
    pub rv_err: Option<f64>,

    /// Velocity dispersion the velocities are drawn from (km/s).
    #[arg(long, default_value_t = DEFAULT_SIGMA_V_KMS)]
    pub sigma_v: f64,

    /// Where to write the pair file (JSON).
    #[arg(short, long, value_name = "JSON")]
    pub out: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_defaults() {
        let cli = Cli::parse_from(["comove", "evaluate", "--pairs", "p.json", "-o", "r.json"]);
        let Command::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(args.sigma_v, DEFAULT_SIGMA_V_KMS);
        assert_eq!(args.threads, None);
        assert!(!args.overwrite);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn verbosity_counts_and_conflicts() {
        let cli = Cli::parse_from(["comove", "-vv", "simulate", "-o", "p.json"]);
        assert_eq!(cli.verbose, 2);
        assert!(Cli::try_parse_from(["comove", "-v", "-q", "simulate", "-o", "p.json"]).is_err());
    }
}
