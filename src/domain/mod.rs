//! Domain types used throughout the evidence engine.
//!
//! This module defines:
//!
//! - validated inputs (`SkyPosition`, `StarObservation`, `VelocityPrior`)
//! - the per-star linear model and marginalization outputs (`LinearModel`, `EvidenceResult`)
//! - per-distance hypothesis outputs (`HypothesisEvidence`)
//! - run configuration for the driver (`RunConfig`, `SimulationConfig`)

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
